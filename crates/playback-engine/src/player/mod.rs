// crates/playback-engine/src/player/mod.rs
//
// The Player (§4.I): owns a worker thread that is the only mutator of the
// Cache and the only issuer of I/O requests, per the concurrency model
// (§5). Grounded directly on `velocut_media::worker::MediaWorker`'s shape
// — a latest-wins-free bounded command channel feeding a loop, a
// `shutdown: Arc<AtomicBool>` with a poison-pill wakeup, a dedicated
// decode path kept off the control thread — generalized from "one frame
// request slot" to the full tick/seek/cache/mixer orchestration this spec
// calls for.

pub mod commands;
pub mod observable;
pub mod state_machine;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use playback_core::compositor::{CompareMode, CompareTimeMode};
use playback_core::time::{Rate, RationalTime, TimeRange};
use playback_core::timeline::Timeline;
use playback_core::video::VideoData;
use playback_core::{EngineError, EngineResult};

use playback_io::traits::{read_handle, AudioData, ReadHandle};
use playback_io::{IORegistry, Options};

use crate::audio_mixer::{AudioEntry, AudioMixer, DeviceFormat};
use crate::cache::{Cache, CacheDirection, CacheOptions};
use crate::clock::{Clock, Direction, Hybrid};

pub use commands::{Command, TimeAction};
pub use state_machine::{apply_loop, LoopMode, Playback};

#[derive(Clone, Copy, Debug)]
pub struct PlayerOptions {
    pub tick_interval: Duration,
    pub video_request_count: usize,
    pub audio_request_count: usize,
    pub seek_timeout: Duration,
    pub device_format: DeviceFormat,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(5),
            video_request_count: 16,
            audio_request_count: 4,
            seek_timeout: Duration::from_millis(100),
            device_format: DeviceFormat { sample_rate: 48_000, channel_count: 2 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheInfo {
    pub video_frames_cached: usize,
    pub audio_seconds_cached: usize,
    pub byte_total: u64,
}

/// `Option<VideoData>` that only counts as "changed" when the time stamp
/// differs — `VideoData` itself carries no cheap equality (image buffers
/// aren't worth comparing byte-for-byte) and the tick loop only needs to
/// know *which* frame is current, not whether its pixels moved.
#[derive(Clone, Debug)]
pub struct CurrentVideoData(pub Option<VideoData>);

impl PartialEq for CurrentVideoData {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(a), Some(b)) => a.time == b.time,
            _ => false,
        }
    }
}

use observable::Observable;

/// Every observable named in §4.I, grouped so `Player` and its worker
/// thread can share one `Arc` of them.
pub struct Observables {
    pub playback: Observable<Playback>,
    pub loop_mode: Observable<LoopMode>,
    pub speed: Observable<f64>,
    pub current_time: Observable<RationalTime>,
    pub seek: Observable<RationalTime>,
    pub in_out_range: Observable<TimeRange>,
    pub video_layer: Observable<usize>,
    pub compare_video_layers: Observable<Vec<usize>>,
    pub compare: Observable<CompareMode>,
    pub compare_time: Observable<CompareTimeMode>,
    pub current_video_data: Observable<CurrentVideoData>,
    pub current_audio_second: Observable<Option<i64>>,
    pub audio_device: Observable<Option<String>>,
    pub volume: Observable<f32>,
    pub mute: Observable<bool>,
    pub channel_mute: Observable<Vec<bool>>,
    pub audio_offset: Observable<f64>,
    pub cache_options: Observable<CacheOptions>,
    pub cache_info: Observable<CacheInfo>,
}

impl Observables {
    fn new(duration: TimeRange, cache_options: CacheOptions) -> Self {
        Self {
            playback: Observable::new(Playback::Stop),
            loop_mode: Observable::new(LoopMode::Loop),
            speed: Observable::new(1.0),
            current_time: Observable::new(duration.start),
            seek: Observable::new(duration.start),
            in_out_range: Observable::new(duration),
            video_layer: Observable::new(0),
            compare_video_layers: Observable::new(Vec::new()),
            compare: Observable::new(CompareMode::A),
            compare_time: Observable::new(CompareTimeMode::Relative),
            current_video_data: Observable::new(CurrentVideoData(None)),
            current_audio_second: Observable::new(None),
            audio_device: Observable::new(None),
            volume: Observable::new(1.0),
            mute: Observable::new(false),
            channel_mute: Observable::new(Vec::new()),
            audio_offset: Observable::new(0.0),
            cache_options: Observable::new(cache_options),
            cache_info: Observable::new(CacheInfo { video_frames_cached: 0, audio_seconds_cached: 0, byte_total: 0 }),
        }
    }
}

fn direction_of(playback: Playback) -> Direction {
    match playback {
        Playback::Reverse => Direction::Reverse,
        _ => Direction::Forward,
    }
}

/// Fail Player creation the moment any media a timeline references can't
/// be opened (§4.I.f "I/O open failure fails Player creation").
fn validate_opens(timeline: &dyn Timeline, io: &IORegistry) -> EngineResult<()> {
    let options = Options::new();
    for track in timeline.video_tracks().iter().chain(timeline.audio_tracks()) {
        for item in &track.items {
            if let playback_core::timeline::Item::Clip { media, .. } = item {
                io.read(&media.path, &options)?;
            }
        }
    }
    Ok(())
}

fn tick_key(t: RationalTime) -> (i64, i64, i64) {
    (t.value.round() as i64, t.rate.num, t.rate.den)
}

struct PendingVideo {
    time: RationalTime,
    handle: ReadHandle<VideoData>,
}

/// One in-flight second of audio. Several tracks can be simultaneously
/// active (§4.E, `audioIn` across all audio tracks); `merged` accumulates
/// each track's `AudioEntry` as its read resolves so the cache only ever
/// sees one summed entry per second (§4.G step 4, "sum layers").
struct PendingAudio {
    handles: Vec<ReadHandle<AudioData>>,
    merged: Option<AudioEntry>,
}

struct WorkerCtx {
    observables: Arc<Observables>,
    timeline: Arc<dyn Timeline>,
    io: Arc<IORegistry>,
    cache: Arc<Cache>,
    clock: Arc<Hybrid>,
    mixer: Arc<Mutex<AudioMixer>>,
    options: PlayerOptions,
    in_flight_video: HashMap<(i64, i64, i64), PendingVideo>,
    in_flight_audio: HashMap<i64, PendingAudio>,
}

fn issue_video_requests(timeline: &dyn Timeline, io: &IORegistry, t: RationalTime) -> Vec<ReadHandle<VideoData>> {
    timeline
        .video_at(t)
        .into_iter()
        .map(|hit| match io.read(&hit.media, &Options::new()) {
            Ok(reader) => reader.read_video(hit.clip_local_time, ""),
            Err(e) => {
                let (handle, tx, _cancel) = read_handle();
                let _ = tx.send(Err(e));
                handle
            }
        })
        .collect()
}

fn issue_audio_requests(timeline: &dyn Timeline, io: &IORegistry, range: TimeRange) -> Vec<ReadHandle<AudioData>> {
    timeline
        .audio_in(range)
        .into_iter()
        .map(|hit| match io.read(&hit.media, &Options::new()) {
            Ok(reader) => reader.read_audio(hit.clip_local_range),
            Err(e) => {
                let (handle, tx, _cancel) = read_handle();
                let _ = tx.send(Err(e));
                handle
            }
        })
        .collect()
}

/// Element-wise sum of two tracks' PCM, channel by channel, so several
/// simultaneously active audio tracks land in one cached entry rather than
/// the cache only ever seeing whichever track happened to resolve first.
/// Shorter channel is zero-padded rather than truncated.
fn merge_audio_entries(a: AudioEntry, b: AudioEntry) -> AudioEntry {
    let channel_count = a.layers.len().max(b.layers.len());
    let mut layers = Vec::with_capacity(channel_count);
    for i in 0..channel_count {
        let la = a.layers.get(i);
        let lb = b.layers.get(i);
        let len = la.map(|l| l.len()).unwrap_or(0).max(lb.map(|l| l.len()).unwrap_or(0));
        let mut merged = vec![0.0f32; len];
        if let Some(l) = la {
            for (idx, s) in l.iter().enumerate() {
                merged[idx] += s;
            }
        }
        if let Some(l) = lb {
            for (idx, s) in l.iter().enumerate() {
                merged[idx] += s;
            }
        }
        layers.push(Arc::new(merged));
    }
    AudioEntry::from_read(a.sample_rate, layers)
}

fn time_action_target(observables: &Observables, rate: Rate, action: TimeAction) -> RationalTime {
    let t = observables.current_time.get();
    let range = observables.in_out_range.get();
    match action {
        TimeAction::FrameNext => t.add(&RationalTime::new(1.0, rate)),
        TimeAction::FramePrev => t.sub(&RationalTime::new(1.0, rate)),
        TimeAction::FrameNextX10 => t.add(&RationalTime::new(10.0, rate)),
        TimeAction::FramePrevX10 => t.sub(&RationalTime::new(10.0, rate)),
        TimeAction::Start => range.start,
        TimeAction::End => range.end_time_inclusive(),
    }
}

fn do_seek(ctx: &mut WorkerCtx, target: RationalTime) {
    for (_, pending) in ctx.in_flight_video.drain() {
        pending.handle.cancel();
    }
    for (_, pending) in ctx.in_flight_audio.drain() {
        for handle in pending.handles {
            handle.cancel();
        }
    }

    ctx.clock.reset(target);
    ctx.mixer.lock().unwrap().reset_for_seek();
    ctx.observables.seek.set(target);
    ctx.observables.current_time.set(target);

    if ctx.observables.playback.get() != Playback::Stop {
        let mut resolved = None;
        for handle in issue_video_requests(ctx.timeline.as_ref(), ctx.io.as_ref(), target) {
            if let Some(Ok(data)) = handle.wait_timeout(ctx.options.seek_timeout) {
                resolved = Some(data);
                break;
            }
        }
        // A miss inside the timeout is not an error (§4.I.c) — the
        // previous currentVideoData value simply survives this tick.
        if let Some(data) = resolved {
            ctx.cache.put_video(target, data.clone());
            ctx.observables.current_video_data.set(CurrentVideoData(Some(data)));
        }
    }
}

fn handle_command(ctx: &mut WorkerCtx, cmd: Command) {
    match cmd {
        Command::SetPlayback(p) => {
            match p {
                Playback::Stop => ctx.clock.freeze(),
                _ => {
                    ctx.clock.unfreeze();
                    ctx.clock.set_direction(direction_of(p));
                }
            }
            ctx.observables.playback.set(p);
        }
        Command::SetLoop(m) => {
            ctx.observables.loop_mode.set(m);
        }
        Command::SetSpeed(s) => {
            ctx.clock.set_speed(s);
            ctx.observables.speed.set(s);
        }
        Command::Seek(t) => do_seek(ctx, t),
        Command::SetInOutRange(r) => {
            ctx.observables.in_out_range.set(r);
        }
        Command::SetVideoLayer(l) => {
            ctx.observables.video_layer.set(l);
        }
        Command::SetCompare(c) => {
            ctx.observables.compare.set(c);
        }
        Command::SetCompareTime(c) => {
            ctx.observables.compare_time.set(c);
        }
        Command::SetVolume(v) => {
            ctx.mixer.lock().unwrap().set_volume(v);
            ctx.observables.volume.set(v);
        }
        Command::SetMute(m) => {
            ctx.mixer.lock().unwrap().set_mute(m);
            ctx.observables.mute.set(m);
        }
        Command::SetChannelMute { layer, mask } => {
            ctx.mixer.lock().unwrap().set_channel_mute(layer, mask.clone());
            ctx.observables.channel_mute.set(mask);
        }
        Command::SetAudioOffset(o) => {
            ctx.observables.audio_offset.set(o);
        }
        Command::SetCacheOptions(o) => {
            ctx.cache.set_options(o);
            ctx.observables.cache_options.set(o);
        }
        Command::TimeAction(a) => {
            let target = time_action_target(&ctx.observables, ctx.timeline.rate(), a);
            do_seek(ctx, target);
        }
        Command::ReportAudioDeviceFailure => {
            ctx.clock.degrade_to_wall_clock();
        }
        Command::Shutdown => {}
    }
}

fn tick(ctx: &mut WorkerCtx) {
    let rate = ctx.timeline.rate();
    let playback = ctx.observables.playback.get();

    if playback != Playback::Stop {
        let t = ctx.clock.now();
        let range = ctx.observables.in_out_range.get();
        let outcome = apply_loop(ctx.observables.loop_mode.get(), range, t, playback);
        if outcome.time.to_seconds() != t.to_seconds() {
            ctx.clock.reset(outcome.time);
        }
        if outcome.playback != playback {
            ctx.clock.set_direction(direction_of(outcome.playback));
            ctx.observables.playback.set(outcome.playback);
        }
        ctx.observables.current_time.set(outcome.time);
    }

    let t = ctx.clock.now();
    let direction = match ctx.observables.playback.get() {
        Playback::Reverse => CacheDirection::Reverse,
        _ => CacheDirection::Forward,
    };
    ctx.cache.set_current(t, direction);

    let cache_options = ctx.cache.options();
    let (lo, hi) = match direction {
        CacheDirection::Forward => (t.to_seconds() - cache_options.read_behind_seconds, t.to_seconds() + cache_options.read_ahead_seconds),
        CacheDirection::Reverse => (t.to_seconds() - cache_options.read_ahead_seconds, t.to_seconds() + cache_options.read_behind_seconds),
    };
    let frame_secs = 1.0 / rate.to_f64().max(1.0);

    let mut probe = lo;
    let mut issued = 0usize;
    while probe <= hi && issued < ctx.options.video_request_count {
        let probe_time = RationalTime::from_seconds(probe, rate);
        let key = tick_key(probe_time);
        if !ctx.cache.contains_video(probe_time) && !ctx.cache.is_marked_failed(probe_time) && !ctx.in_flight_video.contains_key(&key) {
            for handle in issue_video_requests(ctx.timeline.as_ref(), ctx.io.as_ref(), probe_time) {
                ctx.in_flight_video.insert(key, PendingVideo { time: probe_time, handle });
                issued += 1;
            }
        }
        probe += frame_secs;
    }

    let mut finished = Vec::new();
    for (key, pending) in ctx.in_flight_video.iter() {
        if let Some(result) = pending.handle.poll() {
            finished.push((*key, pending.time, result));
        }
    }
    for (key, time, result) in finished {
        ctx.in_flight_video.remove(&key);
        match result {
            Ok(data) => {
                ctx.cache.put_video(time, data);
                ctx.cache.forget_failure(time);
            }
            Err(EngineError::Cancelled) => {}
            Err(_) => {
                // Decode failure surfaces in logs only (§4.I.f); the
                // previous currentVideoData value is left untouched.
                ctx.cache.mark_failed(time);
            }
        }
    }

    let mut audio_issued = 0usize;
    let mut audio_probe_sec = lo.floor() as i64;
    while audio_probe_sec <= hi.ceil() as i64 && audio_issued < ctx.options.audio_request_count {
        if ctx.cache.get_audio(audio_probe_sec).is_none() && !ctx.in_flight_audio.contains_key(&audio_probe_sec) {
            let second_range = TimeRange::new(RationalTime::from_seconds(audio_probe_sec as f64, rate), RationalTime::new(1.0 * rate.to_f64(), rate));
            let handles = issue_audio_requests(ctx.timeline.as_ref(), ctx.io.as_ref(), second_range);
            if !handles.is_empty() {
                ctx.in_flight_audio.insert(audio_probe_sec, PendingAudio { handles, merged: None });
                audio_issued += 1;
            }
        }
        audio_probe_sec += 1;
    }

    let sample_rate = ctx.options.device_format.sample_rate;
    for pending in ctx.in_flight_audio.values_mut() {
        let mut still_pending = Vec::new();
        for handle in pending.handles.drain(..) {
            match handle.poll() {
                Some(Ok(data)) => {
                    let entry = AudioEntry::from_read(sample_rate, data.layers);
                    pending.merged = Some(match pending.merged.take() {
                        Some(existing) => merge_audio_entries(existing, entry),
                        None => entry,
                    });
                }
                Some(Err(_)) => {} // one track's decode failure doesn't block the others
                None => still_pending.push(handle),
            }
        }
        pending.handles = still_pending;
    }
    let done_seconds: Vec<i64> = ctx
        .in_flight_audio
        .iter()
        .filter(|(_, pending)| pending.handles.is_empty())
        .map(|(second, _)| *second)
        .collect();
    for second in done_seconds {
        if let Some(pending) = ctx.in_flight_audio.remove(&second) {
            if let Some(entry) = pending.merged {
                ctx.cache.put_audio(second, entry);
            }
        }
    }

    ctx.cache.remove_outside(lo - frame_secs, hi + frame_secs);

    if let Some(data) = ctx.cache.get_video(t) {
        ctx.observables.current_video_data.set(CurrentVideoData(Some(data)));
    }
    ctx.observables.current_audio_second.set(Some(t.to_seconds().floor() as i64));

    ctx.observables.cache_info.set(CacheInfo {
        video_frames_cached: ctx.cache.video_count(),
        audio_seconds_cached: ctx.cache.audio_count(),
        byte_total: ctx.cache.byte_total(),
    });
}

fn run_worker(mut ctx: WorkerCtx, commands_rx: Receiver<Command>, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match commands_rx.recv_timeout(ctx.options.tick_interval) {
            Ok(cmd) => handle_command(&mut ctx, cmd),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        while let Ok(cmd) = commands_rx.try_recv() {
            handle_command(&mut ctx, cmd);
        }
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        tick(&mut ctx);
    }
}

/// The top-level handle a host application holds. Creating one spawns the
/// worker thread (§5); dropping it signals shutdown and joins.
pub struct Player {
    observables: Arc<Observables>,
    cache: Arc<Cache>,
    commands_tx: Sender<Command>,
    shutdown: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Player {
    pub fn new(timeline: Arc<dyn Timeline>, io: Arc<IORegistry>, cache_options: CacheOptions, options: PlayerOptions) -> EngineResult<Player> {
        validate_opens(timeline.as_ref(), io.as_ref())?;

        let rate = timeline.rate();
        let duration = TimeRange::new(timeline.global_start_time(), timeline.duration());
        let observables = Arc::new(Observables::new(duration, cache_options));
        let cache = Arc::new(Cache::new(cache_options));
        let clock = Arc::new(Hybrid::new(rate, options.device_format.sample_rate));
        clock.reset(duration.start);
        let mixer = Arc::new(Mutex::new(AudioMixer::new(options.device_format, clock.audio_clock(), 2)));

        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let ctx = WorkerCtx {
            observables: observables.clone(),
            timeline,
            io,
            cache: cache.clone(),
            clock,
            mixer,
            options,
            in_flight_video: HashMap::new(),
            in_flight_audio: HashMap::new(),
        };

        let worker_shutdown = shutdown.clone();
        let handle = std::thread::Builder::new()
            .name("playback-worker".into())
            .spawn(move || run_worker(ctx, commands_rx, worker_shutdown))
            .map_err(|e| EngineError::IoError(e.to_string()))?;

        Ok(Player { observables, cache, commands_tx, shutdown, worker: Mutex::new(Some(handle)) })
    }

    pub fn observables(&self) -> &Arc<Observables> {
        &self.observables
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    fn send(&self, cmd: Command) {
        let _ = self.commands_tx.send(cmd);
    }

    pub fn set_playback(&self, p: Playback) {
        self.send(Command::SetPlayback(p));
    }
    pub fn set_loop(&self, m: LoopMode) {
        self.send(Command::SetLoop(m));
    }
    pub fn set_speed(&self, s: f64) {
        self.send(Command::SetSpeed(s));
    }
    pub fn seek(&self, t: RationalTime) {
        self.send(Command::Seek(t));
    }
    pub fn set_in_out_range(&self, r: TimeRange) {
        self.send(Command::SetInOutRange(r));
    }
    pub fn set_video_layer(&self, l: usize) {
        self.send(Command::SetVideoLayer(l));
    }
    pub fn set_compare(&self, c: CompareMode) {
        self.send(Command::SetCompare(c));
    }
    pub fn set_compare_time(&self, c: CompareTimeMode) {
        self.send(Command::SetCompareTime(c));
    }
    pub fn set_volume(&self, v: f32) {
        self.send(Command::SetVolume(v));
    }
    pub fn set_mute(&self, m: bool) {
        self.send(Command::SetMute(m));
    }
    pub fn set_channel_mute(&self, layer: usize, mask: Vec<bool>) {
        self.send(Command::SetChannelMute { layer, mask });
    }
    pub fn set_audio_offset(&self, o: f64) {
        self.send(Command::SetAudioOffset(o));
    }
    pub fn set_cache_options(&self, o: CacheOptions) {
        self.send(Command::SetCacheOptions(o));
    }
    pub fn time_action(&self, a: TimeAction) {
        self.send(Command::TimeAction(a));
    }

    /// Told by the host application's audio device callback that the
    /// device has failed. Downgrades the Clock to `WallClock` transparently
    /// (§4.I.f); safe to call more than once, only the first call logs.
    pub fn report_audio_device_failure(&self) {
        self.send(Command::ReportAudioDeviceFailure);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.commands_tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::path::Path;
    use playback_core::timeline::{InMemoryTimeline, Item, MediaReference, Track, TrackKind};
    use playback_io::traits::{ReadPlugin, Reader, Writer, WritePlugin};

    fn stub_path(name: &str) -> Path {
        Path::new(name, &Default::default())
    }

    fn stub_timeline() -> Arc<dyn Timeline> {
        let rate = Rate::new(24, 1);
        let mut timeline = InMemoryTimeline::new(rate);
        let item = Item::Clip {
            name: "clip".into(),
            media: MediaReference { path: stub_path("clip.fake"), available_range: None },
            source_range: playback_core::timeline::TimeRangeFlat::from_range(&TimeRange::new(RationalTime::zero(rate), RationalTime::new(48.0, rate))),
        };
        timeline.video_tracks.push(Track { kind: TrackKind::Video, name: "V1".into(), layer: 0, items: vec![item] });
        Arc::new(timeline)
    }

    struct FakeReader;
    impl Reader for FakeReader {
        fn info(&self) -> ReadHandle<playback_core::media_info::MediaInfo> {
            let (handle, tx, _c) = read_handle();
            let _ = tx.send(Ok(Default::default()));
            handle
        }
        fn read_video(&self, time: RationalTime, _layer: &str) -> ReadHandle<VideoData> {
            let (handle, tx, _c) = read_handle();
            let image = playback_core::video::Image::new_rgba8(1, 1, vec![1, 2, 3, 4]);
            let _ = tx.send(Ok(VideoData { time, layers: vec![playback_core::video::VideoLayer { image, transform: Default::default() }] }));
            handle
        }
        fn read_audio(&self, range: TimeRange) -> ReadHandle<AudioData> {
            let (handle, tx, _c) = read_handle();
            let _ = tx.send(Ok(AudioData { sample_offset: range.start.value as i64, layers: vec![] }));
            handle
        }
        fn cancel(&self) {}
    }

    struct FakeReadPlugin;
    impl ReadPlugin for FakeReadPlugin {
        fn extensions(&self) -> &'static [&'static str] {
            &["fake"]
        }
        fn open(&self, _path: &Path, _options: &Options) -> EngineResult<Arc<dyn Reader>> {
            Ok(Arc::new(FakeReader))
        }
    }

    struct FakeWritePlugin;
    impl WritePlugin for FakeWritePlugin {
        fn extensions(&self) -> &'static [&'static str] {
            &["fake"]
        }
        fn create(&self, _path: &Path, _info: &playback_core::media_info::MediaInfo, _options: &Options) -> EngineResult<Box<dyn Writer>> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn fake_registry() -> Arc<IORegistry> {
        let mut registry = IORegistry::new();
        registry.register_read_plugin(Box::new(FakeReadPlugin));
        registry.register_write_plugin(Box::new(FakeWritePlugin));
        Arc::new(registry)
    }

    #[test]
    fn player_creation_fails_for_unresolvable_media() {
        let rate = Rate::new(24, 1);
        let mut timeline = InMemoryTimeline::new(rate);
        let item = Item::Clip {
            name: "missing".into(),
            media: MediaReference { path: stub_path("missing.unknownext"), available_range: None },
            source_range: playback_core::timeline::TimeRangeFlat::from_range(&TimeRange::new(RationalTime::zero(rate), RationalTime::new(24.0, rate))),
        };
        timeline.video_tracks.push(Track { kind: TrackKind::Video, name: "V1".into(), layer: 0, items: vec![item] });
        let io = fake_registry();
        let result = Player::new(Arc::new(timeline), io, CacheOptions::default(), PlayerOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn player_ticks_and_caches_frames_near_the_playhead() {
        let timeline = stub_timeline();
        let io = fake_registry();
        let player = Player::new(timeline, io, CacheOptions::default(), PlayerOptions::default()).unwrap();
        player.set_playback(Playback::Forward);
        std::thread::sleep(Duration::from_millis(60));
        let info = player.observables().cache_info.get();
        assert!(info.video_frames_cached > 0);
    }

    #[test]
    fn seeking_updates_the_current_time_observable() {
        let timeline = stub_timeline();
        let io = fake_registry();
        let player = Player::new(timeline, io, CacheOptions::default(), PlayerOptions::default()).unwrap();
        let target = RationalTime::new(10.0, Rate::new(24, 1));
        player.seek(target);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(player.observables().current_time.get().value, 10.0);
    }
}
