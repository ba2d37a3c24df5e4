// crates/playback-io/src/traits.rs
//
// The Reader/Writer contract every codec plugin satisfies (spec §4.C). The
// "future" the spec's prose names is modeled with this workspace's own
// concurrency idiom — a worker thread plus a bounded channel — rather than
// `async`/`.await`; nothing in this codebase or its sibling examples pulls
// in an async runtime, so a `ReadHandle<T>` is the aligned choice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use playback_core::media_info::MediaInfo;
use playback_core::time::{RationalTime, TimeRange};
use playback_core::video::VideoData;
use playback_core::{EngineError, EngineResult};

/// A single outstanding async-flavored read. Wraps the receiving half of a
/// one-shot channel together with the cancel flag the issuing Reader
/// watches between decode steps.
pub struct ReadHandle<T> {
    rx: crossbeam_channel::Receiver<EngineResult<T>>,
    cancel: Arc<AtomicBool>,
}

impl<T> ReadHandle<T> {
    pub fn new(rx: crossbeam_channel::Receiver<EngineResult<T>>, cancel: Arc<AtomicBool>) -> Self {
        Self { rx, cancel }
    }

    /// Non-blocking check: `None` means still pending.
    pub fn poll(&self) -> Option<EngineResult<T>> {
        self.rx.try_recv().ok()
    }

    /// Block up to `timeout`; used by seek-frame (§4.I.c, default 100 ms)
    /// and by tests. Missing the timeout is not itself an error — the
    /// caller decides what "still pending" means to it.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<EngineResult<T>> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Best-effort: the reader observes this flag between decode steps and
    /// may still complete (spec §4.C, "best-effort").
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Construct a `(handle, completion sender, cancel flag)` triple for a
/// plugin's worker to fill in. Plugins that decode synchronously on the
/// calling thread can just send immediately; the FFmpeg plugin hands the
/// sender to its decode thread.
pub fn read_handle<T>() -> (ReadHandle<T>, crossbeam_channel::Sender<EngineResult<T>>, Arc<AtomicBool>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let cancel = Arc::new(AtomicBool::new(false));
    (ReadHandle::new(rx, cancel.clone()), tx, cancel)
}

/// One frame of video at a specific time, plus the layer name it was
/// decoded from (a media file may expose several named layers, e.g. an EXR
/// multi-part file; most codecs expose exactly one, `""`).
pub type VideoReadResult = VideoData;

/// One second (by convention, §3) of interleaved PCM at the media's own
/// sample rate.
#[derive(Clone, Debug)]
pub struct AudioData {
    pub sample_offset: i64,
    pub layers: Vec<Arc<Vec<f32>>>,
}

pub trait Reader: Send + Sync {
    /// May do I/O; the result is cached by the caller after first
    /// resolution (spec §4.C).
    fn info(&self) -> ReadHandle<MediaInfo>;

    /// Fails with `NotFound` if `time` is outside the media's video range,
    /// `Decode` on codec error, `Cancelled` if `cancel()` was invoked
    /// before completion.
    fn read_video(&self, time: RationalTime, layer: &str) -> ReadHandle<VideoReadResult>;

    /// `range` must be expressible in the media's audio sample rate.
    fn read_audio(&self, range: TimeRange) -> ReadHandle<AudioData>;

    /// Best-effort; subsequent reads are still permitted afterwards.
    fn cancel(&self);
}

pub trait Writer: Send + Sync {
    fn write_video(&mut self, time: RationalTime, image: &playback_core::video::Image) -> EngineResult<()>;
    fn write_audio(&mut self, range: TimeRange, pcm: &[f32]) -> EngineResult<()>;

    /// Flush any buffered frames and close out the container (muxer trailer,
    /// final directory entries, ...). Single-file formats have nothing to do;
    /// the FFmpeg movie writer overrides this to write the MP4 trailer.
    fn finalize(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

/// A plugin's factory side — what the registry calls to construct a
/// concrete Reader/Writer for a Path it has already matched by extension.
pub trait ReadPlugin: Send + Sync {
    fn extensions(&self) -> &'static [&'static str];
    fn open(&self, path: &playback_core::path::Path, options: &crate::options::Options) -> EngineResult<Arc<dyn Reader>>;
}

pub trait WritePlugin: Send + Sync {
    fn extensions(&self) -> &'static [&'static str];
    fn create(
        &self,
        path: &playback_core::path::Path,
        info: &MediaInfo,
        options: &crate::options::Options,
    ) -> EngineResult<Box<dyn Writer>>;
}

pub(crate) fn open_failed(path: &str, reason: impl Into<String>) -> EngineError {
    EngineError::OpenFailed { path: path.to_string(), reason: reason.into() }
}
