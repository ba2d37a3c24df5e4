// crates/playback-engine/src/cache.rs
//
// One mutex guarding two ordered maps, byte-cost tracked alongside each
// entry. Grounded on the teacher's own "one mutex, short critical section"
// habit (MediaWorker's frame_req slot, encode_cancels map) generalized to
// an actual bounded cache rather than a single latest-wins slot.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use playback_core::time::RationalTime;
use playback_core::video::VideoData;

use crate::audio_mixer::AudioEntry;

const GIB: u64 = 1 << 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct TimeKey {
    // Bits of an f64 don't implement Ord; store the value pre-rounded to an
    // integer tick count so the map orders correctly and equal times collide
    // on the same key regardless of tiny float noise.
    ticks: i64,
    rate_num: i64,
    rate_den: i64,
}

impl TimeKey {
    fn new(t: RationalTime) -> Self {
        Self { ticks: t.value.round() as i64, rate_num: t.rate.num, rate_den: t.rate.den }
    }
}

pub struct VideoEntry {
    pub data: VideoData,
    pub byte_cost: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheDirection {
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CacheOptions {
    pub read_ahead_seconds: f64,
    pub read_behind_seconds: f64,
    pub max_bytes: u64,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { read_ahead_seconds: 4.0, read_behind_seconds: 0.5, max_bytes: 4 * GIB }
    }
}

struct Inner {
    video_by_time: BTreeMap<TimeKey, (RationalTime, VideoEntry)>,
    audio_by_second: BTreeMap<i64, AudioEntry>,
    failed_video: BTreeSet<TimeKey>,
    video_bytes: u64,
    audio_bytes: u64,
    /// The Player's playhead, as of the last `set_current` call. Eviction
    /// distance (§4.F) is measured from here, not from whatever frame a
    /// `put_video` happens to be inserting.
    current: f64,
    direction: CacheDirection,
}

/// `playback-engine`'s own cache: video keyed by rational frame time, audio
/// keyed by integer second (§4.F, §4.G). Short critical sections only — no
/// I/O ever runs while the mutex is held.
pub struct Cache {
    inner: Mutex<Inner>,
    options: Mutex<CacheOptions>,
}

impl Cache {
    pub fn new(options: CacheOptions) -> Self {
        Self {
            inner: Mutex::new(Inner {
                video_by_time: BTreeMap::new(),
                audio_by_second: BTreeMap::new(),
                failed_video: BTreeSet::new(),
                video_bytes: 0,
                audio_bytes: 0,
                current: 0.0,
                direction: CacheDirection::Forward,
            }),
            options: Mutex::new(options),
        }
    }

    pub fn options(&self) -> CacheOptions {
        *self.options.lock().unwrap()
    }

    /// Applied immediately; a shrunk `max_bytes` triggers eviction on the
    /// next `put_video` rather than retroactively (§4.I, `setCacheOptions`).
    pub fn set_options(&self, options: CacheOptions) {
        *self.options.lock().unwrap() = options;
    }

    /// Called once per tick (§4.I.b step 3) before any `put_video` so
    /// eviction distance is measured from the live playhead.
    pub fn set_current(&self, t: RationalTime, direction: CacheDirection) {
        let mut inner = self.inner.lock().unwrap();
        inner.current = t.to_seconds();
        inner.direction = direction;
    }

    pub fn get_video(&self, t: RationalTime) -> Option<VideoData> {
        let inner = self.inner.lock().unwrap();
        inner.video_by_time.get(&TimeKey::new(t)).map(|(_, e)| e.data.clone())
    }

    pub fn contains_video(&self, t: RationalTime) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.video_by_time.contains_key(&TimeKey::new(t))
    }

    /// True if `t` previously failed to decode and is still inside the
    /// window it failed in (§4.I.f "failed, do not retry while in-window").
    /// Cleared by `forget_failure` once `t'` leaves and returns.
    pub fn is_marked_failed(&self, t: RationalTime) -> bool {
        self.inner.lock().unwrap().failed_video.contains(&TimeKey::new(t))
    }

    pub fn mark_failed(&self, t: RationalTime) {
        self.inner.lock().unwrap().failed_video.insert(TimeKey::new(t));
    }

    pub fn forget_failure(&self, t: RationalTime) {
        self.inner.lock().unwrap().failed_video.remove(&TimeKey::new(t));
    }

    pub fn put_video(&self, t: RationalTime, data: VideoData) {
        let byte_cost = data.byte_cost();
        let mut inner = self.inner.lock().unwrap();
        let key = TimeKey::new(t);
        if let Some((_, old)) = inner.video_by_time.remove(&key) {
            inner.video_bytes -= old.byte_cost;
        }
        inner.video_bytes += byte_cost;
        inner.video_by_time.insert(key, (t, VideoEntry { data, byte_cost }));
        inner.failed_video.remove(&key);
        let max_bytes = self.options.lock().unwrap().max_bytes;
        evict_video(&mut inner, max_bytes);
    }

    pub fn put_audio(&self, second: i64, entry: AudioEntry) {
        let mut inner = self.inner.lock().unwrap();
        let cost = entry.byte_cost;
        if let Some(old) = inner.audio_by_second.insert(second, entry) {
            inner.audio_bytes -= old.byte_cost;
        }
        inner.audio_bytes += cost;
    }

    pub fn get_audio(&self, second: i64) -> Option<AudioEntry> {
        self.inner.lock().unwrap().audio_by_second.get(&second).cloned()
    }

    /// Drop every cached entry whose time falls outside `[lo, hi]` seconds.
    pub fn remove_outside(&self, lo_secs: f64, hi_secs: f64) {
        let mut inner = self.inner.lock().unwrap();
        let stale: Vec<TimeKey> = inner
            .video_by_time
            .iter()
            .filter(|(_, (t, _))| {
                let s = t.to_seconds();
                s < lo_secs || s > hi_secs
            })
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if let Some((_, e)) = inner.video_by_time.remove(&key) {
                inner.video_bytes -= e.byte_cost;
            }
        }
        let stale_secs: Vec<i64> = inner
            .audio_by_second
            .keys()
            .copied()
            .filter(|&s| (s as f64) < lo_secs || (s as f64) > hi_secs)
            .collect();
        for s in stale_secs {
            if let Some(e) = inner.audio_by_second.remove(&s) {
                inner.audio_bytes -= e.byte_cost;
            }
        }
    }

    pub fn byte_total(&self) -> u64 {
        let inner = self.inner.lock().unwrap();
        inner.video_bytes + inner.audio_bytes
    }

    pub fn video_count(&self) -> usize {
        self.inner.lock().unwrap().video_by_time.len()
    }

    pub fn audio_count(&self) -> usize {
        self.inner.lock().unwrap().audio_by_second.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.video_by_time.clear();
        inner.audio_by_second.clear();
        inner.failed_video.clear();
        inner.video_bytes = 0;
        inner.audio_bytes = 0;
    }
}

/// Evict video entries until `video_bytes + audio_bytes <= max_bytes`,
/// following §4.F's priority: entries outside the read-ahead window around
/// `current` first, then entries furthest from `current` in the direction
/// opposite `direction` (forward playback evicts older frames, reverse
/// evicts newer), ties broken by lowest byte cost first.
///
/// The "window" here is deliberately the *current* time alone — callers
/// that want window-aware eviction call `remove_outside` first; this
/// function's job is purely the size-budget shrink described by the policy,
/// which only needs a total ordering by (outside-ness, distance, cost).
fn evict_video(inner: &mut Inner, max_bytes: u64) {
    let now_secs = inner.current;
    let direction = inner.direction;
    while inner.video_bytes + inner.audio_bytes > max_bytes {
        let victim = inner
            .video_by_time
            .iter()
            .map(|(k, (t, e))| {
                let secs = t.to_seconds();
                let signed_distance = match direction {
                    CacheDirection::Forward => now_secs - secs, // prefer evicting older (secs < now)
                    CacheDirection::Reverse => secs - now_secs, // prefer evicting newer (secs > now)
                };
                (*k, signed_distance, e.byte_cost)
            })
            .max_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.2.cmp(&b.2).reverse()) // tie: lower cost evicted first
            });

        match victim {
            Some((key, _, _)) => {
                if let Some((_, e)) = inner.video_by_time.remove(&key) {
                    inner.video_bytes -= e.byte_cost;
                }
            }
            None => break, // nothing left to evict, budget still exceeded by audio alone
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::time::Rate;
    use playback_core::video::{Image, VideoLayer};

    fn frame(secs: f64, bytes: usize) -> VideoData {
        let rate = Rate::new(24, 1);
        VideoData {
            time: RationalTime::new(secs * 24.0, rate),
            layers: vec![VideoLayer { image: Image::new_rgba8(1, 1, vec![0u8; bytes]), transform: Default::default() }],
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = Cache::new(CacheOptions::default());
        let t = RationalTime::new(10.0, Rate::new(24, 1));
        cache.put_video(t, frame(10.0 / 24.0, 16));
        assert!(cache.contains_video(t));
        assert!(cache.get_video(t).is_some());
    }

    #[test]
    fn forward_eviction_removes_older_frame_first() {
        let cache = Cache::new(CacheOptions { max_bytes: 20, ..Default::default() });
        let rate = Rate::new(1, 1);
        let old = RationalTime::new(0.0, rate);
        let current = RationalTime::new(10.0, rate);
        cache.set_current(current, CacheDirection::Forward);
        cache.put_video(old, frame(0.0, 16));
        // Inserting the current frame pushes total bytes over budget — the
        // older-than-current entry must be evicted, not the one we just put.
        cache.put_video(current, frame(10.0, 16));
        assert!(!cache.contains_video(old));
        assert!(cache.contains_video(current));
    }

    #[test]
    fn reverse_eviction_removes_newer_frame_first() {
        let cache = Cache::new(CacheOptions { max_bytes: 20, ..Default::default() });
        let rate = Rate::new(1, 1);
        let newer = RationalTime::new(10.0, rate);
        let current = RationalTime::new(0.0, rate);
        cache.set_current(current, CacheDirection::Reverse);
        cache.put_video(newer, frame(10.0, 16));
        cache.put_video(current, frame(0.0, 16));
        assert!(!cache.contains_video(newer));
        assert!(cache.contains_video(current));
    }

    #[test]
    fn remove_outside_drops_entries_past_the_window() {
        let cache = Cache::new(CacheOptions::default());
        let rate = Rate::new(1, 1);
        cache.put_video(RationalTime::new(0.0, rate), frame(0.0, 8));
        cache.put_video(RationalTime::new(100.0, rate), frame(100.0, 8));
        cache.remove_outside(-1.0, 5.0);
        assert!(cache.contains_video(RationalTime::new(0.0, rate)));
        assert!(!cache.contains_video(RationalTime::new(100.0, rate)));
    }

    #[test]
    fn failed_marker_is_set_and_cleared() {
        let cache = Cache::new(CacheOptions::default());
        let t = RationalTime::new(5.0, Rate::new(24, 1));
        cache.mark_failed(t);
        assert!(cache.is_marked_failed(t));
        cache.forget_failure(t);
        assert!(!cache.is_marked_failed(t));
    }
}
