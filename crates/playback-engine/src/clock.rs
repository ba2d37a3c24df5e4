// crates/playback-engine/src/clock.rs
//
// Abstract time source (§4.H). `AudioClock` is driven by a frames-consumed
// counter the mixer updates after each `mix()` call rather than talking to
// a real device — device I/O is an external consumer, same boundary the
// teacher draws around `MediaWorker` (it never opens an audio device
// itself either, `audio.rs` only ever writes a WAV to disk for something
// else to play).

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use playback_core::time::{Rate, RationalTime};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> RationalTime;
    fn reset(&self, anchor: RationalTime);
    fn set_direction(&self, direction: Direction);
    /// Scale how fast `now()` advances relative to real time. `1.0` is
    /// normal speed; the device-format resample a non-1.0 speed implies in
    /// a real audio path is outside this crate (§1 Non-goals) — this only
    /// affects the reported time, which is all the tick loop consumes.
    fn set_speed(&self, speed: f64);
    fn freeze(&self);
    fn unfreeze(&self);
}

/// Monotonic steady-clock-derived time. Seeking resets the zero point so
/// `now()` keeps advancing from the new anchor rather than jumping.
pub struct WallClock {
    rate: Rate,
    started_at: std::sync::Mutex<Instant>,
    anchor_value: AtomicI64, // RationalTime.value at the frame's rate, fixed-point *1000
    direction: std::sync::Mutex<Direction>,
    speed: std::sync::Mutex<f64>,
    frozen: std::sync::Mutex<Option<RationalTime>>,
}

impl WallClock {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            started_at: std::sync::Mutex::new(Instant::now()),
            anchor_value: AtomicI64::new(0),
            direction: std::sync::Mutex::new(Direction::Forward),
            speed: std::sync::Mutex::new(1.0),
            frozen: std::sync::Mutex::new(Some(RationalTime::zero(rate))),
        }
    }
}

impl Clock for WallClock {
    fn now(&self) -> RationalTime {
        if let Some(frozen) = *self.frozen.lock().unwrap() {
            return frozen;
        }
        let elapsed = self.started_at.lock().unwrap().elapsed().as_secs_f64() * *self.speed.lock().unwrap();
        let anchor = self.anchor_value.load(Ordering::Relaxed) as f64 / 1000.0;
        let signed_elapsed = match *self.direction.lock().unwrap() {
            Direction::Forward => elapsed,
            Direction::Reverse => -elapsed,
        };
        RationalTime::from_seconds(anchor + signed_elapsed, self.rate)
    }

    fn reset(&self, anchor: RationalTime) {
        *self.started_at.lock().unwrap() = Instant::now();
        self.anchor_value.store((anchor.to_seconds() * 1000.0).round() as i64, Ordering::Relaxed);
        *self.frozen.lock().unwrap() = None;
    }

    fn set_direction(&self, direction: Direction) {
        // Re-anchor at the current value before flipping so direction
        // changes never cause a jump.
        let current = self.now();
        *self.direction.lock().unwrap() = direction;
        self.reset(current);
    }

    fn set_speed(&self, speed: f64) {
        let current = self.now();
        *self.speed.lock().unwrap() = speed;
        self.reset(current);
    }

    fn freeze(&self) {
        let current = self.now();
        *self.frozen.lock().unwrap() = Some(current);
    }

    fn unfreeze(&self) {
        let value = self.frozen.lock().unwrap().take();
        if let Some(v) = value {
            self.reset(v);
        }
    }
}

/// `startTime + framesConsumed / sampleRate`. The mixer calls
/// `add_frames_consumed` after every `mix()`; a brief mute period does not
/// reset this, since suppression is reported separately (§4.H).
pub struct AudioClock {
    rate: Rate,
    sample_rate: u32,
    start_seconds: std::sync::Mutex<f64>,
    frames_consumed: AtomicU64,
    direction: std::sync::Mutex<Direction>,
    speed: std::sync::Mutex<f64>,
    frozen: std::sync::Mutex<bool>,
}

impl AudioClock {
    pub fn new(rate: Rate, sample_rate: u32) -> Self {
        Self {
            rate,
            sample_rate: sample_rate.max(1),
            start_seconds: std::sync::Mutex::new(0.0),
            frames_consumed: AtomicU64::new(0),
            direction: std::sync::Mutex::new(Direction::Forward),
            speed: std::sync::Mutex::new(1.0),
            frozen: std::sync::Mutex::new(false),
        }
    }

    pub fn add_frames_consumed(&self, frames: u64) {
        self.frames_consumed.fetch_add(frames, Ordering::Relaxed);
    }
}

impl Clock for AudioClock {
    fn now(&self) -> RationalTime {
        let consumed = self.frames_consumed.load(Ordering::Relaxed) as f64;
        let offset = consumed / self.sample_rate as f64 * *self.speed.lock().unwrap();
        let signed_offset = match *self.direction.lock().unwrap() {
            Direction::Forward => offset,
            Direction::Reverse => -offset,
        };
        RationalTime::from_seconds(*self.start_seconds.lock().unwrap() + signed_offset, self.rate)
    }

    fn reset(&self, anchor: RationalTime) {
        *self.start_seconds.lock().unwrap() = anchor.to_seconds();
        self.frames_consumed.store(0, Ordering::Relaxed);
    }

    fn set_direction(&self, direction: Direction) {
        let current = self.now();
        *self.direction.lock().unwrap() = direction;
        self.reset(current);
    }

    fn set_speed(&self, speed: f64) {
        let current = self.now();
        *self.speed.lock().unwrap() = speed;
        self.reset(current);
    }

    fn freeze(&self) {
        *self.frozen.lock().unwrap() = true;
    }

    fn unfreeze(&self) {
        *self.frozen.lock().unwrap() = false;
    }
}

/// Degrades transparently to `WallClock` when the audio device fails
/// (§4.I.f). Holds both clocks; `now()`/`reset()`/etc. route to whichever
/// is currently live. The switch is one-shot and logged once.
pub struct Hybrid {
    audio: std::sync::Arc<AudioClock>,
    wall: WallClock,
    degraded: std::sync::atomic::AtomicBool,
}

impl Hybrid {
    pub fn new(rate: Rate, sample_rate: u32) -> Self {
        Self {
            audio: std::sync::Arc::new(AudioClock::new(rate, sample_rate)),
            wall: WallClock::new(rate),
            degraded: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Shared with the `AudioMixer`, which drives `add_frames_consumed` from
    /// the device thread — this must be the same instance `now()` reads.
    pub fn audio_clock(&self) -> std::sync::Arc<AudioClock> {
        self.audio.clone()
    }

    /// Downgrade to WallClock after an audio device failure. Best-effort:
    /// safe to call more than once, only the first call logs.
    pub fn degrade_to_wall_clock(&self) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            eprintln!("[clock] audio device failed — downgrading to WallClock");
            self.wall.reset(self.audio.now());
        }
    }

    fn active(&self) -> &dyn Clock {
        if self.degraded.load(Ordering::SeqCst) {
            &self.wall
        } else {
            self.audio.as_ref()
        }
    }
}

impl Clock for Hybrid {
    fn now(&self) -> RationalTime {
        self.active().now()
    }

    fn reset(&self, anchor: RationalTime) {
        self.audio.reset(anchor);
        self.wall.reset(anchor);
    }

    fn set_direction(&self, direction: Direction) {
        self.audio.set_direction(direction);
        self.wall.set_direction(direction);
    }

    fn set_speed(&self, speed: f64) {
        self.audio.set_speed(speed);
        self.wall.set_speed(speed);
    }

    fn freeze(&self) {
        self.active().freeze();
    }

    fn unfreeze(&self) {
        self.active().unfreeze();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_advances_monotonically_while_unfrozen() {
        let clock = WallClock::new(Rate::new(24, 1));
        clock.reset(RationalTime::zero(Rate::new(24, 1)));
        let a = clock.now().to_seconds();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let b = clock.now().to_seconds();
        assert!(b >= a);
    }

    #[test]
    fn wall_clock_freezes_and_resumes() {
        let clock = WallClock::new(Rate::new(24, 1));
        clock.reset(RationalTime::zero(Rate::new(24, 1)));
        clock.freeze();
        let frozen_value = clock.now().to_seconds();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(clock.now().to_seconds(), frozen_value);
        clock.unfreeze();
    }

    #[test]
    fn audio_clock_tracks_frames_consumed() {
        let clock = AudioClock::new(Rate::new(24, 1), 48_000);
        clock.reset(RationalTime::zero(Rate::new(24, 1)));
        clock.add_frames_consumed(48_000);
        assert!((clock.now().to_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn audio_clock_mute_does_not_reset_frames_consumed() {
        let clock = AudioClock::new(Rate::new(24, 1), 48_000);
        clock.reset(RationalTime::zero(Rate::new(24, 1)));
        clock.add_frames_consumed(24_000);
        // A mute period still advances frames_consumed — suppression is
        // reported by the mixer separately, not by resetting the clock.
        clock.add_frames_consumed(24_000);
        assert!((clock.now().to_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hybrid_degrades_to_wall_clock_once() {
        let hybrid = Hybrid::new(Rate::new(24, 1), 48_000);
        hybrid.reset(RationalTime::zero(Rate::new(24, 1)));
        hybrid.audio_clock().add_frames_consumed(48_000);
        assert!((hybrid.now().to_seconds() - 1.0).abs() < 1e-9);
        hybrid.degrade_to_wall_clock();
        // Now routed through WallClock, which was reset to the audio
        // clock's last value at the moment of degradation.
        assert!(hybrid.now().to_seconds() >= 1.0);
    }
}
