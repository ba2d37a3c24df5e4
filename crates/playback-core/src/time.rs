// crates/playback-core/src/time.rs
//
// Rational time: a frame count plus a rational frame rate, exact unlike a
// floating-point seconds value. Grounded on `tlCore/Time.cpp` — the
// `toRational` snap table, the packed-BCD timecode helpers and the
// keycode join/split are ported line-for-line from there, since the spec
// leaves their exact encoding unspecified and §8 asserts round-trip laws
// on them.
//
// `format_time_frames` / `format_duration_human` follow the teacher's own
// `helpers::time` module style: doc-tested examples instead of a
// `#[cfg(test)]` block, since that is the density the teacher used for
// small pure-formatting functions.

use serde::{Deserialize, Serialize};

/// A rational frame rate, `num / den` frames per second.
///
/// `num == 0` is the invalid sentinel (§3 "Rate `0` marks an invalid
/// sentinel").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub num: i64,
    pub den: i64,
}

impl Rate {
    pub const INVALID: Rate = Rate { num: 0, den: 1 };

    pub fn new(num: i64, den: i64) -> Self {
        debug_assert!(den != 0, "Rate denominator must not be zero");
        Self { num, den }
    }

    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }

    pub fn to_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Snap a floating frame rate to the nearest standard broadcast rate
    /// within a small tolerance, falling back to `(round(value), 1)`.
    ///
    /// Ported from `tl::time::toRational` — a timeline's declared rate is
    /// frequently an approximate float (`23.976`) that really means
    /// `24000/1001`; downstream rational arithmetic needs the exact pair.
    pub fn common_from_f64(value: f64) -> Rate {
        const COMMON: [(i64, i64); 6] = [
            (24, 1),
            (30, 1),
            (60, 1),
            (24000, 1001),
            (30000, 1001),
            (60000, 1001),
        ];
        const TOLERANCE: f64 = 0.01;
        for (num, den) in COMMON {
            let diff = (value - num as f64 / den as f64).abs();
            if diff < TOLERANCE {
                return Rate::new(num, den);
            }
        }
        Rate::new(value.round() as i64, 1)
    }
}

/// A rational time value: `value` frames at `rate`.
///
/// `value` is kept as `f64` (matching OTIO's own `RationalTime`) so it can
/// hold sub-frame results of rescaling and rounding; equality is exact on
/// both fields — no epsilon comparison.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RationalTime {
    pub value: f64,
    pub rate: Rate,
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.rate == other.rate
    }
}

impl RationalTime {
    pub fn new(value: f64, rate: Rate) -> Self {
        Self { value, rate }
    }

    pub fn zero(rate: Rate) -> Self {
        Self { value: 0.0, rate }
    }

    pub fn is_invalid(&self) -> bool {
        !self.rate.is_valid()
    }

    pub fn to_seconds(&self) -> f64 {
        self.value * self.rate.den as f64 / self.rate.num as f64
    }

    pub fn from_seconds(seconds: f64, rate: Rate) -> Self {
        Self {
            value: seconds * rate.num as f64 / rate.den as f64,
            rate,
        }
    }

    /// Convert to an equivalent value at `new_rate`.
    pub fn rescaled_to(&self, new_rate: Rate) -> Self {
        if self.rate == new_rate {
            return *self;
        }
        Self::from_seconds(self.to_seconds(), new_rate)
    }

    /// Add two rational times. Preserves rate when operands share it;
    /// otherwise `other` is rescaled to `self`'s rate first (§3 "arithmetic
    /// preserves rate when operands share it").
    pub fn add(&self, other: &RationalTime) -> RationalTime {
        let rhs = if self.rate == other.rate {
            *other
        } else {
            other.rescaled_to(self.rate)
        };
        RationalTime::new(self.value + rhs.value, self.rate)
    }

    pub fn sub(&self, other: &RationalTime) -> RationalTime {
        let rhs = if self.rate == other.rate {
            *other
        } else {
            other.rescaled_to(self.rate)
        };
        RationalTime::new(self.value - rhs.value, self.rate)
    }

    pub fn cmp_seconds(&self, other: &RationalTime) -> std::cmp::Ordering {
        self.to_seconds()
            .partial_cmp(&other.to_seconds())
            .unwrap_or(std::cmp::Ordering::Equal)
    }
}

pub fn round(t: RationalTime) -> RationalTime {
    RationalTime::new(t.value.round(), t.rate)
}

pub fn floor(t: RationalTime) -> RationalTime {
    RationalTime::new(t.value.floor(), t.rate)
}

pub fn ceil(t: RationalTime) -> RationalTime {
    RationalTime::new(t.value.ceil(), t.rate)
}

/// Either `[start, start+duration)` or a closed inclusive pair,
/// convertible between forms (§3).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// Build from a start time and an *inclusive* end time (the form a
    /// closed pair arrives in).
    pub fn from_start_end_inclusive(start: RationalTime, end_inclusive: RationalTime) -> Self {
        let one_frame = RationalTime::new(1.0, start.rate);
        let duration = end_inclusive.sub(&start).add(&one_frame);
        Self { start, duration }
    }

    pub fn end_time_exclusive(&self) -> RationalTime {
        self.start.add(&self.duration)
    }

    pub fn end_time_inclusive(&self) -> RationalTime {
        let one_frame = RationalTime::new(1.0, self.start.rate);
        self.end_time_exclusive().sub(&one_frame)
    }

    pub fn contains(&self, t: RationalTime) -> bool {
        let secs = t.to_seconds();
        secs >= self.start.to_seconds() && secs < self.end_time_exclusive().to_seconds()
    }

    pub fn clamp(&self, t: RationalTime) -> RationalTime {
        let secs = t.to_seconds();
        if secs < self.start.to_seconds() {
            self.start
        } else if secs >= self.end_time_exclusive().to_seconds() {
            // Nudge inside by one frame so the clamped value is still "in range".
            let one_frame = RationalTime::new(1.0, self.start.rate);
            self.end_time_exclusive().sub(&one_frame)
        } else {
            t
        }
    }
}

// ── Broadcast timecode ───────────────────────────────────────────────────────
//
// Packed BCD exactly as `tl::time::timeToTimecode`/`timecodeToTime`.

pub fn time_to_timecode(hour: u32, minute: u32, seconds: u32, frame: u32) -> u32 {
    (hour / 10 & 0x0f) << 28
        | (hour % 10 & 0x0f) << 24
        | (minute / 10 & 0x0f) << 20
        | (minute % 10 & 0x0f) << 16
        | (seconds / 10 & 0x0f) << 12
        | (seconds % 10 & 0x0f) << 8
        | (frame / 10 & 0x0f) << 4
        | (frame % 10 & 0x0f)
}

pub fn timecode_to_time(packed: u32) -> (u32, u32, u32, u32) {
    let hour = (packed >> 28 & 0x0f) * 10 + (packed >> 24 & 0x0f);
    let minute = (packed >> 20 & 0x0f) * 10 + (packed >> 16 & 0x0f);
    let seconds = (packed >> 12 & 0x0f) * 10 + (packed >> 8 & 0x0f);
    let frame = (packed >> 4 & 0x0f) * 10 + (packed & 0x0f);
    (hour, minute, seconds, frame)
}

pub fn timecode_to_string(packed: u32) -> String {
    let (h, m, s, f) = timecode_to_time(packed);
    format!("{h:02}:{m:02}:{s:02}:{f:02}")
}

pub fn string_to_timecode(s: &str) -> Option<u32> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 4 {
        return None;
    }
    let h: u32 = parts[0].parse().ok()?;
    let m: u32 = parts[1].parse().ok()?;
    let sec: u32 = parts[2].parse().ok()?;
    let f: u32 = parts[3].parse().ok()?;
    Some(time_to_timecode(h, m, sec, f))
}

// ── Keycode ───────────────────────────────────────────────────────────────────

pub fn keycode_to_string(id: i32, kind: i32, prefix: i32, count: i32, offset: i32) -> String {
    [id, kind, prefix, count, offset]
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(":")
}

pub fn parse_keycode(s: &str) -> Option<(i32, i32, i32, i32, i32)> {
    let pieces: Vec<&str> = s.split(':').collect();
    if pieces.len() != 5 {
        return None;
    }
    let vals: Option<Vec<i32>> = pieces.iter().map(|p| p.parse().ok()).collect();
    let v = vals?;
    Some((v[0], v[1], v[2], v[3], v[4]))
}

// ── Human-readable formatting ─────────────────────────────────────────────────

/// Format a duration in seconds as `MM:SS:FF` at `rate` frames per second.
///
/// ```
/// use playback_core::time::{format_time_frames, Rate};
/// assert_eq!(format_time_frames(0.0, Rate::new(30, 1)), "00:00:00");
/// assert_eq!(format_time_frames(61.5, Rate::new(30, 1)), "01:01:15");
/// ```
pub fn format_time_frames(seconds: f64, rate: Rate) -> String {
    let fps = rate.to_f64().max(1.0);
    let m = (seconds / 60.0) as u32;
    let s = (seconds % 60.0) as u32;
    let f = ((seconds * fps) as u32) % fps.round() as u32;
    format!("{m:02}:{s:02}:{f:02}")
}

/// Compact human-readable duration, independent of frame rate.
///
/// ```
/// use playback_core::time::format_duration_human;
/// assert_eq!(format_duration_human(4.2), "4.2s");
/// assert_eq!(format_duration_human(187.0), "3:07");
/// ```
pub fn format_duration_human(secs: f64) -> String {
    if secs >= 3600.0 {
        format!(
            "{}:{:02}:{:02}",
            secs as u64 / 3600,
            (secs as u64 % 3600) / 60,
            secs as u64 % 60,
        )
    } else if secs >= 60.0 {
        format!("{}:{:02}", secs as u64 / 60, secs as u64 % 60)
    } else {
        format!("{secs:.1}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_common_snap() {
        assert_eq!(Rate::common_from_f64(23.976), Rate::new(24000, 1001));
        assert_eq!(Rate::common_from_f64(30.0), Rate::new(30, 1));
        assert_eq!(Rate::common_from_f64(12.0), Rate::new(12, 1));
    }

    #[test]
    fn rational_time_equality_is_exact_on_both_fields() {
        let a = RationalTime::new(10.0, Rate::new(24, 1));
        let b = RationalTime::new(10.0, Rate::new(24, 1));
        let c = RationalTime::new(10.0, Rate::new(25, 1));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn add_preserves_shared_rate() {
        let rate = Rate::new(24, 1);
        let a = RationalTime::new(10.0, rate);
        let b = RationalTime::new(5.0, rate);
        let sum = a.add(&b);
        assert_eq!(sum.value, 15.0);
        assert_eq!(sum.rate, rate);
    }

    #[test]
    fn rescale_round_trip_seconds() {
        let a = RationalTime::new(48.0, Rate::new(24, 1));
        let b = a.rescaled_to(Rate::new(30, 1));
        assert!((b.to_seconds() - a.to_seconds()).abs() < 1e-9);
        assert_eq!(b.value, 60.0);
    }

    #[test]
    fn time_range_end_exclusive_inclusive_round_trip() {
        let rate = Rate::new(24, 1);
        let start = RationalTime::new(0.0, rate);
        let r = TimeRange::new(start, RationalTime::new(24.0, rate));
        let rebuilt = TimeRange::from_start_end_inclusive(start, r.end_time_inclusive());
        assert_eq!(rebuilt.duration.value, r.duration.value);
    }

    #[test]
    fn round_floor_ceil() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(10.6, rate);
        assert_eq!(round(t).value, 11.0);
        assert_eq!(floor(t).value, 10.0);
        assert_eq!(ceil(t).value, 11.0);
    }

    #[test]
    fn timecode_round_trip() {
        for (h, m, s, f) in [(0, 0, 0, 0), (1, 2, 3, 4), (23, 59, 59, 29)] {
            let packed = time_to_timecode(h, m, s, f);
            assert_eq!(timecode_to_time(packed), (h, m, s, f));
            let text = timecode_to_string(packed);
            assert_eq!(string_to_timecode(&text), Some(packed));
        }
    }

    #[test]
    fn keycode_round_trip() {
        for s in ["1:2:3:4:5", "0:0:0:0:0", "-1:2:-3:4:5"] {
            let parsed = parse_keycode(s).unwrap();
            assert_eq!(keycode_to_string(parsed.0, parsed.1, parsed.2, parsed.3, parsed.4), s);
        }
    }
}
