// crates/playback-engine/src/player/state_machine.rs
//
// Playback direction/loop state (§4.I.a). Pure functions over
// `RationalTime` so the tick loop (`player/mod.rs`) can unit test the loop
// policy without spinning up threads.

use playback_core::time::{RationalTime, TimeRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    Stop,
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

/// Result of applying the loop policy to a time that advanced past
/// `in_out_range`'s bounds this tick.
pub struct LoopOutcome {
    pub time: RationalTime,
    pub playback: Playback,
}

/// Apply `mode`'s crossing behavior. `advanced` is the playhead after this
/// tick's raw advance, which may already sit outside `range`.
///
/// `PingPong` flips direction on the very tick that detects the crossing
/// and applies the overshoot in the new direction in that same tick,
/// rather than flipping on the following tick — picked because the
/// alternative (flip-next-tick) visibly pauses at the boundary for one
/// tick at high speeds, which reads as a stutter rather than a bounce.
pub fn apply_loop(mode: LoopMode, range: TimeRange, advanced: RationalTime, playback: Playback) -> LoopOutcome {
    let lo = range.start.to_seconds();
    let hi = range.end_time_inclusive().to_seconds();
    let t = advanced.to_seconds();

    if t >= lo && t <= hi {
        return LoopOutcome { time: advanced, playback };
    }

    match mode {
        LoopMode::Once => {
            let clamped = if t > hi { range.end_time_inclusive() } else { range.start };
            LoopOutcome { time: clamped, playback: Playback::Stop }
        }
        LoopMode::Loop => {
            let span = (hi - lo).max(1e-9);
            let wrapped = if t > hi {
                lo + (t - hi - 1.0 / advanced.rate.to_f64().max(1.0)).rem_euclid(span)
            } else {
                hi - (lo - t - 1.0 / advanced.rate.to_f64().max(1.0)).rem_euclid(span)
            };
            LoopOutcome { time: RationalTime::from_seconds(wrapped, advanced.rate), playback }
        }
        LoopMode::PingPong => {
            let overshoot = if t > hi { t - hi } else { lo - t };
            let bounced_secs = if t > hi { hi - overshoot } else { lo + overshoot };
            let flipped = match playback {
                Playback::Forward => Playback::Reverse,
                Playback::Reverse => Playback::Forward,
                Playback::Stop => Playback::Stop,
            };
            LoopOutcome { time: RationalTime::from_seconds(bounced_secs.clamp(lo, hi), advanced.rate), playback: flipped }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::time::Rate;

    fn range() -> TimeRange {
        let rate = Rate::new(24, 1);
        TimeRange::new(RationalTime::zero(rate), RationalTime::new(24.0, rate))
    }

    #[test]
    fn in_range_time_passes_through_unchanged() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(10.0, rate);
        let outcome = apply_loop(LoopMode::Once, range(), t, Playback::Forward);
        assert_eq!(outcome.time.value, 10.0);
        assert_eq!(outcome.playback, Playback::Forward);
    }

    #[test]
    fn once_stops_at_the_boundary_it_crossed() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(30.0, rate);
        let outcome = apply_loop(LoopMode::Once, range(), t, Playback::Forward);
        assert_eq!(outcome.playback, Playback::Stop);
    }

    #[test]
    fn loop_wraps_overshoot_back_into_the_range() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(26.0, rate); // 2 frames past the 24-frame end
        let outcome = apply_loop(LoopMode::Loop, range(), t, Playback::Forward);
        assert_eq!(outcome.playback, Playback::Forward);
        assert!(outcome.time.to_seconds() < range().end_time_inclusive().to_seconds());
    }

    #[test]
    fn ping_pong_flips_direction_on_the_crossing_tick() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(26.0, rate);
        let outcome = apply_loop(LoopMode::PingPong, range(), t, Playback::Forward);
        assert_eq!(outcome.playback, Playback::Reverse);
        // Overshoot applied in the new direction this same tick, not clamped to the edge.
        assert!(outcome.time.to_seconds() < range().end_time_inclusive().to_seconds());
    }

    #[test]
    fn ping_pong_flips_at_the_in_point_too() {
        let rate = Rate::new(24, 1);
        let t = RationalTime::new(-2.0, rate);
        let outcome = apply_loop(LoopMode::PingPong, range(), t, Playback::Reverse);
        assert_eq!(outcome.playback, Playback::Forward);
    }
}
