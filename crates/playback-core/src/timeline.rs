// crates/playback-core/src/timeline.rs
//
// The read-only query surface the Player needs: duration, global start,
// per-track kind, and the two point queries (videoAt / audioIn). Stored as
// a flat arena of tracks of items rather than a parent-pointing tree — a
// read-only view never needs to walk upward (Design Notes, "Timeline
// cyclic references"). Mutation (insert/move) is out of scope.

use serde::{Deserialize, Serialize};

use crate::path::Path;
use crate::time::{Rate, RationalTime, TimeRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    Video,
    Audio,
}

/// A reference to a span of some external media, local to a clip's own
/// range within that media.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaReference {
    pub path: Path,
    pub available_range: Option<TimeRangeFlat>,
}

/// Flattened `TimeRange` for serde — see `media_info::TimeRangeInfo` for why
/// the rational type itself isn't derived Serialize/Deserialize directly
/// wired through arithmetic methods.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeFlat {
    pub start_value: f64,
    pub duration_value: f64,
    pub rate_num: i64,
    pub rate_den: i64,
}

impl TimeRangeFlat {
    pub fn from_range(r: &TimeRange) -> Self {
        Self {
            start_value: r.start.value,
            duration_value: r.duration.value,
            rate_num: r.start.rate.num,
            rate_den: r.start.rate.den,
        }
    }

    pub fn to_range(&self) -> TimeRange {
        let rate = Rate::new(self.rate_num, self.rate_den);
        TimeRange::new(
            RationalTime::new(self.start_value, rate),
            RationalTime::new(self.duration_value, rate),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Clip {
        name: String,
        media: MediaReference,
        /// The clip's own duration on the track, in track-rate units.
        source_range: TimeRangeFlat,
    },
    Gap {
        source_range: TimeRangeFlat,
    },
    Transition {
        name: String,
        in_offset: f64,
        out_offset: f64,
    },
}

impl Item {
    pub fn duration(&self) -> RationalTime {
        match self {
            Item::Clip { source_range, .. } | Item::Gap { source_range } => {
                source_range.to_range().duration
            }
            Item::Transition { .. } => RationalTime::zero(Rate::INVALID),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Track {
    pub kind: TrackKind,
    pub name: String,
    /// Stacking layer index; clips on higher-index video tracks are drawn
    /// on top / considered additional compare layers (§4.E "usually 1;
    /// more when the timeline defines layer stacks").
    pub layer: usize,
    pub items: Vec<Item>,
}

impl Track {
    pub fn duration(&self, rate: Rate) -> RationalTime {
        self.items
            .iter()
            .fold(RationalTime::zero(rate), |acc, item| acc.add(&item.duration()))
    }

    /// `(item_index, local_offset_into_item)` for the item active at `t`
    /// relative to the track's own start, or `None` if `t` falls past the
    /// end or onto a transition (transitions are resolved by the caller
    /// together with their neighbors).
    fn item_at(&self, t: RationalTime) -> Option<(usize, RationalTime)> {
        let mut cursor = RationalTime::zero(t.rate);
        for (idx, item) in self.items.iter().enumerate() {
            let dur = item.duration().rescaled_to(t.rate);
            let next = cursor.add(&dur);
            if t.cmp_seconds(&cursor) != std::cmp::Ordering::Less
                && t.cmp_seconds(&next) == std::cmp::Ordering::Less
            {
                return Some((idx, t.sub(&cursor)));
            }
            cursor = next;
        }
        None
    }
}

/// One resolved hit from `Timeline::video_at`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoHit {
    pub media: Path,
    pub clip_local_time: RationalTime,
    pub layer: usize,
}

/// One resolved hit from `Timeline::audio_in`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioHit {
    pub media: Path,
    pub clip_local_range: TimeRange,
}

pub trait Timeline: Send + Sync {
    fn duration(&self) -> RationalTime;
    fn global_start_time(&self) -> RationalTime;
    fn rate(&self) -> Rate;
    fn video_tracks(&self) -> &[Track];
    fn audio_tracks(&self) -> &[Track];
    fn video_at(&self, t: RationalTime) -> Vec<VideoHit>;
    fn audio_in(&self, range: TimeRange) -> Vec<AudioHit>;
}

/// A fully resolved, in-memory timeline — the only `Timeline` implementation
/// this crate ships (the OTIO-JSON parser that produces one is out of
/// scope; tests build this directly).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InMemoryTimeline {
    pub rate: Rate,
    /// Defaults to zero but is carried as a field so a broadcast master
    /// starting at a non-zero timecode round-trips (spec §3 doesn't name
    /// this default explicitly; carried over from `tlTimeline`'s
    /// `globalStartTime`).
    pub global_start_time: RationalTime,
    pub video_tracks: Vec<Track>,
    pub audio_tracks: Vec<Track>,
}

impl InMemoryTimeline {
    pub fn new(rate: Rate) -> Self {
        Self {
            rate,
            global_start_time: RationalTime::zero(rate),
            video_tracks: Vec::new(),
            audio_tracks: Vec::new(),
        }
    }
}

impl Timeline for InMemoryTimeline {
    fn duration(&self) -> RationalTime {
        self.video_tracks
            .iter()
            .chain(self.audio_tracks.iter())
            .map(|t| t.duration(self.rate))
            .max_by(|a, b| a.cmp_seconds(b))
            .unwrap_or_else(|| RationalTime::zero(self.rate))
    }

    fn global_start_time(&self) -> RationalTime {
        self.global_start_time
    }

    fn rate(&self) -> Rate {
        self.rate
    }

    fn video_tracks(&self) -> &[Track] {
        &self.video_tracks
    }

    fn audio_tracks(&self) -> &[Track] {
        &self.audio_tracks
    }

    fn video_at(&self, t: RationalTime) -> Vec<VideoHit> {
        let mut out = Vec::new();
        for track in &self.video_tracks {
            if let Some((idx, local)) = track.item_at(t) {
                if let Item::Clip { media, .. } = &track.items[idx] {
                    out.push(VideoHit {
                        media: media.path.clone(),
                        clip_local_time: local,
                        layer: track.layer,
                    });
                }
            }
        }
        out
    }

    fn audio_in(&self, range: TimeRange) -> Vec<AudioHit> {
        let mut out = Vec::new();
        for track in &self.audio_tracks {
            let start = track.item_at(range.start);
            let end = track.item_at(range.end_time_inclusive());
            let (Some((start_idx, _)), Some((end_idx, _))) = (start, end) else {
                continue;
            };
            let mut cursor = RationalTime::zero(range.start.rate);
            for (idx, item) in track.items.iter().enumerate() {
                let dur = item.duration().rescaled_to(range.start.rate);
                if idx >= start_idx && idx <= end_idx {
                    if let Item::Clip { media, .. } = item {
                        let local_start = range.start.sub(&cursor).rescaled_to(range.start.rate);
                        let clamped_start = if local_start.value < 0.0 {
                            RationalTime::zero(range.start.rate)
                        } else {
                            local_start
                        };
                        let remaining = dur.sub(&clamped_start);
                        let local_duration = if remaining.value < range.duration.value {
                            remaining
                        } else {
                            range.duration
                        };
                        out.push(AudioHit {
                            media: media.path.clone(),
                            clip_local_range: TimeRange::new(clamped_start, local_duration),
                        });
                    }
                }
                cursor = cursor.add(&dur);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path(name: &str) -> Path {
        Path::new(name, &crate::path::PathOptions::default())
    }

    fn clip(name: &str, frames: f64, rate: Rate) -> Item {
        Item::Clip {
            name: name.to_string(),
            media: MediaReference {
                path: sample_path(name),
                available_range: None,
            },
            source_range: TimeRangeFlat::from_range(&TimeRange::new(
                RationalTime::zero(rate),
                RationalTime::new(frames, rate),
            )),
        }
    }

    fn sample_timeline() -> InMemoryTimeline {
        let rate = Rate::new(24, 1);
        let mut tl = InMemoryTimeline::new(rate);
        tl.video_tracks.push(Track {
            kind: TrackKind::Video,
            name: "V1".into(),
            layer: 0,
            items: vec![clip("a.mov", 48.0, rate), clip("b.mov", 72.0, rate)],
        });
        tl
    }

    #[test]
    fn out_of_range_queries_return_empty() {
        let tl = sample_timeline();
        let far = RationalTime::new(1000.0, tl.rate());
        assert!(tl.video_at(far).is_empty());
    }

    #[test]
    fn video_at_resolves_correct_clip_and_local_time() {
        let tl = sample_timeline();
        let t = RationalTime::new(50.0, tl.rate());
        let hits = tl.video_at(t);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].media.base_name, "b");
        assert_eq!(hits[0].clip_local_time.value, 2.0);
    }

    #[test]
    fn duration_sums_track_items() {
        let tl = sample_timeline();
        assert_eq!(tl.duration().value, 120.0);
    }

    #[test]
    fn global_start_time_defaults_to_zero() {
        let tl = sample_timeline();
        assert_eq!(tl.global_start_time().value, 0.0);
    }
}
