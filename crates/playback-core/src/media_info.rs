// crates/playback-core/src/media_info.rs
//
// The plain-data description an IOTrait reader hands back from `info()`:
// video/audio track shapes plus a freeform tag map. No behavior lives here,
// just the types the cache, the player and `bake` all pass around.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::time::{Rate, TimeRange};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelType {
    L8,
    LA8,
    RGB8,
    RGBA8,
    YUV420P,
    YUV422P,
    YUV444P,
    RGB10,
}

impl PixelType {
    pub fn channel_count(&self) -> usize {
        match self {
            PixelType::L8 => 1,
            PixelType::LA8 => 2,
            PixelType::RGB8 | PixelType::YUV420P | PixelType::YUV422P | PixelType::YUV444P => 3,
            PixelType::RGBA8 => 4,
            PixelType::RGB10 => 3,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelType::RGB10 => 4,
            other => other.channel_count(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub layer: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub channel_count: u16,
    pub sample_rate: u32,
    pub bit_depth: u16,
}

/// Everything a reader's `info()` returns: track shapes, the overall time
/// range at the declared rate, and a tag map for free-text metadata
/// (codec name, color config requested by `bake`, etc).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MediaInfo {
    pub video: Vec<VideoInfo>,
    pub audio: Option<AudioInfo>,
    pub time_range: Option<TimeRangeInfo>,
    pub tags: BTreeMap<String, String>,
}

/// `TimeRange` is not itself serializable with exact semantics we want to
/// expose in tag dumps, so `MediaInfo` carries the flattened form.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeInfo {
    pub start_value: f64,
    pub duration_value: f64,
    pub rate_num: i64,
    pub rate_den: i64,
}

impl TimeRangeInfo {
    pub fn from_time_range(r: &TimeRange) -> Self {
        Self {
            start_value: r.start.value,
            duration_value: r.duration.value,
            rate_num: r.start.rate.num,
            rate_den: r.start.rate.den,
        }
    }

    pub fn to_time_range(&self) -> TimeRange {
        let rate = Rate::new(self.rate_num, self.rate_den);
        TimeRange::new(
            crate::time::RationalTime::new(self.start_value, rate),
            crate::time::RationalTime::new(self.duration_value, rate),
        )
    }
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        !self.video.is_empty()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::RationalTime;

    #[test]
    fn time_range_info_round_trips() {
        let rate = Rate::new(24, 1);
        let r = TimeRange::new(RationalTime::new(0.0, rate), RationalTime::new(48.0, rate));
        let info = TimeRangeInfo::from_time_range(&r);
        let rebuilt = info.to_time_range();
        assert_eq!(rebuilt.start.value, r.start.value);
        assert_eq!(rebuilt.duration.value, r.duration.value);
    }

    #[test]
    fn pixel_type_sizes() {
        assert_eq!(PixelType::RGBA8.bytes_per_pixel(), 4);
        assert_eq!(PixelType::L8.bytes_per_pixel(), 1);
    }

    #[test]
    fn media_info_serializes() {
        let info = MediaInfo {
            video: vec![VideoInfo {
                name: "Color".into(),
                width: 1920,
                height: 1080,
                pixel_type: PixelType::RGBA8,
                layer: String::new(),
            }],
            audio: None,
            time_range: None,
            tags: BTreeMap::new(),
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: MediaInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.video[0].width, 1920);
    }
}
