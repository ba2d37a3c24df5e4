// crates/playback-io/src/options.rs
//
// Recognized option keys (spec §4.C's minimum set) plus the string map
// plugins read them out of. Options are always `string -> string`; a
// plugin parses its own keys and ignores ones it doesn't recognize.

use std::collections::BTreeMap;

pub mod keys {
    pub const FFMPEG_THREAD_COUNT: &str = "FFmpeg/ThreadCount";
    pub const FFMPEG_VIDEO_BUFFER_SIZE: &str = "FFmpeg/VideoBufferSize";
    pub const FFMPEG_AUDIO_BUFFER_SIZE: &str = "FFmpeg/AudioBufferSize";
    pub const FFMPEG_YUV_TO_RGB: &str = "FFmpeg/YUVToRGB";
    pub const JPEG_QUALITY: &str = "JPEG/Quality";
    pub const OPENEXR_COMPRESSION: &str = "OpenEXR/Compression";
    pub const OPENEXR_DWA_COMPRESSION_LEVEL: &str = "OpenEXR/DWACompressionLevel";
    pub const SEQUENCE_IO_DEFAULT_SPEED: &str = "SequenceIO/DefaultSpeed";
    pub const SEQUENCE_IO_THREAD_COUNT: &str = "SequenceIO/ThreadCount";
}

#[derive(Clone, Debug, Default)]
pub struct Options(BTreeMap<String, String>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn get_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    /// Parse an `r/d` rational option such as `FFmpeg/AudioBufferSize`.
    pub fn get_rational(&self, key: &str) -> Option<(i64, i64)> {
        let v = self.get(key)?;
        let (num, den) = v.split_once('/')?;
        Some((num.parse().ok()?, den.parse().ok()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let opts = Options::new();
        assert_eq!(opts.get_u32(keys::FFMPEG_THREAD_COUNT, 4), 4);
    }

    #[test]
    fn rational_option_parses() {
        let opts = Options::new().set(keys::FFMPEG_AUDIO_BUFFER_SIZE, "48000/1");
        assert_eq!(opts.get_rational(keys::FFMPEG_AUDIO_BUFFER_SIZE), Some((48000, 1)));
    }

    #[test]
    fn bool_option_accepts_numeric_and_word_forms() {
        let opts = Options::new().set(keys::FFMPEG_YUV_TO_RGB, "1");
        assert!(opts.get_bool(keys::FFMPEG_YUV_TO_RGB, false));
    }
}
