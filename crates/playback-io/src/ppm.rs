// crates/playback-io/src/ppm.rs
//
// P6 binary PPM reader/writer. No external dependency — used by engine
// tests as a minimal realistic format that still exercises the IOTrait
// contract end to end.

use std::fs;
use std::io::Write as _;
use std::sync::Arc;

use playback_core::media_info::{MediaInfo, PixelType, VideoInfo};
use playback_core::path::Path;
use playback_core::time::{Rate, RationalTime, TimeRange};
use playback_core::video::{Image, VideoData, VideoLayer};
use playback_core::{EngineError, EngineResult};

use crate::options::Options;
use crate::traits::{read_handle, AudioData, ReadHandle, ReadPlugin, Reader, Writer, WritePlugin};

fn parse_ppm(bytes: &[u8]) -> EngineResult<(u32, u32, Vec<u8>)> {
    if bytes.len() < 2 || &bytes[0..2] != b"P6" {
        return Err(EngineError::Decode { path: String::new(), detail: "not a P6 PPM".into() });
    }
    let mut fields = Vec::new();
    let mut i = 2;
    while fields.len() < 3 {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if start == i {
            return Err(EngineError::Decode { path: String::new(), detail: "truncated PPM header".into() });
        }
        fields.push(std::str::from_utf8(&bytes[start..i]).unwrap_or("").to_string());
    }
    i += 1; // single whitespace byte after maxval
    let width: u32 = fields[0].parse().map_err(|_| EngineError::Decode { path: String::new(), detail: "bad width".into() })?;
    let height: u32 = fields[1].parse().map_err(|_| EngineError::Decode { path: String::new(), detail: "bad height".into() })?;
    let expected = width as usize * height as usize * 3;
    let rgb = bytes.get(i..i + expected).ok_or_else(|| EngineError::Decode {
        path: String::new(),
        detail: "pixel data shorter than header claims".into(),
    })?;

    let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
    for px in rgb.chunks_exact(3) {
        rgba.extend_from_slice(px);
        rgba.push(255);
    }
    Ok((width, height, rgba))
}

fn write_ppm(path: &std::path::Path, width: u32, height: u32, rgba: &[u8]) -> EngineResult<()> {
    let mut file = fs::File::create(path)?;
    write!(file, "P6\n{width} {height}\n255\n")?;
    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    file.write_all(&rgb)?;
    Ok(())
}

pub struct PpmReader {
    path: std::path::PathBuf,
}

impl Reader for PpmReader {
    fn info(&self) -> ReadHandle<MediaInfo> {
        let (handle, tx, _cancel) = read_handle();
        let result = (|| -> EngineResult<MediaInfo> {
            let bytes = fs::read(&self.path)?;
            let (w, h, _) = parse_ppm(&bytes)?;
            Ok(MediaInfo {
                video: vec![VideoInfo {
                    name: "Color".into(),
                    width: w,
                    height: h,
                    pixel_type: PixelType::RGBA8,
                    layer: String::new(),
                }],
                audio: None,
                time_range: Some(playback_core::media_info::TimeRangeInfo::from_time_range(
                    &TimeRange::new(RationalTime::zero(Rate::new(24, 1)), RationalTime::new(1.0, Rate::new(24, 1))),
                )),
                tags: Default::default(),
            })
        })();
        let _ = tx.send(result);
        handle
    }

    fn read_video(&self, time: RationalTime, _layer: &str) -> ReadHandle<VideoData> {
        let (handle, tx, _cancel) = read_handle();
        let result = (|| -> EngineResult<VideoData> {
            let bytes = fs::read(&self.path)?;
            let (w, h, rgba) = parse_ppm(&bytes)?;
            Ok(VideoData {
                time,
                layers: vec![VideoLayer {
                    image: Image::new_rgba8(w, h, rgba),
                    transform: Default::default(),
                }],
            })
        })();
        let _ = tx.send(result);
        handle
    }

    fn read_audio(&self, _range: TimeRange) -> ReadHandle<AudioData> {
        let (handle, tx, _cancel) = read_handle();
        let _ = tx.send(Err(EngineError::NotFound { path: self.path.display().to_string() }));
        handle
    }

    fn cancel(&self) {}
}

pub struct PpmReadPlugin;

impl ReadPlugin for PpmReadPlugin {
    fn extensions(&self) -> &'static [&'static str] {
        &["ppm"]
    }

    fn open(&self, path: &Path, _options: &Options) -> EngineResult<Arc<dyn Reader>> {
        let fs_path = std::path::PathBuf::from(path.get(None, true));
        if !fs_path.exists() {
            return Err(EngineError::OpenFailed { path: fs_path.display().to_string(), reason: "not found".into() });
        }
        Ok(Arc::new(PpmReader { path: fs_path }))
    }
}

pub struct PpmWriter {
    path: std::path::PathBuf,
}

impl Writer for PpmWriter {
    fn write_video(&mut self, _time: RationalTime, image: &Image) -> EngineResult<()> {
        write_ppm(&self.path, image.width, image.height, &image.data)
    }

    fn write_audio(&mut self, _range: TimeRange, _pcm: &[f32]) -> EngineResult<()> {
        Err(EngineError::Decode { path: self.path.display().to_string(), detail: "PPM has no audio stream".into() })
    }
}

pub struct PpmWritePlugin;

impl WritePlugin for PpmWritePlugin {
    fn extensions(&self) -> &'static [&'static str] {
        &["ppm"]
    }

    fn create(&self, path: &Path, _info: &MediaInfo, _options: &Options) -> EngineResult<Box<dyn Writer>> {
        Ok(Box::new(PpmWriter { path: std::path::PathBuf::from(path.get(None, true)) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::path::PathOptions;
    use std::time::Duration;

    #[test]
    fn round_trips_a_solid_image() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frame.ppm");
        let rgba: Vec<u8> = (0..(4 * 4 * 4)).map(|i| (i % 256) as u8 | 0x01).collect();
        write_ppm(&file, 4, 4, &rgba).unwrap();

        let plugin = PpmReadPlugin;
        let path = Path::new(file.to_str().unwrap(), &PathOptions::default());
        let reader = plugin.open(&path, &Options::new()).unwrap();
        let data = reader
            .read_video(RationalTime::zero(Rate::new(24, 1)), "")
            .wait_timeout(Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert_eq!(data.layers[0].image.width, 4);
        assert_eq!(data.layers[0].image.height, 4);
    }

    #[test]
    fn open_failed_when_file_missing() {
        let plugin = PpmReadPlugin;
        let path = Path::new("/nonexistent/frame.ppm", &PathOptions::default());
        let err = plugin.open(&path, &Options::new()).unwrap_err();
        assert!(matches!(err, EngineError::OpenFailed { .. }));
    }
}
