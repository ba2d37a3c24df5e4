// crates/playback-io/src/png_seq.rs
//
// Reads/writes a `Path` sequence of PNG frames via the `png` crate (the
// teacher's own dependency), one file per `RationalTime` frame. Frame
// numbers map to file names through `playback_core::path::Path::get`.

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use playback_core::media_info::{MediaInfo, PixelType, VideoInfo};
use playback_core::path::Path;
use playback_core::time::{Rate, RationalTime, TimeRange};
use playback_core::video::{Image, VideoData, VideoLayer};
use playback_core::{EngineError, EngineResult};

use crate::options::Options;
use crate::traits::{read_handle, AudioData, ReadHandle, ReadPlugin, Reader, Writer, WritePlugin};

/// Map a timeline-relative time (0 at the sequence's first frame) to the
/// on-disk frame number, honoring the sequence's own starting number.
fn frame_number(time: RationalTime, rate: Rate, sequence_min: i64) -> i64 {
    let rescaled = time.rescaled_to(rate);
    sequence_min + rescaled.value.round() as i64
}

fn read_png(path: &std::path::Path) -> EngineResult<(u32, u32, Vec<u8>)> {
    let file = File::open(path)?;
    let decoder = png::Decoder::new(file);
    let mut reader = decoder
        .read_info()
        .map_err(|e| EngineError::Decode { path: path.display().to_string(), detail: e.to_string() })?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| EngineError::Decode { path: path.display().to_string(), detail: e.to_string() })?;
    let rgba = match info.color_type {
        png::ColorType::Rgba => buf[..info.buffer_size()].to_vec(),
        png::ColorType::Rgb => {
            let mut out = Vec::with_capacity(info.width as usize * info.height as usize * 4);
            for px in buf[..info.buffer_size()].chunks_exact(3) {
                out.extend_from_slice(px);
                out.push(255);
            }
            out
        }
        other => {
            return Err(EngineError::Decode {
                path: path.display().to_string(),
                detail: format!("unsupported PNG color type {other:?}"),
            })
        }
    };
    Ok((info.width, info.height, rgba))
}

fn write_png(path: &std::path::Path, width: u32, height: u32, rgba: &[u8]) -> EngineResult<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| EngineError::IoError(e.to_string()))?;
    writer
        .write_image_data(rgba)
        .map_err(|e| EngineError::IoError(e.to_string()))?;
    Ok(())
}

pub struct PngSequenceReader {
    sequence: Path,
    rate: Rate,
}

impl Reader for PngSequenceReader {
    fn info(&self) -> ReadHandle<MediaInfo> {
        let (handle, tx, _cancel) = read_handle();
        let path = self.sequence.clone();
        let result = (|| -> EngineResult<MediaInfo> {
            let first = std::path::PathBuf::from(path.get(Some(path.sequence_min), true));
            let (w, h, _) = read_png(&first)?;
            let frame_count = (path.sequence_max - path.sequence_min + 1).max(1);
            Ok(MediaInfo {
                video: vec![VideoInfo { name: "Color".into(), width: w, height: h, pixel_type: PixelType::RGBA8, layer: String::new() }],
                audio: None,
                time_range: Some(playback_core::media_info::TimeRangeInfo::from_time_range(&TimeRange::new(
                    RationalTime::zero(self.rate),
                    RationalTime::new(frame_count as f64, self.rate),
                ))),
                tags: Default::default(),
            })
        })();
        let _ = tx.send(result);
        handle
    }

    fn read_video(&self, time: RationalTime, _layer: &str) -> ReadHandle<VideoData> {
        let (handle, tx, _cancel) = read_handle();
        let sequence = self.sequence.clone();
        let result = (|| -> EngineResult<VideoData> {
            let n = frame_number(time, self.rate, sequence.sequence_min);
            let frame_path = std::path::PathBuf::from(sequence.get(Some(n), true));
            let (w, h, rgba) = read_png(&frame_path)?;
            Ok(VideoData { time, layers: vec![VideoLayer { image: Image::new_rgba8(w, h, rgba), transform: Default::default() }] })
        })();
        let _ = tx.send(result);
        handle
    }

    fn read_audio(&self, _range: TimeRange) -> ReadHandle<AudioData> {
        let (handle, tx, _cancel) = read_handle();
        let _ = tx.send(Err(EngineError::NotFound { path: self.sequence.to_sequence_string() }));
        handle
    }

    fn cancel(&self) {}
}

pub struct PngSequenceReadPlugin;

impl ReadPlugin for PngSequenceReadPlugin {
    fn extensions(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn open(&self, path: &Path, options: &Options) -> EngineResult<Arc<dyn Reader>> {
        let rate_hz = options.get_rational("SequenceIO/DefaultSpeed").unwrap_or((24, 1));
        Ok(Arc::new(PngSequenceReader { sequence: path.clone(), rate: Rate::new(rate_hz.0, rate_hz.1) }))
    }
}

pub struct PngSequenceWriter {
    sequence: Path,
    rate: Rate,
}

impl Writer for PngSequenceWriter {
    fn write_video(&mut self, time: RationalTime, image: &Image) -> EngineResult<()> {
        let n = frame_number(time, self.rate, self.sequence.sequence_min);
        let frame_path = std::path::PathBuf::from(self.sequence.get(Some(n), true));
        write_png(&frame_path, image.width, image.height, &image.data)
    }

    fn write_audio(&mut self, _range: TimeRange, _pcm: &[f32]) -> EngineResult<()> {
        Err(EngineError::Decode { path: self.sequence.to_sequence_string(), detail: "PNG sequence has no audio stream".into() })
    }
}

pub struct PngSequenceWritePlugin;

impl WritePlugin for PngSequenceWritePlugin {
    fn extensions(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn create(&self, path: &Path, _info: &MediaInfo, options: &Options) -> EngineResult<Box<dyn Writer>> {
        let rate_hz = options.get_rational("SequenceIO/DefaultSpeed").unwrap_or((24, 1));
        Ok(Box::new(PngSequenceWriter { sequence: path.clone(), rate: Rate::new(rate_hz.0, rate_hz.1) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::path::PathOptions;
    use std::time::Duration;

    #[test]
    fn writes_then_reads_numbered_frames() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("shot.0001.png");
        let mut seq_path = Path::new(base.to_str().unwrap(), &PathOptions::default());
        seq_path.sequence_min = 1;
        seq_path.sequence_max = 1;

        let write_plugin = PngSequenceWritePlugin;
        let mut writer = write_plugin.create(&seq_path, &MediaInfo::default(), &Options::new()).unwrap();
        let image = Image::new_rgba8(2, 2, vec![200u8; 2 * 2 * 4]);
        writer.write_video(RationalTime::new(0.0, Rate::new(24, 1)), &image).unwrap();

        let read_plugin = PngSequenceReadPlugin;
        let reader = read_plugin.open(&seq_path, &Options::new()).unwrap();
        let data = reader
            .read_video(RationalTime::new(0.0, Rate::new(24, 1)), "")
            .wait_timeout(Duration::from_secs(1))
            .unwrap()
            .unwrap();
        assert_eq!(data.layers[0].image.width, 2);
    }
}
