// crates/playback-io/src/ffmpeg_movie.rs
//
// Video+audio Reader and Writer backed by FFmpeg, generalized from the
// one-shot "decode a preview frame" / "encode the whole timeline in one
// pass" shapes into the IOTrait contract: `info()`, `readVideo(time,
// layer)`, `readAudio(range)` on the read side, `writeVideo`/`writeAudio`/
// `finalize` on the write side.
//
// Reads run on a dedicated thread per call, same as the old encode
// pipeline ran on its own thread — the `ReadHandle` is the channel the
// caller polls or blocks on instead of a callback or a `MediaResult`
// variant.
//
// Writes are synchronous on the calling thread: `bake` drives the writer
// frame by frame from its own loop, so there is no benefit to a second
// thread, only a synchronization cost.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{input, output, Pixel, Sample};
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::util::rational::Rational;
use ffmpeg::Packet;

use playback_core::media_info::{AudioInfo, MediaInfo, PixelType as EnginePixelType, VideoInfo};
use playback_core::path::Path;
use playback_core::time::{Rate, RationalTime, TimeRange, TimeRangeInfo};
use playback_core::video::{Image, VideoData, VideoLayer};
use playback_core::{EngineError, EngineResult};

use crate::options::{keys, Options};
use crate::traits::{read_handle, AudioData, ReadHandle, ReadPlugin, Reader, Writer, WritePlugin};

const EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "avi", "webm"];

fn decode_err(path: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::Decode { path: path.to_string(), detail: e.to_string() }
}

fn spawn_read<T, F>(work: F) -> ReadHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> EngineResult<T> + Send + 'static,
{
    let (handle, tx, _cancel) = read_handle();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });
    handle
}

// ── Reader ────────────────────────────────────────────────────────────────────

pub struct FfmpegReader {
    path: PathBuf,
    thread_count: u32,
    cancel: Arc<AtomicBool>,
}

impl Reader for FfmpegReader {
    fn info(&self) -> ReadHandle<MediaInfo> {
        let path = self.path.clone();
        spawn_read(move || probe_media_info(&path))
    }

    fn read_video(&self, time: RationalTime, _layer: &str) -> ReadHandle<VideoData> {
        let path = self.path.clone();
        let cancel = self.cancel.clone();
        spawn_read(move || decode_frame_at(&path, time, &cancel))
    }

    fn read_audio(&self, range: TimeRange) -> ReadHandle<AudioData> {
        let path = self.path.clone();
        let cancel = self.cancel.clone();
        spawn_read(move || decode_audio_range(&path, range, &cancel))
    }

    fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }
}

fn probe_media_info(path: &PathBuf) -> EngineResult<MediaInfo> {
    let display = path.display().to_string();
    let ictx = input(path).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;

    let mut video = Vec::new();
    let mut rate = Rate::new(24, 1);
    if let Some(stream) = ictx.streams().best(MediaType::Video) {
        let params = stream.parameters();
        let (w, h) = unsafe {
            let p = params.as_ptr();
            ((*p).width as u32, (*p).height as u32)
        };
        video.push(VideoInfo { name: "Color".into(), width: w.max(1), height: h.max(1), pixel_type: EnginePixelType::RGBA8, layer: String::new() });
        let fr = stream.avg_frame_rate();
        if fr.numerator() > 0 && fr.denominator() > 0 {
            rate = Rate::new(fr.numerator() as i64, fr.denominator() as i64);
        }
    }

    let audio = ictx.streams().best(MediaType::Audio).map(|stream| {
        let params = stream.parameters();
        let channels = unsafe { (*params.as_ptr()).ch_layout.nb_channels as u16 };
        let sample_rate = unsafe { (*params.as_ptr()).sample_rate as u32 };
        AudioInfo { channel_count: channels.max(1), sample_rate: sample_rate.max(1), bit_depth: 32 }
    });

    let duration_secs = {
        let d = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
        if d > 0.0 {
            d
        } else {
            ictx.streams()
                .best(MediaType::Video)
                .or_else(|| ictx.streams().best(MediaType::Audio))
                .map(|s| {
                    let tb = s.time_base();
                    s.duration() as f64 * tb.numerator() as f64 / tb.denominator() as f64
                })
                .unwrap_or(0.0)
        }
    };

    let frame_count = (duration_secs * rate.to_f64()).max(1.0);
    let time_range = TimeRangeInfo::from_time_range(&TimeRange::new(
        RationalTime::zero(rate),
        RationalTime::new(frame_count, rate),
    ));

    let mut tags = std::collections::BTreeMap::new();
    if let Some(name) = ictx.format().name().split(',').next() {
        tags.insert("container".to_string(), name.to_string());
    }

    Ok(MediaInfo { video, audio, time_range: Some(time_range), tags })
}

fn decode_frame_at(path: &PathBuf, time: RationalTime, cancel: &Arc<AtomicBool>) -> EngineResult<VideoData> {
    let display = path.display().to_string();
    let target_secs = time.to_seconds();

    let mut ictx = input(path).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;
    let video_idx = ictx
        .streams()
        .best(MediaType::Video)
        .ok_or_else(|| EngineError::NotFound { path: display.clone() })?
        .index();

    let (seek_ts, tb_num, tb_den) = {
        let stream = ictx.stream(video_idx).unwrap();
        let tb = stream.time_base();
        let ts = (target_secs * tb.denominator() as f64 / tb.numerator() as f64) as i64;
        (ts, tb.numerator() as f64, tb.denominator() as f64)
    };
    let _ = ictx.seek(seek_ts, ..=seek_ts);

    let ictx2 = input(path).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;
    let stream2 = ictx2.stream(video_idx).ok_or_else(|| EngineError::NotFound { path: display.clone() })?;
    let dec_ctx = codec::context::Context::from_parameters(stream2.parameters()).map_err(|e| decode_err(&display, e))?;
    let mut decoder = dec_ctx.decoder().video().map_err(|e| decode_err(&display, e))?;

    let (out_w, out_h) = (decoder.width(), decoder.height());
    let mut scaler = SwsContext::get(decoder.format(), decoder.width(), decoder.height(), Pixel::RGBA, out_w, out_h, Flags::BILINEAR)
        .map_err(|e| decode_err(&display, e))?;

    let mut last_good: Option<VideoFrame> = None;
    for (stream, packet) in ictx.packets().flatten() {
        if cancel.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        if stream.index() != video_idx {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut decoded = VideoFrame::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let mut out_frame = VideoFrame::empty();
            scaler.run(&decoded, &mut out_frame).map_err(|e| decode_err(&display, e))?;
            last_good = Some(out_frame.clone());
            if let Some(pts) = decoded.pts() {
                let pts_secs = pts as f64 * tb_num / tb_den;
                if pts_secs < target_secs - (1.0 / 60.0) {
                    continue;
                }
            }
            return Ok(frame_to_video_data(&out_frame, out_w, out_h, time));
        }
    }

    last_good
        .map(|f| frame_to_video_data(&f, out_w, out_h, time))
        .ok_or_else(|| EngineError::NotFound { path: display.clone() })
}

fn frame_to_video_data(frame: &VideoFrame, width: u32, height: u32, time: RationalTime) -> VideoData {
    let stride = frame.stride(0);
    let raw = frame.data(0);
    let row_bytes = width as usize * 4;
    let data: Vec<u8> = (0..height as usize).flat_map(|row| &raw[row * stride..row * stride + row_bytes]).copied().collect();
    VideoData { time, layers: vec![VideoLayer { image: Image::new_rgba8(width, height, data), transform: Default::default() }] }
}

fn decode_audio_range(path: &PathBuf, range: TimeRange, cancel: &Arc<AtomicBool>) -> EngineResult<AudioData> {
    let display = path.display().to_string();
    let start_secs = range.start.to_seconds();
    let end_secs = range.end_time_exclusive().to_seconds();

    let mut ictx = input(path).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;
    let audio_idx = ictx
        .streams()
        .best(MediaType::Audio)
        .ok_or_else(|| EngineError::NotFound { path: display.clone() })?
        .index();

    let (in_tb, sample_rate) = {
        let stream = ictx.stream(audio_idx).unwrap();
        (stream.time_base(), unsafe { (*stream.parameters().as_ptr()).sample_rate as u32 })
    };

    if start_secs > 0.0 {
        let seek_ts = (start_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        let _ = ictx.seek(seek_ts, ..=seek_ts);
    }

    let ictx2 = input(path).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;
    let stream2 = ictx2.stream(audio_idx).ok_or_else(|| EngineError::NotFound { path: display.clone() })?;
    let dec_ctx = codec::context::Context::from_parameters(stream2.parameters()).map_err(|e| decode_err(&display, e))?;
    let mut decoder = dec_ctx.decoder().audio().map_err(|e| decode_err(&display, e))?;

    let target_fmt = Sample::F32(SampleType::Planar);
    let mut resampler: Option<resampling::Context> = None;
    let mut left: Vec<f32> = Vec::new();
    let mut right: Vec<f32> = Vec::new();

    'packets: for (stream, packet) in ictx.packets().flatten() {
        if cancel.load(Ordering::SeqCst) {
            return Err(EngineError::Cancelled);
        }
        if stream.index() != audio_idx {
            continue;
        }
        if decoder.send_packet(&packet).is_err() {
            continue;
        }
        let mut raw = AudioFrame::empty();
        while decoder.receive_frame(&mut raw).is_ok() {
            let pts_secs = raw.pts().map(|pts| pts as f64 * f64::from(in_tb)).unwrap_or(0.0);
            if pts_secs >= end_secs {
                break 'packets;
            }

            let channels = raw.ch_layout().channels();
            let needs_resample = raw.format() != target_fmt || channels != 2;
            let frame_ref: &AudioFrame = if needs_resample {
                let rs = resampler.get_or_insert_with(|| {
                    let src_layout = if channels >= 2 { raw.ch_layout() } else { ChannelLayout::MONO };
                    resampling::Context::get2(raw.format(), src_layout, raw.rate(), target_fmt, ChannelLayout::STEREO, raw.rate())
                        .expect("create audio resampler")
                });
                let mut resampled = AudioFrame::empty();
                if rs.run(&raw, &mut resampled).is_err() {
                    continue;
                }
                push_planar(&resampled, &mut left, &mut right);
                continue;
            } else {
                &raw
            };
            push_planar(frame_ref, &mut left, &mut right);
        }
    }

    let sample_offset = (start_secs * sample_rate as f64).round() as i64;
    Ok(AudioData { sample_offset, layers: vec![Arc::new(left), Arc::new(right)] })
}

fn push_planar(frame: &AudioFrame, left: &mut Vec<f32>, right: &mut Vec<f32>) {
    let n = frame.samples();
    if n == 0 {
        return;
    }
    unsafe {
        let l = std::slice::from_raw_parts(frame.data(0).as_ptr() as *const f32, n);
        left.extend_from_slice(l);
        let r_bytes = if frame.ch_layout().channels() >= 2 { frame.data(1) } else { frame.data(0) };
        let r = std::slice::from_raw_parts(r_bytes.as_ptr() as *const f32, n);
        right.extend_from_slice(r);
    }
}

pub struct FfmpegReadPlugin;

impl ReadPlugin for FfmpegReadPlugin {
    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn open(&self, path: &Path, options: &Options) -> EngineResult<Arc<dyn Reader>> {
        let fs_path = PathBuf::from(path.get(None, true));
        if input(&fs_path).is_err() {
            return Err(EngineError::OpenFailed { path: fs_path.display().to_string(), reason: "could not open with FFmpeg".into() });
        }
        let thread_count = options.get_u32(keys::FFMPEG_THREAD_COUNT, 0);
        Ok(Arc::new(FfmpegReader { path: fs_path, thread_count, cancel: Arc::new(AtomicBool::new(false)) }))
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

struct AudioFifo {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl AudioFifo {
    fn new() -> Self {
        Self { left: Vec::new(), right: Vec::new() }
    }

    fn push_interleaved(&mut self, pcm: &[f32], channels: usize) {
        let channels = channels.max(1);
        for frame in pcm.chunks_exact(channels) {
            self.left.push(frame[0]);
            self.right.push(if channels >= 2 { frame[1] } else { frame[0] });
        }
    }

    fn len(&self) -> usize {
        self.left.len()
    }

    fn pop_frame(&mut self, n: usize, sample_idx: i64) -> AudioFrame {
        let available = self.left.len().min(n);
        let mut frame = AudioFrame::new(Sample::F32(SampleType::Planar), n, ChannelLayoutMask::STEREO);
        frame.set_rate(44_100);
        frame.set_pts(Some(sample_idx));
        unsafe {
            let ldst = std::slice::from_raw_parts_mut(frame.data_mut(0).as_mut_ptr() as *mut f32, n);
            ldst[..available].copy_from_slice(&self.left[..available]);
            if available < n {
                ldst[available..].fill(0.0);
            }
            let rdst = std::slice::from_raw_parts_mut(frame.data_mut(1).as_mut_ptr() as *mut f32, n);
            rdst[..available].copy_from_slice(&self.right[..available]);
            if available < n {
                rdst[available..].fill(0.0);
            }
        }
        self.left.drain(..available);
        self.right.drain(..available);
        frame
    }
}

struct AudioEncState {
    encoder: encoder::Audio,
    out_sample_idx: i64,
    frame_size: usize,
    fifo: AudioFifo,
    audio_tb: Rational,
    ost_tb: Rational,
    stream_index: usize,
}

impl AudioEncState {
    fn drain(&mut self, octx: &mut ffmpeg::format::context::Output, flush: bool) -> EngineResult<()> {
        while self.fifo.len() >= self.frame_size || (flush && self.fifo.len() > 0) {
            let frame = self.fifo.pop_frame(self.frame_size, self.out_sample_idx);
            self.out_sample_idx += self.frame_size as i64;
            self.encoder.send_frame(&frame).map_err(|e| decode_err("audio encode", e))?;
            self.drain_packets(octx)?;
        }
        Ok(())
    }

    fn drain_packets(&mut self, octx: &mut ffmpeg::format::context::Output) -> EngineResult<()> {
        let mut pkt = Packet::empty();
        while self.encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(self.stream_index);
            pkt.rescale_ts(self.audio_tb, self.ost_tb);
            pkt.write_interleaved(octx).map_err(|e| decode_err("audio mux", e))?;
        }
        Ok(())
    }
}

pub struct FfmpegWriter {
    octx: ffmpeg::format::context::Output,
    video_encoder: encoder::Video,
    video_stream_index: usize,
    frame_tb: Rational,
    ost_video_tb: Rational,
    out_frame_idx: i64,
    width: u32,
    height: u32,
    scaler: Option<SwsContext>,
    audio: Option<AudioEncState>,
    finalized: bool,
}

impl Writer for FfmpegWriter {
    fn write_video(&mut self, _time: RationalTime, image: &Image) -> EngineResult<()> {
        let sc = match &mut self.scaler {
            Some(sc) => sc,
            None => {
                self.scaler = Some(
                    SwsContext::get(Pixel::RGBA, image.width, image.height, Pixel::YUV420P, self.width, self.height, Flags::BILINEAR)
                        .map_err(|e| decode_err("video scale init", e))?,
                );
                self.scaler.as_mut().unwrap()
            }
        };

        let mut src = VideoFrame::new(Pixel::RGBA, image.width, image.height);
        {
            let stride = src.stride(0);
            let row_bytes = image.width as usize * 4;
            let dst = src.data_mut(0);
            for row in 0..image.height as usize {
                let s = row * row_bytes;
                dst[row * stride..row * stride + row_bytes].copy_from_slice(&image.data[s..s + row_bytes]);
            }
        }

        let mut yuv = VideoFrame::empty();
        sc.run(&src, &mut yuv).map_err(|e| decode_err("video scale", e))?;
        yuv.set_pts(Some(self.out_frame_idx));

        self.video_encoder.send_frame(&yuv).map_err(|e| decode_err("video encode", e))?;
        let mut pkt = Packet::empty();
        while self.video_encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(self.video_stream_index);
            pkt.rescale_ts(self.frame_tb, self.ost_video_tb);
            pkt.write_interleaved(&mut self.octx).map_err(|e| decode_err("video mux", e))?;
        }
        self.out_frame_idx += 1;
        Ok(())
    }

    fn write_audio(&mut self, _range: TimeRange, pcm: &[f32]) -> EngineResult<()> {
        let audio = self.audio.as_mut().ok_or_else(|| EngineError::Decode { path: String::new(), detail: "writer was not opened with an audio stream".into() })?;
        audio.fifo.push_interleaved(pcm, 2);
        audio.drain(&mut self.octx, false)
    }

    fn finalize(&mut self) -> EngineResult<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        self.video_encoder.send_eof().map_err(|e| decode_err("video flush", e))?;
        let mut pkt = Packet::empty();
        while self.video_encoder.receive_packet(&mut pkt).is_ok() {
            pkt.set_stream(self.video_stream_index);
            pkt.rescale_ts(self.frame_tb, self.ost_video_tb);
            pkt.write_interleaved(&mut self.octx).map_err(|e| decode_err("video mux", e))?;
        }

        if let Some(audio) = &mut self.audio {
            audio.drain(&mut self.octx, true)?;
            audio.encoder.send_eof().map_err(|e| decode_err("audio flush", e))?;
            audio.drain_packets(&mut self.octx)?;
        }

        self.octx.write_trailer().map_err(|e| decode_err("write trailer", e))?;
        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

pub struct FfmpegWritePlugin;

impl WritePlugin for FfmpegWritePlugin {
    fn extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    fn create(&self, path: &Path, info: &MediaInfo, _options: &Options) -> EngineResult<Box<dyn Writer>> {
        let display = path.get(None, true);
        let video_info = info.video.first().ok_or_else(|| EngineError::Decode { path: display.clone(), detail: "MediaInfo has no video track to write".into() })?;
        let rate = info
            .time_range
            .map(|tr| Rate::new(tr.rate_num, tr.rate_den))
            .filter(Rate::is_valid)
            .unwrap_or(Rate::new(24, 1));

        let mut octx = output(&PathBuf::from(&display)).map_err(|e| EngineError::OpenFailed { path: display.clone(), reason: e.to_string() })?;

        let out_tb = Rational::new(rate.den as i32, rate.num as i32);
        let h264 = encoder::find(CodecId::H264).ok_or_else(|| decode_err(&display, "H.264 encoder not available"))?;
        let mut ost_video = octx.add_stream(h264).map_err(|e| decode_err(&display, e))?;
        ost_video.set_time_base(out_tb);
        let video_stream_index = ost_video.index();

        let video_enc_ctx = codec::context::Context::new_with_codec(h264);
        let mut video_enc = video_enc_ctx.encoder().video().map_err(|e| decode_err(&display, e))?;
        video_enc.set_width(video_info.width);
        video_enc.set_height(video_info.height);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(out_tb);
        video_enc.set_frame_rate(Some(Rational::new(rate.num as i32, rate.den as i32)));
        video_enc.set_bit_rate(0);

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("crf", "18");
        opts.set("preset", "fast");
        let video_encoder = video_enc.open_as_with(h264, opts).map_err(|e| decode_err(&display, e))?;

        unsafe {
            let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                (**(*octx.as_mut_ptr()).streams.add(video_stream_index)).codecpar,
                video_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
            );
            if ret < 0 {
                return Err(decode_err(&display, format!("avcodec_parameters_from_context (video) failed: {ret}")));
            }
        }

        let audio = if let Some(audio_info) = &info.audio {
            let audio_tb = Rational::new(1, 44_100);
            let aac = encoder::find(CodecId::AAC).ok_or_else(|| decode_err(&display, "AAC encoder not available"))?;
            let mut ost_audio = octx.add_stream(aac).map_err(|e| decode_err(&display, e))?;
            ost_audio.set_time_base(audio_tb);
            let stream_index = ost_audio.index();

            let audio_enc_ctx = codec::context::Context::new_with_codec(aac);
            let mut audio_enc = audio_enc_ctx.encoder().audio().map_err(|e| decode_err(&display, e))?;
            audio_enc.set_rate(44_100);
            audio_enc.set_ch_layout(ChannelLayout::STEREO);
            audio_enc.set_format(Sample::F32(SampleType::Planar));
            audio_enc.set_bit_rate(128_000);
            let audio_encoder = audio_enc.open_as_with(aac, ffmpeg::Dictionary::new()).map_err(|e| decode_err(&display, e))?;
            let frame_size = (audio_encoder.frame_size() as usize).max(1024);
            let ost_tb = octx.stream(stream_index).unwrap().time_base();

            unsafe {
                let ret = ffmpeg::ffi::avcodec_parameters_from_context(
                    (**(*octx.as_mut_ptr()).streams.add(stream_index)).codecpar,
                    audio_encoder.as_ptr() as *mut ffmpeg::ffi::AVCodecContext,
                );
                if ret < 0 {
                    return Err(decode_err(&display, format!("avcodec_parameters_from_context (audio) failed: {ret}")));
                }
            }
            let _ = audio_info;
            Some(AudioEncState { encoder: audio_encoder, out_sample_idx: 0, frame_size, fifo: AudioFifo::new(), audio_tb, ost_tb, stream_index })
        } else {
            None
        };

        octx.write_header().map_err(|e| decode_err(&display, e))?;
        let ost_video_tb = octx.stream(video_stream_index).unwrap().time_base();

        Ok(Box::new(FfmpegWriter {
            octx,
            video_encoder,
            video_stream_index,
            frame_tb: out_tb,
            ost_video_tb,
            out_frame_idx: 0,
            width: video_info.width,
            height: video_info.height,
            scaler: None,
            audio,
            finalized: false,
        }))
    }
}
