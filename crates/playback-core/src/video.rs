// crates/playback-core/src/video.rs
//
// The shared-immutable image type that flows from an IOTrait reader through
// the cache to the compositor (spec §3 "Images carried in VideoData are
// shared immutable buffers; once produced they are never mutated"). Kept
// deliberately small — this crate never decodes pixels itself.

use std::sync::Arc;

use crate::media_info::PixelType;
use crate::time::RationalTime;

/// A single decoded frame, always normalized to packed RGBA8 by the time it
/// reaches this layer (the Compositor's pixel math in [`crate::compositor`]
/// assumes four interleaved bytes per pixel; per-format planar layouts like
/// YUV420P are a reader-internal concern, not a Compositor one).
#[derive(Clone, Debug)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixel_type: PixelType,
    pub data: Arc<Vec<u8>>,
}

impl Image {
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            pixel_type: PixelType::RGBA8,
            data: Arc::new(data),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }
}

/// A 2D affine placement for a layer within its parent canvas — translation
/// and uniform scale are all the Compositor's own modes need; anything
/// richer belongs to the rendering backend (out of scope, §1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2D {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VideoLayer {
    pub image: Image,
    pub transform: Transform2D,
}

/// The composited layers for a single instant, prior to comparison/compositing.
#[derive(Clone, Debug)]
pub struct VideoData {
    pub time: RationalTime,
    pub layers: Vec<VideoLayer>,
}

impl VideoData {
    pub fn byte_cost(&self) -> u64 {
        self.layers.iter().map(|l| l.image.byte_len() as u64).sum()
    }
}
