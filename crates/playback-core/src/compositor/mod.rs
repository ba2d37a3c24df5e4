// crates/playback-core/src/compositor/mod.rs
//
// Combines a primary VideoData (A) and an optional secondary (B) into a
// single VideoData per §4.J. Generalizes the clip-boundary crossfade
// registry this crate started from: instead of one `VideoTransition` per
// clip cut, one `CompareMode` per pixel-combination rule, and instead of
// packed YUV420P buffers the inputs are the RGBA8 `Image` type every
// IOTrait reader normalizes to (`crate::video::Image`).
//
// The Compositor is time-agnostic: it never touches a Player, a Clock, or
// a Timeline. `CompareTimeMode` is a plain enum the Player consults when it
// decides *which* VideoData to hand in as B; by the time either value
// reaches here, both are already resolved frames.

pub mod helpers;

use crate::video::{Image, VideoData};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompareTimeMode {
    /// Map B's clock onto A's start.
    Relative,
    /// Sample B at the same absolute time as A.
    Absolute,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CompareMode {
    A,
    B,
    Wipe { center: (f32, f32), rotation_degrees: f32 },
    Overlay { amount: f32 },
    Difference,
    Horizontal,
    Vertical,
    Tile,
}

/// Combine `a` (and, for every mode but `A`, `b`) into one image. `b` is
/// required for every mode except `A`; modes that need it but don't get it
/// fall back to `a` alone (spec treats "no secondary" the same as
/// single-stream playback).
pub fn compose(mode: CompareMode, a: &Image, b: Option<&Image>) -> Image {
    match mode {
        CompareMode::A => a.clone(),
        CompareMode::B => b.cloned_or(a),
        CompareMode::Wipe { center, rotation_degrees } => match b {
            Some(b) => wipe(a, b, center, rotation_degrees),
            None => a.clone(),
        },
        CompareMode::Overlay { amount } => match b {
            Some(b) => overlay(a, b, amount),
            None => a.clone(),
        },
        CompareMode::Difference => match b {
            Some(b) => difference(a, b),
            None => a.clone(),
        },
        CompareMode::Horizontal => match b {
            Some(b) => side_by_side(a, b, Axis::Horizontal),
            None => a.clone(),
        },
        CompareMode::Vertical => match b {
            Some(b) => side_by_side(a, b, Axis::Vertical),
            None => a.clone(),
        },
        CompareMode::Tile => match b {
            Some(b) => tile(&[a, b]),
            None => a.clone(),
        },
    }
}

/// `Tile` generalizes to N inputs even though `compose`'s two-input
/// signature only ever passes two; callers compositing a full layer stack
/// (more than A/B) call this directly.
pub fn tile(images: &[&Image]) -> Image {
    if images.is_empty() {
        return Image::new_rgba8(0, 0, Vec::new());
    }
    let n = images.len();
    let cols = (n as f64).sqrt().ceil() as u32;
    let rows = ((n as u32) + cols - 1) / cols;
    let cell_w = images[0].width;
    let cell_h = images[0].height;
    let canvas_w = cell_w * cols;
    let canvas_h = cell_h * rows;
    let mut out = vec![0u8; canvas_w as usize * canvas_h as usize * 4];
    for (idx, img) in images.iter().enumerate() {
        let col = (idx as u32) % cols;
        let row = (idx as u32) / cols;
        let ox = col * cell_w;
        let oy = row * cell_h;
        for y in 0..img.height.min(cell_h) {
            for x in 0..img.width.min(cell_w) {
                let px = img.get_pixel(x, y);
                let dst = helpers::pixel_offset(ox + x, oy + y, canvas_w);
                out[dst..dst + 4].copy_from_slice(&px);
            }
        }
    }
    Image::new_rgba8(canvas_w, canvas_h, out)
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn side_by_side(a: &Image, b: &Image, axis: Axis) -> Image {
    match axis {
        Axis::Horizontal => {
            let h = a.height.max(b.height);
            let w = a.width + b.width;
            let mut out = vec![0u8; w as usize * h as usize * 4];
            blit(&mut out, w, 0, 0, a);
            blit(&mut out, w, a.width, 0, b);
            Image::new_rgba8(w, h, out)
        }
        Axis::Vertical => {
            let w = a.width.max(b.width);
            let h = a.height + b.height;
            let mut out = vec![0u8; w as usize * h as usize * 4];
            blit(&mut out, w, 0, 0, a);
            blit(&mut out, w, 0, a.height, b);
            Image::new_rgba8(w, h, out)
        }
    }
}

fn blit(canvas: &mut [u8], canvas_width: u32, ox: u32, oy: u32, img: &Image) {
    for y in 0..img.height {
        for x in 0..img.width {
            let px = img.get_pixel(x, y);
            let dst = helpers::pixel_offset(ox + x, oy + y, canvas_width);
            canvas[dst..dst + 4].copy_from_slice(&px);
        }
    }
}

fn wipe(a: &Image, b: &Image, center: (f32, f32), rotation_degrees: f32) -> Image {
    let (w, h) = (a.width, a.height);
    let mut out = vec![0u8; w as usize * h as usize * 4];
    for y in 0..h {
        let ny = helpers::norm_y(y, h);
        for x in 0..w {
            let nx = helpers::norm_x(x, w);
            let side = helpers::wipe_side(nx, ny, center, rotation_degrees);
            let alpha = helpers::wipe_alpha(side, 0.0);
            let pa = a.get_pixel(x, y);
            let pb = b.get_pixel(x.min(b.width - 1), y.min(b.height - 1));
            let dst = helpers::pixel_offset(x, y, w);
            for c in 0..4 {
                out[dst + c] = helpers::blend_byte(pa[c], pb[c], alpha);
            }
        }
    }
    Image::new_rgba8(w, h, out)
}

fn overlay(a: &Image, b: &Image, amount: f32) -> Image {
    let alpha = helpers::clamp01(amount);
    let (w, h) = (a.width, a.height);
    let mut out = vec![0u8; w as usize * h as usize * 4];
    par_rows(&mut out, w, h, |y, row| {
        for x in 0..w {
            let pa = a.get_pixel(x, y);
            let pb = b.get_pixel(x.min(b.width - 1), y.min(b.height - 1));
            let dst = (x * 4) as usize;
            for c in 0..4 {
                // alpha weights A's opacity over B (spec: "alpha-blend A over B").
                row[dst + c] = helpers::blend_byte(pb[c], pa[c], alpha);
            }
        }
    });
    Image::new_rgba8(w, h, out)
}

fn difference(a: &Image, b: &Image) -> Image {
    let (w, h) = (a.width, a.height);
    let mut out = vec![0u8; w as usize * h as usize * 4];
    par_rows(&mut out, w, h, |y, row| {
        for x in 0..w {
            let pa = a.get_pixel(x, y);
            let pb = b.get_pixel(x.min(b.width - 1), y.min(b.height - 1));
            let dst = (x * 4) as usize;
            for c in 0..3 {
                row[dst + c] = helpers::diff_byte(pa[c], pb[c]);
            }
            row[dst + 3] = 255;
        }
    });
    Image::new_rgba8(w, h, out)
}

/// Split `out` into per-row chunks and process them on the rayon pool —
/// comparison modes are embarrassingly parallel across rows, and a full
/// 1080p `Difference`/`Overlay` pass is the Compositor's hottest loop.
fn par_rows(out: &mut [u8], width: u32, height: u32, f: impl Fn(u32, &mut [u8]) + Sync) {
    use rayon::prelude::*;
    let row_bytes = width as usize * 4;
    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| f(y as u32, row));
    let _ = height;
}

trait ClonedOr {
    fn cloned_or(&self, fallback: &Image) -> Image;
}

impl ClonedOr for Option<&Image> {
    fn cloned_or(&self, fallback: &Image) -> Image {
        match self {
            Some(img) => (*img).clone(),
            None => fallback.clone(),
        }
    }
}

/// Resolve the comparison's secondary clock against the primary per
/// `CompareTimeMode` (§4.J). `a_start`/`b_start` are each stream's own
/// timeline start; `a_time` is the already-resolved sample point on A.
pub fn resolve_compare_time(
    mode: CompareTimeMode,
    a_time: crate::time::RationalTime,
    a_start: crate::time::RationalTime,
    b_start: crate::time::RationalTime,
) -> crate::time::RationalTime {
    match mode {
        CompareTimeMode::Relative => {
            let offset = a_time.sub(&a_start);
            b_start.add(&offset)
        }
        CompareTimeMode::Absolute => a_time,
    }
}

/// Re-export so `VideoData`-level callers don't need `crate::video` too.
pub use crate::video::VideoLayer;

pub fn primary_layer(data: &VideoData) -> Option<&Image> {
    data.layers.first().map(|l| &l.image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_info::PixelType;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Image {
        let mut data = vec![0u8; (w * h * 4) as usize];
        for px in data.chunks_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Image::new_rgba8(w, h, data)
    }

    #[test]
    fn wipe_vertical_splits_red_left_blue_right() {
        let red = solid(16, 16, [255, 0, 0, 255]);
        let blue = solid(16, 16, [0, 0, 255, 255]);
        let out = compose(
            CompareMode::Wipe { center: (0.5, 0.5), rotation_degrees: 0.0 },
            &red,
            Some(&blue),
        );
        assert_eq!(out.get_pixel(3, 8), [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(12, 8), [0, 0, 255, 255]);
    }

    #[test]
    fn difference_of_identical_images_is_zero() {
        let img = solid(4, 4, [10, 20, 30, 255]);
        let out = compose(CompareMode::Difference, &img, Some(&img));
        assert_eq!(out.get_pixel(0, 0), [0, 0, 0, 255]);
    }

    #[test]
    fn overlay_zero_amount_is_pure_b() {
        let a = solid(2, 2, [255, 0, 0, 255]);
        let b = solid(2, 2, [0, 255, 0, 255]);
        let out = compose(CompareMode::Overlay { amount: 0.0 }, &a, Some(&b));
        assert_eq!(out.get_pixel(0, 0), [0, 255, 0, 255]);
    }

    #[test]
    fn horizontal_places_a_then_b() {
        let a = solid(2, 2, [255, 0, 0, 255]);
        let b = solid(2, 2, [0, 0, 255, 255]);
        let out = compose(CompareMode::Horizontal, &a, Some(&b));
        assert_eq!(out.width, 4);
        assert_eq!(out.get_pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(2, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn tile_arranges_near_square_grid() {
        let a = solid(2, 2, [255, 0, 0, 255]);
        let b = solid(2, 2, [0, 255, 0, 255]);
        let c = solid(2, 2, [0, 0, 255, 255]);
        let out = tile(&[&a, &b, &c]);
        assert_eq!(out.width, 4);
        assert_eq!(out.height, 4);
    }

    #[test]
    fn compare_mode_a_is_identity() {
        let a = solid(2, 2, [1, 2, 3, 4]);
        let out = compose(CompareMode::A, &a, None);
        assert_eq!(out.get_pixel(0, 0), [1, 2, 3, 4]);
    }

    #[test]
    fn pixel_type_defaults_to_rgba8() {
        let a = solid(1, 1, [0, 0, 0, 0]);
        assert_eq!(a.pixel_type, PixelType::RGBA8);
    }
}
