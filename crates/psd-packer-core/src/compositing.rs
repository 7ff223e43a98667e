//! Pixel-buffer backend used by atlases and the spritesheet assembler.
//! Everything works on CPU-side `RgbaImage`s; nothing here touches a GPU.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{PsdPackerError, Result};

/// Creates a fully transparent canvas.
pub fn create_canvas(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]))
}

/// Copies `src` into `canvas` with its top-left at (dx, dy). Pixels falling outside
/// the canvas are clipped. Pixels are replaced, not blended.
pub fn put_pixels(canvas: &mut RgbaImage, src: &RgbaImage, dx: u32, dy: u32) {
    let (cw, ch) = canvas.dimensions();
    let (sw, sh) = src.dimensions();
    for yy in 0..sh {
        let ty = dy as u64 + yy as u64;
        if ty >= ch as u64 {
            break;
        }
        for xx in 0..sw {
            let tx = dx as u64 + xx as u64;
            if tx >= cw as u64 {
                break;
            }
            canvas.put_pixel(tx as u32, ty as u32, *src.get_pixel(xx, yy));
        }
    }
}

/// Same as [`put_pixels`] for an interleaved RGBA byte buffer of `width * height * 4` bytes.
pub fn put_raw_pixels(
    canvas: &mut RgbaImage,
    pixels: &[u8],
    width: u32,
    height: u32,
    dx: u32,
    dy: u32,
) -> Result<()> {
    let src = RgbaImage::from_raw(width, height, pixels.to_vec()).ok_or_else(|| {
        PsdPackerError::InvalidConfig(format!(
            "pixel buffer of {} bytes does not match {}x{} RGBA",
            pixels.len(),
            width,
            height
        ))
    })?;
    put_pixels(canvas, &src, dx, dy);
    Ok(())
}

/// Returns a resized copy of `src`. `nearest_neighbor` keeps hard pixel edges (pixel art);
/// otherwise a bilinear filter is used.
pub fn resize_canvas(src: &RgbaImage, width: u32, height: u32, nearest_neighbor: bool) -> RgbaImage {
    if src.dimensions() == (width, height) {
        return src.clone();
    }
    let filter = if nearest_neighbor {
        FilterType::Nearest
    } else {
        FilterType::Triangle
    };
    imageops::resize(src, width, height, filter)
}

/// Encodes a canvas as PNG bytes.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    canvas
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| PsdPackerError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}
