//! Pixel-to-glyph encoding.
//!
//! [`GlyphEncoder`] turns one [`RawFrame`] into a [`GlyphFrame`] through a fixed,
//! reproducible pipeline:
//!
//! 1. Reduce to single-channel luminance
//! 2. Area-average resample to exactly the render size
//! 3. Binarize at [`INK_THRESHOLD`]: samples `<= 127` are ink, brighter samples are blank
//! 4. Cut the grid into 2x4 tiles and pack each tile into an 8-bit dot code
//! 5. Map each code through the braille table
//! 6. Join rows with `\n`, dropping trailing empty lines
//!
//! Partial tiles at the right and bottom edges are dropped, so a 61x30 render
//! produces 30 glyphs per row and 7 rows.
//!
//! Encoding never fails outward: a frame that cannot be encoded produces a
//! diagnostic [`GlyphFrame`] instead, and playback carries on.
//!
//! ## Usage Example
//!
//! ```rust
//! use glyphcast::encoder::{BLANK_GLYPH, GlyphEncoder};
//! use glyphcast::types::{RawFrame, RenderSize};
//!
//! let encoder = GlyphEncoder::new(RenderSize::new(8, 8));
//! let frame = encoder.encode(&RawFrame::filled(64, 64, 255));
//!
//! assert_eq!(frame.line_count(), 2);
//! assert!(frame.lines().all(|row| row.chars().all(|c| c == BLANK_GLYPH)));
//! ```

mod braille;
mod resample;

pub use braille::{
    BLANK_GLYPH, BRAILLE_BASE, DOT_LAYOUT, FULL_GLYPH, GLYPH_TABLE, TILE_COLS, TILE_ROWS,
    glyph_for, pack_tile,
};
pub use resample::resample_area;

use image::buffer::ConvertBuffer;
use image::{GrayImage, ImageBuffer, Luma, Rgb, Rgba};

use crate::types::{GlyphFrame, RawFrame, RenderSize};

/// Samples at or below this luminance are inked.
pub const INK_THRESHOLD: u8 = 127;

/// Encoder failures. Never escape [`GlyphEncoder::encode`]; they are rendered
/// into a diagnostic frame.
#[derive(Debug, thiserror::Error)]
enum EncodeError {
    #[error("render size {0} has a zero dimension")]
    EmptyRenderSize(RenderSize),

    #[error("source frame {0}x{1} is empty")]
    EmptyFrame(u32, u32),

    #[error("{channels}-channel buffer does not match {width}x{height}")]
    Buffer { width: u32, height: u32, channels: u8 },
}

/// Stateless braille encoder configured with an output render size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphEncoder {
    size: RenderSize,
}

impl GlyphEncoder {
    pub fn new(size: RenderSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> RenderSize {
        self.size
    }

    /// Glyph grid produced for this render size as `(columns, rows)`.
    pub fn grid(&self) -> (usize, usize) {
        (self.size.width as usize / TILE_COLS, self.size.height as usize / TILE_ROWS)
    }

    /// Encode one frame. Failures come back as a diagnostic frame.
    pub fn encode(&self, frame: &RawFrame) -> GlyphFrame {
        match self.try_encode(frame) {
            Ok(text) => GlyphFrame::new(text),
            Err(e) => {
                tracing::warn!("Frame encoding failed: {}", e);
                GlyphFrame::diagnostic(e)
            }
        }
    }

    fn try_encode(&self, frame: &RawFrame) -> Result<String, EncodeError> {
        let RenderSize { width, height } = self.size;
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyRenderSize(self.size));
        }
        if frame.width() == 0 || frame.height() == 0 {
            return Err(EncodeError::EmptyFrame(frame.width(), frame.height()));
        }

        let resized = resample_luma(frame, width, height)?;
        Ok(pack_glyphs(&resized))
    }
}

/// Encode with an explicit render size.
pub fn encode(frame: &RawFrame, size: RenderSize) -> GlyphFrame {
    GlyphEncoder::new(size).encode(frame)
}

/// Reduce `frame` to luminance and resample it, borrowing the frame buffer.
///
/// Color input goes through the `image` crate's luma conversion (Rec. 709
/// weights, alpha ignored).
fn resample_luma(frame: &RawFrame, width: u32, height: u32) -> Result<GrayImage, EncodeError> {
    let (src_w, src_h, channels) = (frame.width(), frame.height(), frame.channels());
    let data = frame.data();

    let resized = match channels {
        1 => ImageBuffer::<Luma<u8>, &[u8]>::from_raw(src_w, src_h, data)
            .map(|gray| resample_area(&gray, width, height)),
        3 => ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(src_w, src_h, data).map(|rgb| {
            let gray: GrayImage = rgb.convert();
            resample_area(&gray, width, height)
        }),
        4 => ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(src_w, src_h, data).map(|rgba| {
            let gray: GrayImage = rgba.convert();
            resample_area(&gray, width, height)
        }),
        _ => None,
    };

    resized.ok_or(EncodeError::Buffer { width: src_w, height: src_h, channels })
}

/// Binarize and tile a resampled grid into braille rows.
fn pack_glyphs(grid: &GrayImage) -> String {
    let (width, height) = (grid.width() as usize, grid.height() as usize);
    let cols = width / TILE_COLS;
    let rows = height / TILE_ROWS;

    let mut out = String::with_capacity(rows * (cols * 3 + 1));
    for tile_y in 0..rows {
        for tile_x in 0..cols {
            let code = pack_tile(|col, row| {
                let x = (tile_x * TILE_COLS + col) as u32;
                let y = (tile_y * TILE_ROWS + row) as u32;
                grid.get_pixel(x, y).0[0] <= INK_THRESHOLD
            });
            out.push(glyph_for(code));
        }
        out.push('\n');
    }

    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient(width: u32, height: u32) -> RawFrame {
        let data = (0..height)
            .flat_map(|y| (0..width).map(move |x| ((x * 255 / width.max(1)) ^ (y * 7)) as u8))
            .collect();
        RawFrame::luma(width, height, data).unwrap()
    }

    proptest! {
        #[test]
        fn output_grid_matches_render_size(
            src_w in 1u32..96,
            src_h in 1u32..96,
            out_w in 2u32..80,
            out_h in 4u32..60,
        ) {
            let frame = encode(&gradient(src_w, src_h), RenderSize::new(out_w, out_h));
            prop_assert_eq!(frame.line_count(), (out_h / 4) as usize);
            prop_assert_eq!(frame.max_line_len(), (out_w / 2) as usize);
        }

        #[test]
        fn encoding_is_deterministic(
            src_w in 1u32..64,
            src_h in 1u32..64,
            out_w in 1u32..40,
            out_h in 1u32..40,
        ) {
            let raw = gradient(src_w, src_h);
            let size = RenderSize::new(out_w, out_h);
            prop_assert_eq!(encode(&raw, size), encode(&raw, size));
        }

        #[test]
        fn white_frames_are_blank(w in 1u32..50, h in 1u32..50, out_w in 2u32..40, out_h in 4u32..40) {
            let frame = encode(&RawFrame::filled(w, h, 255), RenderSize::new(out_w, out_h));
            prop_assert!(frame.lines().flat_map(str::chars).all(|c| c == BLANK_GLYPH));
        }

        #[test]
        fn black_frames_are_full(w in 1u32..50, h in 1u32..50, out_w in 2u32..40, out_h in 4u32..40) {
            let frame = encode(&RawFrame::filled(w, h, 0), RenderSize::new(out_w, out_h));
            prop_assert!(frame.lines().flat_map(str::chars).all(|c| c == FULL_GLYPH));
        }
    }

    #[test]
    fn threshold_is_inclusive_at_127() {
        let size = RenderSize::new(2, 4);
        assert_eq!(encode(&RawFrame::filled(2, 4, 127), size).as_str(), "⣿");
        assert_eq!(encode(&RawFrame::filled(2, 4, 128), size).as_str(), "⠀");
    }

    #[test]
    fn partial_tiles_are_truncated() {
        let frame = encode(&RawFrame::filled(10, 10, 0), RenderSize::new(7, 9));
        assert_eq!(frame.as_str(), "⣿⣿⣿\n⣿⣿⣿");
    }

    #[test]
    fn left_column_ink_sets_dots_1_2_3_7() {
        // 2x4 frame, left column black, right column white
        let data = vec![0, 255, 0, 255, 0, 255, 0, 255];
        let raw = RawFrame::luma(2, 4, data).unwrap();
        let frame = encode(&raw, RenderSize::new(2, 4));
        assert_eq!(frame.as_str(), "⡇");
    }

    #[test]
    fn color_frames_are_reduced_to_luminance() {
        let black = RawFrame::new(4, 4, 3, vec![0; 48]).unwrap();
        let white = RawFrame::new(4, 4, 4, vec![255; 64]).unwrap();
        let size = RenderSize::new(4, 4);
        assert_eq!(encode(&black, size).as_str(), "⣿⣿");
        assert_eq!(encode(&white, size).as_str(), "⠀⠀");
    }

    #[test]
    fn color_conversion_matches_image_luma() {
        let rgb: Vec<u8> =
            (0..64u32).flat_map(|i| [(i * 4) as u8, (255 - i * 3) as u8, (i * 2) as u8]).collect();
        let frame = RawFrame::new(8, 8, 3, rgb.clone()).unwrap();
        let luma = image::DynamicImage::ImageRgb8(image::RgbImage::from_raw(8, 8, rgb).unwrap())
            .to_luma8();
        let expected = RawFrame::luma(8, 8, luma.into_raw()).unwrap();

        let size = RenderSize::new(8, 8);
        assert_eq!(encode(&frame, size), encode(&expected, size));
    }

    #[test]
    fn tiny_render_sizes_produce_empty_frames() {
        let frame = encode(&RawFrame::filled(8, 8, 0), RenderSize::new(1, 3));
        assert_eq!(frame.as_str(), "");
    }

    #[test]
    fn empty_source_frame_yields_diagnostic() {
        let frame = encode(&RawFrame::filled(0, 0, 0), RenderSize::new(8, 8));
        assert_eq!(frame.as_str(), "frame conversion failed: source frame 0x0 is empty");
    }

    #[test]
    fn zero_render_size_yields_diagnostic() {
        let frame = encode(&RawFrame::filled(8, 8, 0), RenderSize::new(0, 30));
        assert!(frame.starts_with("frame conversion failed"));
    }
}
