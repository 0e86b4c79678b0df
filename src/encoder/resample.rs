//! Area-averaging resampler for luminance images
//!
//! Every output sample is the coverage-weighted mean of the source samples
//! its footprint overlaps. Down-scaling therefore averages whole blocks
//! instead of picking one sample, which keeps thin lines visible in the
//! small grids used for glyph output.

use std::ops::Deref;

use image::{GrayImage, ImageBuffer, Luma};

/// Source sample indices and weights contributing to one output sample.
type Taps = Vec<(usize, f32)>;

/// Compute per-output taps along one axis.
fn axis_taps(src_len: u32, dst_len: u32) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;

    (0..dst_len)
        .map(|i| {
            let start = i as f64 * scale;
            let end = ((i + 1) as f64 * scale).min(src_len as f64);

            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len as usize).max(first + 1);

            (first..last)
                .filter_map(|s| {
                    let overlap = (end.min((s + 1) as f64) - start.max(s as f64)) as f32;
                    (overlap > 0.0).then_some((s, overlap))
                })
                .collect()
        })
        .collect()
}

/// Resample `src` to exactly `width` x `height` with area averaging.
///
/// Both output dimensions must be non-zero. `src` may borrow its samples, so
/// a decoded frame can be resampled without copying it first.
pub fn resample_area<C>(src: &ImageBuffer<Luma<u8>, C>, width: u32, height: u32) -> GrayImage
where
    C: Deref<Target = [u8]>,
{
    let (src_w, src_h) = src.dimensions();
    if (src_w, src_h) == (width, height) {
        return GrayImage::from_fn(width, height, |x, y| *src.get_pixel(x, y));
    }

    let x_taps = axis_taps(src_w, width);
    let y_taps = axis_taps(src_h, height);

    // Horizontal pass into an intermediate src_h x width buffer
    let mut rows = vec![0f32; src_h as usize * width as usize];
    for y in 0..src_h {
        for (x, taps) in x_taps.iter().enumerate() {
            let (sum, weight) = taps.iter().fold((0f32, 0f32), |(sum, weight), &(sx, w)| {
                (sum + src.get_pixel(sx as u32, y).0[0] as f32 * w, weight + w)
            });
            rows[y as usize * width as usize + x] = if weight > 0.0 { sum / weight } else { 0.0 };
        }
    }

    // Vertical pass
    GrayImage::from_fn(width, height, |x, y| {
        let (sum, weight) =
            y_taps[y as usize].iter().fold((0f32, 0f32), |(sum, weight), &(sy, w)| {
                (sum + rows[sy * width as usize + x as usize] * w, weight + w)
            });
        let value = if weight > 0.0 { sum / weight } else { 0.0 };
        image::Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}
