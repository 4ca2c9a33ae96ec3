// SPDX-License-Identifier: GPL-3.0-only

//! Luminance extraction and image preprocessing for decode strategies
//!
//! Every function here takes its input by reference and returns a new
//! buffer. Frames are shared between threads and are never modified in place.

use crate::backends::camera::types::{Frame, PixelFormat};
use crate::constants::decode::{CONTRAST_PIVOT, LUMINANCE_BUCKETS, LUMINANCE_SHIFT};

/// Tightly packed 8-bit greyscale image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl LumaImage {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    /// Image of a single uniform value
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest and largest sample, `None` for an empty image
    pub fn range(&self) -> Option<(u8, u8)> {
        let min = *self.data.iter().min()?;
        let max = *self.data.iter().max()?;
        Some((min, max))
    }
}

/// ITU-R BT.601 luminance with integer math: (77R + 150G + 29B) >> 8
#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// Extract luminance from a frame, dropping any stride padding
///
/// Returns `None` when the buffer is shorter than the frame claims.
pub fn frame_to_luma(frame: &Frame) -> Option<LumaImage> {
    if !frame.is_complete() {
        return None;
    }

    let width = frame.width as usize;
    let height = frame.height as usize;
    let stride = frame.stride as usize;
    let mut data = Vec::with_capacity(width * height);

    for y in 0..height {
        let row = &frame.data[y * stride..];
        match frame.format {
            PixelFormat::Gray8 => data.extend_from_slice(&row[..width]),
            PixelFormat::Rgb24 => {
                data.extend(row[..width * 3].chunks_exact(3).map(|p| luma(p[0], p[1], p[2])))
            }
            PixelFormat::Rgba => {
                data.extend(row[..width * 4].chunks_exact(4).map(|p| luma(p[0], p[1], p[2])))
            }
            // Y0 U Y1 V: luminance sits on even bytes
            PixelFormat::Yuyv => data.extend(row[..width * 2].iter().step_by(2).copied()),
        }
    }

    Some(LumaImage::new(width, height, data))
}

/// Downscale so neither side exceeds `max_dimension`, using bilinear interpolation
///
/// Images already within bounds are returned unchanged.
pub fn downscale_to_fit(image: LumaImage, max_dimension: u32) -> LumaImage {
    let max_dimension = max_dimension.max(1) as usize;
    if image.width <= max_dimension && image.height <= max_dimension {
        return image;
    }

    let scale = (image.width as f32 / max_dimension as f32).max(image.height as f32 / max_dimension as f32);
    let dst_width = ((image.width as f32 / scale) as usize).max(1);
    let dst_height = ((image.height as f32 / scale) as usize).max(1);
    downscale(&image, dst_width, dst_height)
}

fn downscale(src: &LumaImage, dst_width: usize, dst_height: usize) -> LumaImage {
    let mut result = Vec::with_capacity(dst_width * dst_height);

    let x_ratio = src.width as f32 / dst_width as f32;
    let y_ratio = src.height as f32 / dst_height as f32;

    for y in 0..dst_height {
        for x in 0..dst_width {
            let src_x = x as f32 * x_ratio;
            let src_y = y as f32 * y_ratio;

            let x0 = (src_x as usize).min(src.width - 1);
            let y0 = (src_y as usize).min(src.height - 1);
            let x1 = (x0 + 1).min(src.width - 1);
            let y1 = (y0 + 1).min(src.height - 1);

            let x_frac = src_x - x0 as f32;
            let y_frac = src_y - y0 as f32;

            let p00 = src.get(x0, y0) as f32;
            let p01 = src.get(x1, y0) as f32;
            let p10 = src.get(x0, y1) as f32;
            let p11 = src.get(x1, y1) as f32;

            let value = p00 * (1.0 - x_frac) * (1.0 - y_frac)
                + p01 * x_frac * (1.0 - y_frac)
                + p10 * (1.0 - x_frac) * y_frac
                + p11 * x_frac * y_frac;

            result.push(value.round().clamp(0.0, 255.0) as u8);
        }
    }

    LumaImage::new(dst_width, dst_height, result)
}

/// Contrast stretch around mid grey: `clamp((v - 128) * gain + 128)`
pub fn contrast_stretch(image: &LumaImage, gain: f32) -> LumaImage {
    let mut lut = [0u8; 256];
    for (value, entry) in lut.iter_mut().enumerate() {
        let stretched = (value as f32 - CONTRAST_PIVOT) * gain + CONTRAST_PIVOT;
        *entry = stretched.clamp(0.0, 255.0) as u8;
    }

    LumaImage::new(
        image.width,
        image.height,
        image.data.iter().map(|&v| lut[v as usize]).collect(),
    )
}

/// Global black point from the luminance histogram
///
/// Buckets luminance into 32 bins, finds the tallest peak and a second peak
/// weighted by distance from it, then picks the deepest valley between them.
/// Returns `None` when the histogram is not bimodal enough to separate dark
/// modules from background.
pub fn global_histogram_threshold(image: &LumaImage) -> Option<u8> {
    if image.is_empty() {
        return None;
    }

    let mut buckets = [0u64; LUMINANCE_BUCKETS];
    for &value in &image.data {
        buckets[(value >> LUMINANCE_SHIFT) as usize] += 1;
    }

    let mut max_bucket_count = 0;
    let mut first_peak = 0;
    let mut first_peak_size = 0;
    for (x, &count) in buckets.iter().enumerate() {
        if count > first_peak_size {
            first_peak = x;
            first_peak_size = count;
        }
        max_bucket_count = max_bucket_count.max(count);
    }

    let mut second_peak = 0;
    let mut second_peak_score = 0;
    for (x, &count) in buckets.iter().enumerate() {
        let distance = x.abs_diff(first_peak) as u64;
        let score = count * distance * distance;
        if score > second_peak_score {
            second_peak = x;
            second_peak_score = score;
        }
    }

    // Only one populated bucket
    if second_peak_score == 0 {
        return None;
    }

    let (low, high) = if first_peak > second_peak {
        (second_peak, first_peak)
    } else {
        (first_peak, second_peak)
    };

    if high - low <= LUMINANCE_BUCKETS / 16 {
        return None;
    }

    let mut best_valley = high - 1;
    let mut best_valley_score = None;
    for x in (low + 1..high).rev() {
        let from_low = (x - low) as u64;
        let score = from_low * from_low * (high - x) as u64 * (max_bucket_count - buckets[x]);
        if best_valley_score.is_none_or(|best| score > best) {
            best_valley = x;
            best_valley_score = Some(score);
        }
    }

    Some((best_valley << LUMINANCE_SHIFT) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn bimodal(dark: u8, light: u8) -> LumaImage {
        let data = (0..64).map(|i| if i % 2 == 0 { dark } else { light }).collect();
        LumaImage::new(8, 8, data)
    }

    #[test]
    fn test_luma_from_rgb_with_stride_padding() {
        let data: Vec<u8> = vec![
            255, 255, 255, 0, 0, 0, // row 0
            9, 9, // stride padding
            255, 0, 0, 0, 0, 255, // row 1
            9, 9, // stride padding
        ];
        let frame = Frame {
            width: 2,
            height: 2,
            data: Arc::from(data.as_slice()),
            format: PixelFormat::Rgb24,
            stride: 8,
            captured_at: Instant::now(),
            sequence: 0,
        };

        let image = frame_to_luma(&frame).unwrap();
        assert_eq!(image.width, 2);
        assert_eq!(image.data[0], 255);
        assert_eq!(image.data[1], 0);
        assert_eq!(image.data[2], 76); // pure red
        assert_eq!(image.data[3], 28); // pure blue
    }

    #[test]
    fn test_luma_from_yuyv_takes_y_samples() {
        let frame = Frame::new(4, 1, PixelFormat::Yuyv, vec![10, 128, 20, 128, 30, 128, 40, 128]);
        let image = frame_to_luma(&frame).unwrap();
        assert_eq!(image.data, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_truncated_frame_has_no_luma() {
        let frame = Frame::new(4, 4, PixelFormat::Gray8, vec![0; 10]);
        assert!(frame_to_luma(&frame).is_none());
    }

    #[test]
    fn test_contrast_stretch_formula() {
        let image = LumaImage::new(5, 1, vec![0, 70, 128, 186, 255]);
        let stretched = contrast_stretch(&image, 1.5);
        assert_eq!(stretched.data, vec![0, 41, 128, 215, 255]);
        // Input untouched
        assert_eq!(image.data, vec![0, 70, 128, 186, 255]);
    }

    #[test]
    fn test_downscale_preserves_gradient_direction() {
        let data = (0..16u32).flat_map(|_| (0..16u32).map(|x| (x * 16) as u8)).collect();
        let image = LumaImage::new(16, 16, data);
        let small = downscale_to_fit(image, 4);

        assert_eq!((small.width, small.height), (4, 4));
        assert!(small.get(0, 0) < 64);
        assert!(small.get(3, 0) > 150);
    }

    #[test]
    fn test_downscale_skips_small_images() {
        let image = LumaImage::filled(10, 10, 7);
        assert_eq!(downscale_to_fit(image.clone(), 640), image);
    }

    #[test]
    fn test_global_threshold_splits_bimodal_image() {
        let threshold = global_histogram_threshold(&bimodal(20, 230)).unwrap();
        assert!(threshold > 20 && threshold <= 230, "threshold was {}", threshold);
    }

    #[test]
    fn test_global_threshold_rejects_flat_image() {
        assert_eq!(global_histogram_threshold(&LumaImage::filled(8, 8, 128)), None);
        assert_eq!(global_histogram_threshold(&bimodal(120, 130)), None);
    }
}
