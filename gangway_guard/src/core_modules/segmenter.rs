// THEORY:
// The `ForegroundSegmenter` turns "this frame vs. the baseline" into a clean
// binary occupancy mask. Raw per-pixel differencing is dominated by sensor and
// compression noise, so the mask goes through two morphology passes:
// 1.  **Opening** (erode, then dilate) with a small square element removes
//     isolated speckle that cannot be part of a real object.
// 2.  **Closing** (dilate, then erode) with a larger element fuses the
//     fragmented silhouette of a single physical object into one solid region,
//     which the candidate extractor relies on for its area filter.
// Both passes use rectangular elements, so each is computed separably as a row
// pass followed by a column pass.

use crate::core_modules::frame::Frame;
use crate::error::{GuardError, Result};
use image::{GrayImage, Luma};

const SET: u8 = 255;
const CLEAR: u8 = 0;

/// Binary mask of pixels that differ from the baseline.
#[derive(Debug, Clone)]
pub struct OccupancyMask {
    pixels: GrayImage,
}

impl OccupancyMask {
    pub fn from_image(pixels: GrayImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.pixels.get_pixel(x, y)[0] != CLEAR
    }

    /// Number of foreground pixels.
    pub fn count_set(&self) -> u64 {
        self.pixels.as_raw().iter().filter(|&&v| v != CLEAR).count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.as_raw().iter().all(|&v| v == CLEAR)
    }
}

#[derive(Debug, Clone)]
pub struct ForegroundSegmenter {
    threshold: u8,
    open_kernel: u32,
    close_kernel: u32,
}

impl ForegroundSegmenter {
    pub fn new(threshold: u8, open_kernel: u32, close_kernel: u32) -> Self {
        Self {
            threshold,
            open_kernel,
            close_kernel,
        }
    }

    pub fn segment(&self, frame: &Frame, reference: &Frame) -> Result<OccupancyMask> {
        if frame.dimensions() != reference.dimensions() {
            return Err(GuardError::FrameMismatch {
                frame: frame.dimensions(),
                reference: reference.dimensions(),
            });
        }

        let thresholded = self.difference_mask(frame, reference);
        let opened = dilate(&erode(&thresholded, self.open_kernel), self.open_kernel);
        let closed = erode(&dilate(&opened, self.close_kernel), self.close_kernel);
        Ok(OccupancyMask::from_image(closed))
    }

    /// Absolute difference, collapsed to luma, then binarised.
    fn difference_mask(&self, frame: &Frame, reference: &Frame) -> GrayImage {
        let (width, height) = frame.dimensions();
        let mut mask = GrayImage::new(width, height);
        for ((current, base), out) in frame
            .image()
            .pixels()
            .zip(reference.image().pixels())
            .zip(mask.pixels_mut())
        {
            let dr = current[0].abs_diff(base[0]) as u32;
            let dg = current[1].abs_diff(base[1]) as u32;
            let db = current[2].abs_diff(base[2]) as u32;
            // ITU-R BT.601 weights in fixed point.
            let gray = (dr * 299 + dg * 587 + db * 114 + 500) / 1000;
            *out = Luma([if gray > self.threshold as u32 { SET } else { CLEAR }]);
        }
        mask
    }
}

/// Offsets covered by a `size`-wide element anchored at its centre.
fn element_span(size: u32) -> (i64, i64) {
    let anchor = (size / 2) as i64;
    (-anchor, size as i64 - 1 - anchor)
}

/// Minimum filter. Pixels outside the image are ignored, so borders do not erode.
fn erode(mask: &GrayImage, size: u32) -> GrayImage {
    let (lo, hi) = element_span(size);
    rect_filter(mask, lo, hi, SET, u8::min)
}

/// Maximum filter over the reflected element, so closing and opening
/// leave rectangles in place even for even-sized elements.
fn dilate(mask: &GrayImage, size: u32) -> GrayImage {
    let (lo, hi) = element_span(size);
    rect_filter(mask, -hi, -lo, CLEAR, u8::max)
}

fn rect_filter(mask: &GrayImage, lo: i64, hi: i64, identity: u8, pick: fn(u8, u8) -> u8) -> GrayImage {
    let (width, height) = mask.dimensions();

    // --- 1. Row pass ---
    let mut rows = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = identity;
            for d in lo..=hi {
                let sx = x as i64 + d;
                if sx >= 0 && sx < width as i64 {
                    acc = pick(acc, mask.get_pixel(sx as u32, y)[0]);
                }
            }
            rows.put_pixel(x, y, Luma([acc]));
        }
    }

    // --- 2. Column pass ---
    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut acc = identity;
            for d in lo..=hi {
                let sy = y as i64 + d;
                if sy >= 0 && sy < height as i64 {
                    acc = pick(acc, rows.get_pixel(x, sy as u32)[0]);
                }
            }
            out.put_pixel(x, y, Luma([acc]));
        }
    }
    out
}
