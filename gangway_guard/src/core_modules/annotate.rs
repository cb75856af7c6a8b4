//! Drawing helpers for operator-facing output.
//!
//! Everything here works on plain `RgbImage`s so the same overlays end up in
//! the live view and in the saved blockage artifact.

use crate::core_modules::blockage::BlockageRecord;
use crate::core_modules::candidate::BoundingBox;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

pub const BLOCKAGE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const PERSON_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Candidates suppressed because a person overlaps them.
pub const SUPPRESSED_COLOR: Rgb<u8> = Rgb([255, 160, 0]);

pub const BOX_THICKNESS: u32 = 2;
const BANNER_HEIGHT: u32 = 12;

/// Draws a hollow rectangle, clipped to the image.
pub fn draw_box(image: &mut RgbImage, bounds: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (width, height) = image.dimensions();
    let x1 = bounds.x1.min(width);
    let y1 = bounds.y1.min(height);
    let x2 = bounds.x2.min(width);
    let y2 = bounds.y2.min(height);
    if x1 >= x2 || y1 >= y2 {
        return;
    }

    for y in y1..y2 {
        for x in x1..x2 {
            let on_edge = x < x1 + thickness || x + thickness >= x2 || y < y1 + thickness || y + thickness >= y2;
            if on_edge {
                image.put_pixel(x, y, color);
            }
        }
    }
}

/// Paints a solid bar across the top of the frame. This is the "blockage
/// detected" marker carried by every frame shown while frozen.
pub fn draw_banner(image: &mut RgbImage, color: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for y in 0..BANNER_HEIGHT.min(height) {
        for x in 0..width {
            image.put_pixel(x, y, color);
        }
    }
}

pub fn thumbnail(image: &RgbImage, size: u32) -> RgbImage {
    imageops::resize(image, size, size, FilterType::Triangle)
}

/// Composites `thumbnail` into the top-left corner of `image`.
pub fn overlay_thumbnail(image: &mut RgbImage, thumbnail: &RgbImage) {
    imageops::overlay(image, thumbnail, 0, 0);
}

/// The annotated snapshot written as the blockage artifact.
pub fn render_blockage(record: &BlockageRecord) -> RgbImage {
    let mut image = record.snapshot.image().clone();
    for candidate in &record.candidates {
        draw_box(&mut image, &candidate.bounds, BLOCKAGE_COLOR, BOX_THICKNESS);
    }
    draw_banner(&mut image, BLOCKAGE_COLOR);
    image
}
