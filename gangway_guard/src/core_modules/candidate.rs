// THEORY:
// The `candidate` module holds the "dumb" geometric data containers shared by
// every stage after segmentation. A `CandidateBox` is a per-frame snapshot of one
// foreground region; it carries no identity. Identity over time is the tracker's
// job, and person boxes come from an external detector, so both are expressed in
// terms of the same `BoundingBox` to keep the overlap math in one place.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in frame pixel coordinates.
///
/// `(x1, y1)` is the inclusive top-left corner and `(x2, y2)` the exclusive
/// bottom-right corner, so `x2 - x1` is the width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Builds a box from two corners, normalising their order.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// The overlapping region of two boxes, if it has positive area.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);
        if x1 < x2 && y1 < y2 {
            Some(BoundingBox { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.intersection(other).is_some()
    }

    /// Intersection over union, in `[0, 1]`.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let inter = match self.intersection(other) {
            Some(region) => region.area(),
            None => return 0.0,
        };
        let union = self.area() + other.area() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f64 / union as f64
        }
    }
}

/// A potential obstruction found in a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CandidateBox {
    /// Bounding rectangle of the region (and of its convex hull).
    pub bounds: BoundingBox,
    /// Filled pixel area of the region that produced the box.
    pub region_area: u64,
}

impl CandidateBox {
    pub fn new(bounds: BoundingBox, region_area: u64) -> Self {
        Self { bounds, region_area }
    }
}

/// A person detection supplied by the external detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonBox {
    pub bounds: BoundingBox,
    pub confidence: f32,
}

impl PersonBox {
    pub fn new(bounds: BoundingBox, confidence: f32) -> Self {
        Self { bounds, confidence }
    }
}
