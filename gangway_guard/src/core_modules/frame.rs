// THEORY:
// A `Frame` is the unit of work that flows through the pipeline. It is produced
// once by the video source and never mutated afterwards, so the pixel buffer is
// shared behind an `Arc`. That lets the reference manager keep a baseline and the
// state machine keep a blockage snapshot without copying the raster, while the
// caller still hands the frame over by value.

use image::RgbImage;
use std::sync::Arc;
use std::time::Duration;

/// A captured RGB image and the moment it was captured.
#[derive(Debug, Clone)]
pub struct Frame {
    image: Arc<RgbImage>,
    /// Capture time, measured from the start of the stream.
    timestamp: Duration,
    /// Monotonic position of this frame in the stream.
    sequence: u64,
}

impl Frame {
    pub fn new(image: RgbImage, timestamp: Duration, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp,
            sequence,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// True when both handles refer to the very same capture.
    pub fn is_same_capture(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.image, &other.image) && self.sequence == other.sequence
    }
}
