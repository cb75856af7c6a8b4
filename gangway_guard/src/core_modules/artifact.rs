//! Persistence of blockage snapshots.

use crate::error::Result;
use image::{ImageFormat, RgbImage};
use std::path::PathBuf;
use tracing::debug;

/// Destination for the annotated blockage snapshot.
pub trait ArtifactSink: Send {
    /// Stores the image and returns where it went.
    fn persist(&mut self, image: &RgbImage) -> Result<PathBuf>;
}

/// Writes JPEG snapshots to one fixed path, overwriting the previous one.
#[derive(Debug, Clone)]
pub struct JpegArtifactWriter {
    path: PathBuf,
}

impl JpegArtifactWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactSink for JpegArtifactWriter {
    fn persist(&mut self, image: &RgbImage) -> Result<PathBuf> {
        image.save_with_format(&self.path, ImageFormat::Jpeg)?;
        debug!(path = %self.path.display(), "blockage artifact written");
        Ok(self.path.clone())
    }
}
