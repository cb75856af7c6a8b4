//! Error types for gangway_guard

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    /// The video source could not produce a frame. Fatal to the monitor loop.
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Artifact error: {0}")]
    Artifact(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Frame is {frame:?} but the reference is {reference:?}")]
    FrameMismatch {
        frame: (u32, u32),
        reference: (u32, u32),
    },

    #[error("Display error: {0}")]
    Display(String),
}

pub type Result<T> = std::result::Result<T, GuardError>;
