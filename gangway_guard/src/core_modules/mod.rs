pub mod annotate;
pub mod artifact;
pub mod blockage;
pub mod candidate;
pub mod candidate_extractor;
pub mod frame;
pub mod reconciler;
pub mod reference;
pub mod segmenter;
pub mod tracker;
