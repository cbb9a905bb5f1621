//! Pattern Detector (C10): clusters recurring short-term memories by a
//! blended content/tag similarity, scores each cluster's confidence, and
//! promotes the confident ones to preference long-term memories with an
//! evidence chain back to their sources.

mod clustering;
mod decay;
mod detector;
mod error;
mod normalize;
mod pattern;

pub use clustering::build_clusters;
pub use decay::decay_patterns;
pub use detector::PatternDetector;
pub use error::PatternError;
pub use pattern::DetectedPattern;
