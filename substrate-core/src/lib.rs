//! Shared types, traits, errors, and configuration for the memory substrate.
//!
//! Every other crate in this workspace depends on this one and none of it
//! touches SQLite, the filesystem, or the network directly.

pub mod config;
pub mod constants;
pub mod errors;
pub mod memory;
pub mod models;
pub mod traits;

pub use config::ServiceConfig;
pub use errors::{ErrorCode, MemoryError, MemoryResult, Severity};
pub use memory::{Confidence, Importance, Layer, MemoryRecord, MemoryType, Provenance, SourceType};
pub use traits::{CancelToken, Clock, DistillationProvider, EmbeddingProvider, SystemClock};
