pub mod provenance;
pub mod record;
pub mod scores;

pub use provenance::{Provenance, SourceType};
pub use record::{dedup_preserve_order, Layer, MemoryRecord, MemoryType};
pub use scores::{Confidence, Importance, UnitScore};
