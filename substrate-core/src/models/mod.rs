pub mod candidate_state;
pub mod embedding_row;
pub mod health_report;
pub mod provenance_event;
pub mod reindex_job;

pub use candidate_state::{CandidateState, CandidateStatus};
pub use embedding_row::EmbeddingRow;
pub use health_report::HealthReport;
pub use provenance_event::{ProvenanceEvent, ProvenanceEventKind};
pub use reindex_job::{ReindexJob, ReindexPhase, ReindexProgress};
