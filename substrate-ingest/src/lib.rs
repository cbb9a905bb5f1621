//! Sidecar Ingestor (C13): imports externally authored Markdown memory
//! files into the repository, quarantining anything that fails to parse
//! instead of aborting the whole batch.

mod error;
mod ingestor;
mod quarantine;
mod report;

pub use error::IngestError;
pub use ingestor::Ingestor;
pub use report::IngestReport;
