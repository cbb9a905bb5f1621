//! SQLite persistence: connection pooling, schema migrations, FTS5 search,
//! and brute-force vector search. No knowledge of the Markdown mirror or the
//! dual-write protocol lives here — that's [`substrate_repository`].

pub mod engine;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;
pub use queries::memory_crud::ListFilter;
pub use queries::memory_search::Fts5Hit;
