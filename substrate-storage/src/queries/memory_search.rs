//! FTS5 full-text search queries.

use rusqlite::{params, Connection};

use substrate_core::errors::RepositoryError;
use substrate_core::memory::{Layer, MemoryRecord, MemoryType, SourceType};

use super::memory_crud::{row_to_memory, ListFilter};

/// One FTS5 hit: the memory, its raw `bm25()` rank (more negative is a
/// better match), and a snippet with matched terms bracketed.
pub struct Fts5Hit {
    pub memory: MemoryRecord,
    pub raw_rank: f64,
    pub snippet: String,
}

/// Search memories using FTS5 full-text search, ranked by BM25, with
/// optional `type`/`layer`/`source_type` predicates applied alongside the
/// match. `query` must already be sanitized into FTS5 MATCH syntax by the
/// caller.
pub fn search_fts5(
    conn: &Connection,
    query: &str,
    filter: &ListFilter,
    limit: usize,
) -> Result<Vec<Fts5Hit>, RepositoryError> {
    let mut clauses = vec!["memory_fts MATCH ?1".to_string(), "m.superseded_by IS NULL".to_string()];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.to_string())];

    if let Some(t) = filter.memory_type {
        clauses.push(format!("m.memory_type = ?{}", values.len() + 1));
        values.push(Box::new(memory_type_str(t).to_string()));
    }
    if let Some(l) = filter.layer {
        clauses.push(format!("m.layer = ?{}", values.len() + 1));
        values.push(Box::new(layer_str(l).to_string()));
    }
    if let Some(s) = filter.source_type {
        clauses.push(format!("m.source_type = ?{}", values.len() + 1));
        values.push(Box::new(source_type_str(s).to_string()));
    }

    let limit_idx = values.len() + 1;
    let sql = format!(
        "SELECT m.id, m.content, m.memory_type, m.layer, m.importance, m.confidence,
                m.tags, m.entities, m.source_type, m.conversation_id,
                m.supersedes, m.superseded_by, m.created_at, m.updated_at, m.accessed_at,
                m.access_count, m.checksum,
                fts.rank,
                snippet(memory_fts, 0, '>>>', '<<<', '...', 32)
         FROM memory_fts fts
         JOIN memories m ON m.rowid = fts.rowid
         WHERE {}
         ORDER BY rank
         LIMIT ?{limit_idx}",
        clauses.join(" AND ")
    );
    values.push(Box::new(limit as i64));

    let mut stmt = conn.prepare(&sql).map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;
    let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let raw_rank: f64 = row.get(17)?;
            let snippet: String = row.get(18)?;
            let memory_result = row_to_memory(row)?;
            Ok((memory_result, raw_rank, snippet))
        })
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;

    let mut results = Vec::new();
    for row in rows {
        let (memory_result, raw_rank, snippet) = row.map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
        results.push(Fts5Hit {
            memory: memory_result?,
            raw_rank,
            snippet,
        });
    }
    Ok(results)
}

fn layer_str(layer: Layer) -> &'static str {
    match layer {
        Layer::Stm => "stm",
        Layer::Ltm => "ltm",
    }
}

fn memory_type_str(t: MemoryType) -> &'static str {
    t.as_str()
}

fn source_type_str(s: SourceType) -> &'static str {
    match s {
        SourceType::Explicit => "explicit",
        SourceType::Implicit => "implicit",
        SourceType::Distilled => "distilled",
        SourceType::Imported => "imported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_match_clause_with_no_filter() {
        let filter = ListFilter::default();
        assert!(filter.memory_type.is_none());
    }
}
