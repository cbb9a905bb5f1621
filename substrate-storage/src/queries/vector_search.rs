//! Brute-force cosine similarity search over stored embeddings, scoped to a
//! single `(provider_id, model_id)` generation.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use substrate_core::errors::{RepositoryError, SearchError};
use substrate_core::memory::MemoryRecord;

/// Search memories by vector similarity for one provider/model generation.
/// Returns `(memory, cosine_similarity)` pairs ordered by similarity
/// descending.
pub fn search_vector(
    conn: &Connection,
    provider_id: &str,
    model_id: &str,
    query_embedding: &[f32],
    limit: usize,
) -> Result<Vec<(MemoryRecord, f64)>, SearchError> {
    let mut stmt = conn
        .prepare(
            "SELECT memory_id, embedding, dimensions
             FROM memory_embeddings
             WHERE provider_id = ?1 AND model_id = ?2",
        )
        .map_err(|e| SearchError::SearchFailed {
            reason: e.to_string(),
        })?;

    let rows = stmt
        .query_map(params![provider_id, model_id], |row| {
            let memory_id: String = row.get(0)?;
            let embedding_blob: Vec<u8> = row.get(1)?;
            let dimensions: i64 = row.get(2)?;
            Ok((memory_id, embedding_blob, dimensions))
        })
        .map_err(|e| SearchError::SearchFailed {
            reason: e.to_string(),
        })?;

    let query_len = query_embedding.len();
    let query_norm_sq: f64 = query_embedding.iter().map(|x| (*x as f64) * (*x as f64)).sum();
    if query_norm_sq == 0.0 {
        return Ok(vec![]);
    }

    let mut scored: Vec<(String, f64)> = Vec::new();
    for row in rows {
        let (memory_id, blob, dims) = row.map_err(|e| SearchError::SearchFailed {
            reason: e.to_string(),
        })?;
        if dims as usize != query_len {
            return Err(SearchError::DimensionMismatch {
                expected: query_len,
                actual: dims as usize,
            });
        }
        let stored = bytes_to_f32_vec(&blob, dims as usize);
        let sim = cosine_similarity(query_embedding, &stored).clamp(0.0, 1.0);
        scored.push((memory_id, sim));
    }

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let mut results = Vec::with_capacity(scored.len());
    for (memory_id, sim) in scored {
        if let Some(memory) =
            super::memory_crud::get_memory(conn, &memory_id).map_err(|e| SearchError::SearchFailed {
                reason: e.to_string(),
            })?
        {
            results.push((memory, sim));
        }
    }

    Ok(results)
}

/// List `(memory_id, content)` pairs for every memory currently embedded
/// under `(provider_id, model_id)` — the reindex job's input set.
pub fn list_embedded(
    conn: &Connection,
    provider_id: &str,
    model_id: &str,
) -> Result<Vec<(String, String)>, RepositoryError> {
    let mut stmt = conn
        .prepare(
            "SELECT m.id, m.content FROM memory_embeddings e
             JOIN memories m ON m.id = e.memory_id
             WHERE e.provider_id = ?1 AND e.model_id = ?2
             ORDER BY m.id",
        )
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    let rows = stmt
        .query_map(params![provider_id, model_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?);
    }
    Ok(out)
}

/// Replace a memory's embedding: delete the `(old_provider, old_model)` row
/// and insert the `(new_provider, new_model)` row in a single transaction —
/// the reindex job's per-record unit of work (C4 §4.4).
pub fn replace_embedding(
    conn: &Connection,
    memory_id: &str,
    old_provider_id: &str,
    old_model_id: &str,
    new_provider_id: &str,
    new_model_id: &str,
    new_version: u32,
    embedding: &[f32],
) -> Result<(), RepositoryError> {
    let tx = conn.unchecked_transaction().map_err(|e| RepositoryError::DbError {
        reason: format!("replace_embedding begin: {e}"),
    })?;
    let result = (|| {
        tx.execute(
            "DELETE FROM memory_embeddings WHERE memory_id = ?1 AND provider_id = ?2 AND model_id = ?3",
            params![memory_id, old_provider_id, old_model_id],
        )
        .map_err(|e| RepositoryError::DbError {
            reason: e.to_string(),
        })?;
        store_embedding(&tx, memory_id, new_provider_id, new_model_id, new_version, embedding)
    })();
    match result {
        Ok(()) => tx.commit().map_err(|e| RepositoryError::DbError {
            reason: format!("replace_embedding commit: {e}"),
        }),
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

/// Fetch a single stored embedding, if present.
pub fn get_embedding(
    conn: &Connection,
    memory_id: &str,
    provider_id: &str,
    model_id: &str,
) -> Result<Option<Vec<f32>>, RepositoryError> {
    conn.query_row(
        "SELECT embedding, dimensions FROM memory_embeddings
         WHERE memory_id = ?1 AND provider_id = ?2 AND model_id = ?3",
        params![memory_id, provider_id, model_id],
        |row| {
            let blob: Vec<u8> = row.get(0)?;
            let dims: i64 = row.get(1)?;
            Ok(bytes_to_f32_vec(&blob, dims as usize))
        },
    )
    .optional()
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })
}

/// Fetch the embedding format revision stored for `(memory_id, provider_id,
/// model_id)`, if a row exists.
pub fn get_embedding_version(
    conn: &Connection,
    memory_id: &str,
    provider_id: &str,
    model_id: &str,
) -> Result<Option<u32>, RepositoryError> {
    conn.query_row(
        "SELECT version FROM memory_embeddings
         WHERE memory_id = ?1 AND provider_id = ?2 AND model_id = ?3",
        params![memory_id, provider_id, model_id],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.map(|v| v as u32))
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })
}

/// Store an embedding for a memory under a `(provider_id, model_id)`
/// generation, replacing any prior vector for that same generation.
/// `version` records the provider's embedding-format revision (see
/// [`substrate_core::traits::EmbeddingProvider::version`]).
pub fn store_embedding(
    conn: &Connection,
    memory_id: &str,
    provider_id: &str,
    model_id: &str,
    version: u32,
    embedding: &[f32],
) -> Result<(), RepositoryError> {
    let blob = f32_vec_to_bytes(embedding);
    let dims = embedding.len() as i64;

    conn.execute(
        "INSERT INTO memory_embeddings (memory_id, provider_id, model_id, version, embedding, dimensions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(memory_id, provider_id, model_id) DO UPDATE SET
            version = excluded.version,
            embedding = excluded.embedding,
            dimensions = excluded.dimensions,
            created_at = excluded.created_at",
        params![memory_id, provider_id, model_id, version, blob, dims, Utc::now().to_rfc3339()],
    )
    .map_err(|e| RepositoryError::DbError {
        reason: e.to_string(),
    })?;

    Ok(())
}

fn f32_vec_to_bytes(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_f32_vec(bytes: &[u8], expected_dims: usize) -> Vec<f32> {
    let mut result = Vec::with_capacity(expected_dims);
    for chunk in bytes.chunks_exact(4) {
        result.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    result
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
