//! ONNX Runtime embedding provider.
//!
//! Loads a model via the `ort` crate (v2) and mean-pools token embeddings
//! into a single L2-normalized vector. Inference is synchronous CPU work,
//! so it runs inside `spawn_blocking` to keep the async `embed` call from
//! stalling the scheduler.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use substrate_core::errors::EmbeddingError;
use substrate_core::traits::EmbeddingProvider;
use tracing::debug;

pub struct OnnxProvider {
    /// `Session::run` needs `&mut self`; the mutex satisfies `&self` on the trait.
    session: Mutex<Session>,
    dimensions: usize,
    model_name: String,
}

unsafe impl Sync for OnnxProvider {}

impl OnnxProvider {
    pub fn load(model_path: &str, dimensions: usize) -> Result<Self, EmbeddingError> {
        let path = Path::new(model_path);
        if !path.exists() {
            return Err(EmbeddingError::ProviderUnavailable {
                provider: "onnx".to_string(),
                reason: format!("model file not found: {model_path}"),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(2))
            .and_then(|b| b.commit_from_file(model_path))
            .map_err(|e| EmbeddingError::ProviderUnavailable {
                provider: "onnx".to_string(),
                reason: e.to_string(),
            })?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-model")
            .to_string();

        debug!(model = %model_name, dims = dimensions, "onnx model loaded");

        Ok(Self {
            session: Mutex::new(session),
            dimensions,
            model_name,
        })
    }

    fn infer(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let fail = |reason: String| EmbeddingError::EmbeddingFailed { reason };

        let token_ids = Self::simple_tokenize(text);
        let seq_len = token_ids.len();
        let input_ids: Vec<i64> = token_ids.iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = vec![1i64; seq_len];

        let ids_tensor = Tensor::from_array((vec![1i64, seq_len as i64], input_ids))
            .map_err(|e| fail(format!("tensor creation: {e}")))?;
        let mask_tensor = Tensor::from_array((vec![1i64, seq_len as i64], attention_mask))
            .map_err(|e| fail(format!("tensor creation: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| fail(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor])
            .map_err(|e| fail(e.to_string()))?;

        let (_name, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| fail("no output tensor".to_string()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| fail(format!("tensor extraction: {e}")))?;

        let mut embedding = match shape.len() {
            3 => {
                let seq = shape[1] as usize;
                let dims = shape[2] as usize;
                let mut pooled = vec![0.0f32; dims];
                for s in 0..seq {
                    for d in 0..dims {
                        pooled[d] += data[s * dims + d];
                    }
                }
                for v in &mut pooled {
                    *v /= seq as f32;
                }
                pooled
            }
            2 => data[..shape[1] as usize].to_vec(),
            _ => return Err(fail(format!("unexpected output shape: {shape:?}"))),
        };

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding.resize(self.dimensions, 0.0);
        Ok(embedding)
    }

    /// Hash-bucket tokenizer. Not a real wordpiece vocabulary, but stable
    /// and dependency-free — good enough for a vector space consistent
    /// within one model session.
    fn simple_tokenize(text: &str) -> Vec<u32> {
        if text.is_empty() {
            return vec![101, 102];
        }
        let mut ids = vec![101u32];
        for word in text.split(|c: char| !c.is_alphanumeric() && c != '_') {
            if word.is_empty() {
                continue;
            }
            let mut h: u32 = 0x811c_9dc5;
            for b in word.to_lowercase().as_bytes() {
                h ^= *b as u32;
                h = h.wrapping_mul(0x0100_0193);
            }
            ids.push(1 + (h % 29999));
        }
        ids.push(102);
        ids
    }
}

#[async_trait]
impl EmbeddingProvider for OnnxProvider {
    fn provider_id(&self) -> &str {
        "onnx"
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.infer(text)
    }
}
