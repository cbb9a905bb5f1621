pub mod cancel_token;
pub mod clock;
pub mod distillation_provider;
pub mod embedding_provider;

pub use cancel_token::CancelToken;
pub use clock::{Clock, SystemClock};
pub use distillation_provider::{DistillationOutcome, DistillationProvider, DistillationRequest};
pub use embedding_provider::EmbeddingProvider;
