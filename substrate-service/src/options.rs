use substrate_core::memory::{Confidence, Importance, Layer, MemoryType};

/// Optional fields for [`crate::MemoryService::remember_explicit`] and
/// [`crate::MemoryService::remember_implicit`]; everything not set falls
/// back to [`CreateMemoryInput`](substrate_repository::CreateMemoryInput)'s
/// own defaults.
#[derive(Debug, Clone)]
pub struct RememberOptions {
    pub memory_type: MemoryType,
    pub layer: Layer,
    pub importance: Importance,
    pub confidence: Confidence,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub message_id: Option<String>,
}

impl Default for RememberOptions {
    fn default() -> Self {
        Self {
            memory_type: MemoryType::Fact,
            layer: Layer::Stm,
            importance: Importance::default(),
            confidence: Confidence::default(),
            tags: Vec::new(),
            entities: Vec::new(),
            message_id: None,
        }
    }
}
