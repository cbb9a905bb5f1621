use substrate_core::memory::{Confidence, Importance, Layer, MemoryType, Provenance};
use substrate_core::models::ProvenanceEventKind;
use substrate_storage::ListFilter;
use uuid::Uuid;

/// Input to [`MemoryRepository::create`](crate::MemoryRepository::create).
#[derive(Debug, Clone)]
pub struct CreateMemoryInput {
    pub content: String,
    pub memory_type: MemoryType,
    pub layer: Layer,
    pub importance: Importance,
    pub confidence: Confidence,
    pub tags: Vec<String>,
    pub entities: Vec<String>,
    pub provenance: Provenance,
    pub supersedes: Option<Uuid>,
    /// Attached to the Markdown frontmatter and the provenance event detail;
    /// `MemoryRecord` itself has no field for this.
    pub message_id: Option<String>,
    /// Overrides the provenance event kind emitted for this write. `None`
    /// means `Created`; consolidation writes pass `Consolidated` here so the
    /// audit log distinguishes a distilled LTM record from a fresh one.
    pub provenance_event_kind: Option<ProvenanceEventKind>,
}

impl CreateMemoryInput {
    pub fn new(content: impl Into<String>, memory_type: MemoryType, layer: Layer, provenance: Provenance) -> Self {
        Self {
            content: content.into(),
            memory_type,
            layer,
            importance: Importance::default(),
            confidence: Confidence::default(),
            tags: Vec::new(),
            entities: Vec::new(),
            provenance,
            supersedes: None,
            message_id: None,
            provenance_event_kind: None,
        }
    }
}

/// Patch applied to an existing memory. `None` fields are left unchanged.
/// `supersedes`/`superseded_by` can only be set, not cleared, through this
/// struct — matching the one-directional lifecycle memories actually go
/// through (a record is superseded at most once).
#[derive(Debug, Clone, Default)]
pub struct UpdateMemoryInput {
    pub content: Option<String>,
    pub importance: Option<Importance>,
    pub confidence: Option<Confidence>,
    pub tags: Option<Vec<String>>,
    pub entities: Option<Vec<String>>,
    pub layer: Option<Layer>,
    pub supersedes: Option<Uuid>,
    pub superseded_by: Option<Uuid>,
    pub message_id: Option<String>,
}

/// Filter + paging for [`MemoryRepository::list`](crate::MemoryRepository::list).
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub filter: ListFilter,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: ListFilter::default(),
            limit: substrate_core::constants::DEFAULT_LIST_PAGE_SIZE,
            offset: 0,
        }
    }
}
