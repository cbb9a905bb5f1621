use substrate_core::memory::MemoryRecord;

/// Builds the stable on-disk filename for a memory record:
/// `{YYYY-MM-DDTHH-MM-SS}_{type}_{SHORTID}.md`, where `SHORTID` is the
/// first 7 uppercase alphanumeric characters of the record's id.
pub fn build_file_name(record: &MemoryRecord) -> String {
    let ts = record.created_at.format("%Y-%m-%dT%H-%M-%S");
    let short_id = short_id(record.id);
    format!("{ts}_{}_{short_id}.md", record.memory_type.as_str())
}

fn short_id(id: uuid::Uuid) -> String {
    id.simple().to_string().to_uppercase().chars().take(7).collect()
}
