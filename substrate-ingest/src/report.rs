/// Outcome of one [`crate::Ingestor::scan_directory`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files successfully parsed and persisted.
    pub processed: usize,
    /// Files moved to quarantine because they failed to parse.
    pub quarantined: usize,
    /// Non-fatal problems encountered along the way (parse failures are
    /// not included here — they show up as `quarantined`; this is for
    /// persistence failures on an otherwise well-formed file).
    pub errors: Vec<String>,
}
