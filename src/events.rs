use std::path::PathBuf;

use crate::timestamp::Timestamp;

/// A change to the in-memory window produced by a reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    ImageAdded(PathBuf),
    ImageRemoved(PathBuf),
    /// The file was rewritten in place and decoded again.
    ImageReplaced(PathBuf),
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Timestamps downloaded this cycle, ascending.
    pub downloaded: Vec<Timestamp>,
    /// Candidates that failed to download and stay eligible.
    pub failed: Vec<String>,
    /// Candidates whose URL carried no timestamp.
    pub malformed: Vec<String>,
    /// The catalog could not be read.
    pub catalog_unavailable: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReloadReport {
    pub events: Vec<WindowEvent>,
    /// File that failed validation, if any.
    pub rejected: Option<PathBuf>,
}

impl ReloadReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.events.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub ingest: IngestReport,
    pub evicted: Vec<PathBuf>,
    pub reload: ReloadReport,
    pub exported: bool,
}
