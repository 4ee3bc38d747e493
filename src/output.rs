//! Serializable views of registry state and controller results.
//!
//! These are plain snapshots: taking one copies the data out of the registry
//! so callers can render or serialise it without holding any lock.

use crate::pipeline::input::Rejection;
use crate::profile::StructuredProfile;
use crate::registry::{FileId, ProcessingStatus, TrackedFile};
use serde::Serialize;

/// Snapshot of one tracked file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub id: FileId,
    pub file_name: String,
    pub status: ProcessingStatus,
    /// Length of the extracted text in characters; 0 before extraction.
    pub raw_text_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StructuredProfile>,
}

impl From<&TrackedFile> for FileReport {
    fn from(entry: &TrackedFile) -> Self {
        Self {
            id: entry.id(),
            file_name: entry.file_name().to_string(),
            status: entry.status(),
            raw_text_chars: entry.raw_text().chars().count(),
            error_message: entry.error_message().map(str::to_string),
            result: entry.result().cloned(),
        }
    }
}

/// Outcome of submitting a batch of uploads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReceipt {
    /// Ids of the tracked entries, in submission order.
    pub accepted: Vec<FileId>,
    /// One notice per refused upload.
    pub rejected: Vec<Rejection>,
}

/// Status counts over the whole registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub idle: usize,
    pub reading: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, status: ProcessingStatus) {
        self.total += 1;
        match status {
            ProcessingStatus::Idle => self.idle += 1,
            ProcessingStatus::Reading => self.reading += 1,
            ProcessingStatus::Processing => self.processing += 1,
            ProcessingStatus::Completed => self.completed += 1,
            ProcessingStatus::Error => self.failed += 1,
        }
    }

    /// Entries that have not reached a terminal state.
    pub fn in_flight(&self) -> usize {
        self.idle + self.reading + self.processing
    }
}

/// An exported document, ready to be saved or downloaded.
#[derive(Clone)]
pub struct ExportedDocument {
    /// `<name>_简介.<ext>`
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for ExportedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportedDocument")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_statuses() {
        let mut s = BatchSummary::default();
        for status in [
            ProcessingStatus::Completed,
            ProcessingStatus::Error,
            ProcessingStatus::Reading,
            ProcessingStatus::Completed,
        ] {
            s.record(status);
        }
        assert_eq!(s.total, 4);
        assert_eq!(s.completed, 2);
        assert_eq!(s.failed, 1);
        assert_eq!(s.in_flight(), 1);
    }

    #[test]
    fn report_serialises_without_absent_fields() {
        let report = FileReport {
            id: FileId::new(),
            file_name: "a.docx".into(),
            status: ProcessingStatus::Processing,
            raw_text_chars: 12,
            error_message: None,
            result: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "PROCESSING");
        assert_eq!(json["fileName"], "a.docx");
        assert!(json.get("result").is_none());
        assert!(json.get("errorMessage").is_none());
    }
}
