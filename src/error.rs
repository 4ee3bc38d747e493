//! Error types for the biocraft library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`BioCraftError`]: **Synchronous.** Returned directly to the caller of a
//!   registry or controller operation (a rejected upload, an edit against an
//!   entry that is not completed, an export that could not be serialised).
//!   None of these change the state of any tracked file.
//!
//! * [`PipelineError`]: **Per-file.** Raised inside one file's pipeline
//!   (unreadable document, missing credential, malformed LLM response). It is
//!   never returned to a caller; the pipeline boundary converts it into that
//!   entry's `ERROR` state and its `Display` text becomes the entry's message.
//!
//! Keeping them apart means a failure in one file can never surface as an
//! `Err` on an unrelated call.

use crate::registry::{FileId, ProcessingStatus};
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned synchronously by the biocraft library.
#[derive(Debug, Error)]
pub enum BioCraftError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload does not carry the Word document MIME type.
    #[error("'{name}' was rejected: expected a .docx document, got '{mime}'")]
    UnsupportedFileType { name: String, mime: String },

    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Registry / editor errors ──────────────────────────────────────────
    /// No tracked file has this id (never existed or already removed).
    #[error("No tracked file with id {id}")]
    UnknownFile { id: FileId },

    /// Edits and exports require a completed profile.
    #[error("File {id} is {status}, a profile can only be edited or exported once completed")]
    NotCompleted { id: FileId, status: ProcessingStatus },

    /// The field key does not name a profile field.
    #[error("Unknown profile field '{key}'")]
    UnknownField { key: String },

    /// `name` is the one field that must stay non-empty.
    #[error("The profile name cannot be empty")]
    EmptyName,

    /// The supplied portrait is not a PNG or JPEG image.
    #[error("Invalid profile image: {detail}")]
    InvalidImage { detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The export adapter failed to serialise the profile.
    #[error("Failed to export profile '{name}': {detail}")]
    ExportFailed { name: String, detail: String },

    /// Could not create or write an exported document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure inside a single file's pipeline.
///
/// Stored (as text) on the owning [`crate::registry::TrackedFile`] when the
/// entry moves to `ERROR`. Other entries are never affected.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PipelineError {
    // ── Extraction ────────────────────────────────────────────────────────
    /// The document container could not be read.
    #[error("Could not read the document: {detail}")]
    ExtractionFailed { detail: String },

    /// The bytes are not a zip container, so cannot be a .docx file.
    #[error("The file is not a valid .docx document (first bytes: {magic:?})")]
    NotADocument { magic: Vec<u8> },

    // ── Classification ────────────────────────────────────────────────────
    /// No API key is available for the configured provider.
    #[error("API key is missing: set {env_var} to use the '{provider}' provider")]
    MissingCredential { provider: String, env_var: String },

    /// The provider could not be constructed from the configuration.
    #[error("LLM provider '{provider}' is not configured: {hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM service returned an error (network, HTTP status, quota).
    #[error("LLM service error: {detail}")]
    ServiceError { detail: String },

    /// The LLM call did not finish in time.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The service answered, but with no text.
    #[error("No response from AI")]
    EmptyResponse,

    /// The response text is not a JSON object of the expected shape.
    #[error("Failed to parse AI response: {detail}")]
    ParseError { detail: String },

    /// The response parsed but carries no name.
    #[error("AI response is missing the required 'name' field")]
    MissingName,

    /// An adapter panicked; caught at the pipeline boundary.
    #[error("Internal pipeline failure: {0}")]
    Internal(String),
}

impl PipelineError {
    /// True for errors that stem from configuration rather than the document
    /// or the remote service.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingCredential { .. } | PipelineError::ProviderNotConfigured { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_file_type_display() {
        let e = BioCraftError::UnsupportedFileType {
            name: "notes.pdf".into(),
            mime: "application/pdf".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("notes.pdf"), "got: {msg}");
        assert!(msg.contains("application/pdf"), "got: {msg}");
    }

    #[test]
    fn missing_credential_is_distinct_from_service_error() {
        let missing = PipelineError::MissingCredential {
            provider: "gemini".into(),
            env_var: "GEMINI_API_KEY".into(),
        };
        let service = PipelineError::ServiceError {
            detail: "HTTP 503".into(),
        };
        assert!(missing.is_configuration());
        assert!(!service.is_configuration());
        assert!(missing.to_string().contains("GEMINI_API_KEY"));
        assert_ne!(missing.to_string(), service.to_string());
    }

    #[test]
    fn empty_response_display() {
        assert_eq!(PipelineError::EmptyResponse.to_string(), "No response from AI");
    }

    #[test]
    fn not_completed_display_names_status() {
        let id = FileId::new();
        let e = BioCraftError::NotCompleted {
            id,
            status: ProcessingStatus::Processing,
        };
        assert!(e.to_string().contains("PROCESSING"));
    }
}
