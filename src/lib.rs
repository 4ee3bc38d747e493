//! # biocraft
//!
//! Turn free-form biography documents into structured, editable profiles
//! and export them as uniformly formatted Word documents.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx upload
//!  │
//!  ├─ 1. Intake    accept by MIME type, track as an IDLE entry
//!  ├─ 2. Extract   raw text from the WordprocessingML package   (READING)
//!  ├─ 3. Classify  LLM sorts the text into fixed categories     (PROCESSING)
//!  ├─ 4. Normalize required name, 《》-wrapped topics            (COMPLETED | ERROR)
//!  ├─ 5. Edit      field-level edits, optional portrait
//!  └─ 6. Export    <name>_简介.docx
//! ```
//!
//! Every file runs its own pipeline task. Failures stay with the file that
//! caused them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use biocraft::{BioCraftConfig, DocxExporter, PipelineController, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credential read from GEMINI_API_KEY when the first file is classified
//!     let controller = PipelineController::new(BioCraftConfig::default());
//!     let bytes = std::fs::read("张三.docx")?;
//!     let id = controller.start_pipeline(UploadedFile::from_name("张三.docx", bytes))?;
//!     controller.settle().await;
//!
//!     let doc = controller.export(id, &DocxExporter)?;
//!     std::fs::write(&doc.file_name, &doc.bytes)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `biocraft` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod editor;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{BioCraftConfig, BioCraftConfigBuilder};
pub use controller::PipelineController;
pub use editor::{parse_list_input, parse_text_input};
pub use error::{BioCraftError, PipelineError};
pub use output::{BatchReceipt, BatchSummary, ExportedDocument, FileReport};
pub use pipeline::classify::{LlmClassifier, ProfileClassifier};
pub use pipeline::export::{export_file_name, DocxExporter, ProfileExporter};
pub use pipeline::extract::{DocxExtractor, TextExtractor};
pub use pipeline::input::{resolve_input, Rejection, UploadedFile, DOCX_MIME};
pub use profile::{normalize_topic, FieldKey, StructuredProfile};
pub use progress::{NoopObserver, PipelineObserver};
pub use registry::{FileId, ProcessingStatus};
pub use schema::{Category, FieldKind};
