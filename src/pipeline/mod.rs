//! Pipeline stages for biography classification.
//!
//! Each submodule implements one step. The extractor, classifier and
//! exporter sit behind traits so the controller can run with any adapter
//! (the tests use in-memory ones).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ classify ──▶ postprocess ──▶ (registry) ──▶ export
//! (MIME)    (docx→text)  (LLM)        (JSON→profile)   (edits)        (profile→docx)
//! ```
//!
//! 1. [`input`]: accept or reject uploads by MIME type; resolve CLI
//!    paths and URLs into uploads
//! 2. [`extract`]: plain text from the `.docx` package; runs in
//!    `spawn_blocking` because unzipping and XML parsing are CPU-bound
//! 3. [`classify`]: one LLM call per document; the only stage with
//!    network I/O
//! 4. [`postprocess`]: deterministic cleanup of the LLM reply into a
//!    `StructuredProfile`
//! 5. [`encode`]: portrait bytes ⇄ base64 data URL
//! 6. [`export`]: the formatted `.docx` document

pub mod classify;
pub mod encode;
pub mod export;
pub mod extract;
pub mod input;
pub mod postprocess;
