//! Upload intake: MIME acceptance and input resolution.
//!
//! An upload is accepted only when it carries the WordprocessingML MIME type.
//! Anything else is turned into a [`Rejection`] notice and never becomes a
//! tracked file; the rest of the batch is unaffected.
//!
//! The CLI also needs to turn a path or URL into an upload. A local path gets
//! its MIME type from the extension (as a browser file picker does); a URL
//! is downloaded and takes the `Content-Type` header, falling back to the
//! extension of its last path segment.

use crate::error::BioCraftError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// MIME type of a `.docx` document.
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type assumed for anything without a recognised extension.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A user-supplied document, before it is tracked.
#[derive(Clone)]
pub struct UploadedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an upload whose MIME type is inferred from the file name.
    pub fn from_name(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let mime = mime_for_name(&name).to_string();
        Self::new(name, mime, bytes)
    }

    pub fn is_accepted(&self) -> bool {
        self.mime == DOCX_MIME
    }
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("mime", &self.mime)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// A user-facing notice for an upload that was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub file_name: String,
    pub mime: String,
    pub reason: String,
}

impl Rejection {
    fn from_upload(file: &UploadedFile) -> Self {
        let reason = BioCraftError::UnsupportedFileType {
            name: file.name.clone(),
            mime: file.mime.clone(),
        }
        .to_string();
        Self {
            file_name: file.name.clone(),
            mime: file.mime.clone(),
            reason,
        }
    }
}

/// Split a batch into accepted uploads (original order kept) and rejections.
pub fn partition_batch(files: Vec<UploadedFile>) -> (Vec<UploadedFile>, Vec<Rejection>) {
    let mut accepted = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();
    for file in files {
        if file.is_accepted() {
            accepted.push(file);
        } else {
            warn!("Rejecting '{}' ({})", file.name, file.mime);
            rejected.push(Rejection::from_upload(&file));
        }
    }
    (accepted, rejected)
}

/// MIME type for a file name, by extension.
pub fn mime_for_name(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("docx") => DOCX_MIME,
        Some("doc") => "application/msword",
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => OCTET_STREAM,
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or HTTP(S) URL to an upload.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<UploadedFile, BioCraftError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

async fn resolve_local(path_str: &str) -> Result<UploadedFile, BioCraftError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BioCraftError::PermissionDenied { path });
        }
        Err(_) => return Err(BioCraftError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Resolved local file: {} ({} bytes)", path.display(), bytes.len());
    Ok(UploadedFile::from_name(name, bytes))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedFile, BioCraftError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BioCraftError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BioCraftError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BioCraftError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(BioCraftError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BioCraftError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let mime = match header_mime {
        Some(m) if m == DOCX_MIME => m,
        _ => mime_for_name(&name).to_string(),
    };

    info!("Downloaded '{}' ({} bytes, {})", name, bytes.len(), mime);
    Ok(UploadedFile::new(name, mime, bytes.to_vec()))
}

/// Last non-empty path segment of a URL, or a generic name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.docx".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/cv.docx"));
        assert!(is_url("http://example.com/cv.docx"));
        assert!(!is_url("/tmp/cv.docx"));
        assert!(!is_url(""));
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for_name("张三.docx"), DOCX_MIME);
        assert_eq!(mime_for_name("CV.DOCX"), DOCX_MIME);
        assert_eq!(mime_for_name("cv.pdf"), "application/pdf");
        assert_eq!(mime_for_name("README"), OCTET_STREAM);
    }

    #[test]
    fn batch_partition_keeps_order_and_rejects_others() {
        let files = vec![
            UploadedFile::from_name("a.docx", b"a".to_vec()),
            UploadedFile::from_name("b.pdf", b"b".to_vec()),
            UploadedFile::from_name("c.docx", b"c".to_vec()),
        ];
        let (accepted, rejected) = partition_batch(files);
        let names: Vec<&str> = accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.docx", "c.docx"]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].file_name, "b.pdf");
        assert!(rejected[0].reason.contains(".docx"));
    }

    #[test]
    fn filename_from_url_falls_back() {
        assert_eq!(filename_from_url("https://x.org/files/cv.docx"), "cv.docx");
        assert_eq!(filename_from_url("https://x.org/download/"), "downloaded.docx");
    }

    #[tokio::test]
    async fn missing_local_file_is_reported() {
        let err = resolve_input("/definitely/not/here.docx", 5).await.unwrap_err();
        assert!(matches!(err, BioCraftError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_gets_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("简历.docx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let file = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(file.name, "简历.docx");
        assert_eq!(file.mime, DOCX_MIME);
        assert_eq!(&file.bytes[..], b"PK\x03\x04");
    }
}
