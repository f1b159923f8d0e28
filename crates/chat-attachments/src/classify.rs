//! Candidate Classification
//!
//! Decides whether a submitted file is an acceptable image or text file.

use std::sync::Arc;

use tracing::debug;

use crate::error::RejectReason;
use crate::model::FileCandidate;
use crate::sniff::ContentSniffer;

/// Image types accepted on the image path
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Extensions accepted on the file path
pub const ALLOWED_TEXT_EXTENSIONS: &[&str] = &[
    // Plain text and docs
    "txt", "md", "markdown", "rst", "log", "csv", "tsv",
    // Data and config
    "json", "xml", "yaml", "yml", "toml", "ini", "cfg", "conf", "env",
    // Web
    "html", "htm", "css", "js", "jsx", "ts", "tsx",
    // Code
    "py", "rs", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs", "rb", "php", "swift", "sh",
    "sql",
];

/// Declared types outside `text/` that are accepted as text
pub const SAFE_TEXT_MIME_TYPES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/xml",
    "application/xhtml+xml",
    "application/javascript",
    "application/x-javascript",
    "application/ecmascript",
    "application/typescript",
    "application/x-typescript",
    "application/yaml",
    "application/x-yaml",
    "application/toml",
    "application/x-toml",
    "application/sql",
    "application/x-sql",
    "application/x-sh",
    "application/x-shellscript",
    "application/x-python",
    "application/x-python-code",
    "application/x-ruby",
    "application/x-httpd-php",
    "application/x-php",
    "application/csv",
    "application/x-ndjson",
];

const TEXT_MIME_PREFIX: &str = "text/";

/// Content type stored for text files submitted without one
pub const DEFAULT_TEXT_MIME_TYPE: &str = "text/plain";

/// Result of classifying a text file candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFileClass {
    /// Lowercase extension from the allow-list
    pub extension: String,
    /// Content type to store with the attachment
    pub content_type: String,
}

/// Check a declared image type against the allow-list
pub fn classify_image(candidate: &FileCandidate) -> Result<String, RejectReason> {
    let declared = candidate
        .content_type
        .as_deref()
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_IMAGE_TYPES.contains(&declared.as_str()) {
        Ok(declared)
    } else {
        Err(RejectReason::UnsupportedImageFormat {
            content_type: if declared.is_empty() {
                "unknown".to_string()
            } else {
                declared
            },
        })
    }
}

/// Whether a declared type may describe text content
pub fn is_text_mime_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence.starts_with(TEXT_MIME_PREFIX) || SAFE_TEXT_MIME_TYPES.contains(&essence.as_str())
}

/// File-path classifier
///
/// Extension allow-listing is necessary but not sufficient: content that
/// the sniffer positively identifies is rejected whatever the file is
/// called.
pub struct Classifier<Sn: ContentSniffer + ?Sized> {
    sniffer: Arc<Sn>,
}

impl<Sn: ContentSniffer + ?Sized> Clone for Classifier<Sn> {
    fn clone(&self) -> Self {
        Self {
            sniffer: Arc::clone(&self.sniffer),
        }
    }
}

impl<Sn: ContentSniffer + ?Sized> Classifier<Sn> {
    pub fn new(sniffer: Arc<Sn>) -> Self {
        Self { sniffer }
    }

    /// Classify a candidate submitted through the file path
    pub async fn classify_file(
        &self,
        candidate: &FileCandidate,
    ) -> Result<TextFileClass, RejectReason> {
        let extension = candidate.extension();
        if !ALLOWED_TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(RejectReason::UnsupportedExtension { extension });
        }

        if let Some(format) = self.sniffer.sniff(&candidate.data).await {
            debug!(name = %candidate.name, format = %format, "Sniffed binary content");
            return Err(RejectReason::BinaryContentDetected {
                format: format.name.to_string(),
            });
        }

        if let Some(declared) = candidate.content_type.as_deref() {
            if !is_text_mime_type(declared) {
                return Err(RejectReason::BinaryMimeType {
                    content_type: declared.to_string(),
                });
            }
        }

        if std::str::from_utf8(&candidate.data).is_err() {
            return Err(RejectReason::InvalidEncoding);
        }

        let content_type = candidate
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_TEXT_MIME_TYPE.to_string());

        Ok(TextFileClass {
            extension,
            content_type,
        })
    }
}
