//! Intake errors
//!
//! Validation failures reject a single candidate and are shown to the user.
//! Transform failures are recovered inside the pipeline and only logged.

use chat_core::units::human_size;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::LinkKind;

/// Why a candidate was not attached
///
/// The `Display` text is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Unsupported image format: {content_type}. Use JPEG, PNG, WebP or GIF.")]
    UnsupportedImageFormat { content_type: String },

    #[error("Unsupported file type: .{extension}. Only text and code files can be attached.")]
    UnsupportedExtension { extension: String },

    #[error("File looks like {format}, not text. Binary files cannot be attached.")]
    BinaryContentDetected { format: String },

    #[error("File type {content_type} is binary. Only text files can be attached.")]
    BinaryMimeType { content_type: String },

    #[error("File is not valid UTF-8 text.")]
    InvalidEncoding,

    #[error("File is too large: {} (max {})", fmt_size(.size), fmt_size(.max))]
    FileTooLarge { size: u64, max: u64 },

    #[error("Attached files would total {} (max {})", fmt_size(.total), fmt_size(.max))]
    TotalSizeExceeded { total: u64, max: u64 },

    #[error("You can attach at most {max} images.")]
    ImageLimitReached { max: usize },

    #[error("Not a valid {kind} link: {url}")]
    InvalidLink { kind: LinkKind, url: String },
}

/// Broad rejection classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    UnsupportedFormat,
    BinaryContentDetected,
    SizeExceeded,
    CountLimitReached,
    InvalidLink,
}

impl RejectReason {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedImageFormat { .. } | Self::UnsupportedExtension { .. } => {
                ErrorCategory::UnsupportedFormat
            }
            Self::BinaryContentDetected { .. }
            | Self::BinaryMimeType { .. }
            | Self::InvalidEncoding => ErrorCategory::BinaryContentDetected,
            Self::FileTooLarge { .. } | Self::TotalSizeExceeded { .. } => {
                ErrorCategory::SizeExceeded
            }
            Self::ImageLimitReached { .. } => ErrorCategory::CountLimitReached,
            Self::InvalidLink { .. } => ErrorCategory::InvalidLink,
        }
    }

    /// Stable key for message lookup by the host
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedImageFormat { .. } => "unsupported_image_format",
            Self::UnsupportedExtension { .. } => "unsupported_extension",
            Self::BinaryContentDetected { .. } => "binary_content_detected",
            Self::BinaryMimeType { .. } => "binary_mime_type",
            Self::InvalidEncoding => "invalid_encoding",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::TotalSizeExceeded { .. } => "total_size_exceeded",
            Self::ImageLimitReached { .. } => "image_limit_reached",
            Self::InvalidLink { .. } => "invalid_link",
        }
    }
}

/// Where a candidate is in the intake pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    Submitted,
    Classifying,
    SizeChecking,
    Transforming,
    Committed,
    Rejected,
}

impl std::fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Classifying => "classifying",
            Self::SizeChecking => "size_checking",
            Self::Transforming => "transforming",
            Self::Committed => "committed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A rejected candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{candidate}: {reason}")]
pub struct Rejection {
    /// File name or URL of the candidate
    pub candidate: String,
    /// Stage whose gate rejected it
    pub stage: IntakeStage,
    pub reason: RejectReason,
}

impl Rejection {
    pub fn new(candidate: impl Into<String>, stage: IntakeStage, reason: RejectReason) -> Self {
        Self {
            candidate: candidate.into(),
            stage,
            reason,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.reason.category()
    }
}

/// Image compressor errors
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Unsupported image type for compression: {0}")]
    Unsupported(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Compression task failed: {0}")]
    Task(String),
}

pub type TransformResult<T> = Result<T, TransformError>;

fn fmt_size(bytes: &u64) -> String {
    human_size(*bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::units::MIB;

    #[test]
    fn test_categories() {
        let cases = [
            (
                RejectReason::UnsupportedExtension {
                    extension: "exe".to_string(),
                },
                ErrorCategory::UnsupportedFormat,
            ),
            (RejectReason::InvalidEncoding, ErrorCategory::BinaryContentDetected),
            (
                RejectReason::TotalSizeExceeded {
                    total: 12 * MIB,
                    max: 10 * MIB,
                },
                ErrorCategory::SizeExceeded,
            ),
            (
                RejectReason::ImageLimitReached { max: 8 },
                ErrorCategory::CountLimitReached,
            ),
        ];

        for (reason, expected) in cases {
            assert_eq!(reason.category(), expected, "Reason: {}", reason.code());
        }
    }

    #[test]
    fn test_user_messages() {
        let reason = RejectReason::FileTooLarge {
            size: 11 * MIB,
            max: 10 * MIB,
        };
        assert_eq!(reason.to_string(), "File is too large: 11.0 MB (max 10.0 MB)");

        let reason = RejectReason::InvalidLink {
            kind: LinkKind::Youtube,
            url: "https://vimeo.com/1".to_string(),
        };
        assert_eq!(reason.to_string(), "Not a valid YouTube link: https://vimeo.com/1");
    }

    #[test]
    fn test_rejection_display() {
        let rejection = Rejection::new(
            "photo.bmp",
            IntakeStage::Classifying,
            RejectReason::UnsupportedImageFormat {
                content_type: "image/bmp".to_string(),
            },
        );

        assert_eq!(rejection.category(), ErrorCategory::UnsupportedFormat);
        assert!(rejection.to_string().starts_with("photo.bmp: Unsupported image format"));
    }
}
