//! # chat-attachments
//!
//! Attachment intake for the chat client.
//!
//! ## Features
//!
//! - Classification of images and text files (allow-lists plus content sniffing)
//! - Per-item, aggregate and image-count ceilings
//! - Optional image compression that never grows a file
//! - An ordered store of pending attachments, one per chat session
//!
//! ## Example
//!
//! ```rust,ignore
//! use chat_attachments::{FileCandidate, IntakeService, MagicSniffer, RasterCompressor};
//! use chat_core::SharedSettings;
//! use std::sync::Arc;
//!
//! let service = IntakeService::new(
//!     Arc::new(MagicSniffer::new()),
//!     Arc::new(RasterCompressor::new()),
//!     SharedSettings::default(),
//! );
//!
//! let outcomes = service
//!     .submit_files(vec![FileCandidate::new("notes.md", "# Notes")])
//!     .await;
//! ```

pub mod classify;
pub mod error;
pub mod guard;
pub mod model;
pub mod service;
pub mod sniff;
pub mod store;
pub mod transform;

pub use classify::{
    classify_image, is_text_mime_type, Classifier, TextFileClass, ALLOWED_IMAGE_TYPES,
    ALLOWED_TEXT_EXTENSIONS, SAFE_TEXT_MIME_TYPES,
};
pub use error::{
    ErrorCategory, IntakeStage, RejectReason, Rejection, TransformError, TransformResult,
};
pub use guard::SizeGuard;
pub use model::{
    Attachment, AttachmentKind, AttachmentSummary, FileCandidate, LinkKind, Payload,
};
pub use service::{IntakeObserver, IntakeOutcome, IntakeService, NoopObserver};
pub use sniff::{ContentSniffer, DetectedFormat, MagicSniffer};
pub use store::{AttachmentStore, StoreSummary};
pub use transform::{
    CompressedImage, CompressionOptions, ImageCompressor, RasterCompressor, TransformOutput,
    TransformStage,
};
