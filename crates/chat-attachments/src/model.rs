//! Attachment Model
//!
//! Pending attachments and the candidates they are built from.

use bytes::Bytes;
use chat_core::units::human_size;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a pending attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    TextFile,
    YoutubeLink,
    WikipediaLink,
}

impl AttachmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::TextFile => "text_file",
            Self::YoutubeLink => "youtube_link",
            Self::WikipediaLink => "wikipedia_link",
        }
    }

    /// Whether attachments of this kind carry binary content
    pub fn is_file_backed(&self) -> bool {
        matches!(self, Self::Image | Self::TextFile)
    }
}

impl std::fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link attachment kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Youtube,
    Wikipedia,
}

impl LinkKind {
    /// Fragments of which a valid URL must contain at least one
    pub fn domain_fragments(&self) -> &'static [&'static str] {
        match self {
            Self::Youtube => &["youtube.com", "youtu.be"],
            Self::Wikipedia => &["wikipedia.org"],
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        self.domain_fragments().iter().any(|f| url.contains(f))
    }

    pub fn attachment_kind(&self) -> AttachmentKind {
        match self {
            Self::Youtube => AttachmentKind::YoutubeLink,
            Self::Wikipedia => AttachmentKind::WikipediaLink,
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Youtube => write!(f, "YouTube"),
            Self::Wikipedia => write!(f, "Wikipedia"),
        }
    }
}

/// Attachment content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Owned file content with its MIME type
    Binary { data: Bytes, content_type: String },
    /// Link target; links carry no content
    Link { url: String },
}

/// A file submitted by the user, not yet validated
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    /// Declared MIME type, if the host supplied a non-empty one
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn content_type(mut self, ct: impl Into<String>) -> Self {
        let ct = ct.into();
        self.content_type = if ct.trim().is_empty() { None } else { Some(ct) };
        self
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Lowercased text after the last `.`, or an empty string
    pub fn extension(&self) -> String {
        match self.name.rfind('.') {
            Some(pos) => self.name[pos + 1..].to_lowercase(),
            None => String::new(),
        }
    }
}

/// A pending attachment
///
/// Attachments are never modified after creation; replacing one means
/// removing it and adding a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    id: Uuid,
    kind: AttachmentKind,
    display_name: String,
    payload: Payload,
    size_bytes: Option<u64>,
    text_extension: Option<String>,
    compressed: bool,
    added_at: DateTime<Utc>,
}

impl Attachment {
    /// Create an image attachment
    ///
    /// `original_size` is the pre-compression size of the submitted file.
    pub(crate) fn image(
        name: impl Into<String>,
        data: Bytes,
        content_type: impl Into<String>,
        original_size: u64,
    ) -> Self {
        let compressed = data.len() as u64 != original_size;
        Self {
            id: Uuid::new_v4(),
            kind: AttachmentKind::Image,
            display_name: name.into(),
            payload: Payload::Binary {
                data,
                content_type: content_type.into(),
            },
            size_bytes: Some(original_size),
            text_extension: None,
            compressed,
            added_at: Utc::now(),
        }
    }

    /// Create a text file attachment
    pub(crate) fn text_file(
        name: impl Into<String>,
        data: Bytes,
        content_type: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let size = data.len() as u64;
        Self {
            id: Uuid::new_v4(),
            kind: AttachmentKind::TextFile,
            display_name: name.into(),
            payload: Payload::Binary {
                data,
                content_type: content_type.into(),
            },
            size_bytes: Some(size),
            text_extension: Some(extension.into()),
            compressed: false,
            added_at: Utc::now(),
        }
    }

    /// Create a link attachment
    pub(crate) fn link(kind: LinkKind, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: Uuid::new_v4(),
            kind: kind.attachment_kind(),
            display_name: url.clone(),
            payload: Payload::Link { url },
            size_bytes: None,
            text_extension: None,
            compressed: false,
            added_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> AttachmentKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Original (pre-transform) size, for file-backed kinds
    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    /// Lowercase extension, for text files
    pub fn text_extension(&self) -> Option<&str> {
        self.text_extension.as_deref()
    }

    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    pub fn is_image(&self) -> bool {
        self.kind == AttachmentKind::Image
    }

    pub fn is_text_file(&self) -> bool {
        self.kind == AttachmentKind::TextFile
    }

    /// Whether the stored bytes came out of the compressor
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Stored content, for file-backed kinds
    ///
    /// The returned handle shares the attachment's buffer.
    pub fn data(&self) -> Option<&Bytes> {
        match &self.payload {
            Payload::Binary { data, .. } => Some(data),
            Payload::Link { .. } => None,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match &self.payload {
            Payload::Binary { content_type, .. } => Some(content_type),
            Payload::Link { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.payload {
            Payload::Link { url } => Some(url),
            Payload::Binary { .. } => None,
        }
    }

    /// Size of the stored content, after any compression
    pub fn stored_size(&self) -> Option<u64> {
        self.data().map(|d| d.len() as u64)
    }

    /// Decoded content of a text file attachment
    pub fn text(&self) -> Option<&str> {
        if !self.is_text_file() {
            return None;
        }
        self.data().and_then(|d| std::str::from_utf8(d).ok())
    }

    pub fn summary(&self) -> AttachmentSummary {
        AttachmentSummary {
            id: self.id,
            kind: self.kind,
            display_name: self.display_name.clone(),
            content_type: self.content_type().map(str::to_string),
            url: self.url().map(str::to_string),
            size_bytes: self.size_bytes,
            stored_bytes: self.stored_size(),
            human_size: self.size_bytes.map(human_size),
            text_extension: self.text_extension.clone(),
            compressed: self.compressed,
            added_at: self.added_at,
        }
    }
}

/// Attachment metadata without the payload bytes, for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSummary {
    pub id: Uuid,
    pub kind: AttachmentKind,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub human_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_extension: Option<String>,
    pub compressed: bool,
    pub added_at: DateTime<Utc>,
}
