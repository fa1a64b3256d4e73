//! History item model.
//!
//! An [`Item`] is one entry in the clipboard history. Its [`Payload`] is a
//! tagged union over the three supported content kinds, so every per-kind
//! operation (content equality, size estimate, preview) is handled
//! exhaustively at compile time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::ItemId;

/// Bytes sampled from each end of an encoded image for duplicate detection.
pub const IMAGE_SAMPLE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Text,
    Image,
    FileList,
}

/// Residency state of an image payload.
///
/// Encoded bytes are kept out of memory unless a consumer asked for them;
/// the eviction engine moves old images back to `Unloaded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageState {
    Unloaded,
    Loading,
    Loaded(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageContent {
    pub width: u32,
    pub height: u32,
    pub encoded_len: u64,
    /// First bytes of the encoded data, captured at classification time so
    /// duplicate checks work while the full payload is not resident.
    pub sample_head: Vec<u8>,
    /// Last bytes of the encoded data.
    pub sample_tail: Vec<u8>,
    pub state: ImageState,
}

impl ImageContent {
    pub fn materialized(&self) -> bool {
        matches!(self.state, ImageState::Loaded(_))
    }

    /// Probabilistic duplicate test: dimensions, encoded length, and the
    /// head/tail samples must all match. Deliberately not a full-buffer
    /// comparison; see `Payload::same_content`.
    pub fn looks_same(&self, other: &ImageContent) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.encoded_len == other.encoded_len
            && self.sample_head == other.sample_head
            && self.sample_tail == other.sample_tail
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text { text: String },
    Image(ImageContent),
    FileList { paths: Vec<PathBuf> },
}

impl Payload {
    pub fn kind(&self) -> ItemKind {
        match self {
            Payload::Text { .. } => ItemKind::Text,
            Payload::Image(_) => ItemKind::Image,
            Payload::FileList { .. } => ItemKind::FileList,
        }
    }

    /// Content equality contract used for deduplication.
    ///
    /// - Text: length check first, then exact equality.
    /// - Image: dimensions + encoded length + boundary samples. This is a
    ///   practically reliable duplicate test, not exact equality.
    /// - FileList: exact ordered path equality.
    pub fn same_content(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::Text { text: a }, Payload::Text { text: b }) => {
                a.len() == b.len() && a == b
            }
            (Payload::Image(a), Payload::Image(b)) => a.looks_same(b),
            (Payload::FileList { paths: a }, Payload::FileList { paths: b }) => a == b,
            _ => false,
        }
    }

    /// Full text of a Text payload, never truncated.
    pub fn full_text(&self) -> Option<&str> {
        match self {
            Payload::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageContent> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut ImageContent> {
        match self {
            Payload::Image(image) => Some(image),
            _ => None,
        }
    }
}

/// One clipboard history entry.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub payload: Payload,
    /// Unix epoch millis of first capture.
    pub created_at_ms: i64,
    /// First-line preview for Text, "Image WxH" for images, joined base
    /// names for file lists.
    pub preview: String,
    /// Precomputed human label, e.g. "3 file(s)".
    pub display_text: Option<String>,
    /// Persisted byte footprint estimate.
    pub byte_size: u64,
    pub is_favorite: bool,
    /// Effective "hide this content" flag.
    pub is_sensitive: bool,
    /// Sticky marker: the secret heuristic flagged this content.
    pub is_auto_sensitive: bool,
    /// Sticky marker: the password heuristic flagged this content.
    pub is_password_like: bool,
    /// The user explicitly un-hid an auto-flagged item; automatic
    /// re-classification must not hide it again.
    pub is_manually_unsensitive: bool,
    pub note: Option<String>,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }

    pub fn materialized(&self) -> bool {
        match &self.payload {
            Payload::Image(image) => image.materialized(),
            _ => true,
        }
    }
}
