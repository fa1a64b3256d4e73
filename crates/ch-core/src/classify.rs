//! Content classifier.
//!
//! Turns a raw capture event into a normalized candidate payload, or rejects
//! it outright when tracking it would be unsafe (oversized text or image).
//! Rejection is a resource-protection cutoff, not an error.

use std::io::Cursor;
use std::path::PathBuf;

use crate::item::{ImageContent, ImageState, ItemKind, Payload, IMAGE_SAMPLE_LEN};

/// Hard ceiling for tracked text, in bytes.
pub const MAX_TEXT_BYTES: usize = 1024 * 1024;
/// Hard ceiling for tracked encoded images, in bytes.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
/// Character budget for the one-line preview.
pub const PREVIEW_CHARS: usize = 100;
/// Fixed byte estimate per file path. Paths are cheap metadata, not payload.
pub const FILE_PATH_COST_BYTES: u64 = 128;

/// One raw capture event from the ingestion source.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub data: CaptureData,
    pub hints: SourceHints,
}

#[derive(Debug, Clone)]
pub enum CaptureData {
    Text(String),
    Image(Vec<u8>),
    FileList(Vec<PathBuf>),
}

/// Source-type hint flags exposed by the originating clipboard.
///
/// Password managers tag their writes with a concealed or transient marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceHints {
    pub concealed: bool,
    pub transient: bool,
}

/// Classifier output: a fully materialized payload plus derived attributes.
#[derive(Debug, Clone)]
pub struct ClassifiedCapture {
    pub payload: Payload,
    pub preview: String,
    pub display_text: Option<String>,
    pub byte_size: u64,
}

impl ClassifiedCapture {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }
}

/// Classify a raw capture. Returns `None` when the payload is rejected.
pub fn classify(raw: &RawCapture) -> Option<ClassifiedCapture> {
    match &raw.data {
        CaptureData::Text(text) => classify_text(text),
        CaptureData::Image(bytes) => classify_image(bytes),
        CaptureData::FileList(paths) => classify_file_list(paths),
    }
}

fn classify_text(text: &str) -> Option<ClassifiedCapture> {
    if text.len() > MAX_TEXT_BYTES {
        return None;
    }

    Some(ClassifiedCapture {
        preview: text_preview(text),
        display_text: None,
        byte_size: text.len() as u64,
        payload: Payload::Text {
            text: text.to_string(),
        },
    })
}

fn classify_image(bytes: &[u8]) -> Option<ClassifiedCapture> {
    if bytes.len() > MAX_IMAGE_BYTES {
        return None;
    }

    // Header read only; a handle we cannot size is a corrupt capture.
    let (width, height) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;

    let sample = bytes.len().min(IMAGE_SAMPLE_LEN);
    let content = ImageContent {
        width,
        height,
        encoded_len: bytes.len() as u64,
        sample_head: bytes[..sample].to_vec(),
        sample_tail: bytes[bytes.len() - sample..].to_vec(),
        state: ImageState::Loaded(bytes.to_vec()),
    };

    Some(ClassifiedCapture {
        preview: format!("Image {}x{}", width, height),
        display_text: None,
        byte_size: bytes.len() as u64,
        payload: Payload::Image(content),
    })
}

fn classify_file_list(paths: &[PathBuf]) -> Option<ClassifiedCapture> {
    if paths.is_empty() {
        return None;
    }

    let preview = paths
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.to_string_lossy().into_owned())
        })
        .collect::<Vec<_>>()
        .join(", ");

    Some(ClassifiedCapture {
        preview,
        display_text: Some(format!("{} file(s)", paths.len())),
        byte_size: paths.len() as u64 * FILE_PATH_COST_BYTES,
        payload: Payload::FileList {
            paths: paths.to_vec(),
        },
    })
}

/// First line of the text, truncated to [`PREVIEW_CHARS`] characters.
fn text_preview(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("");
    first_line.chars().take(PREVIEW_CHARS).collect()
}
