use std::path::PathBuf;

use anyhow::{anyhow, Result};
use diesel::prelude::*;

use ch_core::item::{ImageContent, ImageState, Item, ItemKind, Payload};
use ch_core::ItemId;

use super::schema::{t_history_item, t_image_blob};

pub const KIND_TEXT: &str = "text";
pub const KIND_IMAGE: &str = "image";
pub const KIND_FILE_LIST: &str = "file_list";

#[derive(Queryable, Insertable)]
#[diesel(table_name = t_history_item)]
pub struct HistoryItemRow {
    pub id: String,
    pub kind: String,
    pub text_content: Option<String>,
    pub file_paths: Option<String>,
    pub preview: String,
    pub display_text: Option<String>,
    pub byte_size: i64,
    pub created_at_ms: i64,
    pub favorite: bool,
    pub sensitive: bool,
    pub auto_sensitive: bool,
    pub password_like: bool,
    pub manually_unsensitive: bool,
    pub note: Option<String>,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub image_sample_head: Option<Vec<u8>>,
    pub image_sample_tail: Option<Vec<u8>>,
}

#[derive(Queryable, Insertable)]
#[diesel(table_name = t_image_blob)]
pub struct ImageBlobRow {
    pub item_id: String,
    pub bytes: Vec<u8>,
}

impl HistoryItemRow {
    pub fn from_item(item: &Item) -> Result<Self> {
        let (text_content, file_paths, image) = match &item.payload {
            Payload::Text { text } => (Some(text.clone()), None, None),
            Payload::FileList { paths } => {
                let paths: Vec<String> = paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect();
                (None, Some(serde_json::to_string(&paths)?), None)
            }
            Payload::Image(image) => (None, None, Some(image)),
        };

        Ok(Self {
            id: item.id.to_string(),
            kind: match item.kind() {
                ItemKind::Text => KIND_TEXT,
                ItemKind::Image => KIND_IMAGE,
                ItemKind::FileList => KIND_FILE_LIST,
            }
            .to_string(),
            text_content,
            file_paths,
            preview: item.preview.clone(),
            display_text: item.display_text.clone(),
            byte_size: item.byte_size as i64,
            created_at_ms: item.created_at_ms,
            favorite: item.is_favorite,
            sensitive: item.is_sensitive,
            auto_sensitive: item.is_auto_sensitive,
            password_like: item.is_password_like,
            manually_unsensitive: item.is_manually_unsensitive,
            note: item.note.clone(),
            image_width: image.map(|i| i.width as i32),
            image_height: image.map(|i| i.height as i32),
            image_sample_head: image.map(|i| i.sample_head.clone()),
            image_sample_tail: image.map(|i| i.sample_tail.clone()),
        })
    }

    /// Rebuild the domain item. `image_bytes` materializes an image row when
    /// the adapter chose to preload it.
    pub fn into_item(self, image_bytes: Option<Vec<u8>>) -> Result<Item> {
        let payload = match self.kind.as_str() {
            KIND_TEXT => Payload::Text {
                text: self
                    .text_content
                    .ok_or_else(|| anyhow!("text row {} without content", self.id))?,
            },
            KIND_FILE_LIST => {
                let raw = self
                    .file_paths
                    .ok_or_else(|| anyhow!("file list row {} without paths", self.id))?;
                let paths: Vec<String> = serde_json::from_str(&raw)?;
                Payload::FileList {
                    paths: paths.into_iter().map(PathBuf::from).collect(),
                }
            }
            KIND_IMAGE => Payload::Image(ImageContent {
                width: self
                    .image_width
                    .ok_or_else(|| anyhow!("image row {} without width", self.id))?
                    as u32,
                height: self
                    .image_height
                    .ok_or_else(|| anyhow!("image row {} without height", self.id))?
                    as u32,
                encoded_len: self.byte_size as u64,
                sample_head: self.image_sample_head.unwrap_or_default(),
                sample_tail: self.image_sample_tail.unwrap_or_default(),
                state: match image_bytes {
                    Some(bytes) => ImageState::Loaded(bytes),
                    None => ImageState::Unloaded,
                },
            }),
            other => return Err(anyhow!("unknown item kind {other:?} in row {}", self.id)),
        };

        Ok(Item {
            id: ItemId::from_string(self.id),
            payload,
            created_at_ms: self.created_at_ms,
            preview: self.preview,
            display_text: self.display_text,
            byte_size: self.byte_size as u64,
            is_favorite: self.favorite,
            is_sensitive: self.sensitive,
            is_auto_sensitive: self.auto_sensitive,
            is_password_like: self.password_like,
            is_manually_unsensitive: self.manually_unsensitive,
            note: self.note,
        })
    }
}
