//! Shared item builders for the unit tests in this crate.

use crate::ids::ItemId;
use crate::item::{ImageContent, ImageState, Item, Payload, IMAGE_SAMPLE_LEN};

pub fn text_item(text: &str) -> Item {
    Item {
        id: ItemId::new(),
        payload: Payload::Text {
            text: text.to_string(),
        },
        created_at_ms: 0,
        preview: text.chars().take(100).collect(),
        display_text: None,
        byte_size: text.len() as u64,
        is_favorite: false,
        is_sensitive: false,
        is_auto_sensitive: false,
        is_password_like: false,
        is_manually_unsensitive: false,
        note: None,
    }
}

pub fn image_item(seed: u8, loaded: bool) -> Item {
    let bytes = vec![seed; 256];
    let state = if loaded {
        ImageState::Loaded(bytes.clone())
    } else {
        ImageState::Unloaded
    };
    Item {
        payload: Payload::Image(ImageContent {
            width: 10,
            height: 10,
            encoded_len: bytes.len() as u64,
            sample_head: bytes[..IMAGE_SAMPLE_LEN].to_vec(),
            sample_tail: bytes[bytes.len() - IMAGE_SAMPLE_LEN..].to_vec(),
            state,
        }),
        byte_size: bytes.len() as u64,
        ..text_item("")
    }
}
