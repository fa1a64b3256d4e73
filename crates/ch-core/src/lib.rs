//! # ch-core
//!
//! Core domain models and business logic for cliphoard.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

pub mod classify;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod history;
pub mod ids;
pub mod item;
pub mod ports;
pub mod sensitivity;
pub mod settings;

// Re-export commonly used types at the crate root
pub use classify::{CaptureData, ClassifiedCapture, RawCapture, SourceHints};
pub use history::{HistoryStore, UpsertOutcome};
pub use ids::ItemId;
pub use item::{ImageContent, ImageState, Item, ItemKind, Payload};
pub use settings::{DetectionSettings, HistorySettings};
