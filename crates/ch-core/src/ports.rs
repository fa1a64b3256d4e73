//! Ports: narrow interfaces to external collaborators.
//!
//! The persistence adapter is the only blocking/async dependency of the
//! core. Per-id write and delete ordering is the caller's responsibility
//! (all calls are routed through the single mutation actor).

use anyhow::Result;
use async_trait::async_trait;

use crate::ids::ItemId;
use crate::item::Item;

/// Persistence contract consumed by the history service.
#[async_trait]
pub trait HistoryRepositoryPort: Send + Sync {
    /// Persist an item, upserting by id. `save_image_bytes` controls whether
    /// the encoded image payload is (re)written alongside the metadata row.
    async fn save(&self, item: &Item, save_image_bytes: bool) -> Result<()>;

    /// Load up to `limit` items, most-recent-first. The adapter chooses how
    /// many images arrive pre-materialized.
    async fn load_all(&self, limit: usize) -> Result<Vec<Item>>;

    /// Encoded bytes of an image item, or `None` when missing.
    async fn load_image_bytes(&self, id: &ItemId) -> Result<Option<Vec<u8>>>;

    async fn delete_by_ids(&self, ids: &[ItemId]) -> Result<()>;

    /// Delete persisted items older than `days`. Returns the deleted ids so
    /// the in-memory store can be kept in step.
    async fn delete_older_than(&self, days: u32, exclude_favorites: bool) -> Result<Vec<ItemId>>;

    /// Total persisted byte footprint.
    async fn total_byte_size(&self) -> Result<u64>;

    async fn clear_all(&self) -> Result<()>;
}

pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> i64;
}
