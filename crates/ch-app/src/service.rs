//! The history service: single mutation actor over the in-memory store.
//!
//! All mutations (insert, merge, evict, toggles, delete) run under one
//! `tokio::sync::Mutex`, so no two mutations interleave. Persistence calls
//! never run while the lock is held: the in-memory store settles first and
//! is the source of truth for the running process, with persisted state
//! converging as a best-effort side effect. Per-id write/delete ordering
//! falls out of awaiting those effects inside the same actor call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use log::{debug, warn};
use tokio::sync::Mutex;

use ch_core::classify::{classify, RawCapture};
use ch_core::history::{HistoryStore, UpsertOutcome};
use ch_core::item::{ImageState, Item, ItemKind, Payload};
use ch_core::ports::{ClockPort, HistoryRepositoryPort};
use ch_core::sensitivity;
use ch_core::settings::{HistorySettings, NOTE_MAX_CHARS};
use ch_core::ItemId;

/// Filters for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Favorites,
    Images,
    Sensitive,
}

pub struct HistoryService {
    store: Mutex<HistoryStore>,
    repo: Arc<dyn HistoryRepositoryPort>,
    clock: Arc<dyn ClockPort>,
    settings: HistorySettings,
    auto_sensitive_enabled: AtomicBool,
    password_like_enabled: AtomicBool,
}

impl HistoryService {
    pub fn new(
        repo: Arc<dyn HistoryRepositoryPort>,
        clock: Arc<dyn ClockPort>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            store: Mutex::new(HistoryStore::new()),
            auto_sensitive_enabled: AtomicBool::new(settings.detection.auto_sensitive_enabled),
            password_like_enabled: AtomicBool::new(settings.detection.password_like_enabled),
            repo,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &HistorySettings {
        &self.settings
    }

    pub fn repository(&self) -> Arc<dyn HistoryRepositoryPort> {
        Arc::clone(&self.repo)
    }

    /// Rebuild the in-memory store from persisted history.
    pub async fn load_from_disk(&self) -> Result<usize> {
        let items = self.repo.load_all(self.settings.max_items).await?;
        let count = items.len();
        *self.store.lock().await = HistoryStore::from_items(items);
        Ok(count)
    }

    /// Ingest one raw capture event.
    ///
    /// Returns the id of the affected item, or `None` when the classifier
    /// rejected the payload (oversized content; silent by design).
    pub async fn upsert(&self, raw: RawCapture) -> Result<Option<ItemId>> {
        let Some(classified) = classify(&raw) else {
            debug!("capture rejected by classifier");
            return Ok(None);
        };
        let flags = sensitivity::detect(raw.hints, &classified.payload);
        let auto_on = self.auto_sensitive_enabled.load(Ordering::Relaxed);
        let password_on = self.password_like_enabled.load(Ordering::Relaxed);

        let candidate = Item {
            id: ItemId::new(),
            created_at_ms: self.clock.now_ms(),
            preview: classified.preview,
            display_text: classified.display_text,
            byte_size: classified.byte_size,
            payload: classified.payload,
            is_favorite: false,
            is_sensitive: (flags.auto_sensitive && auto_on)
                || (flags.password_like && password_on),
            is_auto_sensitive: flags.auto_sensitive,
            is_password_like: flags.password_like,
            is_manually_unsensitive: false,
            note: None,
        };

        let (outcome, evicted, settled) = {
            let mut store = self.store.lock().await;
            let outcome = store.upsert(candidate);
            let evicted = store.truncate_to(self.settings.max_items);
            store.unload_excess_images(self.settings.max_loaded_images);
            let settled = match &outcome {
                UpsertOutcome::Unchanged { .. } => None,
                _ => store.get(outcome.id()).cloned(),
            };
            (outcome, evicted, settled)
        };

        // Persistence effects, in call order, outside the store lock.
        match &outcome {
            UpsertOutcome::Unchanged { .. } => {}
            UpsertOutcome::Inserted { .. } => {
                if let Some(item) = &settled {
                    self.persist_save(item, true).await;
                }
            }
            UpsertOutcome::Merged { replaced_id, .. } => {
                self.persist_delete(std::slice::from_ref(replaced_id)).await;
                if let Some(item) = &settled {
                    self.persist_save(item, true).await;
                }
            }
        }
        if !evicted.is_empty() {
            self.persist_delete(&evicted).await;
        }

        Ok(Some(outcome.id().clone()))
    }

    /// Snapshot query; runs against the store under the lock, clones out.
    pub async fn list(&self, filter: ListFilter, query: Option<&str>) -> Vec<Item> {
        let needle = query.map(str::to_lowercase);
        let store = self.store.lock().await;
        store
            .iter()
            .filter(|item| match filter {
                ListFilter::All => true,
                ListFilter::Favorites => item.is_favorite,
                ListFilter::Images => item.kind() == ItemKind::Image,
                ListFilter::Sensitive => item.is_sensitive,
            })
            .filter(|item| match &needle {
                None => true,
                Some(needle) => matches_query(item, needle),
            })
            .cloned()
            .collect()
    }

    /// Toggle the favorite flag. Stale ids are no-ops.
    pub async fn toggle_favorite(&self, id: &ItemId) -> Result<()> {
        let updated = {
            let mut store = self.store.lock().await;
            match store.get_mut(id) {
                Some(item) => {
                    item.is_favorite = !item.is_favorite;
                    Some(item.clone())
                }
                None => None,
            }
        };
        if let Some(item) = updated {
            self.persist_save(&item, false).await;
        }
        Ok(())
    }

    /// Toggle the effective sensitive flag; returns the new value, or `None`
    /// for a stale id.
    ///
    /// Un-hiding an auto-flagged item pins `is_manually_unsensitive` so the
    /// re-classification sweeps leave it alone; re-hiding clears the pin.
    pub async fn toggle_sensitive(&self, id: &ItemId) -> Result<Option<bool>> {
        let updated = {
            let mut store = self.store.lock().await;
            match store.get_mut(id) {
                Some(item) => {
                    if item.is_sensitive {
                        item.is_sensitive = false;
                        if item.is_auto_sensitive || item.is_password_like {
                            item.is_manually_unsensitive = true;
                        }
                    } else {
                        item.is_sensitive = true;
                        item.is_manually_unsensitive = false;
                    }
                    Some(item.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(item) => {
                let new_value = item.is_sensitive;
                self.persist_save(&item, false).await;
                Ok(Some(new_value))
            }
            None => Ok(None),
        }
    }

    /// Attach a short user note (truncated to 100 characters; empty clears).
    pub async fn set_note(&self, id: &ItemId, note: &str) -> Result<()> {
        let trimmed: String = note.chars().take(NOTE_MAX_CHARS).collect();
        let updated = {
            let mut store = self.store.lock().await;
            match store.get_mut(id) {
                Some(item) => {
                    item.note = if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed)
                    };
                    Some(item.clone())
                }
                None => None,
            }
        };
        if let Some(item) = updated {
            self.persist_save(&item, false).await;
        }
        Ok(())
    }

    /// Explicit delete; unknown ids are ignored.
    pub async fn delete(&self, ids: &HashSet<ItemId>) -> Result<()> {
        let removed = {
            let mut store = self.store.lock().await;
            store.remove_ids(ids)
        };
        if !removed.is_empty() {
            self.persist_delete(&removed).await;
        }
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store.lock().await.clear();
        if let Err(e) = self.repo.clear_all().await {
            warn!("Failed to clear persisted history: {e}");
        }
        Ok(())
    }

    /// Copy-out payload for pasting. Blocks until an unloaded image is
    /// materialized; `Ok(None)` means the item is gone or its content is
    /// unavailable.
    pub async fn copy_out(&self, id: &ItemId) -> Result<Option<Payload>> {
        {
            let mut store = self.store.lock().await;
            let Some(item) = store.get_mut(id) else {
                return Ok(None);
            };
            match &mut item.payload {
                Payload::Image(image) if !image.materialized() => {
                    image.state = ImageState::Loading;
                }
                payload => return Ok(Some(payload.clone())),
            }
        }

        self.finish_image_load(id).await
    }

    /// Display-triggered load of an unmaterialized image. Returns whether
    /// the image is resident afterwards.
    pub async fn materialize_image(&self, id: &ItemId) -> Result<bool> {
        {
            let mut store = self.store.lock().await;
            let Some(item) = store.get_mut(id) else {
                return Ok(false);
            };
            match &mut item.payload {
                Payload::Image(image) => {
                    if image.materialized() {
                        return Ok(true);
                    }
                    image.state = ImageState::Loading;
                }
                _ => return Ok(false),
            }
        }

        Ok(self.finish_image_load(id).await?.is_some())
    }

    /// Load bytes from the adapter and settle the item state. The item may
    /// have been deleted while the load was in flight; the result is then
    /// discarded silently.
    async fn finish_image_load(&self, id: &ItemId) -> Result<Option<Payload>> {
        let bytes = match self.repo.load_image_bytes(id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Image load failed for {id}: {e}");
                None
            }
        };

        let mut store = self.store.lock().await;
        let Some(item) = store.get_mut(id) else {
            return Ok(None);
        };
        let Payload::Image(image) = &mut item.payload else {
            return Ok(None);
        };
        match bytes {
            Some(bytes) => {
                image.state = ImageState::Loaded(bytes);
                Ok(Some(item.payload.clone()))
            }
            None => {
                // Content unavailable; the item stays listed.
                image.state = ImageState::Unloaded;
                Ok(None)
            }
        }
    }

    /// Re-apply sticky auto-sensitive flags after the setting was enabled.
    pub async fn apply_auto_sensitive_enabled(&self) -> Result<usize> {
        self.auto_sensitive_enabled.store(true, Ordering::Relaxed);
        let changed = {
            let mut store = self.store.lock().await;
            let ids = store.apply_auto_sensitive_enabled();
            ids.iter()
                .filter_map(|id| store.get(id).cloned())
                .collect::<Vec<_>>()
        };
        for item in &changed {
            self.persist_save(item, false).await;
        }
        Ok(changed.len())
    }

    /// Same re-sweep for the independent password-like flag.
    pub async fn apply_password_like_enabled(&self) -> Result<usize> {
        self.password_like_enabled.store(true, Ordering::Relaxed);
        let changed = {
            let mut store = self.store.lock().await;
            let ids = store.apply_password_like_enabled();
            ids.iter()
                .filter_map(|id| store.get(id).cloned())
                .collect::<Vec<_>>()
        };
        for item in &changed {
            self.persist_save(item, false).await;
        }
        Ok(changed.len())
    }

    /// Turn a detector off. No sweep: already-hidden items stay hidden.
    pub fn set_auto_sensitive_enabled(&self, enabled: bool) {
        self.auto_sensitive_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_password_like_enabled(&self, enabled: bool) {
        self.password_like_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Drop items that the persistence layer already removed (used by the
    /// maintenance task after age/budget cleanup).
    pub async fn drop_from_memory(&self, ids: &[ItemId]) {
        let ids: HashSet<ItemId> = ids.iter().cloned().collect();
        self.store.lock().await.remove_ids(&ids);
    }

    async fn persist_save(&self, item: &Item, save_image_bytes: bool) {
        if let Err(e) = self.repo.save(item, save_image_bytes).await {
            warn!("Failed to persist item {}: {e}", item.id);
        }
    }

    async fn persist_delete(&self, ids: &[ItemId]) {
        if let Err(e) = self.repo.delete_by_ids(ids).await {
            warn!("Failed to delete persisted items: {e}");
        }
    }
}

fn matches_query(item: &Item, needle: &str) -> bool {
    if item.preview.to_lowercase().contains(needle) {
        return true;
    }
    if let Some(text) = item.payload.full_text() {
        if text.to_lowercase().contains(needle) {
            return true;
        }
    }
    item.note
        .as_deref()
        .is_some_and(|note| note.to_lowercase().contains(needle))
}
