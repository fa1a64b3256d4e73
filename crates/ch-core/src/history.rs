//! Ordered history store and the dedup/upsert engine.
//!
//! The store is a most-recent-first sequence of [`Item`]s. It is pure state:
//! all persistence effects are described by the returned outcomes and id
//! lists, and applied by the caller (the application service owns the only
//! mutable handle and serializes every mutation).

use std::collections::HashSet;

use crate::ids::ItemId;
use crate::item::{ImageState, Item, ItemKind, Payload};

/// Window of recent items scanned for duplicates when the candidate is
/// large; scanning the full store against big payloads is not worth it.
pub const DEDUP_SCAN_WINDOW: usize = 10;
/// A text candidate at or above this many characters counts as large.
pub const LARGE_TEXT_CHARS: usize = 10_000;

/// Result of [`HistoryStore::upsert`]. Tells the caller which persistence
/// effects to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The candidate equals the item already at the top; nothing moved and
    /// nothing needs persisting.
    Unchanged { id: ItemId },
    /// Brand-new content inserted at the head; persist it.
    Inserted { id: ItemId },
    /// Content matched an older entry; the entry was removed, its metadata
    /// merged into the candidate, and the candidate inserted at the head.
    /// Delete the replaced persisted record, then persist the merged item.
    Merged { id: ItemId, replaced_id: ItemId },
}

impl UpsertOutcome {
    pub fn id(&self) -> &ItemId {
        match self {
            UpsertOutcome::Unchanged { id }
            | UpsertOutcome::Inserted { id }
            | UpsertOutcome::Merged { id, .. } => id,
        }
    }
}

/// Most-recent-first collection of history items.
#[derive(Debug, Default)]
pub struct HistoryStore {
    items: Vec<Item>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Rebuild from persisted items, already ordered most-recent-first.
    pub fn from_items(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn front(&self) -> Option<&Item> {
        self.items.first()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut Item> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Most-recent-first iteration; this order is the contract for
    /// "most recent N" queries.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    /// Insert-or-merge driven by content equality.
    pub fn upsert(&mut self, mut candidate: Item) -> UpsertOutcome {
        // Repeated copy of the thing already at the top is common and must
        // not perturb order or fire a duplicate persistence write.
        if let Some(front) = self.items.first() {
            if front.payload.same_content(&candidate.payload) {
                return UpsertOutcome::Unchanged {
                    id: front.id.clone(),
                };
            }
        }

        let window = if is_large(&candidate) {
            DEDUP_SCAN_WINDOW.min(self.items.len())
        } else {
            self.items.len()
        };

        let matched = self.items[..window]
            .iter()
            .position(|item| item.payload.same_content(&candidate.payload));

        match matched {
            Some(index) => {
                let old = self.items.remove(index);
                candidate.is_favorite = old.is_favorite;
                candidate.is_sensitive = old.is_sensitive;
                candidate.is_auto_sensitive |= old.is_auto_sensitive;
                candidate.is_password_like |= old.is_password_like;
                candidate.is_manually_unsensitive = old.is_manually_unsensitive;
                candidate.note = old.note;
                let id = candidate.id.clone();
                self.items.insert(0, candidate);
                UpsertOutcome::Merged {
                    id,
                    replaced_id: old.id,
                }
            }
            None => {
                let id = candidate.id.clone();
                self.items.insert(0, candidate);
                UpsertOutcome::Inserted { id }
            }
        }
    }

    /// Remove the given items. Unknown ids are ignored. Returns the ids
    /// actually removed.
    pub fn remove_ids(&mut self, ids: &HashSet<ItemId>) -> Vec<ItemId> {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if ids.contains(&item.id) {
                removed.push(item.id.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Enforce the count cap: drop non-favorite items from the tail until at
    /// or under `max_items`. Returns the evicted ids, oldest first.
    pub fn truncate_to(&mut self, max_items: usize) -> Vec<ItemId> {
        let mut evicted = Vec::new();
        while self.items.len() > max_items {
            let victim = self
                .items
                .iter()
                .rposition(|item| !item.is_favorite);
            match victim {
                Some(index) => evicted.push(self.items.remove(index).id),
                // Everything left is favorited; the cap yields to the
                // favorite exemption.
                None => break,
            }
        }
        evicted
    }

    /// Memory-residency pass: unload the oldest-inserted materialized images
    /// beyond `max_loaded`. Favorite status is irrelevant here, only the
    /// persisted record is exempt from eviction, not its resident bytes.
    pub fn unload_excess_images(&mut self, max_loaded: usize) -> usize {
        let loaded = self
            .items
            .iter()
            .filter(|item| item.materialized() && item.kind() == ItemKind::Image)
            .count();
        if loaded <= max_loaded {
            return 0;
        }

        let mut to_unload = loaded - max_loaded;
        let mut unloaded = 0;
        for item in self.items.iter_mut().rev() {
            if to_unload == 0 {
                break;
            }
            if let Payload::Image(image) = &mut item.payload {
                if image.materialized() {
                    image.state = ImageState::Unloaded;
                    to_unload -= 1;
                    unloaded += 1;
                }
            }
        }
        unloaded
    }

    /// Re-apply the sticky auto-sensitive flag after the setting was turned
    /// on. Returns the ids whose effective flag changed.
    pub fn apply_auto_sensitive_enabled(&mut self) -> Vec<ItemId> {
        self.apply_sticky(|item| item.is_auto_sensitive)
    }

    /// Same re-apply semantics for the independent password-like flag.
    pub fn apply_password_like_enabled(&mut self) -> Vec<ItemId> {
        self.apply_sticky(|item| item.is_password_like)
    }

    fn apply_sticky(&mut self, flagged: impl Fn(&Item) -> bool) -> Vec<ItemId> {
        let mut changed = Vec::new();
        for item in &mut self.items {
            if flagged(item) && !item.is_sensitive && !item.is_manually_unsensitive {
                item.is_sensitive = true;
                changed.push(item.id.clone());
            }
        }
        changed
    }
}

fn is_large(item: &Item) -> bool {
    match &item.payload {
        Payload::Image(_) => true,
        Payload::Text { text } => text.chars().count() >= LARGE_TEXT_CHARS,
        Payload::FileList { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{image_item, text_item};

    #[test]
    fn repeated_top_copy_is_unchanged() {
        let mut store = HistoryStore::new();
        let first = text_item("hello");
        let first_id = first.id.clone();
        assert!(matches!(store.upsert(first), UpsertOutcome::Inserted { .. }));

        let outcome = store.upsert(text_item("hello"));
        assert_eq!(outcome, UpsertOutcome::Unchanged { id: first_id });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn matching_older_entry_is_merged_and_promoted() {
        let mut store = HistoryStore::new();
        let mut original = text_item("alpha");
        original.is_favorite = true;
        original.note = Some("keep".to_string());
        let original_id = original.id.clone();
        store.upsert(original);
        store.upsert(text_item("beta"));

        let outcome = store.upsert(text_item("alpha"));
        let UpsertOutcome::Merged { id, replaced_id } = outcome else {
            panic!("expected merge");
        };
        assert_eq!(replaced_id, original_id);
        assert_eq!(store.len(), 2);

        let merged = store.get(&id).unwrap();
        assert!(merged.is_favorite);
        assert_eq!(merged.note.as_deref(), Some("keep"));
        assert_eq!(store.front().unwrap().id, id);
    }

    #[test]
    fn merge_or_combines_sticky_flags() {
        let mut store = HistoryStore::new();
        let mut original = text_item("AKIA-ish");
        original.is_auto_sensitive = true;
        original.is_manually_unsensitive = true;
        store.upsert(original);
        store.upsert(text_item("spacer"));

        let mut fresh = text_item("AKIA-ish");
        fresh.is_password_like = true;
        let outcome = store.upsert(fresh);

        let merged = store.get(outcome.id()).unwrap();
        assert!(merged.is_auto_sensitive);
        assert!(merged.is_password_like);
        assert!(merged.is_manually_unsensitive);
    }

    #[test]
    fn large_candidate_scan_is_windowed() {
        let mut store = HistoryStore::new();
        let big = "x".repeat(LARGE_TEXT_CHARS);
        store.upsert(text_item(&big));
        // Push the big item past the scan window.
        for i in 0..DEDUP_SCAN_WINDOW {
            store.upsert(text_item(&format!("filler {i}")));
        }

        let outcome = store.upsert(text_item(&big));
        assert!(
            matches!(outcome, UpsertOutcome::Inserted { .. }),
            "out-of-window large duplicate must not be found"
        );
        assert_eq!(store.len(), DEDUP_SCAN_WINDOW + 2);
    }

    #[test]
    fn small_candidate_scans_full_store() {
        let mut store = HistoryStore::new();
        store.upsert(text_item("needle"));
        for i in 0..DEDUP_SCAN_WINDOW + 5 {
            store.upsert(text_item(&format!("filler {i}")));
        }

        let outcome = store.upsert(text_item("needle"));
        assert!(matches!(outcome, UpsertOutcome::Merged { .. }));
    }

    #[test]
    fn truncate_evicts_oldest_first_and_skips_favorites() {
        let mut store = HistoryStore::new();
        let mut oldest = text_item("oldest-favorite");
        oldest.is_favorite = true;
        store.upsert(oldest);
        let second = store.upsert(text_item("second")).id().clone();
        store.upsert(text_item("third"));
        store.upsert(text_item("fourth"));

        let evicted = store.truncate_to(3);
        assert_eq!(evicted, vec![second]);
        assert_eq!(store.len(), 3);
        assert!(store.iter().any(|i| i.preview == "oldest-favorite"));
    }

    #[test]
    fn truncate_yields_when_only_favorites_remain() {
        let mut store = HistoryStore::new();
        for i in 0..3 {
            let mut item = text_item(&format!("fav {i}"));
            item.is_favorite = true;
            store.upsert(item);
        }
        assert!(store.truncate_to(1).is_empty());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn unload_pass_unloads_oldest_images() {
        let mut store = HistoryStore::new();
        for seed in 0..4u8 {
            store.upsert(image_item(seed, true));
        }
        assert_eq!(store.unload_excess_images(2), 2);

        let states: Vec<bool> = store.iter().map(|i| i.materialized()).collect();
        // Most-recent-first: the two newest stay loaded.
        assert_eq!(states, vec![true, true, false, false]);
    }

    #[test]
    fn unload_pass_ignores_favorite_status() {
        let mut store = HistoryStore::new();
        let mut favorite = image_item(1, true);
        favorite.is_favorite = true;
        store.upsert(favorite);
        store.upsert(image_item(2, true));

        assert_eq!(store.unload_excess_images(1), 1);
        let oldest = store.iter().last().unwrap();
        assert!(oldest.is_favorite && !oldest.materialized());
    }

    #[test]
    fn sticky_sweep_respects_manual_unsensitive() {
        let mut store = HistoryStore::new();
        let mut flagged = text_item("secret-ish");
        flagged.is_auto_sensitive = true;
        let flagged_id = store.upsert(flagged).id().clone();

        let mut overridden = text_item("unhidden");
        overridden.is_auto_sensitive = true;
        overridden.is_manually_unsensitive = true;
        let overridden_id = store.upsert(overridden).id().clone();

        let changed = store.apply_auto_sensitive_enabled();
        assert_eq!(changed, vec![flagged_id.clone()]);
        assert!(store.get(&flagged_id).unwrap().is_sensitive);
        assert!(!store.get(&overridden_id).unwrap().is_sensitive);
    }

    #[test]
    fn password_sweep_is_independent() {
        let mut store = HistoryStore::new();
        let mut password = text_item("aB3!kX9@pQ");
        password.is_password_like = true;
        let id = store.upsert(password).id().clone();

        assert!(store.apply_auto_sensitive_enabled().is_empty());
        assert_eq!(store.apply_password_like_enabled(), vec![id.clone()]);
        assert!(store.get(&id).unwrap().is_sensitive);
    }

    #[test]
    fn image_duplicates_match_without_resident_bytes() {
        let mut store = HistoryStore::new();
        store.upsert(image_item(7, false));
        store.upsert(text_item("spacer"));

        let outcome = store.upsert(image_item(7, true));
        assert!(matches!(outcome, UpsertOutcome::Merged { .. }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remove_ids_ignores_unknown() {
        let mut store = HistoryStore::new();
        let id = store.upsert(text_item("one")).id().clone();
        let mut ids = HashSet::new();
        ids.insert(id.clone());
        ids.insert(ItemId::new());
        assert_eq!(store.remove_ids(&ids), vec![id]);
        assert!(store.is_empty());
    }
}
