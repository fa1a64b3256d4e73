//! History and detection settings.
//!
//! Settings storage is external; the core receives these structs fully
//! constructed (constructor injection, no global state).

use serde::{Deserialize, Serialize};

/// Maximum length of a user note, in characters.
pub const NOTE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySettings {
    /// Count cap enforced after every insert.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Age retention window for the periodic cleanup, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Persisted byte budget checked by the periodic cleanup.
    #[serde(default = "default_max_storage_bytes")]
    pub max_storage_bytes: u64,

    /// How many images may stay materialized in memory.
    #[serde(default = "default_max_loaded_images")]
    pub max_loaded_images: usize,

    #[serde(default)]
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Hide items flagged by the secret-pattern detector.
    pub auto_sensitive_enabled: bool,
    /// Hide items flagged by the password heuristic.
    pub password_like_enabled: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            retention_days: default_retention_days(),
            max_storage_bytes: default_max_storage_bytes(),
            max_loaded_images: default_max_loaded_images(),
            detection: DetectionSettings::default(),
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            auto_sensitive_enabled: true,
            password_like_enabled: true,
        }
    }
}

/// Age window for the corrective storage-budget pass: half the configured
/// days, floor one day.
pub fn shrink_retention_window(days: u32) -> u32 {
    (days / 2).max(1)
}

fn default_max_items() -> usize {
    500
}

fn default_retention_days() -> u32 {
    30
}

fn default_max_storage_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_max_loaded_images() -> usize {
    15
}
