//! Periodic retention maintenance.
//!
//! Runs age-based cleanup on a timer and, when the persisted footprint
//! exceeds the byte budget, a corrective pass with a halved window. A run
//! still executing when the next tick fires is skipped, never overlapped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use ch_core::settings::shrink_retention_window;

use crate::service::HistoryService;

/// Default cadence for retention passes.
pub const MAINTENANCE_PERIOD: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub deleted: usize,
    /// True when the byte budget forced the shortened-window pass.
    pub corrective_pass: bool,
    /// True when this tick was skipped because a run was still in flight.
    pub skipped: bool,
}

pub struct MaintenanceTask {
    service: Arc<HistoryService>,
    running: Mutex<()>,
}

impl MaintenanceTask {
    pub fn new(service: Arc<HistoryService>) -> Self {
        Self {
            service,
            running: Mutex::new(()),
        }
    }

    /// One retention pass. Safe to call concurrently; overlapping calls
    /// return a skipped report.
    pub async fn run_once(&self) -> Result<MaintenanceReport> {
        let Ok(_guard) = self.running.try_lock() else {
            debug!("Maintenance still running, skipping tick");
            return Ok(MaintenanceReport {
                skipped: true,
                ..Default::default()
            });
        };

        let settings = self.service.settings();
        let repo = self.service.repository();
        let mut report = MaintenanceReport::default();

        let removed = repo
            .delete_older_than(settings.retention_days, true)
            .await?;
        self.service.drop_from_memory(&removed).await;
        report.deleted += removed.len();

        let total = repo.total_byte_size().await?;
        if total > settings.max_storage_bytes {
            // Coarse corrective pass: shrink the window and retry rather
            // than evicting largest-first.
            let window = shrink_retention_window(settings.retention_days);
            info!(
                "History storage at {total} bytes exceeds budget of {}, \
                 re-running cleanup with a {window}-day window",
                settings.max_storage_bytes
            );
            let removed = repo.delete_older_than(window, true).await?;
            self.service.drop_from_memory(&removed).await;
            report.deleted += removed.len();
            report.corrective_pass = true;
        }

        if report.deleted > 0 {
            info!("Maintenance removed {} expired items", report.deleted);
        }
        Ok(report)
    }

    /// Spawn the recurring maintenance loop.
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup is quiet.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once().await {
                    warn!("Maintenance pass failed: {e}");
                }
            }
        })
    }
}
