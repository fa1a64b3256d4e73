//! Tests for the periodic retention [`MaintenanceTask`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Notify;

use ch_app::maintenance::MAINTENANCE_PERIOD;
use ch_app::{HistoryService, ListFilter, MaintenanceTask};
use ch_core::classify::{CaptureData, RawCapture, SourceHints};
use ch_core::item::Item;
use ch_core::ports::{ClockPort, HistoryRepositoryPort};
use ch_core::{HistorySettings, ItemId};

/// Repository stub that pretends a configurable set of ids expired.
#[derive(Default)]
struct ExpiringRepo {
    expired: StdMutex<Vec<ItemId>>,
    total_bytes: AtomicU64,
    cleanup_windows: StdMutex<Vec<u32>>,
}

#[async_trait]
impl HistoryRepositoryPort for ExpiringRepo {
    async fn save(&self, _item: &Item, _save_image_bytes: bool) -> Result<()> {
        Ok(())
    }

    async fn load_all(&self, _limit: usize) -> Result<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn load_image_bytes(&self, _id: &ItemId) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete_by_ids(&self, _ids: &[ItemId]) -> Result<()> {
        Ok(())
    }

    async fn delete_older_than(&self, days: u32, exclude_favorites: bool) -> Result<Vec<ItemId>> {
        assert!(exclude_favorites, "maintenance must spare favorites");
        self.cleanup_windows.lock().unwrap().push(days);
        Ok(std::mem::take(&mut *self.expired.lock().unwrap()))
    }

    async fn total_byte_size(&self) -> Result<u64> {
        Ok(self.total_bytes.load(Ordering::Relaxed))
    }

    async fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}

/// Repository stub whose cleanup parks until released, to model a run that
/// is still in flight when the next tick fires.
#[derive(Default)]
struct ParkedRepo {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl HistoryRepositoryPort for ParkedRepo {
    async fn save(&self, _item: &Item, _save_image_bytes: bool) -> Result<()> {
        Ok(())
    }

    async fn load_all(&self, _limit: usize) -> Result<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn load_image_bytes(&self, _id: &ItemId) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete_by_ids(&self, _ids: &[ItemId]) -> Result<()> {
        Ok(())
    }

    async fn delete_older_than(&self, _days: u32, _exclude_favorites: bool) -> Result<Vec<ItemId>> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Vec::new())
    }

    async fn total_byte_size(&self) -> Result<u64> {
        Ok(0)
    }

    async fn clear_all(&self) -> Result<()> {
        Ok(())
    }
}

struct ZeroClock;

impl ClockPort for ZeroClock {
    fn now_ms(&self) -> i64 {
        0
    }
}

fn text_capture(text: &str) -> RawCapture {
    RawCapture {
        data: CaptureData::Text(text.to_string()),
        hints: SourceHints::default(),
    }
}

#[tokio::test]
async fn age_cleanup_uses_configured_window() {
    let repo = Arc::new(ExpiringRepo::default());
    let settings = HistorySettings {
        retention_days: 14,
        ..Default::default()
    };
    let service = Arc::new(HistoryService::new(repo.clone(), Arc::new(ZeroClock), settings));
    let task = MaintenanceTask::new(service);

    let report = task.run_once().await.unwrap();
    assert!(!report.skipped);
    assert!(!report.corrective_pass);
    assert_eq!(*repo.cleanup_windows.lock().unwrap(), vec![14]);
}

#[tokio::test]
async fn expired_items_are_dropped_from_memory() {
    let repo = Arc::new(ExpiringRepo::default());
    let service = Arc::new(HistoryService::new(
        repo.clone(),
        Arc::new(ZeroClock),
        HistorySettings::default(),
    ));

    let id = service.upsert(text_capture("stale")).await.unwrap().unwrap();
    repo.expired.lock().unwrap().push(id);

    let task = MaintenanceTask::new(service.clone());
    let report = task.run_once().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(service.list(ListFilter::All, None).await.is_empty());
}

#[tokio::test]
async fn over_budget_triggers_corrective_pass_with_halved_window() {
    let repo = Arc::new(ExpiringRepo::default());
    repo.total_bytes.store(u64::MAX, Ordering::Relaxed);
    let settings = HistorySettings {
        retention_days: 30,
        max_storage_bytes: 1024,
        ..Default::default()
    };
    let service = Arc::new(HistoryService::new(repo.clone(), Arc::new(ZeroClock), settings));
    let task = MaintenanceTask::new(service);

    let report = task.run_once().await.unwrap();
    assert!(report.corrective_pass);
    assert_eq!(*repo.cleanup_windows.lock().unwrap(), vec![30, 15]);
}

#[tokio::test]
async fn corrective_window_never_drops_below_one_day() {
    let repo = Arc::new(ExpiringRepo::default());
    repo.total_bytes.store(u64::MAX, Ordering::Relaxed);
    let settings = HistorySettings {
        retention_days: 1,
        max_storage_bytes: 1,
        ..Default::default()
    };
    let service = Arc::new(HistoryService::new(repo.clone(), Arc::new(ZeroClock), settings));
    let task = MaintenanceTask::new(service);

    task.run_once().await.unwrap();
    assert_eq!(*repo.cleanup_windows.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn overlapping_run_is_skipped() {
    let repo = Arc::new(ParkedRepo::default());
    let service = Arc::new(HistoryService::new(
        repo.clone(),
        Arc::new(ZeroClock),
        HistorySettings::default(),
    ));
    let task = Arc::new(MaintenanceTask::new(service));

    let slow = tokio::spawn({
        let task = task.clone();
        async move { task.run_once().await }
    });
    // Wait until the first run is parked inside the repository call.
    repo.entered.notified().await;

    let report = task.run_once().await.unwrap();
    assert!(report.skipped);
    assert_eq!(report.deleted, 0);

    repo.release.notify_one();
    let report = slow.await.unwrap().unwrap();
    assert!(!report.skipped);
}

#[tokio::test(start_paused = true)]
async fn spawned_loop_ticks_on_the_hour() {
    let repo = Arc::new(ExpiringRepo::default());
    let service = Arc::new(HistoryService::new(
        repo.clone(),
        Arc::new(ZeroClock),
        HistorySettings::default(),
    ));
    let task = Arc::new(MaintenanceTask::new(service));

    let handle = task.spawn(MAINTENANCE_PERIOD);
    tokio::time::sleep(MAINTENANCE_PERIOD * 2 + Duration::from_secs(1)).await;
    assert_eq!(repo.cleanup_windows.lock().unwrap().len(), 2);
    handle.abort();
}

#[tokio::test]
async fn under_budget_skips_corrective_pass() {
    let repo = Arc::new(ExpiringRepo::default());
    repo.total_bytes.store(10, Ordering::Relaxed);
    let settings = HistorySettings {
        max_storage_bytes: 1024,
        ..Default::default()
    };
    let service = Arc::new(HistoryService::new(repo.clone(), Arc::new(ZeroClock), settings));
    let task = MaintenanceTask::new(service);

    let report = task.run_once().await.unwrap();
    assert!(!report.corrective_pass);
    assert_eq!(repo.cleanup_windows.lock().unwrap().len(), 1);
}
