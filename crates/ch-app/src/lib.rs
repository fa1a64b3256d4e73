//! # ch-app
//!
//! Application services for cliphoard: the single-actor [`HistoryService`]
//! that owns the in-memory history, and the periodic [`MaintenanceTask`]
//! that enforces age and storage-budget retention.

pub mod maintenance;
pub mod service;

pub use maintenance::{MaintenanceReport, MaintenanceTask};
pub use service::{HistoryService, ListFilter};
