use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use log::warn;

use ch_core::item::Payload;
use ch_core::ports::HistoryRepositoryPort;
use ch_core::{Item, ItemId};

use super::executor::{DbExecutor, DieselSqliteExecutor};
use super::models::{HistoryItemRow, ImageBlobRow};
use super::schema::{t_history_item, t_image_blob};
use crate::db::pool::DbPool;

/// How many of the newest image rows arrive pre-materialized from
/// `load_all`. The rest stay unloaded until a consumer asks for them.
pub const MATERIALIZE_ON_LOAD: usize = 15;

pub struct DieselHistoryRepository<E = DieselSqliteExecutor> {
    executor: E,
}

impl DieselHistoryRepository<DieselSqliteExecutor> {
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            executor: DieselSqliteExecutor::new(pool),
        }
    }
}

impl<E> DieselHistoryRepository<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<E> HistoryRepositoryPort for DieselHistoryRepository<E>
where
    E: DbExecutor,
{
    async fn save(&self, item: &Item, save_image_bytes: bool) -> Result<()> {
        let row = HistoryItemRow::from_item(item)?;
        let blob = if save_image_bytes {
            match &item.payload {
                Payload::Image(image) => match &image.state {
                    ch_core::ImageState::Loaded(bytes) => Some(ImageBlobRow {
                        item_id: item.id.to_string(),
                        bytes: bytes.clone(),
                    }),
                    _ => None,
                },
                _ => None,
            }
        } else {
            None
        };

        self.executor.run(|conn| {
            conn.transaction(|conn| {
                diesel::replace_into(t_history_item::table)
                    .values(&row)
                    .execute(conn)?;
                if let Some(blob) = &blob {
                    diesel::replace_into(t_image_blob::table)
                        .values(blob)
                        .execute(conn)?;
                }
                Ok(())
            })
        })
    }

    async fn load_all(&self, limit: usize) -> Result<Vec<Item>> {
        self.executor.run(|conn| {
            let rows = t_history_item::table
                .order(t_history_item::created_at_ms.desc())
                .limit(limit as i64)
                .load::<HistoryItemRow>(conn)?;

            let mut items = Vec::with_capacity(rows.len());
            let mut materialized = 0usize;
            for row in rows {
                let bytes = if row.kind == super::models::KIND_IMAGE
                    && materialized < MATERIALIZE_ON_LOAD
                {
                    let found = t_image_blob::table
                        .filter(t_image_blob::item_id.eq(&row.id))
                        .select(t_image_blob::bytes)
                        .first::<Vec<u8>>(conn)
                        .optional()?;
                    if found.is_some() {
                        materialized += 1;
                    }
                    found
                } else {
                    None
                };

                // A corrupt row should not take the whole history down.
                match row.into_item(bytes) {
                    Ok(item) => items.push(item),
                    Err(e) => warn!("Skipping unreadable history row: {e}"),
                }
            }
            Ok(items)
        })
    }

    async fn load_image_bytes(&self, id: &ItemId) -> Result<Option<Vec<u8>>> {
        let id = id.to_string();
        self.executor.run(|conn| {
            let bytes = t_image_blob::table
                .filter(t_image_blob::item_id.eq(&id))
                .select(t_image_blob::bytes)
                .first::<Vec<u8>>(conn)
                .optional()?;
            Ok(bytes)
        })
    }

    async fn delete_by_ids(&self, ids: &[ItemId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.executor.run(|conn| {
            conn.transaction(|conn| {
                diesel::delete(t_image_blob::table.filter(t_image_blob::item_id.eq_any(&ids)))
                    .execute(conn)?;
                diesel::delete(t_history_item::table.filter(t_history_item::id.eq_any(&ids)))
                    .execute(conn)?;
                Ok(())
            })
        })
    }

    async fn delete_older_than(&self, days: u32, exclude_favorites: bool) -> Result<Vec<ItemId>> {
        let cutoff_ms = chrono::Utc::now().timestamp_millis() - i64::from(days) * 86_400_000;
        self.executor.run(|conn| {
            let ids: Vec<String> = if exclude_favorites {
                t_history_item::table
                    .filter(t_history_item::created_at_ms.lt(cutoff_ms))
                    .filter(t_history_item::favorite.eq(false))
                    .select(t_history_item::id)
                    .load(conn)?
            } else {
                t_history_item::table
                    .filter(t_history_item::created_at_ms.lt(cutoff_ms))
                    .select(t_history_item::id)
                    .load(conn)?
            };
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::delete(t_image_blob::table.filter(t_image_blob::item_id.eq_any(&ids)))
                    .execute(conn)?;
                diesel::delete(t_history_item::table.filter(t_history_item::id.eq_any(&ids)))
                    .execute(conn)?;
                Ok(())
            })?;

            Ok(ids.into_iter().map(ItemId::from_string).collect())
        })
    }

    async fn total_byte_size(&self) -> Result<u64> {
        use diesel::sql_types::{BigInt, Nullable};
        self.executor.run(|conn| {
            // SUM(BigInt) is typed Numeric by default, which the SQLite
            // backend cannot hand back as i64.
            let total: Option<i64> = t_history_item::table
                .select(diesel::dsl::sql::<Nullable<BigInt>>("SUM(byte_size)"))
                .first(conn)?;
            Ok(total.unwrap_or(0).max(0) as u64)
        })
    }

    async fn clear_all(&self) -> Result<()> {
        self.executor.run(|conn| {
            conn.transaction(|conn| {
                diesel::delete(t_image_blob::table).execute(conn)?;
                diesel::delete(t_history_item::table).execute(conn)?;
                Ok(())
            })
        })
    }
}
