//! In-memory case tables.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tramita_core::normalize::format_instant;
use tramita_core::row::{first_string, first_timestamp, first_value};
use tramita_core::{RawRecord, SyncUsage};

use crate::{CaseStore, NUMBER_KEYS, StoreError, TENANT_KEYS};

const BLOB_KEYS: &[&str] = &["dados", "data", "trigger_data"];
const CREATED_KEYS: &[&str] = &["criado_em", "created_at"];

/// All case tables as row vectors, in store order.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub processes: Vec<RawRecord>,
    pub trigger_data: Vec<RawRecord>,
    pub movements: Vec<RawRecord>,
    pub attachments: Vec<RawRecord>,
    pub crawler_participants: Vec<RawRecord>,
    pub opportunity_participants: Vec<RawRecord>,
    pub plan_limits: Vec<RawRecord>,
    pub sync_requests: Vec<RawRecord>,
    pub external_queries: Vec<RawRecord>,
}

/// [`CaseStore`] over in-memory [`Tables`].
///
/// Used by the CLI (after [`load_data_dir`](crate::load_data_dir)) and by tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Copy of the current tables.
    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }
}

#[async_trait::async_trait]
impl CaseStore for MemoryStore {
    async fn process_row(&self, tenant_id: &str, number: &str) -> Result<RawRecord, StoreError> {
        let tables = self.tables.read().await;
        tables
            .processes
            .iter()
            .find(|r| matches(r, TENANT_KEYS, tenant_id) && matches(r, NUMBER_KEYS, number))
            .cloned()
            .ok_or_else(|| StoreError::not_found("process", format!("{tenant_id}/{number}")))
    }

    async fn trigger_blob(&self, number: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .trigger_data
            .iter()
            .find(|r| matches(r, NUMBER_KEYS, number))
            .and_then(|r| first_value(r, BLOB_KEYS))
            .cloned())
    }

    async fn movements(&self, number: &str) -> Result<Vec<RawRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(by_number(&tables.movements, number))
    }

    async fn attachments(&self, number: &str) -> Result<Vec<RawRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(by_number(&tables.attachments, number))
    }

    async fn crawler_participants(&self, number: &str) -> Result<Vec<RawRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(by_number(&tables.crawler_participants, number))
    }

    async fn opportunity_participants(
        &self,
        tenant_id: &str,
        number: &str,
    ) -> Result<Vec<RawRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .opportunity_participants
            .iter()
            .filter(|r| matches(r, TENANT_KEYS, tenant_id) && matches(r, NUMBER_KEYS, number))
            .cloned()
            .collect())
    }

    async fn plan_limits(&self, tenant_id: &str) -> Result<RawRecord, StoreError> {
        let tables = self.tables.read().await;
        tables
            .plan_limits
            .iter()
            .find(|r| matches(r, TENANT_KEYS, tenant_id))
            .cloned()
            .ok_or_else(|| StoreError::not_found("plan", tenant_id))
    }

    async fn sync_usage(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<SyncUsage, StoreError> {
        let tables = self.tables.read().await;
        Ok(SyncUsage {
            sync_requests: count_since(&tables.sync_requests, tenant_id, since),
            external_queries: count_since(&tables.external_queries, tenant_id, since),
        })
    }

    async fn record_sync_request(
        &self,
        tenant_id: &str,
        number: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let row = json!({
            "empresa_id": tenant_id,
            "numero_processo": number,
            "criado_em": format_instant(at),
        });
        let Value::Object(row) = row else {
            return Err(StoreError::Other("sync request row is not an object".into()));
        };
        self.tables.write().await.sync_requests.push(row);
        Ok(())
    }
}

fn matches(row: &RawRecord, keys: &[&str], wanted: &str) -> bool {
    first_string(row, keys).as_deref() == Some(wanted)
}

fn by_number(rows: &[RawRecord], number: &str) -> Vec<RawRecord> {
    rows.iter()
        .filter(|r| matches(r, NUMBER_KEYS, number))
        .cloned()
        .collect()
}

/// Rows for `tenant_id` created at or after `since`. Undated rows are not counted.
fn count_since(rows: &[RawRecord], tenant_id: &str, since: DateTime<Utc>) -> i64 {
    rows.iter()
        .filter(|r| matches(r, TENANT_KEYS, tenant_id))
        .filter_map(|r| first_timestamp(r, CREATED_KEYS))
        .filter_map(|ts| DateTime::parse_from_rfc3339(&ts).ok())
        .filter(|ts| ts.with_timezone(&Utc) >= since)
        .count() as i64
}
