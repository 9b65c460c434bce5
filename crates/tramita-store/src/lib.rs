//! Storage seam: the queries the engine's host issues, behind one async trait.

mod data_dir;
mod error;
mod memory;

pub use data_dir::load_data_dir;
pub use error::StoreError;
pub use memory::{MemoryStore, Tables};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tramita_core::{RawRecord, SyncUsage};

/// Column names accepted for the tenant key.
pub const TENANT_KEYS: &[&str] = &["empresa_id", "tenant_id"];
/// Column names accepted for the process number key.
pub const NUMBER_KEYS: &[&str] = &["numero_processo", "numero"];

/// Queries over the case tables.
///
/// Rows come back untyped; mapping to canonical types is the engine's job.
#[async_trait::async_trait]
pub trait CaseStore: Send + Sync {
    /// The joined base row for a tenant's process.
    async fn process_row(&self, tenant_id: &str, number: &str) -> Result<RawRecord, StoreError>;

    /// The trigger-data blob for a process number, if any was harvested.
    async fn trigger_blob(&self, number: &str) -> Result<Option<Value>, StoreError>;

    async fn movements(&self, number: &str) -> Result<Vec<RawRecord>, StoreError>;

    async fn attachments(&self, number: &str) -> Result<Vec<RawRecord>, StoreError>;

    /// Parties as maintained by the legal-data crawler.
    async fn crawler_participants(&self, number: &str) -> Result<Vec<RawRecord>, StoreError>;

    /// Parties from the tenant's CRM involved-party records.
    async fn opportunity_participants(
        &self,
        tenant_id: &str,
        number: &str,
    ) -> Result<Vec<RawRecord>, StoreError>;

    /// The tenant's plan limits row.
    async fn plan_limits(&self, tenant_id: &str) -> Result<RawRecord, StoreError>;

    /// Sync requests and external queries recorded at or after `since`.
    async fn sync_usage(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
    ) -> Result<SyncUsage, StoreError>;

    /// Record one synchronization request against the tenant's usage.
    async fn record_sync_request(
        &self,
        tenant_id: &str,
        number: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
