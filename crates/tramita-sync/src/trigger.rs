//! Gated synchronization: quota check, refresh call, usage record.
//!
//! The check and the record are separate store operations, so two concurrent
//! triggers for the same tenant can both pass with one slot left.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;
use tramita_store::{CaseStore, StoreError};

use crate::gate::{GateError, SyncPermit, authorize_sync};
use crate::http::{CaseApiClient, ClientError, RefreshTicket};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("refresh queued but usage not recorded: {0}")]
    Record(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub permit: SyncPermit,
    pub ticket: RefreshTicket,
}

/// Authorize, call the case API, then record the request against the quota.
pub async fn trigger_sync<S>(
    store: &S,
    client: &CaseApiClient,
    tenant_id: &str,
    number: &str,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, TriggerError>
where
    S: CaseStore + ?Sized,
{
    let permit = authorize_sync(store, tenant_id, now).await?;
    let ticket = client.request_refresh(number).await?;
    store.record_sync_request(tenant_id, number, now).await?;
    info!(
        tenant_id,
        number,
        request_id = %ticket.request_id,
        remaining = ?permit.remaining_after,
        "sync triggered"
    );
    Ok(SyncOutcome { permit, ticket })
}
