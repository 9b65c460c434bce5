//! Quota gate run before any call to the external case API.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use tramita_core::{
    DenialReason, PlanLimits, QuotaError, SyncQuota, billing_period_start,
    evaluate_sync_availability,
};
use tramita_store::{CaseStore, StoreError};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no plan configured for tenant {0}")]
    PlanNotFound(String),

    #[error("plan misconfigured: {0}")]
    PlanMisconfigured(#[from] QuotaError),

    #[error("synchronization not allowed: {}", .0.as_str())]
    Denied(DenialReason),

    #[error("store error: {0}")]
    Store(StoreError),
}

/// Proof that a synchronization passed the quota check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPermit {
    pub tenant_id: String,
    /// Slots left after this one is used; `None` when unlimited.
    pub remaining_after: Option<i64>,
    pub issued_at: DateTime<Utc>,
}

/// Evaluate the tenant's sync availability for the billing period containing `now`.
pub async fn check_sync_availability<S>(
    store: &S,
    tenant_id: &str,
    now: DateTime<Utc>,
) -> Result<SyncQuota, GateError>
where
    S: CaseStore + ?Sized,
{
    let row = store.plan_limits(tenant_id).await.map_err(|e| match e {
        StoreError::NotFound { .. } => GateError::PlanNotFound(tenant_id.to_string()),
        other => GateError::Store(other),
    })?;
    let limits = PlanLimits::from_row(&row).inspect_err(|e| {
        warn!(tenant_id, error = %e, "plan limits misconfigured");
    })?;

    let since = billing_period_start(now);
    let usage = store
        .sync_usage(tenant_id, since)
        .await
        .map_err(GateError::Store)?;

    let quota = evaluate_sync_availability(&limits, usage.total());
    info!(
        tenant_id,
        allowed = quota.allowed,
        used = usage.total(),
        remaining = ?quota.remaining_quota,
        reason = quota.reason.map(|r| r.as_str()),
        "evaluated sync availability"
    );
    Ok(quota)
}

/// Like [`check_sync_availability`], but a denial is an error.
pub async fn authorize_sync<S>(
    store: &S,
    tenant_id: &str,
    now: DateTime<Utc>,
) -> Result<SyncPermit, GateError>
where
    S: CaseStore + ?Sized,
{
    let quota = check_sync_availability(store, tenant_id, now).await?;
    if !quota.allowed {
        return Err(GateError::Denied(
            quota.reason.unwrap_or(DenialReason::QuotaExceeded),
        ));
    }
    Ok(SyncPermit {
        tenant_id: tenant_id.to_string(),
        remaining_after: quota.remaining_quota.map(|r| r - 1),
        issued_at: now,
    })
}
