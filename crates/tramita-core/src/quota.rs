//! Plan limits and the synchronization quota decision.
//!
//! Decision table for synchronization:
//!
//! | `sync_enabled` | `sync_quota` | result |
//! |---|---|---|
//! | not `true` | any | denied, `disabled` |
//! | `true` | `null` | allowed, unlimited |
//! | `true` | `n` | allowed while `usage < n`, else `quota_exceeded` |
//!
//! Usage is counted from midnight UTC on the first day of the current month
//! ([`billing_period_start`]). Evaluation is read-then-decide: two concurrent
//! requests can both see one remaining slot. Closing that gap needs an atomic
//! reserve at the point usage is recorded.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::normalize::{normalize_string, parse_boolean_flag, parse_optional_integer};
use crate::row::{RawRecord, first_present};

const SYNC_ENABLED: &[&str] = &["sync_enabled", "sincronizacao_habilitada", "syncEnabled"];
const SYNC_QUOTA: &[&str] = &["sync_quota", "cota_sincronizacao", "syncQuota"];
const RESOURCE_PREFIX: &str = "max_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("plan limit {field} is not an integer: {value}")]
    InvalidLimit { field: String, value: String },
}

/// Why a synchronization was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    Disabled,
    QuotaExceeded,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::QuotaExceeded => "quota_exceeded",
        }
    }
}

/// Outcome of one availability check. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuota {
    pub allowed: bool,
    pub remaining_quota: Option<i64>,
    pub reason: Option<DenialReason>,
}

/// A tenant's plan limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    pub sync_enabled: Option<bool>,
    /// `None` means unlimited.
    pub sync_quota: Option<i64>,
    /// Other plan-governed resources keyed by name (`users`, `processes`, ...).
    /// `None` means unlimited.
    pub resources: BTreeMap<String, Option<i64>>,
    /// Resources whose `max_` column is present but not an integer.
    #[serde(default)]
    pub misconfigured_resources: BTreeSet<String>,
}

impl PlanLimits {
    /// Read limits from a plan row.
    ///
    /// Every `max_<resource>` column becomes a resource limit. A non-integer
    /// `sync_quota` is an error. A non-integer resource limit only marks that
    /// resource as misconfigured. An unrecognized `sync_enabled` token reads
    /// as not enabled.
    pub fn from_row(row: &RawRecord) -> Result<Self, QuotaError> {
        let sync_enabled = first_present(row, SYNC_ENABLED).and_then(parse_boolean_flag);
        let sync_quota = match SYNC_QUOTA.iter().find(|k| row.contains_key(**k)) {
            Some(key) => limit(key, &row[*key])?,
            None => None,
        };

        let mut resources = BTreeMap::new();
        let mut misconfigured_resources = BTreeSet::new();
        for (column, value) in row {
            let Some(resource) = column.strip_prefix(RESOURCE_PREFIX) else {
                continue;
            };
            match limit(column, value) {
                Ok(max) => {
                    resources.insert(resource.to_string(), max);
                }
                Err(e) => {
                    warn!(resource, error = %e, "ignoring misconfigured resource limit");
                    misconfigured_resources.insert(resource.to_string());
                }
            }
        }

        Ok(Self {
            sync_enabled,
            sync_quota,
            resources,
            misconfigured_resources,
        })
    }

    /// Whether one more unit of `resource` fits, given `used` so far.
    ///
    /// Resources the plan does not mention are unlimited. A misconfigured
    /// resource is never allowed.
    pub fn check_resource(&self, resource: &str, used: i64) -> ResourceCheck {
        if self.misconfigured_resources.contains(resource) {
            return ResourceCheck {
                allowed: false,
                remaining: None,
            };
        }
        match self.resources.get(resource).copied().flatten() {
            None => ResourceCheck {
                allowed: true,
                remaining: None,
            },
            Some(max) => {
                let remaining = remaining(max, used);
                ResourceCheck {
                    allowed: remaining > 0,
                    remaining: Some(remaining),
                }
            }
        }
    }
}

/// Result of a generic resource limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCheck {
    pub allowed: bool,
    pub remaining: Option<i64>,
}

/// Usage counters for the current billing period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUsage {
    /// Explicit synchronization requests.
    pub sync_requests: i64,
    /// Ad-hoc queries against the external case API.
    pub external_queries: i64,
}

impl SyncUsage {
    pub fn total(&self) -> i64 {
        self.sync_requests
            .max(0)
            .saturating_add(self.external_queries.max(0))
    }
}

/// Decide whether another synchronization is allowed this period.
pub fn evaluate_sync_availability(limits: &PlanLimits, current_usage: i64) -> SyncQuota {
    if limits.sync_enabled != Some(true) {
        return SyncQuota {
            allowed: false,
            remaining_quota: None,
            reason: Some(DenialReason::Disabled),
        };
    }
    let Some(quota) = limits.sync_quota else {
        return SyncQuota {
            allowed: true,
            remaining_quota: None,
            reason: None,
        };
    };
    let remaining = remaining(quota, current_usage);
    if remaining <= 0 {
        SyncQuota {
            allowed: false,
            remaining_quota: Some(0),
            reason: Some(DenialReason::QuotaExceeded),
        }
    } else {
        SyncQuota {
            allowed: true,
            remaining_quota: Some(remaining),
            reason: None,
        }
    }
}

/// Midnight UTC on the first day of `now`'s month.
pub fn billing_period_start(now: DateTime<Utc>) -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// `max(0, max - used)`.
fn remaining(max: i64, used: i64) -> i64 {
    max.saturating_sub(used).max(0)
}

fn limit(field: &str, value: &Value) -> Result<Option<i64>, QuotaError> {
    if value.is_null() {
        return Ok(None);
    }
    match parse_optional_integer(value) {
        Some(n) => Ok(Some(n)),
        None => Err(QuotaError::InvalidLimit {
            field: field.to_string(),
            value: normalize_string(value).unwrap_or_else(|| value.to_string()),
        }),
    }
}
