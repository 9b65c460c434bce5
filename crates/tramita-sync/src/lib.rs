//! Sync layer: loads a process detail from the store, gates external
//! re-synchronization on the tenant's plan quota, and talks to the case API.

pub mod detail;
pub mod gate;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod trigger;

pub use detail::load_process_detail;
pub use gate::{GateError, SyncPermit, authorize_sync, check_sync_availability};

#[cfg(feature = "http")]
pub use http::{CaseApiClient, ClientError, RefreshTicket};
#[cfg(feature = "http")]
pub use trigger::{SyncOutcome, TriggerError, trigger_sync};
