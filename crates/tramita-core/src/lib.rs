//! Process reconciliation engine: folds crawler, CRM and case-API records into
//! one canonical process aggregate, and gates external re-synchronization.
//!
//! Everything in this crate is a synchronous, side-effect-free transformation
//! over already-fetched rows.

pub mod aggregate;
pub mod associate;
pub mod indicators;
pub mod movements;
pub mod normalize;
pub mod participants;
pub mod quota;
pub mod row;

pub use aggregate::{ProcessAggregate, ProcessInputs, build_process_aggregate, build_with};
pub use associate::{AssociationReport, Associator, MatchTier};
pub use indicators::{Amount, Flag, Indicators, Shaped, extract_indicators};
pub use movements::{Attachment, Movement};
pub use participants::{Participant, ParticipantSource, Representative, Side};
pub use quota::{
    DenialReason, PlanLimits, QuotaError, SyncQuota, SyncUsage, billing_period_start,
    evaluate_sync_availability,
};
pub use row::RawRecord;
