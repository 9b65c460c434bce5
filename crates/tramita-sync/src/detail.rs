//! Process detail: one base read, then the side-loads in parallel.

use tracing::info;
use tramita_core::{ProcessAggregate, build_process_aggregate};
use tramita_store::{CaseStore, StoreError};

/// Fetch everything known about a tenant's process and build its aggregate.
///
/// The base row and trigger blob are read first (a missing base row is
/// [`StoreError::NotFound`]). Movements, attachments and both participant
/// sources are then fetched concurrently.
pub async fn load_process_detail<S>(
    store: &S,
    tenant_id: &str,
    number: &str,
) -> Result<ProcessAggregate, StoreError>
where
    S: CaseStore + ?Sized,
{
    let (base_row, trigger_blob) = tokio::try_join!(
        store.process_row(tenant_id, number),
        store.trigger_blob(number)
    )?;

    let (movements, attachments, (crawler, opportunity)) = tokio::try_join!(
        store.movements(number),
        store.attachments(number),
        async {
            tokio::try_join!(
                store.crawler_participants(number),
                store.opportunity_participants(tenant_id, number)
            )
        }
    )?;

    let aggregate = build_process_aggregate(
        &base_row,
        trigger_blob.as_ref(),
        &movements,
        &attachments,
        &crawler,
        &opportunity,
    );
    info!(
        tenant_id,
        number,
        movements = aggregate.movements.len(),
        participants = aggregate.participants.len(),
        "loaded process detail"
    );
    Ok(aggregate)
}
