//! The canonical process aggregate, projected from a base row and side-loads.
//!
//! The aggregate is never stored. Every read recomputes it: the base row is
//! mapped, indicators are re-extracted from the trigger blob, attachments are
//! associated with movements, and both participant sources are merged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::associate::{AssociationReport, Associator};
use crate::indicators::{Indicators, extract_indicators};
use crate::movements::{Attachment, Movement, attachments_from_rows, movements_from_rows};
use crate::normalize::{normalize_string, parse_integer};
use crate::participants::{Participant, merge_participants};
use crate::row::{RawRecord, first_string, first_timestamp, first_value};

/// One legal process, with everything known about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAggregate {
    pub id: Option<String>,
    pub number: Option<String>,
    pub tenant_id: Option<String>,
    pub company_name: Option<String>,
    pub client_name: Option<String>,
    pub tribunal: Option<String>,
    pub jurisdiction: Option<String>,
    pub court: Option<String>,
    pub class: Option<String>,
    pub subject: Option<String>,
    pub area: Option<String>,
    pub status: Option<String>,
    pub instance: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub last_synced_at: Option<String>,
    pub indicators: Indicators,
    pub movements: Vec<Movement>,
    pub attachments: Vec<Attachment>,
    pub participants: Vec<Participant>,
    pub movement_count: i64,
    pub api_query_count: i64,
}

impl ProcessAggregate {
    /// Attachments that no movement claimed.
    pub fn unassociated_attachments(&self) -> usize {
        let nested: usize = self.movements.iter().map(|m| m.attachments.len()).sum();
        self.attachments.len().saturating_sub(nested)
    }
}

/// Raw inputs for one aggregate, as fetched by the host.
#[derive(Debug, Clone, Copy)]
pub struct ProcessInputs<'a> {
    pub base_row: &'a RawRecord,
    pub trigger_blob: Option<&'a Value>,
    pub movements: &'a [RawRecord],
    pub attachments: &'a [RawRecord],
    pub crawler_participants: &'a [RawRecord],
    pub opportunity_participants: &'a [RawRecord],
}

/// Build the aggregate with the standard association tiers.
pub fn build_process_aggregate(
    base_row: &RawRecord,
    trigger_blob: Option<&Value>,
    movements: &[RawRecord],
    attachments: &[RawRecord],
    crawler_participants: &[RawRecord],
    opportunity_participants: &[RawRecord],
) -> ProcessAggregate {
    let inputs = ProcessInputs {
        base_row,
        trigger_blob,
        movements,
        attachments,
        crawler_participants,
        opportunity_participants,
    };
    build_with(&Associator::standard(), inputs).0
}

/// Build the aggregate with a caller-chosen associator.
pub fn build_with(
    associator: &Associator,
    inputs: ProcessInputs<'_>,
) -> (ProcessAggregate, AssociationReport) {
    let row = inputs.base_row;
    let indicators = extract_indicators(inputs.trigger_blob);

    let mut movements = movements_from_rows(inputs.movements);
    let attachments = attachments_from_rows(inputs.attachments);
    let report = associator.associate(&mut movements, &attachments);

    let participants = merge_participants(
        inputs.crawler_participants,
        inputs.opportunity_participants,
    );

    let movement_count = if movements.is_empty() {
        first_value(row, &["total_movimentacoes", "movement_count"])
            .map(parse_integer)
            .unwrap_or(0)
    } else {
        movements.len() as i64
    };
    let api_query_count = first_value(row, &["consultas_api", "api_query_count"])
        .map(parse_integer)
        .unwrap_or(0);

    let aggregate = ProcessAggregate {
        id: first_string(row, &["id", "processo_id"]),
        number: first_string(row, &["numero_processo", "numero"]),
        tenant_id: first_string(row, &["empresa_id", "tenant_id"]),
        company_name: first_string(row, &["empresa_nome", "company_name"]),
        client_name: first_string(row, &["cliente_nome", "client_name"]),
        tribunal: first_string(row, &["tribunal"]).or_else(|| indicators.tribunal_name.clone()),
        jurisdiction: first_string(row, &["jurisdicao"]).or_else(|| indicators.justice.clone()),
        court: first_string(row, &["orgao_julgador", "vara"]),
        class: first_string(row, &["classe"])
            .or_else(|| first_text(indicators.classifications.as_deref())),
        subject: first_string(row, &["assunto"])
            .or_else(|| first_text(indicators.subjects.as_deref())),
        area: first_string(row, &["area"]),
        status: first_string(row, &["status", "situacao"]),
        instance: first_string(row, &["grau", "instancia"]),
        created_at: first_timestamp(row, &["criado_em", "created_at"]),
        updated_at: first_timestamp(row, &["atualizado_em", "updated_at"]),
        last_synced_at: first_timestamp(row, &["ultima_sincronizacao", "last_synced_at"]),
        indicators,
        movements,
        attachments,
        participants,
        movement_count,
        api_query_count,
    };

    debug!(
        number = aggregate.number.as_deref().unwrap_or("-"),
        movements = aggregate.movements.len(),
        attachments = aggregate.attachments.len(),
        participants = aggregate.participants.len(),
        "built process aggregate"
    );
    (aggregate, report)
}

/// Text of the first list element: a string, or an object's name/description.
fn first_text(items: Option<&[Value]>) -> Option<String> {
    let first = items?.first()?;
    match first {
        Value::Object(obj) => first_string(obj, &["nome", "name", "descricao", "description"]),
        other => normalize_string(other),
    }
}
