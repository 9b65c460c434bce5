//! Docket entries (movements) and the documents attached to them.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::normalize::{parse_boolean_flag, parse_json_value};
use crate::row::{RawRecord, first_string, first_timestamp, first_value};

/// One docket entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub id: String,
    pub timestamp: Option<String>,
    pub kind: Option<String>,
    pub publication_kind: Option<String>,
    pub content: Option<String>,
    pub predicted_classification: Option<Value>,
    pub source: Option<Value>,
    pub confidential: Option<bool>,
    pub crawl_id: Option<String>,
    pub registered_at: Option<String>,
    /// Attachments associated with this entry by the associator.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Movement {
    /// Build from a movement row. Rows without an id yield `None`.
    pub fn from_row(row: &RawRecord) -> Option<Self> {
        let id = first_string(row, &["id", "movimentacao_id"])?;
        Some(Self {
            id,
            timestamp: first_timestamp(row, &["data_movimentacao", "data", "timestamp", "data_hora"]),
            kind: first_string(row, &["tipo", "tipo_movimentacao"]),
            publication_kind: first_string(row, &["tipo_publicacao", "publication_kind"]),
            content: first_string(row, &["conteudo", "descricao", "texto"]),
            predicted_classification: first_value(
                row,
                &["classificacao_predita", "predicted_classification"],
            )
            .and_then(parse_json_value),
            source: first_value(row, &["fonte", "source"]).and_then(parse_json_value),
            confidential: first_value(row, &["sigiloso", "confidencial"])
                .and_then(parse_boolean_flag),
            crawl_id: first_string(row, &["crawl_id"]),
            registered_at: first_timestamp(row, &["criado_em", "created_at"]),
            attachments: Vec::new(),
        })
    }

    /// `YYYY-MM-DD` day of the entry's timestamp.
    pub fn day(&self) -> Option<&str> {
        self.timestamp.as_deref().and_then(day_of)
    }
}

/// A document filed alongside a movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Option<String>,
    pub movement_id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub registered_at: Option<String>,
    pub movement_timestamp: Option<String>,
    pub venue_instance: Option<String>,
    pub crawl_id: Option<String>,
}

impl Attachment {
    pub fn from_row(row: &RawRecord) -> Self {
        Self {
            id: first_string(row, &["id", "anexo_id"]),
            movement_id: first_string(row, &["movimentacao_id", "movement_id", "id_movimentacao"]),
            name: first_string(row, &["nome", "nome_arquivo", "titulo"]),
            kind: first_string(row, &["tipo", "tipo_anexo"]),
            registered_at: first_timestamp(row, &["criado_em", "created_at", "data_cadastro"]),
            movement_timestamp: first_timestamp(row, &["data_movimentacao", "movement_timestamp"]),
            venue_instance: first_string(row, &["instancia", "grau"]),
            crawl_id: first_string(row, &["crawl_id"]),
        }
    }

    /// Timestamp used for matching: the movement timestamp, else registration.
    pub fn reference_timestamp(&self) -> Option<&str> {
        self.movement_timestamp
            .as_deref()
            .or(self.registered_at.as_deref())
    }

    /// `YYYY-MM-DD` day of [`reference_timestamp`](Self::reference_timestamp).
    pub fn day(&self) -> Option<&str> {
        self.reference_timestamp().and_then(day_of)
    }
}

/// Map movement rows, dropping id-less rows and repeated ids (first row kept).
pub fn movements_from_rows(rows: &[RawRecord]) -> Vec<Movement> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(movement) = Movement::from_row(row) else {
            warn!("movement row without id dropped");
            continue;
        };
        if !seen.insert(movement.id.clone()) {
            warn!(id = %movement.id, "duplicate movement id dropped");
            continue;
        }
        out.push(movement);
    }
    out
}

pub fn attachments_from_rows(rows: &[RawRecord]) -> Vec<Attachment> {
    rows.iter().map(Attachment::from_row).collect()
}

/// Leading `YYYY-MM-DD` of a timestamp, when it is a real calendar date.
fn day_of(ts: &str) -> Option<&str> {
    let day = ts.get(..10)?;
    chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    Some(day)
}
