//! Participant (party) records from the crawler and the CRM, merged by document.
//!
//! Two sources describe the same parties with different structure:
//!
//! - the crawler table carries a free-text `polo` that must be classified
//! - the CRM "envolvidos" table carries an explicit `side`, `relacao` and
//!   `party_role`
//!
//! [`ParticipantMerger`] folds both into one list. Candidates are indexed by
//! [`document_key`]; a candidate with a known key is merged field-by-field
//! into the existing entry (first non-null wins, lawyer and representative
//! lists are unioned). Candidates without a key are kept as separate entries.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::normalize::{fold_text, normalize_string};
use crate::row::{RawRecord, first_string, first_timestamp, first_value};

/// Minimum length of a text document key; shorter strings never join.
pub const MIN_TEXT_KEY_LEN: usize = 5;

const ATIVO_TOKENS: &[&str] = &[
    "ativo",
    "polo ativo",
    "autor",
    "autora",
    "reclamante",
    "exequente",
    "agravante",
    "apelante",
    "impetrante",
    "embargante",
    "requerente",
    "demandante",
];

const PASSIVO_TOKENS: &[&str] = &[
    "passivo",
    "polo passivo",
    "reu",
    "re",
    "reclamado",
    "reclamada",
    "executado",
    "executada",
    "agravado",
    "agravada",
    "apelado",
    "apelada",
    "impetrado",
    "impetrada",
    "embargado",
    "embargada",
    "requerido",
    "requerida",
    "demandado",
    "demandada",
];

/// Side of the process a party stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Ativo,
    Passivo,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ativo => "ativo",
            Self::Passivo => "passivo",
        }
    }
}

/// Which upstream table a participant record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantSource {
    Crawler,
    Opportunity,
}

/// A lawyer or legal representative attached to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub name: Option<String>,
    pub document: Option<String>,
}

impl Representative {
    fn union_key(&self) -> (String, String) {
        let name = self.name.as_deref().map(fold_text).unwrap_or_default();
        let document = self
            .document
            .as_deref()
            .and_then(document_key)
            .unwrap_or_default();
        (name, document)
    }
}

/// A party to the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub name: Option<String>,
    pub document: Option<String>,
    pub document_key: Option<String>,
    pub document_type: Option<String>,
    pub side: Option<Side>,
    /// Raw type label as the source wrote it.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub person_type: Option<String>,
    pub role: Option<String>,
    pub party_role: Option<String>,
    pub lawyers: Vec<Representative>,
    pub representatives: Vec<Representative>,
    pub registered_at: Option<String>,
    pub source: ParticipantSource,
}

impl Participant {
    /// Build from a crawler row (`polo`, `tipo_pessoa`, `documento_principal`, ...).
    ///
    /// Returns `None` when the row names neither a party nor a document.
    pub fn from_crawler_row(row: &RawRecord) -> Option<Self> {
        let document = first_string(row, &["documento_principal", "documento"]);
        let kind = first_string(row, &["tipo", "tipo_parte"]);
        let side = first_string(row, &["polo"])
            .as_deref()
            .and_then(normalize_participant_side)
            .or_else(|| kind.as_deref().and_then(normalize_participant_side));

        Self::checked(Self {
            name: first_string(row, &["nome", "nome_parte"]),
            document_key: document.as_deref().and_then(document_key),
            document,
            document_type: first_string(row, &["tipo_documento_principal", "tipo_documento"]),
            side,
            kind,
            person_type: first_string(row, &["tipo_pessoa"]),
            role: None,
            party_role: None,
            lawyers: representatives(row, &["advogados"]),
            representatives: representatives(row, &["representantes"]),
            registered_at: first_timestamp(row, &["criado_em", "data_cadastro"]),
            source: ParticipantSource::Crawler,
        })
    }

    /// Build from a CRM involved-party row (`relacao`, `party_role`, `side`, ...).
    ///
    /// Returns `None` when the row names neither a party nor a document.
    pub fn from_opportunity_row(row: &RawRecord) -> Option<Self> {
        let document = first_string(row, &["documento", "cpf_cnpj"]);
        let role = first_string(row, &["relacao"]);

        Self::checked(Self {
            name: first_string(row, &["nome", "name"]),
            document_key: document.as_deref().and_then(document_key),
            document,
            document_type: first_string(row, &["tipo_documento"]),
            side: first_string(row, &["side", "polo"])
                .as_deref()
                .and_then(normalize_participant_side),
            kind: first_string(row, &["tipo"]).or_else(|| role.clone()),
            person_type: first_string(row, &["tipo_pessoa"]),
            role,
            party_role: first_string(row, &["party_role"]),
            lawyers: representatives(row, &["advogados"]),
            representatives: representatives(row, &["representantes"]),
            registered_at: first_timestamp(row, &["created_at", "criado_em"]),
            source: ParticipantSource::Opportunity,
        })
    }

    fn checked(candidate: Self) -> Option<Self> {
        if candidate.name.is_none() && candidate.document.is_none() {
            warn!(source = ?candidate.source, "participant row without name or document dropped");
            return None;
        }
        Some(candidate)
    }

    /// Fill empty fields from `other` and union the representative lists.
    fn absorb(&mut self, other: Participant) {
        fill(&mut self.name, other.name);
        fill(&mut self.document, other.document);
        fill(&mut self.document_key, other.document_key);
        fill(&mut self.document_type, other.document_type);
        fill(&mut self.side, other.side);
        fill(&mut self.kind, other.kind);
        fill(&mut self.person_type, other.person_type);
        fill(&mut self.role, other.role);
        fill(&mut self.party_role, other.party_role);
        fill(&mut self.registered_at, other.registered_at);
        union_into(&mut self.lawyers, other.lawyers);
        union_into(&mut self.representatives, other.representatives);
    }
}

/// Classify a free-text side label.
///
/// Diacritics and case are ignored. Labels outside the curated synonym
/// lists yield `None`; no partial or fuzzy matching is attempted.
pub fn normalize_participant_side(label: &str) -> Option<Side> {
    let token = fold_text(label);
    if ATIVO_TOKENS.contains(&token.as_str()) {
        Some(Side::Ativo)
    } else if PASSIVO_TOKENS.contains(&token.as_str()) {
        Some(Side::Passivo)
    } else {
        None
    }
}

/// Deduplication key for a document number.
///
/// The digits of the document when it has any (`"123.456.789-00"` →
/// `"12345678900"`); otherwise the folded text, but only when it is at
/// least [`MIN_TEXT_KEY_LEN`] characters long.
pub fn document_key(document: &str) -> Option<String> {
    let digits: String = document.chars().filter(char::is_ascii_digit).collect();
    if !digits.is_empty() {
        return Some(digits);
    }
    let folded = fold_text(document);
    if folded.chars().count() >= MIN_TEXT_KEY_LEN {
        Some(folded)
    } else {
        None
    }
}

/// Accumulates participants from both sources, merging by document key.
///
/// Register crawler records before opportunity records: the first record
/// to provide a field keeps it.
#[derive(Debug, Default)]
pub struct ParticipantMerger {
    merged: Vec<Participant>,
    by_key: HashMap<String, usize>,
}

impl ParticipantMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one candidate, merging it into an existing entry with the same key.
    pub fn register(&mut self, candidate: Participant) {
        let Some(key) = candidate.document_key.clone() else {
            self.merged.push(candidate);
            return;
        };
        match self.by_key.get(&key) {
            Some(&idx) => self.merged[idx].absorb(candidate),
            None => {
                self.by_key.insert(key, self.merged.len());
                self.merged.push(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// Merged participants in first-registration order.
    pub fn finish(self) -> Vec<Participant> {
        self.merged
    }
}

/// Build and merge both participant sources, crawler first.
pub fn merge_participants(
    crawler_rows: &[RawRecord],
    opportunity_rows: &[RawRecord],
) -> Vec<Participant> {
    let mut merger = ParticipantMerger::new();
    crawler_rows
        .iter()
        .filter_map(Participant::from_crawler_row)
        .for_each(|p| merger.register(p));
    opportunity_rows
        .iter()
        .filter_map(Participant::from_opportunity_row)
        .for_each(|p| merger.register(p));
    merger.finish()
}

// ── Helpers ──

fn fill<T>(target: &mut Option<T>, candidate: Option<T>) {
    if target.is_none() {
        *target = candidate;
    }
}

fn union_into(target: &mut Vec<Representative>, incoming: Vec<Representative>) {
    let mut seen: HashSet<(String, String)> = target.iter().map(Representative::union_key).collect();
    for rep in incoming {
        if seen.insert(rep.union_key()) {
            target.push(rep);
        }
    }
}

/// Parse a lawyer/representative column: array of objects or names, possibly JSON-encoded.
fn representatives(row: &RawRecord, keys: &[&str]) -> Vec<Representative> {
    let items = match first_value(row, keys) {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    let mut out: Vec<Representative> = Vec::with_capacity(items.len());
    for item in &items {
        let rep = match item {
            Value::Object(obj) => Representative {
                name: first_string(obj, &["nome", "name"]),
                document: first_string(obj, &["documento", "document", "oab", "cpf"]),
            },
            other => Representative {
                name: normalize_string(other),
                document: None,
            },
        };
        if rep.name.is_some() || rep.document.is_some() {
            out.push(rep);
        }
    }
    let mut deduped = Vec::with_capacity(out.len());
    union_into(&mut deduped, out);
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> RawRecord {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn side_synonyms() {
        assert_eq!(normalize_participant_side("Reclamante"), Some(Side::Ativo));
        assert_eq!(normalize_participant_side("POLO ATIVO"), Some(Side::Ativo));
        assert_eq!(normalize_participant_side("Réu"), Some(Side::Passivo));
        assert_eq!(normalize_participant_side(" executada "), Some(Side::Passivo));
        assert_eq!(normalize_participant_side("Polo  Passivo"), Some(Side::Passivo));
    }

    #[test]
    fn unmatched_side_is_none() {
        assert_eq!(normalize_participant_side("Terceiro interessado"), None);
        assert_eq!(normalize_participant_side("autores e réus"), None);
        assert_eq!(normalize_participant_side(""), None);
    }

    #[test]
    fn document_key_digits_and_text_fallback() {
        assert_eq!(document_key("123.456.789-00").as_deref(), Some("12345678900"));
        assert_eq!(document_key("OAB/SP 12345").as_deref(), Some("12345"));
        assert_eq!(document_key("Não Informado").as_deref(), Some("nao informado"));
        assert_eq!(document_key("n/a"), None);
        assert_eq!(document_key("  "), None);
    }

    #[test]
    fn crawler_row_classifies_polo() {
        let p = Participant::from_crawler_row(&row(json!({
            "nome": "Ana Silva",
            "polo": "Ativo",
            "tipo": "RECLAMANTE",
            "tipo_pessoa": "FISICA",
            "documento_principal": "123.456.789-00",
            "advogados": "[{\"nome\": \"Dr. Paulo\", \"oab\": \"SP123456\"}]"
        })))
        .unwrap();
        assert_eq!(p.side, Some(Side::Ativo));
        assert_eq!(p.kind.as_deref(), Some("RECLAMANTE"));
        assert_eq!(p.document_key.as_deref(), Some("12345678900"));
        assert_eq!(p.lawyers.len(), 1);
        assert_eq!(p.lawyers[0].document.as_deref(), Some("SP123456"));
        assert_eq!(p.source, ParticipantSource::Crawler);
    }

    #[test]
    fn crawler_side_falls_back_to_type_label() {
        let p = Participant::from_crawler_row(&row(json!({
            "nome": "Empresa X", "polo": "?", "tipo": "Reclamada"
        })))
        .unwrap();
        assert_eq!(p.side, Some(Side::Passivo));

        let q = Participant::from_crawler_row(&row(json!({
            "nome": "Perito", "tipo": "Perito judicial"
        })))
        .unwrap();
        assert_eq!(q.side, None);
    }

    #[test]
    fn opportunity_row_uses_explicit_side() {
        let p = Participant::from_opportunity_row(&row(json!({
            "nome": "Beta Ltda",
            "cpf_cnpj": "12.345.678/0001-90",
            "side": "passivo",
            "relacao": "Reclamada",
            "party_role": "defendant"
        })))
        .unwrap();
        assert_eq!(p.side, Some(Side::Passivo));
        assert_eq!(p.role.as_deref(), Some("Reclamada"));
        assert_eq!(p.kind.as_deref(), Some("Reclamada"));
        assert_eq!(p.party_role.as_deref(), Some("defendant"));
        assert_eq!(p.document_key.as_deref(), Some("12345678000190"));
    }

    #[test]
    fn empty_rows_dropped() {
        assert!(Participant::from_crawler_row(&row(json!({"polo": "ativo"}))).is_none());
        assert!(Participant::from_opportunity_row(&row(json!({}))).is_none());
    }

    #[test]
    fn merges_by_document_key_first_non_null_wins() {
        let crawler = vec![row(json!({
            "nome": "Ana Silva", "documento_principal": "123.456.789-00", "polo": null
        }))];
        let opportunity = vec![row(json!({
            "nome": null, "documento": "12345678900", "side": "ativo"
        }))];
        let merged = merge_participants(&crawler, &opportunity);
        assert_eq!(merged.len(), 1);
        let p = &merged[0];
        assert_eq!(p.name.as_deref(), Some("Ana Silva"));
        assert_eq!(p.document_key.as_deref(), Some("12345678900"));
        assert_eq!(p.document.as_deref(), Some("123.456.789-00"));
        assert_eq!(p.side, Some(Side::Ativo));
        assert_eq!(p.source, ParticipantSource::Crawler);
    }

    #[test]
    fn crawler_wins_ties() {
        let crawler = vec![row(json!({"nome": "ANA SILVA", "documento": "111.222.333-44"}))];
        let opportunity = vec![row(json!({"nome": "Ana da Silva", "documento": "11122233344"}))];
        let merged = merge_participants(&crawler, &opportunity);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name.as_deref(), Some("ANA SILVA"));
    }

    #[test]
    fn lawyers_unioned_by_name_and_document() {
        let crawler = vec![row(json!({
            "nome": "Ana", "documento": "11122233344",
            "advogados": [{"nome": "Dr. Paulo", "oab": "SP 123"}]
        }))];
        let opportunity = vec![row(json!({
            "nome": "Ana", "documento": "11122233344",
            "advogados": [
                {"name": "dr. paulo", "document": "SP123"},
                {"name": "Dra. Carla", "document": "SP999"}
            ]
        }))];
        let merged = merge_participants(&crawler, &opportunity);
        let names: Vec<_> = merged[0]
            .lawyers
            .iter()
            .filter_map(|l| l.name.as_deref())
            .collect();
        assert_eq!(names, vec!["Dr. Paulo", "Dra. Carla"]);
    }

    #[test]
    fn no_document_no_merge() {
        let crawler = vec![row(json!({"nome": "João"}))];
        let opportunity = vec![row(json!({"nome": "João"}))];
        let merged = merge_participants(&crawler, &opportunity);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn short_text_documents_never_join() {
        let crawler = vec![row(json!({"nome": "A", "documento": "n/a"}))];
        let opportunity = vec![row(json!({"nome": "B", "documento": "N/A"}))];
        assert_eq!(merge_participants(&crawler, &opportunity).len(), 2);
    }

    #[test]
    fn serializes_camel_case_with_type_label() {
        let p = Participant::from_crawler_row(&row(json!({
            "nome": "Ana", "tipo": "Autor", "documento": "1"
        })))
        .unwrap();
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["documentKey"], json!("1"));
        assert_eq!(v["type"], json!("Autor"));
        assert_eq!(v["side"], json!("ativo"));
        assert_eq!(v["source"], json!("crawler"));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn field() -> impl Strategy<Value = Option<String>> {
            proptest::option::of("[A-Za-z]{1,8}")
        }

        proptest! {
            #[test]
            fn shared_key_merges_to_one_and_keeps_fields(
                digits in "[0-9]{11}",
                crawler_name in field(),
                opp_name in field(),
                person_type in field(),
                party_role in field(),
            ) {
                let formatted = format!("{}.{}.{}-{}", &digits[0..3], &digits[3..6], &digits[6..9], &digits[9..11]);
                let crawler = vec![row(json!({
                    "nome": crawler_name, "documento_principal": formatted, "tipo_pessoa": person_type
                }))];
                let opportunity = vec![row(json!({
                    "nome": opp_name, "documento": digits.clone(), "party_role": party_role
                }))];
                let merged = merge_participants(&crawler, &opportunity);
                let with_key: Vec<_> = merged
                    .iter()
                    .filter(|p| p.document_key.as_deref() == Some(digits.as_str()))
                    .collect();
                prop_assert_eq!(with_key.len(), 1);
                let p = with_key[0];
                prop_assert_eq!(p.name.is_some(), crawler_name.is_some() || opp_name.is_some());
                prop_assert_eq!(p.person_type.clone(), person_type);
                prop_assert_eq!(p.party_role.clone(), party_role);
            }
        }
    }
}
