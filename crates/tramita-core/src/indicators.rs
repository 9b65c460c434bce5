//! Legal indicators derived from the crawler's trigger-data blob.
//!
//! The blob is a JSON object (or a JSON-encoded string holding one) whose key
//! names drifted over time: Portuguese and English, snake and camel case,
//! legacy and current. Each logical field carries an ordered list of accepted
//! keys. Lookup tries the list against the root object first, then against
//! the nested `indicators` object. The first key that is *present* wins, even
//! when its value is `null`.
//!
//! Fields whose shape varies between sources (`county`, `tags`, `amount`,
//! flags) are modelled as untagged enums so they serialize back to exactly
//! the shape they arrived in.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use crate::normalize::{
    normalize_string, normalize_timestamp, normalize_uppercase, parse_boolean_flag,
    parse_json_bytes,
};
use crate::row::RawRecord;

const NESTED_KEYS: &[&str] = &["indicators", "indicadores"];

const TRIBUNAL_ACRONYM: &[&str] = &[
    "tribunal_sigla",
    "sigla_tribunal",
    "siglaTribunal",
    "tribunalAcronym",
    "tribunal_acronym",
    "court_acronym",
];
const TRIBUNAL_NAME: &[&str] = &[
    "tribunal_nome",
    "nome_tribunal",
    "nomeTribunal",
    "tribunal",
    "tribunalName",
    "tribunal_name",
    "court_name",
];
const JUSTICE: &[&str] = &[
    "justica",
    "justica_descricao",
    "justicaDescricao",
    "orgao_julgador",
    "orgaoJulgador",
    "justice",
    "court",
];
const COUNTY: &[&str] = &["comarca", "municipio", "county", "city"];
const AMOUNT: &[&str] = &["valor_causa", "valorCausa", "valor", "amount", "case_value"];
const DISTRIBUTED_AT: &[&str] = &[
    "data_distribuicao",
    "dataDistribuicao",
    "distribuicao",
    "distribution_date",
    "distributionDate",
    "distributed_at",
];
const SUBJECTS: &[&str] = &["assuntos", "assunto", "subjects", "subject"];
const CLASSIFICATIONS: &[&str] = &[
    "classificacoes",
    "classes",
    "classe",
    "classifications",
    "classification",
];
const TAGS: &[&str] = &["tags", "etiquetas", "marcadores"];
const PRECATORY: &[&str] = &["precatorio", "is_precatorio", "isPrecatorio", "precatory"];
const FREE_JUSTICE: &[&str] = &[
    "justica_gratuita",
    "justicaGratuita",
    "gratuidade",
    "gratuidade_justica",
    "free_justice",
    "freeJustice",
];
const SECRECY_LEVEL: &[&str] = &[
    "nivel_sigilo",
    "nivelSigilo",
    "segredo_justica",
    "sigilo",
    "secrecy_level",
    "secrecyLevel",
];

/// Monetary amount, kept in the type it arrived as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(Number),
    Text(String),
}

/// A value that may be text, a list, or a structured object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Shaped {
    Text(String),
    List(Vec<Value>),
    Object(RawRecord),
}

/// A flag that is usually boolean but sometimes carries a textual value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

/// Canonical indicator set for one process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicators {
    pub tribunal_acronym: Option<String>,
    pub tribunal_name: Option<String>,
    pub justice: Option<String>,
    pub county: Option<Shaped>,
    pub amount: Option<Amount>,
    pub distributed_at: Option<String>,
    pub subjects: Option<Vec<Value>>,
    pub classifications: Option<Vec<Value>>,
    pub tags: Option<Shaped>,
    pub precatory: Option<Flag>,
    pub free_justice: Option<Flag>,
    pub secrecy_level: Option<String>,
}

impl Indicators {
    /// True when no indicator could be extracted.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract indicators from a trigger-data blob.
///
/// `None`, non-object blobs, and strings that fail to decode all yield
/// [`Indicators::default`].
pub fn extract_indicators(blob: Option<&Value>) -> Indicators {
    let Some(root) = blob.and_then(root_object) else {
        return Indicators::default();
    };
    let nested = NESTED_KEYS
        .iter()
        .find_map(|k| root.get(*k))
        .and_then(root_object);
    let source = IndicatorSource {
        root: &root,
        nested: nested.as_ref(),
    };

    Indicators {
        tribunal_acronym: source.lookup(TRIBUNAL_ACRONYM).and_then(normalize_uppercase),
        tribunal_name: source.lookup(TRIBUNAL_NAME).and_then(normalize_string),
        justice: source.lookup(JUSTICE).and_then(normalize_string),
        county: source.lookup(COUNTY).and_then(shaped),
        amount: source.lookup(AMOUNT).and_then(amount),
        distributed_at: source.lookup(DISTRIBUTED_AT).and_then(normalize_timestamp),
        subjects: source.lookup(SUBJECTS).and_then(list),
        classifications: source.lookup(CLASSIFICATIONS).and_then(list),
        tags: source.lookup(TAGS).and_then(shaped),
        precatory: source.lookup(PRECATORY).and_then(flag),
        free_justice: source.lookup(FREE_JUSTICE).and_then(flag),
        secrecy_level: source.lookup(SECRECY_LEVEL).and_then(normalize_string),
    }
}

/// Extract indicators from a raw byte buffer holding the blob.
pub fn extract_indicators_from_bytes(bytes: &[u8]) -> Indicators {
    match parse_json_bytes(bytes) {
        Some(value) => extract_indicators(Some(&value)),
        None => {
            debug!(len = bytes.len(), "trigger blob bytes are not JSON, no indicators");
            Indicators::default()
        }
    }
}

struct IndicatorSource<'a> {
    root: &'a RawRecord,
    nested: Option<&'a RawRecord>,
}

impl<'a> IndicatorSource<'a> {
    fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        if let Some(v) = keys.iter().find_map(|k| self.root.get(*k)) {
            return Some(v);
        }
        let nested = self.nested?;
        keys.iter().find_map(|k| nested.get(*k))
    }
}

fn root_object(value: &Value) -> Option<RawRecord> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "trigger blob is not valid JSON, no indicators");
                None
            }
        },
        _ => None,
    }
}

fn shaped(value: &Value) -> Option<Shaped> {
    match value {
        Value::Array(items) => Some(Shaped::List(items.clone())),
        Value::Object(map) => Some(Shaped::Object(map.clone())),
        other => normalize_string(other).map(Shaped::Text),
    }
}

fn amount(value: &Value) -> Option<Amount> {
    match value {
        Value::Number(n) => Some(Amount::Number(n.clone())),
        Value::String(_) => normalize_string(value).map(Amount::Text),
        _ => None,
    }
}

fn list(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Some(items),
            _ => normalize_string(value).map(|s| vec![Value::String(s)]),
        },
        _ => None,
    }
}

fn flag(value: &Value) -> Option<Flag> {
    if let Some(b) = parse_boolean_flag(value) {
        return Some(Flag::Bool(b));
    }
    normalize_string(value).map(Flag::Text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_root_keys() {
        let blob = json!({
            "tribunal_sigla": "tjsp",
            "tribunal_nome": "Tribunal de Justiça de São Paulo",
            "comarca": "Campinas",
            "valor_causa": 15000.5,
            "data_distribuicao": "2023-05-02T10:00:00Z",
            "assuntos": ["Dano moral", "Consumidor"],
            "justica_gratuita": "sim",
            "nivel_sigilo": 0
        });
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.tribunal_acronym.as_deref(), Some("TJSP"));
        assert_eq!(
            ind.tribunal_name.as_deref(),
            Some("Tribunal de Justiça de São Paulo")
        );
        assert_eq!(ind.county, Some(Shaped::Text("Campinas".into())));
        assert_eq!(ind.amount, Some(Amount::Number(Number::from_f64(15000.5).unwrap())));
        assert_eq!(
            ind.distributed_at.as_deref(),
            Some("2023-05-02T10:00:00.000Z")
        );
        assert_eq!(ind.subjects.as_ref().map(Vec::len), Some(2));
        assert_eq!(ind.free_justice, Some(Flag::Bool(true)));
        assert_eq!(ind.secrecy_level.as_deref(), Some("0"));
    }

    #[test]
    fn falls_back_to_nested_indicators() {
        let blob = json!({
            "tribunal": "TRT2",
            "indicators": {"siglaTribunal": "trt2", "valorCausa": "R$ 1.000,00"}
        });
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.tribunal_acronym.as_deref(), Some("TRT2"));
        assert_eq!(ind.tribunal_name.as_deref(), Some("TRT2"));
        assert_eq!(ind.amount, Some(Amount::Text("R$ 1.000,00".into())));
    }

    #[test]
    fn present_null_short_circuits_fallback() {
        let blob = json!({
            "comarca": null,
            "indicators": {"comarca": "Santos"}
        });
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.county, None);
    }

    #[test]
    fn key_list_order_beats_object_order() {
        let blob = json!({"valor": 10, "valor_causa": 20});
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.amount, Some(Amount::Number(20.into())));
    }

    #[test]
    fn encoded_string_blob_and_encoded_nested() {
        let inner = json!({"etiquetas": {"urgente": true}}).to_string();
        let blob = json!({"indicadores": inner}).to_string();
        let ind = extract_indicators(Some(&Value::String(blob)));
        match ind.tags {
            Some(Shaped::Object(map)) => assert_eq!(map["urgente"], json!(true)),
            other => panic!("expected object tags, got {other:?}"),
        }
    }

    #[test]
    fn structured_county_preserved() {
        let blob = json!({"county": {"nome": "Campinas", "uf": "SP"}});
        let ind = extract_indicators(Some(&blob));
        let Some(Shaped::Object(map)) = ind.county else {
            panic!("county should stay structured");
        };
        assert_eq!(map["uf"], json!("SP"));
    }

    #[test]
    fn textual_flag_kept_as_text() {
        let blob = json!({"precatorio": "Alimentar", "free_justice": false});
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.precatory, Some(Flag::Text("Alimentar".into())));
        assert_eq!(ind.free_justice, Some(Flag::Bool(false)));
    }

    #[test]
    fn single_subject_string_becomes_list() {
        let blob = json!({"assunto": "Rescisão indireta", "classes": "[\"Procedimento Comum\"]"});
        let ind = extract_indicators(Some(&blob));
        assert_eq!(ind.subjects, Some(vec![json!("Rescisão indireta")]));
        assert_eq!(ind.classifications, Some(vec![json!("Procedimento Comum")]));
    }

    #[test]
    fn malformed_blob_yields_no_indicators() {
        let ind = extract_indicators(Some(&json!("{not json")));
        assert!(ind.is_empty());
        assert!(extract_indicators(None).is_empty());
        assert!(extract_indicators(Some(&json!([1, 2]))).is_empty());
        assert!(extract_indicators_from_bytes(b"\x00garbage").is_empty());
        let ind = extract_indicators_from_bytes(br#"{"tribunal_sigla": " trf3 "}"#);
        assert_eq!(ind.tribunal_acronym.as_deref(), Some("TRF3"));
    }

    #[test]
    fn shapes_serialize_as_source_shape() {
        let blob = json!({"tags": ["a", "b"], "valor": "10", "precatorio": true});
        let ind = extract_indicators(Some(&blob));
        let out = serde_json::to_value(&ind).unwrap();
        assert_eq!(out["tags"], json!(["a", "b"]));
        assert_eq!(out["amount"], json!("10"));
        assert_eq!(out["precatory"], json!(true));
    }
}
