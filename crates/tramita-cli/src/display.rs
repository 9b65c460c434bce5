//! Vertical card display for process aggregates.
//!
//! Renders one [`ProcessAggregate`] as grouped, human-readable sections.
//! Empty sections are skipped, long lists are truncated.

use std::fmt::{self, Write};

use serde_json::Value;
use tramita_core::normalize::normalize_date;
use tramita_core::{Amount, Flag, Movement, Participant, ProcessAggregate, Shaped};

const MAX_LIST_ITEMS: usize = 10;
const MAX_CONTENT_CHARS: usize = 72;

// ── Public API ──

/// Print a process aggregate as a vertical card.
pub fn print_process_card(agg: &ProcessAggregate) {
    print!("{}", render_process_card(agg));
}

pub fn render_process_card(agg: &ProcessAggregate) -> String {
    let mut out = String::new();
    // Writing into a String is infallible.
    write_card(&mut out, agg).ok();
    out
}

fn write_card(out: &mut String, agg: &ProcessAggregate) -> fmt::Result {
    let number = agg.number.as_deref().unwrap_or("(no number)");
    writeln!(out, "=== {number} ===")?;
    if let Some(company) = &agg.company_name {
        writeln!(out, "{company}")?;
    }
    out.push('\n');

    section(
        out,
        "Identity",
        &[
            ("tenant", agg.tenant_id.clone()),
            ("client", agg.client_name.clone()),
            ("tribunal", agg.tribunal.clone()),
            ("jurisdiction", agg.jurisdiction.clone()),
            ("court", agg.court.clone()),
            ("class", agg.class.clone()),
            ("subject", agg.subject.clone()),
            ("area", agg.area.clone()),
            ("status", agg.status.clone()),
            ("instance", agg.instance.clone()),
        ],
    )?;

    let ind = &agg.indicators;
    section(
        out,
        "Indicators",
        &[
            ("tribunal_acronym", ind.tribunal_acronym.clone()),
            ("tribunal_name", ind.tribunal_name.clone()),
            ("justice", ind.justice.clone()),
            ("county", ind.county.as_ref().map(shaped_text)),
            ("amount", ind.amount.as_ref().map(amount_text)),
            (
                "distributed_on",
                ind.distributed_at
                    .as_ref()
                    .map(|ts| normalize_date(&Value::String(ts.clone())).unwrap_or_else(|| ts.clone())),
            ),
            ("subjects", ind.subjects.as_deref().map(list_text)),
            ("classifications", ind.classifications.as_deref().map(list_text)),
            ("tags", ind.tags.as_ref().map(shaped_text)),
            ("precatory", ind.precatory.as_ref().map(flag_text)),
            ("free_justice", ind.free_justice.as_ref().map(flag_text)),
            ("secrecy_level", ind.secrecy_level.clone()),
        ],
    )?;

    section(
        out,
        "Counters",
        &[
            ("movements", Some(agg.movement_count.to_string())),
            ("api_queries", Some(agg.api_query_count.to_string())),
            ("attachments", Some(agg.attachments.len().to_string())),
            (
                "unassociated",
                Some(agg.unassociated_attachments().to_string()),
            ),
        ],
    )?;

    participants(out, &agg.participants)?;
    movements(out, &agg.movements)?;

    section(
        out,
        "Timestamps",
        &[
            ("created_at", agg.created_at.clone()),
            ("updated_at", agg.updated_at.clone()),
            ("last_synced_at", agg.last_synced_at.clone()),
        ],
    )
}

// ── Section rendering ──

fn section(out: &mut String, header: &str, rows: &[(&str, Option<String>)]) -> fmt::Result {
    if rows.iter().all(|(_, v)| v.is_none()) {
        return Ok(());
    }
    writeln!(out, "{header}")?;
    for (label, value) in rows {
        if let Some(v) = value {
            writeln!(out, "  {:<26} {}", label, v)?;
        }
    }
    out.push('\n');
    Ok(())
}

fn participants(out: &mut String, list: &[Participant]) -> fmt::Result {
    if list.is_empty() {
        return Ok(());
    }
    writeln!(out, "Participants ({})", list.len())?;
    for p in list.iter().take(MAX_LIST_ITEMS) {
        let side = p.side.map(|s| s.as_str()).unwrap_or("-");
        let name = p.name.as_deref().unwrap_or("(unnamed)");
        write!(out, "  [{:<7}] {}", side, name)?;
        if let Some(doc) = &p.document {
            write!(out, "  doc: {doc}")?;
        }
        if let Some(kind) = &p.kind {
            write!(out, "  type: {kind}")?;
        }
        out.push('\n');
        for lawyer in &p.lawyers {
            writeln!(
                out,
                "      lawyer: {}",
                lawyer.name.as_deref().or(lawyer.document.as_deref()).unwrap_or("-")
            )?;
        }
    }
    if list.len() > MAX_LIST_ITEMS {
        writeln!(out, "  ... and {} more", list.len() - MAX_LIST_ITEMS)?;
    }
    out.push('\n');
    Ok(())
}

fn movements(out: &mut String, list: &[Movement]) -> fmt::Result {
    if list.is_empty() {
        return Ok(());
    }
    writeln!(out, "Movements ({})", list.len())?;
    for m in list.iter().take(MAX_LIST_ITEMS) {
        let ts = m.timestamp.as_deref().unwrap_or("-");
        let kind = m.kind.as_deref().unwrap_or("");
        writeln!(out, "  {:<26} {}", ts, kind)?;
        if let Some(content) = &m.content {
            writeln!(out, "      {}", truncate(content, MAX_CONTENT_CHARS))?;
        }
        for a in &m.attachments {
            writeln!(out, "      + {}", a.name.as_deref().unwrap_or("(attachment)"))?;
        }
    }
    if list.len() > MAX_LIST_ITEMS {
        writeln!(out, "  ... and {} more", list.len() - MAX_LIST_ITEMS)?;
    }
    out.push('\n');
    Ok(())
}

// ── Helpers ──

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{head}...")
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj
            .get("nome")
            .or_else(|| obj.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    }
}

fn list_text(items: &[Value]) -> String {
    items.iter().map(value_text).collect::<Vec<_>>().join(", ")
}

fn shaped_text(s: &Shaped) -> String {
    match s {
        Shaped::Text(t) => t.clone(),
        Shaped::List(items) => list_text(items),
        Shaped::Object(obj) => value_text(&Value::Object(obj.clone())),
    }
}

fn amount_text(a: &Amount) -> String {
    match a {
        Amount::Number(n) => n.to_string(),
        Amount::Text(t) => t.clone(),
    }
}

fn flag_text(f: &Flag) -> String {
    match f {
        Flag::Bool(true) => "yes".into(),
        Flag::Bool(false) => "no".into(),
        Flag::Text(t) => t.clone(),
    }
}
