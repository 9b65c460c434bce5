//! Load case tables from a directory of JSON files.
//!
//! Each table is one file holding a JSON array of row objects:
//!
//! | file | table |
//! |---|---|
//! | `processes.json` | joined process base rows |
//! | `trigger_data.json` | trigger blobs keyed by `numero_processo` |
//! | `movements.json` | docket entries |
//! | `attachments.json` | movement attachments |
//! | `crawler_participants.json` | crawler parties |
//! | `opportunity_participants.json` | CRM involved parties |
//! | `plan_limits.json` | tenant plan limits |
//! | `sync_requests.json` | recorded sync requests |
//! | `external_queries.json` | ad-hoc case-API queries |
//!
//! A missing file is an empty table.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};
use tramita_core::RawRecord;

use crate::{MemoryStore, StoreError, Tables};

/// Read every table file under `dir` into a [`MemoryStore`].
pub fn load_data_dir(dir: &Path) -> Result<MemoryStore, StoreError> {
    if !dir.is_dir() {
        return Err(StoreError::not_found("data directory", dir.display().to_string()));
    }
    let tables = Tables {
        processes: read_table(dir, "processes.json")?,
        trigger_data: read_table(dir, "trigger_data.json")?,
        movements: read_table(dir, "movements.json")?,
        attachments: read_table(dir, "attachments.json")?,
        crawler_participants: read_table(dir, "crawler_participants.json")?,
        opportunity_participants: read_table(dir, "opportunity_participants.json")?,
        plan_limits: read_table(dir, "plan_limits.json")?,
        sync_requests: read_table(dir, "sync_requests.json")?,
        external_queries: read_table(dir, "external_queries.json")?,
    };
    info!(dir = %dir.display(), processes = tables.processes.len(), "loaded case tables");
    Ok(MemoryStore::new(tables))
}

fn read_table(dir: &Path, file: &str) -> Result<Vec<RawRecord>, StoreError> {
    let path = dir.join(file);
    if !path.exists() {
        debug!(path = %path.display(), "table file missing, using empty table");
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(&path)?;
    let rows: Vec<Value> = serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        match row {
            Value::Object(map) => out.push(map),
            _ => {
                return Err(StoreError::Other(format!(
                    "{}: row {i} is not an object",
                    path.display()
                )));
            }
        }
    }
    debug!(path = %path.display(), rows = out.len(), "read table");
    Ok(out)
}
