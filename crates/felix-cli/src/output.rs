//! JSON output forms for facts and snapshots.
//!
//! Interned ids are resolved back through the store so every emitted object
//! carries both the ids and the human-readable canonical forms. `canon` is
//! the canonical text for every type except bytes, which render as base64.

use anyhow::Result;
use serde_json::json;

use felix_core::store::{FactRow, TemporalStore as _};
use felix_store_sqlite::SqliteStore;

/// One fact as a compact JSON object (one per line in command output).
pub fn fact_json(store: &SqliteStore, fact: &FactRow) -> Result<String> {
  let field = store.field(fact.field_id)?;
  let value = store.value(fact.value_id)?;
  let object = json!({
    "record_id": fact.record_id,
    "field_id": fact.field_id,
    "field_name": field.name_canon,
    "value_id": fact.value_id,
    "type": value.value.logical_type().name(),
    "canon": value.value.canon_display(),
    "ts_ms": fact.ts_ms,
  });
  Ok(object.to_string())
}

/// A snapshot as a pretty-printed JSON object keyed by field name.
pub fn snapshot_json(
  store: &SqliteStore,
  record_id: u64,
  t_ms: i64,
  rows: &[FactRow],
) -> Result<String> {
  let mut fields = serde_json::Map::new();
  for fact in rows {
    let field = store.field(fact.field_id)?;
    let value = store.value(fact.value_id)?;
    fields.insert(
      field.name_canon,
      json!({
        "field_id": fact.field_id,
        "value_id": fact.value_id,
        "type": value.value.logical_type().name(),
        "canon": value.value.canon_display(),
        "fact_ts_ms": fact.ts_ms,
      }),
    );
  }

  let object = json!({
    "record_id": record_id,
    "ts_ms": t_ms,
    "fields": fields,
  });
  Ok(serde_json::to_string_pretty(&object)?)
}
