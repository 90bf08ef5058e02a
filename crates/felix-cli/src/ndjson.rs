//! NDJSON importer — one record update per line.
//!
//! Each line is a strictly typed single-record batch:
//!
//! ```text
//! {"record_id":5001,"ts_ms":1739539200000,"mode":"event","fields":{
//!    "Age":{"t":"int","v":6},
//!    "Last Name":{"t":"text","v":"Cat"},
//!    "DeletedField":{"t":"null"}
//! }}
//! ```
//!
//! Every line commits as its own ingest transaction. A failing line aborts
//! the import with its line number; lines already committed remain, per the
//! engine's read-committed model.

use std::{
  collections::BTreeMap,
  fs::File,
  io::{BufRead, BufReader},
  path::Path,
};

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;

use felix_core::{
  limits,
  store::{IngestItem, IngestMode, TemporalStore as _},
  value::{CanonValue, LogicalType},
};
use felix_store_sqlite::SqliteStore;

// ─── Line shape ──────────────────────────────────────────────────────────────

/// One NDJSON line: a single-record update batch.
#[derive(Debug, Deserialize)]
struct UpdateLine {
  record_id: u64,
  ts_ms:     i64,
  #[serde(default)]
  mode:      Option<IngestMode>,
  fields:    BTreeMap<String, FieldSpec>,
}

/// The `{"t": ..., "v": ...}` shape of one field update. `v` may be
/// omitted for `null`.
#[derive(Debug, Deserialize)]
struct FieldSpec {
  t: LogicalType,
  #[serde(default)]
  v: Option<serde_json::Value>,
}

fn item_from_spec(name: &str, spec: &FieldSpec) -> Result<IngestItem> {
  let v = spec.v.clone().unwrap_or(serde_json::Value::Null);
  let value = CanonValue::from_json(spec.t, &v)
    .with_context(|| format!("field {name:?}"))?;
  Ok(IngestItem::new(name, value))
}

// ─── Import ──────────────────────────────────────────────────────────────────

/// Import every line of `path`, returning the number of updates ingested.
pub fn import_file(
  store: &mut SqliteStore,
  path: &Path,
  default_mode: IngestMode,
) -> Result<u64> {
  let file = File::open(path)
    .with_context(|| format!("failed to open ndjson file {}", path.display()))?;
  import_reader(store, BufReader::new(file), default_mode)
}

/// Import NDJSON from any buffered reader.
pub fn import_reader(
  store: &mut SqliteStore,
  mut reader: impl BufRead,
  default_mode: IngestMode,
) -> Result<u64> {
  let mut line = String::new();
  let mut lineno = 0u64;
  let mut imported = 0u64;

  loop {
    line.clear();
    let n = reader
      .read_line(&mut line)
      .with_context(|| format!("line {}", lineno + 1))?;
    if n == 0 {
      break;
    }
    lineno += 1;

    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }
    if trimmed.len() > limits::MAX_NDJSON_LINE_BYTES {
      bail!(
        "line {lineno} exceeds {} bytes",
        limits::MAX_NDJSON_LINE_BYTES
      );
    }

    import_line(store, trimmed, default_mode)
      .with_context(|| format!("line {lineno}"))?;
    imported += 1;
  }

  Ok(imported)
}

fn import_line(
  store: &mut SqliteStore,
  line: &str,
  default_mode: IngestMode,
) -> Result<()> {
  let update: UpdateLine =
    serde_json::from_str(line).context("invalid update json")?;

  let items = update
    .fields
    .iter()
    .map(|(name, spec)| item_from_spec(name, spec))
    .collect::<Result<Vec<_>>>()?;

  let mode = update.mode.unwrap_or(default_mode);
  let appended = store.ingest(update.record_id, update.ts_ms, mode, &items)?;
  tracing::debug!(
    record_id = update.record_id,
    ts_ms = update.ts_ms,
    appended,
    "ingested update"
  );
  Ok(())
}
