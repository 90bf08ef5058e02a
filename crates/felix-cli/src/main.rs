//! `felixctl` — command-line front end for the Felix temporal fact engine.
//!
//! # Usage
//!
//! ```text
//! felixctl facts.db init
//! felixctl facts.db ingest 5001 1739539200000 event "Age=int:6" "Last Name=text:Cat"
//! felixctl facts.db import updates.ndjson --mode observe
//! felixctl facts.db current-eq "Last Name" text:Cat
//! felixctl facts.db snapshot 5001 1739539200000
//! ```
//!
//! Exits 0 on success, 1 on runtime or validation errors (diagnostic on
//! stderr), 2 on usage errors.

mod ndjson;
mod output;

use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use felix_core::{
  store::{IngestItem, IngestMode, TemporalStore as _},
  value::{CanonValue, LogicalType},
};
use felix_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
  name = "felixctl",
  version,
  about = "Append-only temporal fact engine"
)]
struct Cli {
  /// Path to the SQLite database file (created on first use).
  db: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Create the database schema (a no-op if it already exists).
  Init,

  /// Ingest one record update from the command line.
  Ingest {
    record_id: u64,
    ts_ms:     i64,
    /// `event` suppresses unchanged values; `observe` records every sample.
    #[arg(value_parser = parse_mode_arg)]
    mode:      IngestMode,
    /// Typed updates, `Field=type:value` each.
    #[arg(required = true)]
    items:     Vec<String>,
  },

  /// Import NDJSON updates, one record update per line.
  #[command(visible_alias = "ingest-ndjson")]
  Import {
    file: PathBuf,
    /// Default mode for lines that do not carry their own.
    #[arg(long, default_value = "event", value_parser = parse_mode_arg)]
    mode: IngestMode,
  },

  /// Record ids whose current value for a field equals a typed value.
  CurrentEq {
    field: String,
    /// `type:value`
    value: String,
  },

  /// Record ids that ever held a typed value for a field.
  EverEq {
    field: String,
    /// `type:value`
    value: String,
  },

  /// All facts in a closed time window, oldest first, one JSON per line.
  FactsWindow {
    t1_ms:     i64,
    t2_ms:     i64,
    record_id: Option<u64>,
  },

  /// Latest fact per field for a record at a point in time.
  Snapshot { record_id: u64, t_ms: i64 },

  /// Full fact log for one record, oldest first, one JSON per line.
  History { record_id: u64 },

  /// Recompute the current view from the fact log.
  RebuildCurrent,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("error: {err:#}");
      ExitCode::from(1)
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let mut store = SqliteStore::open(&cli.db)
    .with_context(|| format!("failed to open database {}", cli.db.display()))?;

  match cli.command {
    Command::Init => {
      println!("ok: initialized schema");
    }

    Command::Ingest { record_id, ts_ms, mode, items } => {
      let items = items
        .iter()
        .map(|raw| parse_typed_kv(raw))
        .collect::<Result<Vec<_>>>()?;
      store.ingest(record_id, ts_ms, mode, &items)?;
      println!("ok: ingested record {record_id}");
    }

    Command::Import { file, mode } => {
      let lines = ndjson::import_file(&mut store, &file, mode)?;
      tracing::info!(lines, file = %file.display(), "ndjson import complete");
      println!("ok: imported {lines} updates from {}", file.display());
    }

    Command::CurrentEq { field, value } => {
      let value = parse_typed_value(&value)?;
      for record_id in store.current_eq(&field, &value)? {
        println!("{record_id}");
      }
    }

    Command::EverEq { field, value } => {
      let value = parse_typed_value(&value)?;
      for record_id in store.ever_eq(&field, &value)? {
        println!("{record_id}");
      }
    }

    Command::FactsWindow { t1_ms, t2_ms, record_id } => {
      for fact in store.facts_window(t1_ms, t2_ms, record_id)? {
        println!("{}", output::fact_json(&store, &fact)?);
      }
    }

    Command::Snapshot { record_id, t_ms } => {
      let rows = store.snapshot_at(record_id, t_ms)?;
      println!("{}", output::snapshot_json(&store, record_id, t_ms, &rows)?);
    }

    Command::History { record_id } => {
      for fact in store.history(record_id)? {
        println!("{}", output::fact_json(&store, &fact)?);
      }
    }

    Command::RebuildCurrent => {
      store.rebuild_current()?;
      println!("ok: rebuilt current view");
    }
  }

  Ok(())
}

// ─── Typed-value parsing ─────────────────────────────────────────────────────

/// Parse `Field=type:value`. Only the first `=` splits, so field names may
/// not contain one, and only the first `:` splits the right-hand side, so
/// text values may.
fn parse_typed_kv(token: &str) -> Result<IngestItem> {
  let (field, rhs) = token
    .split_once('=')
    .with_context(|| format!("expected Field=type:value, got {token:?}"))?;
  Ok(IngestItem::new(field, parse_typed_value(rhs)?))
}

/// Parse `type:value` into a canonical value. A missing `:` leaves an
/// empty value string, which only `null` accepts.
fn parse_typed_value(raw: &str) -> Result<CanonValue> {
  let (ty, value) = match raw.split_once(':') {
    Some((ty, value)) => (ty, value),
    None => (raw, ""),
  };
  let ty = LogicalType::parse_input(ty)?;
  Ok(CanonValue::from_text(ty, value)?)
}

fn parse_mode_arg(s: &str) -> Result<IngestMode, String> {
  s.parse().map_err(|e: felix_core::Error| e.to_string())
}
