//! The `TemporalStore` trait and supporting row types.
//!
//! The trait is implemented by storage backends (e.g. `felix-store-sqlite`).
//! Front ends depend on this abstraction, not on any concrete backend.
//! All calls are synchronous and blocking: the engine has no internal
//! threads, and a caller cancels by dropping its handle.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::value::CanonValue;

// ─── Ingestion inputs ────────────────────────────────────────────────────────

/// Ingestion policy, applied per fact rather than per record.
///
/// `Event` suppresses a fact whose value equals the current one for its
/// (record, field) — state changes only. `Observe` records every sample.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
  Event,
  Observe,
}

impl FromStr for IngestMode {
  type Err = crate::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "event" => Ok(Self::Event),
      "observe" => Ok(Self::Observe),
      other => Err(crate::Error::UnknownMode(other.to_owned())),
    }
  }
}

impl fmt::Display for IngestMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Event => "event",
      Self::Observe => "observe",
    })
  }
}

/// One (field, value) pair inside an ingest batch. The whole batch shares
/// a single (record, timestamp).
#[derive(Debug, Clone)]
pub struct IngestItem {
  pub field: String,
  pub value: CanonValue,
}

impl IngestItem {
  pub fn new(field: impl Into<String>, value: CanonValue) -> Self {
    Self { field: field.into(), value }
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// A stored fact, as read back from the log or the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactRow {
  pub record_id: u64,
  pub field_id:  i64,
  pub value_id:  i64,
  pub ts_ms:     i64,
}

/// An interned field resolved back to its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
  pub field_id:   i64,
  pub name_canon: String,
}

/// An interned value resolved back to its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRow {
  pub value_id: i64,
  pub value:    CanonValue,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Felix database.
///
/// Writes are append-only: records, fields and values are interned forever,
/// facts are only ever added, and the current view is the sole mutable
/// projection. One ingest batch is one atomic unit.
pub trait TemporalStore {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Interning ─────────────────────────────────────────────────────────

  /// Intern a field by name, canonicalizing it first. Idempotent: the same
  /// canonical name maps to the same id for the lifetime of the database.
  fn intern_field(&mut self, name: &str) -> Result<i64, Self::Error>;

  /// Intern a canonical value. Idempotent across all types; the identity
  /// hash keys the lookup, so equal canonical inputs share one id.
  fn intern_value(&mut self, value: &CanonValue)
    -> Result<i64, Self::Error>;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Ingest one batch of (field, value) pairs for `record_id` at `ts_ms`.
  /// Creates the record on first reference. Returns the number of facts
  /// actually appended (event mode may suppress some).
  fn ingest(
    &mut self,
    record_id: u64,
    ts_ms: i64,
    mode: IngestMode,
    items: &[IngestItem],
  ) -> Result<usize, Self::Error>;

  // ── Queries ───────────────────────────────────────────────────────────

  /// Record ids whose current value for `field` equals `value`, ascending.
  fn current_eq(
    &mut self,
    field: &str,
    value: &CanonValue,
  ) -> Result<Vec<u64>, Self::Error>;

  /// Record ids that ever held `value` for `field`, ascending.
  fn ever_eq(
    &mut self,
    field: &str,
    value: &CanonValue,
  ) -> Result<Vec<u64>, Self::Error>;

  /// All facts with `t1_ms <= ts <= t2_ms`, optionally filtered by record,
  /// ordered by ts ascending (ties by insertion order).
  fn facts_window(
    &self,
    t1_ms: i64,
    t2_ms: i64,
    record_id: Option<u64>,
  ) -> Result<Vec<FactRow>, Self::Error>;

  /// Per-field latest fact with `ts <= t_ms` for one record. Fields with
  /// no qualifying fact are absent; a field whose latest value is logical
  /// null is present with that null value.
  fn snapshot_at(
    &self,
    record_id: u64,
    t_ms: i64,
  ) -> Result<Vec<FactRow>, Self::Error>;

  /// The full fact log for one record, ordered by ts ascending (ties by
  /// insertion order).
  fn history(&self, record_id: u64) -> Result<Vec<FactRow>, Self::Error>;

  /// Recompute the current view from the fact log alone. The result must
  /// equal what incremental ingestion maintained.
  fn rebuild_current(&mut self) -> Result<(), Self::Error>;

  // ── Id resolution ─────────────────────────────────────────────────────

  /// Resolve an interned field id; unknown ids are referential errors.
  fn field(&self, field_id: i64) -> Result<FieldRow, Self::Error>;

  /// Resolve an interned value id; unknown ids are referential errors.
  fn value(&self, value_id: i64) -> Result<ValueRow, Self::Error>;
}
