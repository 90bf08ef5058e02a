//! [`SqliteStore`] — the SQLite implementation of [`TemporalStore`].

use std::path::Path;

use rusqlite::{
  params, Connection, OptionalExtension as _, TransactionBehavior,
};

use felix_core::{
  canon::canon_field_name,
  hash::{self, FormatGeneration},
  limits,
  store::{FactRow, FieldRow, IngestItem, IngestMode, TemporalStore, ValueRow},
  value::{CanonValue, LogicalType},
};

use crate::{schema::SCHEMA, Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Felix database backed by a single SQLite file.
///
/// One handle is one writer; readers may hold their own handles and see
/// committed ingests only. All calls block until done.
#[derive(Debug)]
pub struct SqliteStore {
  pub(crate) conn: Connection,
  generation:      FormatGeneration,
  null_value_id:   i64,
}

impl SqliteStore {
  /// Open (or create) a database at `path`.
  ///
  /// A fresh database is stamped with the current (v0.3) format
  /// generation; an existing database keeps whatever generation its
  /// metadata declares, legacy included.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::from_connection(Connection::open(path)?)
  }

  /// Open an in-memory database — useful for testing.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    // A database that predates this open has a facts table; only a truly
    // fresh one may be stamped with the current generation.
    let fresh = !table_exists(&conn, "facts")?;
    conn.execute_batch(SCHEMA)?;

    if fresh {
      meta_set(&conn, "felix_spec", hash::SPEC_VERSION)?;
      meta_set(&conn, "tag_map", hash::TAG_MAP_V03)?;
      meta_set(&conn, "hash_format", hash::HASH_FORMAT_V03)?;
    }

    let generation = FormatGeneration::from_meta(
      meta_get(&conn, "tag_map")?.as_deref(),
      meta_get(&conn, "hash_format")?.as_deref(),
    )
    .map_err(Error::Core)?;

    // The null value is guaranteed present from initialisation on.
    let null_value_id = intern_value_in(&conn, generation, &CanonValue::Null)?;

    Ok(Self { conn, generation, null_value_id })
  }

  /// The format generation this database is persisted under.
  pub fn generation(&self) -> FormatGeneration {
    self.generation
  }

  /// The value id interned for logical null at initialisation.
  pub fn null_value_id(&self) -> i64 {
    self.null_value_id
  }
}

// ─── TemporalStore impl ──────────────────────────────────────────────────────

impl TemporalStore for SqliteStore {
  type Error = Error;

  // ── Interning ─────────────────────────────────────────────────────────

  fn intern_field(&mut self, name: &str) -> Result<i64> {
    intern_field_in(&self.conn, name)
  }

  fn intern_value(&mut self, value: &CanonValue) -> Result<i64> {
    intern_value_in(&self.conn, self.generation, value)
  }

  // ── Ingestion ─────────────────────────────────────────────────────────

  fn ingest(
    &mut self,
    record_id: u64,
    ts_ms: i64,
    mode: IngestMode,
    items: &[IngestItem],
  ) -> Result<usize> {
    if items.len() > limits::MAX_FIELDS_PER_INGEST {
      return Err(Error::TooManyFields(items.len()));
    }
    let rid = encode_record_id(record_id)?;

    // Validate the whole batch before the first write.
    for item in items {
      canon_field_name(&item.field).map_err(Error::Core)?;
      check_value_limits(&item.value)?;
    }

    let generation = self.generation;
    let tx = self
      .conn
      .transaction_with_behavior(TransactionBehavior::Immediate)?;

    // Created on first reference; INSERT OR IGNORE leaves an existing
    // record's creation timestamp untouched.
    tx.execute(
      "INSERT OR IGNORE INTO records (record_id, created_ts) VALUES (?1, ?2)",
      params![rid, ts_ms],
    )?;

    let mut appended = 0;
    for item in items {
      let field_id = intern_field_in(&tx, &item.field)?;
      let value_id = intern_value_in(&tx, generation, &item.value)?;

      if mode == IngestMode::Event {
        if let Some((current_vid, _)) = current_of(&tx, rid, field_id)? {
          if current_vid == value_id {
            // Unchanged under event semantics: no fact, no ts advance.
            continue;
          }
        }
      }

      insert_fact_in(&tx, rid, field_id, value_id, ts_ms)?;
      upsert_current_in(&tx, rid, field_id, value_id, ts_ms)?;
      appended += 1;
    }

    tx.commit()?;
    Ok(appended)
  }

  // ── Queries ───────────────────────────────────────────────────────────

  fn current_eq(
    &mut self,
    field: &str,
    value: &CanonValue,
  ) -> Result<Vec<u64>> {
    let field_id = intern_field_in(&self.conn, field)?;
    let value_id = intern_value_in(&self.conn, self.generation, value)?;

    let mut stmt = self.conn.prepare(
      "SELECT record_id FROM current_facts
       WHERE field_id = ?1 AND value_id = ?2
       ORDER BY record_id",
    )?;
    let ids = stmt
      .query_map(params![field_id, value_id], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.into_iter().map(|id| id as u64).collect())
  }

  fn ever_eq(&mut self, field: &str, value: &CanonValue) -> Result<Vec<u64>> {
    let field_id = intern_field_in(&self.conn, field)?;
    let value_id = intern_value_in(&self.conn, self.generation, value)?;

    let mut stmt = self.conn.prepare(
      "SELECT DISTINCT record_id FROM facts
       WHERE field_id = ?1 AND value_id = ?2
       ORDER BY record_id",
    )?;
    let ids = stmt
      .query_map(params![field_id, value_id], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids.into_iter().map(|id| id as u64).collect())
  }

  fn facts_window(
    &self,
    t1_ms: i64,
    t2_ms: i64,
    record_id: Option<u64>,
  ) -> Result<Vec<FactRow>> {
    // Ties on ts follow insertion order via rowid, stable for a given
    // database state.
    match record_id {
      Some(rid) => {
        let rid = encode_record_id(rid)?;
        let mut stmt = self.conn.prepare(
          "SELECT record_id, field_id, value_id, ts FROM facts
           WHERE ts BETWEEN ?1 AND ?2 AND record_id = ?3
           ORDER BY ts, rowid",
        )?;
        let rows = stmt
          .query_map(params![t1_ms, t2_ms, rid], read_fact_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      }
      None => {
        let mut stmt = self.conn.prepare(
          "SELECT record_id, field_id, value_id, ts FROM facts
           WHERE ts BETWEEN ?1 AND ?2
           ORDER BY ts, rowid",
        )?;
        let rows = stmt
          .query_map(params![t1_ms, t2_ms], read_fact_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      }
    }
  }

  fn snapshot_at(&self, record_id: u64, t_ms: i64) -> Result<Vec<FactRow>> {
    let rid = encode_record_id(record_id)?;
    let mut stmt = self.conn.prepare(
      "SELECT f.record_id, f.field_id, f.value_id, f.ts
       FROM facts f
       JOIN (
         SELECT field_id, MAX(ts) AS max_ts
         FROM facts
         WHERE record_id = ?1 AND ts <= ?2
         GROUP BY field_id
       ) latest
         ON latest.field_id = f.field_id AND latest.max_ts = f.ts
       WHERE f.record_id = ?1
       ORDER BY f.field_id",
    )?;
    let rows = stmt
      .query_map(params![rid, t_ms], read_fact_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn history(&self, record_id: u64) -> Result<Vec<FactRow>> {
    let rid = encode_record_id(record_id)?;
    let mut stmt = self.conn.prepare(
      "SELECT record_id, field_id, value_id, ts FROM facts
       WHERE record_id = ?1
       ORDER BY ts, rowid",
    )?;
    let rows = stmt
      .query_map(params![rid], read_fact_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }

  fn rebuild_current(&mut self) -> Result<()> {
    let tx = self
      .conn
      .transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute("DELETE FROM current_facts", [])?;
    // Latest fact per (record, field); a ts tie — impossible while the
    // (record, field, ts) key holds — resolves to the largest value_id so
    // rebuilds stay deterministic even over damaged logs.
    tx.execute(
      "INSERT INTO current_facts (record_id, field_id, value_id, ts)
       SELECT f.record_id, f.field_id, MAX(f.value_id), latest.max_ts
       FROM facts f
       JOIN (
         SELECT record_id, field_id, MAX(ts) AS max_ts
         FROM facts
         GROUP BY record_id, field_id
       ) latest
         ON latest.record_id = f.record_id
        AND latest.field_id  = f.field_id
        AND latest.max_ts    = f.ts
       GROUP BY f.record_id, f.field_id",
      [],
    )?;
    tx.commit()?;
    Ok(())
  }

  // ── Id resolution ─────────────────────────────────────────────────────

  fn field(&self, field_id: i64) -> Result<FieldRow> {
    self
      .conn
      .query_row(
        "SELECT field_id, name_canon FROM fields WHERE field_id = ?1",
        params![field_id],
        |row| {
          Ok(FieldRow { field_id: row.get(0)?, name_canon: row.get(1)? })
        },
      )
      .optional()?
      .ok_or(Error::UnknownFieldId(field_id))
  }

  fn value(&self, value_id: i64) -> Result<ValueRow> {
    let raw = self
      .conn
      .query_row(
        "SELECT value_id, type_tag, canon_text, canon_blob
         FROM f_values WHERE value_id = ?1",
        params![value_id],
        |row| {
          Ok(RawValue {
            value_id:   row.get(0)?,
            type_tag:   row.get(1)?,
            canon_text: row.get(2)?,
            canon_blob: row.get(3)?,
          })
        },
      )
      .optional()?
      .ok_or(Error::UnknownValueId(value_id))?;

    raw.into_value_row(self.generation)
  }
}

// ─── Interning ───────────────────────────────────────────────────────────────

fn intern_field_in(conn: &Connection, name: &str) -> Result<i64> {
  let canon = canon_field_name(name).map_err(Error::Core)?;
  let hash = hash::field_hash(&canon);

  conn.execute(
    "INSERT OR IGNORE INTO fields (name_canon, hash) VALUES (?1, ?2)",
    params![canon, hash.as_slice()],
  )?;

  conn
    .query_row(
      "SELECT field_id FROM fields WHERE hash = ?1",
      params![hash.as_slice()],
      |row| row.get(0),
    )
    .optional()?
    .ok_or(Error::InternLookup)
}

fn intern_value_in(
  conn: &Connection,
  generation: FormatGeneration,
  value: &CanonValue,
) -> Result<i64> {
  check_value_limits(value)?;
  let tag = generation
    .tag_map
    .tag_byte(value.logical_type())
    .map_err(Error::Core)?;
  let hash = hash::value_hash(generation, value).map_err(Error::Core)?;

  let canon_text = value.canon_text();
  let canon_blob = match value {
    CanonValue::Bytes(b) => Some(b.as_slice()),
    _ => None,
  };

  conn.execute(
    "INSERT OR IGNORE INTO f_values (type_tag, canon_text, canon_blob, hash)
     VALUES (?1, ?2, ?3, ?4)",
    params![tag, canon_text.as_deref(), canon_blob, hash.as_slice()],
  )?;

  conn
    .query_row(
      "SELECT value_id FROM f_values WHERE hash = ?1",
      params![hash.as_slice()],
      |row| row.get(0),
    )
    .optional()?
    .ok_or(Error::InternLookup)
}

/// Per-type size limits, re-asserted at the storage boundary for values
/// constructed without going through the canonicalizer.
fn check_value_limits(value: &CanonValue) -> Result<()> {
  match value {
    CanonValue::Text(s) if s.len() > limits::MAX_TEXT_BYTES => {
      Err(Error::Core(felix_core::Error::TextTooLarge(s.len())))
    }
    CanonValue::Bytes(b) if b.len() > limits::MAX_BYTES_LEN => {
      Err(Error::Core(felix_core::Error::BytesTooLarge(b.len())))
    }
    _ => Ok(()),
  }
}

// ─── Fact writes ─────────────────────────────────────────────────────────────

fn current_of(
  conn: &Connection,
  record_id: i64,
  field_id: i64,
) -> Result<Option<(i64, i64)>> {
  Ok(
    conn
      .query_row(
        "SELECT value_id, ts FROM current_facts
         WHERE record_id = ?1 AND field_id = ?2",
        params![record_id, field_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()?,
  )
}

fn insert_fact_in(
  conn: &Connection,
  record_id: i64,
  field_id: i64,
  value_id: i64,
  ts_ms: i64,
) -> Result<()> {
  let result = conn.execute(
    "INSERT INTO facts (record_id, field_id, value_id, ts)
     VALUES (?1, ?2, ?3, ?4)",
    params![record_id, field_id, value_id, ts_ms],
  );
  match result {
    Ok(_) => Ok(()),
    Err(rusqlite::Error::SqliteFailure(e, _))
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
    {
      Err(Error::DuplicateFact {
        record_id: record_id as u64,
        field_id,
        ts_ms,
      })
    }
    Err(e) => Err(e.into()),
  }
}

fn upsert_current_in(
  conn: &Connection,
  record_id: i64,
  field_id: i64,
  value_id: i64,
  ts_ms: i64,
) -> Result<()> {
  // `>=` lets an equal-ts write win; true ts collisions are already
  // excluded by the facts primary key.
  conn.execute(
    "INSERT INTO current_facts (record_id, field_id, value_id, ts)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT (record_id, field_id) DO UPDATE SET
       value_id = excluded.value_id, ts = excluded.ts
     WHERE excluded.ts >= current_facts.ts",
    params![record_id, field_id, value_id, ts_ms],
  )?;
  Ok(())
}

// ─── Row decoding ────────────────────────────────────────────────────────────

fn read_fact_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FactRow> {
  Ok(FactRow {
    record_id: row.get::<_, i64>(0)? as u64,
    field_id:  row.get(1)?,
    value_id:  row.get(2)?,
    ts_ms:     row.get(3)?,
  })
}

/// Raw columns of an `f_values` row, decoded via the database generation.
struct RawValue {
  value_id:   i64,
  type_tag:   u8,
  canon_text: Option<String>,
  canon_blob: Option<Vec<u8>>,
}

impl RawValue {
  fn into_value_row(self, generation: FormatGeneration) -> Result<ValueRow> {
    let RawValue { value_id, type_tag, canon_text, canon_blob } = self;
    let corrupt = |detail: &str| Error::CorruptValue {
      value_id,
      detail: detail.to_owned(),
    };

    let ty = generation
      .tag_map
      .type_for_tag(type_tag)
      .map_err(Error::Core)?;

    let value = match ty {
      LogicalType::Bytes => CanonValue::Bytes(
        canon_blob.ok_or_else(|| corrupt("canon_blob missing"))?,
      ),
      LogicalType::Json => return Err(corrupt("reserved json type stored")),
      _ => {
        let text =
          canon_text.ok_or_else(|| corrupt("canon_text missing"))?;
        match ty {
          LogicalType::Null => CanonValue::Null,
          LogicalType::Bool => match text.as_str() {
            "true" => CanonValue::Bool(true),
            "false" => CanonValue::Bool(false),
            _ => return Err(corrupt("bool text is not true/false")),
          },
          LogicalType::Int => CanonValue::Int(
            text
              .parse()
              .map_err(|_| corrupt("int text does not parse"))?,
          ),
          LogicalType::Float => CanonValue::Float(text),
          LogicalType::Text => CanonValue::Text(text),
          LogicalType::Uuid => CanonValue::Uuid(text),
          LogicalType::Bytes | LogicalType::Json => {
            return Err(corrupt("unreachable type dispatch"))
          }
        }
      }
    };

    Ok(ValueRow { value_id, value })
  }
}

// ─── Meta / misc helpers ─────────────────────────────────────────────────────

fn encode_record_id(record_id: u64) -> Result<i64> {
  i64::try_from(record_id)
    .map_err(|_| Error::Core(felix_core::Error::RecordIdOutOfRange(record_id)))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
  Ok(
    conn
      .prepare(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
      )?
      .exists(params![name])?,
  )
}

fn meta_get(conn: &Connection, key: &str) -> Result<Option<String>> {
  Ok(
    conn
      .query_row("SELECT v FROM meta WHERE k = ?1", params![key], |row| {
        row.get(0)
      })
      .optional()?,
  )
}

fn meta_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
  conn.execute(
    "INSERT INTO meta (k, v) VALUES (?1, ?2)
     ON CONFLICT (k) DO UPDATE SET v = excluded.v",
    params![key, value],
  )?;
  Ok(())
}
