//! Integration tests for `SqliteStore` against an in-memory database.

use felix_core::{
  hash::{value_hash, FormatGeneration},
  store::{FactRow, IngestItem, IngestMode, TemporalStore},
  value::{CanonValue, LogicalType},
};

use crate::{Error, SqliteStore};

fn store() -> SqliteStore {
  SqliteStore::open_in_memory().expect("in-memory store")
}

fn int(v: i64) -> CanonValue {
  CanonValue::Int(v)
}

fn float(raw: &str) -> CanonValue {
  CanonValue::from_text(LogicalType::Float, raw).unwrap()
}

fn text(raw: &str) -> CanonValue {
  CanonValue::from_text(LogicalType::Text, raw).unwrap()
}

fn item(field: &str, value: CanonValue) -> IngestItem {
  IngestItem::new(field, value)
}

fn one(
  s: &mut SqliteStore,
  record_id: u64,
  ts_ms: i64,
  mode: IngestMode,
  field: &str,
  value: CanonValue,
) -> crate::Result<usize> {
  s.ingest(record_id, ts_ms, mode, &[item(field, value)])
}

/// The full current view as plain rows, ordered for comparison.
fn current_rows(s: &SqliteStore) -> Vec<FactRow> {
  let mut stmt = s
    .conn
    .prepare(
      "SELECT record_id, field_id, value_id, ts FROM current_facts
       ORDER BY record_id, field_id",
    )
    .unwrap();
  let rows = stmt
    .query_map([], |row| {
      Ok(FactRow {
        record_id: row.get::<_, i64>(0)? as u64,
        field_id:  row.get(1)?,
        value_id:  row.get(2)?,
        ts_ms:     row.get(3)?,
      })
    })
    .unwrap()
    .collect::<rusqlite::Result<Vec<_>>>()
    .unwrap();
  rows
}

// ─── Literal scenarios ───────────────────────────────────────────────────────

#[test]
fn s1_event_updates_advance_current() {
  let mut s = store();
  one(&mut s, 1, 1000, IngestMode::Event, "Age", int(6)).unwrap();
  one(&mut s, 1, 2000, IngestMode::Event, "Age", int(7)).unwrap();

  let snap = s.snapshot_at(1, 3000).unwrap();
  assert_eq!(snap.len(), 1);
  assert_eq!(snap[0].ts_ms, 2000);
  assert_eq!(s.value(snap[0].value_id).unwrap().value, int(7));

  assert_eq!(s.history(1).unwrap().len(), 2);
}

#[test]
fn s2_late_arrival_lands_in_log_not_current() {
  let mut s = store();
  one(&mut s, 1, 1000, IngestMode::Event, "Age", int(6)).unwrap();
  one(&mut s, 1, 2000, IngestMode::Event, "Age", int(7)).unwrap();
  one(&mut s, 1, 1500, IngestMode::Event, "Age", int(5)).unwrap();

  // Current still shows the ts=2000 fact.
  let snap = s.snapshot_at(1, 3000).unwrap();
  assert_eq!(s.value(snap[0].value_id).unwrap().value, int(7));

  let history = s.history(1).unwrap();
  let by_ts: Vec<(i64, CanonValue)> = history
    .iter()
    .map(|f| (f.ts_ms, s.value(f.value_id).unwrap().value))
    .collect();
  assert_eq!(
    by_ts,
    vec![(1000, int(6)), (1500, int(5)), (2000, int(7))]
  );

  // But time travel sees the late fact.
  let snap = s.snapshot_at(1, 1800).unwrap();
  assert_eq!(snap[0].ts_ms, 1500);
  assert_eq!(s.value(snap[0].value_id).unwrap().value, int(5));
}

#[test]
fn s3_nfc_equivalent_names_share_one_value() {
  let mut s = store();
  // Decomposed "Félix" with outer padding vs composed bare form.
  one(&mut s, 2, 5000, IngestMode::Event, "Name", text("  Fe\u{301}lix  "))
    .unwrap();
  one(&mut s, 3, 5000, IngestMode::Event, "Name", text("F\u{e9}lix"))
    .unwrap();

  assert_eq!(s.current_eq("Name", &text("Félix")).unwrap(), vec![2, 3]);

  let rows = current_rows(&s);
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].value_id, rows[1].value_id);
}

#[test]
fn s4_observe_mode_records_every_sample() {
  let mut s = store();
  one(&mut s, 4, 7000, IngestMode::Observe, "Temp", float("20.0")).unwrap();
  one(&mut s, 4, 7001, IngestMode::Observe, "Temp", float("20.0")).unwrap();

  let history = s.history(4).unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].value_id, history[1].value_id);

  let rows = current_rows(&s);
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].ts_ms, 7001);
}

#[test]
fn s5_same_timestamp_different_value_collides() {
  let mut s = store();
  one(&mut s, 5, 9000, IngestMode::Event, "Flag", CanonValue::Bool(true))
    .unwrap();

  let err =
    one(&mut s, 5, 9000, IngestMode::Event, "Flag", CanonValue::Bool(false))
      .unwrap_err();
  assert!(matches!(err, Error::DuplicateFact { record_id: 5, .. }));

  // First ingest unchanged.
  assert_eq!(s.history(5).unwrap().len(), 1);
  let rows = current_rows(&s);
  assert_eq!(
    s.value(rows[0].value_id).unwrap().value,
    CanonValue::Bool(true)
  );
}

#[test]
fn s6_null_is_a_value_in_snapshots() {
  let mut s = store();
  one(&mut s, 6, 1, IngestMode::Event, "X", int(1)).unwrap();
  one(&mut s, 6, 2, IngestMode::Event, "X", CanonValue::Null).unwrap();

  let snap = s.snapshot_at(6, 2).unwrap();
  assert_eq!(snap.len(), 1);
  let value = s.value(snap[0].value_id).unwrap().value;
  assert_eq!(value.logical_type(), LogicalType::Null);
}

// ─── Ingestion semantics ─────────────────────────────────────────────────────

#[test]
fn event_mode_suppresses_unchanged_values() {
  let mut s = store();
  let appended =
    one(&mut s, 10, 100, IngestMode::Event, "Color", text("red")).unwrap();
  assert_eq!(appended, 1);

  let appended =
    one(&mut s, 10, 200, IngestMode::Event, "Color", text("red")).unwrap();
  assert_eq!(appended, 0);

  assert_eq!(s.history(10).unwrap().len(), 1);
  // The current ts did not advance.
  assert_eq!(current_rows(&s)[0].ts_ms, 100);
}

#[test]
fn event_mode_appends_out_of_order_change_without_reducing_current() {
  let mut s = store();
  one(&mut s, 11, 2000, IngestMode::Event, "X", int(2)).unwrap();
  let appended =
    one(&mut s, 11, 1000, IngestMode::Event, "X", int(1)).unwrap();
  assert_eq!(appended, 1);

  let rows = current_rows(&s);
  assert_eq!(rows[0].ts_ms, 2000);
  assert_eq!(s.value(rows[0].value_id).unwrap().value, int(2));
  assert_eq!(s.history(11).unwrap().len(), 2);
}

#[test]
fn batch_is_all_or_nothing() {
  let mut s = store();
  one(&mut s, 12, 500, IngestMode::Observe, "B", int(1)).unwrap();

  // Second item of the batch collides on (record, field, ts); the first
  // item must not survive either.
  let err = s
    .ingest(
      12,
      500,
      IngestMode::Observe,
      &[item("A", int(10)), item("B", int(99))],
    )
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateFact { .. }));

  let history = s.history(12).unwrap();
  assert_eq!(history.len(), 1);
  assert_eq!(s.value(history[0].value_id).unwrap().value, int(1));
  assert_eq!(current_rows(&s).len(), 1);
}

#[test]
fn batch_shares_one_record_and_timestamp() {
  let mut s = store();
  let appended = s
    .ingest(
      13,
      42,
      IngestMode::Event,
      &[item("A", int(1)), item("B", text("two")), item("C", float("3.0"))],
    )
    .unwrap();
  assert_eq!(appended, 3);

  let history = s.history(13).unwrap();
  assert_eq!(history.len(), 3);
  assert!(history.iter().all(|f| f.ts_ms == 42));
}

#[test]
fn record_creation_timestamp_never_updates() {
  let mut s = store();
  one(&mut s, 14, 100, IngestMode::Event, "X", int(1)).unwrap();
  one(&mut s, 14, 999, IngestMode::Event, "X", int(2)).unwrap();

  let created: i64 = s
    .conn
    .query_row(
      "SELECT created_ts FROM records WHERE record_id = 14",
      [],
      |row| row.get(0),
    )
    .unwrap();
  assert_eq!(created, 100);
}

#[test]
fn too_many_fields_fails_before_any_write() {
  let mut s = store();
  let items: Vec<IngestItem> =
    (0..257i64).map(|i| item(&format!("f{i}"), int(i))).collect();
  let err = s.ingest(15, 1, IngestMode::Event, &items).unwrap_err();
  assert!(matches!(err, Error::TooManyFields(257)));
  assert!(s.history(15).unwrap().is_empty());
}

#[test]
fn record_id_must_fit_storage_domain() {
  let mut s = store();
  let err =
    one(&mut s, u64::MAX, 1, IngestMode::Event, "X", int(1)).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::RecordIdOutOfRange(_))
  ));
}

#[test]
fn negative_timestamps_order_naturally() {
  let mut s = store();
  one(&mut s, 16, -500, IngestMode::Observe, "X", int(1)).unwrap();
  one(&mut s, 16, -100, IngestMode::Observe, "X", int(2)).unwrap();

  assert_eq!(current_rows(&s)[0].ts_ms, -100);
  let window = s.facts_window(-1000, 0, Some(16)).unwrap();
  assert_eq!(window.len(), 2);
  assert_eq!(window[0].ts_ms, -500);
}

// ─── Interning ───────────────────────────────────────────────────────────────

#[test]
fn interning_is_idempotent() {
  let mut s = store();
  let a = s.intern_value(&text("hello")).unwrap();
  let b = s.intern_value(&text("hello")).unwrap();
  assert_eq!(a, b);

  let f1 = s.intern_field("Age").unwrap();
  let f2 = s.intern_field("  Age ").unwrap();
  assert_eq!(f1, f2);
}

#[test]
fn int_zero_and_text_zero_are_distinct_values() {
  let mut s = store();
  let as_int = s.intern_value(&int(0)).unwrap();
  let as_text = s.intern_value(&text("0")).unwrap();
  assert_ne!(as_int, as_text);
}

#[test]
fn null_value_is_interned_at_initialisation() {
  let mut s = store();
  let null_id = s.null_value_id();
  assert_eq!(s.intern_value(&CanonValue::Null).unwrap(), null_id);
  assert_eq!(s.value(null_id).unwrap().value, CanonValue::Null);
}

#[test]
fn unknown_ids_are_referential_errors() {
  let s = store();
  assert!(matches!(s.field(9999), Err(Error::UnknownFieldId(9999))));
  assert!(matches!(s.value(9999), Err(Error::UnknownValueId(9999))));
}

#[test]
fn values_round_trip_through_the_store() {
  let mut s = store();
  let values = [
    CanonValue::Null,
    CanonValue::Bool(false),
    int(-17),
    float("2.5"),
    text("Félix"),
    CanonValue::Bytes(vec![0, 1, 2, 255]),
    CanonValue::from_text(
      LogicalType::Uuid,
      "550e8400-e29b-41d4-a716-446655440000",
    )
    .unwrap(),
  ];
  for value in values {
    let id = s.intern_value(&value).unwrap();
    assert_eq!(s.value(id).unwrap().value, value);
  }
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[test]
fn current_eq_and_ever_eq_diverge_after_updates() {
  let mut s = store();
  one(&mut s, 20, 1, IngestMode::Event, "City", text("Oslo")).unwrap();
  one(&mut s, 21, 1, IngestMode::Event, "City", text("Oslo")).unwrap();
  one(&mut s, 20, 2, IngestMode::Event, "City", text("Bergen")).unwrap();

  assert_eq!(s.current_eq("City", &text("Oslo")).unwrap(), vec![21]);
  assert_eq!(s.ever_eq("City", &text("Oslo")).unwrap(), vec![20, 21]);
}

#[test]
fn facts_window_is_closed_and_ordered() {
  let mut s = store();
  one(&mut s, 22, 10, IngestMode::Observe, "X", int(1)).unwrap();
  one(&mut s, 22, 20, IngestMode::Observe, "X", int(2)).unwrap();
  one(&mut s, 22, 30, IngestMode::Observe, "X", int(3)).unwrap();
  one(&mut s, 23, 20, IngestMode::Observe, "Y", int(9)).unwrap();

  let window = s.facts_window(10, 20, None).unwrap();
  assert_eq!(window.len(), 3); // both endpoints inclusive
  assert!(window.windows(2).all(|w| w[0].ts_ms <= w[1].ts_ms));

  let only_22 = s.facts_window(10, 30, Some(22)).unwrap();
  assert_eq!(only_22.len(), 3);
  assert!(only_22.iter().all(|f| f.record_id == 22));
}

#[test]
fn snapshot_before_first_fact_is_empty() {
  let mut s = store();
  one(&mut s, 24, 100, IngestMode::Event, "X", int(1)).unwrap();
  assert!(s.snapshot_at(24, 99).unwrap().is_empty());
  assert_eq!(s.snapshot_at(24, 100).unwrap().len(), 1);
}

// ─── Order independence and rebuild ──────────────────────────────────────────

#[test]
fn current_state_is_insertion_order_independent() {
  let facts: Vec<(u64, i64, &str, CanonValue)> = vec![
    (30, 100, "A", int(1)),
    (30, 300, "A", int(3)),
    (30, 200, "A", int(2)),
    (31, 100, "A", int(9)),
    (30, 100, "B", text("x")),
    (30, 50, "B", text("y")),
  ];

  let mut baseline = store();
  for (rid, ts, field, value) in &facts {
    one(&mut baseline, *rid, *ts, IngestMode::Observe, field, value.clone())
      .unwrap();
  }
  let expected = current_rows(&baseline);

  // Every rotation of the same fact multiset lands on the same view.
  for rotation in 1..facts.len() {
    let mut s = store();
    for (rid, ts, field, value) in
      facts.iter().cycle().skip(rotation).take(facts.len())
    {
      one(&mut s, *rid, *ts, IngestMode::Observe, field, value.clone())
        .unwrap();
    }
    assert_eq!(current_rows(&s), expected, "rotation {rotation}");
  }
}

#[test]
fn rebuild_matches_incremental_maintenance() {
  let mut s = store();
  one(&mut s, 40, 100, IngestMode::Event, "A", int(1)).unwrap();
  one(&mut s, 40, 300, IngestMode::Event, "A", int(3)).unwrap();
  one(&mut s, 40, 200, IngestMode::Event, "A", int(2)).unwrap();
  one(&mut s, 41, 100, IngestMode::Observe, "B", text("b")).unwrap();
  one(&mut s, 41, 100, IngestMode::Event, "A", CanonValue::Null).unwrap();

  let incremental = current_rows(&s);
  s.rebuild_current().unwrap();
  assert_eq!(current_rows(&s), incremental);
}

#[test]
fn rebuild_recovers_a_cleared_view() {
  let mut s = store();
  one(&mut s, 42, 100, IngestMode::Observe, "X", int(1)).unwrap();
  one(&mut s, 42, 200, IngestMode::Observe, "X", int(2)).unwrap();

  let before = current_rows(&s);
  s.conn.execute("DELETE FROM current_facts", []).unwrap();
  s.rebuild_current().unwrap();
  assert_eq!(current_rows(&s), before);
}

// ─── Format generations ──────────────────────────────────────────────────────

#[test]
fn fresh_databases_are_stamped_v03() {
  let s = store();
  assert_eq!(s.generation(), FormatGeneration::CURRENT);

  let spec: String = s
    .conn
    .query_row("SELECT v FROM meta WHERE k = 'felix_spec'", [], |row| {
      row.get(0)
    })
    .unwrap();
  assert_eq!(spec, "0.3");
}

#[test]
fn legacy_database_without_metadata_keys_is_honored() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("legacy.db");

  // Simulate a database created before generation metadata existed:
  // tables present, no tag_map / hash_format keys.
  {
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn
      .execute_batch(
        "CREATE TABLE meta (k TEXT PRIMARY KEY, v TEXT NOT NULL);
         CREATE TABLE facts (
           record_id INTEGER NOT NULL,
           field_id  INTEGER NOT NULL,
           value_id  INTEGER NOT NULL,
           ts        INTEGER NOT NULL,
           PRIMARY KEY (record_id, field_id, ts)
         );",
      )
      .unwrap();
  }

  let mut s = SqliteStore::open(&path).unwrap();
  assert_eq!(s.generation(), FormatGeneration::LEGACY);

  // Legacy tag space has no bytes type.
  let err = s.intern_value(&CanonValue::Bytes(vec![1])).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::LegacyUnsupportedType(_))
  ));
}

#[test]
fn reopening_keeps_the_persisted_generation() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("v03.db");

  let id_first;
  {
    let mut s = SqliteStore::open(&path).unwrap();
    id_first = s.intern_value(&int(7)).unwrap();
  }

  let mut s = SqliteStore::open(&path).unwrap();
  assert_eq!(s.generation(), FormatGeneration::CURRENT);
  assert_eq!(s.intern_value(&int(7)).unwrap(), id_first);
}

#[test]
fn unknown_declared_generation_is_refused() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("future.db");

  {
    let s = SqliteStore::open(&path).unwrap();
    s.conn
      .execute(
        "UPDATE meta SET v = 'felix_v99_sep' WHERE k = 'hash_format'",
        [],
      )
      .unwrap();
  }

  let err = SqliteStore::open(&path).unwrap_err();
  assert!(matches!(
    err,
    Error::Core(felix_core::Error::UnknownGeneration { .. })
  ));
}

// ─── Identity over hashes ────────────────────────────────────────────────────

#[test]
fn stored_hash_matches_recomputed_identity_hash() {
  let mut s = store();
  let value = text("Félix");
  let id = s.intern_value(&value).unwrap();

  let stored: Vec<u8> = s
    .conn
    .query_row(
      "SELECT hash FROM f_values WHERE value_id = ?1",
      [id],
      |row| row.get(0),
    )
    .unwrap();

  let expected = value_hash(FormatGeneration::CURRENT, &value).unwrap();
  assert_eq!(stored, expected.to_vec());
}
