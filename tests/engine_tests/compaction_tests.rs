//! Tests for soft deletes and compaction
//!
//! These tests verify:
//! - Deleted records are hidden but stay on disk until compaction
//! - The shared delete counter and threshold-triggered compaction
//! - Single-table flush
//! - Indexes after compaction
//! - DeleteManager and compact_table on their own

use std::collections::BTreeSet;
use std::fs;

use gardendb::compaction::{compact_table, DeleteManager};
use gardendb::config::Config;
use gardendb::engine::Engine;
use gardendb::storage::{Shard, TableFiles};
use gardendb::{Condition, GardenError, MissReason, Record};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_engine(flush_threshold: usize) -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .flush_threshold(flush_threshold)
        .build();
    let engine = Engine::open(config).unwrap();
    (temp_dir, engine)
}

fn record(value: Value) -> Record {
    value.as_object().unwrap().clone()
}

fn cond(text: &str) -> Condition {
    Condition::parse(text).unwrap()
}

fn by_id(id: u64) -> Condition {
    cond(&format!(r#""id" == {}"#, id))
}

fn fill(engine: &Engine, table: &str, count: usize) {
    for i in 0..count {
        engine
            .insert(table, record(json!({"name": format!("r{}", i)})))
            .unwrap();
    }
}

/// Ids present in the primary shard file
fn ids_on_disk(engine: &Engine, table: &str) -> Vec<u64> {
    let path = engine.data_dir().join(format!("{}.json", table));
    let root: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    root[table]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect()
}

// =============================================================================
// Soft Delete Tests
// =============================================================================

#[test]
fn test_deleted_record_is_hidden_but_kept_on_disk() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 3);

    engine.delete("t", &by_id(2)).unwrap();

    match engine.select("t", &by_id(2)) {
        Err(GardenError::NotFound { reason, .. }) => assert_eq!(reason, MissReason::AllDeleted),
        other => panic!("expected NotFound, got {:?}", other),
    }
    assert_eq!(engine.select("t", &by_id(1)).unwrap().len(), 1);

    assert_eq!(ids_on_disk(&engine, "t"), vec![1, 2, 3]);
    assert_eq!(engine.pending_deletes("t"), vec![2]);
    assert_eq!(engine.delete_counter(), 1);
}

#[test]
fn test_delete_twice_is_not_found_and_keeps_counter() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 3);

    engine.delete("t", &by_id(2)).unwrap();
    let again = engine.delete("t", &by_id(2));

    assert!(matches!(
        again,
        Err(GardenError::NotFound {
            reason: MissReason::AllDeleted,
            ..
        })
    ));
    assert_eq!(engine.delete_counter(), 1);
}

#[test]
fn test_delete_marks_every_match() {
    let (_temp, engine) = setup_temp_engine(10);
    for _ in 0..3 {
        engine.insert("t", record(json!({"g": "x"}))).unwrap();
    }
    engine.insert("t", record(json!({"g": "y"}))).unwrap();

    engine.delete("t", &cond(r#""g" == "x""#)).unwrap();

    assert_eq!(engine.pending_deletes("t"), vec![1, 2, 3]);
    assert_eq!(engine.delete_counter(), 3);
    assert!(engine.select("t", &cond(r#""g" == "x""#)).is_err());
    assert_eq!(engine.select("t", &cond(r#""g" == "y""#)).unwrap().len(), 1);
}

#[test]
fn test_delete_not_found_reasons() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 1);

    assert!(matches!(
        engine.delete("t", &by_id(9)),
        Err(GardenError::NotFound {
            reason: MissReason::NoMatch,
            ..
        })
    ));
    assert!(matches!(
        engine.delete("t", &cond(r#""missing" == 1"#)),
        Err(GardenError::NotFound {
            reason: MissReason::FieldAbsent,
            ..
        })
    ));
    assert_eq!(engine.delete_counter(), 0);
}

#[test]
fn test_update_skips_deleted_records() {
    let (_temp, engine) = setup_temp_engine(5);
    for _ in 0..2 {
        engine.insert("t", record(json!({"g": "x"}))).unwrap();
    }
    engine.delete("t", &by_id(1)).unwrap();

    engine
        .update("t", &cond(r#""g" == "x""#), &record(json!({"touched": true})))
        .unwrap();

    let path = engine.data_dir().join("t.json");
    let root: Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
    assert!(root["t"][0].get("touched").is_none());
    assert_eq!(root["t"][1]["touched"], true);
}

// =============================================================================
// Threshold Compaction Tests
// =============================================================================

#[test]
fn test_threshold_compacts_every_pending_table() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 3);
    fill(&engine, "u", 5);

    engine.delete("t", &by_id(2)).unwrap();
    for id in 1..=3 {
        engine.delete("u", &by_id(id)).unwrap();
    }

    // Four marks: nothing compacted yet
    assert_eq!(engine.delete_counter(), 4);
    assert_eq!(ids_on_disk(&engine, "t"), vec![1, 2, 3]);
    assert_eq!(ids_on_disk(&engine, "u"), vec![1, 2, 3, 4, 5]);

    // Fifth mark reaches the threshold
    engine.delete("u", &by_id(4)).unwrap();

    assert_eq!(engine.delete_counter(), 0);
    assert_eq!(ids_on_disk(&engine, "t"), vec![1, 3]);
    assert_eq!(ids_on_disk(&engine, "u"), vec![5]);
    assert!(engine.pending_deletes("t").is_empty());
    assert!(engine.pending_deletes("u").is_empty());

    // Compacted ids are gone, not merely hidden
    assert!(matches!(
        engine.select("u", &by_id(4)),
        Err(GardenError::NotFound {
            reason: MissReason::NoMatch,
            ..
        })
    ));
}

#[test]
fn test_multi_record_delete_compacts_once() {
    let (_temp, engine) = setup_temp_engine(2);
    for _ in 0..3 {
        engine.insert("t", record(json!({"g": "x"}))).unwrap();
    }
    engine.insert("t", record(json!({"g": "y"}))).unwrap();

    engine.delete("t", &cond(r#""g" == "x""#)).unwrap();

    assert_eq!(ids_on_disk(&engine, "t"), vec![4]);
    assert_eq!(engine.delete_counter(), 0);
}

#[test]
fn test_next_id_after_compaction() {
    let (_temp, engine) = setup_temp_engine(1);
    fill(&engine, "t", 3);

    engine.delete("t", &by_id(2)).unwrap();
    assert_eq!(ids_on_disk(&engine, "t"), vec![1, 3]);
    assert_eq!(engine.insert("t", record(json!({}))).unwrap(), 4);

    // Removing the highest id frees it for the next insert
    engine.delete("t", &by_id(4)).unwrap();
    assert_eq!(engine.insert("t", record(json!({}))).unwrap(), 4);
}

#[test]
fn test_indexes_rebuilt_after_compaction() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 4);
    engine.create_index("t", &["name".to_string()]).unwrap();

    engine.delete("t", &by_id(1)).unwrap();
    assert_eq!(engine.indexed_fields("t"), vec!["id", "name"]);

    engine.flush("t").unwrap();

    assert_eq!(engine.indexed_fields("t"), vec!["id", "name"]);
    // Locators now point into the rewritten file
    let found = engine.select("t", &cond(r#""name" == "r3""#)).unwrap();
    assert_eq!(found[0]["id"], 4);
    assert_eq!(engine.select("t", &by_id(2)).unwrap()[0]["name"], "r1");
}

// =============================================================================
// Flush Tests
// =============================================================================

#[test]
fn test_flush_compacts_single_table() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 3);
    fill(&engine, "u", 3);

    engine.delete("t", &by_id(2)).unwrap();
    engine.delete("u", &by_id(1)).unwrap();
    assert_eq!(engine.delete_counter(), 2);

    engine.flush("t").unwrap();

    assert_eq!(ids_on_disk(&engine, "t"), vec![1, 3]);
    assert_eq!(ids_on_disk(&engine, "u"), vec![1, 2, 3]);
    assert_eq!(engine.pending_deletes("u"), vec![1]);
    assert_eq!(engine.delete_counter(), 1);
}

#[test]
fn test_flush_without_pending_deletes() {
    let (_temp, engine) = setup_temp_engine(5);
    fill(&engine, "t", 2);

    let path = engine.data_dir().join("t.json");
    let before = fs::read(&path).unwrap();

    engine.flush("t").unwrap();

    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn test_flush_missing_table() {
    let (_temp, engine) = setup_temp_engine(5);

    assert!(matches!(
        engine.flush("ghost"),
        Err(GardenError::TableMissing(_))
    ));
}

#[test]
fn test_failed_flush_drops_indexes_and_keeps_marks() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .max_shard_size(200)
        .flush_threshold(100)
        .build();
    let engine = Engine::open(config).unwrap();

    fill(&engine, "t", 12);
    let paths = engine.shard_paths("t").unwrap();
    assert!(paths.len() > 1);

    engine.delete("t", &by_id(1)).unwrap();
    engine.delete("t", &by_id(12)).unwrap();
    assert_eq!(engine.indexed_fields("t"), vec!["id"]);

    // Block the last shard so its rewrite fails after the first one lands
    let blocker = paths[paths.len() - 1].with_extension("json.tmp");
    fs::create_dir(&blocker).unwrap();

    assert!(engine.flush("t").is_err());
    assert!(engine.indexed_fields("t").is_empty());
    assert_eq!(engine.pending_deletes("t"), vec![1, 12]);
    assert!(!ids_on_disk(&engine, "t").contains(&1));

    // Lookups rebuild from the rewritten files
    let found = engine.select("t", &by_id(2)).unwrap();
    assert_eq!(found[0]["name"], "r1");

    fs::remove_dir(&blocker).unwrap();
    engine.flush("t").unwrap();

    assert!(engine.pending_deletes("t").is_empty());
    let found = engine.select("t", &by_id(11)).unwrap();
    assert_eq!(found[0]["name"], "r10");
    assert!(engine.select("t", &by_id(12)).unwrap_err().is_not_found());
}

// =============================================================================
// DeleteManager Tests
// =============================================================================

#[test]
fn test_delete_manager_counts_fresh_marks() {
    let mut deletes = DeleteManager::new(3);

    assert!(deletes.mark("t", 1));
    assert!(deletes.mark("t", 2));
    assert!(!deletes.mark("t", 2));
    assert!(deletes.mark("u", 2));

    assert_eq!(deletes.counter(), 3);
    assert!(deletes.should_compact());
    assert!(deletes.is_marked("u", 2));
    assert!(!deletes.is_marked("u", 1));
    assert_eq!(deletes.pending("t"), 2);
    assert_eq!(deletes.pending_tables(), vec!["t", "u"]);
}

#[test]
fn test_delete_manager_clear_and_discount() {
    let mut deletes = DeleteManager::new(10);
    deletes.mark("t", 1);
    deletes.mark("t", 2);
    deletes.mark("u", 1);

    assert_eq!(deletes.clear("t"), 2);
    assert_eq!(deletes.clear("missing"), 0);
    assert_eq!(deletes.pending_tables(), vec!["u"]);

    deletes.discount(2);
    assert_eq!(deletes.counter(), 1);
    deletes.discount(5);
    assert_eq!(deletes.counter(), 0);

    deletes.mark("u", 2);
    deletes.reset_counter();
    assert_eq!(deletes.counter(), 0);
    assert_eq!(deletes.pending("u"), 2);
    assert_eq!(deletes.threshold(), 10);
}

// =============================================================================
// compact_table Tests
// =============================================================================

#[test]
fn test_compact_table_rewrites_only_affected_shards() {
    let temp_dir = TempDir::new().unwrap();
    let files = TableFiles::open(temp_dir.path(), 1_000_000).unwrap();

    for (number, ids) in [(0usize, [1u64, 2]), (1, [3, 4])] {
        let shard = Shard {
            number,
            path: files.shard_path("t", number),
        };
        let records = ids.iter().map(|id| record(json!({"id": id}))).collect();
        files.write_records("t", &shard, records).unwrap();
    }

    let untouched = fs::read(files.shard_path("t", 1)).unwrap();
    let stats = compact_table(&files, "t", &BTreeSet::from([1, 2])).unwrap();

    assert_eq!(stats.shards_rewritten, 1);
    assert_eq!(stats.records_removed, 2);
    assert_eq!(fs::read(files.shard_path("t", 1)).unwrap(), untouched);

    let primary = Shard {
        number: 0,
        path: files.shard_path("t", 0),
    };
    assert!(files.read_records("t", &primary).unwrap().is_empty());
}

#[test]
fn test_compact_table_with_unknown_ids() {
    let temp_dir = TempDir::new().unwrap();
    let files = TableFiles::open(temp_dir.path(), 1_000_000).unwrap();
    let shard = Shard {
        number: 0,
        path: files.shard_path("t", 0),
    };
    files
        .write_records("t", &shard, vec![record(json!({"id": 1}))])
        .unwrap();

    let stats = compact_table(&files, "t", &BTreeSet::from([7, 8])).unwrap();

    assert_eq!(stats.shards_rewritten, 0);
    assert_eq!(stats.records_removed, 0);
}
