//! Tests for the Garden index layer
//!
//! These tests verify:
//! - Key ordering and conversion from JSON values
//! - Exact-match search with duplicate keys
//! - Building trees over one or more shards
//! - Field-absent detection
//! - Caching, invalidation and rebuilds in the Garden

use gardendb::garden::{Garden, IndexKey, LocatorTree};
use gardendb::storage::{read_slice, Locator, Record, Shard, TableFiles};
use gardendb::GardenError;
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_files(max_shard_size: u64) -> (TempDir, TableFiles) {
    let temp_dir = TempDir::new().unwrap();
    let files = TableFiles::open(temp_dir.path(), max_shard_size).unwrap();
    (temp_dir, files)
}

fn record(value: serde_json::Value) -> Record {
    value.as_object().unwrap().clone()
}

fn write_shard(files: &TableFiles, table: &str, number: usize, records: Vec<Record>) {
    let shard = Shard {
        number,
        path: files.shard_path(table, number),
    };
    files.write_records(table, &shard, records).unwrap();
}

// =============================================================================
// Key Tests
// =============================================================================

#[test]
fn test_key_ordering_across_types() {
    let mut keys = vec![
        IndexKey::from("b"),
        IndexKey::from_float(1.5),
        IndexKey::Int(7),
        IndexKey::Bool(true),
        IndexKey::Null,
        IndexKey::Bool(false),
        IndexKey::Int(-3),
    ];
    keys.sort();

    assert_eq!(
        keys,
        vec![
            IndexKey::Null,
            IndexKey::Bool(false),
            IndexKey::Bool(true),
            IndexKey::Int(-3),
            IndexKey::Int(7),
            IndexKey::from_float(1.5),
            IndexKey::from("b"),
        ]
    );
}

#[test]
fn test_float_keys_order_numerically() {
    assert!(IndexKey::from_float(-2.0) < IndexKey::from_float(-1.0));
    assert!(IndexKey::from_float(-1.0) < IndexKey::from_float(0.5));
    assert!(IndexKey::from_float(0.5) < IndexKey::from_float(10.25));
}

#[test]
fn test_key_from_json() {
    assert_eq!(IndexKey::from_json(&json!(null)), Some(IndexKey::Null));
    assert_eq!(IndexKey::from_json(&json!(true)), Some(IndexKey::Bool(true)));
    assert_eq!(IndexKey::from_json(&json!(42)), Some(IndexKey::Int(42)));
    assert_eq!(IndexKey::from_json(&json!("42")), Some(IndexKey::from("42")));
    assert_eq!(IndexKey::from_json(&json!(2.5)), Some(IndexKey::from_float(2.5)));
    assert_eq!(IndexKey::from_json(&json!([1, 2])), None);
    assert_eq!(IndexKey::from_json(&json!({"a": 1})), None);
}

#[test]
fn test_integral_float_keys_match_ints() {
    assert_eq!(IndexKey::from_json(&json!(2.0)), Some(IndexKey::Int(2)));
    assert_eq!(IndexKey::from_json(&json!(-7.0)), Some(IndexKey::Int(-7)));
    assert_eq!(IndexKey::from_json(&json!(0.0)), Some(IndexKey::Int(0)));
    assert_eq!(
        IndexKey::from_json(&json!(2.5)),
        Some(IndexKey::from_float(2.5))
    );
    // Past the i64 range stays a float
    assert_eq!(
        IndexKey::from_json(&json!(1e19)),
        Some(IndexKey::from_float(1e19))
    );
}

// =============================================================================
// Tree Tests
// =============================================================================

#[test]
fn test_tree_duplicate_keys_append() {
    let mut tree = LocatorTree::new("city");

    tree.insert(IndexKey::from("Kyiv"), Locator::new(0, 10, 20));
    tree.insert(IndexKey::from("Lviv"), Locator::new(0, 21, 30));
    tree.insert(IndexKey::from("Kyiv"), Locator::new(1, 5, 15));

    assert_eq!(
        tree.search(&IndexKey::from("Kyiv")).unwrap(),
        &[Locator::new(0, 10, 20), Locator::new(1, 5, 15)]
    );
    assert_eq!(tree.key_count(), 2);
    assert_eq!(tree.locator_count(), 3);
    assert_eq!(tree.field(), "city");
}

#[test]
fn test_tree_missing_key_is_none() {
    let mut tree = LocatorTree::new("n");
    tree.insert(IndexKey::Int(1), Locator::new(0, 0, 1));

    assert!(tree.search(&IndexKey::Int(2)).is_none());
    assert!(tree.search(&IndexKey::from("1")).is_none());
}

#[test]
fn test_tree_iterates_in_key_order() {
    let mut tree = LocatorTree::new("n");
    for n in [5, 1, 3] {
        tree.insert(IndexKey::Int(n), Locator::new(0, n as usize, n as usize + 1));
    }

    let keys: Vec<&IndexKey> = tree.iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![&IndexKey::Int(1), &IndexKey::Int(3), &IndexKey::Int(5)]
    );
}

#[test]
fn test_tree_many_sequential_ids() {
    let mut tree = LocatorTree::new("id");
    for id in 1..=1000i64 {
        let start = id as usize * 10;
        tree.insert(IndexKey::from(id), Locator::new(0, start, start + 8));
    }

    for id in [1i64, 2, 499, 500, 999, 1000] {
        let start = id as usize * 10;
        assert_eq!(
            tree.search(&IndexKey::from(id)).unwrap(),
            &[Locator::new(0, start, start + 8)]
        );
    }
    assert!(tree.search(&IndexKey::Int(1001)).is_none());
}

#[test]
fn test_build_over_table_file() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(
        &files,
        "users",
        0,
        vec![
            record(json!({"name": "A", "city": "Kyiv", "id": 1})),
            record(json!({"name": "B", "id": 2})),
            record(json!({"name": "C", "city": "Kyiv", "id": 3})),
            record(json!({"name": "D", "city": ["x"], "id": 4})),
        ],
    );

    let tree = LocatorTree::build(&files, "users", "city").unwrap();

    assert_eq!(tree.records_scanned(), 4);
    assert_eq!(tree.key_count(), 1);
    assert!(!tree.field_absent());

    let bytes = std::fs::read(files.shard_path("users", 0)).unwrap();
    let hits = tree.search(&IndexKey::from("Kyiv")).unwrap();
    assert_eq!(hits.len(), 2);
    for locator in hits {
        let slice = read_slice(&bytes, locator).unwrap();
        let parsed: Record = serde_json::from_slice(slice).unwrap();
        assert_eq!(parsed["city"], "Kyiv");
    }
}

#[test]
fn test_build_spans_shards() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"k": "x", "id": 1}))]);
    write_shard(&files, "t", 1, vec![record(json!({"k": "x", "id": 2}))]);

    let tree = LocatorTree::build(&files, "t", "k").unwrap();

    let shards: Vec<usize> = tree
        .search(&IndexKey::from("x"))
        .unwrap()
        .iter()
        .map(|l| l.shard)
        .collect();
    assert_eq!(shards, vec![0, 1]);
}

#[test]
fn test_build_field_absent() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"a": 1, "id": 1}))]);

    let tree = LocatorTree::build(&files, "t", "missing").unwrap();

    assert!(tree.field_absent());
    assert_eq!(tree.key_count(), 0);
    assert_eq!(tree.records_scanned(), 1);
}

#[test]
fn test_build_aborts_on_malformed_record() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"a": "x{y", "id": 1}))]);

    let result = LocatorTree::build(&files, "t", "a");
    assert!(matches!(result, Err(GardenError::MalformedRecord { .. })));
}

// =============================================================================
// Garden Tests
// =============================================================================

#[test]
fn test_garden_ensure_caches_tree() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"k": 1, "id": 1}))]);

    let mut garden = Garden::new();
    assert!(garden.is_empty());

    garden.ensure(&files, "t", "k").unwrap();
    assert_eq!(garden.len(), 1);

    // A later write is not seen until the tree is dropped
    write_shard(
        &files,
        "t",
        0,
        vec![record(json!({"k": 1, "id": 1})), record(json!({"k": 1, "id": 2}))],
    );
    let tree = garden.ensure(&files, "t", "k").unwrap();
    assert_eq!(tree.locator_count(), 1);

    garden.rebuild(&files, "t", "k").unwrap();
    assert_eq!(garden.get("t", "k").unwrap().locator_count(), 2);
}

#[test]
fn test_garden_keys_trees_per_table() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "a", 0, vec![record(json!({"k": 1, "id": 1}))]);
    write_shard(&files, "b", 0, vec![record(json!({"k": 2, "id": 1}))]);

    let mut garden = Garden::new();
    garden.ensure(&files, "a", "k").unwrap();
    garden.ensure(&files, "b", "k").unwrap();

    assert!(garden.get("a", "k").unwrap().search(&IndexKey::Int(1)).is_some());
    assert!(garden.get("b", "k").unwrap().search(&IndexKey::Int(1)).is_none());
}

#[test]
fn test_garden_invalidate_table() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"k": 1, "j": 2, "id": 1}))]);
    write_shard(&files, "u", 0, vec![record(json!({"k": 1, "id": 1}))]);

    let mut garden = Garden::new();
    garden.ensure(&files, "t", "k").unwrap();
    garden.ensure(&files, "t", "j").unwrap();
    garden.ensure(&files, "u", "k").unwrap();

    assert_eq!(garden.fields("t"), vec!["j", "k"]);

    let dropped = garden.invalidate_table("t");
    assert_eq!(dropped, vec!["j", "k"]);
    assert!(garden.fields("t").is_empty());
    assert_eq!(garden.len(), 1);

    garden.invalidate("u", "k");
    assert!(garden.is_empty());
}

#[test]
fn test_garden_failed_build_leaves_nothing() {
    let (_temp, files) = setup_temp_files(1_000_000);
    write_shard(&files, "t", 0, vec![record(json!({"a": "x{y", "id": 1}))]);

    let mut garden = Garden::new();
    assert!(garden.ensure(&files, "t", "a").is_err());
    assert!(garden.get("t", "a").is_none());
    assert!(garden.is_empty());
}
