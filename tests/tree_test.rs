//! Tests for the configuration tree: mapping operations, merge and paths

use rstest::rstest;

use conftree::domain::{mapping, Configuration, DomainError, Interpolation, Mapping, Value};
use conftree::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn sample() -> Configuration {
    Configuration::from_mapping(mapping([
        ("name", Value::from("app")),
        (
            "db",
            Value::Map(mapping([
                ("host", Value::from("localhost")),
                ("pool", Value::Map(mapping([("size", Value::Int(4))]))),
            ])),
        ),
        ("tags", Value::List(vec![Value::from("a"), Value::from("b")])),
    ]))
}

// ============================================================
// Tree structure
// ============================================================

#[test]
fn given_nested_mapping_when_built_then_children_know_their_parent() {
    let cfg = sample();

    let db = cfg.lookup("db").unwrap().as_node().unwrap();
    let pool = cfg.lookup("db.pool").unwrap().as_node().unwrap();

    assert_eq!(cfg.parent(pool).unwrap(), Some(db));
    assert_eq!(cfg.parent(db).unwrap(), Some(cfg.root()));
    assert_eq!(cfg.root_of(pool).unwrap(), cfg.root());
    assert_eq!(cfg.path_of(pool, "size"), ".db.pool.size");
}

#[test]
fn given_mapping_assigned_when_set_then_attached_as_child() {
    let mut cfg = sample();
    let root = cfg.root();

    cfg.set(root, "cache", Value::Map(mapping([("ttl", Value::Int(60))])))
        .unwrap();

    let cache = cfg.lookup("cache").unwrap().as_node().unwrap();
    assert_eq!(cfg.parent(cache).unwrap(), Some(root));
    assert_eq!(cfg.lookup("cache.ttl").unwrap(), Value::Int(60));
}

#[test]
fn given_node_assigned_below_itself_when_set_then_cyclic_assignment() {
    let mut cfg = sample();
    let db = cfg.lookup("db").unwrap().as_node().unwrap();
    let pool = cfg.lookup("db.pool").unwrap().as_node().unwrap();

    let result = cfg.set(pool, "back", Value::Node(db));

    assert!(matches!(result, Err(DomainError::CyclicAssignment(_))));
}

#[test]
fn given_key_deleted_when_read_then_missing_key() {
    let mut cfg = sample();
    let root = cfg.root();

    let removed = cfg.delete(root, "name").unwrap();

    assert_eq!(removed, Value::from("app"));
    assert!(matches!(cfg.get(root, "name"), Err(DomainError::MissingKey(_))));
    assert_eq!(cfg.keys(root).unwrap(), vec!["db".to_string(), "tags".to_string()]);
}

#[test]
fn given_unconfigured_tree_when_read_then_unconfigured() {
    let cfg = Configuration::unconfigured(Interpolation::new(), "/tmp");

    assert!(!cfg.is_configured(cfg.root()).unwrap());
    assert!(matches!(cfg.get(cfg.root(), "a"), Err(DomainError::Unconfigured)));
}

#[test]
fn given_tree_when_detached_then_plain_nested_mapping() {
    let cfg = sample();

    let detached: Mapping = cfg.to_mapping(cfg.root()).unwrap();

    assert_eq!(
        detached.get("db").and_then(Value::as_map).and_then(|db| db.get("host")),
        Some(&Value::from("localhost"))
    );
}

// ============================================================
// Merge
// ============================================================

#[test]
fn given_overlapping_trees_when_merged_then_deep_merge_with_override() {
    // Arrange
    let base = sample();
    let overrides = Configuration::from_mapping(mapping([
        ("name", Value::from("other")),
        ("db", Value::Map(mapping([("pool", Value::Map(mapping([("size", Value::Int(8))])))]))),
    ]));

    // Act
    let merged = (&base + &overrides).unwrap();

    // Assert
    assert_eq!(merged.lookup("name").unwrap(), Value::from("other"));
    assert_eq!(merged.lookup("db.host").unwrap(), Value::from("localhost"));
    assert_eq!(merged.lookup("db.pool.size").unwrap(), Value::Int(8));
    // inputs untouched
    assert_eq!(base.lookup("db.pool.size").unwrap(), Value::Int(4));
}

#[test]
fn given_lists_when_merged_then_replaced_not_concatenated() {
    let base = sample();
    let overrides = Configuration::from_mapping(mapping([("tags", Value::List(vec![Value::from("z")]))]));

    let merged = base.merge(&overrides).unwrap();

    assert_eq!(merged.lookup("tags").unwrap(), Value::List(vec![Value::from("z")]));
}

#[test]
fn given_mapping_over_scalar_when_merged_then_merge_conflict() {
    let base = sample();
    let overrides = Configuration::from_mapping(mapping([(
        "name",
        Value::Map(mapping([("first", Value::from("x"))])),
    )]));

    let result = base.merge(&overrides);

    assert!(matches!(result, Err(DomainError::MergeConflict { ref key }) if key == "name"));
}

#[test]
fn given_empty_override_when_merged_then_equal_to_base() {
    let base = sample();
    let empty = Configuration::from_mapping(Mapping::new());

    let merged = base.merge(&empty).unwrap();

    assert_eq!(
        merged.to_mapping(merged.root()).unwrap(),
        base.to_mapping(base.root()).unwrap()
    );
}

#[test]
fn given_override_merged_twice_when_compared_then_second_merge_changes_nothing() {
    // Arrange
    let base = sample();
    let overrides = Configuration::from_mapping(mapping([
        ("name", Value::from("other")),
        ("db", Value::Map(mapping([("port", Value::Int(5432))]))),
    ]));
    let once = base.merge(&overrides).unwrap();

    // Act
    let twice = once.merge(&overrides).unwrap();

    // Assert
    assert_eq!(
        twice.to_mapping(twice.root()).unwrap(),
        once.to_mapping(once.root()).unwrap()
    );
}

// ============================================================
// Paths
// ============================================================

#[rstest]
#[case("name", Value::from("app"))]
#[case("db.host", Value::from("localhost"))]
#[case("db.pool.size", Value::Int(4))]
#[case("tags.1", Value::from("b"))]
fn given_absolute_path_when_read_then_value(#[case] path: &str, #[case] expected: Value) {
    let cfg = sample();

    assert_eq!(cfg.lookup(path).unwrap(), expected);
}

#[rstest]
#[case(".host", Value::from("localhost"))]
#[case(".pool.size", Value::Int(4))]
#[case("..name", Value::from("app"))]
#[case("name", Value::from("app"))]
fn given_path_relative_to_node_when_read_then_value(#[case] path: &str, #[case] expected: Value) {
    let cfg = sample();
    let db = cfg.lookup("db").unwrap().as_node().unwrap();

    assert_eq!(cfg.read_ref(db, path).unwrap(), expected);
}

#[rstest]
#[case("")]
#[case(".")]
#[case("db.")]
#[case("...name")]
fn given_malformed_path_when_read_then_invalid_path(#[case] path: &str) {
    let cfg = sample();
    let db = cfg.lookup("db").unwrap().as_node().unwrap();

    assert!(matches!(cfg.read_ref(db, path), Err(DomainError::InvalidPath { .. })));
}

#[test]
fn given_path_when_written_by_reference_then_slot_updated() {
    let mut cfg = sample();
    let root = cfg.root();

    let stored = cfg.by_ref(root, "db.host", Some(Value::from("db.internal"))).unwrap();

    assert_eq!(stored, Value::from("db.internal"));
    assert_eq!(cfg.lookup("db.host").unwrap(), Value::from("db.internal"));
}
