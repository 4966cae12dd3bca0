//! Tests for LoaderService and file-level placeholders (include, extends)

use std::path::PathBuf;

use tempfile::TempDir;

use conftree::application::{ApplicationError, Registry};
use conftree::config::Settings;
use conftree::domain::{DomainError, Interpolation, Value};
use conftree::infrastructure::di::ServiceContainer;
use conftree::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

/// Helper to create a document in the temp dir
fn write_doc(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create doc dir");
    }
    std::fs::write(&path, content).expect("write doc");
    path
}

fn container() -> ServiceContainer {
    ServiceContainer::new(Settings::default(), Registry::new())
}

fn domain_error<T>(result: Result<T, ApplicationError>) -> DomainError {
    match result {
        Err(ApplicationError::Domain(e)) => e,
        Err(other) => panic!("expected a domain error, got {other}"),
        Ok(_) => panic!("expected a domain error"),
    }
}

// ============================================================
// Whole-document inheritance
// ============================================================

#[test]
fn given_document_extending_base_when_configured_then_overrides_merged_over_base() {
    // Arrange
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "base.yaml", "a: 1\nnested:\n  x: 1\n  y: 2\n");
    let child = write_doc(
        &temp,
        "child.yaml",
        "--- !extends:base.yaml\nb: 2\nnested:\n  y: 3\n",
    );

    // Act
    let cfg = container().configure_file(&child, Interpolation::new()).unwrap();

    // Assert
    assert_eq!(cfg.lookup("a").unwrap(), Value::Int(1));
    assert_eq!(cfg.lookup("b").unwrap(), Value::Int(2));
    assert_eq!(cfg.lookup("nested.x").unwrap(), Value::Int(1));
    assert_eq!(cfg.lookup("nested.y").unwrap(), Value::Int(3));
}

#[test]
fn given_extending_document_when_loaded_then_inheritance_stays_pending() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "base.yaml", "a: 1\n");
    let child = write_doc(&temp, "child.yaml", "--- !extends:base.yaml\nb: 2\n");

    let cfg = container()
        .loader
        .load_from_file(&child, Interpolation::new())
        .unwrap();

    let extends = cfg.pending_extends(cfg.root()).unwrap().unwrap();
    assert_eq!(extends.filename, "base.yaml");
    assert_eq!(cfg.lookup("b").unwrap(), Value::Int(2));
}

#[test]
fn given_chain_of_bases_when_configured_then_all_levels_merged() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "root.yaml", "level: root\nfrom_root: true\n");
    write_doc(&temp, "mid.yaml", "--- !extends:root.yaml\nlevel: mid\nfrom_mid: true\n");
    let leaf = write_doc(&temp, "leaf.yaml", "--- !extends:mid.yaml\nlevel: leaf\n");

    let cfg = container().configure_file(&leaf, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("level").unwrap(), Value::from("leaf"));
    assert_eq!(cfg.lookup("from_root").unwrap(), Value::Bool(true));
    assert_eq!(cfg.lookup("from_mid").unwrap(), Value::Bool(true));
}

#[test]
fn given_legacy_extends_key_when_loaded_then_base_merged_and_key_removed() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "base.yaml", "a: 1\nb: 1\n");
    let child = write_doc(&temp, "child.yaml", "extends: base.yaml\nb: 2\n");

    let cfg = container().configure_file(&child, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("a").unwrap(), Value::Int(1));
    assert_eq!(cfg.lookup("b").unwrap(), Value::Int(2));
    assert!(!cfg.contains(cfg.root(), "extends").unwrap());
}

#[test]
fn given_legacy_extends_with_deferred_values_when_configured_then_base_values_resolved() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "base.conf", "a: 1\nb: !timedelta 1d\n");
    let child = write_doc(&temp, "child.conf", "extends: base.conf\na: 100\n");

    let cfg = container().configure_file(&child, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("a").unwrap(), Value::Int(100));
    assert_eq!(cfg.lookup("b").unwrap().as_duration(), chrono::Duration::try_days(1));
}

#[test]
fn given_legacy_key_disabled_when_loaded_then_key_kept_as_data() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(&temp, "doc.yaml", "extends: base.yaml\n");
    let settings = Settings {
        legacy_extends_key: false,
        ..Settings::default()
    };
    let container = ServiceContainer::new(settings, Registry::new());

    let cfg = container.configure_file(&doc, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("extends").unwrap(), Value::from("base.yaml"));
}

#[test]
fn given_documents_extending_each_other_when_configured_then_inheritance_cycle() {
    let temp = TempDir::new().unwrap();
    let a = write_doc(&temp, "a.yaml", "--- !extends:b.yaml\nx: 1\n");
    write_doc(&temp, "b.yaml", "--- !extends:a.yaml\ny: 1\n");

    let err = domain_error(container().configure_file(&a, Interpolation::new()));

    assert!(matches!(err, DomainError::InheritanceCycle(_)));
}

#[test]
fn given_nested_slot_inheriting_from_its_own_file_when_configured_then_inheritance_cycle() {
    let temp = TempDir::new().unwrap();
    let a = write_doc(&temp, "a.yaml", "sub: !include:a.yaml\n  k: 1\n");

    let err = domain_error(container().configure_file(&a, Interpolation::new()));

    assert!(matches!(err, DomainError::InheritanceCycle(ref path) if path.ends_with("a.yaml")));
}

#[test]
fn given_nested_slots_inheriting_from_each_other_when_configured_then_inheritance_cycle() {
    let temp = TempDir::new().unwrap();
    let a = write_doc(&temp, "a.yaml", "sub: !extends:b.yaml\n  k: 1\n");
    write_doc(&temp, "b.yaml", "inner: !extends:a.yaml\n  j: 1\n");

    let err = domain_error(container().configure_file(&a, Interpolation::new()));

    assert!(matches!(err, DomainError::InheritanceCycle(_)));
}

#[test]
fn given_nested_slot_extending_sibling_file_when_configured_then_merged() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "defaults.yaml", "retries: 3\ntimeout: 10\n");
    let main = write_doc(
        &temp,
        "main.yaml",
        "http: !extends:defaults.yaml\n  timeout: 30\ngrpc: !extends:defaults.yaml\n",
    );

    let cfg = container().configure_file(&main, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("http.retries").unwrap(), Value::Int(3));
    assert_eq!(cfg.lookup("http.timeout").unwrap(), Value::Int(30));
    assert_eq!(cfg.lookup("grpc.timeout").unwrap(), Value::Int(10));
}

// ============================================================
// Include
// ============================================================

#[test]
fn given_include_when_configured_then_document_embedded() {
    // Arrange
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "conf/db.yaml", "host: localhost\nport: 5432\nurl: !ref:.host\n");
    let main = write_doc(&temp, "main.yaml", "db: !include:conf/db.yaml\nhost: !ref:db.host\n");

    // Act
    let cfg = container().configure_file(&main, Interpolation::new()).unwrap();

    // Assert
    assert_eq!(cfg.lookup("db.port").unwrap(), Value::Int(5432));
    assert_eq!(cfg.lookup("db.url").unwrap(), Value::from("localhost"));
    assert_eq!(cfg.lookup("host").unwrap(), Value::from("localhost"));
}

#[test]
fn given_included_document_when_configured_then_pwd_is_its_directory() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "conf/paths.yaml", "data: \"%(pwd)s/data\"\n");
    let main = write_doc(&temp, "main.yaml", "paths: !include:conf/paths.yaml\n");

    let cfg = container().configure_file(&main, Interpolation::new()).unwrap();

    let expected = format!("{}/data", temp.path().join("conf").display());
    assert_eq!(cfg.lookup("paths.data").unwrap(), Value::from(expected));
}

#[test]
fn given_include_with_overrides_when_configured_then_overrides_win() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "db.yaml", "host: localhost\nport: 5432\n");
    let main = write_doc(&temp, "main.yaml", "db: !include:db.yaml\n  port: 6543\n");

    let cfg = container().configure_file(&main, Interpolation::new()).unwrap();

    assert_eq!(cfg.lookup("db.host").unwrap(), Value::from("localhost"));
    assert_eq!(cfg.lookup("db.port").unwrap(), Value::Int(6543));
}

#[test]
fn given_empty_included_document_when_configured_then_empty_mapping() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "empty.yaml", "");
    let main = write_doc(&temp, "main.yaml", "section: !include:empty.yaml\n");

    let cfg = container().configure_file(&main, Interpolation::new()).unwrap();

    let section = cfg.lookup("section").unwrap().as_node().unwrap();
    assert!(cfg.is_empty(section).unwrap());
}

#[test]
fn given_documents_including_each_other_when_configured_then_inclusion_cycle() {
    let temp = TempDir::new().unwrap();
    let a = write_doc(&temp, "a.yaml", "x: !include:b.yaml\n");
    write_doc(&temp, "b.yaml", "y: !include:a.yaml\n");

    let err = domain_error(container().configure_file(&a, Interpolation::new()));

    assert!(matches!(err, DomainError::InclusionCycle(_)));
}

#[test]
fn given_interpolation_context_when_included_then_context_inherited() {
    let temp = TempDir::new().unwrap();
    write_doc(&temp, "svc.yaml", "name: svc-%(env)s\n");
    let main = write_doc(&temp, "main.yaml", "svc: !include:svc.yaml\n");
    let context = Interpolation::from([("env".to_string(), "test".to_string())]);

    let cfg = container().configure_file(&main, context).unwrap();

    assert_eq!(cfg.lookup("svc.name").unwrap(), Value::from("svc-test"));
}

// ============================================================
// Failures
// ============================================================

#[test]
fn given_missing_file_when_loaded_then_io_error() {
    let temp = TempDir::new().unwrap();

    let result = container().configure_file(&temp.path().join("absent.yaml"), Interpolation::new());

    assert!(matches!(result, Err(ApplicationError::Io { .. })));
}

#[test]
fn given_missing_include_when_configured_then_io_error() {
    let temp = TempDir::new().unwrap();
    let main = write_doc(&temp, "main.yaml", "x: !include:absent.yaml\n");

    let result = container().configure_file(&main, Interpolation::new());

    assert!(matches!(result, Err(ApplicationError::Io { .. })));
}

#[test]
fn given_malformed_yaml_when_loaded_then_parse_error_names_file() {
    let temp = TempDir::new().unwrap();
    let doc = write_doc(&temp, "bad.yaml", "a: [1, 2\n");

    let result = container().configure_file(&doc, Interpolation::new());

    match result {
        Err(ApplicationError::Parse { origin, .. }) => assert!(origin.ends_with("bad.yaml")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected a parse error"),
    }
}
