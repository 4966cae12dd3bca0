//! Tests for Settings environment overrides
//!
//! Kept in its own test binary: it mutates the process environment.

use conftree::config::Settings;

#[test]
fn given_prefixed_environment_variables_when_loading_then_override_defaults() {
    // Arrange
    std::env::set_var("CONFTREE_MAX_DEPTH", "7");
    std::env::set_var("CONFTREE_IMPLICIT_CONCAT", "false");

    // Act
    let settings = Settings::load(None).expect("load settings");

    // Assert
    assert_eq!(settings.max_depth, 7);
    assert!(!settings.implicit_concat);
    assert!(settings.implicit_env);

    std::env::remove_var("CONFTREE_MAX_DEPTH");
    std::env::remove_var("CONFTREE_IMPLICIT_CONCAT");
}
