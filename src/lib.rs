//! conftree: declarative YAML configuration trees
//!
//! A document is parsed into a tree of mappings whose values may be
//! placeholders: references to other paths, factory calls, imports of
//! registered objects, included or inherited files, environment lookups
//! and a few typed scalars. [`ServiceContainer::configure_file`] loads a
//! document and resolves every placeholder in place.
//!
//! Layers:
//! - `domain`: the tree, values, placeholders, merge and path rules
//! - `application`: loading, inheritance, the registry and resolution
//! - `infrastructure`: YAML parsing, I/O boundaries and wiring
//! - `cli`: the `conftree` command

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;

pub use application::{ApplicationError, ApplicationResult, Registry};
pub use config::Settings;
pub use domain::{Configuration, DomainError, FactorySpec, Mapping, Value};
pub use infrastructure::di::ServiceContainer;
