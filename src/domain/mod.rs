//! Domain layer: the configuration model and its algebra
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod error;
pub mod factory;
pub mod interpolate;
pub mod merge;
pub mod path;
pub mod placeholder;
pub mod tree;
pub mod value;

pub use arena::{Interpolation, NodeId};
pub use error::{DomainError, DomainResult, ImportError};
pub use factory::{Args, BoxError, FactorySpec, Param};
pub use path::Target;
pub use placeholder::{ConcatPart, EnvDefault, EnvLookup, Extends, Factory, FactoryTarget, Placeholder};
pub use tree::{Configuration, NodeRef};
pub use value::{mapping, Component, Mapping, Object, Value};
