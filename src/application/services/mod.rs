//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, Environment)
//! but are themselves concrete structs, not traits.

mod loader;
mod resolver;

pub use loader::{LoaderService, TagHandler, TagHandlers};
pub use resolver::ResolverService;
