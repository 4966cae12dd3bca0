//! Infrastructure layer: I/O implementations, document parsing and DI container
//!
//! This layer implements I/O boundary traits and wires up services.

pub mod di;
pub mod parser;
pub mod traits;
