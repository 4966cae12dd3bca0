//! Domain-level errors (no external dependencies)

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::factory::BoxError;

/// Domain errors represent violations of the configuration model.
/// These are independent of how documents are read or where symbols live.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("unconfigured")]
    Unconfigured,

    #[error("missing key: {0}")]
    MissingKey(String),

    #[error("node does not belong to this configuration")]
    StaleNode,

    #[error("unresolvable conflict during merge at key '{key}'")]
    MergeConflict { key: String },

    #[error("assigning '{0}' would make the configuration cyclic")]
    CyclicAssignment(String),

    #[error("invalid reference path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("reference path '{path}' passes through unresolved value '{key}'")]
    UnresolvedPath { path: String, key: String },

    #[error("no attribute '{attribute}' on {target}")]
    MissingAttribute { attribute: String, target: String },

    #[error("missing '{param}' argument for {target}")]
    MissingArgument { param: String, target: String },

    #[error("extra arguments {args:?} found for {target}")]
    ExtraArgument { args: Vec<String>, target: String },

    #[error("factory {target} failed: {source}")]
    Construction {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("missing environment variable: {0}")]
    MissingEnvironmentVariable(String),

    #[error("value '{0}' cannot be interpreted as date range")]
    InvalidDuration(String),

    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("invalid tag '!{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("invalid environment lookup '{0}'")]
    InvalidEnvironmentLookup(String),

    #[error("invalid concatenation '{text}': {reason}")]
    InvalidConcatenation { text: String, reason: String },

    #[error("cannot interpolate '{template}': {reason}")]
    Interpolation { template: String, reason: String },

    #[error("reference cycle detected at '{0}'")]
    ReferenceCycle(String),

    #[error("inclusion cycle detected: {0}")]
    InclusionCycle(PathBuf),

    #[error("cycle detected in inheritance chain: {0}")]
    InheritanceCycle(PathBuf),

    #[error("resolution nested deeper than {0} levels")]
    ResolutionDepthExceeded(usize),

    #[error("expected a mapping at '{0}'")]
    NotAMapping(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Failed symbol import, carrying the trail of what could be found.
///
/// Every dotted prefix of the requested name is probed in order; the trail
/// lists the prefixes that exist and stops at the first one that does not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    /// Name as requested (dotted or colon notation)
    pub import_name: String,
    /// Prefixes that resolved to a namespace or symbol
    pub found: Vec<String>,
    /// First prefix that could not be found
    pub missing: String,
}

impl std::error::Error for ImportError {}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cannot import '{}'. Possible reasons are:", self.import_name)?;
        writeln!(f, "- symbol was never registered;")?;
        writeln!(f, "- misspelled namespace or symbol name;")?;
        writeln!(f)?;
        writeln!(f, "Debugged import:")?;
        writeln!(f)?;
        for name in &self.found {
            writeln!(f, "- '{}' found.", name)?;
        }
        write!(f, "- '{}' not found.", self.missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_import_error_when_displayed_then_lists_trail() {
        let err = ImportError {
            import_name: "app.services:Mailer".to_string(),
            found: vec!["app".to_string(), "app.services".to_string()],
            missing: "app.services.Mailer".to_string(),
        };

        let text = err.to_string();

        assert!(text.contains("cannot import 'app.services:Mailer'"));
        assert!(text.contains("- 'app' found."));
        assert!(text.contains("- 'app.services' found."));
        assert!(text.ends_with("- 'app.services.Mailer' not found."));
    }
}
