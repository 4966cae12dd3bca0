//! CLI-level errors (wraps application errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Application(#[from] ApplicationError),

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::Application(e.into())
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Application(e) => match e {
                ApplicationError::Domain(_) | ApplicationError::Parse { .. } => {
                    crate::exitcode::DATAERR
                }
                ApplicationError::Io { .. } => crate::exitcode::IOERR,
                ApplicationError::Config { .. } => crate::exitcode::CONFIG,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_errors_when_mapped_then_sysexits_codes() {
        let data = CliError::from(ApplicationError::from(DomainError::MissingKey("a".into())));
        let io = CliError::from(ApplicationError::Io {
            context: "read".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        });
        let usage = CliError::Usage("bad".into());

        assert_eq!(data.exit_code(), crate::exitcode::DATAERR);
        assert_eq!(io.exit_code(), crate::exitcode::IOERR);
        assert_eq!(usage.exit_code(), crate::exitcode::USAGE);
    }
}
