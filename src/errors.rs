//! Error types module
//!
//! Defines the error taxonomy for the tool:
//! - RestError: transport vs. protocol failures against the remote API
//! - DbError: database failures, including the too-many-rows guard
//! - CountError: fatal, run-terminating failures surfaced to the operator
//!
//! Per-record failures (identifier resolution, hostname resolution, one
//! domain lookup) are not represented here; they are recovered inline
//! with a documented fallback and a log entry.

use crate::models::ApiError;
use thiserror::Error;

/// Failure of a single REST call against the remote search API
#[derive(Debug, Error)]
pub enum RestError {
    /// Network/connection failure or a response body that could not be
    /// decoded at all
    #[error("Error connecting to API: {0}")]
    Transport(String),
    /// Non-success HTTP status, carrying the structured error payload
    /// when the server provided one
    #[error("{}", .0.message())]
    Api(ApiError),
}

impl RestError {
    /// HTTP status code, when the failure was a protocol error
    pub fn response_code(&self) -> Option<u16> {
        match self {
            RestError::Transport(_) => None,
            RestError::Api(error) => error.response_code(),
        }
    }
}

/// Failure of a single database operation
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Postgres(#[from] postgres::Error),
    #[error("Too many rows returned")]
    TooManyRows,
}

/// Failure of an asynchronous search, wrapping the REST failure or the
/// poll ceiling being exceeded
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Rest(#[from] RestError),
    #[error("search {search_id} did not complete after {polls} polls")]
    TimedOut { search_id: String, polls: u32 },
    #[error("search interrupted")]
    Interrupted,
}

/// Fatal failures that abort the run. Each maps to a single user-facing
/// line and exit code 1, except `Interrupted` which prints a short
/// cancellation message.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("Unable to connect to the database")]
    DatabaseConnection(#[source] postgres::Error),
    #[error("Unable to retrieve log sources from the database, Reason [{0}]")]
    LogSourceRetrieval(DbError),
    #[error("Unable to retrieve domain count from the database, {0}")]
    DomainCountRetrieval(String),
    #[error("Unable to retrieve domain information. ERROR {0}")]
    DomainRetrieval(String),
    #[error("Unable to perform windows workstation check. ERROR {0}")]
    WindowsWorkstationRetrieval(String),
    #[error("{0}")]
    Validation(String),
    #[error("Unable to run myver, Reason [{0}]")]
    MyVer(String),
    #[error("Unable to write results, Reason [{0}]")]
    Report(#[from] std::io::Error),
    #[error("interrupted by operator")]
    Interrupted,
}
