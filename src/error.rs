//! Error kinds raised while talking to the extranet.
//!
//! Every failure of a session operation is one of the variants of [`Error`].
//! The command-line front end maps each kind to a distinct process exit code
//! (see [`Error::exit_code`]) so scripts and panel widgets can tell a wrong
//! password apart from a network outage.

use reqwest::StatusCode;
use std::process::ExitCode;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code for any failure without a more specific code.
pub const EXIT_GENERIC: u8 = 3;
/// Exit code when the extranet cannot be reached at all.
pub const EXIT_CONNECTION: u8 = 4;
/// Exit code when the extranet answers with something other than HTTP 200.
pub const EXIT_HTTP_STATUS: u8 = 5;
/// Exit code when the username/password pair is rejected.
pub const EXIT_BAD_CREDENTIALS: u8 = 6;
/// Exit code when the extranet drops the session in the middle of a query.
pub const EXIT_UNEXPECTED_LOGOUT: u8 = 7;

#[derive(Debug, Error)]
pub enum Error {
    /// DNS failure, refused connection or timeout.
    #[error("unable to reach the extranet: {0}")]
    Connection(#[source] reqwest::Error),

    /// Any other transport-level failure.
    #[error("an error occurred while querying the extranet: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Reaching '{url}' returned this status code: {} {}", .status.as_u16(), .status.canonical_reason().unwrap_or(""))]
    HttpStatus { url: String, status: StatusCode },

    #[error("the username or the password is invalid")]
    BadCredentials,

    #[error("the extranet unexpectedly logged out the session")]
    UnexpectedLogout,

    #[error("the session is not connected to the extranet")]
    NotConnected,

    #[error("no login form found on the extranet page: {0}")]
    LoginFormNotFound(&'static str),

    #[error("'{0}' not found on the page")]
    DataNotFound(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot serialize the report: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Error::Connection(e)
        } else {
            Error::Http(e)
        }
    }
}

impl Error {
    /// Process exit code reported by the CLI for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Connection(_) => EXIT_CONNECTION,
            Error::HttpStatus { .. } => EXIT_HTTP_STATUS,
            Error::BadCredentials => EXIT_BAD_CREDENTIALS,
            Error::UnexpectedLogout => EXIT_UNEXPECTED_LOGOUT,
            _ => EXIT_GENERIC,
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(e: &Error) -> Self {
        ExitCode::from(e.exit_code())
    }
}
