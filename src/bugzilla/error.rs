use reqwest::StatusCode;
use std::time::Duration;

// -------------------------------------------------------------------------------------------------
// Error
// -------------------------------------------------------------------------------------------------
#[derive(Debug)]
pub enum Error {
    RateLimited {
        /// The duration to wait until trying again, if the server said
        wait: Option<Duration>,
    },

    /// Bugzilla answered with one of its own error codes
    Fault { code: i64, message: String },

    ServerError(StatusCode),
    UnexpectedStatus(StatusCode),
    MissingBug(String),
    DecodeError(serde_json::Error),
    UrlSlashError(String),
    UrlBaseError(String),
    ReqwestError(reqwest::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RateLimited { wait: Some(wait) } => write!(f, "request was rate-limited; retry after {wait:?}"),
            Error::RateLimited { wait: None } => write!(f, "request was rate-limited"),
            Error::Fault { code, message } => write!(f, "Bugzilla error {code}: {message}"),
            Error::ServerError(s) => write!(f, "server error: {s}"),
            Error::UnexpectedStatus(s) => write!(f, "unexpected response status: {s}"),
            Error::MissingBug(id) => write!(f, "response did not include bug {id}"),
            Error::DecodeError(e) => write!(f, "error decoding response: {e}"),
            Error::UrlSlashError(p) => write!(f, "error building URL: component {p:?} contains a slash"),
            Error::UrlBaseError(u) => write!(f, "error building URL: {u:?} cannot be a base URL"),
            Error::ReqwestError(e) => write!(f, "error making request: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DecodeError(e) => Some(e),
            Error::ReqwestError(e) => Some(e),
            _ => None,
        }
    }
}
