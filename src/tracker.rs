use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::issue_id::IssueId;

// -------------------------------------------------------------------------------------------------
// Visibility
// -------------------------------------------------------------------------------------------------
/// Whether a security-related issue is publicly readable in the tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,

    /// The tracker denied access to the issue; trackers restrict access to undisclosed
    /// security issues
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            s => anyhow::bail!("invalid visibility {s:?}"),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// -------------------------------------------------------------------------------------------------
// Verdict
// -------------------------------------------------------------------------------------------------
/// The tracker's classification of one issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    NotSecurity,
    Security(Visibility),
}

impl Verdict {
    pub fn is_security(&self) -> bool {
        matches!(self, Verdict::Security(_))
    }

    pub fn visibility(&self) -> Option<Visibility> {
        match self {
            Verdict::NotSecurity => None,
            Verdict::Security(v) => Some(*v),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::NotSecurity => write!(f, "not security-related"),
            Verdict::Security(v) => write!(f, "security-related ({v})"),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// TrackerError
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug, thiserror::Error)]
pub enum TrackerError {
    /// A failure that may go away when the query is repeated, e.g., a network or server error
    #[error("transient tracker error: {message}")]
    Transient {
        message: String,

        /// How long the tracker asked us to wait before trying again, if it said
        retry_after: Option<Duration>,
    },

    /// The tracker rejected the query itself, e.g., because the issue does not exist
    #[error("permanent tracker error: {message}")]
    Permanent { message: String },
}

impl TrackerError {
    pub fn transient<S: Into<String>>(message: S) -> Self {
        TrackerError::Transient { message: message.into(), retry_after: None }
    }

    pub fn permanent<S: Into<String>>(message: S) -> Self {
        TrackerError::Permanent { message: message.into() }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, TrackerError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TrackerError::Transient { retry_after, .. } => *retry_after,
            TrackerError::Permanent { .. } => None,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Tracker
// -------------------------------------------------------------------------------------------------
/// An external issue tracker that can classify issues as security-related.
///
/// Implementations make exactly one query per call and do no retrying of their own; pacing and
/// retries are the caller's responsibility.
pub trait Tracker {
    fn classify(&mut self, id: &IssueId) -> Result<Verdict, TrackerError>;
}

impl<T: Tracker + ?Sized> Tracker for &mut T {
    fn classify(&mut self, id: &IssueId) -> Result<Verdict, TrackerError> {
        (**self).classify(id)
    }
}

impl<T: Tracker + ?Sized> Tracker for Box<T> {
    fn classify(&mut self, id: &IssueId) -> Result<Verdict, TrackerError> {
        (**self).classify(id)
    }
}
