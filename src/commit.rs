use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// -------------------------------------------------------------------------------------------------
// Identity
// -------------------------------------------------------------------------------------------------
/// The name and email of a commit author or committer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    fn from_signature(sig: &git2::Signature<'_>) -> Self {
        Identity {
            name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
            email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Commit
// -------------------------------------------------------------------------------------------------
/// The metadata and message of a single commit, as read from the history of a repository.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    /// The hex-encoded commit hash
    pub id: String,

    pub author: Identity,
    pub authored_date: DateTime<FixedOffset>,

    pub committer: Identity,
    pub committed_date: DateTime<FixedOffset>,

    pub message: String,
}

impl Commit {
    pub fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let committer = commit.committer();
        Commit {
            id: commit.id().to_string(),
            author: Identity::from_signature(&author),
            authored_date: git_time_to_datetime(author.when()),
            committer: Identity::from_signature(&committer),
            committed_date: git_time_to_datetime(committer.when()),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
        }
    }
}

/// Convert a libgit2 timestamp into a timezone-aware datetime.
///
/// Bogus timezone offsets, which do show up in old imported histories, fall back to UTC.
pub fn git_time_to_datetime(time: git2::Time) -> DateTime<FixedOffset> {
    let utc = Utc
        .timestamp_opt(time.seconds(), 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().expect("epoch should be representable"));
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset should be valid"));
    utc.with_timezone(&offset)
}
