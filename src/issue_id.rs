use serde::{Deserialize, Serialize};
use std::str::FromStr;

// -------------------------------------------------------------------------------------------------
// IssueId
// -------------------------------------------------------------------------------------------------
/// The identifier of an issue in an external issue tracker.
///
/// Issue IDs are opaque: their format is project-specific, and they are only compared for equality.
/// The ordering of IDs within the registry is the order of discovery, not any ordering of the IDs
/// themselves.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueId(String);

impl IssueId {
    pub fn new<S: Into<String>>(id: S) -> anyhow::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            anyhow::bail!("issue ID must not be empty");
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            anyhow::bail!("issue ID {id:?} contains whitespace or control characters");
        }
        Ok(IssueId(id))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IssueId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IssueId::new(s)
    }
}

impl TryFrom<String> for IssueId {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        IssueId::new(s)
    }
}

impl From<IssueId> for String {
    fn from(id: IssueId) -> String {
        id.0
    }
}

impl AsRef<str> for IssueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
