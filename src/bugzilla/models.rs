use serde::Deserialize;

// -------------------------------------------------------------------------------------------------
// BugList
// -------------------------------------------------------------------------------------------------
/// The body of a successful `GET /rest/bug/<id>` response
#[derive(Debug, Deserialize)]
pub struct BugList {
    pub bugs: Vec<Bug>,
}

// -------------------------------------------------------------------------------------------------
// Bug
// -------------------------------------------------------------------------------------------------
/// The subset of bug fields needed to classify a bug
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Bug {
    pub id: u64,

    #[serde(default)]
    pub product: String,

    #[serde(default)]
    pub component: String,
}

// -------------------------------------------------------------------------------------------------
// Fault
// -------------------------------------------------------------------------------------------------
/// The body of a Bugzilla REST API error response
#[derive(Debug, Deserialize)]
pub struct Fault {
    #[serde(default)]
    pub error: bool,

    pub code: i64,

    #[serde(default)]
    pub message: String,
}

impl Fault {
    /// The bug ID or alias is not valid
    pub const INVALID_BUG_ID: i64 = 100;

    /// The bug does not exist
    pub const BUG_NOT_FOUND: i64 = 101;

    /// The bug exists, but the requester may not see it
    pub const ACCESS_DENIED: i64 = 102;
}
