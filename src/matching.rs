use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, debug_span};

use crate::commit::{Commit, Identity};
use crate::extractor::ReferenceExtractor;
use crate::issue_id::IssueId;
use crate::progress::Progress;
use crate::scanner::ScanError;
use crate::tracker::Visibility;

// -------------------------------------------------------------------------------------------------
// SecurityCommitRecord
// -------------------------------------------------------------------------------------------------
/// A commit that references at least one security-related issue.
///
/// Identity and message fields are only present in extended records.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct SecurityCommitRecord {
    pub id: String,
    pub authored_date: DateTime<FixedOffset>,
    pub committed_date: DateTime<FixedOffset>,

    /// The security-related issues the commit references, in order of appearance in the message
    pub security_issue_ids: Vec<IssueId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Identity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committer: Option<Identity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SecurityCommitRecord {
    pub fn new(commit: Commit, security_issue_ids: Vec<IssueId>, extended: bool) -> Self {
        let (author, committer, message) = if extended {
            (Some(commit.author), Some(commit.committer), Some(commit.message))
        } else {
            (None, None, None)
        };
        SecurityCommitRecord {
            id: commit.id,
            authored_date: commit.authored_date,
            committed_date: commit.committed_date,
            security_issue_ids,
            author,
            committer,
            message,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// MatchStats
// -------------------------------------------------------------------------------------------------
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MatchStats {
    pub num_commits: u64,

    /// Commits with at least one issue reference
    pub num_referencing_commits: u64,

    /// Commits with at least one reference to a security-related issue
    pub num_security_commits: u64,
}

// -------------------------------------------------------------------------------------------------
// assemble
// -------------------------------------------------------------------------------------------------
/// Select the commits that reference security-related issues, in scan order.
///
/// References to issues that are missing from `security_issues`, whether classified as not
/// security-related or never classified at all, contribute nothing.
pub fn assemble<I>(
    commits: I,
    extractor: &ReferenceExtractor,
    security_issues: &HashMap<IssueId, Visibility>,
    extended: bool,
    progress: &mut Progress,
) -> Result<(Vec<SecurityCommitRecord>, MatchStats), ScanError>
where
    I: IntoIterator<Item = Result<Commit, ScanError>>,
{
    let _span = debug_span!("assemble").entered();

    let mut records = Vec::new();
    let mut stats = MatchStats::default();
    for commit in commits {
        let commit = commit?;
        stats.num_commits += 1;
        progress.inc(1);

        let ids = extractor.extract(&commit.message);
        if ids.is_empty() {
            continue;
        }
        stats.num_referencing_commits += 1;

        let matched: Vec<IssueId> =
            ids.into_iter().filter(|id| security_issues.contains_key(id)).collect();
        if matched.is_empty() {
            continue;
        }
        debug!("Commit {} fixes security issues {:?}", commit.id, matched);
        stats.num_security_commits += 1;
        records.push(SecurityCommitRecord::new(commit, matched, extended));
    }
    Ok((records, stats))
}

// -------------------------------------------------------------------------------------------------
// test
// -------------------------------------------------------------------------------------------------
#[cfg(test)]
mod test {
    use super::*;
    use crate::profile::ProjectProfile;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> IssueId {
        IssueId::new(s).unwrap()
    }

    fn commit(hash: &str, secs: i64, message: &str) -> Commit {
        let date = FixedOffset::east_opt(3600).unwrap().timestamp_opt(secs, 0).unwrap();
        Commit {
            id: hash.into(),
            author: Identity { name: "Alice".into(), email: "alice@example.com".into() },
            authored_date: date,
            committer: Identity { name: "Bob".into(), email: "bob@example.com".into() },
            committed_date: date,
            message: message.into(),
        }
    }

    fn history() -> Vec<Result<Commit, ScanError>> {
        vec![
            Ok(commit("c3", 300, "https://bugs.webkit.org/show_bug.cgi?id=300")),
            Ok(commit("c2", 200, "Nothing to see")),
            Ok(commit("c1", 100, "https://webkit.org/b/20\nhttps://webkit.org/b/300\nhttps://webkit.org/b/5")),
        ]
    }

    fn webkit() -> ReferenceExtractor {
        ReferenceExtractor::from_profile(&ProjectProfile::builtin("webkit").unwrap()).unwrap()
    }

    #[test]
    fn records_in_scan_order() {
        let security: HashMap<_, _> = [(id("300"), Visibility::Public), (id("5"), Visibility::Private)]
            .into_iter()
            .collect();
        let (records, stats) =
            assemble(history(), &webkit(), &security, false, &mut Progress::hidden()).unwrap();

        let summary: Vec<(&str, Vec<IssueId>)> = records
            .iter()
            .map(|r| (r.id.as_str(), r.security_issue_ids.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![("c3", vec![id("300")]), ("c1", vec![id("300"), id("5")])]
        );
        assert_eq!(
            stats,
            MatchStats { num_commits: 3, num_referencing_commits: 2, num_security_commits: 2 }
        );
        assert!(records.iter().all(|r| r.author.is_none() && r.message.is_none()));
    }

    #[test]
    fn unclassified_references_contribute_nothing() {
        let (records, _) =
            assemble(history(), &webkit(), &HashMap::new(), true, &mut Progress::hidden()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn extended_records() {
        let security: HashMap<_, _> = [(id("20"), Visibility::Public)].into_iter().collect();
        let (records, _) =
            assemble(history(), &webkit(), &security, true, &mut Progress::hidden()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.author.as_ref().unwrap().name, "Alice");
        assert_eq!(r.committer.as_ref().unwrap().email, "bob@example.com");
        assert!(r.message.as_ref().unwrap().contains("webkit.org/b/5"));
    }

    #[test]
    fn record_keys() {
        let rec = SecurityCommitRecord::new(commit("abc", 0, "msg"), vec![id("1")], false);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "abc",
                "authored-date": "1970-01-01T01:00:00+01:00",
                "committed-date": "1970-01-01T01:00:00+01:00",
                "security-issue-ids": ["1"],
            })
        );
    }
}
