//! Integration Test Utilities and Common Code

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

pub use assert_cmd::prelude::*;
pub use assert_fs::prelude::*;
pub use assert_fs::{fixture::ChildPath, TempDir};
pub use predicates::prelude::PredicateBooleanExt;
pub use predicates::str::{contains, is_empty, RegexPredicate};
pub use pretty_assertions::{assert_eq, assert_ne};
pub use std::path::Path;
pub use std::process::Command;

use sechist::issue_id::IssueId;
use sechist::tracker::{Tracker, TrackerError, Verdict};

/// Build a `Command` for the `sechist` crate binary with variadic command-line arguments.
///
/// The arguments can be anything that is allowed by `Command::arg`.
#[macro_export]
macro_rules! sechist {
    ( $( $arg:expr ),* ) => {
        {
            let mut cmd = sechist_cmd();
            $(
                cmd.arg($arg);
            )*
            cmd
        }
    }
}

/// Build an `assert_cmd::assert::Assert` by calling `sechist!(args).assert().success()`.
#[macro_export]
macro_rules! sechist_success {
    ( $( $arg:expr ),* ) => { sechist!($( $arg ),*).assert().success() }
}

/// Build an `assert_cmd::assert::Assert` by calling `sechist!(args).assert().failure()`.
#[macro_export]
macro_rules! sechist_failure {
    ( $( $arg:expr ),* ) => { sechist!($( $arg ),*).assert().failure() }
}

// make macros easily visible to other modules
pub use {sechist, sechist_failure, sechist_success};

/// Build a `Command` for the `sechist` crate binary, isolated from the caller's environment.
pub fn sechist_cmd() -> Command {
    let mut cmd = Command::cargo_bin("sechist").expect("sechist should be executable");
    cmd.env_remove("SECHIST_OUT")
        .env_remove("SECHIST_LOG")
        .env_remove("SECHIST_BUGZILLA_API_KEY")
        .args(["--color", "never", "--progress", "never"]);
    cmd
}

/// Create a `RegexPredicate` from the given pattern.
pub fn is_match(pat: &str) -> RegexPredicate {
    predicates::str::is_match(pat).expect("pattern should compile")
}

pub fn issue_id(s: &str) -> IssueId {
    IssueId::new(s).expect("issue ID should be valid")
}

/// Midnight UTC on the given day, as seconds since the epoch.
pub fn day(date: &str) -> i64 {
    sechist::date_bounds::parse_datetime(date)
        .expect("date should parse")
        .timestamp()
}

// -------------------------------------------------------------------------------------------------
// RepoFixture
// -------------------------------------------------------------------------------------------------
/// A Git repository with a linear history of empty commits, built in a temporary directory.
pub struct RepoFixture {
    pub root: TempDir,
    pub repo: ChildPath,
    pub out: ChildPath,
    commit_ids: Vec<String>,
}

impl RepoFixture {
    /// Create a repository whose commits have the given messages and committer times, oldest first.
    pub fn new(commits: &[(&str, i64)]) -> Self {
        let root = TempDir::new().expect("should be able to create tempdir");
        let repo_dir = root.child("repo");
        repo_dir.create_dir_all().expect("should be able to create repo dir");
        let out = root.child("out");

        let repo = git2::Repository::init(repo_dir.path()).expect("should be able to init repo");
        let tree_id = repo
            .index()
            .and_then(|mut idx| idx.write_tree())
            .expect("should be able to write tree");
        let tree = repo.find_tree(tree_id).expect("tree should exist");

        let mut commit_ids = Vec::new();
        let mut parent: Option<git2::Oid> = None;
        for (message, seconds) in commits {
            let time = git2::Time::new(*seconds, 0);
            let author = git2::Signature::new("Alice Author", "alice@example.com", &time)
                .expect("signature should be valid");
            let committer = git2::Signature::new("Carl Committer", "carl@example.com", &time)
                .expect("signature should be valid");
            let parents = match parent {
                Some(p) => vec![repo.find_commit(p).expect("parent should exist")],
                None => vec![],
            };
            let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
            let oid = repo
                .commit(Some("HEAD"), &author, &committer, message, &tree, &parent_refs)
                .expect("should be able to commit");
            commit_ids.push(oid.to_string());
            parent = Some(oid);
        }

        Self { root, repo: repo_dir, out, commit_ids }
    }

    /// The IDs of the fixture's commits, oldest first.
    pub fn commit_ids(&self) -> &[String] {
        &self.commit_ids
    }

    pub fn repo_path(&self) -> &Path {
        self.repo.path()
    }

    pub fn out_path(&self) -> &Path {
        self.out.path()
    }
}

// -------------------------------------------------------------------------------------------------
// ScriptedTracker
// -------------------------------------------------------------------------------------------------
/// An in-memory tracker that answers from a table, after replaying any scripted failures.
#[derive(Default)]
pub struct ScriptedTracker {
    truth: HashMap<IssueId, Verdict>,
    failures: HashMap<IssueId, VecDeque<TrackerError>>,
    pub queries: Vec<IssueId>,
}

impl ScriptedTracker {
    pub fn new(truth: &[(&str, Verdict)]) -> Self {
        ScriptedTracker {
            truth: truth.iter().map(|(i, v)| (issue_id(i), *v)).collect(),
            ..Default::default()
        }
    }

    /// Make the next queries for `id` fail with the given errors, in order.
    pub fn fail(mut self, id: &str, errors: Vec<TrackerError>) -> Self {
        self.failures.insert(issue_id(id), errors.into());
        self
    }
}

impl Tracker for ScriptedTracker {
    fn classify(&mut self, id: &IssueId) -> Result<Verdict, TrackerError> {
        self.queries.push(id.clone());
        if let Some(e) = self.failures.get_mut(id).and_then(|q| q.pop_front()) {
            return Err(e);
        }
        Ok(self.truth.get(id).copied().unwrap_or(Verdict::NotSecurity))
    }
}
