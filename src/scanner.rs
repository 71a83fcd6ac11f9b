use git2::{Oid, Repository, RepositoryOpenFlags, Revwalk, Sort};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::commit::Commit;
use crate::date_bounds::DateBounds;

// -------------------------------------------------------------------------------------------------
// ScanError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The path is not a readable Git repository, or the requested revision does not resolve
    #[error("failed to access Git repository at {}: {source}", path.display())]
    RepositoryAccess {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    /// Reading history failed partway through
    #[error("failed to read history of Git repository at {}: {source}", path.display())]
    HistoryRead {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
}

// -------------------------------------------------------------------------------------------------
// LogScanner
// -------------------------------------------------------------------------------------------------
/// Reads the commit history of a local repository clone.
///
/// Commits are yielded newest first, in topological order with ties broken by commit time.
/// As long as the repository does not change, repeated scans yield identical sequences.
pub struct LogScanner {
    path: PathBuf,
    repo: Repository,
}

impl LogScanner {
    /// Open the repository at `path`, which may be either a working tree or a bare repository.
    ///
    /// The path must be the repository itself: parent directories are not searched.
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let repo = Repository::open_ext(
            path,
            RepositoryOpenFlags::NO_SEARCH,
            &[] as &[&OsStr],
        )
        .map_err(|source| ScanError::RepositoryAccess { path: path.to_owned(), source })?;
        debug!("Opened Git repository at {}", path.display());
        Ok(LogScanner { path: path.to_owned(), repo })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The URL of the `origin` remote, if there is one.
    pub fn origin_url(&self) -> Option<String> {
        let remote = self.repo.find_remote("origin").ok()?;
        remote.url().map(str::to_owned)
    }

    /// Start a scan of the history reachable from `rev`, limited to commits whose committer date
    /// lies within `bounds`.
    pub fn scan(&self, rev: &str, bounds: DateBounds) -> Result<Commits<'_>, ScanError> {
        let access_err = |source| ScanError::RepositoryAccess { path: self.path.clone(), source };

        let start: Oid = self
            .repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(access_err)?
            .id();

        let mut walk = self.repo.revwalk().map_err(access_err)?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME).map_err(access_err)?;
        walk.push(start).map_err(access_err)?;
        debug!("Scanning history of {} from {rev} ({start}), {bounds}", self.path.display());

        Ok(Commits {
            path: &self.path,
            repo: &self.repo,
            walk,
            bounds,
            failed: false,
        })
    }
}

// -------------------------------------------------------------------------------------------------
// Commits
// -------------------------------------------------------------------------------------------------
/// A lazy sequence of the commits of one scan.
///
/// After an error is yielded, the sequence ends.
pub struct Commits<'r> {
    path: &'r Path,
    repo: &'r Repository,
    walk: Revwalk<'r>,
    bounds: DateBounds,
    failed: bool,
}

impl<'r> Commits<'r> {
    fn read_err(&mut self, source: git2::Error) -> ScanError {
        self.failed = true;
        ScanError::HistoryRead { path: self.path.to_owned(), source }
    }
}

impl<'r> Iterator for Commits<'r> {
    type Item = Result<Commit, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let oid = match self.walk.next()? {
                Ok(oid) => oid,
                Err(e) => return Some(Err(self.read_err(e))),
            };
            let commit = match self.repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(e) => return Some(Err(self.read_err(e))),
            };
            let commit = Commit::from_git2(&commit);
            if self.bounds.contains(&commit.committed_date) {
                return Some(Ok(commit));
            }
        }
    }
}
