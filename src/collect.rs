use chrono::{DateTime, FixedOffset};
use tracing::{debug_span, trace};

use crate::commit::Commit;
use crate::extractor::ReferenceExtractor;
use crate::progress::Progress;
use crate::registry::Registry;
use crate::scanner::ScanError;

// -------------------------------------------------------------------------------------------------
// CollectStats
// -------------------------------------------------------------------------------------------------
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct CollectStats {
    pub num_commits: u64,

    /// Commits with at least one issue reference
    pub num_referencing_commits: u64,

    /// All issue references found, counting repeats
    pub num_references: u64,

    /// The earliest committer date seen
    pub first_date: Option<DateTime<FixedOffset>>,

    /// The latest committer date seen
    pub last_date: Option<DateTime<FixedOffset>>,
}

impl CollectStats {
    pub fn update(&mut self, commit: &Commit, num_references: usize) {
        self.num_commits += 1;
        if num_references > 0 {
            self.num_referencing_commits += 1;
        }
        self.num_references += num_references as u64;

        let date = commit.committed_date;
        if self.first_date.map_or(true, |d| date < d) {
            self.first_date = Some(date);
        }
        if self.last_date.map_or(true, |d| date > d) {
            self.last_date = Some(date);
        }
    }
}

// -------------------------------------------------------------------------------------------------
// collect
// -------------------------------------------------------------------------------------------------
/// Build the issue registry from a sequence of scanned commits.
///
/// Any scan error ends collection, and no registry is produced.
pub fn collect<I>(
    commits: I,
    extractor: &ReferenceExtractor,
    progress: &mut Progress,
) -> Result<(Registry, CollectStats), ScanError>
where
    I: IntoIterator<Item = Result<Commit, ScanError>>,
{
    let _span = debug_span!("collect").entered();

    let mut registry = Registry::new();
    let mut stats = CollectStats::default();
    for commit in commits {
        let commit = commit?;
        let ids = extractor.extract(&commit.message);
        trace!("Commit {} references {} issues", commit.id, ids.len());
        stats.update(&commit, ids.len());
        registry.extend(ids);
        progress.inc(1);
    }
    Ok((registry, stats))
}
