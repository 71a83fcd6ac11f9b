use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, debug_span};

use crate::issue_id::IssueId;

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------
/// The set of all issue IDs referenced in a scanned commit history.
///
/// Membership is idempotent, and IDs keep the order in which they were first discovered.
/// The commits that referenced each ID are deliberately not recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registry {
    ids: Vec<IssueId>,
    seen: HashSet<IssueId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an ID, returning `true` if it was not already present.
    pub fn insert(&mut self, id: IssueId) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        self.seen.insert(id.clone());
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: &IssueId) -> bool {
        self.seen.contains(id)
    }

    /// The position of the given ID in discovery order.
    pub fn position(&self, id: &IssueId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.ids.iter().position(|i| i == id)
    }

    /// All IDs, in discovery order.
    pub fn ids(&self) -> &[IssueId] {
        &self.ids
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Write the registry to `path` as a JSON array.
    ///
    /// The file is written next to its destination and then renamed into place, so an existing
    /// registry is replaced either completely or not at all.
    pub fn save(&self, path: &Path) -> Result<()> {
        let _span = debug_span!("Registry::save", "{}", path.display()).entered();

        let mut tmp_path = path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = std::path::PathBuf::from(tmp_path);

        let write = || -> Result<()> {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &self.ids)?;
            writeln!(writer)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        };
        write().with_context(|| format!("Failed to write registry to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path).with_context(|| {
            format!("Failed to move registry from {} to {}", tmp_path.display(), path.display())
        })?;
        debug!("Wrote {} issue IDs to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a registry previously written by `save`.
    pub fn load(path: &Path) -> Result<Self> {
        let _span = debug_span!("Registry::load", "{}", path.display()).entered();
        let infile = File::open(path)
            .with_context(|| format!("Failed to open registry at {}", path.display()))?;
        let ids: Vec<IssueId> = serde_json::from_reader(BufReader::new(infile))
            .with_context(|| format!("Failed to load registry from {}", path.display()))?;
        let registry: Registry = ids.into_iter().collect();
        debug!("Loaded {} issue IDs from {}", registry.len(), path.display());
        Ok(registry)
    }
}

impl Extend<IssueId> for Registry {
    fn extend<T: IntoIterator<Item = IssueId>>(&mut self, iter: T) {
        for id in iter {
            self.insert(id);
        }
    }
}

impl FromIterator<IssueId> for Registry {
    fn from_iter<T: IntoIterator<Item = IssueId>>(iter: T) -> Self {
        let mut registry = Registry::new();
        registry.extend(iter);
        registry
    }
}
