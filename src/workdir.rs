use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::report::ReportFormat;

// -------------------------------------------------------------------------------------------------
// WorkDir
// -------------------------------------------------------------------------------------------------
/// The output directory shared by the phases of one project.
///
/// Each phase writes exactly one file here, named after the project, and reads the files of
/// earlier phases.
#[derive(Clone, Debug)]
pub struct WorkDir {
    root: PathBuf,
    project: String,
}

impl WorkDir {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, project: S) -> Self {
        WorkDir { root: root.into(), project: project.into() }
    }

    /// Create the directory if it does not exist.
    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("Failed to create output directory {}", self.root.display()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The issue registry written by the collect phase.
    pub fn registry_path(&self) -> PathBuf {
        self.root.join(format!("{}_issue_ids.json", self.project))
    }

    /// The classification store written by the identify phase.
    pub fn classification_path(&self) -> PathBuf {
        self.root.join(format!("{}_classification.db", self.project))
    }

    /// The report written by the match phase.
    pub fn output_path(&self, format: ReportFormat) -> PathBuf {
        self.root
            .join(format!("{}_sec_commits.{}", self.project, format.extension()))
    }
}
