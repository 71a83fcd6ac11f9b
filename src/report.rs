use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use crate::matching::SecurityCommitRecord;

// -------------------------------------------------------------------------------------------------
// ReportFormat
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Yaml,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Yaml => "yaml",
        }
    }
}

// -------------------------------------------------------------------------------------------------
// ReportMetadata
// -------------------------------------------------------------------------------------------------
/// Describes how a report was produced.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ReportMetadata {
    pub project: String,

    /// The URL of the scanned repository's `origin` remote, if it has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    pub issue_tracker: String,

    /// The name and version of the program that wrote the report
    pub generator: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_after: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_before: Option<DateTime<Utc>>,
}

// -------------------------------------------------------------------------------------------------
// SecurityReport
// -------------------------------------------------------------------------------------------------
/// The final output of the match phase.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SecurityReport {
    pub metadata: ReportMetadata,
    pub commits: Vec<SecurityCommitRecord>,
}

impl SecurityReport {
    pub fn write<W: Write>(&self, format: ReportFormat, mut writer: W) -> Result<()> {
        match format {
            ReportFormat::Json => {
                serde_json::to_writer_pretty(&mut writer, self)?;
                writeln!(writer)?;
            }
            ReportFormat::Yaml => {
                serde_yaml::to_writer(&mut writer, self)?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(format: ReportFormat, reader: R) -> Result<Self> {
        let report = match format {
            ReportFormat::Json => serde_json::from_reader(reader).context("Failed to parse JSON report")?,
            ReportFormat::Yaml => serde_yaml::from_reader(reader).context("Failed to parse YAML report")?,
        };
        Ok(report)
    }
}
