use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use tracing::trace;

use crate::issue_id::IssueId;
use crate::profile::ProjectProfile;

// -------------------------------------------------------------------------------------------------
// ReferenceExtractor
// -------------------------------------------------------------------------------------------------
/// Finds issue references in commit messages according to a project's conventions.
///
/// Extraction is deterministic and side-effect free. A captured number is dropped rather than
/// guessed at when it is ambiguous:
///
/// - it has a leading zero, so its tracker representation is unclear
/// - it has more digits than the profile allows
/// - it is on the profile's list of ignored IDs
#[derive(Clone, Debug)]
pub struct ReferenceExtractor {
    patterns: Vec<Regex>,
    max_id_digits: Option<usize>,
    ignored: HashSet<IssueId>,
}

impl ReferenceExtractor {
    pub fn from_profile(profile: &ProjectProfile) -> Result<Self> {
        let patterns = profile
            .reference_patterns
            .iter()
            .map(|p| {
                Regex::new(p).with_context(|| format!("Failed to compile reference pattern {p:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ReferenceExtractor {
            patterns,
            max_id_digits: profile.max_id_digits,
            ignored: profile.ignored_ids.iter().cloned().collect(),
        })
    }

    /// Extract the issue IDs referenced by the given commit message.
    ///
    /// The result has no duplicates and lists IDs in order of their first appearance in the
    /// message. When several patterns match, their results are combined.
    pub fn extract(&self, message: &str) -> Vec<IssueId> {
        let mut found: Vec<(usize, IssueId)> = Vec::new();
        for pattern in &self.patterns {
            for captures in pattern.captures_iter(message) {
                let m = match captures.get(1) {
                    Some(m) => m,
                    None => continue,
                };
                if !self.is_plausible(m.as_str()) {
                    trace!("Dropping ambiguous reference {:?}", m.as_str());
                    continue;
                }
                let id = match IssueId::new(m.as_str()) {
                    Ok(id) => id,
                    Err(_) => continue,
                };
                if self.ignored.contains(&id) {
                    trace!("Dropping ignored reference {id}");
                    continue;
                }
                found.push((m.start(), id));
            }
        }

        found.sort_by_key(|(offset, _)| *offset);
        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter_map(|(_, id)| if seen.insert(id.clone()) { Some(id) } else { None })
            .collect()
    }

    fn is_plausible(&self, id: &str) -> bool {
        if id.len() > 1 && id.starts_with('0') {
            return false;
        }
        self.max_id_digits.map_or(true, |max| id.len() <= max)
    }
}
