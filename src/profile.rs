use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, debug_span};

use crate::issue_id::IssueId;

// -------------------------------------------------------------------------------------------------
// SecurityRule
// -------------------------------------------------------------------------------------------------
/// How a publicly visible issue is recognized as security-related from its tracker fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityRule {
    /// The issue's product is exactly the given string
    ProductEquals(String),

    /// The issue's component contains the given string
    ComponentContains(String),
}

impl SecurityRule {
    pub fn is_security(&self, product: &str, component: &str) -> bool {
        match self {
            SecurityRule::ProductEquals(p) => product == p,
            SecurityRule::ComponentContains(c) => component.contains(c.as_str()),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// PermanentErrorPolicy
// -------------------------------------------------------------------------------------------------
/// What the classification engine does when the tracker rejects a query outright, e.g., for an
/// unknown issue ID.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PermanentErrorPolicy {
    /// Halt the run, like exhausted retries do
    Abort,

    /// Record the issue as not security-related and continue
    NotSecurity,
}

impl std::fmt::Display for PermanentErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermanentErrorPolicy::Abort => "abort",
            PermanentErrorPolicy::NotSecurity => "not-security",
        };
        write!(f, "{s}")
    }
}

// -------------------------------------------------------------------------------------------------
// ProjectProfile
// -------------------------------------------------------------------------------------------------
/// Per-project configuration: how commit messages reference issues, and how the project's issue
/// tracker is queried and interpreted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectProfile {
    /// The name of the project, used to name output files
    pub name: String,

    /// The base URL of the project's Bugzilla instance
    pub tracker_url: String,

    /// Regex patterns that find issue references in commit messages.
    /// Each pattern must have exactly one capture group, which captures the issue ID.
    pub reference_patterns: Vec<String>,

    /// Captured IDs longer than this are treated as ambiguous and dropped
    #[serde(default)]
    pub max_id_digits: Option<usize>,

    /// Captured IDs that are known not to be real issue references
    #[serde(default)]
    pub ignored_ids: Vec<IssueId>,

    #[serde(with = "serde_yaml::with::singleton_map")]
    pub security_rule: SecurityRule,

    pub on_permanent_error: PermanentErrorPolicy,
}

impl ProjectProfile {
    /// Load the built-in profile for the named project.
    pub fn builtin(name: &str) -> Result<Self> {
        use crate::defaults::DEFAULT_PROFILES_DIR;
        let filename = format!("{name}.yml");
        let file = match DEFAULT_PROFILES_DIR.get_file(&filename) {
            Some(file) => file,
            None => bail!(
                "No built-in profile for project {name:?}; available profiles: {}",
                Self::builtin_names().join(", ")
            ),
        };
        let profile: Self = serde_yaml::from_slice(file.contents())
            .with_context(|| format!("Failed to load built-in profile {filename}"))?;
        profile
            .validate()
            .with_context(|| format!("Built-in profile {filename} is invalid"))?;
        Ok(profile)
    }

    /// The names of all built-in profiles, sorted.
    pub fn builtin_names() -> Vec<String> {
        use crate::defaults::DEFAULT_PROFILES_DIR;
        let mut names: Vec<String> = DEFAULT_PROFILES_DIR
            .find("*.yml")
            .expect("Constant glob should compile")
            .filter_map(|e| e.as_file())
            .filter_map(|f| f.path().file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let _span = debug_span!("ProjectProfile::from_yaml_file", "{}", path.display()).entered();
        let infile = File::open(path)
            .with_context(|| format!("Failed to read profile from {}", path.display()))?;
        let reader = BufReader::new(infile);
        let profile: Self = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to load YAML from {}", path.display()))?;
        profile
            .validate()
            .with_context(|| format!("Profile {} is invalid", path.display()))?;
        debug!("Loaded profile {:?} from {}", profile.name, path.display());
        Ok(profile)
    }

    /// Check that the profile is usable: its tracker URL parses and its reference patterns
    /// compile, each with exactly one capture group.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            bail!("Profile name must not be empty");
        }
        url::Url::parse(&self.tracker_url)
            .with_context(|| format!("Invalid tracker URL {:?}", self.tracker_url))?;
        if self.reference_patterns.is_empty() {
            bail!("Profile {:?} has no reference patterns", self.name);
        }
        for pattern in &self.reference_patterns {
            let re = Regex::new(pattern)
                .with_context(|| format!("Reference pattern {pattern:?} does not compile"))?;
            // `captures_len` counts the implicit whole-match group
            if re.captures_len() != 2 {
                bail!(
                    "Reference pattern {pattern:?} must have exactly one capture group, but has {}",
                    re.captures_len() - 1
                );
            }
        }
        if self.max_id_digits == Some(0) {
            bail!("max-id-digits must be positive");
        }
        Ok(())
    }
}
