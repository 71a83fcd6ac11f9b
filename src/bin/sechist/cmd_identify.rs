use anyhow::{bail, Context, Result};
use indicatif::HumanCount;
use std::time::Duration;
use tracing::{debug, debug_span, info, warn};

use crate::args;

use sechist::bugzilla::{self, BugzillaTracker};
use sechist::classification::ClassificationStore;
use sechist::identify::{identify, select_range, IdentifyOptions};
use sechist::progress::Progress;
use sechist::registry::Registry;

const API_KEY_ENV_VAR: &str = "SECHIST_BUGZILLA_API_KEY";

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Invalid value for `--{name}`: {secs} is not a usable number of seconds"))
}

pub fn run(global_args: &args::GlobalArgs, args: &args::IdentifyArgs) -> Result<()> {
    let _span = debug_span!("identify").entered();
    debug!("Args: {args:#?}");

    let profile = global_args.load_profile()?;
    let workdir = global_args.workdir(&profile);

    let options = IdentifyOptions {
        retry_limit: args.retry,
        from: args.from.clone(),
        to: args.to.clone(),
        request_delay: seconds("delay", args.delay)?,
        retry_delay: seconds("retry-delay", args.retry_delay)?,
        on_permanent_error: args
            .on_permanent_error
            .map_or(profile.on_permanent_error, Into::into),
    };
    debug!("Tracker errors that are not worth retrying: {}", options.on_permanent_error);

    // ---------------------------------------------------------------------------------------------
    // Load the registry and open the classification store
    // ---------------------------------------------------------------------------------------------
    let registry_path = workdir.registry_path();
    let registry = Registry::load(&registry_path)
        .context("Failed to load the issue registry; run the `collect` command first")?;

    // Check the range before touching the store, so a typo in `--from` does not discard anything
    let num_selected = select_range(&registry, options.from.as_ref(), options.to.as_ref())?.len();

    let mut store = ClassificationStore::create_or_open(&workdir.classification_path())?;
    if args.reset {
        let num_deleted = store.reset()?;
        info!("Discarded {num_deleted} previously saved verdicts");
    }

    // ---------------------------------------------------------------------------------------------
    // Set up the tracker
    // ---------------------------------------------------------------------------------------------
    let tracker_url = args.tracker_url.as_deref().unwrap_or(&profile.tracker_url);
    let client = {
        let mut builder = bugzilla::ClientBuilder::new(tracker_url)
            .with_context(|| format!("Invalid tracker URL {tracker_url:?}"))?;
        match std::env::var(API_KEY_ENV_VAR) {
            Err(std::env::VarError::NotPresent) => {
                debug!("No Bugzilla API key provided; using unauthenticated API access.");
            }
            Err(std::env::VarError::NotUnicode(_s)) => {
                bail!("Value of {} environment variable is ill-formed", API_KEY_ENV_VAR);
            }
            Ok(val) => {
                debug!("Using Bugzilla API key from {} environment variable", API_KEY_ENV_VAR);
                builder = builder.auth(bugzilla::Auth::ApiKey(secrecy::SecretString::from(val)));
            }
        }
        builder.build().context("Failed to initialize Bugzilla client")?
    };
    let mut tracker = BugzillaTracker::new(client, profile.security_rule.clone())?;

    // ---------------------------------------------------------------------------------------------
    // Classify
    // ---------------------------------------------------------------------------------------------
    let mut progress =
        Progress::new_issue_bar(num_selected as u64, "Classifying issues", global_args.use_progress());
    let summary = identify(&registry, &mut store, &mut tracker, &options, &mut progress)?;
    progress.finish_with_message("Classified issues");

    if summary.num_rejected > 0 {
        warn!(
            "{} issues could not be queried and were recorded as not security-related",
            summary.num_rejected
        );
    }

    let security = store.security_issues()?;
    let num_private = security.values().filter(|v| **v == sechist::tracker::Visibility::Private).count();
    println!(
        "Classified {} of {} selected issues ({} already classified, {} retries)",
        HumanCount(summary.num_classified() as u64),
        HumanCount(summary.num_selected as u64),
        HumanCount(summary.num_skipped as u64),
        HumanCount(summary.num_retries as u64),
    );
    println!(
        "Identified {} public and {} private security issues in this run; {} in total ({} private)",
        HumanCount(summary.num_public as u64),
        HumanCount(summary.num_private as u64),
        HumanCount(security.len() as u64),
        HumanCount(num_private as u64),
    );
    println!("\nRun the `match` command next to find the commits that fix them.");

    Ok(())
}
