use anyhow::{Context, Result};
use indicatif::HumanCount;
use tracing::{debug, debug_span};

use crate::args;

use sechist::collect::collect;
use sechist::extractor::ReferenceExtractor;
use sechist::progress::Progress;
use sechist::scanner::LogScanner;

pub fn run(global_args: &args::GlobalArgs, args: &args::CollectArgs) -> Result<()> {
    let _span = debug_span!("collect").entered();
    debug!("Args: {args:#?}");

    let profile = global_args.load_profile()?;
    let extractor = ReferenceExtractor::from_profile(&profile)?;
    let workdir = global_args.workdir(&profile);
    workdir.create()?;

    let history_args = &args.history_args;
    let bounds = history_args.bounds();
    let scanner = LogScanner::open(&history_args.repo)?;
    let commits = scanner.scan(&history_args.rev, bounds)?;

    let mut progress = Progress::new_commit_spinner("Scanning history...", global_args.use_progress());
    let (registry, stats) = collect(commits, &extractor, &mut progress)
        .with_context(|| format!("Failed to collect issue IDs from {}", scanner.path().display()))?;
    progress.finish_with_message(format!("Scanned {} commits", HumanCount(stats.num_commits)));

    let registry_path = workdir.registry_path();
    registry.save(&registry_path)?;

    match (stats.first_date, stats.last_date) {
        (Some(first), Some(last)) => println!(
            "Processed {} commits committed between {} and {}",
            HumanCount(stats.num_commits),
            first,
            last
        ),
        _ => println!("Processed 0 commits ({bounds})"),
    }
    println!(
        "Found {} unique issue IDs referenced by {} commits; wrote {}",
        HumanCount(registry.len() as u64),
        HumanCount(stats.num_referencing_commits),
        registry_path.display()
    );
    println!("\nRun the `identify` command next to classify the issues.");

    Ok(())
}
