use anyhow::{Context, Result};
use indicatif::HumanCount;
use std::fs::File;
use std::io::BufWriter;
use tracing::{debug, debug_span};

use crate::args;

use sechist::classification::ClassificationStore;
use sechist::extractor::ReferenceExtractor;
use sechist::matching::assemble;
use sechist::progress::Progress;
use sechist::report::{ReportFormat, ReportMetadata, SecurityReport};
use sechist::scanner::LogScanner;

pub fn run(global_args: &args::GlobalArgs, args: &args::MatchArgs) -> Result<()> {
    let _span = debug_span!("match").entered();
    debug!("Args: {args:#?}");

    let profile = global_args.load_profile()?;
    let extractor = ReferenceExtractor::from_profile(&profile)?;
    let workdir = global_args.workdir(&profile);

    let security_issues = {
        let store = ClassificationStore::open_existing(&workdir.classification_path())?;
        store.security_issues()?
    };
    debug!("{} issues are security-related", security_issues.len());

    let history_args = &args.history_args;
    let bounds = history_args.bounds();
    let scanner = LogScanner::open(&history_args.repo)?;
    let commits = scanner.scan(&history_args.rev, bounds)?;

    let mut progress = Progress::new_commit_spinner("Scanning history...", global_args.use_progress());
    let (records, stats) = assemble(commits, &extractor, &security_issues, args.extended, &mut progress)
        .with_context(|| format!("Failed to match commits in {}", scanner.path().display()))?;
    progress.finish_with_message(format!("Scanned {} commits", HumanCount(stats.num_commits)));

    let report = SecurityReport {
        metadata: ReportMetadata {
            project: profile.name.clone(),
            repository: scanner.origin_url(),
            issue_tracker: profile.tracker_url.clone(),
            generator: concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")).to_string(),
            committed_after: bounds.after,
            committed_before: bounds.before,
        },
        commits: records,
    };

    let format: ReportFormat = args.format.into();
    let output_path = workdir.output_path(format);
    let write = || -> Result<()> {
        let writer = BufWriter::new(File::create(&output_path)?);
        report.write(format, writer)
    };
    write().with_context(|| format!("Failed to write output to {}", output_path.display()))?;

    println!(
        "Found {} security-related commits among {} commits referencing issues; wrote {}",
        HumanCount(stats.num_security_commits),
        HumanCount(stats.num_referencing_commits),
        output_path.display()
    );

    Ok(())
}
