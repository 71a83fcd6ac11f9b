//! End-to-end tests of the collect, identify, and match phases, with an in-memory tracker

mod common;
use common::*;
use common::assert_eq;

use std::collections::HashSet;
use std::time::Duration;

use sechist::classification::ClassificationStore;
use sechist::collect::collect;
use sechist::commit::Commit;
use sechist::date_bounds::DateBounds;
use sechist::extractor::ReferenceExtractor;
use sechist::identify::{identify, IdentifyError, IdentifyOptions};
use sechist::matching::assemble;
use sechist::profile::ProjectProfile;
use sechist::progress::Progress;
use sechist::registry::Registry;
use sechist::report::{ReportFormat, ReportMetadata, SecurityReport};
use sechist::scanner::LogScanner;
use sechist::tracker::{TrackerError, Verdict, Visibility};
use sechist::workdir::WorkDir;

fn bug_colon_profile() -> ProjectProfile {
    let profile: ProjectProfile = serde_yaml::from_str(indoc::indoc! {r#"
        name: example
        tracker-url: https://bugzilla.example.org
        reference-patterns:
          - 'Bug: ([0-9]+)'
        security-rule:
          component-contains: Security
        on-permanent-error: abort
    "#})
    .unwrap();
    profile.validate().unwrap();
    profile
}

fn fast_options() -> IdentifyOptions {
    IdentifyOptions {
        request_delay: Duration::ZERO,
        retry_delay: Duration::ZERO,
        ..Default::default()
    }
}

fn scan(scanner: &LogScanner) -> impl Iterator<Item = Result<Commit, sechist::scanner::ScanError>> + '_ {
    scanner.scan("HEAD", DateBounds::unbounded()).unwrap()
}

#[test]
fn three_phase_scenario() {
    let f = RepoFixture::new(&[
        ("Fixes Bug: 42", day("2021-05-01")),
        ("Unrelated change", day("2021-05-02")),
        ("Security patch, Bug: 42, Bug: 99", day("2021-05-03")),
    ]);
    let [c1, _c2, c3] = [&f.commit_ids()[0], &f.commit_ids()[1], &f.commit_ids()[2]];

    let profile = bug_colon_profile();
    let extractor = ReferenceExtractor::from_profile(&profile).unwrap();
    let workdir = WorkDir::new(f.out_path(), &profile.name);
    workdir.create().unwrap();
    let scanner = LogScanner::open(f.repo_path()).unwrap();

    // collect
    let (registry, stats) = collect(scan(&scanner), &extractor, &mut Progress::hidden()).unwrap();
    assert_eq!(stats.num_commits, 3);
    let ids: HashSet<&str> = registry.ids().iter().map(|i| i.as_str()).collect();
    assert_eq!(ids, ["42", "99"].into_iter().collect());
    registry.save(&workdir.registry_path()).unwrap();

    // identify
    let registry = Registry::load(&workdir.registry_path()).unwrap();
    let mut store = ClassificationStore::create_or_open(&workdir.classification_path()).unwrap();
    let mut tracker = ScriptedTracker::new(&[("42", Verdict::Security(Visibility::Public))]);
    let summary =
        identify(&registry, &mut store, &mut tracker, &fast_options(), &mut Progress::hidden()).unwrap();
    assert_eq!(summary.num_public, 1);
    assert_eq!(summary.num_not_security, 1);
    drop(store);

    // match
    let store = ClassificationStore::open_existing(&workdir.classification_path()).unwrap();
    let security = store.security_issues().unwrap();
    let (records, _) =
        assemble(scan(&scanner), &extractor, &security, false, &mut Progress::hidden()).unwrap();

    let got: Vec<(&str, Vec<&str>)> = records
        .iter()
        .map(|r| (r.id.as_str(), r.security_issue_ids.iter().map(|i| i.as_str()).collect()))
        .collect();
    assert_eq!(got, vec![(c3.as_str(), vec!["42"]), (c1.as_str(), vec!["42"])]);
}

#[test]
fn scans_are_deterministic() {
    let f = RepoFixture::new(&[
        ("Bug: 1", day("2021-05-01")),
        ("Bug: 2", day("2021-05-01")),
        ("Bug: 1", day("2021-04-30")),
        ("Bug: 3", day("2021-05-02")),
    ]);
    let scanner = LogScanner::open(f.repo_path()).unwrap();
    let first: Vec<Commit> = scan(&scanner).map(Result::unwrap).collect();
    let second: Vec<Commit> = scan(&scanner).map(Result::unwrap).collect();
    assert_eq!(first.len(), 4);
    assert_eq!(first, second);

    // the registry has no duplicates, however often an ID is referenced
    let extractor = ReferenceExtractor::from_profile(&bug_colon_profile()).unwrap();
    let (registry, stats) = collect(scan(&scanner), &extractor, &mut Progress::hidden()).unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(stats.num_references, 4);
}

#[test]
fn identify_retries_then_succeeds() {
    let tmp = TempDir::new().unwrap();
    let registry: Registry = [issue_id("7")].into_iter().collect();
    let mut store = ClassificationStore::create_or_open(&tmp.path().join("c.db")).unwrap();
    let mut tracker = ScriptedTracker::new(&[("7", Verdict::Security(Visibility::Private))]).fail(
        "7",
        vec![
            TrackerError::transient("connection reset"),
            TrackerError::Transient { message: "429".into(), retry_after: Some(Duration::ZERO) },
        ],
    );
    let options = IdentifyOptions { retry_limit: 2, ..fast_options() };

    identify(&registry, &mut store, &mut tracker, &options, &mut Progress::hidden()).unwrap();
    assert_eq!(tracker.queries.len(), 3);
    assert_eq!(
        store.security_issues().unwrap().get(&issue_id("7")),
        Some(&Visibility::Private)
    );
}

#[test]
fn identify_abort_and_resume_across_processes() {
    let tmp = TempDir::new().unwrap();
    let workdir = WorkDir::new(tmp.path(), "example");
    let registry: Registry = (70..=80).map(|n| issue_id(&n.to_string())).collect();
    registry.save(&workdir.registry_path()).unwrap();
    let truth = [
        ("71", Verdict::Security(Visibility::Public)),
        ("77", Verdict::Security(Visibility::Private)),
        ("80", Verdict::Security(Visibility::Public)),
    ];

    // first run gives up on 77
    {
        let registry = Registry::load(&workdir.registry_path()).unwrap();
        let mut store = ClassificationStore::create_or_open(&workdir.classification_path()).unwrap();
        let mut tracker = ScriptedTracker::new(&truth).fail(
            "77",
            vec![
                TrackerError::transient("503"),
                TrackerError::transient("503"),
                TrackerError::transient("503"),
            ],
        );
        let options = IdentifyOptions { retry_limit: 2, ..fast_options() };
        let err = identify(&registry, &mut store, &mut tracker, &options, &mut Progress::hidden())
            .unwrap_err();
        match &err {
            IdentifyError::ClassificationAborted { last_successful, resume_from, .. } => {
                assert_eq!(last_successful.as_ref(), Some(&issue_id("76")));
                assert_eq!(resume_from, &issue_id("77"));
            }
            e => panic!("unexpected error: {e}"),
        }
        assert!(err.to_string().contains("resume with `--from 77`"));
    }

    // second run resumes from 77 with a fresh store handle
    {
        let registry = Registry::load(&workdir.registry_path()).unwrap();
        let mut store = ClassificationStore::open_existing(&workdir.classification_path()).unwrap();
        assert_eq!(store.len(), 7);
        let mut tracker = ScriptedTracker::new(&truth);
        let options = IdentifyOptions { from: Some(issue_id("77")), ..fast_options() };
        identify(&registry, &mut store, &mut tracker, &options, &mut Progress::hidden()).unwrap();
        assert_eq!(tracker.queries.first(), Some(&issue_id("77")));
        assert_eq!(tracker.queries.len(), 4);
    }

    // same result as an uninterrupted run
    let resumed = ClassificationStore::open_existing(&workdir.classification_path()).unwrap();
    let mut uninterrupted = ClassificationStore::create_or_open(&tmp.path().join("clean.db")).unwrap();
    identify(
        &registry,
        &mut uninterrupted,
        &mut ScriptedTracker::new(&truth),
        &fast_options(),
        &mut Progress::hidden(),
    )
    .unwrap();
    assert_eq!(resumed.verdicts().unwrap(), uninterrupted.verdicts().unwrap());
}

#[test]
fn records_survive_json_to_yaml() {
    let f = RepoFixture::new(&[
        ("Bug: 5\n\nDetails: with \"quotes\" and: colons", day("2021-05-01")),
        ("Bug: 6", day("2021-05-02")),
    ]);
    let extractor = ReferenceExtractor::from_profile(&bug_colon_profile()).unwrap();
    let scanner = LogScanner::open(f.repo_path()).unwrap();
    let security = [(issue_id("5"), Visibility::Public), (issue_id("6"), Visibility::Private)]
        .into_iter()
        .collect();
    let (records, _) =
        assemble(scan(&scanner), &extractor, &security, true, &mut Progress::hidden()).unwrap();
    assert_eq!(records.len(), 2);

    let report = SecurityReport {
        metadata: ReportMetadata {
            project: "example".into(),
            repository: None,
            issue_tracker: "https://bugzilla.example.org".into(),
            generator: "sechist test".into(),
            committed_after: None,
            committed_before: None,
        },
        commits: records,
    };

    let mut json = Vec::new();
    report.write(ReportFormat::Json, &mut json).unwrap();
    let from_json = SecurityReport::read(ReportFormat::Json, json.as_slice()).unwrap();

    let mut yaml = Vec::new();
    from_json.write(ReportFormat::Yaml, &mut yaml).unwrap();
    let from_yaml = SecurityReport::read(ReportFormat::Yaml, yaml.as_slice()).unwrap();

    assert_eq!(from_yaml, report);
}
