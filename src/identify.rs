use std::time::{Duration, Instant};
use tracing::{debug, debug_span, info, warn};

use crate::classification::ClassificationStore;
use crate::issue_id::IssueId;
use crate::profile::PermanentErrorPolicy;
use crate::progress::Progress;
use crate::registry::Registry;
use crate::tracker::{Tracker, TrackerError, Verdict, Visibility};

// -------------------------------------------------------------------------------------------------
// IdentifyError
// -------------------------------------------------------------------------------------------------
#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    /// A `--from` or `--to` bound names an ID that the registry does not contain
    #[error("issue {id} given with `--{bound}` is not in the issue registry")]
    UnknownIssueId { bound: &'static str, id: IssueId },

    #[error("issue {from} given with `--from` comes after issue {to} given with `--to` in the issue registry")]
    EmptyRange { from: IssueId, to: IssueId },

    /// The tracker could not classify an issue, and the run halted there.
    ///
    /// Every issue before `resume_from` in the selected range has a persisted verdict.
    #[error(
        "classification aborted at issue {resume_from} after {attempts} attempt(s); \
         {}; resume with `--from {resume_from}`",
        describe_last_successful(.last_successful)
    )]
    ClassificationAborted {
        last_successful: Option<IssueId>,
        resume_from: IssueId,
        attempts: usize,
        #[source]
        cause: TrackerError,
    },

    /// The classification store failed, and the run halted before classifying `resume_from`.
    #[error(
        "classification store failed at issue {resume_from}: {cause:#}; \
         {}; resume with `--from {resume_from}`",
        describe_last_successful(.last_successful)
    )]
    StoreFailed {
        last_successful: Option<IssueId>,
        resume_from: IssueId,
        cause: anyhow::Error,
    },
}

fn describe_last_successful(last: &Option<IssueId>) -> String {
    match last {
        Some(id) => format!("the last classified issue is {id}"),
        None => "no issue has been classified yet".to_string(),
    }
}

// -------------------------------------------------------------------------------------------------
// IdentifyOptions
// -------------------------------------------------------------------------------------------------
#[derive(Clone, Debug)]
pub struct IdentifyOptions {
    /// How many times a query that failed transiently is repeated before the run is aborted
    pub retry_limit: usize,

    /// The first registry ID to classify; earlier IDs are skipped
    pub from: Option<IssueId>,

    /// The last registry ID to classify, inclusive
    pub to: Option<IssueId>,

    /// The minimum time between the starts of consecutive tracker queries
    pub request_delay: Duration,

    /// How long to wait before repeating a failed query.
    /// A longer wait requested by the tracker takes precedence.
    pub retry_delay: Duration,

    pub on_permanent_error: PermanentErrorPolicy,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        IdentifyOptions {
            retry_limit: 0,
            from: None,
            to: None,
            request_delay: Duration::from_secs_f64(crate::defaults::DEFAULT_REQUEST_DELAY_SECS),
            retry_delay: Duration::from_secs_f64(crate::defaults::DEFAULT_RETRY_DELAY_SECS),
            on_permanent_error: PermanentErrorPolicy::Abort,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// IdentifySummary
// -------------------------------------------------------------------------------------------------
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct IdentifySummary {
    /// IDs in the selected registry range
    pub num_selected: usize,

    /// IDs that already had a persisted verdict and were not queried again
    pub num_skipped: usize,

    pub num_not_security: usize,
    pub num_public: usize,
    pub num_private: usize,

    /// Queries that were repeated after a transient failure
    pub num_retries: usize,

    /// IDs recorded as not security-related because the tracker rejected their query
    pub num_rejected: usize,
}

impl IdentifySummary {
    fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::NotSecurity => self.num_not_security += 1,
            Verdict::Security(Visibility::Public) => self.num_public += 1,
            Verdict::Security(Visibility::Private) => self.num_private += 1,
        }
    }

    /// The number of verdicts persisted by this run.
    pub fn num_classified(&self) -> usize {
        self.num_not_security + self.num_public + self.num_private
    }
}

// -------------------------------------------------------------------------------------------------
// Pacer
// -------------------------------------------------------------------------------------------------
/// Spaces out tracker queries.
///
/// Consecutive queries start at least `interval` apart, and a deferral pushes the next query
/// back further still.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    not_before: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Pacer { interval, not_before: None }
    }

    /// How long after `now` the next query has to wait.
    pub fn wait_time(&self, now: Instant) -> Duration {
        self.not_before
            .map_or(Duration::ZERO, |t| t.saturating_duration_since(now))
    }

    /// Record that a query starts at `now`.
    pub fn started(&mut self, now: Instant) {
        self.push_back(now + self.interval);
    }

    /// Hold off the next query until at least `wait` after `now`.
    pub fn defer(&mut self, now: Instant, wait: Duration) {
        self.push_back(now + wait);
    }

    /// Block until the next query may start, and record that it does.
    pub fn pace(&mut self) {
        let wait = self.wait_time(Instant::now());
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.started(Instant::now());
    }

    fn push_back(&mut self, t: Instant) {
        self.not_before = Some(match self.not_before {
            Some(nb) if nb > t => nb,
            _ => t,
        });
    }
}

// -------------------------------------------------------------------------------------------------
// identify
// -------------------------------------------------------------------------------------------------
/// The slice of the registry selected by the `from` and `to` bounds, both inclusive.
pub fn select_range<'r>(
    registry: &'r Registry,
    from: Option<&IssueId>,
    to: Option<&IssueId>,
) -> Result<&'r [IssueId], IdentifyError> {
    let position = |bound: &'static str, id: &IssueId| {
        registry
            .position(id)
            .ok_or_else(|| IdentifyError::UnknownIssueId { bound, id: id.clone() })
    };

    let start = match from {
        Some(id) => position("from", id)?,
        None => 0,
    };
    let end = match to {
        Some(id) => position("to", id)? + 1,
        None => registry.len(),
    };
    if start >= end {
        if let (Some(from), Some(to)) = (from, to) {
            return Err(IdentifyError::EmptyRange { from: from.clone(), to: to.clone() });
        }
    }
    Ok(&registry.ids()[start..end.max(start)])
}

/// Classify the selected registry IDs, one tracker query at a time.
///
/// IDs that already have a verdict in `store` are not queried again. Each new verdict is
/// persisted before the next ID is considered, so when the run aborts, every ID before the
/// reported resumption point is classified.
pub fn identify<T: Tracker>(
    registry: &Registry,
    store: &mut ClassificationStore,
    tracker: &mut T,
    options: &IdentifyOptions,
    progress: &mut Progress,
) -> Result<IdentifySummary, IdentifyError> {
    let _span = debug_span!("identify").entered();

    let selected = select_range(registry, options.from.as_ref(), options.to.as_ref())?;
    let mut summary = IdentifySummary { num_selected: selected.len(), ..Default::default() };
    debug!(
        "Classifying {} of {} registry IDs; {} verdicts already persisted",
        selected.len(),
        registry.len(),
        store.len()
    );

    let mut last_successful: Option<IssueId> = match store.last() {
        Ok(last) => last.map(|c| c.id),
        Err(cause) => match selected.iter().find(|id| !store.contains(id)) {
            Some(id) => {
                return Err(IdentifyError::StoreFailed {
                    last_successful: None,
                    resume_from: id.clone(),
                    cause,
                })
            }
            None => None,
        },
    };
    let mut pacer = Pacer::new(options.request_delay);

    for id in selected {
        if store.contains(id) {
            summary.num_skipped += 1;
            progress.inc(1);
            continue;
        }

        let mut attempts = 0;
        let verdict = loop {
            attempts += 1;
            pacer.pace();
            match tracker.classify(id) {
                Ok(verdict) => break verdict,

                Err(e) if e.is_transient() && attempts <= options.retry_limit => {
                    let wait = e.retry_after().map_or(options.retry_delay, |w| w.max(options.retry_delay));
                    progress.suspend(|| {
                        warn!(
                            "Query for issue {id} failed ({e}); retry {attempts} of {} in {:.1}s",
                            options.retry_limit,
                            wait.as_secs_f64()
                        )
                    });
                    summary.num_retries += 1;
                    pacer.defer(Instant::now(), wait);
                }

                Err(e @ TrackerError::Permanent { .. })
                    if options.on_permanent_error == PermanentErrorPolicy::NotSecurity =>
                {
                    progress.suspend(|| {
                        warn!("Query for issue {id} was rejected ({e}); recording it as not security-related")
                    });
                    summary.num_rejected += 1;
                    break Verdict::NotSecurity;
                }

                Err(cause) => {
                    progress.abandon();
                    return Err(IdentifyError::ClassificationAborted {
                        last_successful,
                        resume_from: id.clone(),
                        attempts,
                        cause,
                    });
                }
            }
        };

        if let Err(cause) = store.append(id, verdict) {
            progress.abandon();
            return Err(IdentifyError::StoreFailed {
                last_successful,
                resume_from: id.clone(),
                cause,
            });
        }
        debug!("Issue {id} is {verdict}");
        last_successful = Some(id.clone());
        summary.record(verdict);
        progress.inc(1);
    }

    info!(
        "Classified {} issues ({} skipped, {} retries)",
        summary.num_classified(),
        summary.num_skipped,
        summary.num_retries
    );
    Ok(summary)
}
