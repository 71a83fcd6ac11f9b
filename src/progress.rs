use indicatif::{ProgressBar, ProgressStyle};
use lazy_static::lazy_static;
use std::borrow::Cow;
use std::time::{Duration, Instant};

/// How often should progress bars be redrawn?
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

lazy_static! {
    static ref COMMIT_SPINNER_STYLE: ProgressStyle =
        ProgressStyle::with_template("{spinner} {msg} {human_pos} commits [{elapsed_precise}]")
            .expect("progress bar style template should compile");

    static ref COMMIT_SPINNER_FINISH_STYLE: ProgressStyle =
        ProgressStyle::with_template("{msg} [{elapsed_precise}]")
            .expect("progress bar style template should compile");

    // ETAs are left out: a tracker query takes anywhere from milliseconds to minutes
    // depending on pacing and retries, so indicatif's estimate is meaningless here.
    static ref ISSUE_BAR_STYLE: ProgressStyle =
        ProgressStyle::with_template("{msg}  {bar} {percent:>3}%  {pos}/{len}  [{elapsed_precise}]")
            .expect("progress bar style template should compile");
}

/// Wraps an `indicatif::ProgressBar`, batching increments so that scanning a long history does
/// not redraw the bar for every commit.
pub struct Progress {
    inc_since_sync: u64,
    last_sync: Instant,
    inner: ProgressBar,
    finish_style: Option<ProgressStyle>,
}

impl Progress {
    /// A spinner counting commits, for history scans of unknown length.
    pub fn new_commit_spinner<T: Into<Cow<'static, str>>>(message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let inner = ProgressBar::new_spinner()
                .with_style(COMMIT_SPINNER_STYLE.clone())
                .with_message(message);
            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);
            inner
        } else {
            ProgressBar::hidden()
        };

        Progress {
            inc_since_sync: 0,
            last_sync: Instant::now(),
            inner,
            finish_style: Some(COMMIT_SPINNER_FINISH_STYLE.clone()),
        }
    }

    /// A bar over a known number of issue IDs.
    pub fn new_issue_bar<T: Into<Cow<'static, str>>>(total: u64, message: T, enabled: bool) -> Self {
        let inner = if enabled {
            let inner = ProgressBar::new(total)
                .with_style(ISSUE_BAR_STYLE.clone())
                .with_message(message);
            inner.enable_steady_tick(PROGRESS_UPDATE_INTERVAL);
            inner
        } else {
            ProgressBar::hidden()
        };

        Progress {
            inc_since_sync: 0,
            last_sync: Instant::now(),
            inner,
            finish_style: None,
        }
    }

    /// A progress indicator that draws nothing.
    pub fn hidden() -> Self {
        Progress {
            inc_since_sync: 0,
            last_sync: Instant::now(),
            inner: ProgressBar::hidden(),
            finish_style: None,
        }
    }

    /// Run `f` with the progress bar cleared from the terminal, e.g., to log a message.
    #[inline]
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.inner.suspend(f)
    }

    #[inline]
    pub fn inc(&mut self, delta: u64) {
        self.inc_since_sync += delta;
        if self.last_sync.elapsed() >= PROGRESS_UPDATE_INTERVAL {
            self.sync();
        }
    }

    pub fn finish_with_message<T: Into<Cow<'static, str>>>(&mut self, message: T) {
        self.sync();
        if let Some(style) = &self.finish_style {
            self.inner.set_style(style.clone());
        }
        self.inner.finish_with_message(message);
    }

    /// Stop the bar where it is, e.g., because the phase failed.
    pub fn abandon(&mut self) {
        self.sync();
        self.inner.abandon();
    }

    fn sync(&mut self) {
        self.inner.inc(self.inc_since_sync);
        self.inc_since_sync = 0;
        self.last_sync = Instant::now();
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.sync();
    }
}
