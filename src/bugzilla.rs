mod auth;
mod client;
mod client_builder;
mod error;
mod models;
mod result;

pub use auth::Auth;
pub use client::Client;
pub use client_builder::ClientBuilder;
pub use error::Error;
pub use models::{Bug, Fault};
pub use result::Result;

use anyhow::Context;
use tracing::debug;

use crate::issue_id::IssueId;
use crate::profile::SecurityRule;
use crate::tracker::{Tracker, TrackerError, Verdict, Visibility};

// -------------------------------------------------------------------------------------------------
// BugzillaTracker
// -------------------------------------------------------------------------------------------------
/// A `Tracker` backed by a Bugzilla instance.
///
/// The async client is driven from a private single-threaded runtime, one request at a time.
pub struct BugzillaTracker {
    client: Client,
    rule: SecurityRule,
    runtime: tokio::runtime::Runtime,
}

impl BugzillaTracker {
    pub fn new(client: Client, rule: SecurityRule) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to initialize async runtime")?;
        debug!("Using Bugzilla at {}", client.base_url());
        Ok(BugzillaTracker { client, rule, runtime })
    }
}

impl Tracker for BugzillaTracker {
    fn classify(&mut self, id: &IssueId) -> std::result::Result<Verdict, TrackerError> {
        let result = self.runtime.block_on(self.client.get_bug(id.as_str()));
        classify_bug(&self.rule, result)
    }
}

/// Map the outcome of a single-bug query onto a verdict.
///
/// A visible bug is security-related if it satisfies `rule`. A bug the tracker refuses to show
/// is an undisclosed security bug. Network trouble, server errors, garbled responses, and rate
/// limiting are worth retrying; anything else about the query is not.
pub fn classify_bug(
    rule: &SecurityRule,
    result: Result<Bug>,
) -> std::result::Result<Verdict, TrackerError> {
    match result {
        Ok(bug) => {
            if rule.is_security(&bug.product, &bug.component) {
                Ok(Verdict::Security(Visibility::Public))
            } else {
                Ok(Verdict::NotSecurity)
            }
        }
        Err(Error::Fault { code: Fault::ACCESS_DENIED, .. }) => {
            Ok(Verdict::Security(Visibility::Private))
        }
        Err(Error::RateLimited { wait }) => Err(TrackerError::Transient {
            message: Error::RateLimited { wait }.to_string(),
            retry_after: wait,
        }),
        Err(e @ (Error::ServerError(_) | Error::DecodeError(_) | Error::ReqwestError(_))) => {
            Err(TrackerError::transient(e.to_string()))
        }
        Err(Error::UnexpectedStatus(s)) if s == reqwest::StatusCode::REQUEST_TIMEOUT => {
            Err(TrackerError::transient(Error::UnexpectedStatus(s).to_string()))
        }
        Err(e @ Error::Fault { code: Fault::INVALID_BUG_ID | Fault::BUG_NOT_FOUND, .. }) => {
            Err(TrackerError::permanent(format!("no such issue: {e}")))
        }
        Err(e) => Err(TrackerError::permanent(e.to_string())),
    }
}

// -------------------------------------------------------------------------------------------------
// test
// -------------------------------------------------------------------------------------------------
#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn bug(product: &str, component: &str) -> Bug {
        Bug { id: 1, product: product.into(), component: component.into() }
    }

    #[test]
    fn public_security_bug() {
        let rule = SecurityRule::ProductEquals("Security".into());
        assert_eq!(
            classify_bug(&rule, Ok(bug("Security", "WebCore"))).unwrap(),
            Verdict::Security(Visibility::Public)
        );
        assert_eq!(classify_bug(&rule, Ok(bug("WebKit", "Security"))).unwrap(), Verdict::NotSecurity);
    }

    #[test]
    fn access_denied_is_private_security_bug() {
        let rule = SecurityRule::ComponentContains("Security".into());
        let fault = Error::Fault { code: Fault::ACCESS_DENIED, message: "nope".into() };
        assert_eq!(classify_bug(&rule, Err(fault)).unwrap(), Verdict::Security(Visibility::Private));
    }

    #[test]
    fn unknown_bug_is_permanent() {
        let rule = SecurityRule::ComponentContains("Security".into());
        let fault = Error::Fault { code: Fault::BUG_NOT_FOUND, message: "Bug #9 does not exist.".into() };
        let err = classify_bug(&rule, Err(fault)).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("does not exist"));

        let fault = Error::Fault { code: Fault::INVALID_BUG_ID, message: "'x1' is not a valid bug number.".into() };
        let err = classify_bug(&rule, Err(fault)).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("no such issue"));
    }

    #[test]
    fn transient_errors() {
        let rule = SecurityRule::ComponentContains("Security".into());
        let err = classify_bug(&rule, Err(Error::ServerError(StatusCode::SERVICE_UNAVAILABLE))).unwrap_err();
        assert!(err.is_transient());

        let err = classify_bug(&rule, Err(Error::UnexpectedStatus(StatusCode::REQUEST_TIMEOUT))).unwrap_err();
        assert!(err.is_transient());

        let err = classify_bug(&rule, Err(Error::RateLimited { wait: Some(Duration::from_secs(5)) })).unwrap_err();
        match err {
            TrackerError::Transient { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(5)))
            }
            e => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn forbidden_without_fault_is_permanent() {
        let rule = SecurityRule::ComponentContains("Security".into());
        let err = classify_bug(&rule, Err(Error::UnexpectedStatus(StatusCode::FORBIDDEN))).unwrap_err();
        assert!(!err.is_transient());
    }
}
