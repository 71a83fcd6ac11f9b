use reqwest::{header, header::HeaderValue, StatusCode, Url};
use secrecy::ExposeSecret;
use std::time::Duration;
use tracing::trace;

use super::models::{Bug, BugList, Fault};
use super::{Auth, Error, Result};

// -------------------------------------------------------------------------------------------------
// Client
// -------------------------------------------------------------------------------------------------
/// A minimal client for the Bugzilla REST API.
///
/// Each method issues exactly one HTTP request; there is no retrying here.
pub struct Client {
    pub(super) base_url: Url,
    pub(super) inner: reqwest::Client,
    pub(super) auth: Auth,
}

const BUG_FIELDS: (&str, &str) = ("include_fields", "id,product,component");

impl Client {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the classification-relevant fields of a single bug.
    pub async fn get_bug(&self, id: &str) -> Result<Bug> {
        let url = self.make_url(&["rest", "bug", id], &[BUG_FIELDS])?;
        let (status, retry_after, body) = self.get_url(url).await?;
        interpret_bug_response(id, status, retry_after.as_ref(), &body)
    }
}

// private implementation
impl Client {
    /// Construct a `Url` from the given path parts and query parameters.
    fn make_url(&self, path_parts: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::UrlBaseError(self.base_url.to_string()))?;
            segments.pop_if_empty();
            for p in path_parts {
                if p.contains('/') {
                    return Err(Error::UrlSlashError(p.to_string()));
                }
                segments.push(p);
            }
        }
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn get_url(&self, url: Url) -> Result<(StatusCode, Option<HeaderValue>, Vec<u8>)> {
        trace!("GET {url}");

        // build request, handling authentication if any
        let request_builder = self
            .inner
            .get(url)
            .header(header::ACCEPT, "application/json");
        let request_builder = match &self.auth {
            Auth::ApiKey(key) => request_builder.header("X-BUGZILLA-API-KEY", key.expose_secret()),
            Auth::Unauthenticated => request_builder,
        };

        // send request and wait for response
        let response = request_builder.send().await.map_err(Error::ReqwestError)?;
        let status = response.status();
        let retry_after = response.headers().get(header::RETRY_AFTER).cloned();
        let body = response.bytes().await.map_err(Error::ReqwestError)?;
        trace!("Response status {status}, {} bytes", body.len());
        Ok((status, retry_after, body.to_vec()))
    }
}

/// Turn a raw response to a single-bug query into either the bug or the error it signals.
///
/// Bugzilla reports its own errors as a JSON object with `"error": true` and a numeric `code`,
/// usually together with a 4xx status. Rate limiting uses HTTP 429, optionally with a
/// `Retry-After` header giving the number of seconds to wait.
pub(crate) fn interpret_bug_response(
    id: &str,
    status: StatusCode,
    retry_after: Option<&HeaderValue>,
    body: &[u8],
) -> Result<Bug> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let wait = retry_after
            .and_then(|v| atoi::atoi::<u64>(v.as_bytes()))
            .map(Duration::from_secs);
        return Err(Error::RateLimited { wait });
    }

    if status.is_server_error() {
        return Err(Error::ServerError(status));
    }

    if let Ok(fault) = serde_json::from_slice::<Fault>(body) {
        if fault.error {
            return Err(Error::Fault { code: fault.code, message: fault.message });
        }
    }

    if !status.is_success() {
        return Err(Error::UnexpectedStatus(status));
    }

    let list: BugList = serde_json::from_slice(body).map_err(Error::DecodeError)?;
    list.bugs
        .into_iter()
        .find(|bug| bug.id.to_string() == id)
        .ok_or_else(|| Error::MissingBug(id.to_string()))
}
