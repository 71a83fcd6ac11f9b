use reqwest::IntoUrl;
use std::time::Duration;

use super::{Auth, Client, Error, Result};

// -------------------------------------------------------------------------------------------------
// ClientBuilder
// -------------------------------------------------------------------------------------------------
pub struct ClientBuilder {
    base_url: reqwest::Url,
    auth: Auth,
    timeout: Duration,
}

impl ClientBuilder {
    const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new<T: IntoUrl>(base_url: T) -> Result<Self> {
        let base_url = base_url.into_url().map_err(Error::ReqwestError)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::UrlBaseError(base_url.to_string()));
        }
        Ok(ClientBuilder {
            base_url,
            auth: Auth::Unauthenticated,
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn build(self) -> Result<Client> {
        let inner = reqwest::ClientBuilder::new()
            .user_agent(Self::USER_AGENT)
            .timeout(self.timeout)
            .build()
            .map_err(Error::ReqwestError)?;
        Ok(Client {
            base_url: self.base_url,
            auth: self.auth,
            inner,
        })
    }
}
