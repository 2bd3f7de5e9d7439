use crate::fetch::{Fetched, Fetcher, LoadContext};
use crate::reference::PolicyRef;
use attestguard_types::{LoadError, PolicyError};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// `http://` and `https://` strategy: a plain GET of the full body.
///
/// No timeout beyond what the client was built with.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PolicyError> {
        Ok(Self::new(build_client(Some(timeout))?))
    }

    /// Client with reqwest's defaults. Fails instead of panicking when the TLS
    /// backend cannot be initialized.
    pub fn with_defaults() -> Result<Self, PolicyError> {
        Ok(Self::new(build_client(None)?))
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> Result<Client, PolicyError> {
    let mut builder = Client::builder();
    if let Some(t) = timeout {
        builder = builder.timeout(t);
    }
    builder
        .build()
        .map_err(|e| PolicyError::load("http client", LoadError::Http(e.to_string())))
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, reference: &PolicyRef, ctx: &LoadContext) -> Result<Fetched, PolicyError> {
        let uri = reference.uri();
        debug!(%uri, resource = %ctx.resource, "fetching remote document");

        let http_err = |e: reqwest::Error| PolicyError::load(&uri, LoadError::Http(e.to_string()));
        let response = self
            .client
            .get(&uri)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(http_err)?;
        let bytes = response.bytes().map_err(http_err)?;

        Ok(Fetched {
            bytes: bytes.to_vec(),
            uri,
            org: None,
            base_dir: None,
        })
    }
}
