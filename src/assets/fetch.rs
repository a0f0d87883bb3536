use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};

use crate::foundation::error::{LayercastError, LayercastResult};

pub(crate) static DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Source of remote bytes for image layers and image backgrounds.
pub trait Fetcher: Send + Sync {
    /// Fetch the full body behind `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, LayercastResult<Vec<u8>>>;
}

/// [`Fetcher`] over HTTP(S) with `reqwest`. Anything but `200 OK` is a fetch error.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Client with a per-request `timeout` and `user_agent` (the crate name and version by default).
    pub fn new(timeout: Duration, user_agent: Option<&str>) -> LayercastResult<Self> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .timeout(timeout)
            .build()
            .map_err(|err| LayercastError::evaluation(format!("construct http client: {err}")))?;
        Ok(Self { client })
    }

    /// Wrap a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_inner(&self, url: &str) -> LayercastResult<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| LayercastError::fetch(url, err.to_string()))?;
        match response.status() {
            StatusCode::OK => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| LayercastError::fetch(url, err.to_string()))?;
                tracing::debug!(url, bytes = bytes.len(), "fetched source");
                Ok(bytes.to_vec())
            }
            status => Err(LayercastError::fetch(url, format!("http status {status}"))),
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, LayercastResult<Vec<u8>>> {
        Box::pin(self.fetch_inner(url))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/fetch.rs"]
mod tests;
