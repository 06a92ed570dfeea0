//! HTTP transport for the remote order query
//!
//! Thin wrapper around `reqwest` carrying the portal session cookies and
//! the configured timeout. Error classification happens one level up in
//! the order query client; this layer only moves bytes.

use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::{Client, ClientBuilder, Response};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::config::HttpClientConfig;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    endpoint: Url,
}

impl HttpClient {
    /// Builds a client from configuration.
    pub fn with_config(config: &HttpClientConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| anyhow!("invalid endpoint '{}': {}", config.endpoint, e))?;

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .map_err(|e| anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self { client, endpoint })
    }

    /// POSTs a JSON body to the configured endpoint.
    pub async fn post_json(&self, body: &Value) -> reqwest::Result<Response> {
        debug!(endpoint = %self.endpoint, "sending query request");
        self.client.post(self.endpoint.clone()).json(body).send().await
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}
