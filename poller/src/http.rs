use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};

use crate::{CoordinateSource, DEFAULT_TIMEOUT, PollError, PollResult, payload};

/// Fetches `{ latitude, longitude, timestamp? }` JSON from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpCoordinateSource {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpCoordinateSource {
    /// Creates a source for `endpoint` with the default 3 s timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PollError::InvalidEndpoint`] if `endpoint` is not a URL.
    pub fn new(endpoint: &str) -> Result<Self, PollError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| PollError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Uses `client` instead of a default one.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Replaces the per-fetch timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint being polled.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl CoordinateSource for HttpCoordinateSource {
    fn fetch(&self) -> BoxFuture<'static, PollResult> {
        let request = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .send();
        let timeout = self.timeout;

        Box::pin(async move {
            let exchange = async {
                let response = request.await?;
                let status = response.status().as_u16();
                let body = response.bytes().await?;
                Ok::<_, reqwest::Error>((status, body))
            };

            // Dropping the exchange on expiry cancels the request.
            match tokio::time::timeout(timeout, exchange).await {
                Err(_) => PollResult::Failed(PollError::Timeout(timeout)),
                Ok(Err(err)) => PollResult::Failed(PollError::Transport(err.to_string())),
                Ok(Ok((status, body))) => payload::interpret(status, &body, payload::local_timestamp),
            }
        })
    }
}
