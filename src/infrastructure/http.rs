//! Blocking HTTP fetcher
//!
//! Used for remote template sources and package index downloads. A non-2xx
//! response is a fatal fetch error.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching remote resources
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request could not be sent or the connection failed
    #[error("Request to '{url}' failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Failure description.
        reason: String,
    },

    /// The server answered with a non-2xx status
    #[error("GET '{url}' returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },
}

/// Blocking GET client with a positive-status check
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a 30 second timeout
    ///
    /// Falls back to the default client when the builder fails.
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Fetches a URL and returns the response body
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Transport`] on connection failures and
    /// [`FetchError::Status`] on any non-2xx response.
    pub fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url = %url, "Fetching remote resource");

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    /// Fetches a URL and decodes the body as UTF-8
    ///
    /// # Errors
    ///
    /// Same as [`HttpFetcher::get`].
    pub fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.get(url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}
