//! Transport seam: one request/response byte fetch per URL.

use crate::config::FetchConfig;
use crate::error::{Error, Result, TransportError};
use bytes::Bytes;

/// Abstraction over whole-body URL fetching, enabling testability.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the full response body
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, TransportError>;
}

/// Production [`Transport`] backed by a shared `reqwest` client.
///
/// Both `http` and `https` URLs are accepted; the scheme selects the protocol.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client honoring the configured timeout and user agent
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder.build().map_err(Error::Network)?;
        Ok(Self { client })
    }
}

/// Reject anything that is not an absolute http(s) URL
pub(crate) fn check_scheme(url: &str) -> std::result::Result<(), TransportError> {
    let parsed = url::Url::parse(url).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: format!("scheme '{}' is not http or https", other),
        }),
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str) -> std::result::Result<Bytes, TransportError> {
        check_scheme(url)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("timed out: {}", e)
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            TransportError::Request {
                url: url.to_string(),
                reason,
            }
        })?;

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
