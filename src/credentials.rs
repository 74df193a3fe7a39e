//! Bearer credential providers.
//!
//! Clients ask a [`CredentialProvider`] for a token before every request, so
//! the source of the token (a fixed value or an OAuth2 client-credentials
//! exchange) stays invisible to them.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Token endpoint used when none is configured.
pub const DEFAULT_TOKEN_URL: &str = "https://fluidstack.us.auth0.com/oauth/token";
/// Audience requested when none is configured.
pub const DEFAULT_AUDIENCE: &str = "https://api.fluidstack.io";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const EXPIRY_MARGIN: Duration = Duration::from_secs(30);

/// Errors raised while obtaining a bearer token.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CredentialError {
    /// Raised when the token endpoint URL is unusable.
    #[error("invalid token URL '{url}': {message}")]
    InvalidUrl {
        /// URL supplied by the caller.
        url: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the token request could not be sent.
    #[error("token request failed: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when the token endpoint answers with an error status.
    #[error("token endpoint rejected credentials: {status}")]
    Rejected {
        /// Raw status text.
        status: String,
    },
    /// Raised when the token response cannot be decoded.
    #[error("failed to decode token response: {message}")]
    Decode {
        /// Decoder error message.
        message: String,
    },
}

impl From<reqwest::Error> for CredentialError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

/// Future returned by [`CredentialProvider::bearer_token`].
pub type CredentialFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, CredentialError>> + Send + 'a>>;

/// Supplies bearer tokens on demand.
pub trait CredentialProvider: Send + Sync {
    /// Returns a token valid for the next request.
    fn bearer_token(&self) -> CredentialFuture<'_>;
}

/// Token supplied directly by the operator.
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    /// Wraps an existing bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> CredentialFuture<'_> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        self.refresh_at.is_none_or(|deadline| now < deadline)
    }
}

/// OAuth2 client-credentials exchange with the client secret sent in the
/// form body. Tokens are cached until shortly before they expire.
pub struct ClientCredentials {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    audience: String,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl ClientCredentials {
    /// Creates a provider for the given token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidUrl`] when `token_url` does not parse
    /// and [`CredentialError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        token_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        audience: impl Into<String>,
    ) -> Result<Self, CredentialError> {
        let parsed = Url::parse(token_url).map_err(|err| CredentialError::InvalidUrl {
            url: token_url.to_owned(),
            message: err.to_string(),
        })?;
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            token_url: parsed,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            audience: audience.into(),
            cached: Mutex::new(None),
        })
    }

    async fn exchange(&self) -> Result<CachedToken, CredentialError> {
        debug!(token_url = %self.token_url, "requesting bearer token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("audience", self.audience.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::Rejected {
                status: status.to_string(),
            });
        }

        let body = response.bytes().await?;
        let parsed: TokenResponse =
            serde_json::from_slice(&body).map_err(|err| CredentialError::Decode {
                message: err.to_string(),
            })?;
        // An expiry too far out to represent is treated as no expiry.
        let refresh_at = parsed.expires_in.and_then(|secs| {
            Instant::now().checked_add(Duration::from_secs(secs).saturating_sub(EXPIRY_MARGIN))
        });
        Ok(CachedToken {
            value: parsed.access_token,
            refresh_at,
        })
    }
}

impl CredentialProvider for ClientCredentials {
    fn bearer_token(&self) -> CredentialFuture<'_> {
        Box::pin(async move {
            let mut cached = self.cached.lock().await;
            if let Some(token) = cached.as_ref()
                && token.is_fresh(Instant::now())
            {
                return Ok(token.value.clone());
            }

            let fresh = self.exchange().await?;
            let value = fresh.value.clone();
            *cached = Some(fresh);
            Ok(value)
        })
    }
}
