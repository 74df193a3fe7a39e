//! Configuration loading via `ortho-config`.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::api::{InstanceRequest, ProjectId};
use crate::credentials::{ClientCredentials, CredentialProvider, StaticToken};
use crate::lifecycle::PollPolicy;

/// Atlas configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "ATLAS")]
pub struct AtlasConfig {
    /// Project identifier sent with every request. Must be a UUID.
    pub project_id: Option<String>,
    /// Region base URL (for example `https://us-east.atlas.example`).
    pub region_url: Option<String>,
    /// Bearer token used as-is. Takes precedence over client credentials.
    pub token: Option<String>,
    /// OAuth2 client identifier for the client-credentials exchange.
    pub client_id: Option<String>,
    /// OAuth2 client secret for the client-credentials exchange.
    pub client_secret: Option<String>,
    /// Token endpoint for the client-credentials exchange.
    #[ortho_config(default = crate::credentials::DEFAULT_TOKEN_URL.to_owned())]
    pub token_url: String,
    /// Audience requested during the client-credentials exchange.
    #[ortho_config(default = crate::credentials::DEFAULT_AUDIENCE.to_owned())]
    pub audience: String,
    /// Seconds between status queries while waiting. Must be non-zero.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Maximum number of waits per operation. Unbounded when unset.
    pub max_attempts: Option<u32>,
    /// Overall wait bound per operation in seconds; `0` disables it.
    #[ortho_config(default = 900)]
    pub wait_timeout_secs: u64,
    /// Name given to instances created by `run` and `create`.
    #[ortho_config(default = "example-instance-01".to_owned())]
    pub instance_name: String,
    /// Instance type requested by `run` and `create`.
    #[ortho_config(default = "cpu.2x".to_owned())]
    pub instance_type: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn missing(&self) -> ConfigError {
        ConfigError::MissingField(format!(
            "missing {}: set {} or add {} to [atlas] in atlas.toml",
            self.description, self.env_var, self.toml_key
        ))
    }
}

const PROJECT_ID: FieldMetadata =
    FieldMetadata::new("Atlas project ID", "ATLAS_PROJECT_ID", "project_id");
const REGION_URL: FieldMetadata =
    FieldMetadata::new("Atlas region URL", "ATLAS_REGION_URL", "region_url");
const CLIENT_ID: FieldMetadata =
    FieldMetadata::new("OAuth client ID", "ATLAS_CLIENT_ID", "client_id");
const CLIENT_SECRET: FieldMetadata =
    FieldMetadata::new("OAuth client secret", "ATLAS_CLIENT_SECRET", "client_secret");

/// Where bearer tokens come from, as selected by the configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialSource {
    /// Use the configured token directly.
    Token(String),
    /// Exchange client credentials for a token.
    ClientCredentials {
        /// Token endpoint.
        token_url: String,
        /// OAuth2 client identifier.
        client_id: String,
        /// OAuth2 client secret.
        client_secret: String,
        /// Requested audience.
        audience: String,
    },
}

impl CredentialSource {
    /// Builds the provider described by this source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the client-credentials provider
    /// cannot be constructed.
    pub fn into_provider(self) -> Result<Arc<dyn CredentialProvider>, ConfigError> {
        match self {
            Self::Token(token) => Ok(Arc::new(StaticToken::new(token))),
            Self::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                audience,
            } => {
                let provider =
                    ClientCredentials::new(&token_url, client_id, client_secret, audience)
                        .map_err(|err| ConfigError::Invalid(err.to_string()))?;
                Ok(Arc::new(provider))
            }
        }
    }
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|raw| raw.trim()).filter(|trimmed| !trimmed.is_empty())
}

impl AtlasConfig {
    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("atlas-lifecycle")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply the missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required value is absent
    /// and [`ConfigError::Invalid`] when a value is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.project()?;
        present(self.region_url.as_ref()).ok_or_else(|| REGION_URL.missing())?;
        self.credential_source()?;
        self.poll_policy()?;
        Ok(())
    }

    /// Project scope parsed from `project_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when unset and
    /// [`ConfigError::Invalid`] when the value is not a UUID.
    pub fn project(&self) -> Result<ProjectId, ConfigError> {
        let raw = present(self.project_id.as_ref()).ok_or_else(|| PROJECT_ID.missing())?;
        Uuid::parse_str(raw).map_err(|err| {
            ConfigError::Invalid(format!("ATLAS_PROJECT_ID '{raw}' is not a UUID: {err}"))
        })?;
        ProjectId::new(raw).ok_or_else(|| PROJECT_ID.missing())
    }

    /// Region base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when unset.
    pub fn region_url(&self) -> Result<&str, ConfigError> {
        present(self.region_url.as_ref()).ok_or_else(|| REGION_URL.missing())
    }

    /// Selects the credential source: a direct token when configured,
    /// otherwise the client-credentials pair.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when neither a token nor a full
    /// client-credentials pair is configured.
    pub fn credential_source(&self) -> Result<CredentialSource, ConfigError> {
        if let Some(token) = present(self.token.as_ref()) {
            return Ok(CredentialSource::Token(token.to_owned()));
        }
        let client_id = present(self.client_id.as_ref()).ok_or_else(|| CLIENT_ID.missing())?;
        let client_secret =
            present(self.client_secret.as_ref()).ok_or_else(|| CLIENT_SECRET.missing())?;
        Ok(CredentialSource::ClientCredentials {
            token_url: self.token_url.trim().to_owned(),
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            audience: self.audience.trim().to_owned(),
        })
    }

    /// Polling policy built from the interval and bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the interval is zero.
    pub fn poll_policy(&self) -> Result<PollPolicy, ConfigError> {
        let timeout = (self.wait_timeout_secs > 0).then(|| Duration::from_secs(self.wait_timeout_secs));
        PollPolicy::new(Duration::from_secs(self.poll_interval_secs))
            .map(|policy| {
                policy
                    .with_max_attempts(self.max_attempts)
                    .with_timeout(timeout)
            })
            .map_err(|err| ConfigError::Invalid(format!("ATLAS_POLL_INTERVAL_SECS: {err}")))
    }

    /// Builds an [`InstanceRequest`] from the configured defaults, applying
    /// optional overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the resulting name or type is
    /// empty.
    pub fn instance_request(
        &self,
        name: Option<&str>,
        instance_type: Option<&str>,
    ) -> Result<InstanceRequest, ConfigError> {
        InstanceRequest::builder()
            .name(name.unwrap_or(&self.instance_name))
            .instance_type(instance_type.unwrap_or(&self.instance_type))
            .build()
            .map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configured value is malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
