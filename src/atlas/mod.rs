//! Atlas implementation of the instance API over HTTP.
//!
//! Every request carries the project scope in the `X-PROJECT-ID` header and
//! a bearer token obtained from a [`CredentialProvider`] at send time.

mod error;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::api::{
    ApiFuture, ApiResponse, Instance, InstanceApi, InstanceId, InstanceRequest, ProjectId,
};
use crate::credentials::CredentialProvider;

pub use error::AtlasError;

/// Path appended to the region URL to reach the instance API.
pub const API_PATH: &str = "api/v1alpha1/";
/// Header carrying the project scope.
pub const PROJECT_HEADER: &str = "X-PROJECT-ID";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Atlas instance endpoints.
#[derive(Clone)]
pub struct AtlasClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl fmt::Debug for AtlasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Resolves `<region_url>/api/v1alpha1/`, tolerating a trailing slash.
///
/// # Errors
///
/// Returns [`AtlasError::InvalidUrl`] when the URL does not parse or does not
/// use an HTTP scheme.
pub fn api_base_url(region_url: &str) -> Result<Url, AtlasError> {
    let invalid = |message: String| AtlasError::InvalidUrl {
        url: region_url.to_owned(),
        message,
    };
    let trimmed = region_url.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{trimmed}/{API_PATH}")).map_err(|err| invalid(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    Ok(url)
}

impl AtlasClient {
    /// Creates a client for the given region URL.
    ///
    /// # Errors
    ///
    /// Returns [`AtlasError::InvalidUrl`] when the region URL is unusable and
    /// [`AtlasError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        region_url: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, AtlasError> {
        let base_url = api_base_url(region_url)?;
        let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    /// Base URL all endpoint paths are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AtlasError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AtlasError::InvalidUrl {
                url: self.base_url.to_string(),
                message: String::from("URL cannot carry a path"),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Resolves `instances/<id>/<suffix...>` with the identifier kept as a
    /// single escaped path segment.
    fn instance_endpoint(&self, id: &InstanceId, suffix: &[&str]) -> Result<Url, AtlasError> {
        let raw = id.as_str();
        if raw.is_empty() || raw == "." || raw == ".." {
            return Err(AtlasError::InvalidInstanceId { id: raw.to_owned() });
        }
        let mut segments = vec!["instances", raw];
        segments.extend_from_slice(suffix);
        self.endpoint(&segments)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        project: &ProjectId,
    ) -> Result<reqwest::Response, AtlasError> {
        let token = self.credentials.bearer_token().await?;
        let response = request
            .bearer_auth(token)
            .header(PROJECT_HEADER, project.as_str())
            .send()
            .await?;
        Ok(response)
    }

    async fn send_decoded<T>(
        &self,
        request: RequestBuilder,
        project: &ProjectId,
        resource: &str,
    ) -> Result<ApiResponse<T>, AtlasError>
    where
        T: DeserializeOwned,
    {
        let response = self.send(request, project).await?;
        let status = response.status();
        if !status.is_success() {
            return Ok(ApiResponse::empty(status));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(ApiResponse::empty(status));
        }
        let decoded = serde_json::from_slice(&body).map_err(|err| AtlasError::Decode {
            resource: resource.to_owned(),
            message: err.to_string(),
        })?;
        Ok(ApiResponse::with_body(status, decoded))
    }

    async fn send_acknowledged(
        &self,
        request: RequestBuilder,
        project: &ProjectId,
    ) -> Result<ApiResponse<()>, AtlasError> {
        let response = self.send(request, project).await?;
        Ok(ApiResponse::empty(response.status()))
    }
}

impl InstanceApi for AtlasClient {
    type Error = AtlasError;

    fn create_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        request: &'a InstanceRequest,
    ) -> ApiFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let url = self.endpoint(&["instances"])?;
            self.send_decoded(self.http.post(url).json(request), project, "instance")
                .await
        })
    }

    fn get_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let url = self.instance_endpoint(id, &[])?;
            self.send_decoded(self.http.get(url), project, "instance")
                .await
        })
    }

    fn stop_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.instance_endpoint(id, &["actions", "stop"])?;
            self.send_acknowledged(self.http.post(url), project).await
        })
    }

    fn start_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.instance_endpoint(id, &["actions", "start"])?;
            self.send_acknowledged(self.http.post(url), project).await
        })
    }

    fn delete_instance<'a>(
        &'a self,
        project: &'a ProjectId,
        id: &'a InstanceId,
    ) -> ApiFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let url = self.instance_endpoint(id, &[])?;
            self.send_acknowledged(self.http.delete(url), project).await
        })
    }
}
