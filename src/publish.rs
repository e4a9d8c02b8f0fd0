//! Publishing snippets to, and fetching them from, a remote creation service.
//!
//! The service takes a JSON `POST /add-creation` with `{title, data, type,
//! image}` and serves creations back from `GET /get-creation?id=<id>`.

use log::{error, info};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::rendering::RenderArtifact;
use crate::{Error, Result};

/// Creation type tag used for code snippets.
pub const CREATION_TYPE: &str = "CodePond";

/// Longest slice of an error response body kept in [`Error::PublishError`].
const ERROR_BODY_LIMIT: usize = 100;

fn default_type() -> String {
    CREATION_TYPE.to_string()
}

/// A published snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The snippet source
    pub data: String,
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    /// PNG data URL of the rendered snippet
    #[serde(default)]
    pub image: Option<String>,
}

impl Creation {
    /// Build an untitled creation from a source and its current artifact.
    pub fn for_snippet(source: &str, artifact: Option<&RenderArtifact>) -> Self {
        Self {
            title: None,
            data: source.to_string(),
            kind: default_type(),
            image: artifact.map(|a| a.data_url.clone()),
        }
    }
}

/// Endpoints of a creation service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEndpoints {
    base: String,
}

impl Default for PublishEndpoints {
    fn default() -> Self {
        Self {
            base: crate::DEFAULT_INSTANCE_URL.to_string(),
        }
    }
}

impl PublishEndpoints {
    pub fn new(instance: &str) -> Result<Self> {
        Url::parse(instance)
            .map_err(|e| Error::ConfigError(format!("invalid instance URL {:?}: {}", instance, e)))?;
        Ok(Self {
            base: instance.to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn add_creation(&self) -> Result<Url> {
        self.join("/add-creation")
    }

    pub fn get_creation(&self, id: &str) -> Result<Url> {
        self.join(&format!("/get-creation?id={}", id))
    }

    fn join(&self, path: &str) -> Result<Url> {
        Url::parse(&self.base)
            .and_then(|base| base.join(path))
            .map_err(|e| Error::ConfigError(format!("cannot build URL for {}: {}", path, e)))
    }

    /// Resolve a creation id to the URL it is fetched from.
    ///
    /// An id starting with a digit, optionally signed, is looked up on this
    /// instance. Anything else must itself be a URL (starting with `http` or
    /// `localhost`).
    pub fn creation_url(&self, id: &str) -> Result<String> {
        let id = id.trim();
        let digits = id.strip_prefix(['-', '+']).unwrap_or(id);
        if digits.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(self.get_creation(id)?.to_string());
        }
        if id.starts_with("http") || id.starts_with("localhost") {
            return Ok(id.to_string());
        }
        Err(Error::InvalidCreationId(id.to_string()))
    }
}

/// HTTP client for a creation service.
#[derive(Debug, Clone)]
pub struct PublishClient {
    http: reqwest::Client,
    endpoints: PublishEndpoints,
}

impl PublishClient {
    pub fn new(endpoints: PublishEndpoints) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &PublishEndpoints {
        &self.endpoints
    }

    /// Publish `source` with its rendered image under `title`.
    ///
    /// Not retried. A non-2xx answer becomes [`Error::PublishError`] carrying the
    /// status and the first 100 characters of the response body.
    pub async fn publish(
        &self,
        title: &str,
        source: &str,
        artifact: Option<&RenderArtifact>,
    ) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Other("a title is required to publish".into()));
        }
        let artifact = artifact.ok_or(Error::NoArtifact)?;

        let mut creation = Creation::for_snippet(source, Some(artifact));
        creation.title = Some(title.to_string());

        let url = self.endpoints.add_creation()?;
        let response = self.http.post(url).json(&creation).send().await?;
        let status = response.status();
        if status.is_success() {
            info!("Published {:?}", title);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        error!("Publish failed with status {}: {}", status.as_u16(), body);
        Err(Error::PublishError {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch a creation by numeric id or URL.
    pub async fn fetch_creation(&self, id: &str) -> Result<Creation> {
        let url = self.endpoints.creation_url(id)?;
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::NetworkError(format!("GET {} returned {}", url, status)));
        }
        Ok(response.json::<Creation>().await?)
    }
}
