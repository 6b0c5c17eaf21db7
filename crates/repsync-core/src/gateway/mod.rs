//! Remote data gateway
//!
//! The network boundary: CRUD against the remote API per entity kind. The
//! sync manager only sees the [`RemoteGateway`] trait, so tests can script
//! remote state without a server.

mod http;

pub use http::HttpGateway;

use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::EntityKind;

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable naming the remote API base URL
pub const ENV_API_URL: &str = "REPSYNC_API_URL";
/// Environment variable carrying an optional bearer token
pub const ENV_API_TOKEN: &str = "REPSYNC_API_TOKEN";

/// CRUD boundary against the remote store.
#[allow(async_fn_in_trait)]
pub trait RemoteGateway: Send + Sync {
    /// Current remote state for a record; `None` when the record does not
    /// exist remotely (a not-found response is not an error).
    async fn fetch(&self, entity: EntityKind, id: &str) -> Result<Option<Value>>;

    async fn create(&self, entity: EntityKind, data: &Value) -> Result<()>;

    async fn update(&self, entity: EntityKind, id: &str, data: &Value) -> Result<()>;

    async fn delete(&self, entity: EntityKind, id: &str) -> Result<()>;
}

impl<T: RemoteGateway> RemoteGateway for std::sync::Arc<T> {
    async fn fetch(&self, entity: EntityKind, id: &str) -> Result<Option<Value>> {
        (**self).fetch(entity, id).await
    }

    async fn create(&self, entity: EntityKind, data: &Value) -> Result<()> {
        (**self).create(entity, data).await
    }

    async fn update(&self, entity: EntityKind, id: &str, data: &Value) -> Result<()> {
        (**self).update(entity, id, data).await
    }

    async fn delete(&self, entity: EntityKind, id: &str) -> Result<()> {
        (**self).delete(entity, id).await
    }
}

/// Connection settings for the remote API.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL, scheme included, no trailing slash
    pub base_url: String,
    /// Optional bearer token attached to every request
    pub auth_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl RemoteConfig {
    /// Create a configuration for the given base URL.
    ///
    /// The URL must include an `http://` or `https://` scheme; a trailing
    /// slash is stripped.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        Ok(Self {
            base_url,
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Attach a bearer token
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Override the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read configuration from `REPSYNC_API_URL` / `REPSYNC_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(ENV_API_URL)
            .map_err(|_| Error::InvalidConfig(format!("{ENV_API_URL} is not set")))?;
        let mut config = Self::new(base_url)?;
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.trim().is_empty() {
                config = config.with_auth_token(token.trim().to_string());
            }
        }
        Ok(config)
    }
}

fn normalize_base_url(raw: String) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidConfig(
            "base URL must not be empty".to_string(),
        ));
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidConfig(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}
