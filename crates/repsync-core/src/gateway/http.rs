//! HTTP implementation of the remote data gateway

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{RemoteConfig, RemoteGateway};
use crate::error::{Error, Result};
use crate::models::EntityKind;
use crate::util::compact_text;

/// Remote gateway speaking the `/api/{entity}s` CRUD convention.
#[derive(Clone)]
pub struct HttpGateway {
    config: RemoteConfig,
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn collection_url(&self, entity: EntityKind) -> String {
        format!("{}/api/{}", self.config.base_url, entity.api_segment())
    }

    fn record_url(&self, entity: EntityKind, id: &str) -> String {
        format!("{}/{}", self.collection_url(entity), urlencoding::encode(id))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::api_error(response).await)
    }

    async fn api_error(response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Error::Gateway {
            status: status.as_u16(),
            message: parse_api_error(status, &body),
        }
    }
}

impl RemoteGateway for HttpGateway {
    async fn fetch(&self, entity: EntityKind, id: &str) -> Result<Option<Value>> {
        let url = self.record_url(entity, id);
        debug!(%entity, id, "fetching remote record");
        let response = self
            .authorize(self.client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }
        Ok(Some(response.json::<Value>().await?))
    }

    async fn create(&self, entity: EntityKind, data: &Value) -> Result<()> {
        let response = self
            .authorize(self.client.post(self.collection_url(entity)))
            .json(data)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn update(&self, entity: EntityKind, id: &str, data: &Value) -> Result<()> {
        let response = self
            .authorize(self.client.put(self.record_url(entity, id)))
            .json(data)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn delete(&self, entity: EntityKind, id: &str) -> Result<()> {
        let response = self
            .authorize(self.client.delete(self.record_url(entity, id)))
            .send()
            .await?;
        Self::expect_success(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        compact_text(trimmed)
    }
}
