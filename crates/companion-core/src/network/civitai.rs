//! civitai.com registry client.
//!
//! - `GET /model-versions/by-hash/{hash}` maps a file hash to a version id
//! - `GET /model-versions/{id}` returns the version's files and model info
//!
//! Both endpoints answer an unknown key with `{"error": "Model not found"}`
//! (or HTTP 404), which is reported as [`Lookup::NotFound`].

use super::registry::{Lookup, RegistryClient, RegistryVersion};
use crate::config::NetworkConfig;
use crate::error::{CompanionError, Result};
use crate::text::sanitize_filename;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

const NOT_FOUND_ERROR: &str = "Model not found";

/// Client for the civitai.com public API.
pub struct CivitaiClient {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl CivitaiClient {
    /// Create a client. An empty `api_key` sends anonymous requests.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()?;

        let api_key = api_key.into();
        Ok(Self {
            client,
            api_base: NetworkConfig::CIVITAI_API_BASE.to_string(),
            api_key: (!api_key.trim().is_empty()).then(|| api_key.trim().to_string()),
        })
    }

    /// Point the client at another API root (mirrors, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// GET a JSON document. `None` means the registry does not know the key.
    async fn fetch(&self, url: &str) -> Result<Option<Value>> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let text = response.text().await?;
        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text).ok();
            if body.as_ref().is_some_and(is_not_found) {
                return Ok(None);
            }
            return Err(CompanionError::RegistryStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        if is_not_found(&body) {
            return Ok(None);
        }
        Ok(Some(body))
    }
}

fn is_not_found(body: &Value) -> bool {
    body.get("error").and_then(Value::as_str) == Some(NOT_FOUND_ERROR)
}

/// Version id from a by-hash response.
pub(crate) fn parse_hash_response(body: &Value) -> Option<String> {
    match body.get("id")? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Version details from a model-version response.
///
/// The primary file is the one whose `downloadUrl` ends with the version
/// id. Without such a file there is nothing to resolve.
pub(crate) fn parse_version_response(id: &str, body: &Value) -> Option<RegistryVersion> {
    let file = body
        .get("files")?
        .as_array()?
        .iter()
        .find(|file| {
            file.get("downloadUrl")
                .and_then(Value::as_str)
                .is_some_and(|url| url.ends_with(id))
        })?;
    let name = file.get("name").and_then(Value::as_str)?;

    let text = |value: Option<&Value>| value.and_then(Value::as_str).unwrap_or_default().to_string();
    let model = body.get("model");
    Some(RegistryVersion {
        filename: sanitize_filename(name),
        display_name: text(model.and_then(|m| m.get("name"))),
        base_model: text(body.get("baseModel")),
        kind: text(model.and_then(|m| m.get("type"))),
    })
}

#[async_trait]
impl RegistryClient for CivitaiClient {
    async fn lookup_by_hash(&self, hash: &str) -> Result<Lookup<String>> {
        let url = format!(
            "{}/model-versions/by-hash/{}",
            self.api_base,
            urlencoding::encode(hash)
        );
        debug!("Looking up model hash {} on civitai.com", hash);

        let Some(body) = self.fetch(&url).await? else {
            return Ok(Lookup::NotFound);
        };
        parse_hash_response(&body)
            .map(Lookup::Found)
            .ok_or_else(|| CompanionError::Json {
                message: format!("civitai.com response for hash {} has no id", hash),
                source: None,
            })
    }

    async fn lookup_by_id(&self, id: &str) -> Result<Lookup<RegistryVersion>> {
        let url = format!("{}/model-versions/{}", self.api_base, urlencoding::encode(id));
        debug!("Looking up model version id {} on civitai.com", id);

        let Some(body) = self.fetch(&url).await? else {
            return Ok(Lookup::NotFound);
        };
        Ok(parse_version_response(id, &body).map_or(Lookup::NotFound, Lookup::Found))
    }
}
