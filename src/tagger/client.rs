//! HTTP client for an Imagga-compatible tagging API.
//!
//! The image is uploaded as an `image_base64` form field to
//! `POST {endpoint}/tags` with basic auth, and the response carries tags as
//! `{"result": {"tags": [{"confidence": 91.2, "tag": {"en": "cat"}}]}}`.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{TagError, TagProvider};
use crate::config::ApiConfig;
use crate::db::ScoredTag;

pub struct ImaggaClient {
    endpoint: String,
    auth_header: String,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    result: Option<TagResult>,
    status: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct TagResult {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    confidence: f64,
    tag: TagName,
}

#[derive(Debug, Deserialize)]
struct TagName {
    en: String,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ImaggaClient {
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let (api_key, api_secret) = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => (key, secret),
            _ => return Err(anyhow!("missing api credentials")),
        };

        let auth_header = format!(
            "Basic {}",
            BASE64.encode(format!("{}:{}", api_key, api_secret))
        );

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_header,
        })
    }
}

impl TagProvider for ImaggaClient {
    fn tag_image(&self, image_path: &Path) -> Result<Vec<ScoredTag>> {
        let bytes = std::fs::read(image_path)?;
        let encoded = BASE64.encode(&bytes);

        let url = format!("{}/tags", self.endpoint);

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();

        let response = agent
            .post(&url)
            .set("Authorization", &self.auth_header)
            .send_form(&[("image_base64", encoded.as_str())])
            .map_err(|e| TagError::Request(e.to_string()))?;

        let tag_response: TagResponse = response
            .into_json()
            .map_err(|e| TagError::Response(e.to_string()))?;

        extract_tags(tag_response)
    }

    fn provider_name(&self) -> &'static str {
        "imagga"
    }
}

fn extract_tags(response: TagResponse) -> Result<Vec<ScoredTag>> {
    if let Some(status) = response.status {
        if status.kind == "error" {
            return Err(TagError::Api(status.text).into());
        }
    }

    let tags = response
        .result
        .map(|r| {
            r.tags
                .into_iter()
                .map(|entry| ScoredTag {
                    name: entry.tag.en,
                    confidence: entry.confidence,
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(tags)
}
