//! Facebook page adapter (Graph API feed)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use std::collections::BTreeMap;

use super::{
    collect_counter, fetch_json, id_field, json_body, missing_id, network_error, non_blank,
    remote_error, require, secret, PlatformAdapter, Submission,
};
use crate::config::FacebookConfig;
use crate::error::PlatformError;
use crate::types::{AccountCheck, Content, Platform, PostMetrics};

/// Insights requested for a page post
pub const POST_INSIGHTS: &str = "post_impressions,post_clicks,post_reactions_by_type_total";

pub struct FacebookAdapter {
    client: Client,
    api_base: String,
    api_version: String,
    page_id: Option<String>,
    /// Page token if configured, else the general token
    access_token: Option<SecretString>,
}

impl FacebookAdapter {
    pub fn new(client: Client, config: &FacebookConfig) -> Self {
        let access_token = secret(config.page_access_token.as_deref())
            .or_else(|| secret(config.access_token.as_deref()));

        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
            page_id: non_blank(config.page_id.as_deref()),
            access_token,
        }
    }

    fn graph_url(&self, node: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.api_version, node)
    }
}

pub fn post_url(id: &str) -> String {
    format!("https://www.facebook.com/{}", id)
}

/// Latest value of each metric in an insights response. Reaction
/// breakdowns become `post_reactions_by_type_total.like` and so on.
pub fn insight_counts(json: &Value) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    let metrics = json.get("data").and_then(Value::as_array);
    for metric in metrics.into_iter().flatten() {
        let name = metric.get("name").and_then(Value::as_str);
        let value = metric
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.last())
            .and_then(|latest| latest.get("value"));
        if let (Some(name), Some(value)) = (name, value) {
            collect_counter(&mut counts, name, value);
        }
    }
    counts
}

/// Graph API error body: `{"error": {"message": ...}}`
pub(crate) fn graph_error_message(json: &Value) -> Option<String> {
    json.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    fn is_configured(&self) -> bool {
        self.page_id.is_some() && self.access_token.is_some()
    }

    async fn submit(&self, _content: &Content, text: &str) -> Result<Submission, PlatformError> {
        let page_id = require(self.page_id.as_deref(), Platform::Facebook, "page id")?;
        let token = require(self.access_token.as_ref(), Platform::Facebook, "access token")?;

        let response = self
            .client
            .post(format!(
                "{}/{}/{}/feed",
                self.api_base, self.api_version, page_id
            ))
            .form(&[("message", text), ("access_token", token.expose_secret())])
            .send()
            .await
            .map_err(network_error)?;

        if response.status() != StatusCode::OK {
            return Err(remote_error(response, graph_error_message).await);
        }

        let json = json_body(response).await?;
        let id = id_field(&json, "/id").ok_or_else(|| missing_id(Platform::Facebook))?;
        let url = post_url(&id);
        Ok(Submission::single(id, Some(url)))
    }

    /// The token must be valid and able to read the page.
    async fn verify(&self) -> Result<AccountCheck, PlatformError> {
        let page_id = require(self.page_id.as_deref(), Platform::Facebook, "page id")?;
        let token = require(self.access_token.as_ref(), Platform::Facebook, "access token")?;
        let token = token.expose_secret();

        fetch_json(
            self.client
                .get(self.graph_url("me"))
                .query(&[("access_token", token)]),
            graph_error_message,
        )
        .await?;

        let page = fetch_json(
            self.client
                .get(self.graph_url(page_id))
                .query(&[("fields", "name"), ("access_token", token)]),
            graph_error_message,
        )
        .await?;

        let account = page
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| page_id.to_string());
        Ok(AccountCheck {
            platform: Platform::Facebook,
            account,
        })
    }

    async fn metrics(&self, post_id: &str) -> Result<PostMetrics, PlatformError> {
        let token = require(self.access_token.as_ref(), Platform::Facebook, "access token")?;

        let json = fetch_json(
            self.client
                .get(self.graph_url(&format!("{}/insights", post_id)))
                .query(&[("metric", POST_INSIGHTS), ("access_token", token.expose_secret())]),
            graph_error_message,
        )
        .await?;

        Ok(PostMetrics::new(Platform::Facebook, post_id, insight_counts(&json)))
    }
}
