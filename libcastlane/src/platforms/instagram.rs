//! Instagram business account adapter
//!
//! Instagram only accepts posts with media. Publishing is two Graph API
//! calls: create a media container from a public image URL, then publish the
//! container. Uploading local files is out of scope, so the media reference
//! must already be an `http(s)` URL.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::facebook::graph_error_message;
use serde_json::Value;

use super::{
    counters, fetch_json, id_field, json_body, missing_field, missing_id, network_error,
    non_blank, remote_error, require, secret, PlatformAdapter, Submission,
};
use crate::config::InstagramConfig;
use crate::error::PlatformError;
use crate::types::{AccountCheck, Content, ContentType, Platform, PostMetrics};

/// Engagement fields readable on a published media object
pub const MEDIA_METRIC_FIELDS: &str = "like_count,comments_count";

pub struct InstagramAdapter {
    client: Client,
    api_base: String,
    api_version: String,
    access_token: Option<SecretString>,
    business_account_id: Option<String>,
}

impl InstagramAdapter {
    pub fn new(client: Client, config: &InstagramConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.trim_matches('/').to_string(),
            access_token: secret(config.access_token.as_deref()),
            business_account_id: non_blank(config.business_account_id.as_deref()),
        }
    }

    fn endpoint(&self, account: &str, edge: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.api_base, self.api_version, account, edge
        )
    }

    async fn graph_get(&self, node: &str, fields: &str) -> Result<Value, PlatformError> {
        let token = require(self.access_token.as_ref(), Platform::Instagram, "access token")?;
        fetch_json(
            self.client
                .get(format!("{}/{}/{}", self.api_base, self.api_version, node))
                .query(&[("fields", fields), ("access_token", token.expose_secret())]),
            graph_error_message,
        )
        .await
    }

    async fn graph_post(
        &self,
        url: String,
        form: &[(&str, &str)],
    ) -> Result<String, PlatformError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response, graph_error_message).await);
        }

        let json = json_body(response).await?;
        id_field(&json, "/id").ok_or_else(|| missing_id(Platform::Instagram))
    }
}

/// The media reference must be a remote `http(s)` URL
pub fn validate_media_url(media_url: Option<&str>) -> Result<&str, PlatformError> {
    let url = media_url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            PlatformError::Validation("Instagram posts require a media attachment".to_string())
        })?;

    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Ok(url)
    } else {
        Err(PlatformError::Validation(format!(
            "Instagram media must be an http(s) URL, got '{}'",
            url
        )))
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    fn is_configured(&self) -> bool {
        self.access_token.is_some() && self.business_account_id.is_some()
    }

    async fn submit(&self, content: &Content, text: &str) -> Result<Submission, PlatformError> {
        let token = require(self.access_token.as_ref(), Platform::Instagram, "access token")?;
        let account = require(
            self.business_account_id.as_deref(),
            Platform::Instagram,
            "business account id",
        )?;
        if matches!(content.content_type, ContentType::Poll | ContentType::Article) {
            return Err(PlatformError::Unsupported(format!(
                "Instagram cannot publish {} content",
                content.content_type
            )));
        }
        let media_url = validate_media_url(content.media_url.as_deref())?;
        let token = token.expose_secret();

        let container_id = self
            .graph_post(
                self.endpoint(account, "media"),
                &[
                    ("image_url", media_url),
                    ("caption", text),
                    ("access_token", token),
                ],
            )
            .await?;
        tracing::debug!(content_id = %content.id, container_id = %container_id, "Media container created");

        let media_id = self
            .graph_post(
                self.endpoint(account, "media_publish"),
                &[("creation_id", container_id.as_str()), ("access_token", token)],
            )
            .await?;

        Ok(Submission::single(media_id, None))
    }

    async fn verify(&self) -> Result<AccountCheck, PlatformError> {
        let account = require(
            self.business_account_id.as_deref(),
            Platform::Instagram,
            "business account id",
        )?;

        let json = self.graph_get(account, "username").await?;
        let username = json
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_field(Platform::Instagram, "a username"))?;
        Ok(AccountCheck {
            platform: Platform::Instagram,
            account: format!("@{}", username),
        })
    }

    async fn metrics(&self, post_id: &str) -> Result<PostMetrics, PlatformError> {
        let json = self.graph_get(post_id, MEDIA_METRIC_FIELDS).await?;
        Ok(PostMetrics::new(Platform::Instagram, post_id, counters(&json)))
    }
}
