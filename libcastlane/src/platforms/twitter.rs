//! Twitter (X) adapter
//!
//! Single posts go out as one `POST /2/tweets`. Threads are posted as a
//! linear reply chain: every segment after the first replies to the id of the
//! segment created just before it.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use super::{
    counters, fetch_json, id_field, json_body, missing_field, missing_id, network_error,
    remote_error, require, secret, PlatformAdapter, Submission,
};
use crate::chunker::{ThreadChunker, TWITTER_MAX_LENGTH};
use crate::config::TwitterConfig;
use crate::error::PlatformError;
use crate::formatter::{char_len, THREAD_SEPARATOR};
use crate::types::{AccountCheck, Content, ContentType, Platform, PostMetrics};

pub struct TwitterAdapter {
    client: Client,
    api_base: String,
    bearer_token: Option<SecretString>,
}

impl TwitterAdapter {
    pub fn new(client: Client, config: &TwitterConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bearer_token: secret(config.bearer_token.as_deref()),
        }
    }

    async fn create_tweet(
        &self,
        token: &SecretString,
        text: &str,
        reply_to: Option<&str>,
    ) -> Result<String, PlatformError> {
        let mut body = json!({ "text": text });
        if let Some(parent) = reply_to {
            body["reply"] = json!({ "in_reply_to_tweet_id": parent });
        }

        let response = self
            .client
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        if !response.status().is_success() {
            return Err(remote_error(response, error_message).await);
        }

        let json = json_body(response).await?;
        id_field(&json, "/data/id").ok_or_else(|| missing_id(Platform::Twitter))
    }
}

/// Split formatted thread text into postable segments, re-chunking any that
/// still exceed the tweet limit.
pub fn thread_segments(text: &str) -> Vec<String> {
    let chunker = ThreadChunker::new(TWITTER_MAX_LENGTH);
    text.split(THREAD_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| {
            if char_len(segment) > TWITTER_MAX_LENGTH {
                chunker.chunk(segment)
            } else {
                vec![segment.to_string()]
            }
        })
        .collect()
}

pub fn status_url(id: &str) -> String {
    format!("https://twitter.com/i/web/status/{}", id)
}

fn error_message(json: &Value) -> Option<String> {
    json.get("detail")
        .or_else(|| json.get("title"))
        .or_else(|| json.pointer("/errors/0/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn is_configured(&self) -> bool {
        self.bearer_token.is_some()
    }

    async fn submit(&self, content: &Content, text: &str) -> Result<Submission, PlatformError> {
        let token = require(self.bearer_token.as_ref(), Platform::Twitter, "bearer token")?;

        let segments = if content.content_type == ContentType::Thread {
            thread_segments(text)
        } else {
            vec![text.trim().to_string()]
        };
        if segments.iter().all(|s| s.is_empty()) {
            return Err(PlatformError::Validation(
                "Nothing to post after formatting".to_string(),
            ));
        }

        let total = segments.len();
        let mut post_ids: Vec<String> = Vec::with_capacity(total);
        for (index, segment) in segments.iter().enumerate() {
            let reply_to = post_ids.last().map(String::as_str);
            match self.create_tweet(token, segment, reply_to).await {
                Ok(id) => {
                    tracing::debug!(
                        content_id = %content.id,
                        segment = index + 1,
                        total,
                        post_id = %id,
                        "Tweet created"
                    );
                    post_ids.push(id);
                }
                Err(e) if post_ids.is_empty() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        content_id = %content.id,
                        posted = ?post_ids,
                        total,
                        "Thread interrupted after partial publication"
                    );
                    return Err(PlatformError::PartialThread {
                        posted: post_ids,
                        cause: Box::new(e),
                    });
                }
            }
        }

        let url = post_ids.first().map(|id| status_url(id));
        Ok(Submission { post_ids, url })
    }

    async fn verify(&self) -> Result<AccountCheck, PlatformError> {
        let token = require(self.bearer_token.as_ref(), Platform::Twitter, "bearer token")?;

        let json = fetch_json(
            self.client
                .get(format!("{}/2/users/me", self.api_base))
                .bearer_auth(token.expose_secret()),
            error_message,
        )
        .await?;

        let username = json
            .pointer("/data/username")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_field(Platform::Twitter, "a username"))?;
        Ok(AccountCheck {
            platform: Platform::Twitter,
            account: format!("@{}", username),
        })
    }

    async fn metrics(&self, post_id: &str) -> Result<PostMetrics, PlatformError> {
        let token = require(self.bearer_token.as_ref(), Platform::Twitter, "bearer token")?;

        let json = fetch_json(
            self.client
                .get(format!("{}/2/tweets/{}", self.api_base, post_id))
                .query(&[("tweet.fields", "public_metrics")])
                .bearer_auth(token.expose_secret()),
            error_message,
        )
        .await?;

        let public = json
            .pointer("/data/public_metrics")
            .ok_or_else(|| missing_field(Platform::Twitter, "public metrics"))?;
        Ok(PostMetrics::new(Platform::Twitter, post_id, counters(public)))
    }
}
