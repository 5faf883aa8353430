//! Platform adapters
//!
//! One [`PlatformAdapter`] per supported network translates a [`Content`] into
//! that network's wire calls. Adapters are selected by the typed [`Platform`]
//! enum through an [`AdapterRegistry`], never by string matching.
//!
//! # Examples
//!
//! ```no_run
//! use libcastlane::config::Config;
//! use libcastlane::platforms::AdapterRegistry;
//! use libcastlane::types::{Content, ContentType, Platform};
//!
//! # async fn example() -> libcastlane::error::Result<()> {
//! let config = Config::load()?;
//! let registry = AdapterRegistry::from_config(&config)?;
//!
//! let content = Content::new(
//!     "Shipping day!".to_string(),
//!     vec!["#release".to_string()],
//!     Platform::Twitter,
//!     ContentType::Post,
//! );
//!
//! if let Some(adapter) = registry.get(Platform::Twitter) {
//!     let result = adapter.post(&content).await;
//!     println!("success: {}", result.success);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::config::Config;
use crate::error::{CastlaneError, PlatformError};
use crate::formatter;
use crate::types::{AccountCheck, Content, Platform, PostMetrics, PostResult};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;

// Available in all builds so integration tests and dry runs can use it
pub mod mock;

/// Per-request timeout for every platform call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What a platform returned for a successful submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Created post ids, in publication order
    pub post_ids: Vec<String>,
    pub url: Option<String>,
}

impl Submission {
    pub fn single(post_id: String, url: Option<String>) -> Self {
        Self {
            post_ids: vec![post_id],
            url,
        }
    }
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Whether the credentials needed to post are present
    fn is_configured(&self) -> bool;

    /// Send already-formatted text to the platform.
    ///
    /// Credential checks happen here, before any network call.
    ///
    /// # Errors
    ///
    /// `Configuration` for missing credentials, `Validation` for content the
    /// platform cannot accept, `RemoteApi` for non-success responses and
    /// `Network` for transport failures.
    async fn submit(&self, content: &Content, text: &str) -> Result<Submission, PlatformError>;

    /// Check the credentials with a read-only call and report the account
    /// they act as. Nothing is published.
    ///
    /// # Errors
    ///
    /// `Configuration` for missing credentials, `RemoteApi` when the platform
    /// rejects them.
    async fn verify(&self) -> Result<AccountCheck, PlatformError>;

    /// Engagement counters for a post this adapter published.
    ///
    /// # Errors
    ///
    /// As for [`verify`](Self::verify); `Unsupported` where reading metrics
    /// needs API access beyond publishing.
    async fn metrics(&self, post_id: &str) -> Result<PostMetrics, PlatformError>;

    /// Compose, format and submit `content`.
    ///
    /// Never fails: every error is folded into a `PostResult` with
    /// `success == false`. Posts that went live before a failure keep their
    /// ids in `post_ids`.
    async fn post(&self, content: &Content) -> PostResult {
        let platform = self.platform();
        let text = formatter::format(platform, &content.compose(), content.content_type);

        match self.submit(content, &text).await {
            Ok(submission) => {
                tracing::debug!(
                    content_id = %content.id,
                    platform = %platform,
                    post_ids = ?submission.post_ids,
                    "Content published"
                );
                PostResult::succeeded(platform, submission.post_ids, submission.url)
            }
            Err(e) => {
                tracing::warn!(
                    content_id = %content.id,
                    platform = %platform,
                    error = %e,
                    "Content could not be published"
                );
                let mut result = PostResult::failed(platform, e.to_string(), e.status_code());
                result.post_ids = e.posted_ids().to_vec();
                result
            }
        }
    }
}

/// Adapters keyed by platform
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the four HTTP adapters from configuration.
    ///
    /// Every platform gets an adapter; platforms without a config section get
    /// an unconfigured one so that dispatch reports a configuration error
    /// rather than a missing adapter.
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let client = http_client()?;

        let registry = Self::new()
            .with(Arc::new(twitter::TwitterAdapter::new(
                client.clone(),
                &config.twitter.clone().unwrap_or_default(),
            )))
            .with(Arc::new(linkedin::LinkedInAdapter::new(
                client.clone(),
                &config.linkedin.clone().unwrap_or_default(),
            )))
            .with(Arc::new(facebook::FacebookAdapter::new(
                client.clone(),
                &config.facebook.clone().unwrap_or_default(),
            )))
            .with(Arc::new(instagram::InstagramAdapter::new(
                client,
                &config.instagram.clone().unwrap_or_default(),
            )));

        for platform in Platform::ALL {
            if let Some(adapter) = registry.get(platform) {
                tracing::debug!(
                    platform = %platform,
                    configured = adapter.is_configured(),
                    "Registered platform adapter"
                );
            }
        }

        Ok(registry)
    }

    /// Add or replace the adapter for its platform
    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.insert(adapter);
        self
    }

    pub fn insert(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Registered platforms in canonical order
    pub fn platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.adapters.contains_key(p))
            .collect()
    }
}

fn http_client() -> crate::error::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("castlane/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| {
            CastlaneError::Platform(PlatformError::Configuration(format!(
                "Failed to build HTTP client: {}",
                e
            )))
        })
}

/// Non-blank secret from an optional config value
pub(crate) fn secret(value: Option<&str>) -> Option<SecretString> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| SecretString::from(v.to_string()))
}

/// Non-blank plain value from an optional config value
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn require<'a, T>(
    value: Option<&'a T>,
    platform: Platform,
    what: &str,
) -> Result<&'a T, PlatformError>
where
    T: ?Sized,
{
    value.ok_or_else(|| {
        PlatformError::Configuration(format!("{} {} is not configured", platform_name(platform), what))
    })
}

fn platform_name(platform: Platform) -> &'static str {
    match platform {
        Platform::Twitter => "Twitter",
        Platform::LinkedIn => "LinkedIn",
        Platform::Facebook => "Facebook",
        Platform::Instagram => "Instagram",
    }
}

pub(crate) fn network_error(error: reqwest::Error) -> PlatformError {
    PlatformError::Network(error.to_string())
}

/// Turn a non-success response into `RemoteApi`, using `extract` to find the
/// platform's error message in a JSON body.
pub(crate) async fn remote_error(
    response: reqwest::Response,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> PlatformError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| extract(&json))
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| formatter::truncate_chars(trimmed, 200))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

    PlatformError::RemoteApi {
        status: status.as_u16(),
        message,
    }
}

/// Parse a JSON success body
pub(crate) async fn json_body(response: reqwest::Response) -> Result<serde_json::Value, PlatformError> {
    response
        .json()
        .await
        .map_err(|e| PlatformError::Network(format!("Malformed response body: {}", e)))
}

/// Read a string field, accepting numeric ids too
pub(crate) fn id_field(json: &serde_json::Value, pointer: &str) -> Option<String> {
    match json.pointer(pointer)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn missing_id(platform: Platform) -> PlatformError {
    missing_field(platform, "a post id")
}

pub(crate) fn missing_field(platform: Platform, what: &str) -> PlatformError {
    PlatformError::Network(format!(
        "{} response did not contain {}",
        platform_name(platform),
        what
    ))
}

/// Send a read-only request and parse the JSON body, mapping failures the
/// same way submissions do
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
    extract: fn(&serde_json::Value) -> Option<String>,
) -> Result<serde_json::Value, PlatformError> {
    let response = request.send().await.map_err(network_error)?;
    if !response.status().is_success() {
        return Err(remote_error(response, extract).await);
    }
    json_body(response).await
}

/// Non-negative integer fields of a JSON object. Nested objects are
/// flattened to `outer.inner` keys; other values are skipped.
pub(crate) fn counters(json: &serde_json::Value) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    if let Some(object) = json.as_object() {
        for (name, value) in object {
            collect_counter(&mut counts, name, value);
        }
    }
    counts
}

pub(crate) fn collect_counter(
    counts: &mut BTreeMap<String, u64>,
    name: &str,
    value: &serde_json::Value,
) {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(n) = n.as_u64() {
                counts.insert(name.to_string(), n);
            }
        }
        serde_json::Value::Object(inner) => {
            for (key, value) in inner {
                if let Some(n) = value.as_u64() {
                    counts.insert(format!("{}.{}", name, key), n);
                }
            }
        }
        _ => {}
    }
}
