//! Configurable adapter for tests
//!
//! Records every submission and can be told to succeed, fail, report itself
//! unconfigured, or take a while to answer. No network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{PlatformAdapter, Submission};
use crate::error::PlatformError;
use crate::types::{AccountCheck, Content, Platform, PostMetrics};

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: Platform,

    /// Error returned from every submission, if any
    pub error: Option<PlatformError>,

    /// Simulated network latency
    pub delay: Duration,

    pub is_configured: bool,
}

impl MockConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            error: None,
            delay: Duration::ZERO,
            is_configured: true,
        }
    }
}

pub struct MockAdapter {
    config: MockConfig,
    next_id: AtomicUsize,
    submitted: Arc<Mutex<Vec<String>>>,
    content_ids: Arc<Mutex<Vec<String>>>,
}

impl MockAdapter {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            next_id: AtomicUsize::new(1),
            submitted: Arc::new(Mutex::new(Vec::new())),
            content_ids: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adapter whose submissions always succeed
    pub fn success(platform: Platform) -> Self {
        Self::new(MockConfig::new(platform))
    }

    /// Adapter whose submissions always fail with `error`
    pub fn failure(platform: Platform, error: PlatformError) -> Self {
        Self::new(MockConfig {
            error: Some(error),
            ..MockConfig::new(platform)
        })
    }

    pub fn with_delay(platform: Platform, delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..MockConfig::new(platform)
        })
    }

    pub fn not_configured(platform: Platform) -> Self {
        Self::new(MockConfig {
            is_configured: false,
            ..MockConfig::new(platform)
        })
    }

    /// The configured failure, for calls that are not submissions
    fn check_ready(&self) -> Result<(), PlatformError> {
        if !self.config.is_configured {
            return Err(PlatformError::Configuration(format!(
                "mock {} adapter is not configured",
                self.config.platform
            )));
        }
        match &self.config.error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Number of submit calls, including failed ones
    pub fn call_count(&self) -> usize {
        self.content_ids.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    /// Formatted text of every submission, in call order
    pub fn submitted(&self) -> Vec<String> {
        self.submitted
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Content ids of every submission, in call order
    pub fn content_ids(&self) -> Vec<String> {
        self.content_ids
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured
    }

    async fn submit(&self, content: &Content, text: &str) -> Result<Submission, PlatformError> {
        if let Ok(mut ids) = self.content_ids.lock() {
            ids.push(content.id.clone());
        }

        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }

        self.check_ready()?;

        if let Ok(mut submitted) = self.submitted.lock() {
            submitted.push(text.to_string());
        }
        let id = format!(
            "mock-{}-{}",
            self.config.platform,
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );
        Ok(Submission::single(id, None))
    }

    async fn verify(&self) -> Result<AccountCheck, PlatformError> {
        self.check_ready()?;
        Ok(AccountCheck {
            platform: self.config.platform,
            account: format!("mock-{}", self.config.platform),
        })
    }

    /// One like per post
    async fn metrics(&self, post_id: &str) -> Result<PostMetrics, PlatformError> {
        self.check_ready()?;
        let counts = [("like_count".to_string(), 1)].into_iter().collect();
        Ok(PostMetrics::new(self.config.platform, post_id, counts))
    }
}
