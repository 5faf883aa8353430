//! Service layer for Castlane
//!
//! [`PublishingService`] is the request-serving path: it creates content,
//! posts immediately, and manages the schedule queue. It shares its store and
//! adapter registry with the [`SchedulerLoop`], which runs as a separate task.
//!
//! # Example
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use libcastlane::service::{NewContent, PublishingService};
//! use libcastlane::types::Platform;
//!
//! # async fn example() -> libcastlane::Result<()> {
//! let service = PublishingService::new().await?;
//!
//! let content = service
//!     .create_content(NewContent::new("Doors open at 9!", Platform::Twitter))
//!     .await?;
//! let schedule = service
//!     .schedule(&content.id, Utc::now() + Duration::hours(2), None)
//!     .await?;
//! println!("Scheduled {} for {}", schedule.id, schedule.schedule_time);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{Config, SchedulerConfig};
use crate::db::Database;
use crate::error::{CastlaneError, PlatformError, Result};
use crate::platforms::AdapterRegistry;
use crate::scheduler::SchedulerLoop;
use crate::store::{ScheduleFilter, ScheduleStore};
use crate::platforms::PlatformAdapter;
use crate::types::{
    normalize_hashtags, AccountCheck, Content, ContentStatus, ContentType, Platform, PostMetrics,
    PostResult, QueueStats, ScheduleStatus, ScheduledPost,
};

/// Input for [`PublishingService::create_content`]
#[derive(Debug, Clone)]
pub struct NewContent {
    pub text: String,
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub content_type: ContentType,
    pub media_url: Option<String>,
}

impl NewContent {
    pub fn new(text: impl Into<String>, platform: Platform) -> Self {
        Self {
            text: text.into(),
            hashtags: Vec::new(),
            platform,
            content_type: ContentType::Post,
            media_url: None,
        }
    }
}

#[derive(Clone)]
pub struct PublishingService {
    store: Arc<dyn ScheduleStore>,
    adapters: AdapterRegistry,
}

impl PublishingService {
    /// Load configuration from the default location and open the database
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(&config).await
    }

    pub async fn from_config(config: &Config) -> Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let adapters = AdapterRegistry::from_config(config)?;
        Ok(Self::with_parts(Arc::new(db), adapters))
    }

    /// Assemble from an existing store and registry
    pub fn with_parts(store: Arc<dyn ScheduleStore>, adapters: AdapterRegistry) -> Self {
        Self { store, adapters }
    }

    pub fn store(&self) -> Arc<dyn ScheduleStore> {
        Arc::clone(&self.store)
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// A scheduler loop over the same store and adapters
    pub fn scheduler(&self, config: SchedulerConfig) -> SchedulerLoop {
        SchedulerLoop::new(self.store(), self.adapters.clone(), config)
    }

    /// Store new draft content.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the text is blank.
    pub async fn create_content(&self, new: NewContent) -> Result<Content> {
        if new.text.trim().is_empty() {
            return Err(CastlaneError::InvalidInput(
                "Content text cannot be empty".to_string(),
            ));
        }

        let mut content = Content::new(
            new.text,
            normalize_hashtags(new.hashtags),
            new.platform,
            new.content_type,
        );
        if let Some(media) = new.media_url.filter(|m| !m.trim().is_empty()) {
            content = content.with_media(media.trim());
        }

        self.store.save_content(&content).await?;
        tracing::info!(
            content_id = %content.id,
            platform = %content.platform,
            content_type = %content.content_type,
            "Content created"
        );
        Ok(content)
    }

    pub async fn get_content(&self, id: &str) -> Result<Content> {
        self.store
            .get_content(id)
            .await?
            .ok_or_else(|| CastlaneError::NotFound(format!("Content not found: {}", id)))
    }

    /// Publish content right away on its own platform.
    ///
    /// Platform failures are returned as a `PostResult` with
    /// `success == false`; the content is marked posted or failed either way.
    /// A pending schedule for the content is cancelled first, since posting
    /// now supersedes it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the content does not exist; `InvalidInput` when it is
    /// already (even partly) published or its schedule is mid-dispatch.
    pub async fn post_now(&self, content_id: &str) -> Result<PostResult> {
        let content = self.get_content(content_id).await?;
        ensure_publishable(&content)?;
        self.supersede_pending(&content.id).await?;

        let result = match self.adapters.get(content.platform) {
            Some(adapter) => adapter.post(&content).await,
            None => {
                let error = PlatformError::Configuration(format!(
                    "no adapter registered for {}",
                    content.platform
                ));
                PostResult::failed(content.platform, error.to_string(), None)
            }
        };

        let status = if result.success {
            ContentStatus::Posted
        } else {
            ContentStatus::Failed
        };
        self.store
            .update_content_status(&content.id, status, Some(&result))
            .await?;

        tracing::info!(
            content_id = %content.id,
            platform = %content.platform,
            status = %status,
            "Immediate post finished"
        );
        Ok(result)
    }

    /// Queue content for publication at `when`. `platform` defaults to the
    /// content's own platform.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown content; `InvalidInput` when the content
    /// already has a pending schedule or has already been published.
    pub async fn schedule(
        &self,
        content_id: &str,
        when: DateTime<Utc>,
        platform: Option<Platform>,
    ) -> Result<ScheduledPost> {
        let content = self.get_content(content_id).await?;
        ensure_publishable(&content)?;
        let platform = platform.unwrap_or(content.platform);

        let id = self.store.save_schedule(&content.id, when, platform).await?;
        let schedule = self.get_schedule(&id).await?;

        tracing::info!(
            schedule_id = %schedule.id,
            content_id = %content.id,
            platform = %platform,
            schedule_time = %schedule.schedule_time,
            "Content scheduled"
        );
        Ok(schedule)
    }

    /// Cancel the content's pending schedule, if any
    async fn supersede_pending(&self, content_id: &str) -> Result<()> {
        let filter = ScheduleFilter {
            status: Some(ScheduleStatus::Pending),
            content_id: Some(content_id.to_string()),
            ..ScheduleFilter::default()
        };

        for schedule in self.store.list_schedules(&filter).await? {
            if schedule.claimed_at.is_some() || !self.store.cancel_schedule(&schedule.id).await? {
                return Err(CastlaneError::InvalidInput(format!(
                    "Content {} is being dispatched by schedule {}",
                    content_id, schedule.id
                )));
            }
            tracing::info!(
                schedule_id = %schedule.id,
                content_id = %content_id,
                status = %ScheduleStatus::Cancelled,
                "Schedule superseded by immediate post"
            );
        }
        Ok(())
    }

    pub async fn get_schedule(&self, id: &str) -> Result<ScheduledPost> {
        self.store
            .get_schedule(id)
            .await?
            .ok_or_else(|| CastlaneError::NotFound(format!("Schedule not found: {}", id)))
    }

    /// Cancel a schedule that has not been dispatched.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `InvalidInput` when the schedule is
    /// terminal or already being dispatched.
    pub async fn cancel(&self, schedule_id: &str) -> Result<()> {
        if self.store.cancel_schedule(schedule_id).await? {
            tracing::info!(schedule_id = %schedule_id, status = %ScheduleStatus::Cancelled, "Schedule cancelled");
            return Ok(());
        }

        let schedule = self.get_schedule(schedule_id).await?;
        let reason = if schedule.status == ScheduleStatus::Pending {
            "is being dispatched".to_string()
        } else {
            format!("is already {}", schedule.status)
        };
        Err(CastlaneError::InvalidInput(format!(
            "Schedule {} {} and cannot be cancelled",
            schedule_id, reason
        )))
    }

    /// Dispatch a pending schedule immediately instead of waiting for its
    /// time. The schedule is claimed first, so the scheduler loop cannot
    /// post it as well.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown schedule; `InvalidInput` when it is no
    /// longer pending, already being dispatched, or its content is already
    /// published.
    pub async fn send_now(&self, schedule_id: &str) -> Result<PostResult> {
        let schedule = self.get_schedule(schedule_id).await?;
        if let Some(content) = self.store.get_content(&schedule.content_id).await? {
            ensure_publishable(&content)?;
        }

        if !self.store.claim_schedule(schedule_id, Utc::now()).await? {
            let schedule = self.get_schedule(schedule_id).await?;
            return Err(CastlaneError::InvalidInput(format!(
                "Schedule {} is {} and cannot be sent",
                schedule_id,
                if schedule.status == ScheduleStatus::Pending {
                    "being dispatched".to_string()
                } else {
                    format!("already {}", schedule.status)
                }
            )));
        }

        let schedule = self.get_schedule(schedule_id).await?;
        let Some(content) = self.store.get_content(&schedule.content_id).await? else {
            let reason = format!("Content not found: {}", schedule.content_id);
            self.store
                .update_schedule_status(schedule_id, ScheduleStatus::Failed, Some(&reason))
                .await?;
            return Err(CastlaneError::NotFound(reason));
        };

        let result = match self.adapters.get(schedule.platform) {
            Some(adapter) => adapter.post(&content).await,
            None => PostResult::failed(
                schedule.platform,
                PlatformError::Configuration(format!(
                    "no adapter registered for {}",
                    schedule.platform
                ))
                .to_string(),
                None,
            ),
        };

        if result.success {
            self.store
                .update_schedule_status(schedule_id, ScheduleStatus::Completed, None)
                .await?;
            self.store
                .update_content_status(&content.id, ContentStatus::Posted, Some(&result))
                .await?;
        } else {
            self.store
                .update_schedule_status(schedule_id, ScheduleStatus::Failed, result.error.as_deref())
                .await?;
            self.store
                .update_content_status(&content.id, ContentStatus::Failed, Some(&result))
                .await?;
        }

        tracing::info!(
            schedule_id = %schedule_id,
            content_id = %content.id,
            platform = %schedule.platform,
            success = result.success,
            "Schedule sent ahead of time"
        );
        Ok(result)
    }

    /// Check a platform's credentials with a read-only call.
    ///
    /// # Errors
    ///
    /// The platform's error when the credentials are missing or rejected.
    pub async fn verify(&self, platform: Platform) -> Result<AccountCheck> {
        let check = self.adapter_for(platform)?.verify().await?;
        tracing::info!(platform = %platform, account = %check.account, "Credentials verified");
        Ok(check)
    }

    /// Engagement counters for posted content, read from its first post on
    /// the platform it went out on.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the content has not been posted; the platform's
    /// error when the metrics cannot be read.
    pub async fn post_metrics(&self, content_id: &str) -> Result<PostMetrics> {
        let content = self.get_content(content_id).await?;
        let posted = content
            .post_result
            .as_ref()
            .filter(|result| result.success)
            .and_then(|result| Some((result.platform, result.post_id()?)));
        let Some((platform, post_id)) = posted else {
            return Err(CastlaneError::InvalidInput(format!(
                "Content {} has not been posted",
                content.id
            )));
        };

        let metrics = self.adapter_for(platform)?.metrics(post_id).await?;
        tracing::debug!(
            content_id = %content.id,
            platform = %platform,
            post_id = %post_id,
            counters = metrics.counts.len(),
            "Post metrics read"
        );
        Ok(metrics)
    }

    fn adapter_for(&self, platform: Platform) -> Result<Arc<dyn PlatformAdapter>> {
        self.adapters.get(platform).ok_or_else(|| {
            CastlaneError::Platform(PlatformError::Configuration(format!(
                "no adapter registered for {}",
                platform
            )))
        })
    }

    pub async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduledPost>> {
        self.store.list_schedules(filter).await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.store.queue_stats(Utc::now()).await
    }
}

/// Refuse content that already has live posts, so nothing is published twice
fn ensure_publishable(content: &Content) -> Result<()> {
    if content.status == ContentStatus::Posted {
        return Err(CastlaneError::InvalidInput(format!(
            "Content {} is already posted",
            content.id
        )));
    }

    let live = content.live_post_ids();
    if !live.is_empty() {
        return Err(CastlaneError::InvalidInput(format!(
            "Content {} was partially published ({}); publish the remainder as new content",
            content.id,
            live.join(", ")
        )));
    }
    Ok(())
}
