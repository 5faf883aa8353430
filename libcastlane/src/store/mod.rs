//! Durable record of content and scheduled posts
//!
//! [`ScheduleStore`] is the single source of truth shared by the scheduler
//! loop and the immediate-post path. Two implementations ship with the crate:
//! the SQLite-backed [`crate::db::Database`] and the in-process
//! [`memory::MemoryStore`].
//!
//! # Claims
//!
//! Before dispatching a due schedule the scheduler calls
//! [`ScheduleStore::claim_schedule`], an atomic conditional update that only
//! succeeds for a pending, unclaimed record. Claimed records are invisible to
//! [`ScheduleStore::get_pending_schedules`] and can no longer be cancelled, so
//! two scheduler instances never dispatch the same schedule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    Content, ContentStatus, Platform, PostResult, QueueStats, ScheduleStatus, ScheduledPost,
};

pub mod memory;

/// Selection criteria for [`ScheduleStore::list_schedules`]
#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub status: Option<ScheduleStatus>,
    pub platform: Option<Platform>,
    pub content_id: Option<String>,
    pub limit: Option<usize>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &ScheduledPost) -> bool {
        self.status.map_or(true, |s| schedule.status == s)
            && self.platform.map_or(true, |p| schedule.platform == p)
            && self
                .content_id
                .as_deref()
                .map_or(true, |id| schedule.content_id == id)
    }
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// All pending, unclaimed schedules whose time is at or before `now`,
    /// oldest first.
    async fn get_pending_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>>;

    /// Move a pending schedule to a terminal state, stamping `executed_at`.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown id; `InvalidInput` when the schedule is
    /// already terminal or `status` is not terminal.
    async fn update_schedule_status(
        &self,
        id: &str,
        status: ScheduleStatus,
        last_error: Option<&str>,
    ) -> Result<()>;

    async fn get_content(&self, id: &str) -> Result<Option<Content>>;

    /// # Errors
    ///
    /// `NotFound` for an unknown id.
    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_result: Option<&PostResult>,
    ) -> Result<()>;

    /// Create a pending schedule and return its id.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the content already has a pending schedule.
    async fn save_schedule(
        &self,
        content_id: &str,
        schedule_time: DateTime<Utc>,
        platform: Platform,
    ) -> Result<String>;

    async fn save_content(&self, content: &Content) -> Result<()>;

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledPost>>;

    /// Schedules matching `filter`, ordered by schedule time
    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduledPost>>;

    /// Cancel a pending, unclaimed schedule. Returns `false` when nothing was
    /// cancelled (unknown, terminal, or already claimed).
    async fn cancel_schedule(&self, id: &str) -> Result<bool>;

    /// Atomically take ownership of a pending, unclaimed schedule.
    async fn claim_schedule(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Fail pending schedules claimed before `older_than`; returns how many.
    async fn fail_stale_claims(&self, older_than: DateTime<Utc>) -> Result<u64>;

    async fn queue_stats(&self, now: DateTime<Utc>) -> Result<QueueStats>;
}

/// Message recorded on schedules whose claim outlived the claim timeout
pub const INTERRUPTED_DISPATCH: &str = "dispatch interrupted";
