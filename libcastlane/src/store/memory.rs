//! In-process store
//!
//! Holds everything behind a single mutex, which makes every operation
//! trivially atomic. Used by tests and by callers that do not need
//! persistence.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ScheduleFilter, ScheduleStore, INTERRUPTED_DISPATCH};
use crate::error::{CastlaneError, Result};
use crate::types::{
    Content, ContentStatus, Platform, PostResult, QueueStats, ScheduleStatus, ScheduledPost,
};

#[derive(Default)]
struct Inner {
    content: HashMap<String, Content>,
    schedules: HashMap<String, ScheduledPost>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave a record half-written
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted(mut schedules: Vec<ScheduledPost>) -> Vec<ScheduledPost> {
    schedules.sort_by(|a, b| {
        a.schedule_time
            .cmp(&b.schedule_time)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    schedules
}

#[async_trait]
impl ScheduleStore for MemoryStore {
    async fn get_pending_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        let inner = self.lock();
        let due = inner
            .schedules
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        Ok(sorted(due))
    }

    async fn update_schedule_status(
        &self,
        id: &str,
        status: ScheduleStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let schedule = inner
            .schedules
            .get_mut(id)
            .ok_or_else(|| CastlaneError::NotFound(format!("Schedule not found: {}", id)))?;

        if !schedule.status.can_transition_to(status) {
            return Err(CastlaneError::InvalidInput(format!(
                "Cannot move schedule {} from {} to {}",
                id, schedule.status, status
            )));
        }

        schedule.status = status;
        schedule.executed_at = Some(Utc::now());
        schedule.last_error = last_error.map(str::to_string);
        Ok(())
    }

    async fn get_content(&self, id: &str) -> Result<Option<Content>> {
        Ok(self.lock().content.get(id).cloned())
    }

    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_result: Option<&PostResult>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let content = inner
            .content
            .get_mut(id)
            .ok_or_else(|| CastlaneError::NotFound(format!("Content not found: {}", id)))?;

        content.status = status;
        if let Some(result) = post_result {
            content.post_result = Some(result.clone());
        }
        content.updated_at = Utc::now();
        Ok(())
    }

    async fn save_schedule(
        &self,
        content_id: &str,
        schedule_time: DateTime<Utc>,
        platform: Platform,
    ) -> Result<String> {
        let mut inner = self.lock();
        let duplicate = inner
            .schedules
            .values()
            .any(|s| s.content_id == content_id && s.status == ScheduleStatus::Pending);
        if duplicate {
            return Err(CastlaneError::InvalidInput(format!(
                "Content {} already has a pending schedule",
                content_id
            )));
        }

        let schedule = ScheduledPost::new(content_id.to_string(), platform, schedule_time);
        let id = schedule.id.clone();
        inner.schedules.insert(id.clone(), schedule);
        Ok(id)
    }

    async fn save_content(&self, content: &Content) -> Result<()> {
        self.lock()
            .content
            .insert(content.id.clone(), content.clone());
        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledPost>> {
        Ok(self.lock().schedules.get(id).cloned())
    }

    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduledPost>> {
        let inner = self.lock();
        let matching = inner
            .schedules
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        let mut schedules = sorted(matching);
        if let Some(limit) = filter.limit {
            schedules.truncate(limit);
        }
        Ok(schedules)
    }

    async fn cancel_schedule(&self, id: &str) -> Result<bool> {
        let mut inner = self.lock();
        match inner.schedules.get_mut(id) {
            Some(s) if s.status == ScheduleStatus::Pending && s.claimed_at.is_none() => {
                s.status = ScheduleStatus::Cancelled;
                s.executed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_schedule(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.lock();
        match inner.schedules.get_mut(id) {
            Some(s) if s.status == ScheduleStatus::Pending && s.claimed_at.is_none() => {
                s.claimed_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_stale_claims(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock();
        let now = Utc::now();
        let mut failed = 0;
        for schedule in inner.schedules.values_mut() {
            let stale = schedule.status == ScheduleStatus::Pending
                && schedule.claimed_at.is_some_and(|at| at < older_than);
            if stale {
                schedule.status = ScheduleStatus::Failed;
                schedule.executed_at = Some(now);
                schedule.last_error = Some(INTERRUPTED_DISPATCH.to_string());
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn queue_stats(&self, now: DateTime<Utc>) -> Result<QueueStats> {
        let inner = self.lock();
        let mut stats = QueueStats::default();
        for schedule in inner.schedules.values() {
            match schedule.status {
                ScheduleStatus::Pending => {
                    stats.pending += 1;
                    if schedule.schedule_time <= now {
                        stats.overdue += 1;
                    }
                }
                ScheduleStatus::Completed => stats.completed += 1,
                ScheduleStatus::Failed => stats.failed += 1,
                ScheduleStatus::Cancelled => stats.cancelled += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentType;
    use chrono::Duration;

    async fn store_with_content() -> (MemoryStore, Content) {
        let store = MemoryStore::new();
        let content = Content::new(
            "Hello".to_string(),
            vec![],
            Platform::Twitter,
            ContentType::Post,
        );
        store.save_content(&content).await.unwrap();
        (store, content)
    }

    #[tokio::test]
    async fn test_pending_schedules_are_due_and_ordered() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let late = store
            .save_schedule("a", now - Duration::minutes(1), Platform::Twitter)
            .await
            .unwrap();
        let early = store
            .save_schedule("b", now - Duration::hours(1), Platform::Twitter)
            .await
            .unwrap();
        store
            .save_schedule("c", now + Duration::hours(1), Platform::Twitter)
            .await
            .unwrap();

        let due = store.get_pending_schedules(now).await.unwrap();
        let ids: Vec<_> = due.iter().map(|s| s.id.clone()).collect();
        assert_eq!(ids, vec![early, late]);
    }

    #[tokio::test]
    async fn test_terminal_states_are_final() {
        let (store, content) = store_with_content().await;
        let id = store
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .unwrap();

        store
            .update_schedule_status(&id, ScheduleStatus::Completed, None)
            .await
            .unwrap();
        let err = store
            .update_schedule_status(&id, ScheduleStatus::Failed, Some("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::InvalidInput(_)));

        let schedule = store.get_schedule(&id).await.unwrap().unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Completed);
        assert!(schedule.executed_at.is_some());
        assert!(schedule.last_error.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_schedule_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_schedule_status("missing", ScheduleStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_one_pending_schedule_per_content() {
        let (store, content) = store_with_content().await;
        let first = store
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .unwrap();
        assert!(store
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .is_err());

        assert!(store.cancel_schedule(&first).await.unwrap());
        assert!(store
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_and_blocks_cancel() {
        let (store, content) = store_with_content().await;
        let now = Utc::now();
        let id = store
            .save_schedule(&content.id, now, Platform::Twitter)
            .await
            .unwrap();

        assert!(store.claim_schedule(&id, now).await.unwrap());
        assert!(!store.claim_schedule(&id, now).await.unwrap());
        assert!(!store.cancel_schedule(&id).await.unwrap());
        assert!(store.get_pending_schedules(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_claims_fail() {
        let (store, content) = store_with_content().await;
        let now = Utc::now();
        let id = store
            .save_schedule(&content.id, now, Platform::Twitter)
            .await
            .unwrap();
        store
            .claim_schedule(&id, now - Duration::hours(2))
            .await
            .unwrap();

        let failed = store
            .fail_stale_claims(now - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(failed, 1);

        let schedule = store.get_schedule(&id).await.unwrap().unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Failed);
        assert_eq!(schedule.last_error.as_deref(), Some(INTERRUPTED_DISPATCH));
    }

    #[tokio::test]
    async fn test_update_content_status_keeps_result() {
        let (store, content) = store_with_content().await;
        let result = PostResult::succeeded(Platform::Twitter, vec!["42".to_string()], None);
        store
            .update_content_status(&content.id, ContentStatus::Posted, Some(&result))
            .await
            .unwrap();

        let stored = store.get_content(&content.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ContentStatus::Posted);
        assert_eq!(stored.post_result.unwrap().post_id(), Some("42"));

        let err = store
            .update_content_status("nope", ContentStatus::Failed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_queue_stats() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .save_schedule("a", now - Duration::minutes(5), Platform::Twitter)
            .await
            .unwrap();
        store
            .save_schedule("b", now + Duration::minutes(5), Platform::LinkedIn)
            .await
            .unwrap();
        let done = store
            .save_schedule("c", now, Platform::Facebook)
            .await
            .unwrap();
        store
            .update_schedule_status(&done, ScheduleStatus::Completed, None)
            .await
            .unwrap();

        let stats = store.queue_stats(now).await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.total(), 3);
    }
}
