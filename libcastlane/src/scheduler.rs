//! Background dispatch of due schedules
//!
//! [`SchedulerLoop`] alternates between two phases. While [`Phase::Idle`] it
//! waits for the next tick of a fixed wall-clock interval; each tick runs one
//! [`Phase::Checking`] pass that fetches every due schedule and dispatches
//! them one at a time. A failure on one schedule is recorded on that schedule
//! and the pass moves on.
//!
//! Each schedule is claimed in the store before dispatch, so a second loop
//! running against the same store never posts it twice. A claim that is
//! never finished (the process died mid-dispatch) is failed with
//! [`INTERRUPTED_DISPATCH`](crate::store::INTERRUPTED_DISPATCH) once it is
//! older than the claim timeout; it is never dispatched again.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::platforms::AdapterRegistry;
use crate::store::ScheduleStore;
use crate::types::{ContentStatus, ScheduleStatus, ScheduledPost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Checking,
}

/// Counts from one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Schedules that were due when the pass started
    pub due: usize,
    pub completed: usize,
    pub failed: usize,
    /// Due schedules this pass did not finish: claimed elsewhere, cancelled
    /// in the meantime, or hit a store error
    pub skipped: usize,
    /// Abandoned claims failed at the start of the pass
    pub interrupted: u64,
}

enum Outcome {
    Completed,
    Failed,
    Skipped,
}

pub struct SchedulerLoop {
    store: Arc<dyn ScheduleStore>,
    adapters: AdapterRegistry,
    config: SchedulerConfig,
    phase: watch::Sender<Phase>,
}

impl SchedulerLoop {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        adapters: AdapterRegistry,
        config: SchedulerConfig,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            store,
            adapters,
            config,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that observes every phase change
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Drive passes on the poll interval until `shutdown` turns true or its
    /// sender is dropped. A pass in progress always runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.config.poll_interval().as_secs(),
            claim_timeout_secs = self.config.claim_timeout,
            "Scheduler started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {
                    match self.run_pass(Utc::now()).await {
                        Ok(report) if report.due > 0 || report.interrupted > 0 => {
                            info!(
                                due = report.due,
                                completed = report.completed,
                                failed = report.failed,
                                skipped = report.skipped,
                                interrupted = report.interrupted,
                                "Discovery pass finished"
                            );
                        }
                        Ok(_) => debug!("Nothing due"),
                        Err(e) => error!(error = %e, "Discovery pass failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Run one discovery-and-dispatch pass as of `now`.
    ///
    /// # Errors
    ///
    /// Only when the due schedules cannot be fetched. Errors on individual
    /// schedules are logged and counted as skipped.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport> {
        self.phase.send_replace(Phase::Checking);
        let report = self.check(now).await;
        self.phase.send_replace(Phase::Idle);
        report
    }

    async fn check(&self, now: DateTime<Utc>) -> Result<PassReport> {
        let mut report = PassReport::default();

        let cutoff = claim_cutoff(now, self.config.claim_timeout);
        match self.store.fail_stale_claims(cutoff).await {
            Ok(count) => {
                if count > 0 {
                    warn!(count, "Failed schedules whose dispatch was interrupted");
                }
                report.interrupted = count;
            }
            Err(e) => error!(error = %e, "Could not recover abandoned claims"),
        }

        let due = self.store.get_pending_schedules(now).await?;
        report.due = due.len();

        for schedule in &due {
            match self.dispatch(schedule, now).await {
                Ok(Outcome::Completed) => report.completed += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    error!(
                        schedule_id = %schedule.id,
                        content_id = %schedule.content_id,
                        error = %e,
                        "Could not process schedule"
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }

    async fn dispatch(&self, schedule: &ScheduledPost, now: DateTime<Utc>) -> Result<Outcome> {
        if !self.store.claim_schedule(&schedule.id, now).await? {
            debug!(schedule_id = %schedule.id, "Schedule already claimed or cancelled");
            return Ok(Outcome::Skipped);
        }

        let Some(content) = self.store.get_content(&schedule.content_id).await? else {
            let reason = format!("Content not found: {}", schedule.content_id);
            self.fail(schedule, &reason).await?;
            return Ok(Outcome::Failed);
        };

        if content.status == ContentStatus::Posted || !content.live_post_ids().is_empty() {
            self.store
                .update_schedule_status(
                    &schedule.id,
                    ScheduleStatus::Cancelled,
                    Some("Content already published"),
                )
                .await?;
            warn!(
                schedule_id = %schedule.id,
                content_id = %content.id,
                status = %ScheduleStatus::Cancelled,
                "Content already published, schedule dropped"
            );
            return Ok(Outcome::Skipped);
        }

        let Some(adapter) = self.adapters.get(schedule.platform) else {
            let reason = format!(
                "Configuration error: no adapter registered for {}",
                schedule.platform
            );
            self.fail(schedule, &reason).await?;
            return Ok(Outcome::Failed);
        };

        let result = adapter.post(&content).await;

        if result.success {
            self.store
                .update_schedule_status(&schedule.id, ScheduleStatus::Completed, None)
                .await?;
            self.store
                .update_content_status(&content.id, ContentStatus::Posted, Some(&result))
                .await?;
            info!(
                schedule_id = %schedule.id,
                content_id = %content.id,
                platform = %schedule.platform,
                post_id = result.post_id().unwrap_or_default(),
                status = %ScheduleStatus::Completed,
                "Scheduled post published"
            );
            Ok(Outcome::Completed)
        } else {
            let reason = result
                .error
                .clone()
                .unwrap_or_else(|| "Platform reported failure".to_string());
            self.fail(schedule, &reason).await?;
            self.store
                .update_content_status(&content.id, ContentStatus::Failed, Some(&result))
                .await?;
            Ok(Outcome::Failed)
        }
    }

    async fn fail(&self, schedule: &ScheduledPost, reason: &str) -> Result<()> {
        self.store
            .update_schedule_status(&schedule.id, ScheduleStatus::Failed, Some(reason))
            .await?;
        warn!(
            schedule_id = %schedule.id,
            content_id = %schedule.content_id,
            platform = %schedule.platform,
            status = %ScheduleStatus::Failed,
            error = reason,
            "Scheduled post failed"
        );
        Ok(())
    }
}

/// Claims older than this are abandoned. Timeouts too large to represent
/// reach back to the earliest time, so nothing is ever stale.
fn claim_cutoff(now: DateTime<Utc>, timeout_secs: u64) -> DateTime<Utc> {
    i64::try_from(timeout_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|timeout| now.checked_sub_signed(timeout))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
