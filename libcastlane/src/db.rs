//! SQLite-backed schedule store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{CastlaneError, DbError, Result};
use crate::store::{ScheduleFilter, ScheduleStore, INTERRUPTED_DISPATCH};
use crate::types::{
    Content, ContentStatus, Platform, PostResult, QueueStats, ScheduleStatus, ScheduledPost,
};

const SCHEDULE_COLUMNS: &str = "id, content_id, platform, schedule_time, status, created_at, \
                                executed_at, claimed_at, last_error";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Forward slashes work in SQLite URLs on every platform; mode=rwc
        // creates the file when missing
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// Limited to one connection: every SQLite in-memory connection is a
    /// separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    async fn schedule_status(&self, id: &str) -> Result<Option<String>> {
        let status = sqlx::query_scalar("SELECT status FROM scheduled_posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(status)
    }
}

fn timestamp(table: &'static str, secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| corrupt(table, format!("bad timestamp {}", secs)))
}

fn corrupt(table: &'static str, reason: impl Into<String>) -> CastlaneError {
    DbError::CorruptRow {
        table,
        reason: reason.into(),
    }
    .into()
}

fn parse_field<T: std::str::FromStr>(table: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| corrupt(table, format!("unexpected value '{}'", value)))
}

fn schedule_from_row(row: &SqliteRow) -> Result<ScheduledPost> {
    const TABLE: &str = "scheduled_posts";

    let optional_ts = |column: &str| -> Result<Option<DateTime<Utc>>> {
        row.get::<Option<i64>, _>(column)
            .map(|secs| timestamp(TABLE, secs))
            .transpose()
    };

    Ok(ScheduledPost {
        id: row.get("id"),
        content_id: row.get("content_id"),
        platform: parse_field(TABLE, row.get::<&str, _>("platform"))?,
        schedule_time: timestamp(TABLE, row.get("schedule_time"))?,
        status: parse_field(TABLE, row.get::<&str, _>("status"))?,
        created_at: timestamp(TABLE, row.get("created_at"))?,
        executed_at: optional_ts("executed_at")?,
        claimed_at: optional_ts("claimed_at")?,
        last_error: row.get("last_error"),
    })
}

fn content_from_row(row: &SqliteRow) -> Result<Content> {
    const TABLE: &str = "content";

    let hashtags: Vec<String> = serde_json::from_str(row.get::<&str, _>("hashtags"))
        .map_err(|e| corrupt(TABLE, format!("hashtags: {}", e)))?;
    let post_result = row
        .get::<Option<&str>, _>("post_result")
        .map(serde_json::from_str::<PostResult>)
        .transpose()
        .map_err(|e| corrupt(TABLE, format!("post_result: {}", e)))?;

    Ok(Content {
        id: row.get("id"),
        text: row.get("text"),
        hashtags,
        platform: parse_field(TABLE, row.get::<&str, _>("platform"))?,
        content_type: parse_field(TABLE, row.get::<&str, _>("content_type"))?,
        status: parse_field(TABLE, row.get::<&str, _>("status"))?,
        media_url: row.get("media_url"),
        post_result,
        created_at: timestamp(TABLE, row.get("created_at"))?,
        updated_at: timestamp(TABLE, row.get("updated_at"))?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| CastlaneError::InvalidInput(format!("Cannot serialize value: {}", e)))
}

#[async_trait]
impl ScheduleStore for Database {
    async fn get_pending_schedules(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        let query = format!(
            r#"
            SELECT {}
            FROM scheduled_posts
            WHERE status = 'pending' AND claimed_at IS NULL AND schedule_time <= ?
            ORDER BY schedule_time ASC, created_at ASC
            "#,
            SCHEDULE_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(now.timestamp())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn update_schedule_status(
        &self,
        id: &str,
        status: ScheduleStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(CastlaneError::InvalidInput(format!(
                "Cannot move schedule {} back to {}",
                id, status
            )));
        }

        let updated = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = ?, executed_at = ?, last_error = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now().timestamp())
        .bind(last_error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .rows_affected();

        if updated == 1 {
            return Ok(());
        }

        match self.schedule_status(id).await? {
            None => Err(CastlaneError::NotFound(format!("Schedule not found: {}", id))),
            Some(current) => Err(CastlaneError::InvalidInput(format!(
                "Cannot move schedule {} from {} to {}",
                id, current, status
            ))),
        }
    }

    async fn get_content(&self, id: &str) -> Result<Option<Content>> {
        let row = sqlx::query(
            r#"
            SELECT id, text, hashtags, platform, content_type, status, media_url,
                   post_result, created_at, updated_at
            FROM content WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.as_ref().map(content_from_row).transpose()
    }

    async fn update_content_status(
        &self,
        id: &str,
        status: ContentStatus,
        post_result: Option<&PostResult>,
    ) -> Result<()> {
        let post_result = post_result.map(to_json).transpose()?;

        let updated = sqlx::query(
            r#"
            UPDATE content
            SET status = ?, post_result = COALESCE(?, post_result), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(post_result)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .rows_affected();

        if updated == 0 {
            return Err(CastlaneError::NotFound(format!("Content not found: {}", id)));
        }
        Ok(())
    }

    async fn save_schedule(
        &self,
        content_id: &str,
        schedule_time: DateTime<Utc>,
        platform: Platform,
    ) -> Result<String> {
        let schedule = ScheduledPost::new(content_id.to_string(), platform, schedule_time);

        let inserted = sqlx::query(
            r#"
            INSERT INTO scheduled_posts (id, content_id, platform, schedule_time, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&schedule.id)
        .bind(&schedule.content_id)
        .bind(schedule.platform.as_str())
        .bind(schedule.schedule_time.timestamp())
        .bind(schedule.status.as_str())
        .bind(schedule.created_at.timestamp())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(schedule.id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CastlaneError::InvalidInput(format!(
                    "Content {} already has a pending schedule",
                    content_id
                )))
            }
            Err(e) => Err(DbError::SqlxError(e).into()),
        }
    }

    async fn save_content(&self, content: &Content) -> Result<()> {
        let hashtags = to_json(&content.hashtags)?;
        let post_result = content.post_result.as_ref().map(to_json).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO content (id, text, hashtags, platform, content_type, status, media_url,
                                 post_result, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                text = excluded.text,
                hashtags = excluded.hashtags,
                platform = excluded.platform,
                content_type = excluded.content_type,
                status = excluded.status,
                media_url = excluded.media_url,
                post_result = excluded.post_result,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&content.id)
        .bind(&content.text)
        .bind(hashtags)
        .bind(content.platform.as_str())
        .bind(content.content_type.as_str())
        .bind(content.status.as_str())
        .bind(&content.media_url)
        .bind(post_result)
        .bind(content.created_at.timestamp())
        .bind(content.updated_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    async fn get_schedule(&self, id: &str) -> Result<Option<ScheduledPost>> {
        let query = format!("SELECT {} FROM scheduled_posts WHERE id = ?", SCHEDULE_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.as_ref().map(schedule_from_row).transpose()
    }

    async fn list_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<ScheduledPost>> {
        let mut where_clauses = vec!["1=1"];
        if filter.status.is_some() {
            where_clauses.push("status = ?");
        }
        if filter.platform.is_some() {
            where_clauses.push("platform = ?");
        }
        if filter.content_id.is_some() {
            where_clauses.push("content_id = ?");
        }

        let query_str = format!(
            r#"
            SELECT {}
            FROM scheduled_posts
            WHERE {}
            ORDER BY schedule_time ASC, created_at ASC
            LIMIT ?
            "#,
            SCHEDULE_COLUMNS,
            where_clauses.join(" AND ")
        );

        // Bind in the same order as the WHERE clauses
        let mut query = sqlx::query(&query_str);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(platform) = filter.platform {
            query = query.bind(platform.as_str());
        }
        if let Some(content_id) = &filter.content_id {
            query = query.bind(content_id);
        }
        // SQLite treats a negative LIMIT as unbounded
        query = query.bind(filter.limit.map_or(-1, |l| l as i64));

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter().map(schedule_from_row).collect()
    }

    async fn cancel_schedule(&self, id: &str) -> Result<bool> {
        let cancelled = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'cancelled', executed_at = ?
            WHERE id = ? AND status = 'pending' AND claimed_at IS NULL
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .rows_affected();

        Ok(cancelled == 1)
    }

    async fn claim_schedule(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let claimed = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET claimed_at = ?
            WHERE id = ? AND status = 'pending' AND claimed_at IS NULL
            "#,
        )
        .bind(now.timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .rows_affected();

        Ok(claimed == 1)
    }

    async fn fail_stale_claims(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let failed = sqlx::query(
            r#"
            UPDATE scheduled_posts
            SET status = 'failed', executed_at = ?, last_error = ?
            WHERE status = 'pending' AND claimed_at IS NOT NULL AND claimed_at < ?
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(INTERRUPTED_DISPATCH)
        .bind(older_than.timestamp())
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .rows_affected();

        Ok(failed)
    }

    async fn queue_stats(&self, now: DateTime<Utc>) -> Result<QueueStats> {
        let rows = sqlx::query(
            r#"
            SELECT status,
                   COUNT(*) AS total,
                   SUM(CASE WHEN schedule_time <= ? THEN 1 ELSE 0 END) AS due
            FROM scheduled_posts
            GROUP BY status
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut stats = QueueStats::default();
        for row in &rows {
            let status: ScheduleStatus = parse_field("scheduled_posts", row.get::<&str, _>("status"))?;
            let total = row.get::<i64, _>("total") as u64;
            match status {
                ScheduleStatus::Pending => {
                    stats.pending = total;
                    stats.overdue = row.get::<i64, _>("due") as u64;
                }
                ScheduleStatus::Completed => stats.completed = total,
                ScheduleStatus::Failed => stats.failed = total,
                ScheduleStatus::Cancelled => stats.cancelled = total,
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
    use tempfile::TempDir;

    fn test_content(platform: Platform) -> Content {
        Content::new(
            "Scheduled hello".to_string(),
            vec!["#rust".to_string()],
            platform,
            ContentType::Post,
        )
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        #[cfg(unix)]
        let invalid_path = "/tmp/test\0invalid.db";

        #[cfg(windows)]
        let invalid_path = "C:\\invalid<>path\\test.db";

        let result = Database::new(invalid_path).await;
        assert!(matches!(result, Err(CastlaneError::Database(_))));
    }

    #[tokio::test]
    async fn test_database_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("dir").join("castlane.db");

        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        db.save_content(&test_content(Platform::Twitter))
            .await
            .unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_content_round_trip_preserves_fields() {
        let db = Database::in_memory().await.unwrap();
        let content = test_content(Platform::Instagram).with_media("https://cdn.example.com/a.jpg");
        db.save_content(&content).await.unwrap();

        let loaded = db.get_content(&content.id).await.unwrap().unwrap();
        assert_eq!(loaded.text, content.text);
        assert_eq!(loaded.hashtags, vec!["#rust"]);
        assert_eq!(loaded.platform, Platform::Instagram);
        assert_eq!(loaded.status, ContentStatus::Draft);
        assert_eq!(loaded.media_url.as_deref(), Some("https://cdn.example.com/a.jpg"));
        assert!(loaded.post_result.is_none());
    }

    #[tokio::test]
    async fn test_get_nonexistent_records_return_none() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.get_content("missing").await.unwrap().is_none());
        assert!(db.get_schedule("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_content_status_stores_post_result() {
        let db = Database::in_memory().await.unwrap();
        let content = test_content(Platform::LinkedIn);
        db.save_content(&content).await.unwrap();

        let result = PostResult::failed(Platform::LinkedIn, "Remote API error".to_string(), Some(401));
        db.update_content_status(&content.id, ContentStatus::Failed, Some(&result))
            .await
            .unwrap();

        let loaded = db.get_content(&content.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ContentStatus::Failed);
        let stored = loaded.post_result.unwrap();
        assert!(!stored.success);
        assert_eq!(stored.status_code, Some(401));

        let err = db
            .update_content_status("missing", ContentStatus::Posted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_schedules_respect_time_and_status() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();

        let mut ids = Vec::new();
        for offset in [-120, -60, 3600] {
            let content = test_content(Platform::Twitter);
            db.save_content(&content).await.unwrap();
            ids.push(
                db.save_schedule(&content.id, now + Duration::seconds(offset), Platform::Twitter)
                    .await
                    .unwrap(),
            );
        }
        db.cancel_schedule(&ids[1]).await.unwrap();

        let due = db.get_pending_schedules(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ids[0]);
        assert_eq!(due[0].status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn test_schedule_terminal_transitions() {
        let db = Database::in_memory().await.unwrap();
        let content = test_content(Platform::Facebook);
        db.save_content(&content).await.unwrap();
        let id = db
            .save_schedule(&content.id, Utc::now(), Platform::Facebook)
            .await
            .unwrap();

        db.update_schedule_status(&id, ScheduleStatus::Failed, Some("Remote API error (400): bad"))
            .await
            .unwrap();

        let schedule = db.get_schedule(&id).await.unwrap().unwrap();
        assert_eq!(schedule.status, ScheduleStatus::Failed);
        assert!(schedule.executed_at.is_some());
        assert_eq!(
            schedule.last_error.as_deref(),
            Some("Remote API error (400): bad")
        );

        let err = db
            .update_schedule_status(&id, ScheduleStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::InvalidInput(_)));

        let err = db
            .update_schedule_status("missing", ScheduleStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pending_is_not_a_valid_target() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .save_schedule("c1", Utc::now(), Platform::Twitter)
            .await
            .unwrap();

        let err = db
            .update_schedule_status(&id, ScheduleStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unique_pending_schedule_per_content() {
        let db = Database::in_memory().await.unwrap();
        let content = test_content(Platform::Twitter);
        db.save_content(&content).await.unwrap();

        let first = db
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .unwrap();
        let err = db
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .unwrap_err();
        assert!(matches!(err, CastlaneError::InvalidInput(_)));

        db.update_schedule_status(&first, ScheduleStatus::Completed, None)
            .await
            .unwrap();
        assert!(db
            .save_schedule(&content.id, Utc::now(), Platform::Twitter)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_claim_excludes_from_pending_and_cancel() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();
        let id = db
            .save_schedule("c1", now - Duration::seconds(5), Platform::Twitter)
            .await
            .unwrap();

        assert!(db.claim_schedule(&id, now).await.unwrap());
        assert!(!db.claim_schedule(&id, now).await.unwrap());
        assert!(db.get_pending_schedules(now).await.unwrap().is_empty());
        assert!(!db.cancel_schedule(&id).await.unwrap());

        // The claim holder can still finish the schedule
        db.update_schedule_status(&id, ScheduleStatus::Completed, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fail_stale_claims_only_touches_old_claims() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();
        let stale = db
            .save_schedule("c1", now, Platform::Twitter)
            .await
            .unwrap();
        let fresh = db
            .save_schedule("c2", now, Platform::Twitter)
            .await
            .unwrap();
        let unclaimed = db
            .save_schedule("c3", now, Platform::Twitter)
            .await
            .unwrap();

        db.claim_schedule(&stale, now - Duration::hours(1))
            .await
            .unwrap();
        db.claim_schedule(&fresh, now).await.unwrap();

        let failed = db
            .fail_stale_claims(now - Duration::minutes(15))
            .await
            .unwrap();
        assert_eq!(failed, 1);

        let stale = db.get_schedule(&stale).await.unwrap().unwrap();
        assert_eq!(stale.status, ScheduleStatus::Failed);
        assert_eq!(stale.last_error.as_deref(), Some(INTERRUPTED_DISPATCH));

        let fresh = db.get_schedule(&fresh).await.unwrap().unwrap();
        assert_eq!(fresh.status, ScheduleStatus::Pending);
        let unclaimed = db.get_schedule(&unclaimed).await.unwrap().unwrap();
        assert_eq!(unclaimed.status, ScheduleStatus::Pending);
    }

    #[tokio::test]
    async fn test_list_schedules_with_filter() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();
        db.save_schedule("c1", now, Platform::Twitter).await.unwrap();
        db.save_schedule("c2", now + Duration::minutes(1), Platform::LinkedIn)
            .await
            .unwrap();
        let cancelled = db
            .save_schedule("c3", now + Duration::minutes(2), Platform::Twitter)
            .await
            .unwrap();
        db.cancel_schedule(&cancelled).await.unwrap();

        let all = db.list_schedules(&ScheduleFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content_id, "c1");

        let twitter_pending = db
            .list_schedules(&ScheduleFilter {
                status: Some(ScheduleStatus::Pending),
                platform: Some(Platform::Twitter),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(twitter_pending.len(), 1);
        assert_eq!(twitter_pending[0].content_id, "c1");

        let limited = db
            .list_schedules(&ScheduleFilter {
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_queue_stats_counts_by_status() {
        let db = Database::in_memory().await.unwrap();
        let now = Utc::now();
        db.save_schedule("c1", now - Duration::minutes(1), Platform::Twitter)
            .await
            .unwrap();
        db.save_schedule("c2", now + Duration::hours(1), Platform::Twitter)
            .await
            .unwrap();
        let done = db
            .save_schedule("c3", now, Platform::Twitter)
            .await
            .unwrap();
        db.update_schedule_status(&done, ScheduleStatus::Completed, None)
            .await
            .unwrap();

        let stats = db.queue_stats(now).await.unwrap();
        assert_eq!(
            stats,
            QueueStats {
                pending: 2,
                completed: 1,
                failed: 0,
                cancelled: 0,
                overdue: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_single_winner() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("claims.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        let id = db
            .save_schedule("c1", Utc::now(), Platform::Twitter)
            .await
            .unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let db = db.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                db.claim_schedule(&id, Utc::now()).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
