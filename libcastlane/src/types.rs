//! Core types for Castlane

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CastlaneError;

/// Character and hashtag limits a platform enforces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformLimits {
    /// Nominal maximum post length in characters
    pub max_length: usize,
    /// Maximum number of hashtags kept in a post
    pub max_hashtags: usize,
    /// Length cap actually applied before submission (may be tighter than nominal)
    pub practical_length: usize,
}

/// Supported publishing platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    #[serde(rename = "linkedin")]
    LinkedIn,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Twitter,
        Platform::LinkedIn,
        Platform::Facebook,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::LinkedIn => "linkedin",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    pub fn limits(&self) -> PlatformLimits {
        match self {
            Platform::Twitter => PlatformLimits {
                max_length: 280,
                max_hashtags: 3,
                practical_length: 280,
            },
            // 3000 is accepted by the API; posts past ~1300 characters get
            // folded behind "see more" and lose engagement.
            Platform::LinkedIn => PlatformLimits {
                max_length: 3000,
                max_hashtags: 5,
                practical_length: 1300,
            },
            Platform::Facebook => PlatformLimits {
                max_length: 2000,
                max_hashtags: 3,
                practical_length: 2000,
            },
            Platform::Instagram => PlatformLimits {
                max_length: 2200,
                max_hashtags: 15,
                practical_length: 2200,
            },
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = CastlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" => Ok(Platform::Twitter),
            "linkedin" => Ok(Platform::LinkedIn),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            other => Err(CastlaneError::InvalidInput(format!(
                "Unsupported platform: '{}'. Valid options: twitter, linkedin, facebook, instagram",
                other
            ))),
        }
    }
}

/// Shape of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Post,
    Thread,
    Poll,
    Story,
    Article,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Post => "post",
            ContentType::Thread => "thread",
            ContentType::Poll => "poll",
            ContentType::Story => "story",
            ContentType::Article => "article",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = CastlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "post" => Ok(ContentType::Post),
            "thread" => Ok(ContentType::Thread),
            "poll" => Ok(ContentType::Poll),
            "story" => Ok(ContentType::Story),
            "article" => Ok(ContentType::Article),
            other => Err(CastlaneError::InvalidInput(format!(
                "Unknown content type: '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Posted,
    Failed,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Posted => "posted",
            ContentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = CastlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(ContentStatus::Draft),
            "posted" => Ok(ContentStatus::Posted),
            "failed" => Ok(ContentStatus::Failed),
            other => Err(CastlaneError::InvalidInput(format!(
                "Unknown content status: '{}'",
                other
            ))),
        }
    }
}

/// Lifecycle of a scheduled post.
///
/// `Pending` is the only non-terminal state; every transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl ScheduleStatus {
    pub const ALL: [ScheduleStatus; 4] = [
        ScheduleStatus::Pending,
        ScheduleStatus::Completed,
        ScheduleStatus::Failed,
        ScheduleStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "pending",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }

    pub fn can_transition_to(&self, next: ScheduleStatus) -> bool {
        matches!(self, ScheduleStatus::Pending) && next.is_terminal()
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = CastlaneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(ScheduleStatus::Pending),
            "completed" => Ok(ScheduleStatus::Completed),
            "failed" => Ok(ScheduleStatus::Failed),
            "cancelled" | "canceled" => Ok(ScheduleStatus::Cancelled),
            other => Err(CastlaneError::InvalidInput(format!(
                "Unknown schedule status: '{}'",
                other
            ))),
        }
    }
}

/// The account a platform's credentials resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCheck {
    pub platform: Platform,
    /// Handle, page name or author URN
    pub account: String,
}

/// Engagement counters for one published post, keyed by the platform's own
/// metric names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub platform: Platform,
    pub post_id: String,
    pub counts: BTreeMap<String, u64>,
    pub retrieved_at: DateTime<Utc>,
}

impl PostMetrics {
    pub fn new(platform: Platform, post_id: &str, counts: BTreeMap<String, u64>) -> Self {
        Self {
            platform,
            post_id: post_id.to_string(),
            counts,
            retrieved_at: Utc::now(),
        }
    }
}

/// Outcome of a dispatch attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    pub success: bool,
    pub platform: Platform,
    /// Platform post ids in publication order; a thread lists every reply.
    #[serde(default)]
    pub post_ids: Vec<String>,
    pub url: Option<String>,
    pub error: Option<String>,
    /// Remote HTTP status when the platform rejected the call
    pub status_code: Option<u16>,
    pub posted_at: DateTime<Utc>,
}

impl PostResult {
    pub fn succeeded(platform: Platform, post_ids: Vec<String>, url: Option<String>) -> Self {
        Self {
            success: true,
            platform,
            post_ids,
            url,
            error: None,
            status_code: None,
            posted_at: Utc::now(),
        }
    }

    pub fn failed(platform: Platform, error: String, status_code: Option<u16>) -> Self {
        Self {
            success: false,
            platform,
            post_ids: Vec::new(),
            url: None,
            error: Some(error),
            status_code,
            posted_at: Utc::now(),
        }
    }

    /// First (or only) platform post id
    pub fn post_id(&self) -> Option<&str> {
        self.post_ids.first().map(String::as_str)
    }
}

/// A piece of publishable content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub text: String,
    /// Ordered, de-duplicated, each with a leading `#`
    pub hashtags: Vec<String>,
    pub platform: Platform,
    pub content_type: ContentType,
    pub status: ContentStatus,
    /// Publicly reachable media reference; required by Instagram
    pub media_url: Option<String>,
    pub post_result: Option<PostResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    pub fn new(
        text: String,
        hashtags: Vec<String>,
        platform: Platform,
        content_type: ContentType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            text,
            hashtags: normalize_hashtags(hashtags),
            platform,
            content_type,
            status: ContentStatus::Draft,
            media_url: None,
            post_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_media(mut self, media_url: impl Into<String>) -> Self {
        self.media_url = Some(media_url.into());
        self
    }

    /// Ids of posts that are live for this content, from a full or an
    /// interrupted publication.
    pub fn live_post_ids(&self) -> &[String] {
        self.post_result
            .as_ref()
            .map_or(&[], |result| result.post_ids.as_slice())
    }

    /// Text to publish: the body followed by any hashtags it does not already carry.
    pub fn compose(&self) -> String {
        let missing: Vec<&str> = self
            .hashtags
            .iter()
            .filter(|tag| !contains_hashtag(&self.text, tag))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            return self.text.clone();
        }

        let body = self.text.trim_end();
        if body.is_empty() {
            missing.join(" ")
        } else {
            format!("{}\n\n{}", body, missing.join(" "))
        }
    }
}

/// Normalize a hashtag list: trim, add a missing `#`, drop empties and
/// case-insensitive duplicates while keeping first-seen order.
pub fn normalize_hashtags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(tags.len());
    for tag in tags {
        let bare = tag.trim().trim_start_matches('#');
        if bare.is_empty() {
            continue;
        }
        if seen.insert(bare.to_lowercase()) {
            out.push(format!("#{}", bare));
        }
    }
    out
}

fn contains_hashtag(text: &str, tag: &str) -> bool {
    let lowered = tag.to_lowercase();
    crate::formatter::hashtag_tokens(text)
        .iter()
        .any(|t| t.to_lowercase() == lowered)
}

/// A request to publish one content item on one platform at one time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: String,
    pub content_id: String,
    pub platform: Platform,
    pub schedule_time: DateTime<Utc>,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    /// Set on every terminal transition
    pub executed_at: Option<DateTime<Utc>>,
    /// Set when a scheduler instance has taken ownership of the dispatch
    pub claimed_at: Option<DateTime<Utc>>,
    /// Why the schedule failed, if it did
    pub last_error: Option<String>,
}

impl ScheduledPost {
    pub fn new(content_id: String, platform: Platform, schedule_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content_id,
            platform,
            schedule_time,
            status: ScheduleStatus::Pending,
            created_at: Utc::now(),
            executed_at: None,
            claimed_at: None,
            last_error: None,
        }
    }

    /// Pending, unclaimed and at or past its scheduled time
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Pending
            && self.claimed_at.is_none()
            && self.schedule_time <= now
    }
}

/// Per-status counts of scheduled posts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Pending schedules already past their time
    pub overdue: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.completed + self.failed + self.cancelled
    }
}
