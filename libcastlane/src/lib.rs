//! Castlane - scheduled publishing to social networks
//!
//! This library formats content for each platform, keeps a durable queue of
//! scheduled posts, and dispatches due posts through per-platform adapters.

pub mod chunker;
pub mod config;
pub mod db;
pub mod error;
pub mod formatter;
pub mod logging;
pub mod platforms;
pub mod scheduler;
pub mod scheduling;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{CastlaneError, PlatformError, Result};
pub use platforms::{AdapterRegistry, PlatformAdapter};
pub use scheduler::{PassReport, Phase, SchedulerLoop};
pub use service::{NewContent, PublishingService};
pub use store::{ScheduleFilter, ScheduleStore};
pub use types::{
    AccountCheck, Content, ContentStatus, ContentType, Platform, PostMetrics, PostResult,
    QueueStats, ScheduleStatus, ScheduledPost,
};
