//! cast-queue - Manage scheduled posts
//!
//! Unix-style tool for inspecting and managing the schedule queue.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use libcastlane::{
    AccountCheck, CastlaneError, Config, Platform, PostMetrics, PostResult, PublishingService,
    QueueStats, Result, ScheduleFilter, ScheduleStatus, ScheduledPost,
};

#[derive(Parser, Debug)]
#[command(name = "cast-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
cast-queue - Manage scheduled posts

DESCRIPTION:
    cast-queue is a Unix-style tool for managing scheduled posts in the
    Castlane queue. Use it to list, inspect, cancel or send scheduled posts,
    or to view statistics about the queue.

COMMANDS:
    list        List scheduled posts
    show        Show one scheduled post and its content
    cancel      Cancel a pending scheduled post
    now         Send a pending scheduled post immediately
    stats       Show statistics about scheduled posts
    check       Verify platform credentials without posting
    metrics     Show engagement counters for posted content

USAGE EXAMPLES:
    # List pending posts
    cast-queue list --status pending

    # List posts in JSON format
    cast-queue list --format json

    # Cancel a specific post
    cast-queue cancel <SCHEDULE_ID>

    # Send a scheduled post right away
    cast-queue now <SCHEDULE_ID>

    # View queue statistics
    cast-queue stats

    # Check that the LinkedIn token still works
    cast-queue check --platform linkedin

    # Likes and replies for a posted item
    cast-queue metrics <CONTENT_ID>

CONFIGURATION:
    Configuration file: ~/.config/castlane/config.toml
    Database location: ~/.local/share/castlane/castlane.db

    Override with environment variables:
        CASTLANE_CONFIG    - Path to config file
        CASTLANE_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (unknown schedule, bad status, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List scheduled posts
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only this status (pending, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        /// Only this platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one scheduled post
    Show {
        schedule_id: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Cancel a pending scheduled post
    Cancel { schedule_id: String },

    /// Send a pending scheduled post immediately
    Now {
        schedule_id: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show queue statistics
    Stats {
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Verify platform credentials with a read-only call
    Check {
        /// Only this platform (default: every platform)
        #[arg(short, long)]
        platform: Option<String>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show engagement counters for posted content
    Metrics {
        content_id: String,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libcastlane::logging::init("error", cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Returns the process exit code
async fn run(cli: Cli) -> Result<i32> {
    let config = Config::load()?;
    let service = PublishingService::from_config(&config).await?;

    match cli.command {
        Commands::List {
            format,
            status,
            platform,
            limit,
        } => {
            let filter = ScheduleFilter {
                status: status.as_deref().map(str::parse).transpose()?,
                platform: platform.as_deref().map(str::parse).transpose()?,
                content_id: None,
                limit,
            };
            cmd_list(&service, &filter, format).await?;
        }
        Commands::Show {
            schedule_id,
            format,
        } => cmd_show(&service, &schedule_id, format).await?,
        Commands::Cancel { schedule_id } => {
            service.cancel(&schedule_id).await?;
            println!("Cancelled {}", schedule_id);
        }
        Commands::Now {
            schedule_id,
            format,
        } => {
            let result = service.send_now(&schedule_id).await?;
            print_result(&result, format);
            if !result.success {
                return Ok(1);
            }
        }
        Commands::Stats { format } => {
            let stats = service.stats().await?;
            print_stats(&stats, format);
        }
        Commands::Check { platform, format } => {
            return match platform {
                Some(name) => {
                    let check = service.verify(name.parse()?).await?;
                    print_checks(&[CheckOutcome::Ok(check)], format)?;
                    Ok(0)
                }
                None => cmd_check_all(&service, format).await,
            };
        }
        Commands::Metrics { content_id, format } => {
            let metrics = service.post_metrics(&content_id).await?;
            print_metrics(&metrics, format)?;
        }
    }

    Ok(0)
}

async fn cmd_list(
    service: &PublishingService,
    filter: &ScheduleFilter,
    format: OutputFormat,
) -> Result<()> {
    let schedules = service.list(filter).await?;

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = schedules.iter().map(schedule_json).collect();
            println!("{}", to_pretty(&json)?);
        }
        OutputFormat::Text => {
            let now = Utc::now();
            for schedule in &schedules {
                let preview = match service.store().get_content(&schedule.content_id).await? {
                    Some(content) => truncate_content(&content.text, 50),
                    None => "<content missing>".to_string(),
                };
                println!(
                    "{} | {} | {} | {} | {}",
                    schedule.id,
                    schedule.platform,
                    schedule.status,
                    describe_time(schedule, now),
                    preview
                );
            }
        }
    }

    Ok(())
}

async fn cmd_show(service: &PublishingService, id: &str, format: OutputFormat) -> Result<()> {
    let schedule = service.get_schedule(id).await?;
    let content = service.store().get_content(&schedule.content_id).await?;

    match format {
        OutputFormat::Json => {
            let mut json = schedule_json(&schedule);
            json["content"] = serde_json::to_value(&content).map_err(invalid_json)?;
            println!("{}", to_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Schedule:  {}", schedule.id);
            println!("Platform:  {}", schedule.platform);
            println!("Status:    {}", schedule.status);
            println!(
                "Time:      {} ({})",
                schedule.schedule_time.to_rfc3339(),
                describe_time(&schedule, Utc::now())
            );
            if let Some(executed) = schedule.executed_at {
                println!("Executed:  {}", executed.to_rfc3339());
            }
            if let Some(error) = &schedule.last_error {
                println!("Error:     {}", error);
            }
            match content {
                Some(content) => {
                    println!("Content:   {} ({}, {})", content.id, content.content_type, content.status);
                    println!();
                    println!("{}", content.compose());
                }
                None => println!("Content:   {} (missing)", schedule.content_id),
            }
        }
    }

    Ok(())
}

/// Exit code 1 when any platform fails its check
async fn cmd_check_all(service: &PublishingService, format: OutputFormat) -> Result<i32> {
    let mut checks = Vec::new();
    for platform in service.adapters().platforms() {
        checks.push(
            service
                .verify(platform)
                .await
                .map_err(|e| (platform, e.to_string())),
        );
    }

    print_checks(&checks, format)?;
    Ok(if checks.iter().all(|c| c.is_ok()) { 0 } else { 1 })
}

type CheckOutcome = std::result::Result<AccountCheck, (Platform, String)>;

fn print_checks(checks: &[CheckOutcome], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = checks
                .iter()
                .map(|check| match check {
                    Ok(c) => serde_json::json!({
                        "platform": c.platform,
                        "ok": true,
                        "account": c.account,
                    }),
                    Err((platform, error)) => serde_json::json!({
                        "platform": platform,
                        "ok": false,
                        "error": error,
                    }),
                })
                .collect();
            println!("{}", to_pretty(&json)?);
        }
        OutputFormat::Text => {
            for check in checks {
                match check {
                    Ok(c) => println!("{}: ok {}", c.platform, c.account),
                    Err((platform, error)) => println!("{}: failed: {}", platform, error),
                }
            }
        }
    }
    Ok(())
}

fn print_metrics(metrics: &PostMetrics, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_pretty(metrics)?),
        OutputFormat::Text => {
            println!("{} {}", metrics.platform, metrics.post_id);
            for (name, count) in &metrics.counts {
                println!("  {}: {}", name, count);
            }
        }
    }
    Ok(())
}

fn print_result(result: &PostResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(result) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
        OutputFormat::Text if result.success => {
            let ids = result.post_ids.join(", ");
            match &result.url {
                Some(url) => println!("{}: posted {} {}", result.platform, ids, url),
                None => println!("{}: posted {}", result.platform, ids),
            }
        }
        OutputFormat::Text => eprintln!(
            "{}: failed: {}",
            result.platform,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn print_stats(stats: &QueueStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(stats) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
        OutputFormat::Text => {
            println!("Pending:   {}", stats.pending);
            println!("Overdue:   {}", stats.overdue);
            println!("Completed: {}", stats.completed);
            println!("Failed:    {}", stats.failed);
            println!("Cancelled: {}", stats.cancelled);
            println!("Total:     {}", stats.total());
        }
    }
}

fn schedule_json(schedule: &ScheduledPost) -> serde_json::Value {
    serde_json::json!({
        "id": schedule.id,
        "content_id": schedule.content_id,
        "platform": schedule.platform,
        "status": schedule.status,
        "schedule_time": schedule.schedule_time.to_rfc3339(),
        "created_at": schedule.created_at.to_rfc3339(),
        "executed_at": schedule.executed_at.map(|t| t.to_rfc3339()),
        "last_error": schedule.last_error,
    })
}

fn to_pretty(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(invalid_json)
}

fn invalid_json(e: serde_json::Error) -> CastlaneError {
    CastlaneError::InvalidInput(format!("Cannot render JSON: {}", e))
}

/// Truncate content to `max_chars` characters with an ellipsis
fn truncate_content(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Relative description of when a schedule runs or ran
fn describe_time(schedule: &ScheduledPost, now: DateTime<Utc>) -> String {
    if schedule.status != ScheduleStatus::Pending {
        return schedule
            .executed_at
            .unwrap_or(schedule.schedule_time)
            .format("%Y-%m-%d %H:%M UTC")
            .to_string();
    }

    let diff = (schedule.schedule_time - now).num_seconds();
    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}
