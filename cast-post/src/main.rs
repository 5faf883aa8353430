//! cast-post - Create content and publish or schedule it

use std::io::{IsTerminal, Read};

use chrono::Utc;
use clap::{Parser, ValueEnum};
use libcastlane::scheduling::parse_schedule;
use libcastlane::{
    CastlaneError, Config, Content, ContentType, NewContent, Platform, PostResult,
    PublishingService, Result, ScheduledPost,
};

#[derive(Parser, Debug)]
#[command(name = "cast-post")]
#[command(version)]
#[command(about = "Create content and publish or schedule it")]
#[command(long_about = "\
cast-post - Create content and publish or schedule it

DESCRIPTION:
    cast-post stores a piece of content and then either publishes it right
    away, queues it for later, or leaves it as a draft.

    Content comes from the first argument, or from stdin when no argument
    is given. Threads are written as segments separated by a line with
    three dashes (---).

USAGE EXAMPLES:
    # Post to Twitter now
    cast-post \"Hello world\" --hashtag rust

    # Post a thread from a file
    cast-post --type thread < thread.txt

    # Schedule for later
    cast-post \"Launch day\" --platform linkedin --schedule \"tomorrow 9am\"
    cast-post \"Reminder\" --schedule 2h
    cast-post \"Spread out\" --schedule random:10m-1h

    # Save a draft only
    cast-post \"Not ready yet\" --draft

CONFIGURATION:
    Configuration file: ~/.config/castlane/config.toml
    Database location: ~/.local/share/castlane/castlane.db

    Override with environment variables:
        CASTLANE_CONFIG    - Path to config file
        CASTLANE_DB_PATH   - Path to database file

EXIT CODES:
    0 - Success
    1 - Posting failed
    2 - Database or configuration error
    3 - Invalid input (empty content, bad schedule, unknown platform, etc.)
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform (twitter, linkedin, facebook, instagram)
    #[arg(short, long, default_value = "twitter")]
    platform: String,

    /// Content type (post, thread, poll, story, article)
    #[arg(short = 't', long = "type", default_value = "post")]
    content_type: String,

    /// Hashtag to attach (repeatable, '#' optional)
    #[arg(long = "hashtag", value_name = "TAG")]
    hashtags: Vec<String>,

    /// Media URL (required for Instagram)
    #[arg(short, long, value_name = "URL")]
    media: Option<String>,

    /// Save as draft without posting
    #[arg(short, long, conflicts_with = "schedule")]
    draft: bool,

    /// Schedule instead of posting now ("now", "2h", "in 30m",
    /// "tomorrow 9am", RFC 3339, "random:10m-1h")
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Platform for the schedule when it differs from the content's
    #[arg(long, value_name = "PLATFORM", requires = "schedule")]
    schedule_platform: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
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
    let text = read_content(cli.content.as_deref())?;
    let platform: Platform = cli.platform.parse()?;
    let content_type: ContentType = cli.content_type.parse()?;
    let schedule_platform = cli
        .schedule_platform
        .as_deref()
        .map(str::parse::<Platform>)
        .transpose()?;
    // Parse the time before anything is stored
    let when = cli
        .schedule
        .as_deref()
        .map(|input| parse_schedule(input, Utc::now()))
        .transpose()?;

    let config = Config::load()?;
    let service = PublishingService::from_config(&config).await?;

    let new = NewContent {
        text,
        hashtags: cli.hashtags,
        platform,
        content_type,
        media_url: cli.media,
    };
    let content = service.create_content(new).await?;

    if cli.draft {
        print_draft(&content, cli.format)?;
        return Ok(0);
    }

    if let Some(when) = when {
        let schedule = service
            .schedule(&content.id, when, schedule_platform)
            .await?;
        print_schedule(&schedule, cli.format)?;
        return Ok(0);
    }

    let result = service.post_now(&content.id).await?;
    print_result(&content, &result, cli.format)?;
    Ok(if result.success { 0 } else { 1 })
}

/// Content from the argument, or all of stdin when it is piped
fn read_content(arg: Option<&str>) -> Result<String> {
    let text = match arg {
        Some(text) => text.to_string(),
        None => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                return Err(CastlaneError::InvalidInput(
                    "No content provided. Pass it as an argument or pipe it to stdin".to_string(),
                ));
            }
            let mut buffer = String::new();
            stdin
                .lock()
                .read_to_string(&mut buffer)
                .map_err(|e| CastlaneError::InvalidInput(format!("Failed to read stdin: {}", e)))?;
            buffer
        }
    };

    let text = text.trim_end_matches(['\n', '\r']).to_string();
    if text.trim().is_empty() {
        return Err(CastlaneError::InvalidInput(
            "Content cannot be empty".to_string(),
        ));
    }
    Ok(text)
}

fn print_draft(content: &Content, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_pretty(content)?),
        OutputFormat::Text => println!("draft:{}", content.id),
    }
    Ok(())
}

fn print_schedule(schedule: &ScheduledPost, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_pretty(schedule)?),
        OutputFormat::Text => println!(
            "scheduled:{}:{}:{}",
            schedule.platform,
            schedule.id,
            schedule.schedule_time.to_rfc3339()
        ),
    }
    Ok(())
}

fn print_result(content: &Content, result: &PostResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "content_id": content.id,
                "result": result,
            });
            println!("{}", to_pretty(&json)?);
        }
        OutputFormat::Text if result.success => {
            for id in &result.post_ids {
                println!("{}:{}", result.platform, id);
            }
            if let Some(url) = &result.url {
                println!("{}", url);
            }
        }
        OutputFormat::Text => eprintln!(
            "{}: {}",
            result.platform,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
    Ok(())
}

fn to_pretty(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| CastlaneError::InvalidInput(format!("Cannot render JSON: {}", e)))
}
