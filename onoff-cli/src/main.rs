mod source;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use onoff_core::ics::parse_calendar;
use onoff_core::{OnOffConfig, build_schedule};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onoff")]
#[command(about = "Turn iCalendar events into on/off UTC time pairs for a device scheduler")]
struct Cli {
    /// iCalendar file path or http(s) URL
    input: String,

    /// Where to write the schedule
    #[arg(default_value = "onoff.txt")]
    output: PathBuf,

    /// Reference time in unix seconds; events that ended before it are dropped (default: now)
    #[arg(long)]
    now: Option<i64>,

    /// Config file (default: ~/.config/onoff/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Most instances a single recurring event may contribute
    #[arg(long)]
    max_recurrence: Option<usize>,

    /// Most intervals in the whole schedule
    #[arg(long)]
    max_instances: Option<usize>,

    /// Log skipped events and expansion details
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => OnOffConfig::load_from(path)?,
        None => OnOffConfig::load()?,
    };
    if let Some(n) = cli.max_recurrence {
        config.limits.max_recurrence_per_event = n;
    }
    if let Some(n) = cli.max_instances {
        config.limits.max_total_instances = n;
    }

    let content = source::read(&cli.input).await?;
    let calendar = parse_calendar(&content)?;

    let now = cli.now.unwrap_or_else(|| Utc::now().timestamp());
    let schedule = build_schedule(&calendar, now, &config.limits);
    schedule.write_to(&cli.output)?;

    tracing::info!(
        events = calendar.events.len(),
        intervals = schedule.len(),
        output = %cli.output.display(),
        "Schedule written"
    );

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
