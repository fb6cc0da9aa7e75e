use std::path::PathBuf;

use anyhow::Context;
use chrono::FixedOffset;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use forum_metric_gate::models::{CourseId, ForumId, UserId, ALL_FORUMS};
use forum_metric_gate::{
    db, metrics, report, EngagementMethod, ForumStore, MetricCondition, TimeWindow,
};

#[derive(Parser)]
#[command(name = "forum-metric-gate")]
#[command(about = "Forum participation metrics for activity restrictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConditionArgs {
    /// Condition payload as JSON
    #[arg(long)]
    condition: PathBuf,
    #[arg(long)]
    course: CourseId,
    /// Offset the condition's dates are expressed in, e.g. +07:00
    #[arg(long, default_value = "+00:00", value_parser = parse_offset)]
    utc_offset: FixedOffset,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load the reference forum
    Seed,
    /// Import posts from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// List the selectable metrics
    Metrics,
    /// Print a user's raw metric value
    Value {
        #[command(flatten)]
        target: ConditionArgs,
        #[arg(long)]
        user: UserId,
    },
    /// Check whether a user passes the condition
    Check {
        #[command(flatten)]
        target: ConditionArgs,
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        negate: bool,
    },
    /// Describe the condition in English
    Describe {
        #[command(flatten)]
        target: ConditionArgs,
        #[arg(long)]
        negate: bool,
    },
    /// Generate a markdown engagement report
    Report {
        #[arg(long)]
        course: CourseId,
        #[arg(long, default_value_t = ALL_FORUMS)]
        forum: ForumId,
        /// 1 person-to-person, 2 thread total count, 3 thread engagement
        #[arg(long, default_value_t = 1)]
        method: i64,
        /// Only score replies at or after this unix timestamp
        #[arg(long)]
        from: Option<i64>,
        /// Only score replies at or before this unix timestamp
        #[arg(long)]
        to: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_offset(value: &str) -> Result<FixedOffset, String> {
    let offset = if value.eq_ignore_ascii_case("utc") || value == "Z" {
        "+00:00"
    } else {
        value
    };
    offset
        .parse::<FixedOffset>()
        .map_err(|err| format!("invalid offset {value}: {err}"))
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn load_condition(target: &ConditionArgs) -> anyhow::Result<MetricCondition> {
    let json = std::fs::read_to_string(&target.condition)
        .with_context(|| format!("failed to read {}", target.condition.display()))?;
    MetricCondition::from_json(&json, target.utc_offset)
        .with_context(|| format!("invalid condition in {}", target.condition.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&connect().await?).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&connect().await?, &csv).await?;
            println!("Inserted {inserted} posts from {}.", csv.display());
        }
        Commands::Metrics => {
            for (key, label) in metrics::metric_options() {
                println!("{key}\t{label}");
            }
        }
        Commands::Value { target, user } => {
            let condition = load_condition(&target)?;
            let snapshot = db::load_snapshot(&connect().await?, target.course).await?;
            match condition.user_value(&snapshot, target.course, user) {
                Some(value) => println!("{value}"),
                None => println!("no signal"),
            }
        }
        Commands::Check {
            target,
            user,
            negate,
        } => {
            let condition = load_condition(&target)?;
            let snapshot = db::load_snapshot(&connect().await?, target.course).await?;
            if condition.is_available(negate, &snapshot, target.course, user) {
                println!("available");
            } else {
                println!("not available");
            }
        }
        Commands::Describe { target, negate } => {
            let condition = load_condition(&target)?;
            let snapshot = db::load_snapshot(&connect().await?, target.course).await?;
            println!("{}", condition.describe(true, negate, &snapshot).render());
        }
        Commands::Report {
            course,
            forum,
            method,
            from,
            to,
            out,
        } => {
            let method = EngagementMethod::from_id(method)
                .with_context(|| format!("unknown engagement method {method}"))?;
            let window = TimeWindow::new(from, to);
            let snapshot = db::load_snapshot(&connect().await?, course).await?;
            let rows = report::engagement_report(&snapshot, course, forum, method, window);
            let scope = if forum == ALL_FORUMS {
                format!("all forums in course {course}")
            } else {
                snapshot
                    .forum_name(forum)
                    .unwrap_or_else(|| format!("forum {forum}"))
            };
            let report = report::build_report(&scope, method, window, &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
