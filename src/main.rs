use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{info, warn};
use veeam::core::{Alert, create_notifier};
use veeam::{SummaryReport, VeeamClient, config, logging};

#[derive(Parser)]
#[command(name = "veeam")]
#[command(about = "Veeam Backup Enterprise Manager reporting client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./veeam.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(flatten)]
    connection: ConnectionArgs,
}

#[derive(Args, Serialize)]
struct ConnectionArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verify_tls: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    lookup_concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Failed runs from the last 24h with no later success
    Failed {
        /// Send one notification per failing job
        #[arg(long)]
        notify: bool,
    },
    /// All runs created in the last 24h
    Sessions,
    /// Repositories with free-space percentage
    Repos {
        /// Notify about repositories below the low-space threshold
        #[arg(long)]
        notify: bool,
    },
    Jobs,
    Job {
        id: String,
    },
    /// Runs of one job, newest first
    JobSessions {
        id: String,
    },
    Backups,
    Backup {
        id: String,
    },
    RestorePoints {
        backup_id: String,
    },
    VmRestorePoints {
        restore_point_id: String,
    },
    Summary {
        #[arg(value_enum)]
        report: SummaryKind,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum SummaryKind {
    ProcessedVms,
    JobStats,
    Vms,
    Overview,
    Repository,
}

impl From<SummaryKind> for SummaryReport {
    fn from(kind: SummaryKind) -> Self {
        match kind {
            SummaryKind::ProcessedVms => SummaryReport::ProcessedVms,
            SummaryKind::JobStats => SummaryReport::JobStatistics,
            SummaryKind::Vms => SummaryReport::VmsOverview,
            SummaryKind::Overview => SummaryReport::Overview,
            SummaryKind::Repository => SummaryReport::Repository,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(logging::LogConfig {
        json: cli.json_logs,
        verbose: cli.verbose,
    });

    let config = config::AppConfig::new(cli.config.as_deref(), Some(&cli.connection))
        .context("Failed to load configuration")?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    let client = VeeamClient::connect(&config)
        .await
        .with_context(|| format!("Failed to log in to {}", config.url))?;

    let result = run_command(&client, &config, &cli.command).await;

    if let Err(e) = client.logout().await {
        warn!(error = %e, "Logout failed");
    }

    result
}

async fn run_command(
    client: &VeeamClient,
    config: &config::AppConfig,
    command: &Commands,
) -> Result<()> {
    match command {
        Commands::Failed { notify } => {
            let failed = client
                .find_persistent_failures()
                .await
                .context("Failed to check for persistently failed jobs")?;
            if *notify {
                let alerts: Vec<Alert> = failed.iter().cloned().map(Alert::JobFailed).collect();
                send_alerts(config, &alerts).await;
            }
            print_json(&failed)
        }
        Commands::Sessions => print_json(&client.get_jobs_last_day().await?),
        Commands::Repos { notify } => {
            let repos = client.get_repos().await.context("Failed to fetch repositories")?;
            if *notify {
                send_alerts(config, &Alert::low_space(&repos, config.low_space_threshold)).await;
            }
            print_json(&repos)
        }
        Commands::Jobs => print_json(&client.get_jobs().await?),
        Commands::Job { id } => print_json(&client.get_job(id).await?),
        Commands::JobSessions { id } => print_json(&client.get_backup_sessions(id).await?),
        Commands::Backups => print_json(&client.get_backups().await?),
        Commands::Backup { id } => print_json(&client.get_backup(id).await?),
        Commands::RestorePoints { backup_id } => {
            print_json(&client.get_restore_points(backup_id).await?)
        }
        Commands::VmRestorePoints { restore_point_id } => {
            print_json(&client.get_vm_restore_points(restore_point_id).await?)
        }
        Commands::Summary { report } => print_json(&client.get_summary((*report).into()).await?),
        Commands::Config => Ok(()),
    }
}

async fn send_alerts(config: &config::AppConfig, alerts: &[Alert]) {
    let Some(notifier) = create_notifier(&config.notifications) else {
        warn!("--notify given but no notification channel is configured");
        return;
    };

    for alert in alerts {
        if let Err(e) = notifier.notify(alert).await {
            warn!(error = %e, "Failed to send notification");
        }
    }
    info!(sent = alerts.len(), "Notifications dispatched");
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
