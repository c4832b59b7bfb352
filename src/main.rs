// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
// Add other lints specific to this module that you want to allow but not auto-fix

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use confessions::app_config::{self, Config};
use confessions::cache::TtlCache;
use confessions::database::{Confession, Repository};
use confessions::moderation::ModerationManager;
use confessions::push::{FcmNotifier, PushDispatcher};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a new confession
    Submit {
        /// Confession text
        #[arg(long)]
        content: String,

        /// Identifier of the submitting client
        #[arg(long)]
        sender: String,

        /// Push token of the submitting device
        #[arg(long)]
        push_id: String,
    },

    /// List the newest confessions, any status
    List {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Show one confession
    Show {
        id: i64,
    },

    /// List the newest confessions of one sender
    BySender {
        sender: String,

        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// List the newest approved confessions
    Approved {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Search approved confessions by keyword
    Search {
        keyword: String,
    },

    /// Show total, pending and rejected counts
    Overview,

    /// Approve a pending confession
    Approve {
        id: i64,

        /// Moderator id
        #[arg(short, long)]
        approver: i64,
    },

    /// Reject a pending confession
    Reject {
        id: i64,

        /// Moderator id
        #[arg(short, long)]
        approver: i64,

        /// Rejection reason shown to the sender
        #[arg(short, long)]
        reason: String,
    },

    /// Return a confession to the pending state
    Rollback {
        id: i64,

        /// Moderator id
        #[arg(short, long)]
        approver: i64,
    },

    /// Soft-delete a confession
    Delete {
        id: i64,
    },

    /// Replace the push token on all confessions of a sender
    SyncPush {
        sender: String,
        push_id: String,
    },

    /// Deliver queued push notifications
    Dispatch {
        /// Keep sweeping the outbox until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Generate shell completions for confessions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Confessions - moderation backend for anonymous confessions
#[derive(Parser, Debug)]
#[command(name = "confessions")]
#[command(version)]
#[command(about = "Moderation backend for anonymous confessions")]
#[command(long_about = "Stores anonymous confessions, runs the moderation workflow and delivers push notifications.

EXAMPLES:
    confessions submit --content 'hello' --sender u1 --push-id tok   # Submit a confession
    confessions overview                                             # Queue counters
    confessions approve 12 --approver 42                             # Approve confession 12
    confessions reject 13 --approver 42 --reason 'off-topic'         # Reject confession 13
    confessions search hello                                         # Search approved confessions
    confessions dispatch --watch                                     # Deliver push notifications continuously
    confessions completions bash > confessions.bash                  # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. Push delivery stays off until push.enabled is
    set and push.server_key is filled in; queued notifications wait in the outbox.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji and ANSI colour for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("❌", "1;31"),
            Level::Warn => ("🚧", "1;33"),
            Level::Info => ("✅", "1;32"),
            Level::Debug => ("🔍", "1;36"),
            Level::Trace => ("📋", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (emoji, colour) = Self::style_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                colour, now, emoji, record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger is installed once at Trace and narrowed through set_max_level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "confessions", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level.into();
    }
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    if let Err(e) = run(cli.command, &config).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Commands, config: &Config) -> Result<()> {
    let repo = Repository::open(&config.database)?;

    let cache = TtlCache::from_config(&config.cache);
    let janitor = cache.start_janitor();

    let manager = ModerationManager::new(repo.clone(), cache, &config.push);
    let dispatcher = build_dispatcher(repo, config);

    match command {
        Commands::Submit { content, sender, push_id } => {
            let mut confession = Confession::new(content, sender, push_id);
            manager.create(&mut confession).await?;
            print_json(&confession)?;
        }
        Commands::List { limit } => {
            print_json(&manager.fetch_all(limit).await?)?;
        }
        Commands::Show { id } => {
            print_json(&manager.fetch_by_id(id).await?)?;
        }
        Commands::BySender { sender, limit } => {
            print_json(&manager.fetch_by_sender(&sender, limit).await?)?;
        }
        Commands::Approved { limit } => {
            print_json(&manager.fetch_approved(limit).await?)?;
        }
        Commands::Search { keyword } => {
            print_json(&manager.search(&keyword).await?)?;
        }
        Commands::Overview => {
            print_json(&manager.fetch_overview().await?)?;
        }
        Commands::Approve { id, approver } => {
            let confession = manager.approve(id, approver).await?;
            print_json(&confession)?;
            flush_outbox(dispatcher.as_ref()).await;
        }
        Commands::Reject { id, approver, reason } => {
            let confession = manager.reject(id, approver, &reason).await?;
            print_json(&confession)?;
            flush_outbox(dispatcher.as_ref()).await;
        }
        Commands::Rollback { id, approver } => {
            print_json(&manager.rollback_approval(id, approver).await?)?;
        }
        Commands::Delete { id } => {
            manager.soft_delete(id).await?;
        }
        Commands::SyncPush { sender, push_id } => {
            manager.sync_push_id(&sender, &push_id).await;
        }
        Commands::Dispatch { watch } => {
            let Some(dispatcher) = dispatcher else {
                warn!("Push delivery is disabled; set push.enabled in the config to deliver queued notifications");
                return Ok(());
            };

            if watch {
                info!(
                    "Dispatching push notifications every {:?}, press Ctrl+C to stop",
                    config.push.dispatch_interval()
                );
                tokio::select! {
                    _ = dispatcher.run(config.push.dispatch_interval()) => {}
                    _ = tokio::signal::ctrl_c() => info!("Stopping push dispatcher"),
                }
            } else {
                let summary = dispatcher.dispatch_pending().await?;
                dispatcher.prune_processed().await?;
                print_json(&serde_json::json!({
                    "delivered": summary.delivered,
                    "failed": summary.failed,
                }))?;
            }
        }
        Commands::Completions { .. } => {}
    }

    janitor.stop();
    Ok(())
}

fn build_dispatcher(repo: Repository, config: &Config) -> Option<PushDispatcher> {
    if !config.push.enabled {
        return None;
    }

    let notifier = Arc::new(FcmNotifier::from_config(&config.push));
    Some(
        PushDispatcher::new(repo, notifier, config.push.batch_size)
            .with_retention(config.push.retention()),
    )
}

// Delivery problems are logged by the dispatcher and never fail the command
async fn flush_outbox(dispatcher: Option<&PushDispatcher>) {
    if let Some(dispatcher) = dispatcher {
        if let Err(e) = dispatcher.dispatch_pending().await {
            warn!("Push dispatch failed: {}", e);
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
