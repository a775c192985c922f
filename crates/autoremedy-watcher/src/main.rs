//! autoremedy: watch a repository, audit it, and let bots repair findings
//!
//! Usage:
//!   autoremedy watch --root .          → poll, audit on change, dispatch bots
//!   autoremedy dispatch                → run bots once over audit_results.log
//!   autoremedy bots                    → list registered bots and triggers
//!   autoremedy dump-config             → print the default PREFERENCES.toml

use autoremedy_bots::{create_registry, BotRegistry};
use autoremedy_watcher::{RemedyConfig, WatcherConfig, DEFAULT_CONFIG_FILE};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "autoremedy",
    about = "Watch a repository, run its audit script, and dispatch remediation bots",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    trace_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the tree and run the audit pipeline on changes
    Watch {
        /// Repository root to watch
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Config file (default: <root>/PREFERENCES.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Audit script override
        #[arg(long)]
        audit_script: Option<PathBuf>,
        /// Audit log override
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Debounce window override in milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Run audits only, never bots
        #[arg(long, default_value_t = false)]
        no_dispatch: bool,
    },
    /// Run the bots once over an existing audit log
    Dispatch {
        /// Repository root
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Config file (default: <root>/PREFERENCES.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Audit log (default: <root>/audit_results.log)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// List registered bots and their triggers
    Bots,
    /// Print the default configuration as TOML
    DumpConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.json_logs, cli.trace_file.as_deref())?;

    match cli.command {
        Commands::Watch { root, config, audit_script, log_file, debounce_ms, no_dispatch } => {
            let remedy = load_config(&root, config.as_deref())?;
            let mut watcher = WatcherConfig::resolve(&root, &remedy);
            if let Some(script) = audit_script {
                watcher.audit_script = watcher.root.join(script);
            }
            if let Some(log) = log_file {
                watcher.audit_log = watcher.root.join(log);
            }
            if let Some(ms) = debounce_ms {
                watcher.debounce = Duration::from_millis(ms);
            }
            if no_dispatch {
                watcher.dispatch_after_audit = false;
            }

            let registry = Arc::new(build_registry(&remedy)?);
            let cancel = CancellationToken::new();
            tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

            let stats = autoremedy_watcher::watch(watcher, Some(registry), cancel).await?;
            info!("{}", serde_json::to_string(&stats)?);
        }

        Commands::Dispatch { root, config, log_file } => {
            let remedy = load_config(&root, config.as_deref())?;
            let registry = build_registry(&remedy)?;
            let log = root.join(log_file.unwrap_or_else(|| remedy.watcher.audit_log.clone()));
            let summary = tokio::task::spawn_blocking(move || registry.run_on_log_file(&log)).await??;
            if summary.failures() > 0 {
                warn!("{} matched line(s) were not repaired", summary.failures());
            }
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Bots => {
            let registry = build_registry(&RemedyConfig::default())?;
            for (name, trigger) in registry.list() {
                println!("{:<28} {}", name, trigger);
            }
        }

        Commands::DumpConfig => {
            print!("{}", RemedyConfig::default().to_toml());
        }
    }

    Ok(())
}

/// The default file may be absent; an explicit `--config` must exist and parse.
fn load_config(root: &Path, explicit: Option<&Path>) -> anyhow::Result<RemedyConfig> {
    match explicit {
        Some(path) => Ok(RemedyConfig::try_load(path)?),
        None => Ok(RemedyConfig::load(&root.join(DEFAULT_CONFIG_FILE))),
    }
}

fn build_registry(config: &RemedyConfig) -> anyhow::Result<BotRegistry> {
    let registry = create_registry(config.dispatcher.duplicate_policy, config.dispatcher.max_transitions);
    if let Err(e) = registry.ensure_ready() {
        if e.is_fatal() {
            error!("{}", e);
            return Err(e.into());
        }
        warn!("{}", e);
    }
    info!("{} bot(s) registered ({} policy)", registry.len(), registry.policy());
    Ok(registry)
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Interrupt received; shutting down");
        cancel.cancel();
    }
}

fn init_tracing(json: bool, file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "autoremedy=info,autoremedy_bots=info,autoremedy_watcher=info".into());

    let (file_layer, guard) = match file {
        Some(path) => {
            let handle = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            let (writer, guard) = tracing_appender::non_blocking(handle);
            (Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(file_layer)
        .init();
    Ok(guard)
}
