//! Autoremedy Watcher: poll a tree, run the audit, dispatch bots
//!
//! A [`TreePoller`] task feeds filesystem events into a single [`Pipeline`]
//! task. The pipeline filters, debounces, runs the audit script and, after a
//! successful audit, runs the bot registry over the audit log.

pub mod audit;
pub mod config;
pub mod filter;
pub mod pipeline;
pub mod poller;

pub use audit::{AuditExit, AuditReport, AuditRunner, ScriptAuditRunner};
pub use config::{parse_ignore_list, RemedyConfig, WatcherConfig, DEFAULT_CONFIG_FILE};
pub use filter::{EventFilter, Skip};
pub use pipeline::{Pipeline, PipelineStats};
pub use poller::{FsEvent, FsEventKind, TreePoller};

use autoremedy_bots::BotRegistry;
use autoremedy_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const EVENT_QUEUE: usize = 1024;

/// Watch `config.root` until `cancel` fires, using the script named in the
/// config as the audit.
pub async fn watch(
    config: WatcherConfig,
    registry: Option<Arc<BotRegistry>>,
    cancel: CancellationToken,
) -> Result<PipelineStats> {
    let runner = ScriptAuditRunner::new(&config.audit_script, &config.root)
        .with_timeout(config.audit_timeout)
        .with_shutdown_grace(config.shutdown_grace);
    watch_with_runner(config, Arc::new(runner), registry, cancel).await
}

/// Same as [`watch`] with a caller-supplied audit runner.
pub async fn watch_with_runner(
    config: WatcherConfig,
    runner: Arc<dyn AuditRunner>,
    registry: Option<Arc<BotRegistry>>,
    cancel: CancellationToken,
) -> Result<PipelineStats> {
    if !config.root.is_dir() {
        return Err(Error::FileNotFound(config.root));
    }

    let filter = EventFilter::new(&config.root, config.ignored_directory_names.clone(), &config.audit_log);
    let mut pipeline = Pipeline::new(filter, runner, &config.audit_log).with_debounce(config.debounce);
    match registry {
        Some(registry) if config.dispatch_after_audit => pipeline = pipeline.with_registry(registry),
        Some(_) => info!("dispatch_after_audit is off; bots will not run"),
        None => {}
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let poller = TreePoller::new(&config.root, config.ignored_directory_names, config.poll_interval);
    let poller_cancel = cancel.child_token();
    let poller_task = tokio::spawn(poller.run(tx, poller_cancel.clone()));

    info!(
        "Watching {} (audit: {}, log: {})",
        config.root.display(),
        config.audit_script.display(),
        config.audit_log.display()
    );
    let stats = pipeline.run(rx, cancel).await;

    poller_cancel.cancel();
    if let Err(e) = poller_task.await {
        warn!("Poller task failed: {}", e);
    }
    info!("Watcher stopped");
    Ok(stats)
}
