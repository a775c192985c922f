//! The serialized event → audit → dispatch handler
//!
//! One task owns the whole cycle, so audits never overlap and bots never run
//! concurrently. A burst of events is coalesced: the first qualifying event
//! opens a window that stays open until `debounce` passes without another
//! qualifying event, then exactly one audit runs.

use crate::audit::AuditRunner;
use crate::filter::EventFilter;
use crate::poller::FsEvent;
use autoremedy_bots::BotRegistry;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub events_seen: usize,
    pub events_filtered: usize,
    pub audits_run: usize,
    pub audits_failed: usize,
    pub bots_invoked: usize,
    pub bots_repaired: usize,
}

pub struct Pipeline {
    filter: EventFilter,
    runner: Arc<dyn AuditRunner>,
    /// `None` runs audits only.
    registry: Option<Arc<BotRegistry>>,
    audit_log: PathBuf,
    debounce: Duration,
}

impl Pipeline {
    pub fn new(filter: EventFilter, runner: Arc<dyn AuditRunner>, audit_log: impl Into<PathBuf>) -> Self {
        Self {
            filter,
            runner,
            registry: None,
            audit_log: audit_log.into(),
            debounce: Duration::from_millis(500),
        }
    }

    pub fn with_registry(mut self, registry: Arc<BotRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Consume events until the channel closes or `cancel` fires. An audit
    /// already running when `cancel` fires is allowed to finish; a burst
    /// still inside its debounce window is dropped.
    pub async fn run(self, mut rx: mpsc::Receiver<FsEvent>, cancel: CancellationToken) -> PipelineStats {
        let mut stats = PipelineStats::default();

        'cycles: loop {
            let first = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            if !self.qualifies(&first, &mut stats) {
                continue;
            }

            let mut coalesced = 0usize;
            let mut deadline = Instant::now() + self.debounce;
            let mut closed = false;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Shutdown during debounce; dropping pending audit for {}", first.path.display());
                        break 'cycles;
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                    event = rx.recv() => match event {
                        Some(event) => {
                            if self.qualifies(&event, &mut stats) {
                                coalesced += 1;
                                deadline = Instant::now() + self.debounce;
                            }
                        }
                        None => {
                            closed = true;
                            break;
                        }
                    },
                }
            }

            info!(
                "Change detected: {} (+{} coalesced). Triggering audit pipeline...",
                first.path.display(),
                coalesced
            );
            self.run_cycle(&cancel, &mut stats).await;

            if closed {
                break;
            }
        }

        info!(
            "Pipeline stopped: {} events ({} filtered), {} audits ({} failed), {} bots run",
            stats.events_seen, stats.events_filtered, stats.audits_run, stats.audits_failed, stats.bots_invoked
        );
        stats
    }

    fn qualifies(&self, event: &FsEvent, stats: &mut PipelineStats) -> bool {
        stats.events_seen += 1;
        match self.filter.skip_reason(event) {
            Some(reason) => {
                stats.events_filtered += 1;
                debug!("Skipping {} ({:?})", event.path.display(), reason);
                false
            }
            None => true,
        }
    }

    /// One audit, then (on success) one sequential pass over the audit log.
    /// The log is only read after the audit process has exited.
    async fn run_cycle(&self, cancel: &CancellationToken, stats: &mut PipelineStats) {
        stats.audits_run += 1;
        let report = match self.runner.run_audit(cancel.clone()).await {
            Ok(report) => report,
            Err(e) => {
                stats.audits_failed += 1;
                error!("An unexpected error occurred while running the audit script: {}", e);
                return;
            }
        };

        let (exit, duration_ms, stdout) = (report.exit, report.duration_ms, report.stdout.clone());
        if let Err(e) = report.into_result() {
            stats.audits_failed += 1;
            error!("Audit pipeline failed ({:?}): {}", exit, e);
            error!("STDOUT: {}", stdout.trim());
            return;
        }
        info!("Audit pipeline finished successfully in {}ms.", duration_ms);

        let Some(registry) = self.registry.clone() else {
            return;
        };
        if cancel.is_cancelled() {
            info!("Shutdown requested; skipping dispatch of {}", self.audit_log.display());
            return;
        }

        let log = self.audit_log.clone();
        match tokio::task::spawn_blocking(move || registry.run_on_log_file(&log)).await {
            Ok(Ok(summary)) => {
                stats.bots_invoked += summary.invocations();
                stats.bots_repaired += summary.repaired();
            }
            Ok(Err(e)) => error!("Failed to read audit log {}: {}", self.audit_log.display(), e),
            Err(e) => error!("Dispatch task failed: {}", e),
        }
    }
}
