//! Daemon Infrastructure - Fixed-period mirroring loop
//!
//! The daemon runs a pass, sleeps for the configured interval and repeats.
//! Nothing that goes wrong inside a pass, including a panic, stops the loop;
//! only Ctrl+C (or external termination) does.

use crate::discovery::RepoProvider;
use crate::sync::{panic_message, SyncEngine, SyncSummary};
use crate::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Daemon state and control
pub struct Daemon {
    engine: SyncEngine,
    provider: Box<dyn RepoProvider>,
    interval: Duration,
    status: DaemonStatus,
}

/// Daemon statistics and status
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub total_passes: u64,
    pub completed_passes: u64,
    pub failed_passes: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_synced: Option<usize>,
}

impl Daemon {
    /// Create a new daemon from a validated configuration
    pub fn new(config: Config, provider: Box<dyn RepoProvider>) -> Result<Self> {
        let interval = config
            .sync_interval()
            .context("Failed to parse daemon sync interval")?;
        let engine = SyncEngine::new(config).context("Failed to create sync engine for daemon")?;

        Ok(Self::with_engine(engine, provider, interval))
    }

    /// Create a daemon around an existing engine
    pub fn with_engine(engine: SyncEngine, provider: Box<dyn RepoProvider>, interval: Duration) -> Self {
        Self {
            engine,
            provider,
            interval,
            status: DaemonStatus::default(),
        }
    }

    /// Run passes until Ctrl+C is received
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Mimir syncer started using provider: {}",
            self.provider.provider_name()
        );
        info!("Sync interval: {} seconds", self.interval.as_secs());

        self.run_until(Self::wait_for_shutdown_signal()).await;

        info!("Daemon loop exiting");
        Ok(())
    }

    /// Main daemon loop. Sleeps are cut short when `shutdown` resolves.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.run_pass().await;

            info!("Sleeping for {} seconds...", self.interval.as_secs());
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received in daemon loop");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One pass with every error and panic contained
    pub async fn run_pass(&mut self) -> Option<SyncSummary> {
        debug!("Starting scheduled sync operation");
        let pass_start = Instant::now();
        self.status.total_passes += 1;
        self.status.last_pass_at = Some(Utc::now());

        let outcome = AssertUnwindSafe(self.engine.sync_all(self.provider.as_ref()))
            .catch_unwind()
            .await;

        let summary = match outcome {
            Ok(Ok(summary)) => {
                self.status.completed_passes += 1;
                self.status.last_synced = Some(summary.synced);
                self.log_sync_success(&summary, pass_start.elapsed());
                Some(summary)
            }
            Ok(Err(e)) => {
                self.status.failed_passes += 1;
                error!("An unexpected error occurred in main loop: {:?}", e);
                None
            }
            Err(panic) => {
                self.status.failed_passes += 1;
                error!(
                    "Sync pass panicked: {}",
                    panic_message(panic.as_ref())
                );
                None
            }
        };

        debug!("Daemon status: {:?}", self.status);
        summary
    }

    /// Get current daemon status
    pub fn status(&self) -> &DaemonStatus {
        &self.status
    }

    /// Wait for Ctrl+C; a broken signal handler means run forever
    async fn wait_for_shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
        debug!("Ctrl+C received");
    }

    /// Log successful sync operation
    fn log_sync_success(&self, summary: &SyncSummary, duration: Duration) {
        info!(
            "Pass {} completed in {:.2}s: {} repos, {} synced ({} cloned, {} updated), {} failed",
            self.status.total_passes,
            duration.as_secs_f64(),
            summary.total_repositories,
            summary.synced,
            summary.cloned,
            summary.updated,
            summary.failed
        );
    }
}
