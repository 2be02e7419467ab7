//! Downstream indexer notification
//!
//! After every pass the indexer is asked to pick up the new mirror contents.
//! The notification never fails a pass: every error is logged and swallowed.

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::Config;

/// Outcome of a reindex request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Dry-run mode, nothing was sent
    Skipped,
    /// Endpoint acknowledged with 200, 202 or 204
    Triggered(u16),
    /// Endpoint answered with any other status
    Rejected(u16),
    /// Request could not be completed
    Unreachable(String),
}

/// Sends the reindex signal
#[derive(Clone)]
pub struct ReindexNotifier {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    dry_run: bool,
}

impl ReindexNotifier {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.reindex_timeout())
            .build()
            .context("Failed to create reindex HTTP client")?;

        Ok(Self {
            client,
            url: config.reindex.url.clone(),
            token: config.reindex.token.clone().filter(|t| !t.trim().is_empty()),
            dry_run: config.sync.dry_run,
        })
    }

    pub async fn notify(&self) -> NotifyOutcome {
        if self.dry_run {
            info!("[DRY RUN] Would trigger reindex at {}", self.url);
            return NotifyOutcome::Skipped;
        }

        info!("Triggering reindex at {}...", self.url);

        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if matches!(
                    status,
                    StatusCode::OK | StatusCode::ACCEPTED | StatusCode::NO_CONTENT
                ) {
                    info!("Reindex triggered successfully. Status: {}", status.as_u16());
                    NotifyOutcome::Triggered(status.as_u16())
                } else {
                    let body = response.text().await.unwrap_or_default();
                    warn!("Failed to trigger reindex: {} {}", status.as_u16(), body);
                    NotifyOutcome::Rejected(status.as_u16())
                }
            }
            Err(e) => {
                warn!("Could not trigger reindex: {}", e);
                NotifyOutcome::Unreachable(e.to_string())
            }
        }
    }
}
