//! External command execution
//!
//! Every git invocation goes through [`CommandRunner`], so the sync engine can be
//! driven against a fake in tests and dry-run handling lives in one place.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info, warn};

/// Capability to run an external command in a working directory
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute `command` and fail unless it exits with status zero.
    /// The error carries the captured stderr.
    async fn execute(&self, command: &[&str], cwd: Option<&Path>) -> Result<()>;

    /// Execute `command` and return its captured stdout
    async fn output(&self, command: &[&str], cwd: Option<&Path>) -> Result<String>;

    /// Run a command, reporting success as a boolean.
    ///
    /// In dry-run mode nothing is executed and the call always succeeds.
    /// Failures are logged at warning level and never propagated.
    async fn run(&self, command: &[&str], cwd: Option<&Path>, dry_run: bool) -> bool {
        let line = redact_credentials(&command.join(" "));
        let location = cwd
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "current dir".to_string());

        if dry_run {
            info!("[DRY RUN] Would execute: {} in {}", line, location);
            return true;
        }

        match self.execute(command, cwd).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Command failed: {} (in {})", line, location);
                debug!("Error output: {}", redact_credentials(&format!("{:#}", e)));
                false
            }
        }
    }
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    async fn spawn(command: &[&str], cwd: Option<&Path>) -> Result<std::process::Output> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("Empty command"))?;

        let mut cmd = AsyncCommand::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        // A prompt would block the daemon forever on bad credentials
        cmd.env("GIT_TERMINAL_PROMPT", "0");

        cmd.output()
            .await
            .with_context(|| format!("Failed to execute {}", program))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn execute(&self, command: &[&str], cwd: Option<&Path>) -> Result<()> {
        let output = Self::spawn(command, cwd).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} ({})", stderr.trim(), output.status));
        }

        Ok(())
    }

    async fn output(&self, command: &[&str], cwd: Option<&Path>) -> Result<String> {
        let output = Self::spawn(command, cwd).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} ({})", stderr.trim(), output.status));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Mask userinfo in any URL found in `text`
pub fn redact_credentials(text: &str) -> String {
    static USERINFO: OnceLock<Regex> = OnceLock::new();
    let re = USERINFO.get_or_init(|| {
        Regex::new(r"([A-Za-z][A-Za-z0-9+.-]*://)[^@/\s]+@").expect("valid userinfo pattern")
    });
    re.replace_all(text, "${1}***@").into_owned()
}
