//! System health checks for the syncer
//!
//! This module provides preflight checks to verify the system is properly
//! configured before the daemon starts mirroring.

use crate::Config;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Configuration validity
    pub config: CheckResult,
    /// Mirrors root status
    pub repos_dir: CheckResult,
    /// Reindex endpoint status (warning only, not required)
    pub reindex: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    #[cfg(test)]
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: true,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config) -> Self {
        Self {
            git: Self::check_git(),
            config: Self::check_config(config),
            repos_dir: Self::check_repos_dir(config),
            reindex: Self::check_reindex(config),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.errors().is_empty()
    }

    /// Names of checks that failed outright
    pub fn errors(&self) -> Vec<&'static str> {
        self.named(|r| !r.passed)
    }

    /// Names of checks that passed with a warning
    pub fn warnings(&self) -> Vec<&'static str> {
        self.named(|r| r.is_warning)
    }

    fn named(&self, keep: impl Fn(&CheckResult) -> bool) -> Vec<&'static str> {
        self.all_checks()
            .into_iter()
            .filter(|(_, result)| keep(*result))
            .map(|(name, _)| name)
            .collect()
    }

    /// Check git installation
    fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    /// Check the configuration would pass startup validation
    fn check_config(config: &Config) -> CheckResult {
        match config.validate() {
            Ok(()) => CheckResult::ok_with_details(
                "Configuration valid",
                format!(
                    "Provider: {}, org: {}",
                    config.provider.kind, config.provider.org
                ),
            ),
            Err(e) => CheckResult::error_with_details("Configuration invalid", format!("{:#}", e)),
        }
    }

    /// Check the mirrors root is a directory or can be created
    fn check_repos_dir(config: &Config) -> CheckResult {
        let path = config.repos_dir();
        if path.is_dir() {
            CheckResult::ok_with_details("Repos directory exists", path.display().to_string())
        } else if path.exists() {
            CheckResult::error_with_details(
                "Repos directory path is not a directory",
                path.display().to_string(),
            )
        } else if path.ancestors().skip(1).any(|p| p.is_dir()) {
            CheckResult::warning_with_details(
                "Repos directory does not exist yet",
                format!("It will be created on the first pass: {}", path.display()),
            )
        } else {
            CheckResult::error(format!("Invalid repos directory: {}", path.display()))
        }
    }

    /// Check the reindex endpoint (warning only)
    fn check_reindex(config: &Config) -> CheckResult {
        if config.sync.dry_run {
            return CheckResult::warning("Dry run enabled, reindex will not be triggered");
        }
        match reqwest::Url::parse(&config.reindex.url) {
            Ok(url) => CheckResult::ok_with_details("Reindex endpoint configured", url.to_string()),
            Err(e) => CheckResult::warning_with_details(
                "Reindex endpoint is not a valid URL",
                e.to_string(),
            ),
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Git Installation", &self.git),
            ("Configuration", &self.config),
            ("Repos Directory", &self.repos_dir),
            ("Reindex Endpoint", &self.reindex),
        ]
    }
}
