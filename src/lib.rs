//! Mimir Syncer - Git Organization Mirroring Daemon
//!
//! Mirrors every repository of a GitHub organization (or user) or a Bitbucket
//! workspace onto local disk, keeps each mirror on the preferred branch and
//! notifies a code-search indexer after every pass.
//!
//! ## Core Features
//!
//! - **Provider Abstraction**: GitHub and Bitbucket listings as one lazy stream
//! - **Branch Priority**: Each mirror tracks the first preferred branch present remotely
//! - **Failure Isolation**: A broken repository never aborts a pass
//! - **Dry Run**: Log every intended git command without running it
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading, environment overrides and validation
//! - [`discovery`]: Provider trait and factory
//! - [`github`] / [`bitbucket`]: Provider implementations
//! - [`command`]: External command execution
//! - [`git`]: Mirror operations and branch resolution
//! - [`sync`]: Pass orchestration
//! - [`reindex`]: Indexer notification
//! - [`daemon`]: Fixed-period scheduling loop

pub mod bitbucket;
pub mod command;
pub mod config;
pub mod daemon;
pub mod discovery;
pub mod git;
pub mod github;
pub mod health;
pub mod reindex;
pub mod sync;

pub use command::{CommandRunner, SystemRunner};
pub use config::{Config, ProviderKind};
pub use daemon::{Daemon, DaemonStatus};
pub use discovery::{create_provider, RemoteRepo, RepoProvider};
pub use git::{BranchTarget, GitClient};
pub use health::HealthCheck;
pub use reindex::{NotifyOutcome, ReindexNotifier};
pub use sync::{SyncEngine, SyncResult, SyncSummary};
