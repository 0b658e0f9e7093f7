//! # Watchdog Collector
//!
//! Failure-tolerant context collection for a finished CI workflow run.
//!
//! ## Pipeline
//!
//! ```text
//! RunConfig (environment)
//!     │
//!     ├──> gh probes ──> Limited | Safe | Normal
//!     │
//!     ├──> GhClient (typed `gh api` queries)
//!     │      └─> permissions, issues, PRs, commits, run history
//!     │
//!     ├──> Classifier
//!     │      └─> failure-analysis.json
//!     │
//!     ├──> Discovery (walkdir scan + glob copy)
//!     │      └─> test-files.txt, test-outputs/
//!     │
//!     └──> context-summary.json (always last)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use watchdog_collector::{ContextCollector, RunConfig, SystemRunner};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = RunConfig::from_env();
//!     let runner = SystemRunner::new(config.command_timeout);
//!     let outcome = ContextCollector::new(&config, &runner).collect().await;
//!     println!("{} recent failures", outcome.summary.recent_failures);
//! }
//! ```

mod classify;
mod collector;
mod config;
mod discovery;
mod error;
mod gh;
mod process;
pub mod store;

#[cfg(test)]
mod testing;

pub use classify::classify;
pub use collector::{CollectionMode, CollectionOutcome, ContextCollector};
pub use config::{FeatureFlags, RunConfig};
pub use discovery::{sanitize_name, DEPENDENCY_CACHE_DIRS, MAX_REFERENCE_FILES};
pub use error::{Result, WatchdogError};
pub use gh::{GhClient, RepoPermissions};
pub use process::{read_stdout, CommandRunner, CommandSpec, SystemRunner};
