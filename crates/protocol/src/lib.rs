//! # Watchdog Protocol
//!
//! Types shared by every stage of the CI watchdog pipeline.
//!
//! ## Stages
//!
//! ```text
//! collect ──> .watchdog/*.json, test-outputs/
//!     │
//!     └──> render ──> .watchdog/context-data.md
//!                         │
//!                    (analysis agent)
//!                         │
//!                         └──> analysis-result.json ──> extract ──> $GITHUB_OUTPUT
//! ```
//!
//! Every stage reads and writes through the artifact names in [`artifacts`], so any stage
//! can be re-run on its own as long as the working directory is intact.

use serde::{Deserialize, Serialize};

pub mod artifacts;
pub mod model;
pub mod nullable;
pub mod outputs;

pub use artifacts::Workdir;
pub use model::{
    ContextSummary, FailureAnalysis, FailurePattern, Permissions, RecentCommit, RelatedIssue,
    RelatedPullRequest, RunOutcome, SummaryStatus, ValidationWarning, WorkflowIdentity,
    WorkflowRun, MAX_RECENT_RUNS,
};
pub use outputs::{AnalysisFields, CostTelemetry, OutputRecord, OUTPUT_KEYS};

pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 200_000;
pub const MIN_MAX_CONTEXT_CHARS: usize = 10_000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BudgetTruncation {
    MaxChars,
}

/// Character accounting for the rendered context document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DocumentBudget {
    pub max_chars: usize,
    pub used_chars: usize,
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<BudgetTruncation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub omitted_files: Vec<String>,
}

impl DocumentBudget {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(MIN_MAX_CONTEXT_CHARS),
            used_chars: 0,
            truncated: false,
            truncation: None,
            omitted_files: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.max_chars.saturating_sub(self.used_chars)
    }

    pub fn mark_truncated(&mut self) {
        self.truncated = true;
        self.truncation = Some(BudgetTruncation::MaxChars);
    }
}
