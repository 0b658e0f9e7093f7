use serde::{Deserialize, Serialize};

/// History window handed to the classifier.
pub const MAX_RECENT_RUNS: usize = 20;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationWarning {
    #[default]
    None,
    GhCliMissing,
    GhAuthMissing,
}

impl ValidationWarning {
    pub const fn as_str(self) -> &'static str {
        match self {
            ValidationWarning::None => "none",
            ValidationWarning::GhCliMissing => "gh_cli_missing",
            ValidationWarning::GhAuthMissing => "gh_auth_missing",
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, ValidationWarning::None)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Permissions {
    pub can_create_branches: bool,
    pub can_create_issues: bool,
    pub can_create_prs: bool,
    pub create_fixes_enabled: bool,
    pub validation_warnings: ValidationWarning,
}

impl Permissions {
    /// Every capability follows the repository's single `push` bit.
    pub fn from_push_access(push: bool, create_fixes: bool) -> Self {
        Self {
            can_create_branches: push,
            can_create_issues: push,
            can_create_prs: push,
            create_fixes_enabled: create_fixes && push,
            validation_warnings: ValidationWarning::None,
        }
    }

    pub fn denied(warning: ValidationWarning) -> Self {
        Self {
            validation_warnings: warning,
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Success,
    Failure,
    Other,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub id: u64,
    pub run_number: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub head_sha: String,
    #[serde(default)]
    pub head_commit_message: Option<String>,
    #[serde(default)]
    pub head_commit_author: Option<String>,
}

impl WorkflowRun {
    pub fn outcome(&self) -> RunOutcome {
        match self.conclusion.as_deref() {
            Some("success") => RunOutcome::Success,
            Some("failure") => RunOutcome::Failure,
            _ => RunOutcome::Other,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePattern {
    Chronic,
    Frequent,
    Intermittent,
    Isolated,
    Unknown,
}

impl FailurePattern {
    pub const fn as_str(self) -> &'static str {
        match self {
            FailurePattern::Chronic => "chronic",
            FailurePattern::Frequent => "frequent",
            FailurePattern::Intermittent => "intermittent",
            FailurePattern::Isolated => "isolated",
            FailurePattern::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FailureAnalysis {
    pub total_runs: usize,
    pub failed_runs: usize,
    pub success_runs: usize,
    pub failure_rate_percent: u32,
    pub pattern: FailurePattern,
}

impl FailureAnalysis {
    pub const fn empty() -> Self {
        Self {
            total_runs: 0,
            failed_runs: 0,
            success_runs: 0,
            failure_rate_percent: 0,
            pattern: FailurePattern::Unknown,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RelatedIssue {
    pub number: u64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RelatedPullRequest {
    pub number: u64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecentCommit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: String,
}

/// Identity of the workflow run being diagnosed. Absent values are `"unknown"`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WorkflowIdentity {
    pub workflow: String,
    pub run_id: String,
    pub run_attempt: String,
    pub repository: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub actor: String,
    pub event_name: String,
}

impl WorkflowIdentity {
    /// Title marker carried by issues and PRs the watchdog opened for this workflow.
    pub fn tag(&self) -> String {
        format!("Watchdog [{}]", self.workflow)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Complete,
    LimitedContext,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContextSummary {
    #[serde(flatten)]
    pub identity: WorkflowIdentity,
    pub safe_mode: bool,
    pub existing_issues_count: usize,
    pub existing_prs_count: usize,
    pub recent_failures: usize,
    pub test_files_found: usize,
    pub test_results_files: usize,
    pub timestamp: String,
    pub status: SummaryStatus,
}
