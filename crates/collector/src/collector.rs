use crate::classify::classify;
use crate::config::RunConfig;
use crate::discovery::{copy_test_outputs, scan_reference_files};
use crate::gh::GhClient;
use crate::process::CommandRunner;
use crate::store::{persist_json, persist_text};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use watchdog_protocol::artifacts::{
    CONTEXT_SUMMARY, EXISTING_ISSUES, EXISTING_PRS, FAILURE_ANALYSIS, PERMISSIONS,
    RECENT_COMMITS, RECENT_RUNS, TEST_FILES, WORKFLOW_ID,
};
use watchdog_protocol::{
    ContextSummary, FailureAnalysis, Permissions, RecentCommit, RelatedIssue, RelatedPullRequest,
    SummaryStatus, ValidationWarning, WorkflowRun, MAX_RECENT_RUNS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionMode {
    Limited(ValidationWarning),
    Safe,
    Normal,
}

#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    pub mode: CollectionMode,
    pub permissions: Permissions,
    pub analysis: FailureAnalysis,
    pub summary: ContextSummary,
}

#[derive(Debug, Default)]
struct TestFiles {
    referenced: usize,
    copied: usize,
}

/// Gathers every context artifact into the working directory.
///
/// Never fails: unreachable sources degrade to empty artifacts, and the summary is
/// always written last.
pub struct ContextCollector<'a> {
    config: &'a RunConfig,
    gh: GhClient<'a>,
}

impl<'a> ContextCollector<'a> {
    pub fn new(config: &'a RunConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            gh: GhClient::new(runner, config.identity.repository.clone()),
        }
    }

    /// Decides the collection mode. The `gh` probes are the only remote calls
    /// made before the mode is known.
    pub async fn probe(&self) -> CollectionMode {
        if !self.gh.cli_available().await {
            return CollectionMode::Limited(ValidationWarning::GhCliMissing);
        }
        if !self.gh.auth_status().await {
            return CollectionMode::Limited(ValidationWarning::GhAuthMissing);
        }
        if self.config.safe_mode {
            CollectionMode::Safe
        } else {
            CollectionMode::Normal
        }
    }

    pub async fn collect(&self) -> CollectionOutcome {
        let mode = self.probe().await;
        log::info!("Collecting context ({mode:?})");

        let outcome = match mode {
            CollectionMode::Limited(warning) => self.collect_limited(warning).await,
            CollectionMode::Safe | CollectionMode::Normal => self.collect_remote(mode).await,
        };

        persist_json(&self.config.workdir.file(CONTEXT_SUMMARY), &outcome.summary).await;
        log::info!(
            "Context collected: {} issues, {} PRs, {} recent failures, {} test files copied",
            outcome.summary.existing_issues_count,
            outcome.summary.existing_prs_count,
            outcome.summary.recent_failures,
            outcome.summary.test_results_files
        );
        outcome
    }

    async fn collect_limited(&self, warning: ValidationWarning) -> CollectionOutcome {
        log::warn!(
            "GitHub access unavailable ({}); collecting limited context",
            warning.as_str()
        );
        let permissions = Permissions::denied(warning);
        let analysis = FailureAnalysis::empty();

        self.write_related(&[], &[], &[]).await;
        self.write_history("", &[], &analysis).await;
        persist_json(&self.config.workdir.file(PERMISSIONS), &permissions).await;
        let files = self.discover_test_files().await;

        let summary = self.summary(SummaryStatus::LimitedContext, 0, 0, &analysis, &files);
        CollectionOutcome {
            mode: CollectionMode::Limited(warning),
            permissions,
            analysis,
            summary,
        }
    }

    async fn collect_remote(&self, mode: CollectionMode) -> CollectionOutcome {
        let push = match self.gh.repository_permissions().await {
            Some(perms) => perms.push,
            None => {
                log::warn!("Repository permissions unavailable; assuming read-only");
                false
            }
        };
        let permissions = Permissions::from_push_access(push, self.config.features.create_fixes());
        persist_json(&self.config.workdir.file(PERMISSIONS), &permissions).await;

        let (issues, pulls, commits) = if mode == CollectionMode::Safe {
            log::info!("Safe mode: skipping issues, pull requests and commits");
            (Vec::new(), Vec::new(), Vec::new())
        } else {
            let tag = self.config.identity.tag();
            (
                self.gh.open_issues(&tag).await.unwrap_or_default(),
                self.gh.open_pulls(&tag).await.unwrap_or_default(),
                self.gh.recent_commits().await.unwrap_or_default(),
            )
        };
        self.write_related(&issues, &pulls, &commits).await;

        let workflow_id = self.gh.workflow_id(&self.config.identity.workflow).await;
        let runs = match workflow_id {
            Some(id) => self
                .gh
                .workflow_runs(id, MAX_RECENT_RUNS)
                .await
                .unwrap_or_default(),
            None => {
                log::info!(
                    "Workflow {:?} not found; no run history",
                    self.config.identity.workflow
                );
                Vec::new()
            }
        };
        let analysis = classify(&runs);
        let id_text = workflow_id.map(|id| id.to_string()).unwrap_or_default();
        self.write_history(&id_text, &runs, &analysis).await;

        let files = self.discover_test_files().await;
        let summary = self.summary(
            SummaryStatus::Complete,
            issues.len(),
            pulls.len(),
            &analysis,
            &files,
        );
        CollectionOutcome {
            mode,
            permissions,
            analysis,
            summary,
        }
    }

    async fn write_related(
        &self,
        issues: &[RelatedIssue],
        pulls: &[RelatedPullRequest],
        commits: &[RecentCommit],
    ) {
        let workdir = &self.config.workdir;
        persist_json(&workdir.file(EXISTING_ISSUES), issues).await;
        persist_json(&workdir.file(EXISTING_PRS), pulls).await;
        persist_json(&workdir.file(RECENT_COMMITS), commits).await;
    }

    async fn write_history(
        &self,
        workflow_id: &str,
        runs: &[WorkflowRun],
        analysis: &FailureAnalysis,
    ) {
        let workdir = &self.config.workdir;
        persist_text(&workdir.file(WORKFLOW_ID), workflow_id).await;
        persist_json(&workdir.file(RECENT_RUNS), runs).await;
        persist_json(&workdir.file(FAILURE_ANALYSIS), analysis).await;
    }

    async fn discover_test_files(&self) -> TestFiles {
        let workdir = &self.config.workdir;
        let referenced = scan_reference_files(&self.config.repo_root, workdir.root());
        let mut listing = referenced.join("\n");
        if !listing.is_empty() {
            listing.push('\n');
        }
        persist_text(&workdir.file(TEST_FILES), &listing).await;

        let copied = match copy_test_outputs(
            &self.config.repo_root,
            self.config.test_results_path.as_deref(),
            workdir.root(),
            &workdir.test_outputs_staging(),
            &workdir.test_outputs(),
        ) {
            Ok(report) => report.copied.len(),
            Err(err) => {
                log::warn!("Failed to collect test outputs: {err}");
                0
            }
        };

        TestFiles {
            referenced: referenced.len(),
            copied,
        }
    }

    fn summary(
        &self,
        status: SummaryStatus,
        issues: usize,
        pulls: usize,
        analysis: &FailureAnalysis,
        files: &TestFiles,
    ) -> ContextSummary {
        ContextSummary {
            identity: self.config.identity.clone(),
            safe_mode: self.config.safe_mode,
            existing_issues_count: issues,
            existing_prs_count: pulls,
            recent_failures: analysis.failed_runs,
            test_files_found: files.referenced,
            test_results_files: files.copied,
            timestamp: now_rfc3339(),
            status,
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
