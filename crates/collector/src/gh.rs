//! Read-only queries against the hosting service through the `gh` CLI.
//!
//! Each logical request is its own method. Filters are passed as typed query
//! parameters (`-f key=value`), and anything that can't be expressed that way
//! (title tags, exact workflow names) is matched on the decoded values here.
//! Every failure mode (missing CLI, auth, transport, bad JSON) comes back as `None`.

use crate::process::{read_stdout, CommandRunner, CommandSpec};
use crate::WatchdogError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use watchdog_protocol::{RecentCommit, RelatedIssue, RelatedPullRequest, WorkflowRun};

const GH: &str = "gh";
const PAGE_SIZE: usize = 100;
const COMMIT_SHA_PREFIX: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApiQuery {
    endpoint: String,
    params: Vec<(&'static str, String)>,
}

impl ApiQuery {
    fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: Vec::new(),
        }
    }

    fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    fn to_command(&self) -> CommandSpec {
        let mut command = CommandSpec::new(GH).args(["api", "-X", "GET", self.endpoint.as_str()]);
        for (key, value) in &self.params {
            command = command.arg("-f").arg(format!("{key}={value}"));
        }
        command
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct RepoPermissions {
    #[serde(default)]
    pub push: bool,
    #[serde(default)]
    pub admin: bool,
}

pub struct GhClient<'a> {
    runner: &'a dyn CommandRunner,
    repository: String,
}

impl<'a> GhClient<'a> {
    pub fn new(runner: &'a dyn CommandRunner, repository: impl Into<String>) -> Self {
        Self {
            runner,
            repository: repository.into(),
        }
    }

    /// Whether the `gh` binary can be executed at all.
    pub async fn cli_available(&self) -> bool {
        self.runner
            .run(&CommandSpec::new(GH).arg("--version"))
            .await
            .is_ok()
    }

    pub async fn auth_status(&self) -> bool {
        match self
            .runner
            .run(&CommandSpec::new(GH).args(["auth", "status"]))
            .await
        {
            Ok(_) => true,
            Err(err) => {
                log::info!("gh auth probe failed: {err}");
                false
            }
        }
    }

    pub async fn repository_permissions(&self) -> Option<RepoPermissions> {
        let meta: RepoMetadataWire = self
            .query(ApiQuery::new(format!("repos/{}", self.repository)))
            .await?;
        meta.permissions
    }

    /// Open issues whose title carries `tag`. Pull requests surfaced by the
    /// issues endpoint are dropped.
    pub async fn open_issues(&self, tag: &str) -> Option<Vec<RelatedIssue>> {
        let issues: Vec<IssueWire> = self
            .query(
                ApiQuery::new(format!("repos/{}/issues", self.repository))
                    .param("state", "open")
                    .param("per_page", PAGE_SIZE),
            )
            .await?;
        Some(
            issues
                .into_iter()
                .filter(|issue| issue.pull_request.is_none())
                .filter(|issue| issue.state == "open" && issue.title.contains(tag))
                .map(IssueWire::into_model)
                .collect(),
        )
    }

    pub async fn open_pulls(&self, tag: &str) -> Option<Vec<RelatedPullRequest>> {
        let pulls: Vec<PullWire> = self
            .query(
                ApiQuery::new(format!("repos/{}/pulls", self.repository))
                    .param("state", "open")
                    .param("per_page", PAGE_SIZE),
            )
            .await?;
        Some(
            pulls
                .into_iter()
                .filter(|pull| pull.state == "open" && pull.title.contains(tag))
                .map(PullWire::into_model)
                .collect(),
        )
    }

    pub async fn recent_commits(&self) -> Option<Vec<RecentCommit>> {
        let commits: Vec<CommitWire> = self
            .query(ApiQuery::new(format!("repos/{}/commits", self.repository)))
            .await?;
        Some(commits.into_iter().map(CommitWire::into_model).collect())
    }

    pub async fn workflow_id(&self, workflow_name: &str) -> Option<u64> {
        let list: WorkflowListWire = self
            .query(
                ApiQuery::new(format!("repos/{}/actions/workflows", self.repository))
                    .param("per_page", PAGE_SIZE),
            )
            .await?;
        list.workflows
            .into_iter()
            .find(|workflow| workflow.name == workflow_name)
            .map(|workflow| workflow.id)
    }

    /// Newest-first run history, at most `limit` entries.
    pub async fn workflow_runs(&self, workflow_id: u64, limit: usize) -> Option<Vec<WorkflowRun>> {
        let list: RunListWire = self
            .query(
                ApiQuery::new(format!(
                    "repos/{}/actions/workflows/{workflow_id}/runs",
                    self.repository
                ))
                .param("per_page", limit),
            )
            .await?;
        Some(
            list.workflow_runs
                .into_iter()
                .take(limit)
                .map(RunWire::into_model)
                .collect(),
        )
    }

    async fn query<T: DeserializeOwned>(&self, query: ApiQuery) -> Option<T> {
        let stdout = read_stdout(self.runner, &query.to_command()).await?;
        match serde_json::from_str(&stdout) {
            Ok(value) => Some(value),
            Err(err) => {
                let err = WatchdogError::Parse {
                    what: query.endpoint,
                    detail: err.to_string(),
                };
                log::warn!("{err}");
                None
            }
        }
    }
}

#[derive(Deserialize)]
struct RepoMetadataWire {
    #[serde(default)]
    permissions: Option<RepoPermissions>,
}

#[derive(Deserialize)]
struct LabelWire {
    name: String,
}

#[derive(Deserialize)]
struct IssueWire {
    number: u64,
    title: String,
    state: String,
    created_at: String,
    updated_at: String,
    #[serde(default)]
    labels: Vec<LabelWire>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

impl IssueWire {
    fn into_model(self) -> RelatedIssue {
        RelatedIssue {
            number: self.number,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
            labels: self.labels.into_iter().map(|label| label.name).collect(),
            body: self.body,
        }
    }
}

#[derive(Deserialize)]
struct HeadRefWire {
    #[serde(rename = "ref")]
    git_ref: String,
}

#[derive(Deserialize)]
struct PullWire {
    number: u64,
    title: String,
    state: String,
    created_at: String,
    updated_at: String,
    head: HeadRefWire,
    #[serde(default)]
    body: Option<String>,
}

impl PullWire {
    fn into_model(self) -> RelatedPullRequest {
        RelatedPullRequest {
            number: self.number,
            title: self.title,
            created_at: self.created_at,
            updated_at: self.updated_at,
            head: self.head.git_ref,
            body: self.body,
        }
    }
}

#[derive(Deserialize, Default)]
struct AuthorWire {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct CommitDetailWire {
    #[serde(default)]
    message: String,
    #[serde(default)]
    author: Option<AuthorWire>,
}

#[derive(Deserialize)]
struct CommitWire {
    sha: String,
    commit: CommitDetailWire,
}

impl CommitWire {
    fn into_model(self) -> RecentCommit {
        let author = self.commit.author.unwrap_or_default();
        RecentCommit {
            sha: self.sha.chars().take(COMMIT_SHA_PREFIX).collect(),
            message: self.commit.message,
            author: author.name.unwrap_or_default(),
            date: author.date.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct WorkflowWire {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct WorkflowListWire {
    #[serde(default)]
    workflows: Vec<WorkflowWire>,
}

#[derive(Deserialize)]
struct HeadCommitWire {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    author: Option<AuthorWire>,
}

#[derive(Deserialize)]
struct RunWire {
    id: u64,
    run_number: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    head_sha: String,
    #[serde(default)]
    head_commit: Option<HeadCommitWire>,
}

impl RunWire {
    fn into_model(self) -> WorkflowRun {
        let (message, author) = match self.head_commit {
            Some(head) => (head.message, head.author.and_then(|author| author.name)),
            None => (None, None),
        };
        WorkflowRun {
            id: self.id,
            run_number: self.run_number,
            status: self.status,
            conclusion: self.conclusion,
            created_at: self.created_at,
            head_sha: self.head_sha,
            head_commit_message: message,
            head_commit_author: author,
        }
    }
}

#[derive(Deserialize)]
struct RunListWire {
    #[serde(default)]
    workflow_runs: Vec<RunWire>,
}
