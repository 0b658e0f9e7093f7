use std::path::{Path, PathBuf};

pub const DEFAULT_WORKDIR_NAME: &str = ".watchdog";

pub const PERMISSIONS: &str = "permissions.json";
pub const EXISTING_ISSUES: &str = "existing-issues.json";
pub const EXISTING_PRS: &str = "existing-prs.json";
pub const RECENT_COMMITS: &str = "recent-commits.json";
pub const RECENT_RUNS: &str = "recent-runs.json";
pub const FAILURE_ANALYSIS: &str = "failure-analysis.json";
pub const WORKFLOW_ID: &str = "workflow-id.txt";
pub const TEST_FILES: &str = "test-files.txt";
pub const CONTEXT_SUMMARY: &str = "context-summary.json";
pub const TEST_OUTPUTS_DIR: &str = "test-outputs";
pub const CONTEXT_DOCUMENT: &str = "context-data.md";
pub const ANALYSIS_RESULT: &str = "analysis-result.json";

/// The working directory owned by one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workdir {
    root: PathBuf,
}

impl Workdir {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn test_outputs(&self) -> PathBuf {
        self.root.join(TEST_OUTPUTS_DIR)
    }

    /// Sibling of `test-outputs/` that receives copies before the swap.
    pub fn test_outputs_staging(&self) -> PathBuf {
        self.root.join(format!("{TEST_OUTPUTS_DIR}.staging"))
    }

    pub fn context_document(&self) -> PathBuf {
        self.file(CONTEXT_DOCUMENT)
    }

    pub fn analysis_result(&self) -> PathBuf {
        self.file(ANALYSIS_RESULT)
    }
}

impl Default for Workdir {
    fn default() -> Self {
        Self::new(DEFAULT_WORKDIR_NAME)
    }
}
