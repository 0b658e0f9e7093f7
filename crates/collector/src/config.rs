use std::env;
use std::path::PathBuf;
use std::time::Duration;
use watchdog_protocol::artifacts::DEFAULT_WORKDIR_NAME;
use watchdog_protocol::{Workdir, WorkflowIdentity, DEFAULT_MAX_CONTEXT_CHARS};

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;
const UNKNOWN: &str = "unknown";

/// Feature toggles passed through to the analysis agent. `None` means the
/// workflow never set the flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub create_issues: Option<bool>,
    pub create_fixes: Option<bool>,
    pub rerun_tests: Option<bool>,
}

impl FeatureFlags {
    pub fn create_issues(&self) -> bool {
        self.create_issues.unwrap_or(false)
    }

    pub fn create_fixes(&self) -> bool {
        self.create_fixes.unwrap_or(false)
    }

    pub fn rerun_tests(&self) -> bool {
        self.rerun_tests.unwrap_or(false)
    }
}

/// Everything the pipeline reads from its environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workdir: Workdir,
    pub repo_root: PathBuf,
    pub identity: WorkflowIdentity,
    pub safe_mode: bool,
    pub test_results_path: Option<String>,
    pub features: FeatureFlags,
    pub severity_threshold: Option<String>,
    pub execution_file: Option<PathBuf>,
    pub debug: bool,
    pub output_file: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub agent_credential_present: bool,
    pub command_timeout: Duration,
    pub max_context_chars: usize,
}

impl RunConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key/value source. Blank values count as unset,
    /// which is how workflow runners pass omitted inputs.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let identity_field = |key: &str| get(key).unwrap_or_else(|| UNKNOWN.to_string());

        let identity = WorkflowIdentity {
            workflow: identity_field("GITHUB_WORKFLOW"),
            run_id: identity_field("GITHUB_RUN_ID"),
            run_attempt: identity_field("GITHUB_RUN_ATTEMPT"),
            repository: identity_field("GITHUB_REPOSITORY"),
            git_ref: identity_field("GITHUB_REF"),
            sha: identity_field("GITHUB_SHA"),
            actor: identity_field("GITHUB_ACTOR"),
            event_name: identity_field("GITHUB_EVENT_NAME"),
        };

        let command_timeout = get("WATCHDOG_COMMAND_TIMEOUT_SECS")
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
        let max_context_chars = get("WATCHDOG_MAX_CONTEXT_CHARS")
            .and_then(|raw| raw.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_CONTEXT_CHARS);

        let workdir = get("WATCHDOG_DIR").unwrap_or_else(|| DEFAULT_WORKDIR_NAME.to_string());

        Self {
            workdir: Workdir::new(workdir),
            repo_root: PathBuf::from("."),
            identity,
            safe_mode: parse_flag(get("SAFE_MODE")).unwrap_or(false),
            test_results_path: get("TEST_RESULTS_PATH"),
            features: FeatureFlags {
                create_issues: parse_flag(get("CREATE_ISSUES")),
                create_fixes: parse_flag(get("CREATE_FIXES")),
                rerun_tests: parse_flag(get("RERUN_TESTS")),
            },
            severity_threshold: get("SEVERITY_THRESHOLD"),
            execution_file: get("EXECUTION_FILE").map(PathBuf::from),
            debug: parse_flag(get("DEBUG_MODE")).unwrap_or(false),
            output_file: get("GITHUB_OUTPUT").map(PathBuf::from),
            env_file: get("GITHUB_ENV").map(PathBuf::from),
            agent_credential_present: get("ANTHROPIC_API_KEY").is_some(),
            command_timeout: Duration::from_secs(command_timeout),
            max_context_chars,
        }
    }

    pub fn with_workdir(mut self, workdir: Workdir) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn with_repo_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repo_root = root.into();
        self
    }
}

fn parse_flag(raw: Option<String>) -> Option<bool> {
    raw.map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> RunConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RunConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn missing_identity_fields_fall_back_to_unknown() {
        let config = config_from(&[("GITHUB_WORKFLOW", "CI")]);
        assert_eq!(config.identity.workflow, "CI");
        assert_eq!(config.identity.repository, "unknown");
        assert_eq!(config.identity.git_ref, "unknown");
        assert!(!config.safe_mode);
        assert_eq!(config.features, FeatureFlags::default());
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = config_from(&[
            ("TEST_RESULTS_PATH", "   "),
            ("GITHUB_OUTPUT", ""),
            ("ANTHROPIC_API_KEY", " "),
        ]);
        assert_eq!(config.test_results_path, None);
        assert_eq!(config.output_file, None);
        assert!(!config.agent_credential_present);
    }

    #[test]
    fn flags_parse_true_and_anything_else() {
        let config = config_from(&[
            ("SAFE_MODE", "TRUE"),
            ("CREATE_ISSUES", "true"),
            ("CREATE_FIXES", "no"),
            ("DEBUG_MODE", "1"),
        ]);
        assert!(config.safe_mode);
        assert!(config.debug);
        assert_eq!(config.features.create_issues, Some(true));
        assert_eq!(config.features.create_fixes, Some(false));
        assert_eq!(config.features.rerun_tests, None);
    }

    #[test]
    fn timeouts_and_budgets_reject_garbage() {
        let config = config_from(&[
            ("WATCHDOG_COMMAND_TIMEOUT_SECS", "0"),
            ("WATCHDOG_MAX_CONTEXT_CHARS", "lots"),
        ]);
        assert_eq!(config.command_timeout, Duration::from_secs(DEFAULT_COMMAND_TIMEOUT_SECS));
        assert_eq!(config.max_context_chars, DEFAULT_MAX_CONTEXT_CHARS);
    }
}
