use crate::channel::export_env;
use watchdog_collector::{CommandRunner, GhClient, Result, RunConfig, WatchdogError};
use watchdog_protocol::ValidationWarning;

pub const WARNINGS_KEY: &str = "VALIDATION_WARNINGS";
pub const FAILED_KEY: &str = "VALIDATION_FAILED";
const API_KEY_MISSING: &str = "api_key_missing";

/// Preflight checks run before any context is collected.
///
/// `gh` problems only degrade the run; a missing agent credential stops it.
pub async fn validate(
    config: &RunConfig,
    runner: &dyn CommandRunner,
) -> Result<ValidationWarning> {
    let env_file = config.env_file.as_deref();
    let gh = GhClient::new(runner, config.identity.repository.clone());

    let warning = if !gh.cli_available().await {
        log::warn!("GitHub CLI not found; some features will be limited");
        ValidationWarning::GhCliMissing
    } else if !gh.auth_status().await {
        log::warn!("GitHub CLI not authenticated; using limited permissions");
        ValidationWarning::GhAuthMissing
    } else {
        ValidationWarning::None
    };
    if !warning.is_none() {
        export_env(env_file, WARNINGS_KEY, warning.as_str())?;
    }

    if !config.agent_credential_present {
        log::error!("ANTHROPIC_API_KEY is required to run the analysis");
        export_env(env_file, FAILED_KEY, API_KEY_MISSING)?;
        return Err(WatchdogError::MissingCredential("ANTHROPIC_API_KEY".to_string()));
    }

    tokio::fs::create_dir_all(config.workdir.root()).await?;
    log::info!(
        "Validation complete: gh {}, API key provided",
        if warning.is_none() {
            "authenticated"
        } else {
            warning.as_str()
        }
    );
    Ok(warning)
}
