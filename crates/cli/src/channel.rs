//! Append-only workflow channels: the env file (`GITHUB_ENV`) and the step
//! output file (`GITHUB_OUTPUT`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use watchdog_collector::{Result, WatchdogError};
use watchdog_protocol::OutputRecord;

pub fn append(path: &Path, payload: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| persistence(path, err))?;
    file.write_all(payload.as_bytes())
        .map_err(|err| persistence(path, err))
}

/// Exports `key=value` to the workflow env file, if one is configured.
pub fn export_env(env_file: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let Some(path) = env_file else {
        log::debug!("GITHUB_ENV not set; not exporting {key}");
        return Ok(());
    };
    append(path, &format!("{key}={value}\n"))
}

pub fn write_outputs(output_file: Option<&Path>, record: &OutputRecord) -> Result<()> {
    let path = output_file.ok_or_else(|| WatchdogError::Persistence {
        target: "GITHUB_OUTPUT".to_string(),
        detail: "environment variable not set".to_string(),
    })?;
    append(path, &record.render())
}

fn persistence(path: &Path, err: std::io::Error) -> WatchdogError {
    WatchdogError::Persistence {
        target: path.display().to_string(),
        detail: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn exports_append_instead_of_truncating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("env");
        fs::write(&path, "EXISTING=1\n").unwrap();

        export_env(Some(&path), "DYNAMIC_MAX_TURNS", "22").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "EXISTING=1\nDYNAMIC_MAX_TURNS=22\n"
        );
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        assert!(export_env(None, "VALIDATION_WARNINGS", "gh_cli_missing").is_ok());
    }

    #[test]
    fn missing_output_file_is_fatal() {
        let err = write_outputs(None, &OutputRecord::default()).unwrap_err();
        assert!(err.to_string().contains("GITHUB_OUTPUT"), "{err}");
    }
}
