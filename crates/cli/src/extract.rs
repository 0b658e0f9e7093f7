use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use watchdog_collector::{store, RunConfig};
use watchdog_protocol::{AnalysisFields, CostTelemetry, OutputRecord};

/// Reads the agent's verdict. Any problem yields the `analysis_failed` fallback.
pub async fn load_analysis(path: &Path) -> AnalysisFields {
    let Some(text) = store::read_text(path).await else {
        log::warn!("No analysis result at {}; the agent may have failed", path.display());
        return AnalysisFields::analysis_failed();
    };
    match serde_json::from_str::<AnalysisFields>(&text) {
        Ok(fields) => {
            log::info!("Parsed analysis result from {}", path.display());
            fields
        }
        Err(err) => {
            log::warn!("Unparsable analysis result {}: {err}", path.display());
            AnalysisFields::analysis_failed()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct UsageWire {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ResultMessageWire {
    #[serde(default)]
    usage: Option<UsageWire>,
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    cost_usd: Option<f64>,
    #[serde(default)]
    num_turns: Option<u64>,
}

impl ResultMessageWire {
    fn into_telemetry(self) -> CostTelemetry {
        let usage = self.usage.unwrap_or_default();
        CostTelemetry {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            total_cost_usd: self.total_cost_usd.or(self.cost_usd),
            turns_used: self.num_turns,
        }
    }
}

/// Execution telemetry is optional; absence or garbage yields empty fields.
pub async fn load_telemetry(path: Option<&Path>) -> CostTelemetry {
    let Some(path) = path else {
        log::debug!("EXECUTION_FILE not set; no cost telemetry");
        return CostTelemetry::default();
    };
    let Some(text) = store::read_text(path).await else {
        log::debug!("No execution telemetry at {}", path.display());
        return CostTelemetry::default();
    };
    match parse_telemetry(&text) {
        Some(telemetry) => telemetry,
        None => {
            log::debug!("Execution telemetry at {} has no result message", path.display());
            CostTelemetry::default()
        }
    }
}

/// Accepts one result object, a JSON array of stream messages, or one message per
/// line. With several messages, the last `"type": "result"` one wins.
fn parse_telemetry(text: &str) -> Option<CostTelemetry> {
    let messages = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(object @ Value::Object(_)) => vec![object],
        Ok(_) => return None,
        Err(_) => text
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .collect(),
    };

    let result = if messages.len() == 1 {
        messages.into_iter().next()
    } else {
        messages
            .into_iter()
            .rev()
            .find(|message| message.get("type").and_then(Value::as_str) == Some("result"))
    };
    serde_json::from_value::<ResultMessageWire>(result?)
        .ok()
        .map(ResultMessageWire::into_telemetry)
}

pub async fn build_record(config: &RunConfig) -> OutputRecord {
    let analysis = load_analysis(&config.workdir.analysis_result()).await;
    let telemetry = load_telemetry(config.execution_file.as_deref()).await;
    OutputRecord::new(&analysis, &telemetry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_result_falls_back() {
        let dir = tempdir().unwrap();
        let fields = load_analysis(&dir.path().join("analysis-result.json")).await;
        assert_eq!(fields, AnalysisFields::analysis_failed());
    }

    #[tokio::test]
    async fn garbage_result_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis-result.json");
        fs::write(&path, "severity: high").unwrap();
        assert_eq!(load_analysis(&path).await, AnalysisFields::analysis_failed());
    }

    #[tokio::test]
    async fn partial_result_leaves_other_fields_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("analysis-result.json");
        fs::write(&path, r#"{"severity": "high", "issue_number": "null"}"#).unwrap();

        let record = OutputRecord::new(&load_analysis(&path).await, &CostTelemetry::default());

        assert_eq!(record.severity, "high");
        assert_eq!(record.action_taken, "");
        assert_eq!(record.issue_number, "");
    }

    #[test]
    fn single_result_object() {
        let telemetry = parse_telemetry(
            r#"{"type": "result", "usage": {"input_tokens": 1000, "output_tokens": 250},
                "total_cost_usd": 0.5, "num_turns": 9}"#,
        )
        .unwrap();
        assert_eq!(
            telemetry,
            CostTelemetry {
                input_tokens: Some(1000),
                output_tokens: Some(250),
                total_cost_usd: Some(0.5),
                turns_used: Some(9),
            }
        );
        assert_eq!(telemetry.formatted_cost().as_deref(), Some("$0.5000"));
    }

    #[test]
    fn stream_array_uses_last_result_message() {
        let telemetry = parse_telemetry(
            r#"[
                {"type": "system", "subtype": "init"},
                {"type": "result", "num_turns": 1, "cost_usd": 0.01},
                {"type": "assistant", "message": {}},
                {"type": "result", "num_turns": 4, "cost_usd": 0.0213,
                 "usage": {"input_tokens": 10, "output_tokens": 20}}
            ]"#,
        )
        .unwrap();
        assert_eq!(telemetry.turns_used, Some(4));
        assert_eq!(telemetry.formatted_cost().as_deref(), Some("$0.0213"));
        assert_eq!(telemetry.output_tokens, Some(20));
    }

    #[test]
    fn line_delimited_stream_is_accepted() {
        let text = "{\"type\":\"system\"}\n{\"type\":\"result\",\"num_turns\":3}\n";
        assert_eq!(parse_telemetry(text).unwrap().turns_used, Some(3));
    }

    #[test]
    fn stream_without_result_is_absent() {
        assert_eq!(parse_telemetry(r#"[{"type": "system"}, {"type": "user"}]"#), None);
        assert_eq!(parse_telemetry("42"), None);
    }

    #[tokio::test]
    async fn unset_or_missing_telemetry_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(load_telemetry(None).await, CostTelemetry::default());
        assert_eq!(
            load_telemetry(Some(&dir.path().join("execution.json"))).await,
            CostTelemetry::default()
        );
    }
}
