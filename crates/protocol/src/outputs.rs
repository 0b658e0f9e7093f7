use serde::{Deserialize, Serialize};

/// Keys written to the output channel, in emission order.
pub const OUTPUT_KEYS: [&str; 9] = [
    "severity",
    "action_taken",
    "issue_number",
    "pr_number",
    "tests_passing",
    "input_tokens",
    "output_tokens",
    "total_cost",
    "turns_used",
];

pub const FALLBACK_SEVERITY: &str = "unknown";
pub const FALLBACK_ACTION: &str = "analysis_failed";

/// Verdict written by the analysis agent to `analysis-result.json`.
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct AnalysisFields {
    #[serde(default, deserialize_with = "crate::nullable::deserialize")]
    pub severity: Option<String>,
    #[serde(default, deserialize_with = "crate::nullable::deserialize")]
    pub action_taken: Option<String>,
    #[serde(default, deserialize_with = "crate::nullable::deserialize")]
    pub issue_number: Option<String>,
    #[serde(default, deserialize_with = "crate::nullable::deserialize")]
    pub pr_number: Option<String>,
    #[serde(default, deserialize_with = "crate::nullable::deserialize")]
    pub tests_passing: Option<String>,
}

impl AnalysisFields {
    /// Fields reported when the agent never produced a usable verdict.
    pub fn analysis_failed() -> Self {
        Self {
            severity: Some(FALLBACK_SEVERITY.to_string()),
            action_taken: Some(FALLBACK_ACTION.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct CostTelemetry {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub total_cost_usd: Option<f64>,
    pub turns_used: Option<u64>,
}

impl CostTelemetry {
    pub fn formatted_cost(&self) -> Option<String> {
        self.total_cost_usd.map(|cost| format!("${cost:.4}"))
    }
}

/// The fixed nine-key record emitted once per run.
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
pub struct OutputRecord {
    pub severity: String,
    pub action_taken: String,
    pub issue_number: String,
    pub pr_number: String,
    pub tests_passing: String,
    pub input_tokens: String,
    pub output_tokens: String,
    pub total_cost: String,
    pub turns_used: String,
}

impl OutputRecord {
    pub fn new(analysis: &AnalysisFields, telemetry: &CostTelemetry) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        let count = |value: Option<u64>| value.map(|n| n.to_string()).unwrap_or_default();
        Self {
            severity: text(&analysis.severity),
            action_taken: text(&analysis.action_taken),
            issue_number: text(&analysis.issue_number),
            pr_number: text(&analysis.pr_number),
            tests_passing: text(&analysis.tests_passing),
            input_tokens: count(telemetry.input_tokens),
            output_tokens: count(telemetry.output_tokens),
            total_cost: telemetry.formatted_cost().unwrap_or_default(),
            turns_used: count(telemetry.turns_used),
        }
    }

    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            (OUTPUT_KEYS[0], self.severity.as_str()),
            (OUTPUT_KEYS[1], self.action_taken.as_str()),
            (OUTPUT_KEYS[2], self.issue_number.as_str()),
            (OUTPUT_KEYS[3], self.pr_number.as_str()),
            (OUTPUT_KEYS[4], self.tests_passing.as_str()),
            (OUTPUT_KEYS[5], self.input_tokens.as_str()),
            (OUTPUT_KEYS[6], self.output_tokens.as_str()),
            (OUTPUT_KEYS[7], self.total_cost.as_str()),
            (OUTPUT_KEYS[8], self.turns_used.as_str()),
        ]
    }

    /// `key=value` lines; values are folded onto one line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.entries() {
            out.push_str(key);
            out.push('=');
            out.push_str(&single_line(value));
            out.push('\n');
        }
        out
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_string_fields_parse_as_absent() {
        let fields: AnalysisFields = serde_json::from_str(
            r#"{"severity":"high","issue_number":"null","pr_number":null,"tests_passing":"null"}"#,
        )
        .unwrap();
        assert_eq!(fields.severity.as_deref(), Some("high"));
        assert_eq!(fields.issue_number, None);
        assert_eq!(fields.pr_number, None);
        assert_eq!(fields.tests_passing, None);
        assert_eq!(fields.action_taken, None);
    }

    #[test]
    fn numeric_issue_number_becomes_text() {
        let fields: AnalysisFields =
            serde_json::from_str(r#"{"issue_number": 42, "tests_passing": false}"#).unwrap();
        let record = OutputRecord::new(&fields, &CostTelemetry::default());
        assert_eq!(record.issue_number, "42");
        assert_eq!(record.tests_passing, "false");
    }

    #[test]
    fn render_emits_every_key_in_order() {
        let record = OutputRecord::new(&AnalysisFields::analysis_failed(), &CostTelemetry::default());
        let rendered = record.render();
        let keys: Vec<&str> = rendered
            .lines()
            .map(|line| line.split('=').next().unwrap())
            .collect();
        assert_eq!(keys, OUTPUT_KEYS.to_vec());
        assert!(rendered.starts_with("severity=unknown\naction_taken=analysis_failed\nissue_number=\n"));
    }

    #[test]
    fn cost_uses_four_decimals() {
        let telemetry = CostTelemetry {
            input_tokens: Some(1200),
            output_tokens: Some(345),
            total_cost_usd: Some(0.12346),
            turns_used: Some(7),
        };
        let record = OutputRecord::new(&AnalysisFields::default(), &telemetry);
        assert_eq!(record.total_cost, "$0.1235");
        assert_eq!(record.input_tokens, "1200");
        assert_eq!(record.turns_used, "7");
    }

    #[test]
    fn multiline_values_stay_on_one_line() {
        let fields = AnalysisFields {
            action_taken: Some("created\nissue".to_string()),
            ..AnalysisFields::default()
        };
        let rendered = OutputRecord::new(&fields, &CostTelemetry::default()).render();
        assert!(rendered.contains("action_taken=created issue\n"));
        assert_eq!(rendered.lines().count(), OUTPUT_KEYS.len());
    }
}
