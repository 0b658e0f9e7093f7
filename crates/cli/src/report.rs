//! Context document rendering.
//!
//! The document has a fixed section order and never omits a section. Everything except
//! the inlined test outputs is rendered first; test outputs then share whatever budget
//! is left, in name order.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use watchdog_collector::{store, RunConfig};
use watchdog_protocol::artifacts::{
    CONTEXT_SUMMARY, EXISTING_ISSUES, EXISTING_PRS, FAILURE_ANALYSIS, RECENT_COMMITS, TEST_FILES,
};
use watchdog_protocol::{DocumentBudget, Workdir};

const MAX_COMMITS: usize = 10;
const SAFE_MODE_NOTICE: &str = "Skipped in safe mode (security precaution)";
const TEST_OUTPUT_TITLE: &str = "Test Output Content";
const OMISSION_NOTE_RESERVE: usize = 512;

/// Everything the document is built from, loaded from the working directory.
#[derive(Debug, Clone, Default)]
pub struct ContextInputs {
    pub summary: Option<Value>,
    pub failure_analysis: Option<Value>,
    pub issues: Option<Value>,
    pub pulls: Option<Value>,
    pub commits: Option<Value>,
    /// `(name, contents)` pairs, sorted by name; empty files already dropped.
    pub test_outputs: Vec<(String, String)>,
    pub test_files: Option<String>,
}

impl ContextInputs {
    pub async fn load(workdir: &Workdir) -> Self {
        Self {
            summary: store::read_json(&workdir.file(CONTEXT_SUMMARY)).await,
            failure_analysis: store::read_json(&workdir.file(FAILURE_ANALYSIS)).await,
            issues: store::read_json(&workdir.file(EXISTING_ISSUES)).await,
            pulls: store::read_json(&workdir.file(EXISTING_PRS)).await,
            commits: store::read_json(&workdir.file(RECENT_COMMITS)).await,
            test_outputs: load_test_outputs(&workdir.test_outputs()).await,
            test_files: store::read_text(&workdir.file(TEST_FILES)).await,
        }
    }
}

async fn load_test_outputs(dir: &Path) -> Vec<(String, String)> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("No test outputs at {}: {err}", dir.display());
            return Vec::new();
        }
    };

    let mut outputs = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                log::warn!("Failed to list {}: {err}", dir.display());
                break;
            }
        };
        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        match tokio::fs::read(entry.path()).await {
            Ok(bytes) if bytes.is_empty() => {}
            Ok(bytes) => outputs.push((name, String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) => log::warn!("Failed to read test output {name}: {err}"),
        }
    }
    outputs.sort_by(|a, b| a.0.cmp(&b.0));
    outputs
}

/// Raw flag values shown in the configuration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSettings {
    pub create_issues: String,
    pub create_fixes: String,
    pub rerun_tests: String,
    pub severity_threshold: String,
    pub safe_mode: bool,
    pub max_chars: usize,
}

impl DocumentSettings {
    pub fn from_config(config: &RunConfig) -> Self {
        let flag = |value: Option<bool>| {
            value
                .map(|flag| flag.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            create_issues: flag(config.features.create_issues),
            create_fixes: flag(config.features.create_fixes),
            rerun_tests: flag(config.features.rerun_tests),
            severity_threshold: config
                .severity_threshold
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            safe_mode: config.safe_mode,
            max_chars: config.max_context_chars,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextDocument {
    pub markdown: String,
    pub budget: DocumentBudget,
}

/// A fixed data section ahead of the test outputs. Sections are rendered in order
/// and each may shrink to its [`DataSection::minimal`] form to stay in budget.
struct DataSection {
    title: &'static str,
    pretty: Option<String>,
    fallback: String,
}

impl DataSection {
    fn json(title: &'static str, data: Option<&Value>) -> Self {
        let pretty = data
            .filter(|value| has_content(value))
            .and_then(|value| serde_json::to_string_pretty(value).ok());
        Self {
            title,
            pretty,
            fallback: format!("No {} available", title.to_lowercase()),
        }
    }

    fn notice(title: &'static str, notice: &str) -> Self {
        Self {
            title,
            pretty: None,
            fallback: notice.to_string(),
        }
    }

    fn minimal(&self) -> String {
        let line = match &self.pretty {
            Some(pretty) => truncation_marker(char_len(pretty)),
            None => self.fallback.clone(),
        };
        format!("### {}
{line}

", self.title)
    }

    /// Renders within `max_chars`; the flag is set when the data was cut.
    fn render(&self, max_chars: usize) -> (String, bool) {
        let Some(pretty) = &self.pretty else {
            return (self.minimal(), false);
        };
        let frame = format!("### {}
```json

```

", self.title);
        match fit_to_budget(pretty, max_chars.saturating_sub(char_len(&frame))) {
            Some((body, truncated)) => (
                format!("### {}
```json
{body}
```

", self.title),
                truncated,
            ),
            None => (self.minimal(), true),
        }
    }
}

fn data_sections(inputs: &ContextInputs, safe_mode: bool) -> Vec<DataSection> {
    let mut sections = vec![
        DataSection::json("Workflow Information", inputs.summary.as_ref()),
        DataSection::json("Failure Pattern Analysis", inputs.failure_analysis.as_ref()),
    ];
    if safe_mode {
        for title in [
            "Existing Related Issues",
            "Existing Related PRs",
            "Recent Commits (Potential Causes)",
        ] {
            sections.push(DataSection::notice(title, SAFE_MODE_NOTICE));
        }
        return sections;
    }
    let commits = inputs.commits.as_ref().map(|commits| match commits {
        Value::Array(items) => Value::Array(items.iter().take(MAX_COMMITS).cloned().collect()),
        other => other.clone(),
    });
    sections.push(DataSection::json("Existing Related Issues", inputs.issues.as_ref()));
    sections.push(DataSection::json("Existing Related PRs", inputs.pulls.as_ref()));
    sections.push(DataSection::json(
        "Recent Commits (Potential Causes)",
        commits.as_ref(),
    ));
    sections
}

pub fn render_context_document(
    inputs: &ContextInputs,
    settings: &DocumentSettings,
) -> ContextDocument {
    let mut head = String::new();
    head.push_str("# Test Failure Analysis Context\n\n");
    head.push_str("## Configuration\n");
    head.push_str(&format!("- Create issues: {}\n", settings.create_issues));
    head.push_str(&format!("- Create fixes: {}\n", settings.create_fixes));
    head.push_str(&format!("- Rerun tests: {}\n", settings.rerun_tests));
    head.push_str(&format!(
        "- Severity threshold: {}\n",
        settings.severity_threshold
    ));
    head.push_str(&format!("- Safe mode: {}\n\n", settings.safe_mode));
    head.push_str("## Context Data\n\n");

    let mut tail = String::new();
    push_text_section(
        &mut tail,
        "Available Test Files (for reference)",
        inputs.test_files.as_deref(),
    );
    let heading = format!("### {TEST_OUTPUT_TITLE}\n");

    let sections = data_sections(inputs, settings.safe_mode);
    let mut budget = DocumentBudget::new(settings.max_chars);
    budget.used_chars = char_len(&head);
    // Later sections and the test output frame keep room for their smallest form.
    let mut reserved = sections
        .iter()
        .map(|section| char_len(&section.minimal()))
        .sum::<usize>()
        + char_len(&heading)
        + char_len(&test_output_placeholder())
        + OMISSION_NOTE_RESERVE
        + char_len(&tail)
        + 1;
    for section in &sections {
        reserved -= char_len(&section.minimal());
        let (rendered, truncated) = section.render(budget.remaining().saturating_sub(reserved));
        if truncated {
            log::debug!("Section {:?} cut to fit the context budget", section.title);
            budget.mark_truncated();
        }
        budget.used_chars += char_len(&rendered);
        head.push_str(&rendered);
    }

    budget.used_chars += char_len(&heading) + char_len(&tail) + 1;
    let outputs = render_test_outputs(&inputs.test_outputs, &mut budget);

    let mut markdown = head;
    markdown.push_str(&heading);
    markdown.push_str(&outputs);
    markdown.push('\n');
    markdown.push_str(&tail);
    let markdown = format!("{}\n", markdown.trim_end());
    budget.used_chars = char_len(&markdown);

    ContextDocument { markdown, budget }
}

fn test_output_placeholder() -> String {
    format!("No {} available\n", TEST_OUTPUT_TITLE.to_lowercase())
}

fn render_test_outputs(outputs: &[(String, String)], budget: &mut DocumentBudget) -> String {
    let placeholder = test_output_placeholder();
    if outputs.is_empty() {
        budget.used_chars += char_len(&placeholder);
        return placeholder;
    }

    let mut rendered = String::new();
    for (name, contents) in outputs {
        let frame = format!("\n#### {name}\n```\n\n```\n");
        let available = budget
            .remaining()
            .saturating_sub(char_len(&frame) + OMISSION_NOTE_RESERVE);
        let Some((body, truncated)) = fit_to_budget(contents.trim_end(), available) else {
            budget.mark_truncated();
            budget.omitted_files.push(name.clone());
            continue;
        };
        if truncated {
            budget.mark_truncated();
        }
        let block = format!("\n#### {name}\n```\n{body}\n```\n");
        budget.used_chars += char_len(&block);
        rendered.push_str(&block);
    }

    if !budget.omitted_files.is_empty() {
        let note = omission_note(&budget.omitted_files);
        budget.used_chars += char_len(&note);
        rendered.push_str(&note);
    }
    if rendered.is_empty() {
        budget.used_chars += char_len(&placeholder);
        return placeholder;
    }
    rendered
}

/// Lists omitted files, stopping short of [`OMISSION_NOTE_RESERVE`].
fn omission_note(names: &[String]) -> String {
    let mut note = format!(
        "\nOmitted (context budget exhausted, {} files): ",
        names.len()
    );
    for (idx, name) in names.iter().enumerate() {
        let separator = if idx == 0 { "" } else { ", " };
        if char_len(&note) + char_len(separator) + char_len(name) + 8 > OMISSION_NOTE_RESERVE {
            note.push_str(separator);
            note.push('…');
            break;
        }
        note.push_str(separator);
        note.push_str(name);
    }
    note.push('\n');
    note
}

/// Keeps whole lines of `text` within `max_chars`, appending an omission marker
/// when anything is cut. A first line too long to keep whole is cut at a char
/// boundary instead. `None` when not even that leaves room for the marker.
fn fit_to_budget(text: &str, max_chars: usize) -> Option<(String, bool)> {
    let total = char_len(text);
    if total <= max_chars {
        return Some((text.to_string(), false));
    }

    let mut kept = String::new();
    let mut kept_chars = 0;
    for line in text.lines() {
        let line_chars = char_len(line) + usize::from(!kept.is_empty());
        let marker = truncation_marker(total - kept_chars - line_chars);
        if kept_chars + line_chars + char_len(&marker) + 1 > max_chars {
            break;
        }
        if !kept.is_empty() {
            kept.push('\n');
        }
        kept.push_str(line);
        kept_chars += line_chars;
    }
    if kept.is_empty() {
        let room = max_chars.checked_sub(char_len(&truncation_marker(total)) + 1)?;
        if room == 0 {
            return None;
        }
        kept = text.lines().next().unwrap_or_default().chars().take(room).collect();
        kept_chars = char_len(&kept);
    }
    kept.push('\n');
    kept.push_str(&truncation_marker(total - kept_chars));
    Some((kept, true))
}

fn truncation_marker(omitted: usize) -> String {
    format!("… [truncated: {omitted} chars omitted]")
}

fn push_text_section(md: &mut String, title: &str, text: Option<&str>) {
    md.push_str(&format!("### {title}\n"));
    match text.map(str::trim_end).filter(|text| !text.is_empty()) {
        Some(text) => md.push_str(&format!("```\n{text}\n```\n")),
        None => md.push_str(&format!("No {} available\n", title.to_lowercase())),
    }
    md.push('\n');
}

fn has_content(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => false,
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Loads the collected artifacts and writes `context-data.md`.
pub async fn write_context_document(config: &RunConfig) -> Result<DocumentBudget> {
    let inputs = ContextInputs::load(&config.workdir).await;
    let document = render_context_document(&inputs, &DocumentSettings::from_config(config));
    let path = config.workdir.context_document();
    store::write_text(&path, &document.markdown)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    let budget = document.budget;
    if budget.truncated {
        log::warn!(
            "Context document truncated to {} chars ({} test outputs omitted)",
            budget.max_chars,
            budget.omitted_files.len()
        );
    }
    log::info!(
        "Context document written to {} ({} chars)",
        path.display(),
        budget.used_chars
    );
    Ok(budget)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use watchdog_protocol::MIN_MAX_CONTEXT_CHARS;

    fn settings(safe_mode: bool) -> DocumentSettings {
        DocumentSettings {
            create_issues: "true".to_string(),
            create_fixes: "unknown".to_string(),
            rerun_tests: "false".to_string(),
            severity_threshold: "medium".to_string(),
            safe_mode,
            max_chars: 200_000,
        }
    }

    fn inputs() -> ContextInputs {
        ContextInputs {
            summary: Some(json!({"workflow": "CI", "status": "complete"})),
            failure_analysis: Some(json!({"pattern": "chronic", "failure_rate_percent": 90})),
            issues: Some(json!([{"number": 3, "title": "Watchdog [CI] flaky"}])),
            pulls: Some(json!([])),
            commits: Some(Value::Array(
                (0..15).map(|idx| json!({"sha": format!("c{idx}")})).collect(),
            )),
            test_outputs: vec![("junit.xml".to_string(), "<testsuite/>\n".to_string())],
            test_files: Some("./reports/junit.xml\n".to_string()),
        }
    }

    fn section_order(markdown: &str) -> Vec<&str> {
        markdown
            .lines()
            .filter(|line| line.starts_with("#") && !line.starts_with("####"))
            .collect()
    }

    #[test]
    fn sections_appear_in_fixed_order() {
        let doc = render_context_document(&inputs(), &settings(false));
        assert_eq!(
            section_order(&doc.markdown),
            vec![
                "# Test Failure Analysis Context",
                "## Configuration",
                "## Context Data",
                "### Workflow Information",
                "### Failure Pattern Analysis",
                "### Existing Related Issues",
                "### Existing Related PRs",
                "### Recent Commits (Potential Causes)",
                "### Test Output Content",
                "### Available Test Files (for reference)",
            ]
        );
        assert!(doc.markdown.contains("- Create fixes: unknown\n"));
        assert!(doc.markdown.contains("- Severity threshold: medium\n"));
        assert!(doc
            .markdown
            .contains("### Existing Related PRs\nNo existing related prs available\n"));
        assert!(doc.markdown.contains("#### junit.xml\n```\n<testsuite/>\n```\n"));
        assert!(!doc.budget.truncated);
    }

    #[test]
    fn commits_are_capped_at_ten() {
        let doc = render_context_document(&inputs(), &settings(false));
        assert!(doc.markdown.contains("\"sha\": \"c9\""));
        assert!(!doc.markdown.contains("\"sha\": \"c10\""));
    }

    #[test]
    fn safe_mode_redacts_remote_sections() {
        let doc = render_context_document(&inputs(), &settings(true));
        assert_eq!(doc.markdown.matches(SAFE_MODE_NOTICE).count(), 3);
        assert!(!doc.markdown.contains("Watchdog [CI] flaky"));
        assert!(doc.markdown.contains("- Safe mode: true\n"));
        assert!(doc.markdown.contains("\"pattern\": \"chronic\""));
    }

    #[test]
    fn empty_inputs_render_placeholders() {
        let doc = render_context_document(&ContextInputs::default(), &settings(false));
        for placeholder in [
            "No workflow information available",
            "No failure pattern analysis available",
            "No existing related issues available",
            "No recent commits (potential causes) available",
            "No test output content available",
            "No available test files (for reference) available",
        ] {
            assert!(doc.markdown.contains(placeholder), "{placeholder}");
        }
    }

    #[test]
    fn oversized_outputs_are_truncated_then_omitted() {
        let big: String = (0..2_000).map(|idx| format!("line {idx:05}\n")).collect();
        let mut inputs = inputs();
        inputs.test_outputs = vec![
            ("a.log".to_string(), big.clone()),
            ("b.log".to_string(), big),
        ];
        let mut settings = settings(false);
        settings.max_chars = MIN_MAX_CONTEXT_CHARS;

        let doc = render_context_document(&inputs, &settings);

        assert!(doc.budget.truncated);
        assert_eq!(doc.budget.omitted_files, vec!["b.log".to_string()]);
        assert!(doc.markdown.contains("#### a.log"));
        assert!(doc.markdown.contains("chars omitted]"));
        assert!(doc
            .markdown
            .contains("Omitted (context budget exhausted, 1 files): b.log"));
        assert!(doc.markdown.chars().count() <= MIN_MAX_CONTEXT_CHARS);
        assert!(doc
            .markdown
            .trim_end()
            .ends_with("```\n./reports/junit.xml\n```"));
    }

    #[test]
    fn fit_keeps_whole_lines() {
        let text: Vec<String> = (0..10).map(|idx| format!("line {idx}")).collect();
        let text = text.join("\n");
        assert_eq!(fit_to_budget(&text, 100), Some((text.clone(), false)));

        let (cut, truncated) = fit_to_budget(&text, 50).unwrap();
        assert!(truncated);
        assert_eq!(cut, "line 0\nline 1\n… [truncated: 56 chars omitted]");
        assert!(char_len(&cut) <= 50);

        assert_eq!(fit_to_budget(&text, 10), None);
    }

    #[test]
    fn fit_cuts_an_overlong_first_line() {
        let text = "x".repeat(20_000);
        let (cut, truncated) = fit_to_budget(&text, 1_000).unwrap();
        assert!(truncated);
        assert_eq!(char_len(&cut), 1_000);
        assert!(cut.starts_with(&"x".repeat(965)));
        assert!(cut.ends_with("\n… [truncated: 19035 chars omitted]"), "{cut}");
    }

    #[test]
    fn single_line_report_is_inlined_not_omitted() {
        let mut inputs = inputs();
        let report = format!(r#"{{"testResults": [{}]}}"#, "\"ok\",".repeat(4_000));
        inputs.test_outputs = vec![("jest.json".to_string(), report)];
        let mut settings = settings(false);
        settings.max_chars = MIN_MAX_CONTEXT_CHARS;

        let doc = render_context_document(&inputs, &settings);

        assert!(doc.budget.omitted_files.is_empty());
        assert!(doc.budget.truncated);
        assert!(doc.markdown.contains("#### jest.json\n```\n{\"testResults\""));
        assert!(doc.markdown.chars().count() <= MIN_MAX_CONTEXT_CHARS);
    }

    #[test]
    fn oversized_issue_body_is_cut_to_budget() {
        let mut inputs = inputs();
        inputs.issues = Some(json!([{
            "number": 3,
            "title": "Watchdog [CI] flaky",
            "body": "b".repeat(60_000),
        }]));
        let mut settings = settings(false);
        settings.max_chars = MIN_MAX_CONTEXT_CHARS;

        let doc = render_context_document(&inputs, &settings);

        assert!(doc.budget.truncated);
        assert!(doc.markdown.chars().count() <= MIN_MAX_CONTEXT_CHARS);
        assert_eq!(doc.budget.used_chars, doc.markdown.chars().count());
        assert!(doc
            .markdown
            .contains("### Existing Related Issues\n```json\n[\n  {\n"));
        assert!(doc.markdown.contains("chars omitted]"));
        assert_eq!(section_order(&doc.markdown).len(), 10);
        assert!(doc
            .markdown
            .trim_end()
            .ends_with("```\n./reports/junit.xml\n```"));
    }

    #[test]
    fn omission_note_stays_within_reserve() {
        let names: Vec<String> = (0..200).map(|idx| format!("report-{idx:03}.xml")).collect();
        let note = omission_note(&names);
        assert!(char_len(&note) <= OMISSION_NOTE_RESERVE, "{note}");
        assert!(note.contains("200 files"));
        assert!(note.trim_end().ends_with('…'));
    }
}
