use watchdog_protocol::{FailureAnalysis, FailurePattern, RunOutcome, WorkflowRun};

/// Summarizes run history into a failure rate and a coarse pattern label.
pub fn classify(runs: &[WorkflowRun]) -> FailureAnalysis {
    let total_runs = runs.len();
    if total_runs == 0 {
        return FailureAnalysis::empty();
    }

    let failed_runs = count(runs, RunOutcome::Failure);
    let success_runs = count(runs, RunOutcome::Success);
    let failure_rate_percent = rounded_percent(failed_runs, total_runs);

    FailureAnalysis {
        total_runs,
        failed_runs,
        success_runs,
        failure_rate_percent,
        pattern: pattern_for(failure_rate_percent),
    }
}

fn count(runs: &[WorkflowRun], outcome: RunOutcome) -> usize {
    runs.iter().filter(|run| run.outcome() == outcome).count()
}

// Half rounds up; `total` is non-zero.
fn rounded_percent(part: usize, total: usize) -> u32 {
    let scaled = (part * 200 + total) / (2 * total);
    u32::try_from(scaled).unwrap_or(100).min(100)
}

fn pattern_for(rate: u32) -> FailurePattern {
    match rate {
        81.. => FailurePattern::Chronic,
        51..=80 => FailurePattern::Frequent,
        21..=50 => FailurePattern::Intermittent,
        _ => FailurePattern::Isolated,
    }
}
