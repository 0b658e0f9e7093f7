use watchdog_collector::FeatureFlags;

const BASE_TURNS: u32 = 12;
const ISSUE_TURNS: u32 = 10;
const FIX_TURNS: u32 = 18;
const RERUN_TURNS: u32 = 8;

/// Turn budget for the analysis agent, scaled by the enabled features.
pub fn max_turns(features: &FeatureFlags) -> u32 {
    let mut turns = BASE_TURNS;
    if features.create_issues() {
        turns += ISSUE_TURNS;
    }
    if features.create_fixes() {
        turns += FIX_TURNS;
    }
    if features.rerun_tests() {
        turns += RERUN_TURNS;
    }
    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_budget_without_features() {
        assert_eq!(max_turns(&FeatureFlags::default()), 12);
    }

    #[test]
    fn each_feature_adds_its_share() {
        let issues_only = FeatureFlags {
            create_issues: Some(true),
            ..FeatureFlags::default()
        };
        assert_eq!(max_turns(&issues_only), 22);

        let all = FeatureFlags {
            create_issues: Some(true),
            create_fixes: Some(true),
            rerun_tests: Some(true),
        };
        assert_eq!(max_turns(&all), 48);
    }

    #[test]
    fn explicit_false_is_not_counted() {
        let flags = FeatureFlags {
            create_fixes: Some(false),
            rerun_tests: Some(true),
            ..FeatureFlags::default()
        };
        assert_eq!(max_turns(&flags), 20);
    }
}
