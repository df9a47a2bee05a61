use tribunal_core::Severity;

#[test]
fn fail_on_exits_zero_below_threshold() {
    let overall = Severity::Medium;
    assert!(!overall.meets_threshold(Severity::High));
}

#[test]
fn fail_on_exits_one_at_or_above_threshold() {
    assert!(Severity::High.meets_threshold(Severity::High));
    assert!(Severity::Critical.meets_threshold(Severity::High));
}

#[test]
fn fail_on_info_matches_everything() {
    for severity in [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ] {
        assert!(severity.meets_threshold(Severity::Info));
    }
}

#[test]
fn fail_on_parses_cli_spelling() {
    let threshold: Severity = "critical".parse().unwrap();
    assert!(!Severity::High.meets_threshold(threshold));
    assert!("bug".parse::<Severity>().is_err());
}
