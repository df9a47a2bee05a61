use serde::Serialize;
use tribunal_core::{RunStatus, Severity, StageStatus, TribunalError};

use crate::pipeline::{PipelineRun, StageOutput};

/// Recommendation emitted when no stage mentions a critical issue.
pub const NO_CRITICAL_ISSUES: &str =
    "No critical issues found. Review detailed reports for improvements.";

/// Review assembled from a finished (or cancelled) pipeline run.
///
/// `severity`, `summary` and `recommendations` are all derived from
/// `stage_outputs` by [`aggregate`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedReview {
    /// Stage outputs in pipeline order.
    pub stage_outputs: Vec<StageOutput>,
    /// Overall severity.
    pub severity: Severity,
    /// Fixed-template overview of which stages completed.
    pub summary: String,
    /// Follow-up actions for the change-set author.
    pub recommendations: Vec<String>,
    /// Status of the run this review came from.
    pub run_status: RunStatus,
    /// Declared stages that never ran because the run was cancelled.
    pub skipped_stages: Vec<String>,
}

impl AggregatedReview {
    /// Failed stage outputs, in pipeline order.
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageOutput> {
        self.stage_outputs.iter().filter(|s| s.is_failed())
    }
}

/// Combine a run's stage outputs into an [`AggregatedReview`].
///
/// # Errors
///
/// Returns [`TribunalError::AggregationInconsistency`] if an output names a
/// stage that is not in the run's declared stage list.
///
/// # Examples
///
/// ```
/// use tribunal_core::{RunStatus, Severity};
/// use tribunal_review::aggregate::aggregate;
/// use tribunal_review::pipeline::{PipelineRun, StageOutput};
///
/// let mut run = PipelineRun::new(vec!["logic".into()]);
/// run.stages.push(StageOutput::done("logic", "One Medium issue in parser.rs"));
/// run.status = RunStatus::Completed;
///
/// let review = aggregate(&run).unwrap();
/// assert_eq!(review.severity, Severity::Medium);
/// ```
pub fn aggregate(run: &PipelineRun) -> Result<AggregatedReview, TribunalError> {
    for output in &run.stages {
        if !run.declared_stages.contains(&output.stage_name) {
            return Err(TribunalError::AggregationInconsistency {
                stage: output.stage_name.clone(),
            });
        }
    }

    let skipped_stages: Vec<String> = run.missing_stages().map(String::from).collect();

    Ok(AggregatedReview {
        stage_outputs: run.stages.clone(),
        severity: determine_severity(&run.stages),
        summary: build_summary(&run.stages, &skipped_stages, run.status),
        recommendations: extract_recommendations(&run.stages),
        run_status: run.status,
        skipped_stages,
    })
}

/// Keyword heuristic over the lower-cased concatenation of all reports.
///
/// Checked in priority order: `critical`, then `high` or `severe`, then
/// `medium` or `moderate`, then `low`. Plain substring matching, so
/// "no critical issues" still yields [`Severity::Critical`].
///
/// # Examples
///
/// ```
/// use tribunal_core::Severity;
/// use tribunal_review::aggregate::determine_severity;
/// use tribunal_review::pipeline::StageOutput;
///
/// let outputs = [
///     StageOutput::done("a", "Low: rename variable"),
///     StageOutput::done("b", "Critical: SQL injection"),
/// ];
/// assert_eq!(determine_severity(&outputs), Severity::Critical);
/// ```
pub fn determine_severity(outputs: &[StageOutput]) -> Severity {
    let all_reports = outputs
        .iter()
        .map(|o| o.report.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    if all_reports.contains("critical") {
        Severity::Critical
    } else if all_reports.contains("high") || all_reports.contains("severe") {
        Severity::High
    } else if all_reports.contains("medium") || all_reports.contains("moderate") {
        Severity::Medium
    } else if all_reports.contains("low") {
        Severity::Low
    } else {
        Severity::Info
    }
}

fn extract_recommendations(outputs: &[StageOutput]) -> Vec<String> {
    let mut recommendations: Vec<String> = outputs
        .iter()
        .filter(|o| o.report.to_lowercase().contains("critical"))
        .map(|o| format!("Address critical issues found in {} analysis", o.stage_name))
        .collect();

    if recommendations.is_empty() {
        recommendations.push(NO_CRITICAL_ISSUES.to_string());
    }

    recommendations.extend(outputs.iter().filter(|o| o.is_failed()).map(|o| {
        format!(
            "Re-run the {} analysis; it did not complete and its findings are missing",
            o.stage_name
        )
    }));

    recommendations
}

fn build_summary(outputs: &[StageOutput], skipped: &[String], status: RunStatus) -> String {
    let mut lines = vec!["## Analyses\n".to_string()];

    for output in outputs {
        match output.status {
            StageStatus::Done => {
                lines.push(format!("\u{2705} **{}** - Analysis complete", output.stage_name));
            }
            StageStatus::Failed => {
                lines.push(format!("\u{274c} **{}** - Analysis failed", output.stage_name));
            }
        }
    }
    for name in skipped {
        lines.push(format!("\u{23f9}\u{fe0f} **{name}** - Not run"));
    }

    lines.push("\n## Review Status".to_string());
    let failed = outputs.iter().filter(|o| o.is_failed()).count();
    let status_line = match status {
        RunStatus::Cancelled => {
            "The review was cancelled. Findings below cover only the analyses that finished."
        }
        _ if outputs.is_empty() => "No analyses were configured for this review.",
        _ if failed == 0 => {
            "All analyses have completed. Please review the detailed findings below."
        }
        _ => "Some analyses did not complete. Findings below are partial.",
    };
    lines.push(status_line.to_string());

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(outputs: Vec<StageOutput>) -> PipelineRun {
        let mut run = PipelineRun::new(outputs.iter().map(|o| o.stage_name.clone()).collect());
        run.stages = outputs;
        run.status = RunStatus::Completed;
        run
    }

    #[test]
    fn severity_precedence() {
        let cases = [
            ("nothing to report", Severity::Info),
            ("a low priority nit", Severity::Low),
            ("moderate risk", Severity::Medium),
            ("Severe regression", Severity::High),
            ("HIGH and low", Severity::High),
            ("no critical issues found", Severity::Critical),
        ];
        for (report, expected) in cases {
            let outputs = [StageOutput::done("s", report)];
            assert_eq!(determine_severity(&outputs), expected, "{report}");
        }
    }

    #[test]
    fn severity_across_stages_any_order() {
        let forward = [
            StageOutput::done("a", "low"),
            StageOutput::done("b", "critical"),
        ];
        let backward = [
            StageOutput::done("a", "critical"),
            StageOutput::done("b", "low"),
        ];
        assert_eq!(determine_severity(&forward), Severity::Critical);
        assert_eq!(determine_severity(&backward), Severity::Critical);
        assert_eq!(determine_severity(&[]), Severity::Info);
    }

    #[test]
    fn recommendations_name_critical_stages() {
        let run = completed(vec![
            StageOutput::done("logic", "CRITICAL: null deref"),
            StageOutput::done("readability", "fine"),
            StageOutput::done("security", "critical secret leak"),
        ]);
        let review = aggregate(&run).unwrap();
        assert_eq!(
            review.recommendations,
            vec![
                "Address critical issues found in logic analysis",
                "Address critical issues found in security analysis",
            ]
        );
    }

    #[test]
    fn no_critical_gives_single_generic_recommendation() {
        let review = aggregate(&completed(vec![StageOutput::done("logic", "ok")])).unwrap();
        assert_eq!(review.recommendations, vec![NO_CRITICAL_ISSUES]);
    }

    #[test]
    fn failed_stage_marked_in_summary_and_recommendations() {
        let run = completed(vec![
            StageOutput::done("logic", "ok"),
            StageOutput::failed("security", "stage 'security' timed out after 120s"),
        ]);
        let review = aggregate(&run).unwrap();
        assert!(review.summary.contains("\u{2705} **logic** - Analysis complete"));
        assert!(review.summary.contains("\u{274c} **security** - Analysis failed"));
        assert!(review.summary.contains("partial"));
        assert_eq!(review.recommendations.len(), 2);
        assert!(review.recommendations[1].starts_with("Re-run the security analysis"));
        assert_eq!(review.failed_stages().count(), 1);
    }

    #[test]
    fn summary_ignores_report_contents() {
        let a = aggregate(&completed(vec![StageOutput::done("logic", "critical")])).unwrap();
        let b = aggregate(&completed(vec![StageOutput::done("logic", "fine")])).unwrap();
        assert_eq!(a.summary, b.summary);
    }

    #[test]
    fn undeclared_stage_is_inconsistency() {
        let mut run = PipelineRun::new(vec!["logic".into()]);
        run.stages.push(StageOutput::done("logic", "ok"));
        run.stages.push(StageOutput::done("ghost", "boo"));
        let err = aggregate(&run).unwrap_err();
        assert!(matches!(
            err,
            TribunalError::AggregationInconsistency { ref stage } if stage == "ghost"
        ));
    }

    #[test]
    fn cancelled_run_lists_skipped_stages() {
        let mut run = PipelineRun::new(vec!["logic".into(), "security".into()]);
        run.stages.push(StageOutput::done("logic", "ok"));
        run.status = RunStatus::Cancelled;

        let review = aggregate(&run).unwrap();
        assert_eq!(review.run_status, RunStatus::Cancelled);
        assert_eq!(review.skipped_stages, vec!["security"]);
        assert!(review.summary.contains("**security** - Not run"));
        assert!(review.summary.contains("cancelled"));
    }

    #[test]
    fn zero_stage_run_aggregates() {
        let review = aggregate(&completed(Vec::new())).unwrap();
        assert_eq!(review.severity, Severity::Info);
        assert!(review.stage_outputs.is_empty());
        assert_eq!(review.recommendations, vec![NO_CRITICAL_ISSUES]);
    }
}
