use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use tribunal_core::StageConfig;

use crate::aggregate::AggregatedReview;

/// Renders an [`AggregatedReview`] as a Markdown comment.
///
/// The output depends only on the review, the title map, and the elapsed
/// time passed in, so formatting the same review twice gives identical text.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use tribunal_core::RunStatus;
/// use tribunal_review::aggregate::aggregate;
/// use tribunal_review::pipeline::{PipelineRun, StageOutput};
/// use tribunal_review::prompt::default_stages;
/// use tribunal_review::report::ReportFormatter;
///
/// let mut run = PipelineRun::new(vec!["logic".into()]);
/// run.stages.push(StageOutput::done("logic", "No bugs."));
/// run.status = RunStatus::Completed;
///
/// let review = aggregate(&run).unwrap();
/// let text = ReportFormatter::with_titles(&default_stages()).format(&review, Duration::from_secs(12));
/// assert!(text.contains("## \u{1f9e0} Logic & Correctness Analysis"));
/// assert!(text.contains("*Review completed in 12 seconds*"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    titles: HashMap<String, String>,
}

impl ReportFormatter {
    /// A formatter that heads each section with the stage name.
    pub fn new() -> Self {
        Self::default()
    }

    /// A formatter that uses each stage's configured title where it has one.
    pub fn with_titles(stages: &[StageConfig]) -> Self {
        let titles = stages
            .iter()
            .filter_map(|s| s.title.clone().map(|t| (s.name.clone(), t)))
            .collect();
        Self { titles }
    }

    fn title<'a>(&'a self, stage_name: &'a str) -> &'a str {
        self.titles
            .get(stage_name)
            .map(String::as_str)
            .unwrap_or(stage_name)
    }

    /// Render `review`, stamping `elapsed` into the footer.
    pub fn format(&self, review: &AggregatedReview, elapsed: Duration) -> String {
        let mut out = String::from("# \u{1f916} Tribunal Automated Code Review\n\n");

        out.push_str(&review.summary);
        out.push_str("\n\n---\n\n");

        let _ = writeln!(
            out,
            "## Overall Severity: {} {}",
            review.severity.emoji(),
            review.severity.label()
        );

        for output in &review.stage_outputs {
            if output.report.trim().is_empty() {
                continue;
            }
            let _ = writeln!(out, "\n## {}\n", self.title(&output.stage_name));
            out.push_str(output.report.trim_end());
            out.push_str("\n\n---\n");
        }

        let failed: Vec<_> = review.failed_stages().collect();
        if !failed.is_empty() {
            out.push_str("\n## \u{26a0}\u{fe0f} Failed Analyses\n\n");
            for output in failed {
                let _ = writeln!(
                    out,
                    "- **{}**: {}",
                    self.title(&output.stage_name),
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        if !review.recommendations.is_empty() {
            out.push_str("\n## \u{1f4cb} Key Recommendations\n\n");
            for (i, recommendation) in review.recommendations.iter().enumerate() {
                let _ = writeln!(out, "{}. {recommendation}", i + 1);
            }
        }

        let _ = write!(
            out,
            "\n---\n*Review completed in {} seconds*\n",
            elapsed.as_secs()
        );
        out
    }
}
