use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tribunal_core::{ChangeSetInfo, DigestConfig, RunStatus, Severity, StageConfig, StageStatus, TribunalError};
use tribunal_difflens::parser::{parse_files, FileRecord, ParseOptions};
use tribunal_difflens::summary::{render, summarize};
use tribunal_review::aggregate::aggregate;
use tribunal_review::pipeline::{cancel_pair, AnalysisPipeline, CancelSignal, Canceller};
use tribunal_review::prompt::{build_change_set_context, default_stages};
use tribunal_review::provider::{AnalysisProvider, StageRequest};
use tribunal_review::report::ReportFormatter;

/// Answers with a canned report per stage, hangs on `hang_on`, and records
/// every request it sees.
struct ScriptedProvider {
    hang_on: Option<String>,
    cancel_on: Option<(String, Canceller)>,
    seen: Mutex<Vec<StageRequest>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            hang_on: None,
            cancel_on: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<StageRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisProvider for ScriptedProvider {
    async fn analyze(&self, request: &StageRequest) -> Result<String, TribunalError> {
        self.seen.lock().unwrap().push(request.clone());

        if let Some((stage, canceller)) = &self.cancel_on {
            if *stage == request.stage {
                canceller.cancel();
                std::future::pending::<()>().await;
            }
        }
        if self.hang_on.as_deref() == Some(request.stage.as_str()) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(format!("REPORT<{}>: one low severity nit", request.stage))
    }
}

fn change_set_context() -> String {
    let records = vec![FileRecord {
        path: "src/auth.py".into(),
        status: "modified".into(),
        additions: 1,
        deletions: 1,
        patch: Some("@@ -10,2 +10,2 @@\n def login(user):\n-    return check(user)\n+    return True\n".into()),
    }];
    let parsed = parse_files(&records, ParseOptions::default());
    let digest = render(&summarize(parsed.files), DigestConfig::default());
    let info = ChangeSetInfo {
        title: Some("Simplify login".into()),
        author: Some("octo".into()),
        number: Some(17),
        additions: 1,
        deletions: 1,
        changed_files: 1,
        ..Default::default()
    };
    build_change_set_context(&info, &digest)
}

#[tokio::test]
async fn second_stage_timeout_does_not_block_later_stages() {
    let provider = Arc::new(ScriptedProvider {
        hang_on: Some("readability".into()),
        ..ScriptedProvider::new()
    });
    let pipeline = AnalysisPipeline::with_timeout(provider.clone(), Duration::from_millis(100));
    let stages = default_stages();
    let context = change_set_context();

    let run = pipeline.run(&context, &stages, CancelSignal::never()).await;

    assert!(run.status.is_terminal());
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stages.len(), 4);
    let statuses: Vec<StageStatus> = run.stages.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![StageStatus::Done, StageStatus::Failed, StageStatus::Done, StageStatus::Done]
    );
    assert!(run.stages[1].error.as_deref().unwrap().contains("timed out"));

    let seen = provider.seen();
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0].context, context);

    let third = &seen[2].context;
    assert!(third.starts_with(&context));
    assert!(third.contains("REPORT<logic>"));
    assert!(third.contains("### readability (failed)"));
    assert!(!third.contains("REPORT<readability>"));

    let fourth = &seen[3].context;
    assert!(fourth.contains("REPORT<performance>"));
}

#[tokio::test]
async fn every_stage_sees_change_set_context() {
    let provider = Arc::new(ScriptedProvider::new());
    let pipeline = AnalysisPipeline::with_timeout(provider.clone(), Duration::from_secs(5));
    let run = pipeline
        .run(&change_set_context(), &default_stages(), CancelSignal::never())
        .await;
    assert_eq!(run.status, RunStatus::Completed);

    for request in provider.seen() {
        assert!(request.context.contains("**Title:** Simplify login"));
        assert!(request.context.contains("### 1. src/auth.py"));
        assert!(request.context.contains("+    return True"));
    }
}

#[tokio::test]
async fn zero_stages_completes_immediately() {
    let provider = Arc::new(ScriptedProvider::new());
    let pipeline = AnalysisPipeline::with_timeout(provider.clone(), Duration::from_secs(1));
    let run = pipeline.run("ctx", &[], CancelSignal::never()).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert!(run.stages.is_empty());
    assert!(provider.seen().is_empty());

    let review = aggregate(&run).unwrap();
    let text = ReportFormatter::new().format(&review, Duration::ZERO);
    assert!(text.contains("No analyses were configured"));
}

#[tokio::test]
async fn single_custom_stage() {
    let provider = Arc::new(ScriptedProvider::new());
    let pipeline = AnalysisPipeline::with_timeout(provider.clone(), Duration::from_secs(1));
    let stages = vec![StageConfig {
        name: "docs".into(),
        title: Some("Documentation".into()),
        prompt: "Check the docs.".into(),
    }];
    let run = pipeline.run("ctx", &stages, CancelSignal::never()).await;

    assert_eq!(run.stages.len(), 1);
    assert_eq!(run.stages[0].report, "REPORT<docs>: one low severity nit");
    assert_eq!(provider.seen()[0].instructions, "Check the docs.");
    assert_eq!(provider.seen()[0].context, "ctx");

    let review = aggregate(&run).unwrap();
    assert_eq!(review.severity, Severity::Low);
    let text = ReportFormatter::with_titles(&stages).format(&review, Duration::from_secs(2));
    assert!(text.contains("## Documentation"));
}

#[tokio::test]
async fn cancellation_mid_run_keeps_recorded_outputs() {
    let (canceller, signal) = cancel_pair();
    let provider = Arc::new(ScriptedProvider {
        cancel_on: Some(("performance".into(), canceller)),
        ..ScriptedProvider::new()
    });
    let pipeline = AnalysisPipeline::with_timeout(provider.clone(), Duration::from_secs(5));

    let run = pipeline.run("ctx", &default_stages(), signal).await;

    assert!(run.status.is_terminal());
    assert_eq!(run.status, RunStatus::Cancelled);
    assert_eq!(run.stages.len(), 2);
    assert_eq!(run.stages[0].stage_name, "logic");
    assert_eq!(run.stages[1].stage_name, "readability");
    assert!(run.stages.iter().all(|s| s.status == StageStatus::Done));

    let requested: Vec<String> = provider.seen().into_iter().map(|r| r.stage).collect();
    assert_eq!(requested, vec!["logic", "readability", "performance"]);

    let review = aggregate(&run).unwrap();
    assert_eq!(review.skipped_stages, vec!["performance", "security"]);
    let text = ReportFormatter::with_titles(&default_stages()).format(&review, Duration::from_secs(1));
    assert!(text.contains("REPORT<readability>"));
    assert!(text.contains("cancelled"));
}

#[tokio::test]
async fn aggregate_and_format_are_idempotent() {
    let provider = Arc::new(ScriptedProvider {
        hang_on: Some("security".into()),
        ..ScriptedProvider::new()
    });
    let pipeline = AnalysisPipeline::with_timeout(provider, Duration::from_millis(50));
    let run = pipeline
        .run(&change_set_context(), &default_stages(), CancelSignal::never())
        .await;

    let formatter = ReportFormatter::with_titles(&default_stages());
    let elapsed = Duration::from_secs(42);
    let first = formatter.format(&aggregate(&run).unwrap(), elapsed);
    let second = formatter.format(&aggregate(&run).unwrap(), elapsed);
    assert_eq!(first, second);
    assert!(first.contains("*Review completed in 42 seconds*"));
    assert!(first.contains("Re-run the security analysis"));
}
