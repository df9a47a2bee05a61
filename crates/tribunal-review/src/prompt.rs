use std::fmt::Write;

use tribunal_core::{ChangeSetInfo, StageConfig, StageStatus};

use crate::pipeline::StageOutput;

const SEVERITY_GUIDANCE: &str = "\
Provide specific, actionable feedback with:
- File name and line number references
- A clear description of each issue
- A severity level (Critical, High, Medium, Low)
- A suggested fix or improvement

Format the output as a clear, organized Markdown report.";

const LOGIC_PROMPT: &str = "\
You are a senior code logic analyst with years of experience finding bugs \
before they reach production.

Analyze the change set for logical correctness and potential bugs:
1. Logical errors and incorrect implementations
2. Potential runtime errors and exceptions
3. Edge cases and boundary conditions
4. Null or missing-value handling
5. Incorrect algorithm implementations
6. Race conditions or concurrency issues

End with an overall assessment and the issues that must be fixed before merging.";

const READABILITY_PROMPT: &str = "\
You are a code quality and readability specialist.

Review the change set for readability and maintainability:
1. Naming of variables, functions and types
2. Code organization and structure
3. Duplication
4. Comment quality and documentation
5. Complexity and cognitive load
6. Adherence to the project's conventions

End with an overall quality rating (Excellent, Good, Fair, Needs Improvement).";

const PERFORMANCE_PROMPT: &str = "\
You are a performance optimization expert.

Analyze the change set for performance issues and optimization opportunities:
1. Algorithmic complexity in time and space
2. Inefficient operations and bottlenecks
3. Database query efficiency
4. Memory and resource management
5. Unnecessary computation
6. Caching opportunities
7. Blocking calls in async code

Describe the expected impact of each optimization you suggest.";

const SECURITY_PROMPT: &str = "\
You are a security auditor and vulnerability specialist.

Audit the change set for vulnerabilities:
1. SQL/NoSQL and command injection
2. Cross-site scripting and CSRF
3. Authentication and authorization flaws
4. Input validation and sanitization
5. Hardcoded secrets and sensitive data exposure
6. Insecure cryptography
7. Vulnerable dependencies
8. Path traversal and file inclusion
9. Information disclosure

Describe exploit potential and remediation for each finding.";

/// The four built-in analysis lenses: logic, readability, performance and
/// security, in that order.
///
/// Used whenever the configuration declares no `[[stages]]`.
///
/// # Examples
///
/// ```
/// use tribunal_review::prompt::default_stages;
///
/// let names: Vec<_> = default_stages().into_iter().map(|s| s.name).collect();
/// assert_eq!(names, ["logic", "readability", "performance", "security"]);
/// ```
pub fn default_stages() -> Vec<StageConfig> {
    [
        ("logic", "\u{1f9e0} Logic & Correctness Analysis", LOGIC_PROMPT),
        ("readability", "\u{1f4d6} Code Quality & Readability", READABILITY_PROMPT),
        ("performance", "\u{26a1} Performance Analysis", PERFORMANCE_PROMPT),
        ("security", "\u{1f512} Security Audit", SECURITY_PROMPT),
    ]
    .into_iter()
    .map(|(name, title, prompt)| StageConfig {
        name: name.into(),
        title: Some(title.into()),
        prompt: format!("{prompt}\n\n{SEVERITY_GUIDANCE}"),
    })
    .collect()
}

/// Base context shared by every stage: the change-set descriptor followed
/// by the rendered digest.
///
/// # Examples
///
/// ```
/// use tribunal_core::ChangeSetInfo;
/// use tribunal_review::prompt::build_change_set_context;
///
/// let info = ChangeSetInfo { title: Some("Fix login".into()), number: Some(42), ..Default::default() };
/// let context = build_change_set_context(&info, "## Change Set Summary");
/// assert!(context.contains("**Title:** Fix login"));
/// assert!(context.contains("**Number:** #42"));
/// assert!(context.ends_with("## Change Set Summary\n"));
/// ```
pub fn build_change_set_context(info: &ChangeSetInfo, digest: &str) -> String {
    let mut out = String::from("# Change Set Information\n\n");
    let _ = writeln!(out, "**Title:** {}", info.title.as_deref().unwrap_or("N/A"));
    let _ = writeln!(out, "**Author:** {}", info.author.as_deref().unwrap_or("N/A"));
    match info.number {
        Some(number) => {
            let _ = writeln!(out, "**Number:** #{number}");
        }
        None => out.push_str("**Number:** N/A\n"),
    }

    let description = info
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or("No description provided");
    let _ = writeln!(out, "\n**Description:**\n{description}\n");

    out.push_str("**Statistics:**\n");
    let _ = writeln!(out, "- Files Changed: {}", info.changed_files);
    let _ = writeln!(out, "- Additions: +{}", info.additions);
    let _ = writeln!(out, "- Deletions: -{}", info.deletions);

    let _ = writeln!(out, "\n---\n\n{digest}");
    out
}

/// Context for the next stage: `base` plus every earlier output, in order.
///
/// A failed stage contributes a notice with its error instead of a report.
pub fn build_stage_context(base: &str, prior: &[StageOutput]) -> String {
    if prior.is_empty() {
        return base.to_string();
    }

    let mut out = String::from(base);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("\n---\n\n## Findings From Previous Analyses\n");

    for output in prior {
        match output.status {
            StageStatus::Done => {
                let _ = writeln!(out, "\n### {}\n\n{}", output.stage_name, output.report.trim_end());
            }
            StageStatus::Failed => {
                let _ = writeln!(
                    out,
                    "\n### {} (failed)\n\nThis analysis did not complete: {}",
                    output.stage_name,
                    output.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
    out
}
