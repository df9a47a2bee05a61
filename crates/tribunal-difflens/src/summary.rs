use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;
use tribunal_core::{ChangeStatus, DigestConfig, FileChange};

/// Aggregate view over the files of a change-set.
///
/// Every figure is derived from `files` in [`summarize`], so the totals always
/// equal the per-file sums.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    files: Vec<FileChange>,
    total_additions: u64,
    total_deletions: u64,
    language_histogram: BTreeMap<String, usize>,
    counts_by_status: BTreeMap<ChangeStatus, usize>,
}

impl DiffSummary {
    /// Files in input order.
    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    /// Sum of per-file additions.
    pub fn total_additions(&self) -> u64 {
        self.total_additions
    }

    /// Sum of per-file deletions.
    pub fn total_deletions(&self) -> u64 {
        self.total_deletions
    }

    /// Number of files per detected language. Files without a language are
    /// not counted.
    pub fn language_histogram(&self) -> &BTreeMap<String, usize> {
        &self.language_histogram
    }

    /// Number of files per change status.
    pub fn counts_by_status(&self) -> &BTreeMap<ChangeStatus, usize> {
        &self.counts_by_status
    }

    /// Number of files in the change-set.
    pub fn total_files(&self) -> usize {
        self.files.len()
    }
}

/// Compute a [`DiffSummary`] over `files`.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::{parse_files, FileRecord, ParseOptions};
/// use tribunal_difflens::summary::summarize;
///
/// let records = vec![
///     FileRecord { path: "a.rs".into(), status: "modified".into(), additions: 3, deletions: 1, patch: None },
///     FileRecord { path: "b.rs".into(), status: "added".into(), additions: 7, deletions: 0, patch: None },
/// ];
/// let summary = summarize(parse_files(&records, ParseOptions::default()).files);
/// assert_eq!(summary.total_additions(), 10);
/// assert_eq!(summary.language_histogram()["Rust"], 2);
/// ```
pub fn summarize(files: Vec<FileChange>) -> DiffSummary {
    let mut total_additions = 0u64;
    let mut total_deletions = 0u64;
    let mut language_histogram = BTreeMap::new();
    let mut counts_by_status = BTreeMap::new();

    for file in &files {
        total_additions += u64::from(file.additions);
        total_deletions += u64::from(file.deletions);
        if let Some(language) = &file.language {
            *language_histogram.entry(language.clone()).or_insert(0) += 1;
        }
        *counts_by_status.entry(file.status).or_insert(0) += 1;
    }

    DiffSummary {
        files,
        total_additions,
        total_deletions,
        language_histogram,
        counts_by_status,
    }
}

/// Render the digest handed to every analysis stage.
///
/// Totals and the language list are always present. At most
/// `limits.max_files` file sections follow, in input order, and each patch
/// is cut to `limits.max_patch_lines` lines. Both cuts leave a note saying
/// how much was left out.
///
/// # Examples
///
/// ```
/// use tribunal_core::DigestConfig;
/// use tribunal_difflens::summary::{render, summarize};
///
/// let digest = render(&summarize(Vec::new()), DigestConfig::default());
/// assert!(digest.contains("**Total Files Changed:** 0"));
/// ```
pub fn render(summary: &DiffSummary, limits: DigestConfig) -> String {
    let mut out = String::new();

    out.push_str("## Change Set Summary\n\n");
    let _ = writeln!(out, "**Total Files Changed:** {}", summary.total_files());
    let _ = writeln!(out, "**Additions:** +{}", summary.total_additions());
    let _ = writeln!(out, "**Deletions:** -{}", summary.total_deletions());

    let statuses: Vec<String> = summary
        .counts_by_status()
        .iter()
        .map(|(status, count)| format!("{status} {count}"))
        .collect();
    if !statuses.is_empty() {
        let _ = writeln!(out, "**Files By Status:** {}", statuses.join(", "));
    }

    let languages: Vec<String> = summary
        .language_histogram()
        .iter()
        .map(|(language, count)| format!("{language} ({count})"))
        .collect();
    let languages = if languages.is_empty() {
        "none".to_string()
    } else {
        languages.join(", ")
    };
    let _ = writeln!(out, "\n**Languages Detected:** {languages}\n");

    out.push_str("\n## File Changes\n");

    let total = summary.total_files();
    if total > limits.max_files {
        let _ = writeln!(
            out,
            "(Showing first {} of {} files, {} omitted)",
            limits.max_files,
            total,
            total - limits.max_files
        );
    }

    for (i, file) in summary.files().iter().take(limits.max_files).enumerate() {
        let _ = writeln!(out, "\n### {}. {}", i + 1, file.path);
        let _ = writeln!(out, "**Status:** {}", file.status.to_string().to_uppercase());
        let _ = writeln!(
            out,
            "**Language:** {}",
            file.language.as_deref().unwrap_or("Unknown")
        );
        let _ = writeln!(out, "**Changes:** +{} / -{}", file.additions, file.deletions);

        if let Some(patch) = file.patch_text.as_deref().filter(|p| !p.is_empty()) {
            out.push_str("\n**Diff:**\n```diff\n");
            let lines: Vec<&str> = patch.lines().collect();
            for line in lines.iter().take(limits.max_patch_lines) {
                out.push_str(line);
                out.push('\n');
            }
            if lines.len() > limits.max_patch_lines {
                let _ = writeln!(
                    out,
                    "\n... (truncated, {} more lines)",
                    lines.len() - limits.max_patch_lines
                );
            }
            out.push_str("```\n");
        }
        let _ = writeln!(out, "\n{}", "=".repeat(80));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_file, FileRecord, ParseOptions};

    fn file(path: &str, status: &str, additions: u32, deletions: u32, patch: Option<String>) -> FileChange {
        let record = FileRecord {
            path: path.into(),
            status: status.into(),
            additions,
            deletions,
            patch,
        };
        parse_file(&record, ParseOptions::default()).unwrap()
    }

    #[test]
    fn totals_equal_per_file_sums() {
        let files = vec![
            file("a.py", "modified", 4, 2, None),
            file("b.ts", "added", 10, 0, None),
            file("c.ts", "removed", 0, 9, None),
            file("Makefile", "modified", 1, 1, None),
        ];
        let summary = summarize(files);
        assert_eq!(summary.total_additions(), 15);
        assert_eq!(summary.total_deletions(), 12);
        assert_eq!(summary.language_histogram().get("TypeScript"), Some(&2));
        assert_eq!(summary.language_histogram().get("Python"), Some(&1));
        assert_eq!(summary.language_histogram().len(), 2);
        assert_eq!(summary.counts_by_status()[&ChangeStatus::Modified], 2);
        assert_eq!(summary.counts_by_status()[&ChangeStatus::Deleted], 1);
    }

    #[test]
    fn empty_change_set() {
        let summary = summarize(Vec::new());
        assert_eq!(summary.total_files(), 0);
        let digest = render(&summary, DigestConfig::default());
        assert!(digest.contains("**Additions:** +0"));
        assert!(digest.contains("**Languages Detected:** none"));
        assert!(!digest.contains("### 1."));
    }

    #[test]
    fn long_patch_is_truncated_with_note() {
        let mut patch = String::from("@@ -1,0 +1,149 @@\n");
        for i in 0..149 {
            let _ = writeln!(patch, "+line {i}");
        }
        let summary = summarize(vec![file("big.rs", "added", 149, 0, Some(patch))]);
        let digest = render(&summary, DigestConfig::default());

        assert!(digest.contains("+line 98\n"));
        assert!(!digest.contains("+line 99\n"));
        assert!(digest.contains("... (truncated, 50 more lines)"));
    }

    #[test]
    fn file_sections_limited_with_omission_note() {
        let files = (0..15)
            .map(|i| file(&format!("src/f{i}.rs"), "modified", 1, 0, None))
            .collect();
        let digest = render(&summarize(files), DigestConfig::default());

        assert_eq!(digest.matches("\n### ").count(), 10);
        assert!(digest.contains("### 10. src/f9.rs"));
        assert!(!digest.contains("src/f10.rs"));
        assert!(digest.contains("(Showing first 10 of 15 files, 5 omitted)"));
        assert!(digest.contains("**Total Files Changed:** 15"));
    }

    #[test]
    fn custom_limits_apply() {
        let files = vec![
            file("a.go", "added", 2, 0, Some("@@ -0,0 +1,2 @@\n+a\n+b".into())),
            file("b.go", "added", 1, 0, None),
        ];
        let limits = DigestConfig {
            max_files: 1,
            max_patch_lines: 2,
        };
        let digest = render(&summarize(files), limits);
        assert!(digest.contains("### 1. a.go"));
        assert!(digest.contains("**Status:** ADDED"));
        assert!(digest.contains("**Language:** Go"));
        assert!(digest.contains("... (truncated, 1 more lines)"));
        assert!(digest.contains("1 omitted"));
    }

    #[test]
    fn sections_follow_input_order() {
        let files = vec![
            file("z.rs", "modified", 0, 0, None),
            file("a.rs", "modified", 0, 0, None),
        ];
        let digest = render(&summarize(files), DigestConfig::default());
        let z = digest.find("z.rs").unwrap();
        let a = digest.find("a.rs").unwrap();
        assert!(z < a);
    }
}
