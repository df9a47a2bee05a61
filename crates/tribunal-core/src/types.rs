use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a file was touched by a change-set.
///
/// Parsing accepts the spellings used by common host APIs: `removed` maps to
/// [`ChangeStatus::Deleted`], `changed` to [`ChangeStatus::Modified`] and
/// `copied` to [`ChangeStatus::Added`].
///
/// # Examples
///
/// ```
/// use tribunal_core::ChangeStatus;
///
/// let status: ChangeStatus = "removed".parse().unwrap();
/// assert_eq!(status, ChangeStatus::Deleted);
/// assert_eq!(status.to_string(), "deleted");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Newly created file.
    Added,
    /// Existing file edited in place.
    Modified,
    /// File removed.
    Deleted,
    /// File moved, possibly with edits.
    Renamed,
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Renamed => write!(f, "renamed"),
        }
    }
}

impl FromStr for ChangeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "added" | "copied" => Ok(ChangeStatus::Added),
            "modified" | "changed" => Ok(ChangeStatus::Modified),
            "deleted" | "removed" => Ok(ChangeStatus::Deleted),
            "renamed" => Ok(ChangeStatus::Renamed),
            other => Err(format!("unknown change status: {other}")),
        }
    }
}

/// Kind of a single parsed patch line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Line present only in the new version.
    Addition,
    /// Line present only in the old version.
    Deletion,
    /// Unchanged line shown for context.
    Context,
}

/// One addressable line of a patch.
///
/// `line_number` is always a new-file coordinate. A deletion has no line of
/// its own in the new file, so it reports the line at which it occurs, which
/// is the next surviving line.
///
/// # Examples
///
/// ```
/// use tribunal_core::{ChangeLine, LineKind};
///
/// let line = ChangeLine {
///     kind: LineKind::Addition,
///     line_number: 11,
///     content: "let x = 1;".into(),
/// };
/// assert_eq!(line.line_number, 11);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLine {
    /// Addition, deletion or context.
    pub kind: LineKind,
    /// Line number in the new file version.
    pub line_number: u32,
    /// Line text without the diff marker.
    pub content: String,
}

/// A single file of a change-set, with its parsed lines.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path of the file in the new version.
    pub path: String,
    /// How the file was changed.
    pub status: ChangeStatus,
    /// Lines added, as reported by the source.
    pub additions: u32,
    /// Lines deleted, as reported by the source.
    pub deletions: u32,
    /// Raw unified-diff hunks; absent for binary or oversized files.
    pub patch_text: Option<String>,
    /// Language derived from the path suffix.
    pub language: Option<String>,
    /// Additions and deletions (and context, when retained) in patch order.
    pub lines: Vec<ChangeLine>,
}

impl FileChange {
    /// Iterate over the addition lines only.
    pub fn additions_iter(&self) -> impl Iterator<Item = &ChangeLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Addition)
    }

    /// Iterate over the deletion lines only.
    pub fn deletions_iter(&self) -> impl Iterator<Item = &ChangeLine> {
        self.lines.iter().filter(|l| l.kind == LineKind::Deletion)
    }
}

/// Descriptor of the change-set under review.
///
/// # Examples
///
/// ```
/// use tribunal_core::ChangeSetInfo;
///
/// let info: ChangeSetInfo = serde_json::from_str(r#"{"title":"Fix login","number":7}"#).unwrap();
/// assert_eq!(info.number, Some(7));
/// assert!(info.author.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetInfo {
    /// Change-set title.
    #[serde(default)]
    pub title: Option<String>,
    /// Author handle.
    #[serde(default)]
    pub author: Option<String>,
    /// Free-text description.
    #[serde(default, alias = "body")]
    pub description: Option<String>,
    /// Host-side number of the change-set.
    #[serde(default)]
    pub number: Option<u64>,
    /// Lines added across the change-set.
    #[serde(default)]
    pub additions: u32,
    /// Lines deleted across the change-set.
    #[serde(default)]
    pub deletions: u32,
    /// Number of files changed.
    #[serde(default, alias = "changed_files")]
    pub changed_files: u32,
}

/// Overall severity of a review.
///
/// Ordered from least to most severe, so `Critical > High > Medium > Low > Info`.
///
/// # Examples
///
/// ```
/// use tribunal_core::Severity;
///
/// assert!(Severity::Critical > Severity::Low);
/// assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Nothing worth flagging.
    #[default]
    Info,
    /// Minor findings.
    Low,
    /// Findings worth addressing.
    Medium,
    /// Serious findings.
    High,
    /// Must be fixed before merging.
    Critical,
}

impl Severity {
    /// Returns `true` if `self` is at least as severe as `threshold`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tribunal_core::Severity;
    ///
    /// assert!(Severity::Critical.meets_threshold(Severity::High));
    /// assert!(Severity::High.meets_threshold(Severity::High));
    /// assert!(!Severity::Low.meets_threshold(Severity::Medium));
    /// ```
    pub fn meets_threshold(self, threshold: Severity) -> bool {
        self >= threshold
    }

    /// Upper-case label used in report badges.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Colored circle shown next to the label.
    pub fn emoji(self) -> &'static str {
        match self {
            Severity::Critical => "\u{1f534}",
            Severity::High => "\u{1f7e0}",
            Severity::Medium => "\u{1f7e1}",
            Severity::Low => "\u{1f7e2}",
            Severity::Info => "\u{1f535}",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Outcome of a single analysis stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// The provider returned a report.
    Done,
    /// The provider failed or timed out.
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Done => write!(f, "done"),
            StageStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Lifecycle of a pipeline run.
///
/// `Pending -> Running -> Completed | Failed | Cancelled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// No stage dispatched yet.
    #[default]
    Pending,
    /// At least one stage dispatched, not all finished.
    Running,
    /// Every declared stage produced an output.
    Completed,
    /// Every declared stage produced an output and all of them failed.
    Failed,
    /// Stopped early by an external cancellation.
    Cancelled,
}

impl RunStatus {
    /// Returns `true` once the run can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use tribunal_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Short human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// The full Markdown report.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
