use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tribunal_core::{ChangeLine, ChangeStatus, FileChange, LineKind, TribunalError};

use crate::language::detect_language;

/// Raw per-file record as delivered by a host API or produced by
/// [`split_unified_diff`].
///
/// `status` is kept as free text so that one bad record can be skipped
/// without rejecting the whole change-set.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::FileRecord;
///
/// let json = r#"{"filename":"src/lib.rs","status":"modified","additions":2,"deletions":1}"#;
/// let record: FileRecord = serde_json::from_str(json).unwrap();
/// assert_eq!(record.path, "src/lib.rs");
/// assert!(record.patch.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File path in the new version.
    #[serde(alias = "filename")]
    pub path: String,
    /// Change status as reported by the source.
    pub status: String,
    /// Lines added.
    #[serde(default)]
    pub additions: u32,
    /// Lines deleted.
    #[serde(default)]
    pub deletions: u32,
    /// Unified-diff hunks, absent for binary or oversized files.
    #[serde(default)]
    pub patch: Option<String>,
}

/// Options controlling [`parse_patch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Record context lines as [`LineKind::Context`] instead of dropping them.
    pub keep_context: bool,
}

/// A record that could not be turned into a [`FileChange`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    /// Path as given in the record (may be empty).
    pub path: String,
    /// Why the record was rejected.
    pub reason: String,
}

/// Result of parsing every record of a change-set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedChangeSet {
    /// Successfully parsed files, in input order.
    pub files: Vec<FileChange>,
    /// Records skipped because their metadata was unusable.
    pub skipped: Vec<SkippedFile>,
}

impl fmt::Display for SkippedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.reason)
    }
}

/// Parse a file's patch text into line-level facts.
///
/// A hunk header resets the new-file cursor to its `+start`. Additions are
/// recorded at the cursor and advance it; deletions are recorded at the
/// cursor and leave it in place; context lines advance it. Malformed hunk
/// headers are tolerated and leave the cursor untouched. Before the first
/// hunk header the cursor is 0.
///
/// `---`/`+++` file headers are only recognised before the first hunk
/// header. Inside a hunk, `+++i;` is an added line and `--- note` is a
/// deleted one, matching how [`split_unified_diff`] counts them.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::{parse_patch, ParseOptions};
///
/// let patch = "@@ -1,3 +10,3 @@\n context\n+added\n-removed\n";
/// let lines = parse_patch(patch, ParseOptions::default());
/// assert_eq!(lines.len(), 2);
/// assert_eq!(lines[0].line_number, 11);
/// assert_eq!(lines[1].line_number, 11);
/// ```
pub fn parse_patch(patch: &str, options: ParseOptions) -> Vec<ChangeLine> {
    let mut lines = Vec::new();
    let mut cursor: u32 = 0;
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            match parse_new_start(line) {
                Some(start) => cursor = start,
                None => debug!(header = line, "malformed hunk header, keeping cursor at {cursor}"),
            }
            continue;
        }

        if !in_hunk && (line.starts_with("+++ ") || line.starts_with("--- ")) {
            continue;
        }

        if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        }

        if let Some(content) = line.strip_prefix('+') {
            lines.push(ChangeLine {
                kind: LineKind::Addition,
                line_number: cursor,
                content: content.to_string(),
            });
            cursor = cursor.saturating_add(1);
        } else if let Some(content) = line.strip_prefix('-') {
            lines.push(ChangeLine {
                kind: LineKind::Deletion,
                line_number: cursor,
                content: content.to_string(),
            });
        } else {
            if options.keep_context {
                lines.push(ChangeLine {
                    kind: LineKind::Context,
                    line_number: cursor,
                    content: line.strip_prefix(' ').unwrap_or(line).to_string(),
                });
            }
            cursor = cursor.saturating_add(1);
        }
    }

    lines
}

fn parse_new_start(line: &str) -> Option<u32> {
    let inner = line.strip_prefix("@@")?;
    let inner = match inner.find("@@") {
        Some(end) => &inner[..end],
        None => inner,
    };
    let new_range = inner
        .split_whitespace()
        .find_map(|part| part.strip_prefix('+'))?;
    let start = new_range.split(',').next()?;
    start.parse().ok()
}

/// Build a [`FileChange`] from a raw record.
///
/// # Errors
///
/// Returns [`TribunalError::Parse`] when the path is empty or the status is
/// not one of the known spellings.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::{parse_file, FileRecord, ParseOptions};
///
/// let record = FileRecord {
///     path: "web/App.tsx".into(),
///     status: "added".into(),
///     additions: 1,
///     deletions: 0,
///     patch: Some("@@ -0,0 +1 @@\n+export {};".into()),
/// };
/// let file = parse_file(&record, ParseOptions::default()).unwrap();
/// assert_eq!(file.language.as_deref(), Some("React TSX"));
/// assert_eq!(file.lines.len(), 1);
/// ```
pub fn parse_file(record: &FileRecord, options: ParseOptions) -> Result<FileChange, TribunalError> {
    let path = record.path.trim();
    if path.is_empty() {
        return Err(TribunalError::Parse("file record has an empty path".into()));
    }

    let status: ChangeStatus = record
        .status
        .parse()
        .map_err(|e: String| TribunalError::Parse(format!("{path}: {e}")))?;

    let lines = record
        .patch
        .as_deref()
        .map(|p| parse_patch(p, options))
        .unwrap_or_default();

    Ok(FileChange {
        path: path.to_string(),
        status,
        additions: record.additions,
        deletions: record.deletions,
        patch_text: record.patch.clone(),
        language: detect_language(path).map(String::from),
        lines,
    })
}

/// Parse every record independently.
///
/// A record that fails [`parse_file`] is reported in
/// [`ParsedChangeSet::skipped`]; the remaining records are still parsed.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::{parse_files, FileRecord, ParseOptions};
///
/// let records = vec![
///     FileRecord { path: "a.rs".into(), status: "modified".into(), additions: 0, deletions: 0, patch: None },
///     FileRecord { path: "".into(), status: "modified".into(), additions: 0, deletions: 0, patch: None },
/// ];
/// let parsed = parse_files(&records, ParseOptions::default());
/// assert_eq!(parsed.files.len(), 1);
/// assert_eq!(parsed.skipped.len(), 1);
/// ```
pub fn parse_files(records: &[FileRecord], options: ParseOptions) -> ParsedChangeSet {
    let mut parsed = ParsedChangeSet::default();
    for record in records {
        match parse_file(record, options) {
            Ok(file) => parsed.files.push(file),
            Err(e) => {
                warn!(path = %record.path, error = %e, "skipping file record");
                parsed.skipped.push(SkippedFile {
                    path: record.path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    parsed
}

/// Lines still owed by the hunk being read.
#[derive(Debug, Clone, Copy)]
enum Hunk {
    /// Remaining old-side and new-side lines from the `@@ -a,b +c,d @@` header.
    Counted { old: u32, new: u32 },
    /// Header counts were unreadable; the body runs until the next header.
    Open,
}

struct PendingFile {
    old_path: String,
    new_path: String,
    header_path: String,
    from_git_header: bool,
    is_new_file: bool,
    is_deleted_file: bool,
    is_rename: bool,
    is_binary: bool,
    additions: u32,
    deletions: u32,
    patch: String,
    saw_hunk: bool,
    hunk: Option<Hunk>,
}

impl PendingFile {
    fn new(header_path: String, from_git_header: bool) -> Self {
        Self {
            old_path: String::new(),
            new_path: String::new(),
            header_path,
            from_git_header,
            is_new_file: false,
            is_deleted_file: false,
            is_rename: false,
            is_binary: false,
            additions: 0,
            deletions: 0,
            patch: String::new(),
            saw_hunk: false,
            hunk: None,
        }
    }

    fn begin_hunk(&mut self, header: &str) {
        self.saw_hunk = true;
        self.hunk = Some(match parse_hunk_counts(header) {
            Some((old, new)) => Hunk::Counted { old, new },
            None => {
                debug!(header, "unreadable hunk counts, reading body until the next header");
                Hunk::Open
            }
        });
        self.push_patch_line(header);
    }

    /// Consume `line` as part of the current hunk body.
    ///
    /// Returns `false` when no hunk is open or `line` lies past its end, in
    /// which case the caller treats it as a header line.
    fn take_hunk_line(&mut self, line: &str) -> bool {
        let Some(hunk) = self.hunk else {
            return false;
        };

        let ends_hunk = line.starts_with("@@") || line.starts_with("diff --git ");
        match hunk {
            Hunk::Open => {
                if ends_hunk || (!self.from_git_header && line.starts_with("--- ")) {
                    self.hunk = None;
                    return false;
                }
            }
            Hunk::Counted { old, new } => {
                let is_body = line.is_empty() || line.starts_with([' ', '+', '-', '\\']);
                let exhausted = old == 0 && new == 0 && !line.starts_with('\\');
                if ends_hunk || !is_body || exhausted {
                    self.hunk = None;
                    return false;
                }
                let (old, new) = match line.chars().next() {
                    Some('+') => (old, new.saturating_sub(1)),
                    Some('-') => (old.saturating_sub(1), new),
                    Some('\\') => (old, new),
                    _ => (old.saturating_sub(1), new.saturating_sub(1)),
                };
                self.hunk = Some(Hunk::Counted { old, new });
            }
        }

        if line.starts_with('+') {
            self.additions += 1;
        } else if line.starts_with('-') {
            self.deletions += 1;
        }
        self.push_patch_line(line);
        true
    }

    fn push_patch_line(&mut self, line: &str) {
        self.patch.push_str(line);
        self.patch.push('\n');
    }

    fn into_record(self) -> FileRecord {
        let status = if self.is_new_file {
            ChangeStatus::Added
        } else if self.is_deleted_file {
            ChangeStatus::Deleted
        } else if self.is_rename {
            ChangeStatus::Renamed
        } else {
            ChangeStatus::Modified
        };

        let path = if self.is_deleted_file {
            self.old_path
        } else if self.new_path.is_empty() || self.new_path == "/dev/null" {
            self.header_path
        } else {
            self.new_path
        };

        let patch = if self.is_binary || self.patch.is_empty() {
            None
        } else {
            Some(self.patch)
        };

        FileRecord {
            path,
            status: status.to_string(),
            additions: self.additions,
            deletions: self.deletions,
            patch,
        }
    }
}

/// Old-side and new-side line counts of a hunk header. A range without a
/// count (`-3`) covers one line.
fn parse_hunk_counts(header: &str) -> Option<(u32, u32)> {
    let inner = header.strip_prefix("@@")?;
    let inner = &inner[..inner.find("@@")?];

    let mut old = None;
    let mut new = None;
    for part in inner.split_whitespace() {
        if let Some(range) = part.strip_prefix('-') {
            old = Some(range_len(range)?);
        } else if let Some(range) = part.strip_prefix('+') {
            new = Some(range_len(range)?);
        }
    }
    Some((old?, new?))
}

fn range_len(range: &str) -> Option<u32> {
    match range.split_once(',') {
        Some((start, len)) => {
            start.parse::<u32>().ok()?;
            len.parse().ok()
        }
        None => range.parse::<u32>().ok().map(|_| 1),
    }
}

/// Split a multi-file unified diff (as produced by `git diff`) into
/// per-file [`FileRecord`]s.
///
/// Each record's patch starts at its first hunk header, matching what host
/// APIs return per file. Binary files yield a record without a patch. Hunk
/// bodies are consumed by the line counts in their headers, so a deleted
/// `-- comment` line is never mistaken for the next file's `---` header.
///
/// # Examples
///
/// ```
/// use tribunal_difflens::parser::split_unified_diff;
///
/// let diff = concat!(
///     "diff --git a/hello.rs b/hello.rs\n",
///     "--- a/hello.rs\n",
///     "+++ b/hello.rs\n",
///     "@@ -1,2 +1,3 @@\n",
///     " fn main() {\n",
///     "+    println!(\"hello\");\n",
///     " }\n",
/// );
/// let records = split_unified_diff(diff);
/// assert_eq!(records.len(), 1);
/// assert_eq!(records[0].path, "hello.rs");
/// assert_eq!(records[0].additions, 1);
/// ```
pub fn split_unified_diff(input: &str) -> Vec<FileRecord> {
    let mut records = Vec::new();
    let mut current: Option<PendingFile> = None;

    for line in input.lines() {
        if let Some(file) = current.as_mut() {
            if file.take_hunk_line(line) {
                continue;
            }
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            if let Some(file) = current.take() {
                records.push(file.into_record());
            }
            current = Some(PendingFile::new(path_from_git_header(rest), true));
            continue;
        }

        // Plain patches without the "diff --git" line start at "--- ".
        if line.starts_with("--- ")
            && current
                .as_ref()
                .map_or(true, |f| !f.from_git_header && f.saw_hunk)
        {
            if let Some(file) = current.take() {
                records.push(file.into_record());
            }
            current = Some(PendingFile::new(String::new(), false));
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@") {
            file.begin_hunk(line);
            continue;
        }
        if file.saw_hunk {
            continue;
        }

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            file.is_binary = true;
        } else if line.starts_with("new file mode") {
            file.is_new_file = true;
        } else if line.starts_with("deleted file mode") {
            file.is_deleted_file = true;
        } else if line.starts_with("rename from ") || line.starts_with("rename to ") {
            file.is_rename = true;
        } else if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            if file.old_path == "/dev/null" {
                file.is_new_file = true;
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if file.new_path == "/dev/null" {
                file.is_deleted_file = true;
            }
        }
    }

    if let Some(file) = current.take() {
        records.push(file.into_record());
    }

    records
}

fn path_from_git_header(rest: &str) -> String {
    match rest.rfind(" b/") {
        Some(idx) => rest[idx + 3..].trim_matches('"').to_string(),
        None => rest
            .split_whitespace()
            .last()
            .map(parse_path)
            .unwrap_or_default(),
    }
}

fn parse_path(raw: &str) -> String {
    let normalized = raw.trim_matches('"');
    // git appends a tab and timestamp in some modes
    let normalized = normalized.split('\t').next().unwrap_or(normalized);

    if normalized == "/dev/null" {
        return normalized.to_string();
    }

    normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized)
        .to_string()
}
