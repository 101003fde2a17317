//! Before/after snapshots of a catalog file and line diffs between them

use std::path::Path;

use similar::{Algorithm, ChangeTag, TextDiff};

use crate::git::{CommitRange, Vcs};

/// A file's content at both ends of a commit range. Empty means absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshots {
    pub before: String,
    pub after: String,
}

impl Snapshots {
    /// Both revisions have content
    pub fn is_complete(&self) -> bool {
        !self.before.is_empty() && !self.after.is_empty()
    }

    pub fn is_unchanged(&self) -> bool {
        self.before == self.after
    }

    /// Line diff of the untrimmed snapshots
    pub fn diff(&self) -> String {
        render_line_diff(&self.before, &self.after)
    }
}

/// Read `file` at both revisions of `range`
pub fn diff_resource_across_commits(vcs: &dyn Vcs, file: &Path, range: &CommitRange) -> Snapshots {
    let [before, after] = range.revisions();
    Snapshots {
        before: vcs.file_at_revision(file, before),
        after: vcs.file_at_revision(file, after),
    }
}

/// Render a context-free line diff as a fenced `diff` block: removed lines
/// prefixed `-`, added lines `+`, unchanged and blank lines omitted.
pub fn render_line_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(before, after);

    let mut out = String::from("```diff\n");
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => continue,
        };
        let line = change.value().trim_end_matches(|c: char| c == '\r' || c == '\n');
        if line.trim().is_empty() {
            continue;
        }
        out.push(sign);
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("```");
    out
}
