//! Colored change previews for file-modifying invocations.
//!
//! Shown above the confirmation prompt so the user sees what a write or
//! replace will actually do before approving it.

use colored::Colorize;
use similar::{ChangeTag, TextDiff};

/// Render a colored preview of changing `path` from `old` to `new`.
/// `old` is `None` when the file does not exist yet, in which case every
/// line is an addition.
pub fn preview(path: &str, old: Option<&str>, new: &str) -> String {
    let Some(old) = old else {
        let mut out = format!("--- /dev/null\n+++ b/{}\n", path);
        for line in new.lines() {
            out.push_str(&format!("+{}\n", line).green().to_string());
        }
        return out;
    };

    let diff = TextDiff::from_lines(old, new);
    let mut out = format!("--- a/{path}\n+++ b/{path}\n");

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        out.push_str(&hunk.header().to_string());
        for change in hunk.iter_changes() {
            match change.tag() {
                ChangeTag::Delete => out.push_str(&format!("-{}", change).red().to_string()),
                ChangeTag::Insert => out.push_str(&format!("+{}", change).green().to_string()),
                ChangeTag::Equal => out.push_str(&format!(" {}", change)),
            }
        }
    }

    out
}
