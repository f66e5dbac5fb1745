//! Batch edit application: validate-all-or-nothing, then splice bottom-up.

use super::anchor::Anchor;
use super::format::strip_echoed_prefixes;
use super::hash::hash_line;
use super::HashlineError;

/// One edit operation as decoded from the model's tool call.
#[derive(Debug, Clone)]
pub enum EditOp {
    SetLine { anchor: Anchor, new_text: String },
    ReplaceLines { start: Anchor, end: Anchor, new_text: String },
    InsertAfter { anchor: Anchor, text: String },
}

impl EditOp {
    /// Construct from raw (unparsed) anchor strings, validating shape-only
    /// invariants (malformed anchors, inverted ranges, empty inserts) eagerly.
    /// These fail the whole call immediately - they are not staleness, they are
    /// malformed requests.
    pub fn set_line(anchor_raw: &str, new_text: impl Into<String>) -> Result<Self, HashlineError> {
        let anchor = Anchor::parse(anchor_raw)?;
        Ok(EditOp::SetLine { anchor, new_text: new_text.into() })
    }

    pub fn replace_lines(
        start_raw: &str,
        end_raw: &str,
        new_text: impl Into<String>,
    ) -> Result<Self, HashlineError> {
        let start = Anchor::parse(start_raw)?;
        let end = Anchor::parse(end_raw)?;
        if start.line > end.line {
            return Err(HashlineError::RangeInverted { start: start.line, end: end.line });
        }
        Ok(EditOp::ReplaceLines { start, end, new_text: new_text.into() })
    }

    pub fn insert_after(anchor_raw: &str, text: impl Into<String>) -> Result<Self, HashlineError> {
        let anchor = Anchor::parse(anchor_raw)?;
        let text = text.into();
        if text.is_empty() {
            return Err(HashlineError::EmptyInsert);
        }
        Ok(EditOp::InsertAfter { anchor, text })
    }

    fn end_line(&self) -> usize {
        match self {
            EditOp::SetLine { anchor, .. } => anchor.line,
            EditOp::ReplaceLines { end, .. } => end.line,
            EditOp::InsertAfter { anchor, .. } => anchor.line,
        }
    }

    /// 0 for set_line/replace_lines, 1 for insert_after - used as the tie-break
    /// key so that, at equal endLine, replacements sort before inserts.
    fn kind_rank(&self) -> u8 {
        matches!(self, EditOp::InsertAfter { .. }) as u8
    }

    fn anchors(&self) -> Vec<Anchor> {
        match self {
            EditOp::SetLine { anchor, .. } => vec![*anchor],
            EditOp::ReplaceLines { start, end, .. } => vec![*start, *end],
            EditOp::InsertAfter { anchor, .. } => vec![*anchor],
        }
    }
}

/// Split text into lines the way this module treats files: a string ending in
/// `\n` does not contribute a trailing empty line; an entirely empty string is
/// zero lines.
fn to_lines(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n').map(|s| s.to_string()).collect()
}

pub struct EditOutcome {
    pub content: String,
}

const MISMATCH_CONTEXT: usize = 2;

enum Failure {
    OutOfRange { anchor: Anchor, file_lines: usize },
    HashMismatch { anchor: Anchor },
}

/// Apply a batch of edits to `content`. All anchors are resolved against the
/// snapshot of `content` at the start of this call, regardless of the order
/// in which earlier edits in the batch are applied.
pub fn apply_edits(content: &str, edits: &[EditOp]) -> Result<EditOutcome, HashlineError> {
    let had_trailing_newline = content.ends_with('\n');
    let mut lines = to_lines(content);

    let mut failures = Vec::new();
    for edit in edits {
        for anchor in edit.anchors() {
            if anchor.line < 1 || anchor.line > lines.len() {
                failures.push(Failure::OutOfRange { anchor, file_lines: lines.len() });
                continue;
            }
            let actual = hash_line(&lines[anchor.line - 1]);
            if !anchor.matches_hash(&actual) {
                failures.push(Failure::HashMismatch { anchor });
            }
        }
    }

    if !failures.is_empty() {
        return Err(HashlineError::HashMismatch {
            report: render_mismatch_report(&lines, &failures),
        });
    }

    let mut sorted: Vec<&EditOp> = edits.iter().collect();
    sorted.sort_by_key(|e| (std::cmp::Reverse(e.end_line()), e.kind_rank()));

    for edit in sorted {
        match edit {
            EditOp::SetLine { anchor, new_text } => {
                let new_lines = to_lines(&strip_echoed_prefixes(new_text));
                let idx = anchor.line - 1;
                lines.splice(idx..=idx, new_lines);
            }
            EditOp::ReplaceLines { start, end, new_text } => {
                let new_lines = to_lines(&strip_echoed_prefixes(new_text));
                let range = (start.line - 1)..=(end.line - 1);
                lines.splice(range, new_lines);
            }
            EditOp::InsertAfter { anchor, text } => {
                let new_lines = to_lines(&strip_echoed_prefixes(text));
                let pos = anchor.line; // insert at index == anchor.line (0-based, i.e. right after it)
                lines.splice(pos..pos, new_lines);
            }
        }
    }

    let mut new_content = lines.join("\n");
    if had_trailing_newline && !lines.is_empty() {
        new_content.push('\n');
    } else if had_trailing_newline && lines.is_empty() {
        // original was e.g. a single trailing newline with no content; preserve emptiness semantics
    }

    if new_content == content {
        return Err(HashlineError::NoOp);
    }

    Ok(EditOutcome { content: new_content })
}

fn render_mismatch_report(lines: &[String], failures: &[Failure]) -> String {
    let mut out = String::new();
    let mut ranges: Vec<(usize, usize, usize)> = Vec::new(); // (start_idx, end_idx, changed_idx) 0-based

    for f in failures {
        match f {
            Failure::OutOfRange { anchor, file_lines } => {
                out.push_str(&format!(
                    "Line {} is out of range (file has {} lines)\n",
                    anchor.line, file_lines
                ));
            }
            Failure::HashMismatch { anchor } => {
                let idx = anchor.line - 1;
                let start = idx.saturating_sub(MISMATCH_CONTEXT);
                let end = (idx + MISMATCH_CONTEXT).min(lines.len().saturating_sub(1));
                ranges.push((start, end, idx));
            }
        }
    }

    if ranges.is_empty() {
        return out;
    }

    ranges.sort_by_key(|r| r.0);
    let mut merged: Vec<(usize, usize, Vec<usize>)> = Vec::new();
    for (start, end, changed) in ranges {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 + 1 {
                last.1 = last.1.max(end);
                last.2.push(changed);
                continue;
            }
        }
        merged.push((start, end, vec![changed]));
    }

    for (i, (start, end, changed)) in merged.iter().enumerate() {
        if i > 0 {
            out.push_str("...\n");
        }
        for idx in *start..=*end {
            let n = idx + 1;
            let h = hash_line(&lines[idx]);
            let marker = if changed.contains(&idx) { ">>> " } else { "" };
            out.push_str(&format!("{}{}:{}|{}\n", marker, n, h, lines[idx]));
        }
    }

    out
}
