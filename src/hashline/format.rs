//! Hashline display formatting - `L:HH|content` - and prefix stripping for echoed text.

use super::anchor::Anchor;
use super::hash::hash_line;

/// Render lines starting at `start_line` (1-based) in hashline display form.
pub fn format_lines(lines: &[&str], start_line: usize) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let n = start_line + i;
        let h = hash_line(line);
        out.push_str(&format!("{}:{}|{}\n", n, h, line));
    }
    out
}

/// True if `line` begins with a syntactically valid `L:HH|` display prefix.
fn has_display_prefix(line: &str) -> bool {
    let Some(pipe_pos) = line.find('|') else {
        return false;
    };
    Anchor::parse(&line[..pipe_pos]).is_ok()
}

/// If at least half the non-empty lines of `text` look like echoed hashline
/// display lines, strip the `L:HH|` prefix from every line that has one.
/// Defends against models that copy the display format back into `new_text`.
pub fn strip_echoed_prefixes(text: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }

    let lines: Vec<&str> = text.split('\n').collect();
    let non_empty = lines.iter().filter(|l| !l.is_empty()).count();
    if non_empty == 0 {
        return text.to_string();
    }

    let prefixed = lines.iter().filter(|l| has_display_prefix(l)).count();
    if (prefixed as f64) < (non_empty as f64) * 0.5 {
        return text.to_string();
    }

    lines
        .into_iter()
        .map(|line| match line.find('|') {
            Some(pos) if Anchor::parse(&line[..pos]).is_ok() => &line[pos + 1..],
            _ => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_lines_with_sequential_numbers() {
        let out = format_lines(&["foo", "bar"], 1);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1:"));
        assert!(lines[0].ends_with("|foo"));
        assert!(lines[1].starts_with("2:"));
        assert!(lines[1].ends_with("|bar"));
    }

    #[test]
    fn format_preserves_content_verbatim() {
        let out = format_lines(&["  indented code  "], 5);
        assert!(out.ends_with("|  indented code  \n"));
    }

    #[test]
    fn round_trip_format_then_parse() {
        let out = format_lines(&["a", "b", "c"], 1);
        for (i, line) in out.lines().enumerate() {
            let pipe = line.find('|').unwrap();
            let anchor = Anchor::parse(&line[..pipe]).unwrap();
            assert_eq!(anchor.line, i + 1);
        }
    }

    #[test]
    fn strips_majority_echoed_prefixes() {
        let echoed = "1:ab|fn main() {\n2:cd|    println!(\"hi\");\n3:ef|}";
        let stripped = strip_echoed_prefixes(echoed);
        assert_eq!(stripped, "fn main() {\n    println!(\"hi\");\n}");
    }

    #[test]
    fn leaves_plain_text_untouched() {
        let plain = "fn main() {\n    println!(\"hi\");\n}";
        assert_eq!(strip_echoed_prefixes(plain), plain);
    }

    #[test]
    fn requires_majority_before_stripping() {
        // Only one of three lines looks like a display line - below 50%.
        let mixed = "1:ab|real code\njust some text\nmore plain text";
        assert_eq!(strip_echoed_prefixes(mixed), mixed);
    }
}
