//! Anchor parsing - `(line, hash)` references written as `L:HH`.

use super::HashlineError;

/// A reference to a specific line in a specific file-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub line: usize,
    pub hash: [u8; 4], // up to 4 lowercase hex chars, padded with 0
    pub hash_len: u8,
}

impl Anchor {
    pub fn hash_str(&self) -> String {
        self.hash[..self.hash_len as usize]
            .iter()
            .map(|&b| b as char)
            .collect()
    }

    /// Parse `L:HH` or the tolerant `L:HH|anything` form.
    pub fn parse(raw: &str) -> Result<Self, HashlineError> {
        let trimmed = raw.trim();
        let without_content = trimmed.split('|').next().unwrap_or(trimmed);

        let mut parts = without_content.splitn(2, ':');
        let line_part = parts.next().unwrap_or("").trim();
        let hash_part = parts.next().ok_or_else(|| HashlineError::MalformedAnchor {
            raw: raw.to_string(),
        })?;
        let hash_part = hash_part.trim();

        let line: usize = line_part
            .parse()
            .map_err(|_| HashlineError::MalformedAnchor { raw: raw.to_string() })?;
        if line < 1 {
            return Err(HashlineError::MalformedAnchor { raw: raw.to_string() });
        }

        if hash_part.is_empty() || hash_part.len() > 4 {
            return Err(HashlineError::MalformedAnchor { raw: raw.to_string() });
        }
        if !hash_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashlineError::MalformedAnchor { raw: raw.to_string() });
        }

        let lower = hash_part.to_ascii_lowercase();
        let mut hash = [0u8; 4];
        for (i, b) in lower.bytes().enumerate() {
            hash[i] = b;
        }

        Ok(Anchor {
            line,
            hash,
            hash_len: lower.len() as u8,
        })
    }

    /// Case-insensitive comparison of this anchor's hash against a freshly computed one.
    pub fn matches_hash(&self, computed: &str) -> bool {
        self.hash_str().eq_ignore_ascii_case(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_bare_anchor() {
        let a = Anchor::parse("3:ab").unwrap();
        assert_eq!(a.line, 3);
        assert_eq!(a.hash_str(), "ab");
    }

    #[test]
    fn parses_tolerant_form_with_content() {
        let a = Anchor::parse("3:ab|let x = 1;").unwrap();
        assert_eq!(a.line, 3);
        assert_eq!(a.hash_str(), "ab");
    }

    #[test]
    fn trims_whitespace() {
        let a = Anchor::parse("  3:ab  ").unwrap();
        assert_eq!(a.line, 3);
    }

    #[rstest]
    #[case("0:ab")]
    #[case("abc:ab")]
    #[case("3:")]
    #[case("3")]
    #[case("3:zz-not-hex")]
    #[case("3:abcde")]
    fn rejects_malformed(#[case] raw: &str) {
        assert!(Anchor::parse(raw).is_err());
    }

    #[test]
    fn hash_compare_is_case_insensitive() {
        let a = Anchor::parse("1:AB").unwrap();
        assert!(a.matches_hash("ab"));
        assert!(a.matches_hash("AB"));
    }
}
