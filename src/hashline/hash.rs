//! Line hashing - xxHash32 of whitespace-stripped content, reduced to two hex digits.

use xxhash_rust::xxh32::xxh32;

const SEED: u32 = 0;

/// Hash a single line for display/anchor purposes.
///
/// Strips a trailing `\r` first (so CRLF and LF inputs hash identically), then
/// removes every whitespace code point (not just leading/trailing) before
/// hashing, so `"a  b"`, `"ab"`, and `" a\tb "` all hash the same.
pub fn hash_line(line: &str) -> String {
    let stripped = line.strip_suffix('\r').unwrap_or(line);
    let normalized: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    let digest = xxh32(normalized.as_bytes(), SEED);
    format!("{:02x}", digest % 256)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_two_lowercase_hex_digits() {
        let h = hash_line("fn main() {}");
        assert_eq!(h.len(), 2);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn hash_ignores_all_whitespace() {
        assert_eq!(hash_line("a  b"), hash_line("ab"));
        assert_eq!(hash_line("ab"), hash_line(" a\tb "));
        assert_eq!(hash_line("a  b"), hash_line(" a\tb "));
    }

    #[test]
    fn hash_strips_trailing_cr() {
        assert_eq!(hash_line("hello\r"), hash_line("hello"));
    }

    #[test]
    fn hash_determinism() {
        assert_eq!(hash_line("repeatable"), hash_line("repeatable"));
    }

    #[test]
    fn hash_differs_for_different_content() {
        // Not an invariant (collisions are fine), but sanity-checks the common case.
        assert_ne!(hash_line("alpha"), hash_line("zzzzzzzzzzzzzzzzzzzz"));
    }

    proptest::proptest! {
        #[test]
        fn hash_is_always_two_lowercase_hex_digits(line in ".*") {
            let h = hash_line(&line);
            proptest::prop_assert_eq!(h.len(), 2);
            proptest::prop_assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }

        #[test]
        fn hash_is_deterministic_for_arbitrary_input(line in ".*") {
            proptest::prop_assert_eq!(hash_line(&line), hash_line(&line));
        }

        #[test]
        fn hash_is_insensitive_to_trailing_cr(line in "[^\r]*") {
            let with_cr = format!("{line}\r");
            proptest::prop_assert_eq!(hash_line(&with_cr), hash_line(&line));
        }
    }
}
