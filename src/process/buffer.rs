//! Bounded output buffer shared by a process's stdout and stderr readers.

pub const MAX_OUTPUT_BYTES: usize = 256 * 1024;

#[derive(Debug, Default)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
    truncated: bool,
}

impl OutputBuffer {
    pub fn append(&mut self, data: &[u8]) {
        if self.truncated {
            return;
        }
        let room = MAX_OUTPUT_BYTES.saturating_sub(self.bytes.len());
        if data.len() > room {
            self.bytes.extend_from_slice(&data[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(data);
        }
    }

    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Last `n` bytes (on a UTF-8 boundary), prefixed with `...` if shorter
    /// than the full buffer.
    pub fn tail(&self, n: usize) -> String {
        if self.bytes.len() <= n {
            return self.as_str();
        }
        let mut start = self.bytes.len() - n;
        while start < self.bytes.len() && !is_char_boundary(&self.bytes, start) {
            start += 1;
        }
        format!("...{}", String::from_utf8_lossy(&self.bytes[start..]))
    }
}

fn is_char_boundary(bytes: &[u8], idx: usize) -> bool {
    idx == bytes.len() || (bytes[idx] & 0xC0) != 0x80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_under_cap() {
        let mut b = OutputBuffer::default();
        b.append(b"hello");
        assert_eq!(b.as_str(), "hello");
        assert!(!b.truncated());
    }

    #[test]
    fn truncates_at_cap() {
        let mut b = OutputBuffer::default();
        b.append(&vec![b'a'; MAX_OUTPUT_BYTES + 10]);
        assert_eq!(b.len(), MAX_OUTPUT_BYTES);
        assert!(b.truncated());
    }

    #[test]
    fn further_appends_after_truncation_are_dropped() {
        let mut b = OutputBuffer::default();
        b.append(&vec![b'a'; MAX_OUTPUT_BYTES]);
        b.append(b"more");
        assert_eq!(b.len(), MAX_OUTPUT_BYTES);
    }

    #[test]
    fn tail_prefixes_ellipsis_when_shorter_than_buffer() {
        let mut b = OutputBuffer::default();
        b.append(b"0123456789");
        assert_eq!(b.tail(4), "...6789");
        assert_eq!(b.tail(100), "0123456789");
    }
}
