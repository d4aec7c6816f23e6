// src/util.rs — Shared utility functions

/// Truncate a string to at most `max_len` bytes without splitting a
/// UTF-8 character.
pub fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        s
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

/// Collapse whitespace (including line breaks) to single spaces so error
/// text fits on one terminal line.
pub fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-line summary of at most `max_len` bytes, marked with "..." when cut.
pub fn ellipsize(s: &str, max_len: usize) -> String {
    let line = single_line(s);
    if line.len() <= max_len {
        return line;
    }
    format!("{}...", truncate_str(&line, max_len.saturating_sub(3)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte() {
        // "café" is 5 bytes; cutting at 4 must not split the é
        assert_eq!(truncate_str("café", 4), "caf");
    }

    #[test]
    fn test_single_line() {
        assert_eq!(single_line("exit 1:\n  no such file\n"), "exit 1: no such file");
    }

    #[test]
    fn test_ellipsize() {
        assert_eq!(ellipsize("short", 10), "short");
        assert_eq!(ellipsize("step failed badly", 10), "step fa...");
        assert_eq!(ellipsize("a\nb", 10), "a b");
    }
}
