/// Normalize program output for comparison
///
/// CRLF becomes LF, trailing spaces and tabs are stripped from every line,
/// then leading and trailing whitespace is trimmed from the whole text.
pub fn normalize_output(text: &str) -> String {
    let unified = text.replace("\r\n", "\n");
    let lines: Vec<&str> = unified
        .split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect();
    lines.join("\n").trim().to_string()
}

/// Compare program output with expected output after normalization
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

/// Truncate a string to at most `max_bytes`, never splitting a UTF-8 sequence
pub fn truncate_utf8(text: &mut String, max_bytes: usize) {
    if text.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

/// Lossy UTF-8 decode of captured bytes, capped at `max_bytes`
pub fn capped_string(bytes: &[u8], max_bytes: usize) -> String {
    let end = bytes.len().min(max_bytes);
    let mut text = String::from_utf8_lossy(&bytes[..end]).into_owned();
    // A replacement character for a cut sequence can push the length past the cap
    truncate_utf8(&mut text, max_bytes);
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs_match_exact() {
        assert!(outputs_match("hello\nworld\n", "hello\nworld\n"));
    }

    #[test]
    fn test_outputs_match_trailing_whitespace() {
        assert!(outputs_match("hello\n", "hello"));
        assert!(outputs_match("hello \n", "hello"));
        assert!(outputs_match("hello", "hello"));
        assert!(outputs_match("a\t \nb  \n\n\n", "a\nb"));
    }

    #[test]
    fn test_outputs_match_crlf() {
        assert!(outputs_match("1 2\r\n3 4\r\n", "1 2\n3 4\n"));
    }

    #[test]
    fn test_outputs_keep_inner_differences() {
        assert!(!outputs_match("hello\nworld\n", "hello\nearth\n"));
        assert!(!outputs_match("a  b", "a b"));
        assert!(!outputs_match("goodbye", "hello"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_output("  x \r\ny\t\n\n");
        assert_eq!(normalize_output(&once), once);
        assert_eq!(once, "x\ny");
    }

    #[test]
    fn test_truncate_utf8_boundary() {
        let mut s = "héllo".to_string();
        truncate_utf8(&mut s, 2);
        assert_eq!(s, "h");

        let mut s = "abc".to_string();
        truncate_utf8(&mut s, 10);
        assert_eq!(s, "abc");
    }

    #[test]
    fn test_capped_string_exact_length() {
        let bytes = vec![b'x'; 5000];
        let s = capped_string(&bytes, 1024);
        assert_eq!(s.len(), 1024);
    }

    #[test]
    fn test_capped_string_never_exceeds_cap() {
        let bytes = "ééé".as_bytes();
        let s = capped_string(bytes, 3);
        assert!(s.len() <= 3);
    }
}
