//! Source normalization ahead of tokenizing
//!
//! Comments are blanked rather than removed so that every character keeps its
//! original offset. A `#` opens a line comment when it starts a line or
//! follows whitespace; a `#` glued to a note (`c#`) stays a sharp.

/// Marker that opens a line comment
pub const COMMENT_MARKER: char = '#';

/// Inert character written over comment text
pub const FILLER: char = '@';

/// Replace every line comment with an equal-length run of [`FILLER`]
pub fn strip_comments(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_comment = false;
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            in_comment = false;
            result.push(ch);
        } else if in_comment {
            result.push(FILLER);
        } else if ch == COMMENT_MARKER && prev.map_or(true, char::is_whitespace) {
            in_comment = true;
            result.push(FILLER);
        } else {
            result.push(ch);
        }
        prev = Some(ch);
    }

    result
}

/// Blank comments and fold the text to lowercase.
///
/// Only ASCII letters are folded, so the character count never changes.
pub fn normalize(text: &str) -> String {
    strip_comments(text)
        .chars()
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_preserves_length() {
        let text = "c d e # melody\nf g";
        let stripped = strip_comments(text);
        assert_eq!(stripped.chars().count(), text.chars().count());
        assert_eq!(stripped, "c d e @@@@@@@@\nf g");
    }

    #[test]
    fn test_comment_at_line_start() {
        assert_eq!(strip_comments("# intro\nc"), "@@@@@@@\nc");
    }

    #[test]
    fn test_sharp_is_not_a_comment() {
        assert_eq!(strip_comments("c#4 f#"), "c#4 f#");
    }

    #[test]
    fn test_comment_ends_at_line_break() {
        assert_eq!(strip_comments("c #x\r\nd"), "c @@\r\nd");
    }

    #[test]
    fn test_normalize_folds_case() {
        assert_eq!(normalize("T120 L8 CDE"), "t120 l8 cde");
        assert_eq!(normalize("C # Comment"), "c @@@@@@@@@");
    }

    #[test]
    fn test_normalize_keeps_non_ascii_offsets() {
        let text = "cÉd";
        assert_eq!(normalize(text).chars().count(), 3);
    }
}
