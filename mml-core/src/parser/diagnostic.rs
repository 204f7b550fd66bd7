//! Human-readable rendering of compile errors
//!
//! Offsets are character offsets into the original source, which comment
//! blanking and case folding leave untouched.

use crate::parser::error::MmlError;

#[cfg(feature = "colored")]
use colored::*;

/// Line and column of a character offset (both 1-based)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    /// Full text of the line, without its terminator
    pub line_text: String,
}

/// Find the line and column of a character offset
pub fn locate(source: &str, offset: usize) -> SourceLocation {
    let mut line = 1;
    let mut line_start = 0;

    for (i, ch) in source.chars().enumerate() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            line_start = i + 1;
        }
    }

    let line_text: String = source
        .chars()
        .skip(line_start)
        .take_while(|&ch| ch != '\n' && ch != '\r')
        .collect();

    SourceLocation {
        line,
        column: offset.saturating_sub(line_start) + 1,
        line_text,
    }
}

/// Render an error with the offending line and a caret underline
pub fn render_diagnostic(source: &str, error: &MmlError) -> String {
    let location = locate(source, error.offset());
    let width = error.clause().trim_end().chars().count().max(1);
    let gutter = location.line.to_string();
    let pad = " ".repeat(gutter.len());
    let underline = format!("{}{}", " ".repeat(location.column - 1), "^".repeat(width));

    #[cfg(feature = "colored")]
    let (header, underline) = (
        format!("{} {}", "error:".bright_red().bold(), error),
        underline.bright_red().to_string(),
    );
    #[cfg(not(feature = "colored"))]
    let header = format!("error: {}", error);

    format!(
        "{}\n{} --> line {}, column {}\n{} |\n{} | {}\n{} | {}",
        header,
        pad,
        location.line,
        location.column,
        pad,
        gutter,
        location.line_text,
        pad,
        underline
    )
}
