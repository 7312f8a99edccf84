//! Line-level representation shared by every pass.

use crate::text;

/// One physical line of Pyx source, remembered with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub file: String,
    pub line: u32,
    pub text: String,
    /// Count of leading space/tab characters in `text`.
    pub indent: usize,
}

impl SourceLine {
    pub fn new(file: &str, line: u32, text: impl Into<String>) -> Self {
        let text = text.into();
        SourceLine {
            file: file.to_owned(),
            line,
            indent: text::indent_width(&text),
            text,
        }
    }

    /// Same origin, different text (used when a pass rewrites a line).
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        SourceLine::new(&self.file, self.line, text)
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// The whitespace prefix of the line.
    pub fn indent_str(&self) -> &str {
        &self.text[..self.indent]
    }
}

/// Where a definition or namespace was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub file: String,
    pub line: u32,
}

impl From<&SourceLine> for Provenance {
    fn from(line: &SourceLine) -> Self {
        Provenance {
            file: line.file.clone(),
            line: line.line,
        }
    }
}

/// Line terminator of the root file, reproduced in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    /// Taken from the first line break; text without one is `Lf`.
    pub fn detect(src: &str) -> Self {
        match src.find('\n') {
            Some(i) if src[..i].ends_with('\r') => LineEnding::CrLf,
            _ => LineEnding::Lf,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// The flattened result of the include pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUnit {
    pub lines: Vec<SourceLine>,
    /// Raw text of the root file, before any expansion.
    pub original: String,
    pub trailing_newline: bool,
    pub line_ending: LineEnding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indent_is_computed_from_text() {
        let line = SourceLine::new("a.pyx", 1, "\t  x = 1");
        assert_eq!(line.indent, 3);
        assert_eq!(line.indent_str(), "\t  ");
        let rewritten = line.with_text("y");
        assert_eq!(rewritten.indent, 0);
        assert_eq!(rewritten.line, 1);
    }

    #[test]
    fn line_ending_follows_first_break() {
        assert_eq!(LineEnding::detect("a\r\nb\n"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\nb\r\n"), LineEnding::Lf);
        assert_eq!(LineEnding::detect("no break"), LineEnding::Lf);
        assert_eq!(LineEnding::CrLf.as_str(), "\r\n");
    }

    #[test]
    fn whitespace_only_line_is_blank() {
        assert!(SourceLine::new("a.pyx", 2, "   ").is_blank());
        assert!(!SourceLine::new("a.pyx", 2, " #").is_blank());
    }
}
