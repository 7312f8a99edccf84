//! Pass 6: output assembly and writing.

use crate::error::{ErrorKind, PyxError};
use crate::unit::{LineEnding, SourceLine};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_COMMENT_MARKER: &str = "'''";

pub const DEFAULT_HEADER_TEXT: &str = "This program was generated from Pyx source by a deterministic \
source-to-source transformation.\nEdit the .pyx file instead of this one.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitOptions {
    /// Disclaimer text; `None` disables the header block.
    pub header: Option<String>,
    /// Echo the root file's original source as a comment block.
    pub echo_source: bool,
    /// Opens and closes each comment block.
    pub comment_marker: String,
    /// Collapse runs of blank lines in the code to a single blank line.
    pub squeeze_blank_lines: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            header: Some(DEFAULT_HEADER_TEXT.to_owned()),
            echo_source: true,
            comment_marker: DEFAULT_COMMENT_MARKER.to_owned(),
            squeeze_blank_lines: false,
        }
    }
}

/// Decode header text passed base64-encoded (to survive shell quoting).
pub fn decode_header(encoded: &str) -> Result<String, PyxError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| PyxError::invalid_option(format!("header is not valid base64: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|_| PyxError::invalid_option("decoded header is not valid UTF-8"))
}

/// Assemble the final text: header block, source echo block, then code.
/// Every line is terminated with `line_ending`.
pub fn emit(
    code: &[SourceLine],
    original: &str,
    trailing_newline: bool,
    line_ending: LineEnding,
    opts: &EmitOptions,
) -> String {
    let nl = line_ending.as_str();
    let mut out = String::new();
    if let Some(header) = &opts.header {
        push_block(&mut out, &opts.comment_marker, header, nl);
    }
    if opts.echo_source {
        push_block(&mut out, &opts.comment_marker, original, nl);
    }

    let mut previous_blank = false;
    let mut body: Vec<&str> = Vec::with_capacity(code.len());
    for line in code {
        let blank = line.is_blank();
        if opts.squeeze_blank_lines && blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        body.push(&line.text);
    }
    out.push_str(&body.join(nl));
    if trailing_newline && !body.is_empty() {
        out.push_str(nl);
    }
    out
}

fn push_block(out: &mut String, marker: &str, text: &str, nl: &str) {
    out.push_str(marker);
    out.push_str(nl);
    let text = text.trim_end_matches(|c| c == '\n' || c == '\r');
    if !text.is_empty() {
        out.push_str(text);
        out.push_str(nl);
    }
    out.push_str(marker);
    out.push_str(nl);
}

/// Where the transpiled text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    pub fn write(&self, text: &str) -> Result<(), PyxError> {
        match self {
            OutputTarget::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(text.as_bytes())
                    .and_then(|_| stdout.flush())
                    .map_err(|e| PyxError::new(ErrorKind::Io, "<stdout>", 0, e.to_string()))
            }
            OutputTarget::File(path) => std::fs::write(path, text).map_err(|e| {
                PyxError::new(
                    ErrorKind::Io,
                    &path.to_string_lossy(),
                    0,
                    format!("cannot write output: {}", e),
                )
            }),
        }
    }
}

/// Output path used when the caller does not name one: `foo.pyx` becomes
/// `foo.py`, and an input that is already `.py` becomes `foo.out.py`.
pub fn default_output_path(input: &Path) -> PathBuf {
    match input.extension().and_then(|e| e.to_str()) {
        Some("py") => input.with_extension("out.py"),
        _ => input.with_extension("py"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(src: &str) -> Vec<SourceLine> {
        src.lines()
            .enumerate()
            .map(|(i, t)| SourceLine::new("t.pyx", i as u32 + 1, t))
            .collect()
    }

    fn bare() -> EmitOptions {
        EmitOptions {
            header: None,
            echo_source: false,
            ..EmitOptions::default()
        }
    }

    #[test]
    fn bare_output_is_just_the_code() {
        let out = emit(&code("a = 1\n\nb = 2"), "", true, LineEnding::Lf, &bare());
        assert_eq!(out, "a = 1\n\nb = 2\n");
        let out = emit(&code("a = 1"), "", false, LineEnding::Lf, &bare());
        assert_eq!(out, "a = 1");
    }

    #[test]
    fn header_then_echo_then_code() {
        let opts = EmitOptions {
            header: Some("generated".to_owned()),
            echo_source: true,
            comment_marker: "\"\"\"".to_owned(),
            squeeze_blank_lines: false,
        };
        let out = emit(&code("print(5+10)"), "add(5)\n", true, LineEnding::Lf, &opts);
        assert_eq!(
            out,
            "\"\"\"\ngenerated\n\"\"\"\n\"\"\"\nadd(5)\n\"\"\"\nprint(5+10)\n"
        );
    }

    #[test]
    fn squeeze_collapses_blank_runs() {
        let opts = EmitOptions {
            squeeze_blank_lines: true,
            ..bare()
        };
        let out = emit(&code("a\n\n\n\nb\n  \n\nc"), "", true, LineEnding::Lf, &opts);
        assert_eq!(out, "a\n\nb\n  \nc\n");
    }

    #[test]
    fn crlf_terminates_blocks_and_code() {
        let opts = EmitOptions {
            header: Some("gen".to_owned()),
            echo_source: false,
            ..EmitOptions::default()
        };
        let out = emit(&code("a = 1\nb = 2"), "", true, LineEnding::CrLf, &opts);
        assert_eq!(out, "'''\r\ngen\r\n'''\r\na = 1\r\nb = 2\r\n");
    }

    #[test]
    fn empty_code_has_no_trailing_newline() {
        assert_eq!(emit(&[], "", true, LineEnding::Lf, &bare()), "");
    }

    #[test]
    fn header_decodes_from_base64() {
        let encoded = BASE64.encode("héllo 'world'\n");
        assert_eq!(decode_header(&encoded).unwrap(), "héllo 'world'\n");
        let err = decode_header("***").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOption);
        let err = decode_header(&BASE64.encode([0xff, 0xfe])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidOption);
    }

    #[test]
    fn default_output_path_replaces_extension() {
        assert_eq!(default_output_path(Path::new("src/a.pyx")), PathBuf::from("src/a.py"));
        assert_eq!(default_output_path(Path::new("a.py")), PathBuf::from("a.out.py"));
        assert_eq!(default_output_path(Path::new("noext")), PathBuf::from("noext.py"));
    }

    #[test]
    fn file_target_writes_text() {
        let path = std::env::temp_dir().join(format!("pyx-emit-{}.py", std::process::id()));
        OutputTarget::File(path.clone()).write("x = 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\n");
        std::fs::remove_file(path).unwrap();
    }
}
