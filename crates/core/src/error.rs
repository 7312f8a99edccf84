use serde::{Deserialize, Serialize};

/// The category of a transpilation failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// `$expand` target (or the root file) does not exist.
    #[serde(rename = "MissingFileError")]
    MissingFile,
    /// `$expand` reached a file already on the inclusion stack.
    #[serde(rename = "CyclicIncludeError")]
    CyclicInclude,
    /// `$using` names a namespace that was never declared.
    #[serde(rename = "UndefinedNamespaceError")]
    UndefinedNamespace,
    /// A call-site omits a required parameter or passes too many arguments.
    #[serde(rename = "ArityError")]
    Arity,
    /// Expansion did not reach a fixpoint within the pass bound.
    #[serde(rename = "RecursionLimitError")]
    RecursionLimit,
    /// Structurally invalid directive or mismatched namespace open/close.
    #[serde(rename = "MalformedDirectiveError")]
    MalformedDirective,
    /// Reading or writing a file failed for a reason other than absence.
    #[serde(rename = "IoError")]
    Io,
    /// A caller-supplied option (header encoding, configuration) is invalid.
    #[serde(rename = "InvalidOptionError")]
    InvalidOption,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::MissingFile => "MissingFileError",
            ErrorKind::CyclicInclude => "CyclicIncludeError",
            ErrorKind::UndefinedNamespace => "UndefinedNamespaceError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::RecursionLimit => "RecursionLimitError",
            ErrorKind::MalformedDirective => "MalformedDirectiveError",
            ErrorKind::Io => "IoError",
            ErrorKind::InvalidOption => "InvalidOptionError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transpilation error, located at the file and line that caused it.
///
/// Line 0 means the error is not tied to a particular line (for example a
/// root file that cannot be opened).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[error("{loc}{kind}: {message}", loc = location(.file, .line))]
pub struct PyxError {
    pub kind: ErrorKind,
    pub file: String,
    pub line: u32,
    pub message: String,
}

fn location(file: &str, line: &u32) -> String {
    match (file.is_empty(), *line) {
        (true, _) => String::new(),
        (false, 0) => format!("{}: ", file),
        (false, n) => format!("{}:{}: ", file, n),
    }
}

impl PyxError {
    pub fn new(kind: ErrorKind, file: &str, line: u32, message: impl Into<String>) -> Self {
        PyxError {
            kind,
            file: file.to_owned(),
            line,
            message: message.into(),
        }
    }

    pub fn malformed(file: &str, line: u32, message: impl Into<String>) -> Self {
        PyxError::new(ErrorKind::MalformedDirective, file, line, message)
    }

    pub fn invalid_option(message: impl Into<String>) -> Self {
        PyxError::new(ErrorKind::InvalidOption, "", 0, message)
    }

    /// Serialize to the JSON shape used by `--output json`.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind":    self.kind.as_str(),
            "file":    self.file,
            "line":    self.line,
            "message": self.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_kind() {
        let err = PyxError::new(ErrorKind::Arity, "main.pyx", 7, "missing argument 'a'");
        assert_eq!(
            err.to_string(),
            "main.pyx:7: ArityError: missing argument 'a'"
        );
    }

    #[test]
    fn display_omits_missing_location() {
        let err = PyxError::invalid_option("comment style must not be empty");
        assert_eq!(
            err.to_string(),
            "InvalidOptionError: comment style must not be empty"
        );
        let err = PyxError::new(ErrorKind::MissingFile, "main.pyx", 0, "file not found");
        assert_eq!(err.to_string(), "main.pyx: MissingFileError: file not found");
    }

    #[test]
    fn json_uses_error_kind_names() {
        let err = PyxError::malformed("lib.pyx", 3, "unclosed namespace");
        let json = err.to_json_value();
        assert_eq!(json["kind"], "MalformedDirectiveError");
        assert_eq!(json["line"], 3);
        assert_eq!(json["file"], "lib.pyx");
    }

    #[test]
    fn serde_kind_matches_as_str() {
        let value = serde_json::to_value(ErrorKind::CyclicInclude).unwrap();
        assert_eq!(value, ErrorKind::CyclicInclude.as_str());
    }
}
