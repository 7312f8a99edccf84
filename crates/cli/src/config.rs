//! `pyx.toml` configuration.
//!
//! Looked up from `--config`, else next to the input file. Every key is
//! optional; command-line flags override what the file says.

use pyx_core::pass6_emit::{DEFAULT_COMMENT_MARKER, DEFAULT_HEADER_TEXT};
use pyx_core::{decode_header, EmitOptions, PyxError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub(crate) const CONFIG_FILE_NAME: &str = "pyx.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PyxConfig {
    /// Emit the disclaimer header block.
    pub header: bool,
    /// Header text, plain.
    pub header_text: Option<String>,
    /// Header text, base64-encoded. Wins over `header_text`.
    pub header_b64: Option<String>,
    /// Echo the original source as a comment block.
    pub source_echo: bool,
    pub comment_style: String,
    pub squeeze_blank_lines: bool,
}

impl Default for PyxConfig {
    fn default() -> Self {
        PyxConfig {
            header: true,
            header_text: None,
            header_b64: None,
            source_echo: true,
            comment_style: DEFAULT_COMMENT_MARKER.to_owned(),
            squeeze_blank_lines: false,
        }
    }
}

/// Command-line flags that override configuration.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub no_header: bool,
    pub no_source: bool,
    pub comment_style: Option<String>,
    pub header_b64: Option<String>,
    pub squeeze_blank: bool,
}

impl PyxConfig {
    pub(crate) fn parse(text: &str, origin: &Path) -> Result<PyxConfig, PyxError> {
        toml::from_str(text).map_err(|e| {
            PyxError::invalid_option(format!("could not parse '{}': {}", origin.display(), e))
        })
    }

    /// Load the configuration that applies to `input`.
    pub(crate) fn load(explicit: Option<&Path>, input: &Path) -> Result<PyxConfig, PyxError> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_owned(),
            None => {
                let candidate = input
                    .parent()
                    .unwrap_or(Path::new("."))
                    .join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    return Ok(PyxConfig::default());
                }
                candidate
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|e| {
            PyxError::invalid_option(format!("could not read '{}': {}", path.display(), e))
        })?;
        debug!(config = %path.display(), "loaded configuration");
        PyxConfig::parse(&text, &path)
    }

    /// Merge with command-line overrides into emitter options.
    pub(crate) fn emit_options(&self, overrides: &Overrides) -> Result<EmitOptions, PyxError> {
        let header = if self.header && !overrides.no_header {
            let text = match (&overrides.header_b64, &self.header_b64, &self.header_text) {
                (Some(b64), _, _) | (None, Some(b64), _) => decode_header(b64)?,
                (None, None, Some(text)) => text.clone(),
                (None, None, None) => DEFAULT_HEADER_TEXT.to_owned(),
            };
            Some(text)
        } else {
            None
        };
        let comment_marker = overrides
            .comment_style
            .clone()
            .unwrap_or_else(|| self.comment_style.clone());
        if comment_marker.trim().is_empty() {
            return Err(PyxError::invalid_option("comment style must not be empty"));
        }
        Ok(EmitOptions {
            header,
            echo_source: self.source_echo && !overrides.no_source,
            comment_marker,
            squeeze_blank_lines: self.squeeze_blank_lines || overrides.squeeze_blank,
        })
    }
}
