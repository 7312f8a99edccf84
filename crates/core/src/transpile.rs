//! Six-pass transpiler: Pyx -> Python source.
//!
//! Thin orchestrator; each pass lives in its own module.

use crate::error::PyxError;
use crate::pass1_include;
use crate::pass2_namespaces;
use crate::pass4_macros;
use crate::pass5_cases;
use crate::pass6_emit::{self, EmitOptions};
use crate::source::{FileSystemProvider, SourceProvider};
use std::path::Path;
use tracing::info;

/// Transpile the root file at `root` read from the filesystem.
pub fn transpile(root: &Path, opts: &EmitOptions) -> Result<String, PyxError> {
    transpile_with_provider(root, &FileSystemProvider, opts)
}

/// Transpile the root file at `root`, reading every file through `provider`.
pub fn transpile_with_provider(
    root: &Path,
    provider: &dyn SourceProvider,
    opts: &EmitOptions,
) -> Result<String, PyxError> {
    // Pass 1: flatten `$expand`
    let unit = pass1_include::load_unit_with_provider(root, provider)?;
    let original = unit.original.clone();
    let trailing_newline = unit.trailing_newline;
    let line_ending = unit.line_ending;

    // Passes 2+3: namespaces, definition tables, per-line scopes
    let scoped = pass2_namespaces::build_scopes(unit)?;

    // Pass 4: macro/define expansion
    let expanded = pass4_macros::expand(scoped)?;

    // Pass 5: `$cases`
    let code = pass5_cases::synthesize(&expanded)?;

    // Pass 6: assembly
    let text = pass6_emit::emit(&code, &original, trailing_newline, line_ending, opts);
    info!(root = %root.display(), lines = code.len(), bytes = text.len(), "transpiled");
    Ok(text)
}
