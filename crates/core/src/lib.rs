#![allow(clippy::result_large_err)]
//! pyx-core: the Pyx transpiler as a library.
//!
//! Pyx is Python plus a handful of line directives (`$expand`,
//! `$namespace`, `$using`, `$cases`, `!define`, `!macro`). [`transpile()`]
//! runs the whole pipeline and returns plain Python source:
//!
//! 1. [`pass1_include`] splices `$expand` targets into one flat unit
//! 2. [`pass2_namespaces`] splits namespaces out and assigns scopes
//! 3. [`pass3_table`] parses `!define` / `!macro` into templates
//! 4. [`pass4_macros`] expands call-sites and defines to a fixpoint
//! 5. [`pass5_cases`] turns `$cases` blocks into loops
//! 6. [`pass6_emit`] adds the optional header and source echo
//!
//! All file access goes through a [`SourceProvider`], so tests and other
//! hosts can run without a filesystem.

pub mod directive;
pub mod error;
pub mod pass1_include;
pub mod pass2_namespaces;
pub mod pass3_table;
pub mod pass4_macros;
pub mod pass5_cases;
pub mod pass6_emit;
pub mod source;
pub mod text;
pub mod transpile;
pub mod unit;

// ── Convenience re-exports ────────────────────────────────────────────

pub use error::{ErrorKind, PyxError};
pub use pass2_namespaces::{Scope, ScopedUnit};
pub use pass3_table::{Definition, DefineEntry, MacroEntry, Template};
pub use pass6_emit::{decode_header, default_output_path, EmitOptions, OutputTarget};
pub use source::{FileSystemProvider, InMemoryProvider, SourceProvider};
pub use transpile::{transpile, transpile_with_provider};
pub use unit::{LineEnding, SourceLine, SourceUnit};
