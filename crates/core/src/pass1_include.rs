//! Pass 1: read the root file and splice every `$expand` target in place,
//! producing one flat [`SourceUnit`].

use crate::directive::{self, Directive};
use crate::error::{ErrorKind, PyxError};
use crate::source::{FileSystemProvider, SourceProvider};
use crate::unit::{LineEnding, SourceLine, SourceUnit};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Load `root` and everything it expands, using the filesystem.
pub fn load_unit(root: &Path) -> Result<SourceUnit, PyxError> {
    load_unit_with_provider(root, &FileSystemProvider)
}

/// Load `root` and everything it expands through `provider`.
pub fn load_unit_with_provider(
    root: &Path,
    provider: &dyn SourceProvider,
) -> Result<SourceUnit, PyxError> {
    let root_name = root.to_string_lossy();
    let canon = provider
        .canonicalize(root)
        .map_err(|e| open_error(e, &root_name, 0, root))?;
    let original = provider
        .read_source(&canon)
        .map_err(|e| open_error(e, &root_name, 0, root))?;

    let mut loader = Loader {
        provider,
        stack: Vec::new(),
        stack_set: HashSet::new(),
        done: HashSet::new(),
        out: Vec::new(),
    };
    loader.splice(&canon, &root_name, &original)?;

    debug!(
        root = %root.display(),
        lines = loader.out.len(),
        files = loader.done.len(),
        "expanded includes"
    );

    Ok(SourceUnit {
        lines: loader.out,
        trailing_newline: original.ends_with('\n'),
        line_ending: LineEnding::detect(&original),
        original,
    })
}

struct Loader<'p> {
    provider: &'p dyn SourceProvider,
    /// Active inclusion chain, kept in order for error messages.
    stack: Vec<PathBuf>,
    stack_set: HashSet<PathBuf>,
    /// Files already spliced in full; a second `$expand` of one is a no-op.
    done: HashSet<PathBuf>,
    out: Vec<SourceLine>,
}

impl Loader<'_> {
    /// Append the lines of `canon` (already read into `src`) to the output,
    /// recursing into `$expand` targets.
    fn splice(&mut self, canon: &Path, display: &str, src: &str) -> Result<(), PyxError> {
        self.stack.push(canon.to_owned());
        self.stack_set.insert(canon.to_owned());
        let base_dir = canon.parent().unwrap_or(Path::new(".")).to_owned();

        for (idx, text) in src.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let Some(Directive::Expand(target)) = directive::classify(text) else {
                self.out.push(SourceLine::new(display, line_no, text));
                continue;
            };
            if target.is_empty() {
                return Err(PyxError::malformed(
                    display,
                    line_no,
                    "$expand requires a file path",
                ));
            }

            let resolved = self.provider.resolve_include(&base_dir, target);
            let canon_target = self
                .provider
                .canonicalize(&resolved)
                .map_err(|e| open_error(e, display, line_no, &resolved))?;

            if self.stack_set.contains(&canon_target) {
                let chain: Vec<String> = self
                    .stack
                    .iter()
                    .chain(std::iter::once(&canon_target))
                    .map(|p| file_label(p))
                    .collect();
                return Err(PyxError::new(
                    ErrorKind::CyclicInclude,
                    display,
                    line_no,
                    format!("include cycle detected: {}", chain.join(" \u{2192} ")),
                ));
            }
            if self.done.contains(&canon_target) {
                debug!(target = %canon_target.display(), "already expanded, skipping");
                continue;
            }

            let text = self
                .provider
                .read_source(&canon_target)
                .map_err(|e| open_error(e, display, line_no, &resolved))?;
            let target_display = resolved.to_string_lossy().into_owned();
            self.splice(&canon_target, &target_display, &text)?;
        }

        self.stack.pop();
        self.stack_set.remove(canon);
        self.done.insert(canon.to_owned());
        Ok(())
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned()
}

fn open_error(err: io::Error, file: &str, line: u32, path: &Path) -> PyxError {
    if err.kind() == io::ErrorKind::NotFound {
        PyxError::new(
            ErrorKind::MissingFile,
            file,
            line,
            format!("file not found: {}", path.display()),
        )
    } else {
        PyxError::new(
            ErrorKind::Io,
            file,
            line,
            format!("cannot read '{}': {}", path.display(), err),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryProvider;

    fn texts(unit: &SourceUnit) -> Vec<&str> {
        unit.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn splices_target_in_place_with_origin() {
        let provider = InMemoryProvider::new()
            .with_file("/w/main.pyx", "a = 1\n$expand lib/util.pyx\nb = 2\n")
            .with_file("/w/lib/util.pyx", "def f():\n    return 1\n");
        let unit = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap();
        assert_eq!(texts(&unit), vec!["a = 1", "def f():", "    return 1", "b = 2"]);
        assert_eq!(unit.lines[2].file, "/w/lib/util.pyx");
        assert_eq!(unit.lines[2].line, 2);
        assert_eq!(unit.lines[3].line, 3);
        assert!(unit.trailing_newline);
        assert!(unit.original.contains("$expand"));
    }

    #[test]
    fn nested_targets_resolve_relative_to_including_file() {
        let provider = InMemoryProvider::new()
            .with_file("/w/main.pyx", "$expand lib/a.pyx")
            .with_file("/w/lib/a.pyx", "$expand b.pyx\nA")
            .with_file("/w/lib/b.pyx", "B");
        let unit = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap();
        assert_eq!(texts(&unit), vec!["B", "A"]);
        assert!(!unit.trailing_newline);
    }

    #[test]
    fn missing_target_is_missing_file_error() {
        let provider = InMemoryProvider::new().with_file("/w/main.pyx", "x\n$expand nope.pyx\n");
        let err = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingFile);
        assert_eq!(err.line, 2);
    }

    #[test]
    fn missing_root_is_missing_file_error() {
        let provider = InMemoryProvider::new();
        let err = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingFile);
        assert_eq!(err.line, 0);
    }

    #[test]
    fn mutual_expansion_is_a_cycle() {
        let provider = InMemoryProvider::new()
            .with_file("/w/x.pyx", "$expand y.pyx")
            .with_file("/w/y.pyx", "$expand x.pyx");
        let err = load_unit_with_provider(Path::new("/w/x.pyx"), &provider).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicInclude);
        assert!(err.message.contains("x.pyx \u{2192} y.pyx \u{2192} x.pyx"));
        assert_eq!(err.file, "/w/y.pyx");
    }

    #[test]
    fn self_expansion_is_a_cycle() {
        let provider = InMemoryProvider::new().with_file("/w/x.pyx", "$expand ./x.pyx");
        let err = load_unit_with_provider(Path::new("/w/x.pyx"), &provider).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicInclude);
    }

    #[test]
    fn diamond_expands_shared_file_once() {
        let provider = InMemoryProvider::new()
            .with_file("/w/main.pyx", "$expand a.pyx\n$expand b.pyx")
            .with_file("/w/a.pyx", "$expand common.pyx\nA")
            .with_file("/w/b.pyx", "$expand common.pyx\nB")
            .with_file("/w/common.pyx", "C");
        let unit = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap();
        assert_eq!(texts(&unit), vec!["C", "A", "B"]);
    }

    #[test]
    fn expand_without_path_is_malformed() {
        let provider = InMemoryProvider::new().with_file("/w/main.pyx", "$expand   ");
        let err = load_unit_with_provider(Path::new("/w/main.pyx"), &provider).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedDirective);
    }
}
