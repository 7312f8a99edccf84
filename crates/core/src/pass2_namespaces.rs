//! Pass 2: namespace partitioning and scope assignment.
//!
//! The flat unit is split into namespaces (private definition tables plus
//! buffered body lines) and a main stream. The main stream is then walked
//! top to bottom to tag every code line with the [`Scope`] in effect at
//! that point. `$using` lines are replaced by the body lines of the
//! namespaces they activate.

use crate::directive::{self, Directive};
use crate::error::{ErrorKind, PyxError};
use crate::pass3_table::{self, Definition};
use crate::text;
use crate::unit::{Provenance, SourceLine, SourceUnit};
use std::collections::HashMap;
use tracing::debug;

/// Name of the namespace that is activated without a `$using`.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub definitions: HashMap<String, Definition>,
    pub body: Vec<SourceLine>,
    pub prov: Provenance,
}

/// Index into [`ScopedUnit::scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(pub usize);

/// What a line can see: the first `globals` global definitions, plus the
/// activated namespaces (indices into [`ScopedUnit::namespaces`]), most
/// recently activated last.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Scope {
    pub globals: usize,
    pub active: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct ScopedLine {
    pub line: SourceLine,
    pub scope: ScopeId,
}

/// Everything the expander needs: the code lines in order, each with its
/// scope, and the tables those scopes refer to.
#[derive(Debug, Clone)]
pub struct ScopedUnit {
    pub lines: Vec<ScopedLine>,
    pub scopes: Vec<Scope>,
    /// Global definitions in declaration order.
    pub globals: Vec<Definition>,
    pub namespaces: Vec<Namespace>,
}

impl ScopedUnit {
    /// Resolve `name` as seen from `scope`.
    ///
    /// Globals always win (latest visible declaration first); otherwise the
    /// most recently activated namespace that defines the name wins.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Definition> {
        let scope = &self.scopes[scope.0];
        if let Some(def) = self.globals[..scope.globals]
            .iter()
            .rev()
            .find(|d| d.name() == name)
        {
            return Some(def);
        }
        scope
            .active
            .iter()
            .rev()
            .find_map(|&ns| self.namespaces[ns].definitions.get(name))
    }
}

enum MainItem {
    Code(SourceLine),
    Global(Definition),
    Using(SourceLine, Vec<String>),
}

/// Partition `unit` into namespaces and scoped main-stream lines.
pub fn build_scopes(unit: SourceUnit) -> Result<ScopedUnit, PyxError> {
    let (namespaces, main) = partition(&unit.lines)?;
    let index: HashMap<String, usize> = namespaces
        .iter()
        .enumerate()
        .map(|(i, ns)| (ns.name.clone(), i))
        .collect();

    let mut builder = ScopeBuilder {
        out: Vec::new(),
        scopes: Vec::new(),
        current: Scope::default(),
        dirty: true,
        emitted: vec![false; namespaces.len()],
    };
    let mut globals = Vec::new();

    if let Some(&ns) = index.get(DEFAULT_NAMESPACE) {
        builder.activate(ns, &namespaces, "");
    }

    for item in main {
        match item {
            MainItem::Code(line) => builder.push(line),
            MainItem::Global(def) => {
                globals.push(def);
                builder.current.globals = globals.len();
                builder.dirty = true;
            }
            MainItem::Using(line, names) => {
                for name in names {
                    let ns = *index.get(&name).ok_or_else(|| {
                        PyxError::new(
                            ErrorKind::UndefinedNamespace,
                            &line.file,
                            line.line,
                            format!("namespace '{}' is not declared", name),
                        )
                    })?;
                    builder.activate(ns, &namespaces, line.indent_str());
                }
            }
        }
    }

    debug!(
        lines = builder.out.len(),
        scopes = builder.scopes.len(),
        globals = globals.len(),
        namespaces = namespaces.len(),
        "assigned scopes"
    );

    Ok(ScopedUnit {
        lines: builder.out,
        scopes: builder.scopes,
        globals,
        namespaces,
    })
}

struct ScopeBuilder {
    out: Vec<ScopedLine>,
    scopes: Vec<Scope>,
    current: Scope,
    /// `current` differs from the last snapshot pushed to `scopes`.
    dirty: bool,
    emitted: Vec<bool>,
}

impl ScopeBuilder {
    fn scope_id(&mut self) -> ScopeId {
        if self.dirty {
            self.scopes.push(self.current.clone());
            self.dirty = false;
        }
        ScopeId(self.scopes.len() - 1)
    }

    fn push(&mut self, line: SourceLine) {
        let scope = self.scope_id();
        self.out.push(ScopedLine { line, scope });
    }

    /// Make `ns` the most recent namespace and, the first time, emit its
    /// body re-indented to `indent` (the `$using` line's indentation).
    fn activate(&mut self, ns: usize, namespaces: &[Namespace], indent: &str) {
        self.current.active.retain(|&a| a != ns);
        self.current.active.push(ns);
        self.dirty = true;
        if !self.emitted[ns] {
            self.emitted[ns] = true;
            let body = &namespaces[ns].body;
            let texts: Vec<&str> = body.iter().map(|l| l.text.as_str()).collect();
            for (line, text) in body.iter().zip(text::reindent(&texts, indent)) {
                self.push(line.with_text(text));
            }
        }
    }
}

/// Phase A: split lines into namespaces and main-stream items.
fn partition(lines: &[SourceLine]) -> Result<(Vec<Namespace>, Vec<MainItem>), PyxError> {
    let mut namespaces: Vec<Namespace> = Vec::new();
    let mut main = Vec::new();
    let mut open: Option<Namespace> = None;

    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];
        let malformed = |msg: String| PyxError::malformed(&line.file, line.line, msg);

        match directive::classify(&line.text) {
            Some(Directive::Macro(_)) | Some(Directive::Define(_)) => {
                let (def, next) = pass3_table::parse_definition(lines, i)?;
                match open.as_mut() {
                    Some(ns) => {
                        ns.definitions.insert(def.name().to_owned(), def);
                    }
                    None => main.push(MainItem::Global(def)),
                }
                i = next;
                continue;
            }
            Some(Directive::Namespace(name)) => {
                if let Some(ns) = &open {
                    return Err(malformed(format!(
                        "namespaces do not nest: '{}' is still open (opened at {}:{})",
                        ns.name, ns.prov.file, ns.prov.line
                    )));
                }
                if !text::is_identifier(name) {
                    return Err(malformed(format!(
                        "$namespace requires a single identifier, got '{}'",
                        name
                    )));
                }
                if let Some(prev) = namespaces.iter().find(|ns| ns.name == name) {
                    return Err(malformed(format!(
                        "namespace '{}' is already declared at {}:{}",
                        name, prev.prov.file, prev.prov.line
                    )));
                }
                open = Some(Namespace {
                    name: name.to_owned(),
                    definitions: HashMap::new(),
                    body: Vec::new(),
                    prov: line.into(),
                });
            }
            Some(Directive::Close) => {
                let ns = open
                    .take()
                    .ok_or_else(|| malformed("'$' without an open namespace".to_owned()))?;
                debug!(
                    namespace = %ns.name,
                    definitions = ns.definitions.len(),
                    body = ns.body.len(),
                    "closed namespace"
                );
                namespaces.push(ns);
            }
            Some(Directive::Using(list)) => {
                if let Some(ns) = &open {
                    return Err(malformed(format!(
                        "$using is not allowed inside namespace '{}'",
                        ns.name
                    )));
                }
                let names: Vec<String> = list.split(',').map(|n| n.trim().to_owned()).collect();
                if names.iter().any(|n| n.is_empty()) {
                    return Err(malformed(format!("$using has an empty namespace name: '{}'", list)));
                }
                main.push(MainItem::Using(line.clone(), names));
            }
            // `$cases` lines are handled after expansion; `$expand` never
            // survives pass 1.
            Some(Directive::Cases(_)) | Some(Directive::Expand(_)) | None => match open.as_mut() {
                Some(ns) => ns.body.push(line.clone()),
                None => main.push(MainItem::Code(line.clone())),
            },
        }
        i += 1;
    }

    if let Some(ns) = open {
        return Err(PyxError::malformed(
            &ns.prov.file,
            ns.prov.line,
            format!("namespace '{}' is never closed with '$'", ns.name),
        ));
    }
    Ok((namespaces, main))
}
