//! Pass 3: definition parsing and template storage.
//!
//! `!define` and `!macro` headers are parsed here into immutable
//! [`Template`]s. The namespace registry (pass 2) drives this module while
//! it scans, so every table is complete before expansion starts.

use crate::directive::{self, Directive};
use crate::error::{ErrorKind, PyxError};
use crate::text;
use crate::unit::{Provenance, SourceLine};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineEntry {
    pub name: String,
    pub replacement: String,
    pub prov: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroEntry {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Template,
    pub prov: Provenance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
    Define(DefineEntry),
    Macro(MacroEntry),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Define(d) => &d.name,
            Definition::Macro(m) => &m.name,
        }
    }
}

/// One piece of a template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// Index into the macro's parameter list.
    Slot(usize),
}

/// A macro body: lines of literal text interleaved with parameter slots.
/// Blank body lines are stored as empty segment lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    lines: Vec<Vec<Segment>>,
}

impl Template {
    /// Compile body lines, marking every whole-token occurrence of a
    /// parameter name as a slot.
    pub fn compile<S: AsRef<str>>(lines: &[S], params: &[Param]) -> Template {
        let slots: HashMap<&str, usize> = params
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        let lines = lines
            .iter()
            .map(|l| compile_line(l.as_ref().trim_end(), &slots))
            .collect();
        Template { lines }
    }

    /// A single-line body is spliced inline at the call-site.
    pub fn is_inline(&self) -> bool {
        self.lines.len() == 1
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Fill every slot with `args[slot]`.
    pub fn render(&self, args: &[&str]) -> Vec<String> {
        self.lines
            .iter()
            .map(|segments| {
                let mut out = String::new();
                for seg in segments {
                    match seg {
                        Segment::Literal(s) => out.push_str(s),
                        Segment::Slot(i) => out.push_str(args[*i]),
                    }
                }
                out
            })
            .collect()
    }
}

fn compile_line(line: &str, slots: &HashMap<&str, usize>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end) in text::identifiers(line) {
        if let Some(&slot) = slots.get(&line[start..end]) {
            if start > cursor {
                segments.push(Segment::Literal(line[cursor..start].to_owned()));
            }
            segments.push(Segment::Slot(slot));
            cursor = end;
        }
    }
    if cursor < line.len() {
        segments.push(Segment::Literal(line[cursor..].to_owned()));
    }
    segments
}

impl MacroEntry {
    /// Bind call-site arguments to parameters, positionally.
    ///
    /// An empty argument counts as omitted, and a single trailing empty
    /// argument (from a trailing comma) is dropped. Omitted parameters fall
    /// back to their default text.
    pub fn bind<'a>(&'a self, args: &[&'a str], site: &SourceLine) -> Result<Vec<&'a str>, PyxError> {
        let mut args = args.to_vec();
        if args.len() > 1 && args.last() == Some(&"") {
            args.pop();
        }
        if args.len() > self.params.len() {
            return Err(PyxError::new(
                ErrorKind::Arity,
                &site.file,
                site.line,
                format!(
                    "macro '{}' takes at most {} argument(s), got {}",
                    self.name,
                    self.params.len(),
                    args.len()
                ),
            ));
        }
        let mut values = Vec::with_capacity(self.params.len());
        for (i, param) in self.params.iter().enumerate() {
            match (args.get(i).copied().filter(|a| !a.is_empty()), &param.default) {
                (Some(arg), _) => values.push(arg),
                (None, Some(default)) => values.push(default.as_str()),
                (None, None) => {
                    return Err(PyxError::new(
                        ErrorKind::Arity,
                        &site.file,
                        site.line,
                        format!(
                            "macro '{}' is missing required argument '{}' (declared at {}:{})",
                            self.name, param.name, self.prov.file, self.prov.line
                        ),
                    ));
                }
            }
        }
        Ok(values)
    }
}

/// Parse the definition whose header is `lines[at]`, returning it and the
/// index of the first line after its body.
pub fn parse_definition(lines: &[SourceLine], at: usize) -> Result<(Definition, usize), PyxError> {
    let header = &lines[at];
    match directive::classify(&header.text) {
        Some(Directive::Define(rest)) => Ok((Definition::Define(parse_define(rest, header)?), at + 1)),
        Some(Directive::Macro(rest)) => {
            let (entry, next) = parse_macro(rest, lines, at)?;
            Ok((Definition::Macro(entry), next))
        }
        _ => Err(PyxError::malformed(
            &header.file,
            header.line,
            "expected a !define or !macro directive",
        )),
    }
}

fn parse_define(rest: &str, header: &SourceLine) -> Result<DefineEntry, PyxError> {
    let err = |msg: String| PyxError::malformed(&header.file, header.line, msg);
    let Some((name, expr)) = rest.split_once(':') else {
        return Err(err(format!("!define '{}' is missing ':'", rest)));
    };
    let name = name.trim();
    if !text::is_identifier(name) {
        return Err(err(format!("!define name '{}' is not an identifier", name)));
    }
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(err(format!("!define '{}' has an empty replacement", name)));
    }
    Ok(DefineEntry {
        name: name.to_owned(),
        replacement: expr.to_owned(),
        prov: header.into(),
    })
}

fn parse_macro(rest: &str, lines: &[SourceLine], at: usize) -> Result<(MacroEntry, usize), PyxError> {
    let header = &lines[at];
    let err = |msg: String| PyxError::malformed(&header.file, header.line, msg);

    let name_len = rest
        .find(|c: char| !text::is_ident_char(c))
        .unwrap_or(rest.len());
    let name = &rest[..name_len];
    if !text::is_identifier(name) {
        return Err(err("!macro requires a name".to_owned()));
    }
    let after_name = &rest[name_len..];
    let open = name_len + (after_name.len() - after_name.trim_start().len());
    if !rest[open..].starts_with('(') {
        return Err(err(format!("expected '(' after macro name '{}'", name)));
    }
    let close = text::find_closing_paren(rest, open)
        .ok_or_else(|| err(format!("unbalanced parentheses in signature of macro '{}'", name)))?;
    let params = parse_params(&rest[open + 1..close], name, &err)?;

    let tail = rest[close + 1..].trim_start();
    let Some(inline) = tail.strip_prefix(':') else {
        return Err(err(format!("expected ':' after signature of macro '{}'", name)));
    };
    let inline = inline.trim();

    let (body_lines, next) = if inline.is_empty() {
        let end = body_extent(lines, at);
        let body: Vec<&str> = lines[at + 1..end].iter().map(|l| l.text.as_str()).collect();
        (text::reindent(&body, ""), end)
    } else {
        (vec![inline.to_owned()], at + 1)
    };
    if body_lines.is_empty() {
        return Err(err(format!("macro '{}' has no body", name)));
    }

    Ok((
        MacroEntry {
            name: name.to_owned(),
            body: Template::compile(&body_lines, &params),
            params,
            prov: header.into(),
        },
        next,
    ))
}

fn parse_params(
    src: &str,
    macro_name: &str,
    err: &dyn Fn(String) -> PyxError,
) -> Result<Vec<Param>, PyxError> {
    let mut params = Vec::new();
    let mut seen = HashSet::new();
    for piece in text::split_top_level(src) {
        let (name, default) = match piece.split_once('=') {
            Some((n, d)) => (n.trim(), Some(d.trim())),
            None => (piece, None),
        };
        if !text::is_identifier(name) {
            return Err(err(format!(
                "invalid parameter '{}' in macro '{}'",
                piece, macro_name
            )));
        }
        if default == Some("") {
            return Err(err(format!(
                "parameter '{}' of macro '{}' has an empty default",
                name, macro_name
            )));
        }
        if !seen.insert(name) {
            return Err(err(format!(
                "duplicate parameter '{}' in macro '{}'",
                name, macro_name
            )));
        }
        params.push(Param {
            name: name.to_owned(),
            default: default.map(str::to_owned),
        });
    }
    Ok(params)
}

/// End (exclusive) of the indented block under `lines[at]`: following lines
/// indented deeper than it, with trailing blank lines left out.
pub fn body_extent(lines: &[SourceLine], at: usize) -> usize {
    let depth = lines[at].indent;
    let mut end = at + 1;
    for (i, line) in lines.iter().enumerate().skip(at + 1) {
        if line.is_blank() {
            continue;
        }
        if line.indent <= depth {
            break;
        }
        end = i + 1;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<SourceLine> {
        src.lines()
            .enumerate()
            .map(|(i, t)| SourceLine::new("t.pyx", i as u32 + 1, t))
            .collect()
    }

    fn parse(src: &str) -> Result<(Definition, usize), PyxError> {
        parse_definition(&lines(src), 0)
    }

    fn parse_macro_entry(src: &str) -> MacroEntry {
        match parse(src).unwrap().0 {
            Definition::Macro(m) => m,
            other => panic!("expected macro, got {:?}", other),
        }
    }

    #[test]
    fn define_keeps_expression_verbatim() {
        let (def, next) = parse("!define INF: 10**18").unwrap();
        assert_eq!(next, 1);
        match def {
            Definition::Define(d) => {
                assert_eq!(d.name, "INF");
                assert_eq!(d.replacement, "10**18");
            }
            other => panic!("expected define, got {:?}", other),
        }
    }

    #[test]
    fn define_errors() {
        for src in ["!define INF 5", "!define : 5", "!define 9x: 5", "!define X:   "] {
            let err = parse(src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedDirective, "{}", src);
        }
    }

    #[test]
    fn macro_with_indented_body_and_default() {
        let src = "!macro add(a, b=10):\n    print(a+b)\nrest";
        let (def, next) = parse(src).unwrap();
        assert_eq!(next, 2);
        let Definition::Macro(m) = def else {
            panic!("expected macro");
        };
        assert_eq!(m.name, "add");
        assert_eq!(
            m.params,
            vec![
                Param { name: "a".into(), default: None },
                Param { name: "b".into(), default: Some("10".into()) },
            ]
        );
        assert!(m.body.is_inline());
        assert_eq!(m.body.render(&["5", "10"]), vec!["print(5+10)"]);
    }

    #[test]
    fn inline_body_after_colon() {
        let m = parse_macro_entry("!macro sq(x): x*x");
        assert!(m.body.is_inline());
        assert_eq!(m.body.render(&["(n+1)"]), vec!["(n+1)*(n+1)"]);
    }

    #[test]
    fn multi_line_body_is_dedented_and_keeps_inner_blank_lines() {
        let src = "!macro show(v):\n    if v:\n        print(v)\n\n    print('done')\n\nnext = 1";
        let (def, next) = parse(src).unwrap();
        assert_eq!(next, 5);
        let Definition::Macro(m) = def else {
            panic!("expected macro");
        };
        assert_eq!(m.body.line_count(), 4);
        assert_eq!(
            m.body.render(&["x"]),
            vec!["if x:", "    print(x)", "", "print('done')"]
        );
    }

    #[test]
    fn slots_match_whole_tokens_only() {
        let m = parse_macro_entry("!macro f(a): a + ab + a_1 + b.a");
        assert_eq!(m.body.render(&["Z"]), vec!["Z + ab + a_1 + b.Z"]);
    }

    #[test]
    fn defaults_may_contain_commas_in_brackets() {
        let m = parse_macro_entry("!macro f(xs=[1, 2], g=max(1, 2)): g(xs)");
        assert_eq!(m.params[0].default.as_deref(), Some("[1, 2]"));
        assert_eq!(m.params[1].default.as_deref(), Some("max(1, 2)"));
    }

    #[test]
    fn malformed_signatures() {
        for src in [
            "!macro f(a, b:\n    pass",
            "!macro f(a, a):\n    pass",
            "!macro f a:\n    pass",
            "!macro f(a)\n    pass",
            "!macro f(a, , b):\n    pass",
            "!macro f(1a):\n    pass",
            "!macro (a):\n    pass",
            "!macro f(a=):\n    pass",
            "!macro f(a):\nnot_body",
        ] {
            let err = parse(src).unwrap_err();
            assert_eq!(err.kind, ErrorKind::MalformedDirective, "{}", src);
        }
    }

    fn site() -> SourceLine {
        SourceLine::new("main.pyx", 9, "add(5)")
    }

    #[test]
    fn bind_uses_defaults_for_omitted_arguments() {
        let m = parse_macro_entry("!macro f(a, b=2, c=3): a");
        let site = site();
        assert_eq!(m.bind(&["1"], &site).unwrap(), vec!["1", "2", "3"]);
        assert_eq!(m.bind(&["1", "", "9"], &site).unwrap(), vec!["1", "2", "9"]);
        assert_eq!(m.bind(&["1", "8", ""], &site).unwrap(), vec!["1", "8", "3"]);
    }

    #[test]
    fn bind_reports_missing_required_argument() {
        let m = parse_macro_entry("!macro f(a, b): a");
        let err = m.bind(&["1"], &site()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
        assert_eq!(err.line, 9);
        assert!(err.message.contains("'b'"));
    }

    #[test]
    fn bind_reports_too_many_arguments() {
        let m = parse_macro_entry("!macro f(a): a");
        let err = m.bind(&["1", "2"], &site()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
    }

    #[test]
    fn body_extent_stops_at_dedent_and_skips_trailing_blanks() {
        let ls = lines("  head\n    a\n\n      b\n\n  tail");
        assert_eq!(body_extent(&ls, 0), 4);
        let ls = lines("head\nnext");
        assert_eq!(body_extent(&ls, 0), 1);
    }
}
