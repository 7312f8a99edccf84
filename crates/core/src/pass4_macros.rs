//! Pass 4: macro and define expansion to a fixpoint.
//!
//! Each pass scans every unsettled line left to right once, rewriting
//! call-sites and whole-token defines resolved in that line's scope.
//! Rewritten text is only rescanned on the next pass. A line that comes
//! through a pass unchanged is settled: its scope never changes, so it
//! would never change again.

use crate::directive;
use crate::error::{ErrorKind, PyxError};
use crate::pass2_namespaces::{ScopeId, ScopedUnit};
use crate::pass3_table::Definition;
use crate::text;
use crate::unit::SourceLine;
use tracing::{debug, trace};

/// Upper bound on whole-unit expansion passes.
pub const MAX_EXPANSION_PASSES: usize = 64;

/// Upper bound on the total size of the expanded code, in bytes.
pub const MAX_EXPANDED_BYTES: usize = 16 * 1024 * 1024;

struct Pending {
    line: SourceLine,
    scope: ScopeId,
    settled: bool,
}

enum Rewrite {
    Unchanged,
    Inline(String),
    Block(Vec<String>),
}

/// Expand every macro call-site and define in `unit`, returning plain lines.
pub fn expand(unit: ScopedUnit) -> Result<Vec<SourceLine>, PyxError> {
    let mut lines: Vec<Pending> = unit
        .lines
        .iter()
        .map(|l| Pending {
            line: l.line.clone(),
            scope: l.scope,
            settled: false,
        })
        .collect();

    let mut pass = 0;
    loop {
        pass += 1;
        let mut next = Vec::with_capacity(lines.len());
        let mut rewrites = 0usize;
        let mut last: Option<(SourceLine, &str)> = None;

        for pending in lines {
            if pending.settled {
                next.push(pending);
                continue;
            }
            let (rewrite, name) = rewrite_line(&unit, &pending.line, pending.scope)?;
            match rewrite {
                Rewrite::Unchanged => next.push(Pending {
                    settled: true,
                    ..pending
                }),
                Rewrite::Inline(text) => {
                    rewrites += 1;
                    last = name.map(|n| (pending.line.clone(), n));
                    next.push(Pending {
                        line: pending.line.with_text(text),
                        scope: pending.scope,
                        settled: false,
                    });
                }
                Rewrite::Block(block) => {
                    rewrites += 1;
                    last = name.map(|n| (pending.line.clone(), n));
                    next.extend(block.into_iter().map(|text| Pending {
                        line: pending.line.with_text(text),
                        scope: pending.scope,
                        settled: false,
                    }));
                }
            }
        }
        lines = next;

        if rewrites == 0 {
            debug!(passes = pass, lines = lines.len(), "expansion reached fixpoint");
            return Ok(lines.into_iter().map(|p| p.line).collect());
        }
        debug!(pass, rewrites, "expansion pass");

        let size: usize = lines.iter().map(|p| p.line.text.len() + 1).sum();
        if size > MAX_EXPANDED_BYTES {
            return Err(limit_error(
                last,
                format!("expanded code exceeds {} bytes", MAX_EXPANDED_BYTES),
            ));
        }
        if pass >= MAX_EXPANSION_PASSES {
            return Err(limit_error(
                last,
                format!(
                    "expansion did not converge after {} passes",
                    MAX_EXPANSION_PASSES
                ),
            ));
        }
    }
}

fn limit_error(last: Option<(SourceLine, &str)>, what: String) -> PyxError {
    match last {
        Some((line, name)) => PyxError::new(
            ErrorKind::RecursionLimit,
            &line.file,
            line.line,
            format!("{} (is '{}' defined recursively?)", what, name),
        ),
        None => PyxError::new(ErrorKind::RecursionLimit, "", 0, what),
    }
}

/// Rewrite one line. Also returns the name of the last definition applied,
/// for error reporting.
fn rewrite_line<'u>(
    unit: &'u ScopedUnit,
    line: &SourceLine,
    scope: ScopeId,
) -> Result<(Rewrite, Option<&'u str>), PyxError> {
    let src = line.text.as_str();
    // In a `$cases` line only the count expression is code.
    let cases_from = directive::cases_expr_offset(src);
    let scan_from = cases_from.unwrap_or(0);

    let mut out = String::new();
    let mut cursor = 0;
    let mut applied: Option<&'u str> = None;

    for (start, end) in text::identifiers(src) {
        if start < scan_from || start < cursor {
            continue;
        }
        let Some(def) = unit.lookup(scope, &src[start..end]) else {
            continue;
        };
        match def {
            Definition::Define(d) => {
                out.push_str(&src[cursor..start]);
                out.push_str(&d.replacement);
                cursor = end;
                applied = Some(d.name.as_str());
                trace!(name = %d.name, line = line.line, "define");
            }
            Definition::Macro(m) => {
                let gap = src[end..].len() - src[end..].trim_start().len();
                let open = end + gap;
                if !src[open..].starts_with('(') {
                    continue;
                }
                let Some(close) = text::find_closing_paren(src, open) else {
                    continue;
                };
                let args = text::split_top_level(&src[open + 1..close]);
                let values = m.bind(&args, line)?;
                let rendered = m.body.render(&values);
                applied = Some(m.name.as_str());
                trace!(name = %m.name, line = line.line, "macro");

                if m.body.is_inline() {
                    out.push_str(&src[cursor..start]);
                    out.push_str(rendered[0].trim());
                    cursor = close + 1;
                } else {
                    if cases_from.is_some() {
                        return Err(PyxError::malformed(
                            &line.file,
                            line.line,
                            format!(
                                "multi-line macro '{}' cannot be used in a $cases count",
                                m.name
                            ),
                        ));
                    }
                    let block = text::align_to_first(&rendered, line.indent_str());
                    return Ok((Rewrite::Block(block), applied));
                }
            }
        }
    }

    if applied.is_none() {
        return Ok((Rewrite::Unchanged, None));
    }
    out.push_str(&src[cursor..]);
    Ok((Rewrite::Inline(out), applied))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass2_namespaces::build_scopes;
    use crate::unit::SourceUnit;

    fn run(src: &str) -> Result<Vec<String>, PyxError> {
        let unit = SourceUnit {
            lines: src
                .lines()
                .enumerate()
                .map(|(i, t)| SourceLine::new("t.pyx", i as u32 + 1, t))
                .collect(),
            original: src.to_owned(),
            trailing_newline: true,
            ..SourceUnit::default()
        };
        let lines = expand(build_scopes(unit)?)?;
        Ok(lines.into_iter().map(|l| l.text).collect())
    }

    #[test]
    fn define_replaces_whole_tokens_only() {
        let out = run("!define INF: 10**18\nx = INF\ny = INFINITY + INF_2 + INF").unwrap();
        assert_eq!(out, vec!["x = 10**18", "y = INFINITY + INF_2 + 10**18"]);
    }

    #[test]
    fn inline_macro_with_default_argument() {
        let out = run("!macro add(a, b=10):\n    print(a+b)\nadd(5)").unwrap();
        assert_eq!(out, vec!["print(5+10)"]);
    }

    #[test]
    fn inline_macro_keeps_surrounding_text() {
        let out = run("!macro sq(x): ((x)*(x))\ny = sq(a + 1) - sq (2)  # sq").unwrap();
        assert_eq!(out, vec!["y = ((a + 1)*(a + 1)) - ((2)*(2))  # sq"]);
    }

    #[test]
    fn multi_line_macro_replaces_line_at_call_indent() {
        let src = "!macro swap(a, b):\n    t = a\n    a = b\n    b = t\nif c:\n    swap(x, y[0])";
        let out = run(src).unwrap();
        assert_eq!(
            out,
            vec!["if c:", "    t = x", "    x = y[0]", "    y[0] = t"]
        );
    }

    #[test]
    fn multi_line_body_keeps_relative_offsets() {
        let src = "!macro guard(c):\n    if c:\n        return\n\n    pass\nif y:\n  guard(x)";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["if y:", "  if x:", "      return", "", "  pass"]);
    }

    #[test]
    fn first_body_line_aligns_with_call_site() {
        let src = "!macro cont(v):\n        total = (v\n    + 1)\n    done()\nif y:\n    cont(x)";
        let out = run(src).unwrap();
        assert_eq!(
            out,
            vec!["if y:", "    total = (x", "    + 1)", "    done()"]
        );
    }

    #[test]
    fn nested_calls_expand_over_several_passes() {
        let src = "!define N: 3\n!macro inc(v): v + 1\n!macro twice(v): inc(inc(v))\nx = twice(N)";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["x = 3 + 1 + 1"]);
    }

    #[test]
    fn arguments_with_top_level_commas_only() {
        let out = run("!macro first(a, b): a\nv = first(max(1, 2), 'x, y')").unwrap();
        assert_eq!(out, vec!["v = max(1, 2)"]);
    }

    #[test]
    fn unresolved_names_and_bare_macro_names_are_code() {
        let src = "!macro f(a): a\nprint(g(1))\nh = f\nf(1";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["print(g(1))", "h = f", "f(1"]);
    }

    #[test]
    fn missing_required_argument_is_arity_error() {
        let err = run("!macro f(a, b): a\n\nf(1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Arity);
        assert_eq!(err.line, 3);
    }

    #[test]
    fn self_recursive_define_hits_limit() {
        let err = run("!define X: X + 1\ny = X").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimit);
        assert!(err.message.contains("'X'"));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn mutually_recursive_macros_hit_limit() {
        let err = run("!macro a(x): b(x)\n!macro b(x): a(x)\na(1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimit);
    }

    #[test]
    fn exponential_growth_is_stopped() {
        let err = run("!macro f(x): f(x) + f(x)\nf(1)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RecursionLimit);
    }

    #[test]
    fn cases_line_expands_only_its_expression() {
        let src = "!define cases: 0\n!define T: int(input())\n$cases T\n    print(cases)";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["$cases int(input())", "    print(0)"]);
    }

    #[test]
    fn multi_line_macro_in_cases_count_is_malformed() {
        let err = run("!macro m():\n    a\n    b\n$cases m()\n    x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedDirective);
    }

    #[test]
    fn namespace_body_lines_use_their_own_later_names() {
        let src = "$namespace util\nprint(GREETING)\n!define GREETING: 'hi'\n$\n$using util";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["print('hi')"]);
    }

    #[test]
    fn expansion_depends_only_on_argument_text() {
        let src = "!macro pick(a, b): b\nx = pick(side_effect(), 2)\ny = pick(2, side_effect())";
        let out = run(src).unwrap();
        assert_eq!(out, vec!["x = 2", "y = side_effect()"]);
    }
}
