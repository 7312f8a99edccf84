//! Pass 5: `$cases` loop synthesis.

use crate::directive::{self, Directive};
use crate::error::PyxError;
use crate::pass3_table::body_extent;
use crate::text;
use crate::unit::SourceLine;

/// One nesting level in generated code.
pub const INDENT_UNIT: &str = "    ";

/// Rewrite every `$cases EXPR` block.
///
/// `$cases 1` re-emits its block at the directive's indentation. Any other
/// count wraps the block in `for _ in range(EXPR):`, one level deeper than
/// the header. Nested `$cases` inside a block are rewritten first.
pub fn synthesize(lines: &[SourceLine]) -> Result<Vec<SourceLine>, PyxError> {
    let mut out = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        let header = &lines[i];
        let expr = match directive::classify(&header.text) {
            Some(Directive::Cases(expr)) => expr,
            // Only reachable through macro bodies; pass 2 rejects the rest.
            Some(other) => {
                return Err(PyxError::malformed(
                    &header.file,
                    header.line,
                    format!(
                        "macro expansion produced a {} directive; only $cases may appear in macro bodies",
                        directive_name(&other)
                    ),
                ));
            }
            None => {
                out.push(header.clone());
                i += 1;
                continue;
            }
        };
        if expr.is_empty() {
            return Err(PyxError::malformed(
                &header.file,
                header.line,
                "$cases requires a repetition count",
            ));
        }
        let end = body_extent(lines, i);
        if end == i + 1 {
            return Err(PyxError::malformed(
                &header.file,
                header.line,
                format!("$cases {} has no indented body", expr),
            ));
        }

        let block = synthesize(&lines[i + 1..end])?;
        let texts: Vec<&str> = block.iter().map(|l| l.text.as_str()).collect();
        let indent = header.indent_str();
        let rewritten = if expr == "1" {
            text::reindent(&texts, indent)
        } else {
            out.push(header.with_text(format!("{}for _ in range({}):", indent, expr)));
            text::reindent(&texts, &format!("{}{}", indent, INDENT_UNIT))
        };
        out.extend(
            block
                .iter()
                .zip(rewritten)
                .map(|(line, text)| line.with_text(text)),
        );
        i = end;
    }
    Ok(out)
}

fn directive_name(d: &Directive<'_>) -> &'static str {
    match *d {
        Directive::Expand(_) => "$expand",
        Directive::Namespace(_) => "$namespace",
        Directive::Close => "$",
        Directive::Using(_) => "$using",
        Directive::Cases(_) => "$cases",
        Directive::Macro(_) => "!macro",
        Directive::Define(_) => "!define",
    }
}
