//! Directive recognition.
//!
//! A directive line starts (after indentation) with `$` or `!`, followed by
//! a known keyword. Everything after the keyword is the directive's argument
//! text, trimmed. Lines with any other keyword are ordinary code, so text
//! such as `$ price` inside a string literal passes through untouched.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `$expand PATH`
    Expand(&'a str),
    /// `$namespace NAME`
    Namespace(&'a str),
    /// A lone `$`, closing the open namespace.
    Close,
    /// `$using A, B`
    Using(&'a str),
    /// `$cases EXPR`
    Cases(&'a str),
    /// `!macro NAME(params): body?`
    Macro(&'a str),
    /// `!define NAME: expr`
    Define(&'a str),
}

/// Classify a line. Returns `None` for ordinary code.
pub fn classify(text: &str) -> Option<Directive<'_>> {
    let trimmed = text.trim_start();
    let marker = trimmed.chars().next()?;
    if marker != '$' && marker != '!' {
        return None;
    }
    let after = &trimmed[1..];
    let kw_len = after
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(after.len());
    let keyword = &after[..kw_len];
    let rest = after[kw_len..].trim();

    let directive = match (marker, keyword) {
        ('$', "") if rest.is_empty() => Directive::Close,
        ('$', "expand") => Directive::Expand(rest),
        ('$', "namespace") => Directive::Namespace(rest),
        ('$', "using") => Directive::Using(rest),
        ('$', "cases") => Directive::Cases(rest),
        ('!', "macro") => Directive::Macro(rest),
        ('!', "define") => Directive::Define(rest),
        _ => return None,
    };
    Some(directive)
}

/// Byte offset, within `text`, where the argument text of a `$cases` line
/// begins. `None` if the line is not a `$cases` directive.
pub fn cases_expr_offset(text: &str) -> Option<usize> {
    match classify(text)? {
        Directive::Cases(_) => {
            let lead = text.len() - text.trim_start().len();
            let after_kw = lead + "$cases".len();
            let pad = text[after_kw..].len() - text[after_kw..].trim_start().len();
            Some(after_kw + pad)
        }
        _ => None,
    }
}
