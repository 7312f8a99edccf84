//! Character-level helpers: whole-token scanning, bracket matching,
//! top-level comma splitting and indentation.
//!
//! Quotes (`'` and `"`, with backslash escapes) and brackets (`()`, `[]`,
//! `{}`) are treated as opaque groups; nothing here understands more of the
//! target language than that.

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

pub fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/// `true` if `s` is a non-empty identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

/// Byte ranges of every identifier token in `s`, left to right.
///
/// A token is a maximal run of identifier characters that does not start
/// with a digit, so `x1` is one token and `1e5` contains none.
pub fn identifiers(s: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut iter = s.char_indices().peekable();
    while let Some((start, c)) = iter.next() {
        if !is_ident_char(c) {
            continue;
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = iter.peek() {
            if !is_ident_char(next) {
                break;
            }
            end = i + next.len_utf8();
            iter.next();
        }
        if is_ident_start(c) {
            out.push((start, end));
        }
    }
    out
}

/// Given the byte offset of an opening `(`, return the offset of the `)`
/// that closes it, or `None` if it is not closed in `s`.
pub fn find_closing_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return if c == ')' { Some(open + i) } else { None };
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on commas at nesting depth zero, trimming each piece.
///
/// An empty (or whitespace-only) input yields no pieces; otherwise there is
/// always one more piece than top-level commas, empty pieces included.
pub fn split_top_level(s: &str) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                pieces.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(s[start..].trim());
    pieces
}

/// Number of leading space/tab characters.
pub fn indent_width(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

/// Dedent `lines` by their smallest indentation (blank lines ignored) and
/// prefix every non-blank line with `prefix`. Blank lines become empty.
pub fn reindent<S: AsRef<str>>(lines: &[S], prefix: &str) -> Vec<String> {
    let common = lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|l| !l.trim().is_empty())
        .map(indent_width)
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(AsRef::as_ref)
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, &l[common..])
            }
        })
        .collect()
}

/// Re-indent `lines` so the first non-blank line starts at `prefix`.
///
/// Later lines keep their offset from the first; a line indented less than
/// the first loses only the whitespace it has.
pub fn align_to_first<S: AsRef<str>>(lines: &[S], prefix: &str) -> Vec<String> {
    let first = lines
        .iter()
        .map(AsRef::as_ref)
        .find(|l| !l.trim().is_empty())
        .map(indent_width)
        .unwrap_or(0);
    lines
        .iter()
        .map(AsRef::as_ref)
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, &l[indent_width(l).min(first)..])
            }
        })
        .collect()
}
