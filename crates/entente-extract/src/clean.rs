//! Text normalization applied before and between parse attempts.
//!
//! Everything here is string-to-string and string-literal aware where it
//! matters: comment and comma removal never touch characters inside quotes.

use std::sync::LazyLock;

use regex::Regex;

/// A quoted key pushed onto its own indented line.
static NEWLINE_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\n\s+"(\w+)"\s*:"#).unwrap());

/// Field names that models most often emit on a bare new line.
static KNOWN_FIELDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\n\s*"(negotiation_summary|intent|updated_relationships|relationship_updates|updated_goals|goals|orders)""#,
    )
    .unwrap()
});

/// A single-quoted key directly after `{` or `,`.
static SINGLE_QUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([{,]\s*)'([^'"\\\n]+)'\s*:"#).unwrap());

const INVISIBLE: &[char] = &['\u{feff}', '\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}'];

/// Undo the formatting habits that break naive parsing of the raw output.
pub(crate) fn preprocess(text: &str) -> String {
    let text = NEWLINE_KEY.replace_all(text, "\n\"$1\":");
    KNOWN_FIELDS.replace_all(&text, "\n\"$1\"").into_owned()
}

/// The cleaning pass run on every candidate span before a strict parse.
pub(crate) fn clean_candidate(span: &str) -> String {
    let s = strip_invisible(span);
    let s = strip_comments(&s);
    let s = SINGLE_QUOTED_KEY.replace_all(&s, "$1\"$2\":");
    remove_trailing_commas(&s).trim().to_string()
}

/// Second-round fixes: narrow to the outermost braces, drop prose lines that
/// leaked into the object, then clean again.
pub(crate) fn surgical_repair(span: &str) -> String {
    let narrowed = match (span.find('{'), span.rfind('}')) {
        (Some(start), Some(end)) if start < end => &span[start..=end],
        _ => span,
    };
    let kept: Vec<&str> = narrowed.lines().filter(|line| !is_prose_line(line)).collect();
    clean_candidate(&preprocess(&kept.join("\n")))
}

pub(crate) fn strip_invisible(s: &str) -> String {
    s.chars().filter(|c| !INVISIBLE.contains(c)).collect()
}

/// A line with letters but none of the punctuation a JSON line carries.
fn is_prose_line(line: &str) -> bool {
    let t = line.trim().trim_end_matches(',');
    if t.is_empty() || matches!(t, "true" | "false" | "null") {
        return false;
    }
    t.starts_with(|c: char| c.is_ascii_alphabetic())
        && !t.contains(['"', '\'', ':', '{', '}', '[', ']'])
}

/// Remove `//` line comments and `/* */` block comments outside strings.
pub(crate) fn strip_comments(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, chars.get(i + 1)) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Drop commas whose next non-whitespace character closes an object or array.
pub(crate) fn remove_trailing_commas(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
            if !matches!(next, Some('}' | ']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}
