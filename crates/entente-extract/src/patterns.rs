//! Span locators for the wrapping conventions models use around JSON.

use std::sync::LazyLock;

use regex::Regex;

/// How a pattern finds its span.
enum Locator {
    /// Capture group 1 of a regex. `rewrap` marks the inside of `{{ ... }}`,
    /// which needs its braces back.
    Regex { regex: Regex, rewrap: bool },
    /// The brace-balanced object starting at the first `{`.
    Balanced,
}

/// One wrapping convention and how to pull the candidate span out of it.
pub struct SpanPattern {
    /// Reported in debug logs when this pattern yields a parse.
    pub name: &'static str,
    locator: Locator,
}

impl SpanPattern {
    fn regex(name: &'static str, pattern: &str, rewrap: bool) -> Self {
        Self {
            name,
            locator: Locator::Regex {
                regex: Regex::new(pattern).unwrap(),
                rewrap,
            },
        }
    }

    /// The candidate span of the first match in `text`, if any.
    pub fn capture(&self, text: &str) -> Option<String> {
        match &self.locator {
            Locator::Regex { regex, rewrap } => {
                let inner = regex.captures(text)?.get(1)?.as_str().trim();
                if *rewrap && !inner.starts_with('{') {
                    Some(format!("{{{inner}}}"))
                } else {
                    Some(inner.to_string())
                }
            }
            Locator::Balanced => balanced_object(text)
                .or_else(|| outer_braces(text))
                .map(str::to_string),
        }
    }
}

/// Patterns in the order they are tried.
pub static SPAN_PATTERNS: LazyLock<Vec<SpanPattern>> = LazyLock::new(|| {
    vec![
        SpanPattern::regex("double_brace", r"(?s)\{\{(.*)\}\}", true),
        SpanPattern::regex("fenced", r"(?s)```[A-Za-z0-9_-]*\s*(.*?)\s*```", false),
        SpanPattern::regex("parsable_output", r"(?s)PARSABLE OUTPUT:\s*(\{.*\})", false),
        SpanPattern::regex("json_marker", r"(?s)JSON:\s*(\{.*\})", false),
        SpanPattern {
            name: "braces",
            locator: Locator::Balanced,
        },
        SpanPattern::regex("backtick", r"(?s)`(\{.*?\})`", false),
    ]
});

/// The object opened by the first `{`, through its matching `}`.
///
/// Braces inside double-quoted strings are not counted. `None` when the
/// object is never closed.
pub fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// First `{` through last `}` of the text, when both exist in that order.
pub fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
