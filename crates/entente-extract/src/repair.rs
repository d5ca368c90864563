//! Heuristic auto-repair parser.
//!
//! A forgiving recursive-descent reader that builds a [`Value`] directly from
//! broken JSON instead of rewriting text. It accepts:
//! - single-quoted and curly-quoted strings, unquoted keys and bare words
//! - Python literals (`True`, `False`, `None`)
//! - missing or doubled commas, trailing commas, comments
//! - unterminated strings, objects and arrays (closed at end of input)
//!
//! Reading stops after the first complete value; anything after it is ignored.
//! An object member with no `:` after its key is not JSON at all, so the
//! whole read is rejected rather than guessed at.

use serde_json::{Map, Number, Value};

/// Repair and parse the first object found in `text`.
///
/// Returns `None` when the text has no `{` at all or the value found there is
/// not an object.
pub(crate) fn repair_object(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let mut reader = Reader::new(&text[start..]);
    match reader.value()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Recursion limit so adversarial nesting cannot blow the stack.
const MAX_DEPTH: usize = 128;

struct Reader {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Reader {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == '\u{feff}' || c == '\u{200b}' {
                self.pos += 1;
            } else if c == '/' && self.chars.get(self.pos + 1) == Some(&'/') {
                while self.peek().is_some_and(|c| c != '\n') {
                    self.pos += 1;
                }
            } else if c == '/' && self.chars.get(self.pos + 1) == Some(&'*') {
                self.pos += 2;
                while !self.at_end()
                    && !(self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&'/'))
                {
                    self.pos += 1;
                }
                self.pos = (self.pos + 2).min(self.chars.len());
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        if self.depth >= MAX_DEPTH {
            return None;
        }
        match self.peek()? {
            '{' => {
                self.depth += 1;
                let v = self.object();
                self.depth -= 1;
                v
            }
            '[' => {
                self.depth += 1;
                let v = self.array();
                self.depth -= 1;
                v
            }
            '"' | '\'' | '\u{201c}' | '\u{2018}' => Some(Value::String(self.string())),
            c if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => Some(self.number()),
            _ => Some(self.bare_word()),
        }
    }

    fn object(&mut self) -> Option<Value> {
        self.pos += 1; // '{'
        let mut map = Map::new();

        loop {
            self.skip_separators();
            match self.peek() {
                None => break,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(']') => {
                    // Mismatched closer: treat as the end of this object.
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }

            let before = self.pos;
            let key = self.key();
            self.skip_ws();
            match self.peek() {
                Some(':') => self.pos += 1,
                // Truncated right after a key: keep what came before.
                None => break,
                Some(_) => return None,
            }
            self.skip_ws();

            let value = match self.peek() {
                None | Some(',' | '}') => Value::Null,
                Some(_) => self.value()?,
            };
            if !key.is_empty() {
                let _ = map.insert(key, value);
            }

            if self.pos == before {
                self.pos += 1;
            }
        }
        Some(Value::Object(map))
    }

    fn array(&mut self) -> Option<Value> {
        self.pos += 1; // '['
        let mut items = Vec::new();

        loop {
            self.skip_separators();
            match self.peek() {
                None => break,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => {}
            }

            let before = self.pos;
            items.push(self.value()?);
            if self.pos == before {
                self.pos += 1;
            }
        }
        Some(Value::Array(items))
    }

    fn skip_separators(&mut self) {
        loop {
            self.skip_ws();
            if self.peek() == Some(',') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn key(&mut self) -> String {
        match self.peek() {
            Some('"' | '\'' | '\u{201c}' | '\u{2018}') => self.string(),
            _ => {
                let mut key = String::new();
                while let Some(c) = self.peek() {
                    if c == ':' || c == '}' || c == ',' || c.is_whitespace() {
                        break;
                    }
                    key.push(c);
                    self.pos += 1;
                }
                key
            }
        }
    }

    fn string(&mut self) -> String {
        let open = self.peek().unwrap_or('"');
        let close = match open {
            '\u{201c}' => '\u{201d}',
            '\u{2018}' => '\u{2019}',
            other => other,
        };
        self.pos += 1;

        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == close {
                return out;
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let Some(esc) = self.peek() else { break };
            self.pos += 1;
            match esc {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'u' => {
                    let hex: String = self.chars[self.pos..].iter().take(4).collect();
                    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                        Some(ch) if hex.len() == 4 => {
                            out.push(ch);
                            self.pos += 4;
                        }
                        _ => out.push('u'),
                    }
                }
                other => out.push(other),
            }
        }
        // Unterminated: keep what was read.
        out
    }

    fn number(&mut self) -> Value {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        let trimmed = raw.trim_start_matches('+');

        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Number(i.into());
        }
        trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::String(raw), Value::Number)
    }

    /// Literals and unquoted words, read up to the next structural delimiter.
    fn bare_word(&mut self) -> Value {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '}' | ']' | ':' | '\n') {
                break;
            }
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.trim() {
            "true" | "True" => Value::Bool(true),
            "false" | "False" => Value::Bool(false),
            "null" | "None" | "undefined" => Value::Null,
            other => Value::String(other.to_string()),
        }
    }
}
