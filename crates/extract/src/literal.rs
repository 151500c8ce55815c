//! Reader for Python-literal-style object notation.
//!
//! Models that drift from JSON usually drift toward Python: single-quoted strings, `True` /
//! `False` / `None`, tuples, trailing commas. This reader accepts that dialect (and plain JSON)
//! and produces a [`serde_json::Value`], so the rest of the pipeline sees one representation.

use serde_json::{Map, Number, Value};
use thiserror::Error;

const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at byte {offset}")]
pub struct LiteralError {
    pub message: String,
    pub offset: usize,
}

/// Parse a complete literal. Anything other than whitespace or comments after the value is an
/// error.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut reader = Reader { src: input, pos: 0, depth: 0 };
    let value = reader.value()?;
    reader.skip_ws();
    if reader.pos < reader.src.len() {
        return Err(reader.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            message: message.into(),
            offset: self.pos,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", want, c))),
            None => Err(self.error(format!("expected '{}', found end of input", want))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some('{') => self.nested(Self::dict),
            Some('[') => self.nested(|r| r.sequence('[', ']').map(|(items, _)| Value::Array(items))),
            Some('(') => self.nested(Self::tuple),
            Some('\'') | Some('"') => self.strings().map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.keyword(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(Value::Object(map));
            }

            let key = match self.value()? {
                Value::String(s) => s,
                Value::Null => "null".to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(self.error("unhashable dict key"));
                }
                other => other.to_string(),
            };
            self.skip_ws();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                _ => return Err(self.error("expected ',' or '}' in dict")),
            }
        }
    }

    /// `(x)` is just `x`; `(x,)` and `(x, y)` are tuples, read as arrays.
    fn tuple(&mut self) -> Result<Value, LiteralError> {
        let (mut items, trailing_comma) = self.sequence('(', ')')?;
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(Value::Array(items))
    }

    fn sequence(&mut self, open: char, close: char) -> Result<(Vec<Value>, bool), LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok((items, trailing_comma));
            }

            items.push(self.value()?);
            trailing_comma = false;

            self.skip_ws();
            match self.bump() {
                Some(',') => trailing_comma = true,
                Some(c) if c == close => return Ok((items, false)),
                _ => return Err(self.error(format!("expected ',' or '{}'", close))),
            }
        }
    }

    /// One string, or several adjacent ones concatenated (`'a' 'b'` is `'ab'`).
    fn strings(&mut self) -> Result<String, LiteralError> {
        let mut out = self.string()?;
        loop {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => out.push_str(&self.string()?),
                _ => {
                    self.pos = save;
                    return Ok(out);
                }
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => self.escape(&mut out)?,
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), LiteralError> {
        let c = self.bump().ok_or_else(|| self.error("unterminated escape"))?;
        match c {
            '\n' => {}
            '\\' | '\'' | '"' | '/' => out.push(c),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'a' => out.push('\u{07}'),
            '0' => out.push('\0'),
            'x' => out.push(self.hex_char(2)?),
            'u' => out.push(self.utf16_char()?),
            'U' => out.push(self.hex_char(8)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    fn hex_code(&mut self, digits: usize) -> Result<u32, LiteralError> {
        let end = self.pos + digits;
        let hex = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.error("truncated escape sequence"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(format!("invalid escape digits '{}'", hex)))?;
        self.pos = end;
        Ok(code)
    }

    fn hex_char(&mut self, digits: usize) -> Result<char, LiteralError> {
        let code = self.hex_code(digits)?;
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:#x}", code)))
    }

    /// `\uXXXX`, joining a high surrogate with a following `\uXXXX` low
    /// surrogate. Unpaired surrogates become U+FFFD.
    fn utf16_char(&mut self) -> Result<char, LiteralError> {
        let high = self.hex_code(4)?;
        if !(0xD800..0xDC00).contains(&high) {
            return Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER));
        }

        let resume = self.pos;
        if self.src[self.pos..].starts_with("\\u") {
            self.pos += 2;
            match self.hex_code(4) {
                Ok(low) if (0xDC00..0xE000).contains(&low) => {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return Ok(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
                }
                _ => self.pos = resume,
            }
        }
        Ok(char::REPLACEMENT_CHARACTER)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '-' || c == '+')
                && self.pos > start
                && matches!(self.src.as_bytes()[self.pos - 1], b'e' | b'E');
            if c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_') || exponent_sign
                || (self.pos == start && (c == '-' || c == '+'))
            {
                self.bump();
            } else {
                break;
            }
        }

        let token: String = self.src[start..self.pos].chars().filter(|c| *c != '_').collect();
        let token = token.strip_prefix('+').unwrap_or(&token);
        if let Ok(i) = token.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        token
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                message: format!("invalid number '{}'", token),
                offset: start,
            })
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        match &self.src[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            word => Err(LiteralError {
                message: format!("unexpected name '{}'", word),
                offset: start,
            }),
        }
    }
}
