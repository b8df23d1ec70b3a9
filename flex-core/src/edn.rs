//! Minimal EDN reader and writer.
//!
//! Covers the data subset used by asset metadata files and archive
//! metadata entries: nil, booleans, numbers, strings, keywords, symbols,
//! lists, vectors, sets and maps. Tagged literals are read as their inner
//! value and `#_` discards the next form.

use std::fmt;

/// An EDN value. Maps keep their entries in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Keyword name without the leading colon
    Keyword(String),
    Symbol(String),
    List(Vec<Value>),
    Vector(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    /// Look up a keyword key in a map.
    pub fn get(&self, keyword: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find_map(|(k, v)| match k {
                Value::Keyword(name) if name == keyword => Some(v),
                _ => None,
            }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of a vector, list or set.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Vector(items) | Value::List(items) | Value::Set(items) => Some(items),
            _ => None,
        }
    }

    pub fn keyword(name: &str) -> Self {
        Value::Keyword(name.to_string())
    }
}

/// Parse failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("EDN parse error at offset {offset}: {message}")]
pub struct EdnError {
    pub message: String,
    pub offset: usize,
}

/// Parse exactly one EDN value from `src`.
pub fn parse(src: &str) -> Result<Value, EdnError> {
    let mut reader = Reader { src, pos: 0 };
    let value = reader
        .read()?
        .ok_or_else(|| reader.error("unexpected end of input"))?;
    reader.skip_ws();
    if reader.pos < src.len() {
        return Err(reader.error("trailing characters after value"));
    }
    Ok(value)
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn error(&self, message: &str) -> EdnError {
        EdnError {
            message: message.to_string(),
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

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ',' {
                self.bump();
            } else if c == ';' {
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

    /// Read the next value, or `None` at end of input.
    fn read(&mut self) -> Result<Option<Value>, EdnError> {
        self.skip_ws();
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };
        let value = match c {
            '{' => {
                self.bump();
                let items = self.read_until('}')?;
                if items.len() % 2 != 0 {
                    return Err(self.error("map literal must contain an even number of forms"));
                }
                let mut entries = Vec::with_capacity(items.len() / 2);
                let mut it = items.into_iter();
                while let (Some(k), Some(v)) = (it.next(), it.next()) {
                    entries.push((k, v));
                }
                Value::Map(entries)
            }
            '[' => {
                self.bump();
                Value::Vector(self.read_until(']')?)
            }
            '(' => {
                self.bump();
                Value::List(self.read_until(')')?)
            }
            '#' => {
                self.bump();
                match self.peek() {
                    Some('{') => {
                        self.bump();
                        Value::Set(self.read_until('}')?)
                    }
                    Some('_') => {
                        self.bump();
                        self.read_required()?;
                        return self.read();
                    }
                    _ => {
                        // Tagged literal: keep the value, drop the tag.
                        let tag = self.read_token();
                        if tag.is_empty() {
                            return Err(self.error("invalid dispatch character"));
                        }
                        self.read_required()?
                    }
                }
            }
            '"' => {
                self.bump();
                Value::String(self.read_string()?)
            }
            ':' => {
                self.bump();
                let name = self.read_token();
                if name.is_empty() {
                    return Err(self.error("empty keyword"));
                }
                Value::Keyword(name.to_string())
            }
            ')' | ']' | '}' => return Err(self.error("unexpected closing delimiter")),
            _ => {
                let start = self.pos;
                let token = self.read_token();
                if token.is_empty() {
                    return Err(self.error("unexpected character"));
                }
                self.parse_atom(token).ok_or_else(|| EdnError {
                    message: format!("invalid token `{}`", token),
                    offset: start,
                })?
            }
        };
        Ok(Some(value))
    }

    fn read_required(&mut self) -> Result<Value, EdnError> {
        self.read()?
            .ok_or_else(|| self.error("unexpected end of input"))
    }

    fn read_until(&mut self, close: char) -> Result<Vec<Value>, EdnError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.error(&format!("missing closing `{}`", close))),
                Some(c) if c == close => {
                    self.bump();
                    return Ok(items);
                }
                Some(_) => items.push(self.read_required()?),
            }
        }
    }

    fn read_string(&mut self) -> Result<String, EdnError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('"') => out.push('"'),
                    Some('\\') => out.push('\\'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => {
                        let end = self.pos + 4;
                        let code = self
                            .src
                            .get(self.pos..end)
                            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                            .and_then(char::from_u32)
                            .ok_or_else(|| self.error("invalid unicode escape"))?;
                        self.pos = end;
                        out.push(code);
                    }
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn read_token(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';') {
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn parse_atom(&self, token: &str) -> Option<Value> {
        match token {
            "nil" => return Some(Value::Nil),
            "true" => return Some(Value::Bool(true)),
            "false" => return Some(Value::Bool(false)),
            _ => {}
        }
        let mut chars = token.chars();
        let first = chars.next()?;
        let numeric = first.is_ascii_digit()
            || ((first == '-' || first == '+') && chars.next().is_some_and(|c| c.is_ascii_digit()));
        if !numeric {
            return Some(Value::Symbol(token.to_string()));
        }
        let int = token.strip_suffix('N').unwrap_or(token);
        if let Ok(i) = int.parse::<i64>() {
            return Some(Value::Integer(i));
        }
        let float = token.strip_suffix('M').unwrap_or(token);
        float.parse::<f64>().ok().map(Value::Float)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write_string(f, s),
            Value::Keyword(k) => write!(f, ":{}", k),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(items) => write_seq(f, "(", items, ")"),
            Value::Vector(items) => write_seq(f, "[", items, "]"),
            Value::Set(items) => write_seq(f, "#{", items, "}"),
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Value], close: &str) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            '\n' => write!(f, "\\n")?,
            '\t' => write!(f, "\\t")?,
            '\r' => write!(f, "\\r")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => write!(f, "{}", c)?,
        }
    }
    write!(f, "\"")
}
