//! Lua table-literal decoder.
//!
//! Accepts the subset of Lua that the mission editor writes: nested table
//! constructors, string/number/boolean/nil literals, comments, and an optional
//! leading `name =` assignment.

use thiserror::Error;

use super::{Key, Number, Table, Value};

/// Tables nested deeper than this are rejected instead of overflowing the stack.
const MAX_DEPTH: usize = 256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// What went wrong while decoding.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: &'static str },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("invalid escape sequence \\{0}")]
    InvalidEscape(char),
    #[error("string literal is not valid UTF-8")]
    InvalidUtf8,
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("unsupported table key {0}")]
    InvalidKey(String),
    #[error("tables nested deeper than {MAX_DEPTH} levels")]
    TooDeep,
    #[error("trailing input after value")]
    TrailingInput,
}

/// A decode failure with its 1-based source position.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {kind}")]
pub struct DecodeError {
    pub line: u32,
    pub column: u32,
    pub kind: DecodeErrorKind,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Assign,
    Comma,
    Semicolon,
    Minus,
    Slash,
    Ident(String),
    Number(Number),
    /// A decimal integer literal above `i64::MAX`. Kept exact so that a
    /// leading minus can still produce `i64::MIN`.
    WideInt(u64),
    Str(String),
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::LBrace => "'{'".to_owned(),
            Self::RBrace => "'}'".to_owned(),
            Self::LBracket => "'['".to_owned(),
            Self::RBracket => "']'".to_owned(),
            Self::Assign => "'='".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Semicolon => "';'".to_owned(),
            Self::Minus => "'-'".to_owned(),
            Self::Slash => "'/'".to_owned(),
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::Number(n) => format!("number {n}"),
            Self::WideInt(n) => format!("number {n}"),
            Self::Str(_) => "string".to_owned(),
            Self::Eof => "end of input".to_owned(),
        }
    }
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    const fn new(text: &'a str) -> Self {
        Self {
            src: text.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if b & 0xC0 != 0x80 {
            // Count characters, not UTF-8 continuation bytes.
            self.column += 1;
        }
        Some(b)
    }

    const fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            line: self.line,
            column: self.column,
            kind,
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), DecodeError> {
        loop {
            match self.peek_byte() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'-') if self.peek_byte_at(1) == Some(b'-') => {
                    self.bump();
                    self.bump();
                    if let Some(level) = self.long_bracket_level() {
                        self.long_bracket_body(level, DecodeErrorKind::UnterminatedComment)?;
                    } else {
                        while let Some(b) = self.peek_byte() {
                            if b == b'\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// If the input is at `[[` or `[==[`, consume the opener and return the
    /// number of `=` signs.
    fn long_bracket_level(&mut self) -> Option<usize> {
        if self.peek_byte() != Some(b'[') {
            return None;
        }
        let mut level = 0;
        while self.peek_byte_at(1 + level) == Some(b'=') {
            level += 1;
        }
        if self.peek_byte_at(1 + level) != Some(b'[') {
            return None;
        }
        for _ in 0..level + 2 {
            self.bump();
        }
        Some(level)
    }

    /// Consume up to and including the matching `]==]`, returning the body.
    fn long_bracket_body(
        &mut self,
        level: usize,
        unterminated: DecodeErrorKind,
    ) -> Result<String, DecodeError> {
        // A newline directly after the opener is not part of the string.
        if self.peek_byte() == Some(b'\r') {
            self.bump();
        }
        if self.peek_byte() == Some(b'\n') {
            self.bump();
        }
        let start = self.pos;
        loop {
            match self.peek_byte() {
                None => return Err(self.error(unterminated)),
                Some(b']') => {
                    let closes = (1..=level).all(|i| self.peek_byte_at(i) == Some(b'='))
                        && self.peek_byte_at(level + 1) == Some(b']');
                    if closes {
                        let src = self.src;
                        let body = &src[start..self.pos];
                        for _ in 0..level + 2 {
                            self.bump();
                        }
                        return String::from_utf8(body.to_vec())
                            .map_err(|_| self.error(DecodeErrorKind::InvalidUtf8));
                    }
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn next_token(&mut self) -> Result<(Token, u32, u32), DecodeError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let Some(b) = self.peek_byte() else {
            return Ok((Token::Eof, line, column));
        };
        let token = match b {
            b'{' => self.single(Token::LBrace),
            b'}' => self.single(Token::RBrace),
            b']' => self.single(Token::RBracket),
            b'=' => self.single(Token::Assign),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semicolon),
            b'-' => self.single(Token::Minus),
            b'/' => self.single(Token::Slash),
            b'[' => match self.long_bracket_level() {
                Some(level) => {
                    Token::Str(self.long_bracket_body(level, DecodeErrorKind::UnterminatedString)?)
                }
                None => self.single(Token::LBracket),
            },
            b'"' | b'\'' => Token::Str(self.quoted_string()?),
            b'0'..=b'9' | b'.' => self.number()?,
            b if b == b'_' || b.is_ascii_alphabetic() => Token::Ident(self.ident()),
            _ => {
                let ch = std::str::from_utf8(&self.src[self.pos..])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                return Err(self.error(DecodeErrorKind::UnexpectedChar(ch)));
            }
        };
        Ok((token, line, column))
    }

    fn single(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek_byte() {
            if b == b'_' || b.is_ascii_alphanumeric() {
                self.bump();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn number(&mut self) -> Result<Token, DecodeError> {
        let start = self.pos;
        let hex = self.peek_byte() == Some(b'0')
            && matches!(self.peek_byte_at(1), Some(b'x' | b'X'));
        if hex {
            self.bump();
            self.bump();
            while self.peek_byte().is_some_and(|b| b.is_ascii_hexdigit()) {
                self.bump();
            }
        } else {
            while let Some(b) = self.peek_byte() {
                let exponent_sign = matches!(b, b'+' | b'-')
                    && matches!(self.src.get(self.pos - 1), Some(b'e' | b'E'));
                if b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E') || exponent_sign {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        let invalid = || self.error(DecodeErrorKind::InvalidNumber(text.clone()));
        if hex {
            return i64::from_str_radix(&text[2..], 16)
                .map(|i| Token::Number(Number::Int(i)))
                .map_err(|_| invalid());
        }
        if !text.contains(['.', 'e', 'E']) {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Token::Number(Number::Int(i)));
            }
            if let Ok(wide) = text.parse::<u64>() {
                return Ok(Token::WideInt(wide));
            }
        }
        text.parse::<f64>()
            .map(|f| Token::Number(Number::Float(f)))
            .map_err(|_| invalid())
    }

    fn quoted_string(&mut self) -> Result<String, DecodeError> {
        let Some(quote) = self.bump() else {
            return Err(self.error(DecodeErrorKind::UnterminatedString));
        };
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.peek_byte().filter(|&b| b != b'\n') else {
                return Err(self.error(DecodeErrorKind::UnterminatedString));
            };
            self.bump();
            if b == quote {
                break;
            }
            if b == b'\\' {
                self.escape(&mut bytes)?;
            } else {
                bytes.push(b);
            }
        }
        String::from_utf8(bytes).map_err(|_| self.error(DecodeErrorKind::InvalidUtf8))
    }

    fn escape(&mut self, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        let Some(b) = self.bump() else {
            return Err(self.error(DecodeErrorKind::UnterminatedString));
        };
        match b {
            b'n' | b'\n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'v' => out.push(0x0B),
            b'\\' | b'"' | b'\'' => out.push(b),
            b'0'..=b'9' => {
                let mut code = u32::from(b - b'0');
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(d @ b'0'..=b'9') => {
                            self.bump();
                            code = code * 10 + u32::from(d - b'0');
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(code)
                    .map_err(|_| self.error(DecodeErrorKind::InvalidEscape(char::from(b))))?;
                out.push(byte);
            }
            other => return Err(self.error(DecodeErrorKind::InvalidEscape(char::from(other)))),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    line: u32,
    column: u32,
    lookahead: Option<(Token, u32, u32)>,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Result<Self, DecodeError> {
        let mut lexer = Lexer::new(text);
        let (current, line, column) = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            line,
            column,
            lookahead: None,
        })
    }

    fn advance(&mut self) -> Result<Token, DecodeError> {
        let (next, line, column) = match self.lookahead.take() {
            Some(t) => t,
            None => self.lexer.next_token()?,
        };
        self.line = line;
        self.column = column;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn peek_next(&mut self) -> Result<&Token, DecodeError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(self.lookahead.as_ref().map_or(&Token::Eof, |(t, _, _)| t))
    }

    const fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            line: self.line,
            column: self.column,
            kind,
        }
    }

    fn unexpected(&self, expected: &'static str) -> DecodeError {
        self.error(DecodeErrorKind::UnexpectedToken {
            found: self.current.describe(),
            expected,
        })
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), DecodeError> {
        if &self.current == token {
            self.advance()?;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        match self.current.clone() {
            Token::LBrace => self.table(depth + 1).map(Value::Table),
            Token::Str(s) => {
                self.advance()?;
                Ok(Value::String(s))
            }
            Token::Number(_) | Token::WideInt(_) | Token::Minus => self.numeric().map(Value::Number),
            Token::Ident(name) => {
                let value = match name.as_str() {
                    "nil" => Value::Nil,
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => return Err(self.unexpected("a value")),
                };
                self.advance()?;
                Ok(value)
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// A number with optional unary minus, optionally divided by another one.
    /// The division form only exists to carry `0/0` and `1/0` for non-finite
    /// floats.
    fn numeric(&mut self) -> Result<Number, DecodeError> {
        let n = self.signed_number()?;
        if self.current != Token::Slash {
            return Ok(n);
        }
        self.advance()?;
        let d = self.signed_number()?;
        Ok(Number::Float(n.as_f64() / d.as_f64()))
    }

    #[allow(clippy::cast_precision_loss)]
    fn signed_number(&mut self) -> Result<Number, DecodeError> {
        let negative = self.current == Token::Minus;
        if negative {
            self.advance()?;
        }
        let n = match self.current {
            Token::Number(n) => n,
            Token::WideInt(wide) => {
                self.advance()?;
                return Ok(if negative {
                    0_i64
                        .checked_sub_unsigned(wide)
                        .map_or(Number::Float(-(wide as f64)), Number::Int)
                } else {
                    Number::Float(wide as f64)
                });
            }
            _ => return Err(self.unexpected("a number")),
        };
        self.advance()?;
        if !negative {
            return Ok(n);
        }
        Ok(match n {
            Number::Int(i) => i.checked_neg().map_or(Number::Float(-n.as_f64()), Number::Int),
            Number::Float(f) => Number::Float(-f),
        })
    }

    fn table(&mut self, depth: usize) -> Result<Table, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(self.error(DecodeErrorKind::TooDeep));
        }
        self.expect(&Token::LBrace, "'{'")?;
        let mut table = Table::new();
        let mut positional: i64 = 0;
        loop {
            if self.current == Token::RBrace {
                self.advance()?;
                return Ok(table);
            }
            let named = matches!(self.current, Token::Ident(_))
                && *self.peek_next()? == Token::Assign;
            let (key, value) = if self.current == Token::LBracket {
                self.advance()?;
                let key = self.key(depth)?;
                self.expect(&Token::RBracket, "']'")?;
                self.expect(&Token::Assign, "'='")?;
                (key, self.value(depth)?)
            } else if named {
                let Token::Ident(name) = self.advance()? else {
                    return Err(self.unexpected("a field name"));
                };
                self.advance()?;
                (Key::Str(name), self.value(depth)?)
            } else {
                positional += 1;
                (Key::Int(positional), self.value(depth)?)
            };
            // Later duplicates win, as in Lua.
            table.insert(key, value);
            match self.current {
                Token::Comma | Token::Semicolon => {
                    self.advance()?;
                }
                Token::RBrace => {}
                _ => return Err(self.unexpected("',' or '}'")),
            }
        }
    }

    fn key(&mut self, depth: usize) -> Result<Key, DecodeError> {
        match self.value(depth)? {
            Value::String(s) => Ok(Key::Str(s)),
            Value::Number(n) => n
                .as_int()
                .map(Key::Int)
                .ok_or_else(|| self.error(DecodeErrorKind::InvalidKey(n.to_string()))),
            other => Err(self.error(DecodeErrorKind::InvalidKey(other.type_name().to_owned()))),
        }
    }

    fn finish(&self) -> Result<(), DecodeError> {
        if self.current == Token::Eof {
            Ok(())
        } else {
            Err(self.error(DecodeErrorKind::TrailingInput))
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Decode a single Lua value (usually a table constructor).
///
/// # Errors
/// Returns a [`DecodeError`] with the position of the first malformed token.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    let mut parser = Parser::new(text)?;
    let value = parser.value(0)?;
    parser.finish()?;
    Ok(value)
}

/// Decode `name = <value>` as written in mission files, or a bare value.
///
/// Returns the assigned variable name (if any) together with the value.
///
/// # Errors
/// Returns a [`DecodeError`] on malformed input.
pub fn decode_assignment(text: &str) -> Result<(Option<String>, Value), DecodeError> {
    let mut parser = Parser::new(text)?;
    let name = match parser.current.clone() {
        Token::Ident(name) if parser.peek_next()? == &Token::Assign => {
            parser.advance()?;
            parser.advance()?;
            Some(name)
        }
        _ => None,
    };
    let value = parser.value(0)?;
    parser.finish()?;
    Ok((name, value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
