//! Tokenizer (Component A, `spec.md` §4.A): a single forward scan over the
//! source buffer, tracking `(line, column)` per character, grounded on the
//! teacher's `PositionCountingBytesIterator` (`parser/src/cfg/sexpr.rs`) —
//! adapted here to a byte-oriented line/column count instead of an absolute
//! byte offset, since `spec.md`'s `Token` carries `(line, column)` rather
//! than a byte span.

use crate::keys::{lookup_literal_key, lookup_modifier};
use crate::model::ModFlags;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
}

impl Pos {
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Identifier(String),
    Command(String),
    Modifier(ModFlags),
    LiteralKey(u32),
    HexKeycode(u32),
    Key(char),
    LayerRef(String),
    Option(String),
    Alias(String),
    Event(String),
    Comma,
    Plus,
    Dash,
    Arrow,
    Star,
    LBracket,
    RBracket,
    LParen,
    RParen,
    LAngle,
    String(String),
    Unknown(char),
    EndOfStream,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub struct Tokenizer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: Pos,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, chars: source.char_indices().peekable(), pos: Pos::start() }
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_at(&self, byte_idx: usize) -> Option<char> {
        self.source[byte_idx..].chars().next()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while !matches!(self.peek(), Some('\n') | None) {
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_while(&mut self, mut pred: impl FnMut(char) -> bool) -> (usize, usize) {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(self.source.len());
        let mut end = start;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            end = self.chars.peek().map(|(i, c)| i + c.len_utf8()).unwrap_or(self.source.len());
            self.bump();
        }
        (start, end)
    }

    fn read_identifier_body(&mut self) -> String {
        let (start, end) = self.read_while(is_ident_continue);
        self.source[start..end].to_string()
    }

    /// `:` command body: everything to the next unescaped newline; `\`
    /// escapes the following character, including newlines. `spec.md` §4.A.
    fn read_command_body(&mut self) -> String {
        let mut body = String::new();
        loop {
            match self.peek() {
                None => break,
                Some('\\') => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        body.push(escaped);
                    }
                }
                Some('\n') => break,
                Some(_) => body.push(self.bump().unwrap()),
            }
        }
        body
    }

    fn read_string_body(&mut self) -> String {
        let mut body = String::new();
        loop {
            match self.peek() {
                None | Some('"') => break,
                Some(_) => body.push(self.bump().unwrap()),
            }
        }
        self.bump(); // closing quote, if present; unterminated strings are left to the parser
        body
    }

    fn classify_identifier(name: String) -> TokenKind {
        if name.chars().count() == 1 {
            return TokenKind::Key(name.chars().next().unwrap());
        }
        if let Some(m) = lookup_modifier(&name) {
            return TokenKind::Modifier(m);
        }
        if let Some(code) = lookup_literal_key(&name) {
            return TokenKind::LiteralKey(code);
        }
        TokenKind::Identifier(name)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let pos = self.pos;
        let Some(c) = self.peek() else {
            return Token { kind: TokenKind::EndOfStream, pos };
        };

        let kind = match c {
            '.' => {
                self.bump();
                TokenKind::Option(self.read_identifier_body())
            }
            '$' => {
                self.bump();
                TokenKind::Alias(self.read_identifier_body())
            }
            '@' => {
                self.bump();
                TokenKind::Event(self.read_identifier_body())
            }
            '|' => {
                self.bump();
                TokenKind::LayerRef(self.read_identifier_body())
            }
            ':' => {
                self.bump();
                TokenKind::Command(self.read_command_body())
            }
            '"' => {
                self.bump();
                TokenKind::String(self.read_string_body())
            }
            ',' => {
                self.bump();
                TokenKind::Comma
            }
            '+' => {
                self.bump();
                TokenKind::Plus
            }
            '*' => {
                self.bump();
                TokenKind::Star
            }
            '[' => {
                self.bump();
                TokenKind::LBracket
            }
            ']' => {
                self.bump();
                TokenKind::RBracket
            }
            '(' => {
                self.bump();
                TokenKind::LParen
            }
            ')' => {
                self.bump();
                TokenKind::RParen
            }
            '<' => {
                self.bump();
                TokenKind::LAngle
            }
            '-' => {
                let byte_idx = self.chars.peek().map(|(i, _)| *i).unwrap();
                if self.peek_at(byte_idx + 1) == Some('>') {
                    self.bump();
                    self.bump();
                    TokenKind::Arrow
                } else {
                    self.bump();
                    TokenKind::Dash
                }
            }
            '0' => {
                let byte_idx = self.chars.peek().map(|(i, _)| *i).unwrap();
                if matches!(self.peek_at(byte_idx + 1), Some('x') | Some('X')) {
                    self.bump();
                    self.bump();
                    let (start, end) = self.read_while(|c| c.is_ascii_hexdigit());
                    match u32::from_str_radix(&self.source[start..end], 16) {
                        Ok(v) => TokenKind::HexKeycode(v),
                        Err(_) => TokenKind::Unknown('0'),
                    }
                } else if is_ident_start(c) || c.is_ascii_digit() {
                    Self::classify_identifier(self.read_identifier_body())
                } else {
                    self.bump();
                    TokenKind::Unknown(c)
                }
            }
            _ if is_ident_start(c) => Self::classify_identifier(self.read_identifier_body()),
            _ => {
                self.bump();
                TokenKind::Unknown(c)
            }
        };
        Token { kind, pos }
    }

    pub fn tokenize_all(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let done = tok.kind == TokenKind::EndOfStream;
            tokens.push(tok);
            if done {
                break;
            }
        }
        tokens
    }
}
