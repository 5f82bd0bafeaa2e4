// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shared lexer for the SPEF and SDF readers.
//!
//! Both formats are whitespace-separated and comma-free, with `//` line and
//! `/* */` block comments. The lexer produces one token of lookahead and a
//! checkpoint stack (`push_pos`/`set_pos`/`pop_pos`) so the parsers can
//! speculatively match grammar alternatives and rewind; hierarchical-id
//! reconstruction additionally needs to know whether whitespace preceded the
//! current token, which every token records.

use compact_str::CompactString;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokKind {
    /// Decimal integer (`ival` is set).
    Int,
    /// Real number (`rval` is set).
    Real,
    /// Quoted string; `text` holds the contents without the quotes.
    QString,
    /// Identifier, possibly containing `\c` escapes (kept raw in `text`).
    Ident,
    /// Asterisk-prefixed SPEF keyword such as `*DESIGN` or `*D_NET`.
    StarKw,
    /// Single punctuation character.
    Punct,
    /// Two-character operator: `&&`, `||`, `==`, `!=`.
    Op2,
    /// Verilog-style binary constant `1'b0`/`1'b1` (also with `n` suffix);
    /// `ival` is the bit value.
    BinConst,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokKind,
    pub text: CompactString,
    pub ival: i64,
    pub rval: f64,
    pub line: u32,
    pub col: u32,
    /// True when whitespace or a comment separated this token from the
    /// previous one. Identifier assembly stops at such a boundary.
    pub ws_before: bool,
}

impl Token {
    fn eof(line: u32, col: u32) -> Self {
        Token {
            kind: TokKind::Eof,
            text: CompactString::const_new(""),
            ival: 0,
            rval: 0.0,
            line,
            col,
            ws_before: true,
        }
    }
}

#[derive(Clone)]
struct Mark {
    cur: Token,
    prev: Option<Token>,
    pos: usize,
    line: u32,
    col: u32,
}

pub struct Lexer<'a> {
    input: &'a [u8],
    /// Byte position just past the current token.
    pos: usize,
    line: u32,
    col: u32,
    cur: Token,
    prev: Option<Token>,
    marks: Vec<Mark>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lex = Lexer {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            cur: Token::eof(1, 1),
            prev: None,
            marks: Vec::new(),
        };
        lex.cur = lex.scan()?;
        Ok(lex)
    }

    pub fn cur(&self) -> &Token {
        &self.cur
    }

    pub fn sym(&self) -> TokKind {
        self.cur.kind
    }

    pub fn text(&self) -> &str {
        &self.cur.text
    }

    pub fn ival(&self) -> i64 {
        self.cur.ival
    }

    pub fn rval(&self) -> f64 {
        self.cur.rval
    }

    pub fn line(&self) -> u32 {
        self.cur.line
    }

    pub fn col(&self) -> u32 {
        self.cur.col
    }

    pub fn ws_before(&self) -> bool {
        self.cur.ws_before
    }

    pub fn prev_text(&self) -> Option<&str> {
        self.prev.as_ref().map(|t| t.text.as_str())
    }

    pub fn at_eof(&self) -> bool {
        self.cur.kind == TokKind::Eof
    }

    /// Move to the next token.
    pub fn advance(&mut self) -> Result<(), ParseError> {
        let next = self.scan()?;
        self.prev = Some(std::mem::replace(&mut self.cur, next));
        Ok(())
    }

    /// Advance iff the current token has the given kind.
    pub fn have(&mut self, kind: TokKind) -> Result<bool, ParseError> {
        if self.cur.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Advance iff the current token is the given punctuation character.
    pub fn have_punct(&mut self, c: char) -> Result<bool, ParseError> {
        if self.is_punct(c) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Case-insensitive keyword match against an identifier token.
    pub fn have_keyword(&mut self, kw: &str) -> Result<bool, ParseError> {
        if self.cur.kind == TokKind::Ident && self.cur.text.eq_ignore_ascii_case(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Case-insensitive match against an asterisk-prefixed keyword; `kw` is
    /// given without the asterisk (`have_star_kw("D_NET")`).
    pub fn have_star_kw(&mut self, kw: &str) -> Result<bool, ParseError> {
        if self.is_star_kw(kw) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn is_star_kw(&self, kw: &str) -> bool {
        self.cur.kind == TokKind::StarKw && self.cur.text[1..].eq_ignore_ascii_case(kw)
    }

    pub fn is_punct(&self, c: char) -> bool {
        self.cur.kind == TokKind::Punct && self.cur.text.chars().next() == Some(c)
    }

    pub fn is_op2(&self, op: &str) -> bool {
        self.cur.kind == TokKind::Op2 && self.cur.text == op
    }

    /// Save the current position on the checkpoint stack.
    pub fn push_pos(&mut self) {
        self.marks.push(Mark {
            cur: self.cur.clone(),
            prev: self.prev.clone(),
            pos: self.pos,
            line: self.line,
            col: self.col,
        });
    }

    /// Rewind to the most recent checkpoint without discarding it.
    pub fn set_pos(&mut self) {
        let m = self.marks.last().expect("set_pos without push_pos").clone();
        self.cur = m.cur;
        self.prev = m.prev;
        self.pos = m.pos;
        self.line = m.line;
        self.col = m.col;
    }

    /// Discard the most recent checkpoint.
    pub fn pop_pos(&mut self) {
        self.marks.pop().expect("pop_pos without push_pos");
    }

    /// Consume tokens until the parenthesis depth returns to zero, consuming
    /// the final `)`. `depth` is the number of already-open parentheses.
    pub fn skip_balanced(&mut self, mut depth: u32) -> Result<(), ParseError> {
        while depth > 0 {
            match self.cur.kind {
                TokKind::Eof => {
                    return Err(ParseError::Lexical {
                        msg: "unexpected end of file inside parenthesized block".into(),
                        line: self.cur.line,
                        col: self.cur.col,
                    });
                }
                TokKind::Punct if self.cur.text == "(" => depth += 1,
                TokKind::Punct if self.cur.text == ")" => depth -= 1,
                _ => {}
            }
            self.advance()?;
        }
        Ok(())
    }

    fn peek_byte(&self, off: usize) -> Option<u8> {
        self.input.get(self.pos + off).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.input.get(self.pos).copied()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(b)
    }

    /// Skip whitespace and comments, returning true if anything was skipped.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut skipped = false;
        loop {
            match self.peek_byte(0) {
                Some(b) if b.is_ascii_whitespace() => {
                    self.bump();
                    skipped = true;
                }
                Some(b'/') if self.peek_byte(1) == Some(b'/') => {
                    while let Some(b) = self.peek_byte(0) {
                        if b == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                    skipped = true;
                }
                Some(b'/') if self.peek_byte(1) == Some(b'*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek_byte(0) {
                            Some(b'*') if self.peek_byte(1) == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ParseError::Lexical {
                                    msg: "unterminated block comment".into(),
                                    line,
                                    col,
                                });
                            }
                        }
                    }
                    skipped = true;
                }
                _ => return Ok(skipped),
            }
        }
    }

    fn scan(&mut self) -> Result<Token, ParseError> {
        let ws = self.skip_trivia()?;
        let (line, col) = (self.line, self.col);
        let start = self.pos;

        let b = match self.peek_byte(0) {
            None => return Ok(Token::eof(line, col)),
            Some(b) => b,
        };

        let mk = |kind: TokKind, text: CompactString, ival: i64, rval: f64| Token {
            kind,
            text,
            ival,
            rval,
            line,
            col,
            ws_before: ws,
        };

        // Quoted string.
        if b == b'"' {
            self.bump();
            let body_start = self.pos;
            loop {
                match self.peek_byte(0) {
                    Some(b'"') => break,
                    Some(_) => {
                        self.bump();
                    }
                    None => {
                        return Err(ParseError::Lexical {
                            msg: "unterminated string".into(),
                            line,
                            col,
                        });
                    }
                }
            }
            let text = text_of(self.input, body_start, self.pos);
            self.bump(); // closing quote
            return Ok(mk(TokKind::QString, text, 0, 0.0));
        }

        // Number, possibly signed. A sign only starts a number when a digit
        // or decimal point follows immediately.
        let signed_number = (b == b'-' || b == b'+')
            && matches!(self.peek_byte(1), Some(c) if c.is_ascii_digit() || c == b'.');
        if b.is_ascii_digit() || signed_number {
            return self.scan_number(start, line, col, ws);
        }

        // Identifier: letter, underscore, or an escaped punctuation char.
        if b.is_ascii_alphabetic() || b == b'_' || self.at_escape() {
            while let Some(c) = self.peek_byte(0) {
                if c.is_ascii_alphanumeric() || c == b'_' {
                    self.bump();
                } else if self.at_escape() {
                    self.bump();
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(mk(
                TokKind::Ident,
                text_of(self.input, start, self.pos),
                0,
                0.0,
            ));
        }

        // Asterisk-prefixed keyword: `*` immediately followed by a letter.
        if b == b'*' && matches!(self.peek_byte(1), Some(c) if c.is_ascii_alphabetic()) {
            self.bump();
            while let Some(c) = self.peek_byte(0) {
                if c.is_ascii_alphanumeric() || c == b'_' {
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(mk(
                TokKind::StarKw,
                text_of(self.input, start, self.pos),
                0,
                0.0,
            ));
        }

        // Two-character operators used by SDF conditional expressions.
        if matches!(b, b'&' | b'|' | b'=' | b'!') && self.peek_byte(1) == Some(match b {
            b'&' => b'&',
            b'|' => b'|',
            _ => b'=',
        }) {
            self.bump();
            self.bump();
            return Ok(mk(
                TokKind::Op2,
                text_of(self.input, start, self.pos),
                0,
                0.0,
            ));
        }

        // Anything else is single-character punctuation.
        self.bump();
        Ok(mk(
            TokKind::Punct,
            text_of(self.input, start, self.pos),
            0,
            0.0,
        ))
    }

    /// True when the next two bytes form a `\c` identifier escape.
    fn at_escape(&self) -> bool {
        self.peek_byte(0) == Some(b'\\')
            && matches!(self.peek_byte(1), Some(c) if c.is_ascii_punctuation())
    }

    fn scan_number(
        &mut self,
        start: usize,
        line: u32,
        col: u32,
        ws: bool,
    ) -> Result<Token, ParseError> {
        if matches!(self.peek_byte(0), Some(b'-' | b'+')) {
            self.bump();
        }
        let mut is_real = false;
        while matches!(self.peek_byte(0), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_byte(0) == Some(b'.')
            && matches!(self.peek_byte(1), Some(c) if c.is_ascii_digit())
        {
            is_real = true;
            self.bump();
            while matches!(self.peek_byte(0), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        // Exponent only counts when digits follow, otherwise `1e` is the
        // integer 1 and an identifier.
        if matches!(self.peek_byte(0), Some(b'e' | b'E')) {
            let after_sign = match self.peek_byte(1) {
                Some(b'-' | b'+') => 2,
                _ => 1,
            };
            if matches!(self.peek_byte(after_sign), Some(c) if c.is_ascii_digit()) {
                is_real = true;
                self.bump();
                if matches!(self.peek_byte(0), Some(b'-' | b'+')) {
                    self.bump();
                }
                while matches!(self.peek_byte(0), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }

        // Verilog binary constant: digits immediately followed by 'b0/'b1.
        if !is_real && self.peek_byte(0) == Some(b'\'') && self.peek_byte(1) == Some(b'b') {
            if let Some(bit @ (b'0' | b'1')) = self.peek_byte(2) {
                self.bump();
                self.bump();
                self.bump();
                if self.peek_byte(0) == Some(b'n') {
                    self.bump();
                }
                return Ok(Token {
                    kind: TokKind::BinConst,
                    text: text_of(self.input, start, self.pos),
                    ival: (bit == b'1') as i64,
                    rval: 0.0,
                    line,
                    col,
                    ws_before: ws,
                });
            }
        }

        let text = text_of(self.input, start, self.pos);
        if is_real {
            let rval: f64 = text.parse().map_err(|_| ParseError::Lexical {
                msg: format!("malformed number `{}`", text),
                line,
                col,
            })?;
            Ok(Token {
                kind: TokKind::Real,
                text,
                ival: 0,
                rval,
                line,
                col,
                ws_before: ws,
            })
        } else {
            let ival: i64 = text.parse().map_err(|_| ParseError::Lexical {
                msg: format!("malformed number `{}`", text),
                line,
                col,
            })?;
            Ok(Token {
                kind: TokKind::Int,
                text,
                ival,
                rval: ival as f64,
                line,
                col,
                ws_before: ws,
            })
        }
    }
}

fn text_of(input: &[u8], start: usize, end: usize) -> CompactString {
    CompactString::from(std::str::from_utf8(&input[start..end]).unwrap_or(""))
}
