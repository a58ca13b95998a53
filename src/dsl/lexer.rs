//! Lexer for the notation language.
//!
//! Converts source text into a stream of [`Token`]s terminated by `Eof`.

use super::ast::Pos;
use super::error::CompileError;
use super::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    offset: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            offset: 0,
            line: 1,
            col: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_trivia();

            if self.is_at_end() {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    pos: self.here(),
                });
                break;
            }

            let ch = self.peek();
            let token = match ch {
                '.' => self.lex_dots()?,
                '=' | '!' | '<' | '>' => self.lex_comparison()?,
                'o' | 's' | '#' | 'b' => self.lex_qualifier()?,
                '0'..='9' => self.lex_number()?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_ident_or_keyword(),
                ',' => self.single_char(TokenKind::Comma),
                ':' => self.single_char(TokenKind::Colon),
                '[' => self.single_char(TokenKind::LBracket),
                ']' => self.single_char(TokenKind::RBracket),
                '/' => self.single_char(TokenKind::Slash),
                '|' => self.single_char(TokenKind::Pipe),
                '&' => self.single_char(TokenKind::Amp),
                '+' => self.single_char(TokenKind::Plus),
                '-' => self.single_char(TokenKind::Minus),
                '*' => self.single_char(TokenKind::Star),
                '(' => self.single_char(TokenKind::LParen),
                ')' => self.single_char(TokenKind::RParen),
                '\'' => self.single_char(TokenKind::Tick),
                '~' => self.single_char(TokenKind::Tilde),
                '$' => self.single_char(TokenKind::Dollar),
                '@' => self.single_char(TokenKind::At),
                _ => {
                    return Err(CompileError::lex(
                        format!("unexpected character: '{ch}'"),
                        self.here(),
                    ));
                }
            };

            tokens.push(token);
        }

        Ok(tokens)
    }

    fn here(&self) -> Pos {
        Pos {
            offset: self.offset,
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> char {
        self.chars[self.pos]
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.chars[self.pos];
        self.pos += 1;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        ch
    }

    /// Move back to a previously saved position on the current line.
    fn rewind(&mut self, to: usize, at: Pos) {
        self.pos = to;
        self.offset = at.offset;
        self.line = at.line;
        self.col = at.col;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_trivia(&mut self) {
        while !self.is_at_end() {
            let ch = self.peek();
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                while !self.is_at_end() && self.peek() != '\n' {
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn single_char(&mut self, kind: TokenKind) -> Token {
        let pos = self.here();
        self.advance();
        Token { kind, pos }
    }

    fn lex_dots(&mut self) -> Result<Token, CompileError> {
        let pos = self.here();
        let mut count = 0u32;
        while !self.is_at_end() && self.peek() == '.' {
            self.advance();
            count += 1;
        }
        if !self.is_at_end() && self.peek().is_alphanumeric() {
            return Err(CompileError::lex(
                format!("invalid character '{}' after dots", self.peek()),
                self.here(),
            ));
        }
        Ok(Token {
            kind: TokenKind::Dots(count),
            pos,
        })
    }

    fn lex_comparison(&mut self) -> Result<Token, CompileError> {
        let pos = self.here();
        let first = self.advance();
        let doubled = !self.is_at_end() && self.peek() == '=';
        if doubled {
            self.advance();
        }
        let kind = match (first, doubled) {
            ('=', true) => TokenKind::EqEq,
            ('!', true) => TokenKind::NotEq,
            ('<', true) => TokenKind::Le,
            ('>', true) => TokenKind::Ge,
            ('=', false) => TokenKind::Assign,
            ('<', false) => TokenKind::Lt,
            ('>', false) => TokenKind::Gt,
            _ => return Err(CompileError::lex("expected '=' after '!'", pos)),
        };
        Ok(Token { kind, pos })
    }

    /// A run of `o`, `s`, `#` and `b` closed by `'`.
    ///
    /// Without a closing `'` the run is an identifier (`bass`, `s`), unless
    /// it contains `#`, which no identifier can.
    fn lex_qualifier(&mut self) -> Result<Token, CompileError> {
        let start = self.pos;
        let pos = self.here();
        let mut shift = 0i32;
        let mut sharp_seen = false;

        while !self.is_at_end() {
            match self.peek() {
                'o' => shift += 12,
                's' => shift -= 12,
                '#' => {
                    shift += 1;
                    sharp_seen = true;
                }
                'b' => shift -= 1,
                '\'' => {
                    self.advance();
                    return Ok(Token {
                        kind: TokenKind::Qualifier(shift),
                        pos,
                    });
                }
                other => {
                    if sharp_seen {
                        return Err(CompileError::lex(
                            format!("invalid character '{other}' in pitch qualifier"),
                            self.here(),
                        ));
                    }
                    self.rewind(start, pos);
                    return Ok(self.lex_ident_or_keyword());
                }
            }
            self.advance();
        }

        if sharp_seen {
            return Err(CompileError::lex(
                "unterminated pitch qualifier (expected ')",
                pos,
            ));
        }
        self.rewind(start, pos);
        Ok(self.lex_ident_or_keyword())
    }

    fn lex_number(&mut self) -> Result<Token, CompileError> {
        let pos = self.here();
        let mut s = String::new();

        while !self.is_at_end() && self.peek().is_ascii_digit() {
            s.push(self.advance());
        }
        if !self.is_at_end() && (self.peek().is_alphabetic() || self.peek() == '_') {
            return Err(CompileError::lex(
                format!("invalid character '{}' in integer", self.peek()),
                self.here(),
            ));
        }

        let val: i64 = s
            .parse()
            .map_err(|_| CompileError::lex(format!("integer literal too large: {s}"), pos))?;
        Ok(Token {
            kind: TokenKind::Int(val),
            pos,
        })
    }

    fn lex_ident_or_keyword(&mut self) -> Token {
        let pos = self.here();
        let mut s = String::new();

        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            s.push(self.advance());
        }

        let kind = match s.as_str() {
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "loop" => TokenKind::Loop,
            "end" => TokenKind::End,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "void" => TokenKind::Void,
            _ => TokenKind::Ident(s),
        };

        Token { kind, pos }
    }
}
