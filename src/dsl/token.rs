//! Token types for the lexer.

use super::ast::Pos;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    If,
    Then,
    Else,
    For,
    Loop,
    End,
    True,
    False,
    Void,

    // Literals
    Ident(String),
    Int(i64),
    /// A run of `.`; the count is the note's dot-count.
    Dots(u32),
    /// A run of pitch qualifiers closed by `'`, as a semitone shift.
    Qualifier(i32),

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Le,    // <=
    Ge,    // >=
    Lt,    // <
    Gt,    // >

    // Punctuation
    Assign,
    Comma,
    Colon,
    LBracket,
    RBracket,
    Slash,
    Pipe,
    Amp,
    Plus,
    Minus,
    Star,
    LParen,
    RParen,
    Tick, // '
    Tilde,
    Dollar,
    At,

    Eof,
}

impl TokenKind {
    /// Short source-like rendering for diagnostics.
    pub fn describe(&self) -> String {
        let s = match self {
            TokenKind::If => "if",
            TokenKind::Then => "then",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::Loop => "loop",
            TokenKind::End => "end",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Void => "void",
            TokenKind::Ident(name) => return format!("identifier `{name}`"),
            TokenKind::Int(n) => return format!("integer {n}"),
            TokenKind::Dots(n) => return ".".repeat(*n as usize),
            TokenKind::Qualifier(_) => "pitch qualifier",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Assign => "=",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Slash => "/",
            TokenKind::Pipe => "|",
            TokenKind::Amp => "&",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Tick => "'",
            TokenKind::Tilde => "~",
            TokenKind::Dollar => "$",
            TokenKind::At => "@",
            TokenKind::Eof => return "end of input".to_string(),
        };
        format!("`{s}`")
    }
}
