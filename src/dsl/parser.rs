//! Parser for the notation language.
//!
//! A binding-power (Pratt) parser over the token stream. Expressions are
//! pushed into the [`Program`] arena as they are recognised; sub-parsers
//! return `Ok(None)` when the next token cannot start their construct, so
//! sequences (list items, section bodies, loop bodies) simply parse until
//! nothing more matches.

use super::ast::*;
use super::error::CompileError;
use super::token::{Token, TokenKind};
use crate::automation::Interpolation;

/// Binding power of prefix pitch qualifiers (`#'1`).
const QUALIFIER_BP: u8 = 20;
/// Binding power of the `$` spread prefix.
const SPREAD_BP: u8 = 10;
/// Binding power of the postfix dot run that turns a pitch into a note.
const DOTS_BP: u8 = 10;

fn infix_bp(kind: &TokenKind) -> Option<(InfixOp, u8, u8)> {
    let entry = match kind {
        TokenKind::Amp => (InfixOp::Concat, 5, 5),
        TokenKind::Tick => (InfixOp::Shift, 19, 20),
        TokenKind::Plus => (InfixOp::Add, 5, 4),
        TokenKind::Minus => (InfixOp::Sub, 5, 4),
        TokenKind::Star => (InfixOp::Mul, 7, 6),
        TokenKind::EqEq => (InfixOp::Eq, 3, 3),
        TokenKind::NotEq => (InfixOp::Ne, 3, 3),
        TokenKind::Le => (InfixOp::Le, 3, 3),
        TokenKind::Ge => (InfixOp::Ge, 3, 3),
        TokenKind::Lt => (InfixOp::Lt, 3, 3),
        TokenKind::Gt => (InfixOp::Gt, 3, 3),
        _ => return None,
    };
    Some(entry)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    program: Program,
    inside_section: bool,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            program: Program::new(),
            inside_section: false,
        }
    }

    /// Parse a whole program: a sequence of `name = expr` bindings.
    pub fn parse(mut self) -> Result<Program, CompileError> {
        while let Some(binding) = self.parse_binding()? {
            self.program.bindings.push(binding);
        }
        if !self.check(&TokenKind::Eof) {
            let t = self.peek();
            return Err(CompileError::parse(
                format!("expected a binding, got {}", t.kind.describe()),
                t.pos,
            ));
        }
        Ok(self.program)
    }

    fn parse_binding(&mut self) -> Result<Option<Binding>, CompileError> {
        let (name, pos) = match &self.peek().kind {
            TokenKind::Ident(name) => (name.clone(), self.peek().pos),
            _ => return Ok(None),
        };
        self.advance();
        self.expect(TokenKind::Assign, "after binding name")?;
        let expr = self.require_expr("after '='")?;
        Ok(Some(Binding { name, expr, pos }))
    }

    /// Comma-separated bindings, possibly empty.
    fn parse_bindings(&mut self) -> Result<Vec<Binding>, CompileError> {
        let mut bindings = Vec::new();
        let Some(first) = self.parse_binding()? else {
            return Ok(bindings);
        };
        bindings.push(first);
        while self.check(&TokenKind::Comma) {
            let comma = self.advance().pos;
            match self.parse_binding()? {
                Some(b) => bindings.push(b),
                None => return Err(CompileError::parse("expected binding after ','", comma)),
            }
        }
        Ok(bindings)
    }

    pub fn parse_expr(&mut self) -> Result<Option<ExprId>, CompileError> {
        self.parse_expr_bp(0)
    }

    fn require_expr(&mut self, context: &str) -> Result<ExprId, CompileError> {
        match self.parse_expr()? {
            Some(id) => Ok(id),
            None => {
                let t = self.peek();
                Err(CompileError::parse(
                    format!("expected expression {context}, got {}", t.kind.describe()),
                    t.pos,
                ))
            }
        }
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Option<ExprId>, CompileError> {
        let Some(mut lhs) = self.parse_prefix()? else {
            return Ok(None);
        };

        loop {
            let (kind, pos) = {
                let t = self.peek();
                (t.kind.clone(), t.pos)
            };

            if let TokenKind::Dots(dots) = kind {
                if DOTS_BP < min_bp {
                    break;
                }
                self.advance();
                lhs = self.program.push_expr(ExprKind::Note { expr: lhs, dots }, pos);
                continue;
            }

            let Some((op, lbp, rbp)) = infix_bp(&kind) else {
                break;
            };
            if lbp < min_bp {
                break;
            }
            self.advance();
            let rhs = match self.parse_expr_bp(rbp)? {
                Some(rhs) => rhs,
                None => {
                    return Err(CompileError::parse(
                        format!("expected expression after '{}'", op.symbol()),
                        pos,
                    ))
                }
            };
            lhs = self.program.push_expr(ExprKind::Infix { op, lhs, rhs }, pos);
        }

        Ok(Some(lhs))
    }

    fn parse_prefix(&mut self) -> Result<Option<ExprId>, CompileError> {
        let (kind, pos) = {
            let t = self.peek();
            (t.kind.clone(), t.pos)
        };

        let id = match kind {
            TokenKind::Qualifier(shift) => {
                self.advance();
                let operand = self.require_operand(QUALIFIER_BP, "after pitch qualifier")?;
                let amount = self.program.push_expr(ExprKind::Num(shift as i64), pos);
                self.program.push_expr(
                    ExprKind::Infix {
                        op: InfixOp::Shift,
                        lhs: amount,
                        rhs: operand,
                    },
                    pos,
                )
            }
            TokenKind::Dollar => {
                self.advance();
                let operand = self.require_operand(SPREAD_BP, "after '$'")?;
                self.program.push_expr(ExprKind::Spread(operand), pos)
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Slash => self.parse_scale()?,
            TokenKind::LBracket => self.parse_list()?,
            TokenKind::Pipe if !self.inside_section => self.parse_section()?,
            TokenKind::Int(n) => {
                self.advance();
                self.program.push_expr(ExprKind::Num(n), pos)
            }
            TokenKind::True => {
                self.advance();
                self.program.push_expr(ExprKind::Bool(true), pos)
            }
            TokenKind::False => {
                self.advance();
                self.program.push_expr(ExprKind::Bool(false), pos)
            }
            TokenKind::Void => {
                self.advance();
                self.program.push_expr(ExprKind::Void, pos)
            }
            TokenKind::Ident(name) => {
                // `name =` starts the next binding rather than continuing this expression.
                if self.peek_at(1).kind == TokenKind::Assign {
                    return Ok(None);
                }
                self.advance();
                self.program.push_expr(ExprKind::Ident(name), pos)
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.require_expr("after '('")?;
                self.expect(TokenKind::RParen, "to close '('")?;
                inner
            }
            _ => return Ok(None),
        };

        Ok(Some(id))
    }

    fn require_operand(&mut self, bp: u8, context: &str) -> Result<ExprId, CompileError> {
        match self.parse_expr_bp(bp)? {
            Some(id) => Ok(id),
            None => {
                let t = self.peek();
                Err(CompileError::parse(
                    format!("expected expression {context}, got {}", t.kind.describe()),
                    t.pos,
                ))
            }
        }
    }

    fn parse_if(&mut self) -> Result<ExprId, CompileError> {
        let pos = self.expect(TokenKind::If, "")?.pos;
        let cond = self.require_expr("after 'if'")?;
        self.expect(TokenKind::Then, "after condition")?;
        let then_branch = self.require_expr("after 'then'")?;
        self.expect(TokenKind::Else, "after 'then' branch")?;
        let else_branch = self.require_expr("after 'else'")?;
        Ok(self.program.push_expr(
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            },
            pos,
        ))
    }

    /// `for lower ~< upper loop body... end`, or `~<=` for an inclusive bound.
    fn parse_for(&mut self) -> Result<ExprId, CompileError> {
        let pos = self.expect(TokenKind::For, "")?.pos;
        let lower = self.require_expr("as lower bound after 'for'")?;
        self.expect(TokenKind::Tilde, "after lower bound")?;
        let inclusive = match self.peek().kind {
            TokenKind::Lt => false,
            TokenKind::Le => true,
            _ => {
                let t = self.peek();
                return Err(CompileError::parse(
                    format!("expected '<' or '<=' after '~', got {}", t.kind.describe()),
                    t.pos,
                ));
            }
        };
        self.advance();
        let upper = self.require_expr("as upper bound")?;
        self.expect(TokenKind::Loop, "after loop bounds")?;
        let mut body = Vec::new();
        while let Some(expr) = self.parse_expr()? {
            body.push(expr);
        }
        self.expect(TokenKind::End, "to close 'loop'")?;
        Ok(self.program.push_expr(
            ExprKind::For {
                lower,
                upper,
                inclusive,
                body,
            },
            pos,
        ))
    }

    /// `/tonic octave mode/`
    fn parse_scale(&mut self) -> Result<ExprId, CompileError> {
        let pos = self.expect(TokenKind::Slash, "")?.pos;
        let tonic = self.require_expr("for the tonic of a scale")?;
        let octave = self.require_expr("for the octave of a scale")?;
        let mode = self.require_expr("for the mode of a scale")?;
        self.expect(TokenKind::Slash, "to close scale")?;
        Ok(self
            .program
            .push_expr(ExprKind::Scale { tonic, octave, mode }, pos))
    }

    fn parse_list(&mut self) -> Result<ExprId, CompileError> {
        let pos = self.expect(TokenKind::LBracket, "")?.pos;
        let mut items = Vec::new();
        while let Some(item) = self.parse_expr()? {
            items.push(item);
        }
        self.expect(TokenKind::RBracket, "to close list")?;
        Ok(self.program.push_expr(ExprKind::List(items), pos))
    }

    /// `| vars : config : body |`. Sections do not nest.
    fn parse_section(&mut self) -> Result<ExprId, CompileError> {
        let pos = self.expect(TokenKind::Pipe, "")?.pos;
        self.inside_section = true;

        let vars = self.parse_bindings()?;
        self.expect(TokenKind::Colon, "after section variables")?;
        let config = self.parse_bindings()?;
        self.expect(TokenKind::Colon, "after section config")?;

        let mut notes = Vec::new();
        let mut labels = Vec::new();
        loop {
            if let Some(note) = self.parse_expr()? {
                notes.push(note);
            } else if self.check(&TokenKind::At) {
                labels.push(self.parse_label(notes.len())?);
            } else {
                break;
            }
        }
        self.expect(TokenKind::Pipe, "to close section")?;
        self.inside_section = false;

        let section = self.program.push_section(SectionDef {
            vars,
            config,
            notes,
            labels,
            pos,
        });
        Ok(self.program.push_expr(ExprKind::Section(section), pos))
    }

    /// `@name [volume = N]`, optionally `linear` or `zoom` before `]`.
    fn parse_label(&mut self, note_pos: usize) -> Result<LabelDef, CompileError> {
        let pos = self.expect(TokenKind::At, "")?.pos;
        let name = self.expect_ident("after '@'")?;
        self.expect(TokenKind::LBracket, "after label name")?;
        let attr_pos = self.peek().pos;
        let attr = self.expect_ident("in label")?;
        if attr != "volume" {
            return Err(CompileError::parse(
                format!("unknown label attribute `{attr}` (expected `volume`)"),
                attr_pos,
            ));
        }
        self.expect(TokenKind::Assign, "after `volume`")?;
        let volume = match self.peek().kind {
            TokenKind::Int(n) => {
                self.advance();
                n
            }
            _ => {
                let t = self.peek();
                return Err(CompileError::parse(
                    format!("expected integer volume, got {}", t.kind.describe()),
                    t.pos,
                ));
            }
        };
        let interpolation = if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            let ipos = self.peek().pos;
            self.advance();
            Interpolation::from_name(&name).ok_or_else(|| {
                CompileError::parse(format!("unknown interpolation `{name}`"), ipos)
            })?
        } else {
            Interpolation::Hold
        };
        self.expect(TokenKind::RBracket, "to close label")?;
        Ok(LabelDef {
            name,
            volume,
            interpolation,
            note_pos,
            pos,
        })
    }

    // Token helpers

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + ahead).min(last)]
    }

    fn advance(&mut self) -> &Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        &self.tokens[idx]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> Result<&Token, CompileError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            let t = self.peek();
            let context = if context.is_empty() {
                String::new()
            } else {
                format!(" {context}")
            };
            Err(CompileError::parse(
                format!(
                    "expected {}{context}, got {}",
                    kind.describe(),
                    t.kind.describe()
                ),
                t.pos,
            ))
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String, CompileError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(CompileError::parse(
                format!("expected identifier {context}, got {}", other.describe()),
                self.peek().pos,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorKind;
    use crate::dsl::lexer::Lexer;

    fn parse(src: &str) -> Result<Program, CompileError> {
        let mut lexer = Lexer::new(src);
        let tokens = lexer.tokenize()?;
        Parser::new(tokens).parse()
    }

    fn kind(prog: &Program, id: ExprId) -> &ExprKind {
        &prog.expr(id).unwrap().kind
    }

    fn main_section(prog: &Program) -> &SectionDef {
        let main = prog.binding("main").unwrap();
        match kind(prog, main.expr) {
            ExprKind::Section(s) => prog.section(*s).unwrap(),
            other => panic!("main is not a section: {other:?}"),
        }
    }

    #[test]
    fn parse_empty_program() {
        let prog = parse("").unwrap();
        assert!(prog.bindings.is_empty());
        assert!(prog.exprs.is_empty());
    }

    #[test]
    fn parse_minimal_section() {
        let prog = parse("main = | : bpm=140 : 1. 3. 5. |").unwrap();
        assert_eq!(prog.bindings.len(), 1);
        let sec = main_section(&prog);
        assert!(sec.vars.is_empty());
        assert_eq!(sec.config.len(), 1);
        assert_eq!(sec.config[0].name, "bpm");
        assert_eq!(sec.notes.len(), 3);
        for &n in &sec.notes {
            assert!(matches!(kind(&prog, n), ExprKind::Note { dots: 1, .. }));
        }
    }

    #[test]
    fn parse_vars_and_multiple_config() {
        let prog = parse("main = | x = 3, y = 5 : bpm = 90, instrument = 1 : x. y.. |").unwrap();
        let sec = main_section(&prog);
        let vars: Vec<&str> = sec.vars.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(vars, vec!["x", "y"]);
        assert_eq!(sec.config.len(), 2);
        assert!(matches!(
            kind(&prog, sec.notes[1]),
            ExprKind::Note { dots: 2, .. }
        ));
    }

    #[test]
    fn parse_multiple_bindings() {
        let prog = parse("a = | : : 1. |\nb = | : : 2. |\nmain = [a b]").unwrap();
        let names: Vec<&str> = prog.bindings.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "main"]);
        let main = prog.binding("main").unwrap();
        match kind(&prog, main.expr) {
            ExprKind::List(items) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn qualifier_desugars_to_shift() {
        let prog = parse("main = | : : #'1. |").unwrap();
        let sec = main_section(&prog);
        let ExprKind::Note { expr, .. } = kind(&prog, sec.notes[0]) else {
            panic!("expected note");
        };
        match kind(&prog, *expr) {
            ExprKind::Infix {
                op: InfixOp::Shift,
                lhs,
                rhs,
            } => {
                assert_eq!(kind(&prog, *lhs), &ExprKind::Num(1));
                assert_eq!(kind(&prog, *rhs), &ExprKind::Num(1));
            }
            other => panic!("expected shift, got {other:?}"),
        }
    }

    #[test]
    fn shift_binds_tighter_than_dots() {
        let prog = parse("main = | : : 12'[1 3 5]. |").unwrap();
        let sec = main_section(&prog);
        let ExprKind::Note { expr, .. } = kind(&prog, sec.notes[0]) else {
            panic!("expected note");
        };
        assert!(matches!(
            kind(&prog, *expr),
            ExprKind::Infix {
                op: InfixOp::Shift,
                ..
            }
        ));
    }

    #[test]
    fn arithmetic_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        let prog = parse("x = 1 + 2 * 3").unwrap();
        let b = &prog.bindings[0];
        match kind(&prog, b.expr) {
            ExprKind::Infix {
                op: InfixOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                kind(&prog, *rhs),
                ExprKind::Infix {
                    op: InfixOp::Mul,
                    ..
                }
            )),
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn parse_if_expression() {
        let prog = parse("main = | : : if 1 < 2 then 1. else 2. |").unwrap();
        let sec = main_section(&prog);
        assert_eq!(sec.notes.len(), 1);
        assert!(matches!(kind(&prog, sec.notes[0]), ExprKind::If { .. }));
    }

    #[test]
    fn parse_for_exclusive_and_inclusive() {
        let prog = parse("main = | : : for 1 ~< 4 loop 1. 2. end for 0 ~<= 1 loop 3. end |").unwrap();
        let sec = main_section(&prog);
        assert_eq!(sec.notes.len(), 2);
        match kind(&prog, sec.notes[0]) {
            ExprKind::For {
                inclusive, body, ..
            } => {
                assert!(!inclusive);
                assert_eq!(body.len(), 2);
            }
            other => panic!("expected for, got {other:?}"),
        }
        assert!(matches!(
            kind(&prog, sec.notes[1]),
            ExprKind::For {
                inclusive: true,
                ..
            }
        ));
    }

    #[test]
    fn parse_scale_literal() {
        let prog = parse("main = | : scale = /D 4 DOR/ : 1. |").unwrap();
        let sec = main_section(&prog);
        let scale = sec.config[0].expr;
        match kind(&prog, scale) {
            ExprKind::Scale { tonic, octave, mode } => {
                assert_eq!(kind(&prog, *tonic), &ExprKind::Ident("D".to_string()));
                assert_eq!(kind(&prog, *octave), &ExprKind::Num(4));
                assert_eq!(kind(&prog, *mode), &ExprKind::Ident("DOR".to_string()));
            }
            other => panic!("expected scale, got {other:?}"),
        }
    }

    #[test]
    fn parse_spread_and_chord() {
        let prog = parse("main = | : : $[1. 2.] [1 3 5]. |").unwrap();
        let sec = main_section(&prog);
        assert!(matches!(kind(&prog, sec.notes[0]), ExprKind::Spread(_)));
        assert!(matches!(kind(&prog, sec.notes[1]), ExprKind::Note { .. }));
    }

    #[test]
    fn parse_labels_record_note_position() {
        let prog =
            parse("main = | : : @a [volume = 40 linear] 1. 2. @b [volume = 100] 3. @c [volume = 10 zoom] |")
                .unwrap();
        let sec = main_section(&prog);
        assert_eq!(sec.labels.len(), 3);
        assert_eq!(sec.labels[0].note_pos, 0);
        assert_eq!(sec.labels[0].volume, 40);
        assert_eq!(sec.labels[0].interpolation, Interpolation::Linear);
        assert_eq!(sec.labels[1].note_pos, 2);
        assert_eq!(sec.labels[1].interpolation, Interpolation::Hold);
        assert_eq!(sec.labels[2].note_pos, 3);
        assert_eq!(sec.labels[2].interpolation, Interpolation::Zoom);
    }

    #[test]
    fn label_requires_volume_attribute() {
        let err = parse("main = | : : @a [pan = 3] 1. |").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.message.contains("volume"));
    }

    #[test]
    fn sections_do_not_nest() {
        // The inner '|' closes the outer section, leaving a dangling one.
        assert!(parse("main = | : : 1. | : : 2. | |").is_err());
    }

    #[test]
    fn parse_parenthesised() {
        let prog = parse("x = (1 + 2) * 3").unwrap();
        assert!(matches!(
            kind(&prog, prog.bindings[0].expr),
            ExprKind::Infix {
                op: InfixOp::Mul,
                ..
            }
        ));
    }

    #[test]
    fn parse_error_missing_close() {
        let err = parse("main = | : : 1. 2.").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParseError);
        assert!(err.message.contains("close section"));
    }

    #[test]
    fn parse_error_unexpected_token() {
        let err = parse("main = | : : 1. |\n]").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn parse_error_missing_expression() {
        let err = parse("main =").unwrap_err();
        assert!(err.message.contains("expected expression"));
    }
}
