//! Abstract syntax tree.
//!
//! Expressions and sections live in flat arenas owned by [`Program`] and
//! refer to each other through [`ExprId`] / [`SectionId`] handles.

use crate::automation::Interpolation;

/// Source position: byte offset plus 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub offset: usize,
    pub line: usize,
    pub col: usize,
}

impl Pos {
    /// Position of the first byte of the input.
    pub const START: Pos = Pos {
        offset: 0,
        line: 1,
        col: 1,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(pub u32);

impl SectionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    /// `'`: shift the right operand by the left operand's semitones.
    Shift,
    /// `&`: obsolete section concatenation, rejected by the checker.
    Concat,
    Add,
    Sub,
    Mul,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl InfixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            InfixOp::Shift => "'",
            InfixOp::Concat => "&",
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Eq => "==",
            InfixOp::Ne => "!=",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
            InfixOp::Le => "<=",
            InfixOp::Ge => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            InfixOp::Eq | InfixOp::Ne | InfixOp::Lt | InfixOp::Gt | InfixOp::Le | InfixOp::Ge
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Num(i64),
    Bool(bool),
    Void,
    Ident(String),
    /// A pitch or chord followed by a run of dots.
    Note { expr: ExprId, dots: u32 },
    List(Vec<ExprId>),
    /// `/tonic octave mode/`
    Scale {
        tonic: ExprId,
        octave: ExprId,
        mode: ExprId,
    },
    Infix {
        op: InfixOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// `$expr`: flatten a list into the surrounding sequence.
    Spread(ExprId),
    Section(SectionId),
    If {
        cond: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
    /// `for lower ~< upper loop body end`; `inclusive` for `~<=`.
    For {
        lower: ExprId,
        upper: ExprId,
        inclusive: bool,
        body: Vec<ExprId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

/// `name = expr`, at top level or inside a section header.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub expr: ExprId,
    pub pos: Pos,
}

/// `@name [volume = N linear]` inside a section body.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDef {
    pub name: String,
    pub volume: i64,
    pub interpolation: Interpolation,
    /// Number of note expressions preceding the label.
    pub note_pos: usize,
    pub pos: Pos,
}

/// `| vars : config : body |`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SectionDef {
    pub vars: Vec<Binding>,
    pub config: Vec<Binding>,
    pub notes: Vec<ExprId>,
    pub labels: Vec<LabelDef>,
    pub pos: Pos,
}

/// A complete program: arenas plus the ordered top-level bindings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub exprs: Vec<Expr>,
    pub sections: Vec<SectionDef>,
    pub bindings: Vec<Binding>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_expr(&mut self, kind: ExprKind, pos: Pos) -> ExprId {
        self.exprs.push(Expr { kind, pos });
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn push_section(&mut self, section: SectionDef) -> SectionId {
        self.sections.push(section);
        SectionId(self.sections.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> Option<&Expr> {
        self.exprs.get(id.index())
    }

    pub fn section(&self, id: SectionId) -> Option<&SectionDef> {
        self.sections.get(id.index())
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}
