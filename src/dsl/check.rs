//! Type checker: infers a type for every expression and rejects ill-typed
//! programs before anything is evaluated.

use std::collections::HashMap;

use super::ast::{ExprId, ExprKind, InfixOp, Pos, Program, SectionId};
use super::error::CompileError;
use crate::eval::value::config_type;
use crate::theory::{MODE_CONSTANTS, PITCH_CONSTANTS};
use crate::types::{TypeId, TypeKind, TypeTable};

type Scope = HashMap<String, TypeId>;

/// Check `program`, producing the type table the evaluator consumes.
pub fn check(program: &Program) -> Result<TypeTable, CompileError> {
    let mut checker = Checker::new(program);
    checker.check_program()?;
    Ok(checker.table)
}

struct Checker<'a> {
    program: &'a Program,
    table: TypeTable,
    globals: Scope,
}

impl<'a> Checker<'a> {
    fn new(program: &'a Program) -> Self {
        let mut globals = Scope::new();
        for (name, _) in PITCH_CONSTANTS {
            globals.insert(name.to_string(), TypeId::ABS_PITCH);
        }
        for (name, _) in MODE_CONSTANTS {
            globals.insert(name.to_string(), TypeId::MODE);
        }
        Self {
            program,
            table: TypeTable::new(program.exprs.len()),
            globals,
        }
    }

    fn check_program(&mut self) -> Result<(), CompileError> {
        let program = self.program;
        for binding in &program.bindings {
            if self.globals.contains_key(&binding.name) {
                return Err(CompileError::type_error(
                    format!("duplicate binding `{}`", binding.name),
                    binding.pos,
                ));
            }
            let ty = self.check_expr(binding.expr, None)?;
            self.globals.insert(binding.name.clone(), ty);
        }

        let Some(main) = program.binding("main") else {
            return Err(CompileError::type_error(
                "section `main` is undefined",
                Pos::START,
            ));
        };
        let ty = self.globals.get("main").copied().unwrap_or(TypeId::VOID);
        let is_chorus = match self.kind(ty) {
            TypeKind::List(e) | TypeKind::Spread(e) => self.coerces(e, TypeId::SECTION),
            _ => false,
        };
        if ty != TypeId::SECTION && !is_chorus {
            return Err(CompileError::type_error(
                format!(
                    "`main` must be a section or a list of sections, found {}",
                    self.show(ty)
                ),
                main.pos,
            ));
        }
        Ok(())
    }

    fn check_section(&mut self, id: SectionId, pos: Pos) -> Result<TypeId, CompileError> {
        let program = self.program;
        let Some(section) = program.section(id) else {
            return Err(CompileError::type_error("dangling section reference", pos));
        };
        let mut scope = Scope::new();

        for var in &section.vars {
            if config_type(&var.name).is_some() {
                return Err(CompileError::type_error(
                    format!("variable `{}` clashes with a section attribute", var.name),
                    var.pos,
                ));
            }
            if scope.contains_key(&var.name) {
                return Err(CompileError::type_error(
                    format!("duplicate binding `{}`", var.name),
                    var.pos,
                ));
            }
            let ty = self.check_expr(var.expr, Some(&scope))?;
            scope.insert(var.name.clone(), ty);
        }

        for attr in &section.config {
            let Some(expected) = config_type(&attr.name) else {
                return Err(CompileError::type_error(
                    format!("unknown section attribute `{}`", attr.name),
                    attr.pos,
                ));
            };
            if scope.contains_key(&attr.name) {
                return Err(CompileError::type_error(
                    format!("duplicate attribute `{}`", attr.name),
                    attr.pos,
                ));
            }
            let ty = self.check_expr(attr.expr, Some(&scope))?;
            if !self.coerces(ty, expected) {
                return Err(CompileError::type_error(
                    format!(
                        "attribute `{}` expects {}, found {}",
                        attr.name,
                        self.show(expected),
                        self.show(ty)
                    ),
                    attr.pos,
                ));
            }
            scope.insert(attr.name.clone(), expected);
        }

        for &note in &section.notes {
            let ty = self.check_expr(note, Some(&scope))?;
            if !self.coerces(ty, TypeId::NOTE) {
                return Err(CompileError::type_error(
                    format!("expected a note in section body, found {}", self.show(ty)),
                    self.pos(note),
                ));
            }
        }

        for label in &section.labels {
            if !(0..=127).contains(&label.volume) {
                return Err(CompileError::type_error(
                    format!(
                        "label `{}` volume {} is outside 0..=127",
                        label.name, label.volume
                    ),
                    label.pos,
                ));
            }
        }

        Ok(TypeId::SECTION)
    }

    fn check_expr(&mut self, id: ExprId, scope: Option<&Scope>) -> Result<TypeId, CompileError> {
        let ty = self.infer(id, scope)?;
        self.table.set(id.index(), ty);
        Ok(ty)
    }

    fn infer(&mut self, id: ExprId, scope: Option<&Scope>) -> Result<TypeId, CompileError> {
        let program = self.program;
        let Some(expr) = program.expr(id) else {
            return Err(CompileError::type_error(
                format!("dangling expression #{}", id.index()),
                Pos::START,
            ));
        };
        let pos = expr.pos;

        match &expr.kind {
            ExprKind::Num(_) => Ok(TypeId::INT),
            ExprKind::Bool(_) => Ok(TypeId::BOOL),
            ExprKind::Void => Ok(TypeId::VOID),
            ExprKind::Ident(name) => scope
                .and_then(|s| s.get(name))
                .or_else(|| self.globals.get(name))
                .copied()
                .ok_or_else(|| {
                    CompileError::type_error(format!("undefined identifier `{name}`"), pos)
                }),
            ExprKind::Note { expr, .. } => {
                let ty = self.check_expr(*expr, scope)?;
                let chord = self.table.interner.list_of(TypeId::PITCH);
                if !self.coerces(ty, chord) {
                    return Err(CompileError::type_error(
                        format!("expected a pitch or chord before the dots, found {}", self.show(ty)),
                        pos,
                    ));
                }
                Ok(TypeId::NOTE)
            }
            ExprKind::List(items) => {
                let elem = self.check_sequence(items, scope, "list elements")?;
                Ok(self.table.interner.list_of(elem))
            }
            ExprKind::Scale {
                tonic,
                octave,
                mode,
            } => {
                self.expect(*tonic, TypeId::ABS_PITCH, scope, "scale tonic")?;
                self.expect(*octave, TypeId::INT, scope, "scale octave")?;
                self.expect(*mode, TypeId::MODE, scope, "scale mode")?;
                Ok(TypeId::SCALE)
            }
            ExprKind::Infix { op, lhs, rhs } => self.infer_infix(*op, *lhs, *rhs, scope, pos),
            ExprKind::Spread(inner) => {
                let ty = self.check_expr(*inner, scope)?;
                match self.kind(ty) {
                    TypeKind::List(e) | TypeKind::Spread(e) => {
                        Ok(self.table.interner.spread_of(e))
                    }
                    _ => Err(CompileError::type_error(
                        format!("only lists can be spread, found {}", self.show(ty)),
                        pos,
                    )),
                }
            }
            ExprKind::Section(section) => self.check_section(*section, pos),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expect(*cond, TypeId::BOOL, scope, "`if` condition")?;
                let a = self.check_expr(*then_branch, scope)?;
                let b = self.check_expr(*else_branch, scope)?;
                self.table.interner.unify(a, b).ok_or_else(|| {
                    CompileError::type_error(
                        format!(
                            "`if` branches have incompatible types {} and {}",
                            self.show(a),
                            self.show(b)
                        ),
                        pos,
                    )
                })
            }
            ExprKind::For {
                lower, upper, body, ..
            } => {
                self.expect(*lower, TypeId::INT, scope, "loop bound")?;
                self.expect(*upper, TypeId::INT, scope, "loop bound")?;
                let elem = self.check_sequence(body, scope, "loop body values")?;
                Ok(self.table.interner.spread_of(elem))
            }
        }
    }

    fn infer_infix(
        &mut self,
        op: InfixOp,
        lhs: ExprId,
        rhs: ExprId,
        scope: Option<&Scope>,
        pos: Pos,
    ) -> Result<TypeId, CompileError> {
        match op {
            InfixOp::Concat => Err(CompileError::type_error(
                "the `&` operator is obsolete; write a list of sections such as `[verse chorus]`",
                pos,
            )),
            InfixOp::Shift => {
                self.expect(lhs, TypeId::INT, scope, "shift amount")?;
                let ty = self.check_expr(rhs, scope)?;
                self.table.interner.shifted(ty).ok_or_else(|| {
                    CompileError::type_error(
                        format!("cannot shift a value of type {}", self.show(ty)),
                        pos,
                    )
                })
            }
            _ => {
                let context = format!("operand of `{}`", op.symbol());
                self.expect(lhs, TypeId::INT, scope, &context)?;
                self.expect(rhs, TypeId::INT, scope, &context)?;
                Ok(if op.is_comparison() {
                    TypeId::BOOL
                } else {
                    TypeId::INT
                })
            }
        }
    }

    /// Common element type of a sequence whose spread members are flattened.
    fn check_sequence(
        &mut self,
        items: &[ExprId],
        scope: Option<&Scope>,
        what: &str,
    ) -> Result<TypeId, CompileError> {
        let mut acc: Option<TypeId> = None;
        for &item in items {
            let ty = self.check_expr(item, scope)?;
            let elem = match self.kind(ty) {
                TypeKind::Spread(e) => e,
                _ => ty,
            };
            acc = Some(match acc {
                None => elem,
                Some(prev) => self.table.interner.unify(prev, elem).ok_or_else(|| {
                    CompileError::type_error(
                        format!(
                            "{what} have incompatible types {} and {}",
                            self.show(prev),
                            self.show(elem)
                        ),
                        self.pos(item),
                    )
                })?,
            });
        }
        Ok(acc.unwrap_or(TypeId::ANY))
    }

    fn expect(
        &mut self,
        id: ExprId,
        expected: TypeId,
        scope: Option<&Scope>,
        what: &str,
    ) -> Result<(), CompileError> {
        let ty = self.check_expr(id, scope)?;
        if self.coerces(ty, expected) {
            Ok(())
        } else {
            Err(CompileError::type_error(
                format!(
                    "{what} must be {}, found {}",
                    self.show(expected),
                    self.show(ty)
                ),
                self.pos(id),
            ))
        }
    }

    fn coerces(&self, from: TypeId, to: TypeId) -> bool {
        self.table.interner.coerces(from, to)
    }

    fn kind(&self, ty: TypeId) -> TypeKind {
        self.table.interner.kind(ty)
    }

    fn show(&self, ty: TypeId) -> String {
        self.table.interner.display(ty).to_string()
    }

    fn pos(&self, id: ExprId) -> Pos {
        self.program.expr(id).map(|e| e.pos).unwrap_or(Pos::START)
    }
}
