//! Typed evaluator: walks the AST with its type table and produces one
//! [`Track`] per section of `main`.
//!
//! Every expression's value is coerced to the type the checker inferred for
//! it, so values always carry the same type tags as the table. Spreads are
//! realized by splicing: a spread value is a list that the enclosing list,
//! loop or section body flattens into itself.

pub mod env;
pub mod value;

use std::cell::Cell;

use tracing::debug;

pub use env::Env;
pub use value::{Note, SecConfig, Track, TrackLabel, Val, ValData};

use crate::dsl::ast::{ExprId, ExprKind, InfixOp, Pos, Program, SectionId};
use crate::dsl::error::CompileError;
use crate::error::{Error, Result};
use crate::theory::{resolve_pitch, Pitch, Scale};
use crate::types::{TypeId, TypeKind, TypeTable};

/// Evaluate every top-level binding, then turn `main` into tracks.
pub fn eval_program(program: &Program, table: &TypeTable) -> Result<Vec<Track>> {
    Evaluator::new(program, table).run()
}

/// Loop iterations a whole program may run, summed over every `for`.
pub const MAX_LOOP_ITERATIONS: u64 = 1 << 20;

fn semantic(message: impl Into<String>, pos: Pos) -> Error {
    CompileError::eval(message, pos).into()
}

fn degree_of(n: i64, pos: Pos) -> Result<Pitch> {
    Pitch::from_int(n).ok_or_else(|| semantic(format!("scale degree {n} is out of range"), pos))
}

pub struct Evaluator<'a> {
    program: &'a Program,
    table: &'a TypeTable,
    globals: Env,
    iterations: Cell<u64>,
}

impl<'a> Evaluator<'a> {
    pub fn new(program: &'a Program, table: &'a TypeTable) -> Self {
        Self {
            program,
            table,
            globals: Env::with_builtins(),
            iterations: Cell::new(0),
        }
    }

    pub fn run(mut self) -> Result<Vec<Track>> {
        let program = self.program;
        for binding in &program.bindings {
            let val = self.eval_expr(binding.expr, None)?;
            self.globals.insert(binding.name.clone(), val);
        }
        let main = self
            .globals
            .get("main")
            .ok_or_else(|| semantic("section `main` is undefined", Pos::START))?;
        let tracks = self.main_tracks(main)?;
        debug!(tracks = tracks.len(), "evaluated program");
        Ok(tracks)
    }

    fn main_tracks(&self, main: &Val) -> Result<Vec<Track>> {
        let interner = &self.table.interner;
        match (interner.kind(main.ty), &main.data) {
            (TypeKind::Section, ValData::Section(track)) => Ok(vec![track.clone()]),
            (TypeKind::List(e) | TypeKind::Spread(e), ValData::List(items))
                if interner.coerces(e, TypeId::SECTION) =>
            {
                items
                    .iter()
                    .map(|item| match &item.data {
                        ValData::Section(track) => Ok(track.clone()),
                        other => Err(Error::contract(format!(
                            "chorus member is a {} value, not a section",
                            other.kind_name()
                        ))),
                    })
                    .collect()
            }
            _ => Err(Error::contract(format!(
                "`main` has type {}, expected a section or a list of sections",
                interner.display(main.ty)
            ))),
        }
    }

    fn ty(&self, id: ExprId) -> Result<TypeId> {
        self.table
            .get(id.index())
            .ok_or_else(|| Error::contract(format!("expression #{} has no type", id.index())))
    }

    fn lookup<'e>(&'e self, name: &str, local: Option<&'e Env>) -> Option<&'e Val> {
        local
            .and_then(|env| env.get(name))
            .or_else(|| self.globals.get(name))
    }

    pub fn eval_expr(&self, id: ExprId, local: Option<&Env>) -> Result<Val> {
        let program = self.program;
        let expr = program
            .expr(id)
            .ok_or_else(|| Error::contract(format!("dangling expression #{}", id.index())))?;
        let ty = self.ty(id)?;
        let pos = expr.pos;

        let val = match &expr.kind {
            ExprKind::Num(n) => Val::new(ValData::Int(*n), TypeId::INT),
            ExprKind::Bool(b) => Val::new(ValData::Bool(*b), TypeId::BOOL),
            ExprKind::Void => Val::new(ValData::Void, TypeId::VOID),
            ExprKind::Ident(name) => self
                .lookup(name, local)
                .cloned()
                .ok_or_else(|| semantic(format!("undefined identifier `{name}`"), pos))?,
            ExprKind::Note { expr: inner, dots } => {
                let chord = self.eval_expr(*inner, local)?;
                let note = Note {
                    pitches: self.chord_pitches(chord.data, pos)?,
                    dots: *dots,
                };
                Val::new(ValData::Note(note), TypeId::NOTE)
            }
            ExprKind::List(items) => {
                let elem = self.element(ty)?;
                let mut out = Vec::with_capacity(items.len());
                self.eval_sequence(items, elem, local, &mut out)?;
                Val::new(ValData::List(out), ty)
            }
            ExprKind::Scale {
                tonic,
                octave,
                mode,
            } => {
                let scale = self.eval_scale(*tonic, *octave, *mode, local, pos)?;
                Val::new(ValData::Scale(scale), TypeId::SCALE)
            }
            ExprKind::Infix { op, lhs, rhs } => {
                self.eval_infix(*op, *lhs, *rhs, ty, local, pos)?
            }
            ExprKind::Spread(inner) => match self.eval_expr(*inner, local)?.data {
                ValData::List(items) => Val::new(ValData::List(items), ty),
                other => {
                    return Err(Error::contract(format!(
                        "spread of a {} value",
                        other.kind_name()
                    )))
                }
            },
            ExprKind::Section(section) => {
                Val::new(ValData::Section(self.eval_section(*section)?), TypeId::SECTION)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if self.eval_bool(*cond, local)? {
                    *then_branch
                } else {
                    *else_branch
                };
                self.eval_expr(branch, local)?
            }
            ExprKind::For {
                lower,
                upper,
                inclusive,
                body,
            } => {
                let lo = self.eval_int(*lower, local)?;
                let hi = self.eval_int(*upper, local)?;
                let count = (hi as i128 - lo as i128 + *inclusive as i128).max(0);
                self.spend_iterations(count, pos)?;
                let elem = self.element(ty)?;
                let mut out = Vec::new();
                for _ in 0..count {
                    self.eval_sequence(body, elem, local, &mut out)?;
                }
                Val::new(ValData::List(out), ty)
            }
        };

        self.coerce(val, ty, pos)
    }

    /// Charge `count` loop iterations against the program-wide budget.
    fn spend_iterations(&self, count: i128, pos: Pos) -> Result<()> {
        let spent = u64::try_from(count)
            .ok()
            .and_then(|c| c.checked_add(self.iterations.get()))
            .filter(|total| *total <= MAX_LOOP_ITERATIONS)
            .ok_or_else(|| {
                semantic(
                    format!(
                        "loop of {count} iterations exceeds the limit of {MAX_LOOP_ITERATIONS} per program"
                    ),
                    pos,
                )
            })?;
        self.iterations.set(spent);
        Ok(())
    }

    /// Evaluate `items` in order, splicing spreads, each coerced to `elem`.
    fn eval_sequence(
        &self,
        items: &[ExprId],
        elem: TypeId,
        local: Option<&Env>,
        out: &mut Vec<Val>,
    ) -> Result<()> {
        for &item in items {
            let pos = self.pos(item);
            let val = self.eval_expr(item, local)?;
            if self.table.interner.is_spread(val.ty) {
                let members = match val.data {
                    ValData::List(members) => members,
                    other => return Err(self.mismatch(&other, val.ty)),
                };
                for member in members {
                    out.push(self.coerce(member, elem, pos)?);
                }
            } else {
                out.push(self.coerce(val, elem, pos)?);
            }
        }
        Ok(())
    }

    fn eval_infix(
        &self,
        op: InfixOp,
        lhs: ExprId,
        rhs: ExprId,
        ty: TypeId,
        local: Option<&Env>,
        pos: Pos,
    ) -> Result<Val> {
        match op {
            InfixOp::Concat => Err(Error::contract(
                "obsolete `&` operator reached the evaluator",
            )),
            InfixOp::Shift => {
                let by = self.eval_int(lhs, local)?;
                let semitones = i32::try_from(by).map_err(|_| {
                    semantic(format!("shift of {by} semitones is out of range"), pos)
                })?;
                let target = self.eval_expr(rhs, local)?;
                self.shift(target, semitones, ty, pos)
            }
            _ => {
                let a = self.eval_int(lhs, local)?;
                let b = self.eval_int(rhs, local)?;
                let overflow = || semantic(format!("integer overflow in `{}`", op.symbol()), pos);
                let data = match op {
                    InfixOp::Add => ValData::Int(a.checked_add(b).ok_or_else(overflow)?),
                    InfixOp::Sub => ValData::Int(a.checked_sub(b).ok_or_else(overflow)?),
                    InfixOp::Mul => ValData::Int(a.checked_mul(b).ok_or_else(overflow)?),
                    InfixOp::Eq => ValData::Bool(a == b),
                    InfixOp::Ne => ValData::Bool(a != b),
                    InfixOp::Lt => ValData::Bool(a < b),
                    InfixOp::Gt => ValData::Bool(a > b),
                    InfixOp::Le => ValData::Bool(a <= b),
                    InfixOp::Ge => ValData::Bool(a >= b),
                    InfixOp::Concat | InfixOp::Shift => {
                        return Err(Error::contract(format!(
                            "`{}` dispatched as arithmetic",
                            op.symbol()
                        )))
                    }
                };
                let ty = if op.is_comparison() {
                    TypeId::BOOL
                } else {
                    TypeId::INT
                };
                Ok(Val::new(data, ty))
            }
        }
    }

    /// Shift every pitch in `val` by `semitones`. Integers become degrees.
    fn shift(&self, val: Val, semitones: i32, ty: TypeId, pos: Pos) -> Result<Val> {
        let out_of_range =
            || semantic(format!("shift of {semitones} semitones is out of range"), pos);
        let data = match val.data {
            ValData::Int(n) => {
                let pitch = degree_of(n, pos)?;
                ValData::Pitch(pitch.shifted(semitones).ok_or_else(out_of_range)?)
            }
            ValData::Pitch(p) => ValData::Pitch(p.shifted(semitones).ok_or_else(out_of_range)?),
            ValData::List(items) => {
                let elem = self.element(ty)?;
                let shifted = items
                    .into_iter()
                    .map(|item| self.shift(item, semitones, elem, pos))
                    .collect::<Result<_>>()?;
                ValData::List(shifted)
            }
            other => {
                return Err(Error::contract(format!(
                    "cannot shift a {} value",
                    other.kind_name()
                )))
            }
        };
        Ok(Val::new(data, ty))
    }

    fn eval_scale(
        &self,
        tonic: ExprId,
        octave: ExprId,
        mode: ExprId,
        local: Option<&Env>,
        pos: Pos,
    ) -> Result<Scale> {
        let tonic_val = self.eval_expr(tonic, local)?;
        let tonic = match self.coerce(tonic_val, TypeId::ABS_PITCH, pos)?.data {
            ValData::Pitch(Pitch::Abs(pc)) => pc,
            other => return Err(self.mismatch(&other, TypeId::ABS_PITCH)),
        };
        let octave = self.eval_int(octave, local)?;
        let octave = i32::try_from(octave)
            .map_err(|_| semantic(format!("octave {octave} is out of range"), pos))?;
        let mode_val = self.eval_expr(mode, local)?;
        let mode = match self.coerce(mode_val, TypeId::MODE, pos)?.data {
            ValData::Mode(m) => m,
            other => return Err(self.mismatch(&other, TypeId::MODE)),
        };
        Ok(Scale::new(tonic, mode, octave))
    }

    pub fn eval_section(&self, id: SectionId) -> Result<Track> {
        let program = self.program;
        let section = program
            .section(id)
            .ok_or_else(|| Error::contract(format!("dangling section #{}", id.index())))?;
        let mut env = Env::new();

        for var in &section.vars {
            let val = self.eval_expr(var.expr, Some(&env))?;
            env.insert(var.name.clone(), val);
        }

        let mut config = SecConfig::default();
        for attr in &section.config {
            let val = self.eval_expr(attr.expr, Some(&env))?;
            self.apply_config(&mut config, &attr.name, val.clone(), attr.pos)?;
            env.insert(attr.name.clone(), val);
        }

        // starts[i] is the flattened index of the i-th note expression.
        let mut notes = Vec::new();
        let mut positions = Vec::new();
        let mut starts = Vec::with_capacity(section.notes.len() + 1);
        for &note_expr in &section.notes {
            starts.push(notes.len());
            let pos = self.pos(note_expr);
            let val = self.eval_expr(note_expr, Some(&env))?;
            if self.table.interner.is_spread(val.ty) {
                let members = match val.data {
                    ValData::List(members) => members,
                    other => return Err(self.mismatch(&other, val.ty)),
                };
                for member in members {
                    notes.push(self.note_of(member, pos)?);
                    positions.push(pos);
                }
            } else {
                notes.push(self.note_of(val, pos)?);
                positions.push(pos);
            }
        }
        starts.push(notes.len());

        let scale = config.scale;
        let notes = notes
            .into_iter()
            .zip(positions)
            .map(|(note, pos)| {
                let pitches = note
                    .pitches
                    .into_iter()
                    .map(|p| {
                        resolve_pitch(&scale, p).map(Pitch::Abs).ok_or_else(|| {
                            semantic(format!("pitch is out of range in scale {scale}"), pos)
                        })
                    })
                    .collect::<Result<_>>()?;
                Ok(Note {
                    pitches,
                    dots: note.dots,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut labels = Vec::with_capacity(section.labels.len());
        for label in &section.labels {
            let note_index = starts.get(label.note_pos).copied().ok_or_else(|| {
                Error::contract(format!(
                    "label `{}` placed after note expression {} of {}",
                    label.name,
                    label.note_pos,
                    section.notes.len()
                ))
            })?;
            let volume = u8::try_from(label.volume)
                .ok()
                .filter(|v| *v <= 127)
                .ok_or_else(|| {
                    semantic(
                        format!(
                            "label `{}` volume {} is outside 0..=127",
                            label.name, label.volume
                        ),
                        label.pos,
                    )
                })?;
            labels.push(TrackLabel {
                name: label.name.clone(),
                volume,
                interpolation: label.interpolation,
                note_index,
            });
        }

        debug!(
            section = id.index(),
            notes = notes.len(),
            labels = labels.len(),
            bpm = config.bpm,
            "evaluated section"
        );
        Ok(Track {
            notes,
            config,
            labels,
        })
    }

    fn apply_config(&self, config: &mut SecConfig, name: &str, val: Val, pos: Pos) -> Result<()> {
        match name {
            "scale" => match self.coerce(val, TypeId::SCALE, pos)?.data {
                ValData::Scale(scale) => config.scale = scale,
                other => return Err(self.mismatch(&other, TypeId::SCALE)),
            },
            "bpm" => {
                let bpm = self.int_of(val, pos)?;
                if bpm < 1 {
                    return Err(semantic(format!("bpm must be at least 1, got {bpm}"), pos));
                }
                config.bpm = bpm;
            }
            "instrument" => {
                let program = self.int_of(val, pos)?;
                if !(0..=127).contains(&program) {
                    return Err(semantic(
                        format!("instrument {program} is outside 0..=127"),
                        pos,
                    ));
                }
                config.instrument = program;
            }
            other => {
                return Err(semantic(
                    format!("unknown section attribute `{other}`"),
                    pos,
                ))
            }
        }
        Ok(())
    }

    /// Coerce `val` to `to`, following the lattice in [`crate::types`].
    ///
    /// A spread coerced to a scalar type collapses only when it holds exactly
    /// one value.
    pub fn coerce(&self, val: Val, to: TypeId, pos: Pos) -> Result<Val> {
        if val.ty == to {
            return Ok(val);
        }
        let interner = &self.table.interner;
        let from = val.ty;
        if !interner.coerces(from, to) {
            return Err(semantic(
                format!(
                    "cannot use a value of type {} as {}",
                    interner.display(from),
                    interner.display(to)
                ),
                pos,
            ));
        }

        let elementwise = match (interner.kind(from), interner.kind(to)) {
            (
                TypeKind::List(a) | TypeKind::Spread(a),
                TypeKind::List(b) | TypeKind::Spread(b),
            ) if interner.coerces(a, b) => Some(b),
            _ => None,
        };

        let data = if let Some(elem) = elementwise {
            let items = match val.data {
                ValData::List(items) => items,
                other => return Err(self.mismatch(&other, from)),
            };
            ValData::List(
                items
                    .into_iter()
                    .map(|item| self.coerce(item, elem, pos))
                    .collect::<Result<_>>()?,
            )
        } else if interner.is_spread(from) {
            let mut items = match val.data {
                ValData::List(items) => items,
                other => return Err(self.mismatch(&other, from)),
            };
            if items.len() != 1 {
                return Err(semantic(
                    format!(
                        "a spread of {} values cannot be used as a single {}",
                        items.len(),
                        interner.display(to)
                    ),
                    pos,
                ));
            }
            return self.coerce(items.remove(0), to, pos);
        } else {
            match interner.kind(to) {
                TypeKind::List(elem) | TypeKind::Spread(elem) => {
                    let single = self.coerce(Val::new(val.data, from), elem, pos)?;
                    ValData::List(vec![single])
                }
                TypeKind::Degree | TypeKind::Pitch => match val.data {
                    ValData::Int(n) => ValData::Pitch(degree_of(n, pos)?),
                    ValData::Pitch(p) => ValData::Pitch(p),
                    other => return Err(self.mismatch(&other, from)),
                },
                _ => val.data,
            }
        };
        Ok(Val::new(data, to))
    }

    fn note_of(&self, val: Val, pos: Pos) -> Result<Note> {
        match self.coerce(val, TypeId::NOTE, pos)?.data {
            ValData::Note(note) => Ok(note),
            other => Err(self.mismatch(&other, TypeId::NOTE)),
        }
    }

    fn chord_pitches(&self, data: ValData, pos: Pos) -> Result<Vec<Pitch>> {
        match data {
            ValData::List(items) => items
                .into_iter()
                .map(|item| self.pitch_of(item.data, pos))
                .collect(),
            single => Ok(vec![self.pitch_of(single, pos)?]),
        }
    }

    fn pitch_of(&self, data: ValData, pos: Pos) -> Result<Pitch> {
        match data {
            ValData::Int(n) => degree_of(n, pos),
            ValData::Pitch(p) => Ok(p),
            other => Err(semantic(
                format!("expected a pitch, found a {} value", other.kind_name()),
                pos,
            )),
        }
    }

    fn eval_int(&self, id: ExprId, local: Option<&Env>) -> Result<i64> {
        let pos = self.pos(id);
        let val = self.eval_expr(id, local)?;
        self.int_of(val, pos)
    }

    fn int_of(&self, val: Val, pos: Pos) -> Result<i64> {
        match self.coerce(val, TypeId::INT, pos)?.data {
            ValData::Int(n) => Ok(n),
            other => Err(self.mismatch(&other, TypeId::INT)),
        }
    }

    fn eval_bool(&self, id: ExprId, local: Option<&Env>) -> Result<bool> {
        let pos = self.pos(id);
        match self.coerce(self.eval_expr(id, local)?, TypeId::BOOL, pos)?.data {
            ValData::Bool(b) => Ok(b),
            other => Err(self.mismatch(&other, TypeId::BOOL)),
        }
    }

    fn element(&self, ty: TypeId) -> Result<TypeId> {
        self.table.interner.element(ty).ok_or_else(|| {
            Error::contract(format!(
                "expected a list type, found {}",
                self.table.interner.display(ty)
            ))
        })
    }

    fn mismatch(&self, data: &ValData, ty: TypeId) -> Error {
        Error::contract(format!(
            "{} value tagged with type {}",
            data.kind_name(),
            self.table.interner.display(ty)
        ))
    }

    fn pos(&self, id: ExprId) -> Pos {
        self.program.expr(id).map(|e| e.pos).unwrap_or(Pos::START)
    }
}
