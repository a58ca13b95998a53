//! Structural type lattice with interning and one-directional coercion.
//!
//! Every type is interned into a [`TypeInterner`] so that structurally equal
//! types share one [`TypeId`] and can be compared by identity. Primitive
//! kinds occupy fixed ids, so they are available as constants without an
//! interner at hand.

use std::collections::HashMap;
use std::fmt;

/// Identity of an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const BOOL: TypeId = TypeId(1);
    pub const INT: TypeId = TypeId(2);
    pub const DEGREE: TypeId = TypeId(3);
    pub const ABS_PITCH: TypeId = TypeId(4);
    pub const PITCH: TypeId = TypeId(5);
    pub const NOTE: TypeId = TypeId(6);
    pub const SCALE: TypeId = TypeId(7);
    pub const MODE: TypeId = TypeId(8);
    pub const SECTION: TypeId = TypeId(9);
    pub const ANY: TypeId = TypeId(10);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The shape of a type. Container kinds refer to their element by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Void,
    Bool,
    Int,
    Degree,
    AbsPitch,
    Pitch,
    Note,
    Scale,
    Mode,
    Section,
    Any,
    List(TypeId),
    Spread(TypeId),
}

const PRIMITIVES: [TypeKind; 11] = [
    TypeKind::Void,
    TypeKind::Bool,
    TypeKind::Int,
    TypeKind::Degree,
    TypeKind::AbsPitch,
    TypeKind::Pitch,
    TypeKind::Note,
    TypeKind::Scale,
    TypeKind::Mode,
    TypeKind::Section,
    TypeKind::Any,
];

/// Append-only deduplicating table from [`TypeKind`] to [`TypeId`].
#[derive(Debug, Clone)]
pub struct TypeInterner {
    kinds: Vec<TypeKind>,
    ids: HashMap<TypeKind, TypeId>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    pub fn new() -> Self {
        let mut interner = Self {
            kinds: Vec::with_capacity(PRIMITIVES.len() + 8),
            ids: HashMap::new(),
        };
        for kind in PRIMITIVES {
            interner.intern(kind);
        }
        interner
    }

    /// Return the canonical id for `kind`, allocating one on first sight.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.ids.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind);
        self.ids.insert(kind, id);
        id
    }

    pub fn list_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::List(elem))
    }

    pub fn spread_of(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Spread(elem))
    }

    /// Look up an already-interned kind without allocating.
    pub fn get(&self, kind: TypeKind) -> Option<TypeId> {
        self.ids.get(&kind).copied()
    }

    /// The kind behind `id`. Ids from another interner resolve to `Any`.
    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.kinds.get(id.index()).copied().unwrap_or(TypeKind::Any)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Element type of a list or spread.
    pub fn element(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(id) {
            TypeKind::List(e) | TypeKind::Spread(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_spread(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Spread(_))
    }

    /// Scalars that can stand for a pitch: ints, degrees and pitches.
    pub fn is_pitch_family(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Int | TypeKind::Degree | TypeKind::AbsPitch | TypeKind::Pitch
        )
    }

    /// Whether a value of type `from` may be used where `to` is expected.
    pub fn coerces(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        use TypeKind::*;
        match (self.kind(from), self.kind(to)) {
            (Any, _) => true,
            (_, Any) => false,
            (Int, Degree) | (Int, Pitch) | (Degree, Pitch) | (AbsPitch, Pitch) => true,
            (List(a), List(b)) | (Spread(a), Spread(b)) => self.coerces(a, b),
            (Spread(a), _) => self.coerces(a, to),
            (Section, List(b)) => self.kind(b) == Section,
            (_, List(b)) => self.is_pitch_family(from) && self.kind(b) == Pitch,
            _ => false,
        }
    }

    /// Coerce `from` to `to`: returns `to` when licensed, `from` otherwise.
    ///
    /// Callers detect failure by comparing the result with `to`, which lets
    /// them attach a source location to the diagnostic.
    pub fn coerce(&self, from: TypeId, to: TypeId) -> TypeId {
        if self.coerces(from, to) {
            to
        } else {
            from
        }
    }

    /// Smallest common type of `a` and `b`, if any.
    pub fn unify(&mut self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if self.coerces(a, b) {
            return Some(b);
        }
        if self.coerces(b, a) {
            return Some(a);
        }
        if self.is_pitch_family(a) && self.is_pitch_family(b) {
            return Some(TypeId::PITCH);
        }
        match (self.kind(a), self.kind(b)) {
            (TypeKind::List(x), TypeKind::List(y)) => {
                let elem = self.unify(x, y)?;
                Some(self.list_of(elem))
            }
            (TypeKind::Spread(x), TypeKind::Spread(y)) => {
                let elem = self.unify(x, y)?;
                Some(self.spread_of(elem))
            }
            _ => None,
        }
    }

    /// Result type of shifting a value of type `ty` by some semitones.
    ///
    /// Integers become degrees; pitches keep their flavour; containers shift
    /// element-wise. Returns `None` for types that cannot be shifted.
    pub fn shifted(&mut self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Int | TypeKind::Degree => Some(TypeId::DEGREE),
            TypeKind::AbsPitch => Some(TypeId::ABS_PITCH),
            TypeKind::Pitch => Some(TypeId::PITCH),
            TypeKind::Any => Some(TypeId::ANY),
            TypeKind::List(e) => {
                let e = self.shifted(e)?;
                Some(self.list_of(e))
            }
            TypeKind::Spread(e) => {
                let e = self.shifted(e)?;
                Some(self.spread_of(e))
            }
            _ => None,
        }
    }

    /// Human-readable rendering, e.g. `list<pitch>`.
    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { interner: self, id }
    }
}

/// Borrowing formatter returned by [`TypeInterner::display`].
pub struct TypeDisplay<'a> {
    interner: &'a TypeInterner,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.interner.kind(self.id) {
            TypeKind::Void => "void",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Degree => "degree",
            TypeKind::AbsPitch => "abspitch",
            TypeKind::Pitch => "pitch",
            TypeKind::Note => "note",
            TypeKind::Scale => "scale",
            TypeKind::Mode => "mode",
            TypeKind::Section => "section",
            TypeKind::Any => "any",
            TypeKind::List(e) => return write!(f, "list<{}>", self.interner.display(e)),
            TypeKind::Spread(e) => return write!(f, "spread<{}>", self.interner.display(e)),
        };
        f.write_str(name)
    }
}

/// Inferred type of every expression in a program, indexed by expression id.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    pub interner: TypeInterner,
    types: Vec<Option<TypeId>>,
}

impl TypeTable {
    pub fn new(expr_count: usize) -> Self {
        Self {
            interner: TypeInterner::new(),
            types: vec![None; expr_count],
        }
    }

    pub fn with_interner(interner: TypeInterner, expr_count: usize) -> Self {
        Self {
            interner,
            types: vec![None; expr_count],
        }
    }

    pub fn get(&self, expr: usize) -> Option<TypeId> {
        self.types.get(expr).copied().flatten()
    }

    pub fn set(&mut self, expr: usize, ty: TypeId) {
        if expr >= self.types.len() {
            self.types.resize(expr + 1, None);
        }
        self.types[expr] = Some(ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_types(i: &mut TypeInterner) -> Vec<TypeId> {
        let mut tys: Vec<TypeId> = (0..PRIMITIVES.len() as u32).map(TypeId).collect();
        let scalars = tys.clone();
        for &t in &scalars {
            let l = i.list_of(t);
            let s = i.spread_of(t);
            tys.push(l);
            tys.push(s);
            tys.push(i.list_of(l));
            tys.push(i.spread_of(l));
        }
        tys
    }

    #[test]
    fn primitives_have_fixed_ids() {
        let i = TypeInterner::new();
        assert_eq!(i.kind(TypeId::INT), TypeKind::Int);
        assert_eq!(i.kind(TypeId::SECTION), TypeKind::Section);
        assert_eq!(i.kind(TypeId::ANY), TypeKind::Any);
        assert_eq!(i.len(), PRIMITIVES.len());
    }

    #[test]
    fn interning_is_structural() {
        let mut i = TypeInterner::new();
        let a = i.list_of(TypeId::PITCH);
        let b = i.intern(TypeKind::List(TypeId::PITCH));
        assert_eq!(a, b);
        let nested_a = i.spread_of(a);
        let nested_b = i.spread_of(b);
        assert_eq!(nested_a, nested_b);
        assert_ne!(a, i.list_of(TypeId::DEGREE));
    }

    #[test]
    fn widening_chain() {
        let mut i = TypeInterner::new();
        let list_pitch = i.list_of(TypeId::PITCH);
        assert!(i.coerces(TypeId::INT, TypeId::DEGREE));
        assert!(i.coerces(TypeId::DEGREE, TypeId::PITCH));
        assert!(i.coerces(TypeId::ABS_PITCH, TypeId::PITCH));
        assert!(i.coerces(TypeId::PITCH, list_pitch));
        assert!(i.coerces(TypeId::INT, list_pitch));
    }

    #[test]
    fn never_narrows() {
        let mut i = TypeInterner::new();
        let list_pitch = i.list_of(TypeId::PITCH);
        assert_eq!(i.coerce(TypeId::PITCH, TypeId::INT), TypeId::PITCH);
        assert_eq!(i.coerce(list_pitch, TypeId::PITCH), list_pitch);
        assert_eq!(i.coerce(TypeId::ABS_PITCH, TypeId::DEGREE), TypeId::ABS_PITCH);
    }

    #[test]
    fn section_widens_to_section_list() {
        let mut i = TypeInterner::new();
        let chorus = i.list_of(TypeId::SECTION);
        assert_eq!(i.coerce(TypeId::SECTION, chorus), chorus);
        assert_eq!(i.coerce(chorus, TypeId::SECTION), chorus);
    }

    #[test]
    fn spread_unwraps_one_level() {
        let mut i = TypeInterner::new();
        let spread_note = i.spread_of(TypeId::NOTE);
        assert!(i.coerces(spread_note, TypeId::NOTE));
        assert!(!i.coerces(TypeId::NOTE, spread_note));
        let spread_int = i.spread_of(TypeId::INT);
        let spread_pitch = i.spread_of(TypeId::PITCH);
        assert!(i.coerces(spread_int, spread_pitch));
    }

    #[test]
    fn any_widens_to_everything() {
        let mut i = TypeInterner::new();
        for t in sample_types(&mut i) {
            assert!(i.coerces(TypeId::ANY, t));
        }
    }

    #[test]
    fn coercion_is_reflexive_and_antisymmetric() {
        let mut i = TypeInterner::new();
        let tys = sample_types(&mut i);
        for &a in &tys {
            assert_eq!(i.coerce(a, a), a);
            for &b in &tys {
                if a != b && i.coerce(a, b) == b {
                    assert_ne!(
                        i.coerce(b, a),
                        a,
                        "{} and {} coerce both ways",
                        i.display(a),
                        i.display(b)
                    );
                }
            }
        }
    }

    #[test]
    fn unify_picks_wider_type() {
        let mut i = TypeInterner::new();
        assert_eq!(i.unify(TypeId::INT, TypeId::DEGREE), Some(TypeId::DEGREE));
        assert_eq!(i.unify(TypeId::ABS_PITCH, TypeId::DEGREE), Some(TypeId::PITCH));
        assert_eq!(i.unify(TypeId::NOTE, TypeId::INT), None);
        let li = i.list_of(TypeId::INT);
        let la = i.list_of(TypeId::ABS_PITCH);
        let lp = i.list_of(TypeId::PITCH);
        assert_eq!(i.unify(li, la), Some(lp));
    }

    #[test]
    fn shifted_types() {
        let mut i = TypeInterner::new();
        assert_eq!(i.shifted(TypeId::INT), Some(TypeId::DEGREE));
        assert_eq!(i.shifted(TypeId::ABS_PITCH), Some(TypeId::ABS_PITCH));
        let li = i.list_of(TypeId::INT);
        let ld = i.list_of(TypeId::DEGREE);
        assert_eq!(i.shifted(li), Some(ld));
        assert_eq!(i.shifted(TypeId::NOTE), None);
    }

    #[test]
    fn display_nested() {
        let mut i = TypeInterner::new();
        let l = i.list_of(TypeId::PITCH);
        let s = i.spread_of(l);
        assert_eq!(i.display(s).to_string(), "spread<list<pitch>>");
    }

    #[test]
    fn table_grows_on_set() {
        let mut t = TypeTable::new(1);
        assert_eq!(t.get(0), None);
        t.set(3, TypeId::BOOL);
        assert_eq!(t.len(), 4);
        assert_eq!(t.get(3), Some(TypeId::BOOL));
        assert_eq!(t.get(10), None);
    }
}
