use std::collections::HashMap;

use super::value::{Val, ValData};
use crate::theory::{Pitch, MODE_CONSTANTS, PITCH_CONSTANTS};
use crate::types::TypeId;

/// Name-to-value bindings of the program or of one section.
#[derive(Debug, Clone, Default)]
pub struct Env {
    vars: HashMap<String, Val>,
}

impl Env {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program environment seeded with the pitch-class and mode constants.
    pub fn with_builtins() -> Self {
        let mut env = Self::new();
        for (name, pc) in PITCH_CONSTANTS {
            env.insert(
                name,
                Val::new(ValData::Pitch(Pitch::Abs(pc)), TypeId::ABS_PITCH),
            );
        }
        for (name, mode) in MODE_CONSTANTS {
            env.insert(name, Val::new(ValData::Mode(mode), TypeId::MODE));
        }
        env
    }

    pub fn insert(&mut self, name: impl Into<String>, val: Val) {
        self.vars.insert(name.into(), val);
    }

    pub fn get(&self, name: &str) -> Option<&Val> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theory::Mode;

    #[test]
    fn builtins_are_seeded() {
        let env = Env::with_builtins();
        assert_eq!(
            env.get("G").map(|v| &v.data),
            Some(&ValData::Pitch(Pitch::Abs(7)))
        );
        assert_eq!(
            env.get("MIN").map(|v| &v.data),
            Some(&ValData::Mode(Mode::Aeolian))
        );
        assert!(!env.contains("main"));
    }
}
