use std::fmt::{Display, Formatter};

/// A named automaton state, shared by finite and pushdown automata
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct State {
    pub name: String,
}

impl State {
    pub fn new(name: &str) -> Self {
        State {
            name: name.to_string(),
        }
    }

    pub fn from_string(name: String) -> Self {
        State { name }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
