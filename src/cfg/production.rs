use std::fmt::{Display, Formatter};

use crate::cfg::terminal::Terminal;
use crate::cfg::variable::Variable;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Symbol {
    T(Terminal),
    V(Variable),
}

impl Symbol {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::T(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Symbol::V(_))
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Symbol::V(v) => Some(v),
            Symbol::T(_) => None,
        }
    }

    pub fn as_terminal(&self) -> Option<&Terminal> {
        match self {
            Symbol::T(t) => Some(t),
            Symbol::V(_) => None,
        }
    }

    pub fn get_name(&self) -> &str {
        match self {
            Symbol::T(t) => t.get_name(),
            Symbol::V(v) => v.get_name(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            Symbol::T(t) => t.to_text(),
            Symbol::V(v) => v.to_text(),
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

impl From<Variable> for Symbol {
    fn from(v: Variable) -> Self {
        Symbol::V(v)
    }
}

impl From<Terminal> for Symbol {
    fn from(t: Terminal) -> Self {
        Symbol::T(t)
    }
}

/// A rule `head -> body`. An empty body is an epsilon production.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Production {
    pub head: Variable,    // The head of the production (e.g., "S", "A")
    pub body: Vec<Symbol>, // The body of the production (e.g., "A b", "a S")
}

impl Production {
    /// Create a new Production, dropping every epsilon terminal from the body
    pub fn new(head: Variable, body: Vec<Symbol>) -> Self {
        let body = body
            .into_iter()
            .filter(|symbol| !matches!(symbol, Symbol::T(t) if t.is_epsilon()))
            .collect();
        Production { head, body }
    }

    /// Create a new Production keeping the body exactly as given
    pub fn new_raw(head: Variable, body: Vec<Symbol>) -> Self {
        Production { head, body }
    }

    /// Either a single terminal or exactly two variables
    pub fn is_normal_form(&self) -> bool {
        match self.body.as_slice() {
            [Symbol::T(_)] => true,
            [Symbol::V(_), Symbol::V(_)] => true,
            _ => false,
        }
    }

    /// Textual form as read back by `CFG::from_text`
    pub fn to_text(&self) -> String {
        let body: Vec<String> = self.body.iter().map(Symbol::to_text).collect();
        format!("{} -> {}", self.head.to_text(), body.join(" "))
    }
}

impl Display for Production {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let body_str: Vec<&str> = self.body.iter().map(Symbol::get_name).collect();
        write!(f, "{} -> {}", self.head.get_name(), body_str.join(" "))
    }
}
