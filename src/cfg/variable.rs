use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Variable {
    pub name: String, // The name of the variable (e.g., "S", "A", "B")
}

impl Variable {
    /// Create a new Variable
    pub fn new(name: &str) -> Self {
        Variable {
            name: name.to_string(),
        }
    }

    /// Create a new Variable from a String
    pub fn from_string(name: String) -> Self {
        Variable { name }
    }

    /// Get the name of the variable
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Textual form used by `CFG::to_text`, escaped when the name would read as a terminal
    pub fn to_text(&self) -> String {
        match self.name.chars().next() {
            Some(c) if c.is_uppercase() => self.name.clone(),
            _ => format!("\"VAR:{}\"", self.name),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
