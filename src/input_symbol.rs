use hashbrown::HashSet;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct InputSymbol {
    pub name: String, // Textual representation of the symbol
}

/// Every spelling that denotes the empty word
pub const EPSILON_SYMBOLS: [&str; 5] = ["epsilon", "$", "ε", "ϵ", "Є"];
pub const EPSILON: &str = EPSILON_SYMBOLS[0];

lazy_static! {
    static ref EPSILON_ALIASES: HashSet<&'static str> = EPSILON_SYMBOLS.iter().copied().collect();
}

impl InputSymbol {
    /// Create a new InputSymbol
    pub fn new(name: &str) -> Self {
        InputSymbol {
            name: name.to_string(),
        }
    }

    /// Create a new InputSymbol from a String
    pub fn from_string(name: String) -> Self {
        InputSymbol { name }
    }

    /// Get the name of the symbol
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Whether the symbol is one of the epsilon spellings
    pub fn is_epsilon(&self) -> bool {
        is_epsilon_name(&self.name)
    }
}

impl Display for InputSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub fn is_epsilon_name(name: &str) -> bool {
    EPSILON_ALIASES.contains(name)
}

/// The canonical epsilon symbol
pub fn epsilon() -> InputSymbol {
    InputSymbol::new(EPSILON)
}

/// Builds a symbol from its name, folding every epsilon alias onto the canonical one
pub fn to_symbol(name: &str) -> InputSymbol {
    if is_epsilon_name(name) {
        epsilon()
    } else {
        InputSymbol::new(name)
    }
}

pub fn char_to_symbol(c: char) -> InputSymbol {
    InputSymbol::from_string(c.to_string())
}

/// Splits a string into one symbol per character
pub fn word_from_str(word: &str) -> Vec<InputSymbol> {
    word.chars().map(char_to_symbol).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_fold_to_epsilon() {
        for alias in EPSILON_SYMBOLS {
            assert_eq!(to_symbol(alias), epsilon());
            assert!(InputSymbol::new(alias).is_epsilon());
        }
        assert!(!to_symbol("a").is_epsilon());
    }
}
