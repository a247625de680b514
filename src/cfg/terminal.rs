use crate::input_symbol::{InputSymbol, EPSILON_SYMBOLS};

// Terminals are the input symbols of a grammar. Epsilon is a terminal too, but productions
// built in filtering mode drop it so that it only ever stands for an empty body.
pub type Terminal = InputSymbol;
pub const TERMINAL_EPSILON_SYMBOLS: [&str; 5] = EPSILON_SYMBOLS;

pub use crate::input_symbol::{epsilon, to_symbol as to_terminal};

impl Terminal {
    /// Textual form used by `CFG::to_text`, escaped when the name would read as a variable
    pub fn to_text(&self) -> String {
        match self.name.chars().next() {
            Some(c) if c.is_uppercase() => format!("\"TER:{}\"", self.name),
            _ => self.name.clone(),
        }
    }
}
