use crate::input_symbol::{word_from_str, InputSymbol};

pub trait Language {
    fn accepts(&self, input: &[InputSymbol]) -> bool;

    /// Splits the string into one symbol per character and checks membership.
    fn accepts_string(&self, input: &str) -> bool {
        self.accepts(&word_from_str(input))
    }
}
