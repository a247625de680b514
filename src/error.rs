use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormlangError {
    /// The word is not generated by the grammar, so no parse tree exists.
    #[error("no derivation exists for the word `{word}`")]
    DerivationNotFound { word: String },

    /// A grammar line without an arrow.
    #[error("malformed grammar rule: {line}")]
    MalformedRule { line: String },

    /// A `"VAR:` or `"TER:` escape missing its closing quote.
    #[error("malformed symbol `{symbol}`, escaped symbols must end with a quote")]
    MalformedSymbol { symbol: String },

    #[error("unknown rule ordering code {0}, expected 0 to 8")]
    UnknownRuleOrdering(u8),

    /// Intersection with an operand that is not a regular language.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, FormlangError>;
