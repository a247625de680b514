#[macro_use]
extern crate lazy_static;

pub mod cfg;
pub mod error;
pub mod fa;
pub mod indexed_grammar;
pub mod input_symbol;
pub mod language;
pub mod pda;
