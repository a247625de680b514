pub mod pda;
pub mod transition_function;
