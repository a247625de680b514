pub mod indexed_grammar;
pub mod rule_ordering;
pub mod rules;
