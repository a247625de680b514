pub mod cfg;
pub mod cyk_table;
pub mod parse_tree;
pub mod production;
pub mod set_queue;
pub mod terminal;
pub mod variable;
pub mod variable_converter;
