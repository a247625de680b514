use std::fmt::{Display, Formatter};

use crate::cfg::production::Symbol;

/// A derivation tree. Inner nodes are variables; a variable without sons derives the empty word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    pub value: Symbol,
    pub sons: Vec<ParseTree>,
}

impl ParseTree {
    /// Create a leaf node
    pub fn new(value: Symbol) -> Self {
        ParseTree {
            value,
            sons: Vec::new(),
        }
    }

    pub fn with_sons(value: Symbol, sons: Vec<ParseTree>) -> Self {
        ParseTree { value, sons }
    }

    pub fn is_leaf(&self) -> bool {
        self.sons.is_empty()
    }

    /// The symbols at the leaves, left to right
    pub fn get_leaves(&self) -> Vec<&Symbol> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.sons.is_empty() {
                leaves.push(&node.value);
            } else {
                stack.extend(node.sons.iter().rev());
            }
        }
        leaves
    }

    /// The sentential forms of the derivation that always rewrites the leftmost variable
    pub fn get_leftmost_derivation(&self) -> Vec<Vec<Symbol>> {
        self._derivation(|frontier| frontier.iter().position(|n| n.value.is_variable()))
    }

    /// The sentential forms of the derivation that always rewrites the rightmost variable
    pub fn get_rightmost_derivation(&self) -> Vec<Vec<Symbol>> {
        self._derivation(|frontier| frontier.iter().rposition(|n| n.value.is_variable()))
    }

    fn _derivation<F>(&self, pick: F) -> Vec<Vec<Symbol>>
    where
        F: Fn(&[&ParseTree]) -> Option<usize>,
    {
        let mut frontier: Vec<&ParseTree> = vec![self];
        let mut derivation = vec![vec![self.value.clone()]];
        while let Some(index) = pick(&frontier) {
            let node = frontier[index];
            frontier.splice(index..index + 1, node.sons.iter());
            derivation.push(frontier.iter().map(|n| n.value.clone()).collect());
        }
        derivation
    }

    /// Pretty print the tree with indentation
    pub fn pretty_print(&self) -> String {
        self.pretty_print_indent(0)
    }

    fn pretty_print_indent(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        if self.sons.is_empty() {
            format!("{}{}", prefix, self.value)
        } else {
            let sons: Vec<String> = self
                .sons
                .iter()
                .map(|s| s.pretty_print_indent(indent + 1))
                .collect();
            format!("{}({}\n{})", prefix, self.value, sons.join("\n"))
        }
    }
}

impl Display for ParseTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_print())
    }
}
