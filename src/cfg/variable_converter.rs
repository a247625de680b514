use rustc_hash::FxHashMap;
use std::hash::Hash;

use crate::cfg::variable::Variable;

#[derive(Debug, Clone, Default)]
struct Conversion {
    valid: bool,
    variable: Option<Variable>,
}

/// Maps `(state, symbol, state)` triples to fresh grammar variables.
///
/// States and symbols receive dense indices the first time they are seen. A triple gets its
/// variable on first request and keeps it for the lifetime of the converter. Independently of
/// that, a triple can be flagged valid, so that `is_valid_and_get` only materialises variables
/// for triples that were flagged before.
#[derive(Debug, Clone)]
pub struct VariableConverter<S: Hash + Eq + Clone, X: Hash + Eq + Clone> {
    state_indices: FxHashMap<S, usize>,
    symbol_indices: FxHashMap<X, usize>,
    conversions: FxHashMap<(usize, usize, usize), Conversion>,
    counter: usize,
}

impl<S: Hash + Eq + Clone, X: Hash + Eq + Clone> VariableConverter<S, X> {
    pub fn new() -> Self {
        VariableConverter {
            state_indices: FxHashMap::default(),
            symbol_indices: FxHashMap::default(),
            conversions: FxHashMap::default(),
            counter: 0,
        }
    }

    fn _state_index(&mut self, state: &S) -> usize {
        let next = self.state_indices.len();
        *self.state_indices.entry(state.clone()).or_insert(next)
    }

    fn _symbol_index(&mut self, symbol: &X) -> usize {
        let next = self.symbol_indices.len();
        *self.symbol_indices.entry(symbol.clone()).or_insert(next)
    }

    fn _key(&mut self, state0: &S, symbol: &X, state1: &S) -> (usize, usize, usize) {
        (
            self._state_index(state0),
            self._symbol_index(symbol),
            self._state_index(state1),
        )
    }

    fn _fresh_variable(&mut self) -> Variable {
        let variable = Variable::from_string(self.counter.to_string());
        self.counter += 1;
        variable
    }

    /// The variable standing for the triple, allocated on first request
    pub fn to_combined(&mut self, state0: &S, symbol: &X, state1: &S) -> Variable {
        let key = self._key(state0, symbol, state1);
        if let Some(variable) = self.conversions.get(&key).and_then(|c| c.variable.clone()) {
            return variable;
        }
        let variable = self._fresh_variable();
        self.conversions.entry(key).or_default().variable = Some(variable.clone());
        variable
    }

    /// Flags the triple as corresponding to a reachable configuration
    pub fn set_valid(&mut self, state0: &S, symbol: &X, state1: &S) {
        let key = self._key(state0, symbol, state1);
        self.conversions.entry(key).or_default().valid = true;
    }

    /// The variable of the triple if it was flagged valid, `None` otherwise
    pub fn is_valid_and_get(&mut self, state0: &S, symbol: &X, state1: &S) -> Option<Variable> {
        let key = self._key(state0, symbol, state1);
        if !self.conversions.get(&key).map_or(false, |c| c.valid) {
            return None;
        }
        Some(self.to_combined(state0, symbol, state1))
    }

    /// Number of variables allocated so far
    pub fn len(&self) -> usize {
        self.counter
    }

    pub fn is_empty(&self) -> bool {
        self.counter == 0
    }
}

impl<S: Hash + Eq + Clone, X: Hash + Eq + Clone> Default for VariableConverter<S, X> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_triple_same_variable() {
        let mut converter: VariableConverter<&str, &str> = VariableConverter::new();
        let first = converter.to_combined(&"p", &"X", &"q");
        let again = converter.to_combined(&"p", &"X", &"q");
        assert_eq!(first, again);
        assert_eq!(converter.len(), 1);
    }

    #[test]
    fn distinct_triples_distinct_variables() {
        let mut converter: VariableConverter<&str, &str> = VariableConverter::new();
        let x = converter.to_combined(&"p", &"X", &"q");
        let y = converter.to_combined(&"p", &"Y", &"q");
        let swapped = converter.to_combined(&"q", &"X", &"p");
        assert_ne!(x, y);
        assert_ne!(x, swapped);
        assert_ne!(y, swapped);
    }

    #[test]
    fn validity_gates_materialisation() {
        let mut converter: VariableConverter<u32, char> = VariableConverter::new();
        assert_eq!(converter.is_valid_and_get(&0, &'A', &1), None);
        assert!(converter.is_empty());
        converter.set_valid(&0, &'A', &1);
        let variable = converter.is_valid_and_get(&0, &'A', &1);
        assert!(variable.is_some());
        assert_eq!(variable, Some(converter.to_combined(&0, &'A', &1)));
        assert_eq!(converter.is_valid_and_get(&1, &'A', &0), None);
    }
}
