use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};

use crate::fa::state::State;
use crate::input_symbol::{is_epsilon_name, InputSymbol};

/// A symbol of the stack alphabet of a pushdown automaton
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StackSymbol {
    pub name: String,
}

impl StackSymbol {
    pub fn new(name: &str) -> Self {
        StackSymbol {
            name: name.to_string(),
        }
    }

    pub fn from_string(name: String) -> Self {
        StackSymbol { name }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn is_epsilon(&self) -> bool {
        is_epsilon_name(&self.name)
    }
}

impl Display for StackSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// `(state, input symbol or epsilon, top of the stack)`
pub type TransitionKey = (State, InputSymbol, StackSymbol);
/// `(next state, symbols replacing the top, first one on top)`
pub type TransitionValue = (State, Vec<StackSymbol>);

/// Transition relation of a pushdown automaton, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionFunction {
    transitions: Vec<(TransitionKey, Vec<TransitionValue>)>,
    index: FxHashMap<TransitionKey, usize>,
}

impl TransitionFunction {
    pub fn new() -> Self {
        TransitionFunction::default()
    }

    /// Adds a transition. Returns false when it was already present.
    pub fn add_transition(
        &mut self,
        s_from: State,
        input_symbol: InputSymbol,
        stack_from: StackSymbol,
        s_to: State,
        stack_to: Vec<StackSymbol>,
    ) -> bool {
        let key = (s_from, input_symbol, stack_from);
        let value = (s_to, stack_to);
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.index.insert(key.clone(), self.transitions.len());
                self.transitions.push((key, Vec::new()));
                self.transitions.len() - 1
            }
        };
        let values = &mut self.transitions[position].1;
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    /// Removes a transition. Returns whether it was present.
    pub fn remove_transition(&mut self, key: &TransitionKey, value: &TransitionValue) -> bool {
        let Some(&position) = self.index.get(key) else {
            return false;
        };
        let values = &mut self.transitions[position].1;
        match values.iter().position(|v| v == value) {
            Some(i) => {
                values.remove(i);
                true
            }
            None => false,
        }
    }

    /// The moves available from `(s_from, input_symbol, stack_from)`
    pub fn get(&self, s_from: &State, input_symbol: &InputSymbol, stack_from: &StackSymbol) -> &[TransitionValue] {
        let key = (s_from.clone(), input_symbol.clone(), stack_from.clone());
        match self.index.get(&key) {
            Some(&position) => &self.transitions[position].1,
            None => &[],
        }
    }

    pub fn get_number_transitions(&self) -> usize {
        self.transitions.iter().map(|(_, values)| values.len()).sum()
    }

    /// Every transition as a `(key, value)` pair
    pub fn iter(&self) -> impl Iterator<Item = (&TransitionKey, &TransitionValue)> {
        self.transitions
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
    }
}
