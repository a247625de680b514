use crate::fa::dfa::DFA;
use crate::fa::state::State;
use crate::input_symbol::InputSymbol;
use crate::language::Language;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeSet;

/// A nondeterministic finite automaton without epsilon moves, possibly with several start states
#[derive(Debug, Clone, Default)]
pub struct NFA {
    pub state_index_map: HashMap<State, usize>,
    pub alphabet_index_map: HashMap<InputSymbol, usize>,

    pub states: Vec<State>,
    pub alphabet: Vec<InputSymbol>,

    pub transitions: Vec<HashMap<usize, HashSet<usize>>>, // state -> symbol -> next states
    pub start_states: HashSet<usize>,
    pub accept_states: HashSet<usize>,
}

impl NFA {
    pub fn new() -> Self {
        NFA::default()
    }

    fn _add_state(&mut self, state: &State) -> usize {
        if let Some(&index) = self.state_index_map.get(state) {
            return index;
        }
        let index = self.states.len();
        self.states.push(state.clone());
        self.transitions.push(HashMap::new());
        self.state_index_map.insert(state.clone(), index);
        index
    }

    pub fn add_start_state(&mut self, start_state: State) {
        let index = self._add_state(&start_state);
        self.start_states.insert(index);
    }

    pub fn add_accept_state(&mut self, accept_state: State) {
        let index = self._add_state(&accept_state);
        self.accept_states.insert(index);
    }

    /// Adds a transition from state `from` to state `to` on input `symbol`
    pub fn add_transition(&mut self, from: &State, symbol: &InputSymbol, to: &State) {
        let from_index = self._add_state(from);
        let to_index = self._add_state(to);
        let next = self.alphabet.len();
        let symbol_index = *self
            .alphabet_index_map
            .entry(symbol.clone())
            .or_insert(next);
        if symbol_index == next {
            self.alphabet.push(symbol.clone());
        }
        self.transitions[from_index]
            .entry(symbol_index)
            .or_default()
            .insert(to_index);
    }

    fn _next_states<'a, I: IntoIterator<Item = &'a usize>>(
        &self,
        states: I,
        symbol: usize,
    ) -> BTreeSet<usize> {
        let mut next_states = BTreeSet::new();
        for &state in states {
            if let Some(targets) = self.transitions[state].get(&symbol) {
                next_states.extend(targets.iter().copied());
            }
        }
        next_states
    }

    /// Subset construction; the DFA only contains the subsets reachable from the start states
    pub fn to_deterministic(&self) -> DFA {
        let start: BTreeSet<usize> = self.start_states.iter().copied().collect();
        let mut subsets: Vec<BTreeSet<usize>> = vec![start.clone()];
        let mut subset_index: HashMap<BTreeSet<usize>, usize> = HashMap::from([(start, 0)]);
        let mut subset_transitions: Vec<HashMap<usize, usize>> = vec![HashMap::new()];
        let mut accepting: HashSet<usize> = HashSet::new();

        let mut to_process = vec![0];
        while let Some(current) = to_process.pop() {
            let current_states = subsets[current].clone();
            if current_states.iter().any(|s| self.accept_states.contains(s)) {
                accepting.insert(current);
            }
            let symbols: BTreeSet<usize> = current_states
                .iter()
                .flat_map(|&s| self.transitions[s].keys().copied())
                .collect();
            for symbol in symbols {
                let next_states = self._next_states(&current_states, symbol);
                if next_states.is_empty() {
                    continue;
                }
                let next = match subset_index.get(&next_states) {
                    Some(&next) => next,
                    None => {
                        let next = subsets.len();
                        subsets.push(next_states.clone());
                        subset_transitions.push(HashMap::new());
                        subset_index.insert(next_states, next);
                        to_process.push(next);
                        next
                    }
                };
                subset_transitions[current].insert(symbol, next);
            }
        }
        DFA::from_subsets(subsets, subset_transitions, accepting, self.alphabet.clone())
    }
}

impl Language for NFA {
    fn accepts(&self, input: &[InputSymbol]) -> bool {
        let mut current: BTreeSet<usize> = self.start_states.iter().copied().collect();
        for symbol in input {
            match self.alphabet_index_map.get(symbol) {
                Some(&symbol_index) => current = self._next_states(&current, symbol_index),
                None => return false,
            }
        }
        current.iter().any(|s| self.accept_states.contains(s))
    }
}
