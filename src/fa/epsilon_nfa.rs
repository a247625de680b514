use crate::fa::nfa::NFA;
use crate::fa::state::State;
use crate::input_symbol::{epsilon, InputSymbol};
use crate::language::Language;
use hashbrown::{HashMap, HashSet};

/// A nondeterministic finite automaton with epsilon moves and a single start state
#[derive(Debug, Clone, Default)]
pub struct ENFA {
    pub state_index_map: HashMap<State, usize>,
    pub alphabet_index_map: HashMap<InputSymbol, usize>,

    pub states: Vec<State>,
    pub alphabet: Vec<InputSymbol>,

    pub transitions: Vec<HashMap<usize, HashSet<usize>>>, // state -> symbol -> next states
    pub start_state: Option<usize>,
    pub accept_states: HashSet<usize>,
}

impl ENFA {
    pub fn new() -> Self {
        ENFA::default()
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

    fn _add_symbol(&mut self, symbol: &InputSymbol) -> usize {
        if let Some(&index) = self.alphabet_index_map.get(symbol) {
            return index;
        }
        let index = self.alphabet.len();
        self.alphabet.push(symbol.clone());
        self.alphabet_index_map.insert(symbol.clone(), index);
        index
    }

    /// Sets the start state
    pub fn set_start_state(&mut self, start_state: State) {
        self.start_state = Some(self._add_state(&start_state));
    }

    /// Adds a new accept state
    pub fn add_accept_state(&mut self, accept_state: State) {
        let index = self._add_state(&accept_state);
        self.accept_states.insert(index);
    }

    /// Adds a transition from state `from` to state `to` on input `symbol`.
    /// Every epsilon alias is stored as the canonical epsilon.
    pub fn add_transition(&mut self, from: &State, symbol: &InputSymbol, to: &State) {
        let from_index = self._add_state(from);
        let to_index = self._add_state(to);
        let symbol = if symbol.is_epsilon() { epsilon() } else { symbol.clone() };
        let symbol_index = self._add_symbol(&symbol);
        self.transitions[from_index]
            .entry(symbol_index)
            .or_default()
            .insert(to_index);
    }

    fn _epsilon_closure(&self, states: HashSet<usize>) -> HashSet<usize> {
        let Some(&epsilon_index) = self.alphabet_index_map.get(&epsilon()) else {
            return states;
        };
        let mut closure = states.clone();
        let mut stack: Vec<usize> = states.into_iter().collect();
        while let Some(state) = stack.pop() {
            if let Some(next_states) = self.transitions[state].get(&epsilon_index) {
                for &next in next_states {
                    if closure.insert(next) {
                        stack.push(next);
                    }
                }
            }
        }
        closure
    }

    /// States reachable from `states` through epsilon moves only
    pub fn epsilon_closure(&self, states: &HashSet<State>) -> HashSet<State> {
        let indices = states
            .iter()
            .filter_map(|s| self.state_index_map.get(s).copied())
            .collect();
        self._epsilon_closure(indices)
            .into_iter()
            .map(|s| self.states[s].clone())
            .collect()
    }

    fn _next_states(&self, states: &HashSet<usize>, symbol: usize) -> HashSet<usize> {
        let mut next_states = HashSet::new();
        for &state in states {
            if let Some(targets) = self.transitions[state].get(&symbol) {
                next_states.extend(targets);
            }
        }
        next_states
    }

    /// Computes an equivalent NFA without epsilon moves, over the alphabet without epsilon
    pub fn remove_epsilon_transitions(&self) -> NFA {
        let epsilon_index = self.alphabet_index_map.get(&epsilon()).copied();
        let mut nfa = NFA::new();
        for state in &self.states {
            nfa.states.push(state.clone());
            nfa.transitions.push(HashMap::new());
        }
        nfa.state_index_map = self.state_index_map.clone();

        let mut symbol_map: Vec<Option<usize>> = Vec::with_capacity(self.alphabet.len());
        for (i, symbol) in self.alphabet.iter().enumerate() {
            if Some(i) == epsilon_index {
                symbol_map.push(None);
                continue;
            }
            symbol_map.push(Some(nfa.alphabet.len()));
            nfa.alphabet_index_map.insert(symbol.clone(), nfa.alphabet.len());
            nfa.alphabet.push(symbol.clone());
        }

        if let Some(start) = self.start_state {
            nfa.start_states = self._epsilon_closure(HashSet::from([start]));
        }
        nfa.accept_states = self.accept_states.clone();
        for state in 0..self.states.len() {
            for closure_state in self._epsilon_closure(HashSet::from([state])) {
                for (symbol, next_states) in self.transitions[closure_state].iter() {
                    let Some(new_symbol) = symbol_map[*symbol] else {
                        continue;
                    };
                    nfa.transitions[state]
                        .entry(new_symbol)
                        .or_default()
                        .extend(next_states);
                }
                if self.accept_states.contains(&closure_state) {
                    nfa.accept_states.insert(state);
                }
            }
        }
        nfa
    }

    /// Copies the states and transitions of `other` into `self`, renaming clashing states.
    /// Returns the index offset of the copied states.
    fn _absorb(&mut self, other: &ENFA) -> usize {
        let offset = self.states.len();
        for state in &other.states {
            let mut name = state.name.clone();
            while self.state_index_map.contains_key(&State::new(&name)) {
                name.push('\'');
            }
            self._add_state(&State::from_string(name));
        }
        let symbol_map: Vec<usize> = other.alphabet.iter().map(|s| self._add_symbol(s)).collect();
        for (from, targets) in other.transitions.iter().enumerate() {
            for (symbol, next_states) in targets {
                self.transitions[from + offset]
                    .entry(symbol_map[*symbol])
                    .or_default()
                    .extend(next_states.iter().map(|s| s + offset));
            }
        }
        offset
    }

    fn _fresh_state(&mut self, prefix: &str) -> usize {
        let mut name = prefix.to_string();
        while self.state_index_map.contains_key(&State::new(&name)) {
            name.push('\'');
        }
        self._add_state(&State::from_string(name))
    }

    /// Accepts the words accepted by either automaton
    pub fn union(&self, other: &ENFA) -> ENFA {
        let mut result = self.clone();
        let offset = result._absorb(other);
        result
            .accept_states
            .extend(other.accept_states.iter().map(|s| s + offset));
        let start = result._fresh_state("start");
        let epsilon_index = result._add_symbol(&epsilon());
        let targets = result.transitions[start].entry(epsilon_index).or_default();
        targets.extend(self.start_state);
        targets.extend(other.start_state.map(|s| s + offset));
        result.start_state = Some(start);
        result
    }

    /// Accepts the words `uv` with `u` accepted by `self` and `v` by `other`
    pub fn concat(&self, other: &ENFA) -> ENFA {
        let mut result = self.clone();
        let offset = result._absorb(other);
        if let Some(other_start) = other.start_state {
            let epsilon_index = result._add_symbol(&epsilon());
            for &accept in self.accept_states.iter() {
                result.transitions[accept]
                    .entry(epsilon_index)
                    .or_default()
                    .insert(other_start + offset);
            }
            result.accept_states = other.accept_states.iter().map(|s| s + offset).collect();
        } else {
            result.accept_states.clear();
        }
        result
    }

    /// Whether no accept state is reachable from the start state
    pub fn is_empty(&self) -> bool {
        let Some(start) = self.start_state else {
            return true;
        };
        let mut seen: HashSet<usize> = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(state) = stack.pop() {
            if self.accept_states.contains(&state) {
                return false;
            }
            for next in self.transitions[state].values().flatten() {
                if seen.insert(*next) {
                    stack.push(*next);
                }
            }
        }
        true
    }
}

impl Language for ENFA {
    fn accepts(&self, input: &[InputSymbol]) -> bool {
        let Some(start) = self.start_state else {
            return false;
        };
        let mut current = self._epsilon_closure(HashSet::from([start]));
        for symbol in input {
            match self.alphabet_index_map.get(symbol) {
                Some(&symbol_index) => {
                    current = self._epsilon_closure(self._next_states(&current, symbol_index));
                }
                None => return false,
            }
        }
        !self.accept_states.is_disjoint(&current)
    }
}
