use hashbrown::{HashMap, HashSet};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::fmt::Display;

use crate::fa::state::State;
use crate::input_symbol::InputSymbol;
use crate::language::Language;

/// A deterministic finite automaton over named states.
///
/// States and symbols are interned into dense indices; transitions are stored per state as a
/// map from symbol index to the next state index. Missing transitions reject.
#[derive(Debug, Clone, Default)]
pub struct DFA {
    pub state_index_map: HashMap<State, usize>,
    pub alphabet_index_map: HashMap<InputSymbol, usize>,

    pub states: Vec<State>,
    pub alphabet: Vec<InputSymbol>,

    pub transitions: Vec<HashMap<usize, usize>>, // state -> symbol -> next state
    pub start_state: Option<usize>,
    pub accept_states: HashSet<usize>,
}

impl DFA {
    /// Creates an automaton without any state, it accepts nothing
    pub fn new() -> Self {
        DFA::default()
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

    pub fn add_state(&mut self, state: State) {
        self._add_state(&state);
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

    /// Adds the transition `from --symbol--> to`, replacing any previous target for that pair
    pub fn add_transition(&mut self, from: &State, symbol: &InputSymbol, to: &State) {
        let from_index = self._add_state(from);
        let to_index = self._add_state(to);
        let symbol_index = self._add_symbol(symbol);
        self.transitions[from_index].insert(symbol_index, to_index);
    }

    pub fn get_start_state(&self) -> Option<&State> {
        self.start_state.map(|s| &self.states[s])
    }

    pub fn get_states(&self) -> &[State] {
        &self.states
    }

    pub fn get_accept_states(&self) -> HashSet<State> {
        self.accept_states
            .iter()
            .map(|&s| self.states[s].clone())
            .collect()
    }

    pub fn is_accept_state(&self, state: &State) -> bool {
        self.state_index_map
            .get(state)
            .map_or(false, |s| self.accept_states.contains(s))
    }

    pub fn get_transitions(&self) -> Vec<(State, InputSymbol, State)> {
        let mut transitions = Vec::new();
        for (from, targets) in self.transitions.iter().enumerate() {
            for (&symbol, &to) in targets.iter() {
                transitions.push((
                    self.states[from].clone(),
                    self.alphabet[symbol].clone(),
                    self.states[to].clone(),
                ));
            }
        }
        transitions
    }

    fn _next_state(&self, state: usize, symbol: usize) -> Option<usize> {
        self.transitions[state].get(&symbol).copied()
    }

    /// The state reached from `state` on `symbol`, if any
    pub fn get_next_state(&self, state: &State, symbol: &InputSymbol) -> Option<&State> {
        let state = *self.state_index_map.get(state)?;
        let symbol = *self.alphabet_index_map.get(symbol)?;
        self._next_state(state, symbol).map(|s| &self.states[s])
    }

    /// Builds a DFA whose states are sets of states of another automaton.
    /// `subsets[0]` must be the start subset.
    pub(crate) fn from_subsets(
        subsets: Vec<BTreeSet<usize>>,
        subset_transitions: Vec<HashMap<usize, usize>>,
        accepting: HashSet<usize>,
        alphabet: Vec<InputSymbol>,
    ) -> DFA {
        let states: Vec<State> = (0..subsets.len())
            .map(|i| State::from_string(format!("q{}", i)))
            .collect();
        let state_index_map = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        let alphabet_index_map = alphabet
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i))
            .collect();
        DFA {
            state_index_map,
            alphabet_index_map,
            start_state: if states.is_empty() { None } else { Some(0) },
            states,
            alphabet,
            transitions: subset_transitions,
            accept_states: accepting,
        }
    }

    /// The states reachable from `state`, itself included
    pub fn reachable_states(&self, state: usize) -> HashSet<usize> {
        let mut reachable = HashSet::from([state]);
        let mut stack = vec![state];
        while let Some(current) = stack.pop() {
            for &next in self.transitions[current].values() {
                if reachable.insert(next) {
                    stack.push(next);
                }
            }
        }
        reachable
    }

    /// The states from which an accept state can be reached
    pub fn leading_to_accept_states(&self) -> HashSet<usize> {
        let mut predecessors: Vec<HashSet<usize>> = vec![HashSet::new(); self.states.len()];
        for (from, targets) in self.transitions.iter().enumerate() {
            for &to in targets.values() {
                predecessors[to].insert(from);
            }
        }
        let mut leading = self.accept_states.clone();
        let mut stack: Vec<usize> = self.accept_states.iter().copied().collect();
        while let Some(current) = stack.pop() {
            for &previous in predecessors[current].iter() {
                if leading.insert(previous) {
                    stack.push(previous);
                }
            }
        }
        leading
    }

    /// Hopcroft refinement of `states` into blocks of indistinguishable states
    pub fn partition_states(&self, states: &HashSet<usize>) -> Vec<BTreeSet<usize>> {
        let mut predecessors: Vec<Vec<Vec<usize>>> =
            vec![vec![Vec::new(); self.alphabet.len()]; self.states.len()];
        for (from, targets) in self.transitions.iter().enumerate() {
            for (&symbol, &to) in targets.iter() {
                predecessors[to][symbol].push(from);
            }
        }

        let accepting: BTreeSet<usize> = states.intersection(&self.accept_states).copied().collect();
        let rejecting: BTreeSet<usize> = states.difference(&self.accept_states).copied().collect();
        let mut partition: HashSet<BTreeSet<usize>> = [accepting, rejecting]
            .into_iter()
            .filter(|block| !block.is_empty())
            .collect();
        let mut waiting: HashSet<BTreeSet<usize>> = partition.clone();

        while let Some(splitter) = waiting.iter().next().cloned() {
            waiting.remove(&splitter);
            for symbol in 0..self.alphabet.len() {
                let incoming: BTreeSet<usize> = splitter
                    .iter()
                    .flat_map(|&s| predecessors[s][symbol].iter().copied())
                    .collect();
                if incoming.is_empty() {
                    continue;
                }
                let mut refined = Vec::new();
                for block in partition.iter() {
                    let inside: BTreeSet<usize> = block.intersection(&incoming).copied().collect();
                    if inside.is_empty() || inside.len() == block.len() {
                        continue;
                    }
                    let outside: BTreeSet<usize> = block.difference(&inside).copied().collect();
                    refined.push((block.clone(), inside, outside));
                }
                for (block, inside, outside) in refined {
                    partition.remove(&block);
                    if waiting.remove(&block) {
                        waiting.insert(inside.clone());
                        waiting.insert(outside.clone());
                    } else if inside.len() <= outside.len() {
                        waiting.insert(inside.clone());
                    } else {
                        waiting.insert(outside.clone());
                    }
                    partition.insert(inside);
                    partition.insert(outside);
                }
            }
        }
        let mut blocks: Vec<BTreeSet<usize>> = partition.into_iter().collect();
        blocks.sort();
        blocks
    }

    /// The minimal DFA for the same language, trimmed to useful states
    pub fn minimize(&self) -> DFA {
        let start = match self.start_state {
            Some(start) => start,
            None => return DFA::new(),
        };
        let useful: HashSet<usize> = self
            .reachable_states(start)
            .intersection(&self.leading_to_accept_states())
            .copied()
            .collect();
        if !useful.contains(&start) {
            let mut dfa = DFA::new();
            dfa.set_start_state(State::new("q0"));
            return dfa;
        }

        let mut blocks = self.partition_states(&useful);
        // the block of the start state comes first
        if let Some(position) = blocks.iter().position(|b| b.contains(&start)) {
            blocks.swap(0, position);
        }
        let mut block_of: HashMap<usize, usize> = HashMap::new();
        for (i, block) in blocks.iter().enumerate() {
            for &state in block {
                block_of.insert(state, i);
            }
        }

        let mut transitions: Vec<HashMap<usize, usize>> = vec![HashMap::new(); blocks.len()];
        for (from, targets) in self.transitions.iter().enumerate() {
            let Some(&from_block) = block_of.get(&from) else {
                continue;
            };
            for (&symbol, to) in targets.iter() {
                if let Some(&to_block) = block_of.get(to) {
                    transitions[from_block].insert(symbol, to_block);
                }
            }
        }
        let accepting = self
            .accept_states
            .iter()
            .filter_map(|s| block_of.get(s).copied())
            .collect();
        DFA::from_subsets(blocks, transitions, accepting, self.alphabet.clone())
    }

    /// Whether no word is accepted
    pub fn is_empty(&self) -> bool {
        let start = match self.start_state {
            Some(start) => start,
            None => return true,
        };
        let mut seen: FxHashSet<usize> = FxHashSet::from_iter([start]);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if self.accept_states.contains(&current) {
                return false;
            }
            for &next in self.transitions[current].values() {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        true
    }

    /// The same automaton with `alphabet` added to its own
    pub fn with_alphabet(&self, alphabet: &[InputSymbol]) -> DFA {
        let mut result = self.clone();
        for symbol in alphabet {
            result._add_symbol(symbol);
        }
        result
    }

    /// Accepts exactly the words over the alphabet that this DFA rejects
    pub fn complement(&self) -> DFA {
        let mut result = self.clone();
        let sink = result._add_state(&State::new("#SINK#"));
        if result.start_state.is_none() {
            result.start_state = Some(sink);
        }
        let symbols = result.alphabet.len();
        for targets in result.transitions.iter_mut() {
            for symbol in 0..symbols {
                targets.entry(symbol).or_insert(sink);
            }
        }
        result.accept_states = (0..result.states.len())
            .filter(|s| !self.accept_states.contains(s))
            .collect();
        result
    }

    /// Product automaton over the pairs reachable from the two start states
    pub fn intersection(&self, other: &DFA) -> DFA {
        let mut result = DFA::new();
        let (Some(own_start), Some(other_start)) = (self.start_state, other.start_state) else {
            return result;
        };
        let name = |i: usize, j: usize| {
            State::from_string(format!("{}-{}", self.states[i].name, other.states[j].name))
        };
        result.set_start_state(name(own_start, other_start));
        let mut seen: HashSet<(usize, usize)> = HashSet::from([(own_start, other_start)]);
        let mut stack = vec![(own_start, other_start)];
        while let Some((i, j)) = stack.pop() {
            let from = name(i, j);
            if self.accept_states.contains(&i) && other.accept_states.contains(&j) {
                result.add_accept_state(from.clone());
            }
            for (&symbol, &own_next) in self.transitions[i].iter() {
                let Some(&other_symbol) = other.alphabet_index_map.get(&self.alphabet[symbol])
                else {
                    continue;
                };
                let Some(other_next) = other._next_state(j, other_symbol) else {
                    continue;
                };
                result.add_transition(&from, &self.alphabet[symbol], &name(own_next, other_next));
                if seen.insert((own_next, other_next)) {
                    stack.push((own_next, other_next));
                }
            }
        }
        result
    }
}

impl Language for DFA {
    fn accepts(&self, input: &[InputSymbol]) -> bool {
        let Some(mut current) = self.start_state else {
            return false;
        };
        for symbol in input {
            let next = self
                .alphabet_index_map
                .get(symbol)
                .and_then(|&s| self._next_state(current, s));
            match next {
                Some(next) => current = next,
                None => return false,
            }
        }
        self.accept_states.contains(&current)
    }
}

impl Display for DFA {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "DFA {{")?;
        if let Some(start) = self.get_start_state() {
            writeln!(f, "  Start State: {}", start)?;
        }
        let mut accepting: Vec<String> = self
            .get_accept_states()
            .iter()
            .map(|s| s.to_string())
            .collect();
        accepting.sort();
        writeln!(f, "  Accept States: {}", accepting.join(", "))?;
        for (from, symbol, to) in self.get_transitions() {
            writeln!(f, "    {} -- {} --> {}", from, symbol, to)?;
        }
        writeln!(f, "}}")
    }
}
