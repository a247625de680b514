use hashbrown::HashSet;

use crate::input_symbol::{epsilon, InputSymbol};

use super::dfa::DFA;
use super::epsilon_nfa::ENFA;
use super::nfa::NFA;
use super::state::State;

/// Conversions and language operations shared by every kind of finite automaton.
///
/// Grammar operations that combine with a regular language accept any implementor and work on
/// its deterministic form.
pub trait FiniteAutomaton {
    fn to_epsilon_automaton(&self) -> ENFA;

    fn remove_epsilon_transitions(&self) -> NFA {
        self.to_epsilon_automaton().remove_epsilon_transitions()
    }

    fn to_deterministic(&self) -> DFA {
        self.remove_epsilon_transitions().to_deterministic()
    }

    fn minimize(&self) -> DFA {
        self.to_deterministic().minimize()
    }

    fn is_empty(&self) -> bool {
        self.to_epsilon_automaton().is_empty()
    }

    fn union(&self, other: &Self) -> ENFA {
        self.to_epsilon_automaton()
            .union(&other.to_epsilon_automaton())
    }

    fn concat(&self, other: &Self) -> ENFA {
        self.to_epsilon_automaton()
            .concat(&other.to_epsilon_automaton())
    }

    fn intersection(&self, other: &Self) -> DFA {
        self.to_deterministic().intersection(&other.to_deterministic())
    }

    fn complement(&self) -> DFA {
        self.to_deterministic().complement()
    }

    /// Whether both automata accept the same language
    fn equals(&self, other: &Self) -> bool {
        let own = self.to_deterministic();
        let other = other.to_deterministic();
        let alphabet: Vec<InputSymbol> = own
            .alphabet
            .iter()
            .chain(other.alphabet.iter())
            .filter(|s| **s != epsilon())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let own = own.with_alphabet(&alphabet);
        let other = other.with_alphabet(&alphabet);
        own.intersection(&other.complement()).is_empty()
            && other.intersection(&own.complement()).is_empty()
    }
}

impl FiniteAutomaton for ENFA {
    fn to_epsilon_automaton(&self) -> ENFA {
        self.clone()
    }
}

impl FiniteAutomaton for NFA {
    fn to_epsilon_automaton(&self) -> ENFA {
        let mut enfa = ENFA {
            state_index_map: self.state_index_map.clone(),
            alphabet_index_map: self.alphabet_index_map.clone(),
            states: self.states.clone(),
            alphabet: self.alphabet.clone(),
            transitions: self.transitions.clone(),
            start_state: None,
            accept_states: self.accept_states.clone(),
        };
        // a fresh start state with epsilon moves to the old start states
        let mut name = String::from("start");
        while enfa.state_index_map.contains_key(&State::new(&name)) {
            name.push('\'');
        }
        let start = State::from_string(name);
        enfa.set_start_state(start.clone());
        for &old_start in self.start_states.iter() {
            let target = self.states[old_start].clone();
            enfa.add_transition(&start, &epsilon(), &target);
        }
        enfa
    }

    fn remove_epsilon_transitions(&self) -> NFA {
        self.clone()
    }

    fn to_deterministic(&self) -> DFA {
        NFA::to_deterministic(self)
    }
}

impl FiniteAutomaton for DFA {
    fn to_epsilon_automaton(&self) -> ENFA {
        ENFA {
            state_index_map: self.state_index_map.clone(),
            alphabet_index_map: self.alphabet_index_map.clone(),
            states: self.states.clone(),
            alphabet: self.alphabet.clone(),
            transitions: self
                .transitions
                .iter()
                .map(|x| x.iter().map(|(k, v)| (*k, HashSet::from([*v]))).collect())
                .collect(),
            start_state: self.start_state,
            accept_states: self.accept_states.clone(),
        }
    }

    fn to_deterministic(&self) -> DFA {
        self.clone()
    }

    fn minimize(&self) -> DFA {
        DFA::minimize(self)
    }

    fn is_empty(&self) -> bool {
        DFA::is_empty(self)
    }

    fn intersection(&self, other: &Self) -> DFA {
        DFA::intersection(self, other)
    }

    fn complement(&self) -> DFA {
        DFA::complement(self)
    }
}
