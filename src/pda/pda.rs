use rustc_hash::FxHashSet;
use std::collections::{BTreeSet, VecDeque};
use std::fmt::{Display, Formatter};
use tracing::debug;

use crate::cfg::cfg::CFG;
use crate::cfg::production::{Production, Symbol};
use crate::cfg::terminal::Terminal;
use crate::cfg::variable::Variable;
use crate::cfg::variable_converter::VariableConverter;
use crate::fa::dfa::DFA;
use crate::fa::state::State;
use crate::input_symbol::{epsilon, to_symbol, InputSymbol};

use super::transition_function::{StackSymbol, TransitionFunction};

const TERMINAL_STACK_PREFIX: &str = "#TERM#";

/// A nondeterministic pushdown automaton.
///
/// A transition `(p, a, X) -> (q, [Y1, .., Yn])` reads `a` (or nothing when `a` is epsilon),
/// pops `X` and pushes the `Yi` so that `Y1` ends on top. Epsilon stack symbols in a pushed
/// sequence are dropped.
#[derive(Debug, Clone, Default)]
pub struct PDA {
    states: BTreeSet<State>,
    input_symbols: BTreeSet<InputSymbol>,
    stack_alphabet: BTreeSet<StackSymbol>,
    transition_function: TransitionFunction,
    start_state: Option<State>,
    start_stack_symbol: Option<StackSymbol>,
    final_states: BTreeSet<State>,
}

impl PDA {
    pub fn new() -> Self {
        PDA::default()
    }

    pub fn set_start_state(&mut self, start_state: State) {
        self.states.insert(start_state.clone());
        self.start_state = Some(start_state);
    }

    pub fn set_start_stack_symbol(&mut self, start_stack_symbol: StackSymbol) {
        self.stack_alphabet.insert(start_stack_symbol.clone());
        self.start_stack_symbol = Some(start_stack_symbol);
    }

    pub fn add_final_state(&mut self, state: State) {
        self.states.insert(state.clone());
        self.final_states.insert(state);
    }

    /// Adds a transition, registering its states and symbols
    pub fn add_transition(
        &mut self,
        s_from: &State,
        input_symbol: &InputSymbol,
        stack_from: &StackSymbol,
        s_to: &State,
        stack_to: &[StackSymbol],
    ) {
        let input_symbol = to_symbol(input_symbol.get_name());
        let stack_to: Vec<StackSymbol> = stack_to.iter().filter(|s| !s.is_epsilon()).cloned().collect();
        self.states.insert(s_from.clone());
        self.states.insert(s_to.clone());
        if !input_symbol.is_epsilon() {
            self.input_symbols.insert(input_symbol.clone());
        }
        self.stack_alphabet.insert(stack_from.clone());
        self.stack_alphabet.extend(stack_to.iter().cloned());
        self.transition_function.add_transition(
            s_from.clone(),
            input_symbol,
            stack_from.clone(),
            s_to.clone(),
            stack_to,
        );
    }

    /// Removes a transition, normalised the same way as in `add_transition`.
    /// States and symbols stay in the automaton.
    pub fn remove_transition(
        &mut self,
        s_from: &State,
        input_symbol: &InputSymbol,
        stack_from: &StackSymbol,
        s_to: &State,
        stack_to: &[StackSymbol],
    ) -> bool {
        let key = (s_from.clone(), to_symbol(input_symbol.get_name()), stack_from.clone());
        let value = (
            s_to.clone(),
            stack_to.iter().filter(|s| !s.is_epsilon()).cloned().collect(),
        );
        self.transition_function.remove_transition(&key, &value)
    }

    pub fn get_states(&self) -> &BTreeSet<State> {
        &self.states
    }

    pub fn get_input_symbols(&self) -> &BTreeSet<InputSymbol> {
        &self.input_symbols
    }

    pub fn get_stack_alphabet(&self) -> &BTreeSet<StackSymbol> {
        &self.stack_alphabet
    }

    pub fn get_start_state(&self) -> Option<&State> {
        self.start_state.as_ref()
    }

    pub fn get_start_stack_symbol(&self) -> Option<&StackSymbol> {
        self.start_stack_symbol.as_ref()
    }

    pub fn get_final_states(&self) -> &BTreeSet<State> {
        &self.final_states
    }

    pub fn get_number_transitions(&self) -> usize {
        self.transition_function.get_number_transitions()
    }

    /// Every transition as `((from, input, top), (to, pushed))`
    pub fn transitions(
        &self,
    ) -> impl Iterator<Item = (&(State, InputSymbol, StackSymbol), &(State, Vec<StackSymbol>))> {
        self.transition_function.iter()
    }

    fn _next_free_state(&self, prefix: &str) -> State {
        let mut candidate = State::new(prefix);
        let mut index = 0;
        while self.states.contains(&candidate) {
            candidate = State::from_string(format!("{prefix}{index}"));
            index += 1;
        }
        candidate
    }

    fn _next_free_stack_symbol(&self, prefix: &str) -> StackSymbol {
        let mut candidate = StackSymbol::new(prefix);
        let mut index = 0;
        while self.stack_alphabet.contains(&candidate) {
            candidate = StackSymbol::from_string(format!("{prefix}{index}"));
            index += 1;
        }
        candidate
    }

    /// Copies the transitions under a new start configuration that pushes the old start stack
    /// symbol over a fresh bottom symbol. Returns the copy and its bottom symbol.
    fn _with_new_bottom(&self, start_name: &str, bottom_name: &str) -> Option<(PDA, StackSymbol)> {
        let start_state = self.start_state.as_ref()?;
        let start_stack = self.start_stack_symbol.as_ref()?;
        let new_start = self._next_free_state(start_name);
        let new_bottom = self._next_free_stack_symbol(bottom_name);
        let mut pda = PDA::new();
        pda.input_symbols = self.input_symbols.clone();
        for ((s_from, input, stack_from), (s_to, stack_to)) in self.transitions() {
            pda.add_transition(s_from, input, stack_from, s_to, stack_to);
        }
        pda.states.extend(self.states.iter().cloned());
        pda.stack_alphabet.extend(self.stack_alphabet.iter().cloned());
        pda.set_start_state(new_start.clone());
        pda.set_start_stack_symbol(new_bottom.clone());
        pda.add_transition(
            &new_start,
            &epsilon(),
            &new_bottom,
            start_state,
            &[start_stack.clone(), new_bottom.clone()],
        );
        Some((pda, new_bottom))
    }

    /// Turns acceptance by empty stack into acceptance by final state
    pub fn to_final_state(&self) -> PDA {
        let new_end = self._next_free_state("#ENDTOFINAL#");
        let Some((mut pda, new_bottom)) = self._with_new_bottom("#STARTTOFINAL#", "#BOTTOMTOFINAL#")
        else {
            return PDA::new();
        };
        for state in &self.states {
            pda.add_transition(state, &epsilon(), &new_bottom, &new_end, &[]);
        }
        pda.add_final_state(new_end);
        pda
    }

    /// Turns acceptance by final state into acceptance by empty stack
    pub fn to_empty_stack(&self) -> PDA {
        let new_end = self._next_free_state("#ENDEMPTYS#");
        let Some((mut pda, _)) = self._with_new_bottom("#STARTEMPTYS#", "#BOTTOMEMPTYS#") else {
            return PDA::new();
        };
        let stack_alphabet: Vec<StackSymbol> = pda.stack_alphabet.iter().cloned().collect();
        for final_state in &self.final_states {
            for stack_symbol in &stack_alphabet {
                pda.add_transition(final_state, &epsilon(), stack_symbol, &new_end, &[]);
            }
        }
        for stack_symbol in &stack_alphabet {
            pda.add_transition(&new_end, &epsilon(), stack_symbol, &new_end, &[]);
        }
        pda
    }

    /// The grammar of the words accepted by empty stack.
    ///
    /// The variable `(p, X, q)` derives the words that take the automaton from `p` to `q` while
    /// popping `X` for good. A triple only becomes a variable once some transition can pop its
    /// symbol from its first state.
    pub fn to_cfg(&self) -> CFG {
        let start = Variable::new("#StartCFG#");
        let (Some(start_state), Some(start_stack)) = (&self.start_state, &self.start_stack_symbol) else {
            return CFG::new([start.clone()], [], Some(start), []);
        };
        let states: Vec<&State> = self.states.iter().collect();
        debug!(
            states = states.len(),
            transitions = self.get_number_transitions(),
            "converting pushdown automaton to grammar"
        );
        let mut converter: VariableConverter<State, StackSymbol> = VariableConverter::new();
        let mut productions = Vec::new();
        for state in &states {
            let body = vec![Symbol::V(converter.to_combined(start_state, start_stack, state))];
            productions.push(Production::new_raw(start.clone(), body));
        }
        for ((s_from, _, stack_from), _) in self.transitions() {
            for state in &states {
                converter.set_valid(s_from, stack_from, state);
            }
        }
        for ((s_from, input_symbol, stack_from), (s_to, stack_to)) in self.transitions() {
            for state in &states {
                if stack_to.is_empty() && *state != s_to {
                    continue;
                }
                let head = converter.to_combined(s_from, stack_from, state);
                for mut body in Self::_generate_bodies(&states, s_to, stack_to, state, &mut converter) {
                    if !input_symbol.is_epsilon() {
                        body.insert(0, Symbol::T(Terminal::new(input_symbol.get_name())));
                    }
                    productions.push(Production::new_raw(head.clone(), body));
                }
            }
        }
        CFG::new([], [], Some(start), productions)
    }

    /// Bodies `(s_to, Y1, r1) (r1, Y2, r2) .. (rn-1, Yn, last)` over every choice of the
    /// intermediate states, keeping only chains made of valid triples
    fn _generate_bodies(
        states: &[&State],
        s_to: &State,
        stack_to: &[StackSymbol],
        last: &State,
        converter: &mut VariableConverter<State, StackSymbol>,
    ) -> Vec<Vec<Symbol>> {
        let Some((last_symbol, pushed)) = stack_to.split_last() else {
            return vec![vec![]];
        };
        let intermediate = pushed.len();
        let mut bodies = Vec::new();
        let mut choice = vec![0usize; intermediate];
        loop {
            let mut body = Vec::with_capacity(stack_to.len());
            let mut current = s_to;
            let mut valid = true;
            for (symbol, &index) in pushed.iter().zip(choice.iter()) {
                match converter.is_valid_and_get(current, symbol, states[index]) {
                    Some(variable) => body.push(Symbol::V(variable)),
                    None => {
                        valid = false;
                        break;
                    }
                }
                current = states[index];
            }
            if valid {
                if let Some(variable) = converter.is_valid_and_get(current, last_symbol, last) {
                    body.push(Symbol::V(variable));
                    bodies.push(body);
                }
            }
            let mut position = 0;
            loop {
                if position == intermediate {
                    return bodies;
                }
                choice[position] += 1;
                if choice[position] < states.len() {
                    break;
                }
                choice[position] = 0;
                position += 1;
            }
        }
    }

    /// A one-state automaton accepting the language of the grammar by empty stack. Variables
    /// are expanded on the stack, terminals are pushed as `#TERM#<t>` and matched against the
    /// input.
    pub fn from_cfg(cfg: &CFG) -> PDA {
        debug!(productions = cfg.get_productions().len(), "converting grammar to pushdown automaton");
        let state = State::new("q");
        let mut pda = PDA::new();
        pda.set_start_state(state.clone());
        if let Some(start) = cfg.get_start_symbol() {
            pda.set_start_stack_symbol(Self::_stack_symbol_of(&Symbol::V(start.clone())));
        }
        let mut terminals: Vec<&Terminal> = cfg.get_terminals().iter().collect();
        terminals.sort();
        let mut variables: Vec<&Variable> = cfg.get_variables().iter().collect();
        variables.sort();
        for terminal in &terminals {
            pda.input_symbols.insert((*terminal).clone());
            pda.stack_alphabet
                .insert(Self::_stack_symbol_of(&Symbol::T((*terminal).clone())));
        }
        for variable in &variables {
            pda.stack_alphabet
                .insert(Self::_stack_symbol_of(&Symbol::V((*variable).clone())));
        }
        for production in cfg.get_productions() {
            let stack_to: Vec<StackSymbol> = production.body.iter().map(Self::_stack_symbol_of).collect();
            pda.add_transition(
                &state,
                &epsilon(),
                &Self::_stack_symbol_of(&Symbol::V(production.head.clone())),
                &state,
                &stack_to,
            );
        }
        for terminal in terminals {
            pda.add_transition(
                &state,
                terminal,
                &Self::_stack_symbol_of(&Symbol::T(terminal.clone())),
                &state,
                &[],
            );
        }
        pda
    }

    fn _stack_symbol_of(symbol: &Symbol) -> StackSymbol {
        match symbol {
            Symbol::V(variable) => StackSymbol::new(variable.get_name()),
            Symbol::T(terminal) => StackSymbol::from_string(format!("{TERMINAL_STACK_PREFIX}{}", terminal.get_name())),
        }
    }

    /// Product with a finite automaton, accepting by final state in both components.
    ///
    /// Only pairs reachable from the pair of start states are built. Epsilon moves of the
    /// pushdown automaton leave the automaton state unchanged.
    pub fn intersection(&self, other: &DFA) -> PDA {
        let (Some(start_pda), Some(start_dfa)) = (&self.start_state, other.get_start_state()) else {
            return PDA::new();
        };
        if other.is_empty() {
            return PDA::new();
        }
        debug!(
            states = self.states.len(),
            automaton_states = other.get_states().len(),
            "intersecting pushdown automaton with automaton"
        );
        let combine = |p: &State, q: &State| State::from_string(format!("({p}, {q})"));
        let mut pda = PDA::new();
        pda.set_start_state(combine(start_pda, start_dfa));
        if let Some(start_stack) = &self.start_stack_symbol {
            pda.set_start_stack_symbol(start_stack.clone());
        }
        let mut symbols: Vec<InputSymbol> = self.input_symbols.iter().cloned().collect();
        symbols.push(epsilon());
        let mut seen: FxHashSet<(State, State)> = FxHashSet::default();
        let mut to_process = VecDeque::new();
        seen.insert((start_pda.clone(), start_dfa.clone()));
        to_process.push_back((start_pda.clone(), start_dfa.clone()));
        while let Some((state_pda, state_dfa)) = to_process.pop_front() {
            let current = combine(&state_pda, &state_dfa);
            if self.final_states.contains(&state_pda) && other.is_accept_state(&state_dfa) {
                pda.add_final_state(current.clone());
            }
            for symbol in &symbols {
                let next_dfa = if symbol.is_epsilon() {
                    Some(&state_dfa)
                } else {
                    other.get_next_state(&state_dfa, symbol)
                };
                let Some(next_dfa) = next_dfa else {
                    continue;
                };
                for stack_symbol in &self.stack_alphabet {
                    for (next_pda, stack_to) in self.transition_function.get(&state_pda, symbol, stack_symbol) {
                        let next = combine(next_pda, next_dfa);
                        pda.add_transition(&current, symbol, stack_symbol, &next, stack_to);
                        let pair = (next_pda.clone(), next_dfa.clone());
                        if seen.insert(pair.clone()) {
                            to_process.push_back(pair);
                        }
                    }
                }
            }
        }
        pda
    }

    /// Whether some run consumes the whole word and empties the stack without ever holding
    /// more than `max_stack_height` symbols
    pub fn accepts_by_empty_stack(&self, word: &[InputSymbol], max_stack_height: usize) -> bool {
        self._simulate(word, max_stack_height, |_, stack| stack.is_empty())
    }

    /// Whether some run consumes the whole word and ends in a final state, with the same stack
    /// bound as `accepts_by_empty_stack`
    pub fn accepts_by_final_state(&self, word: &[InputSymbol], max_stack_height: usize) -> bool {
        self._simulate(word, max_stack_height, |state, _| self.final_states.contains(state))
    }

    fn _simulate<F>(&self, word: &[InputSymbol], max_stack_height: usize, accepting: F) -> bool
    where
        F: Fn(&State, &[StackSymbol]) -> bool,
    {
        let (Some(start_state), Some(start_stack)) = (&self.start_state, &self.start_stack_symbol) else {
            return false;
        };
        let word: Vec<InputSymbol> = word.iter().filter(|s| !s.is_epsilon()).cloned().collect();
        // The top of the stack is the last element.
        type Configuration = (State, usize, Vec<StackSymbol>);
        let initial: Configuration = (start_state.clone(), 0, vec![start_stack.clone()]);
        let mut seen: FxHashSet<Configuration> = FxHashSet::default();
        let mut to_process = VecDeque::new();
        seen.insert(initial.clone());
        to_process.push_back(initial);
        while let Some((state, position, stack)) = to_process.pop_front() {
            if position == word.len() && accepting(&state, stack.as_slice()) {
                return true;
            }
            let Some((top, rest)) = stack.split_last() else {
                continue;
            };
            let mut moves = vec![(epsilon(), position)];
            if let Some(symbol) = word.get(position) {
                moves.push((symbol.clone(), position + 1));
            }
            for (symbol, next_position) in moves {
                for (next_state, stack_to) in self.transition_function.get(&state, &symbol, top) {
                    if rest.len() + stack_to.len() > max_stack_height {
                        continue;
                    }
                    let mut next_stack = rest.to_vec();
                    next_stack.extend(stack_to.iter().rev().cloned());
                    let configuration = (next_state.clone(), next_position, next_stack);
                    if seen.insert(configuration.clone()) {
                        to_process.push_back(configuration);
                    }
                }
            }
        }
        false
    }
}

impl Display for PDA {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(start) = &self.start_state {
            writeln!(f, "start: {start}")?;
        }
        if let Some(start_stack) = &self.start_stack_symbol {
            writeln!(f, "start stack: {start_stack}")?;
        }
        let finals: Vec<&str> = self.final_states.iter().map(State::get_name).collect();
        writeln!(f, "final: {}", finals.join(", "))?;
        for ((s_from, input, stack_from), (s_to, stack_to)) in self.transitions() {
            let pushed: Vec<&str> = stack_to.iter().map(StackSymbol::get_name).collect();
            writeln!(f, "{s_from} --{input}, {stack_from} / {}--> {s_to}", pushed.join(" "))?;
        }
        Ok(())
    }
}
