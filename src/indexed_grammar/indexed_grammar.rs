use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use tracing::{debug, trace};

use crate::cfg::cfg::CFG;
use crate::cfg::production::Symbol;
use crate::cfg::terminal::{epsilon, Terminal};
use crate::cfg::variable::Variable;
use crate::cfg::variable_converter::VariableConverter;
use crate::error::{FormlangError, Result};
use crate::fa::dfa::DFA;
use crate::fa::epsilon_nfa::ENFA;
use crate::fa::finite_automaton::FiniteAutomaton;
use crate::fa::nfa::NFA;
use crate::fa::state::State;

use super::rules::{Rule, Rules};

const DEFAULT_START: &str = "S";
const INTERSECTION_START: &str = "S";
const EMPTY_HELPER: &str = "T";

/// A set of non-terminals witnessing a derivation that leaves only them, each on the index
/// stack it started with
pub type MarkedSet = BTreeSet<Variable>;

/// The marked sets of every non-terminal during the emptiness test. Sets are only ever added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marking {
    start: Variable,
    marked: FxHashMap<Variable, FxHashSet<MarkedSet>>,
}

impl Marking {
    pub fn get_marked(&self, non_terminal: &Variable) -> Option<&FxHashSet<MarkedSet>> {
        self.marked.get(non_terminal)
    }

    pub fn is_marked(&self, non_terminal: &Variable, set: &MarkedSet) -> bool {
        self.marked
            .get(non_terminal)
            .map_or(false, |sets| sets.contains(set))
    }

    /// Whether the start symbol derives a word without looking at its stack
    pub fn start_generates(&self) -> bool {
        self.is_marked(&self.start, &MarkedSet::new())
    }

    /// Whether every set marked here is also marked in `other`
    pub fn is_included_in(&self, other: &Marking) -> bool {
        self.marked
            .iter()
            .all(|(non_terminal, sets)| sets.iter().all(|set| other.is_marked(non_terminal, set)))
    }

    pub fn count(&self) -> usize {
        self.marked.values().map(|sets| sets.len()).sum()
    }

    fn sets(&self, non_terminal: &Variable) -> impl Iterator<Item = &MarkedSet> {
        self.marked.get(non_terminal).into_iter().flatten()
    }

    fn mark(&mut self, non_terminal: &Variable, set: MarkedSet) -> bool {
        self.marked.entry(non_terminal.clone()).or_default().insert(set)
    }
}

/// Union of two marked sets, reusing the larger one when it contains the other
fn merge(first: &MarkedSet, second: &MarkedSet) -> MarkedSet {
    if first.is_subset(second) {
        second.clone()
    } else if second.is_subset(first) {
        first.clone()
    } else {
        first.union(second).cloned().collect()
    }
}

/// Every union made of one set from each group
fn combine(groups: &[&Vec<MarkedSet>]) -> FxHashSet<MarkedSet> {
    let mut results = FxHashSet::default();
    let mut done: FxHashSet<(usize, MarkedSet)> = FxHashSet::default();
    let mut to_process = vec![(0, MarkedSet::new())];
    while let Some((index, current)) = to_process.pop() {
        let Some(group) = groups.get(index) else {
            results.insert(current);
            continue;
        };
        for option in group.iter() {
            let next = (index + 1, merge(&current, option));
            if done.insert(next.clone()) {
                to_process.push(next);
            }
        }
    }
    results
}

/// An operand for `IndexedGrammar::intersection_with`
pub enum IntersectionOperand<'a> {
    Dfa(&'a DFA),
    Nfa(&'a NFA),
    EpsilonNfa(&'a ENFA),
    Grammar(&'a CFG),
}

/// An indexed grammar in reduced form
#[derive(Debug, Clone)]
pub struct IndexedGrammar {
    rules: Rules,
    start_variable: Variable,
}

impl IndexedGrammar {
    /// Creates a grammar whose start variable is `S`
    pub fn new(rules: Rules) -> Self {
        IndexedGrammar::with_start(rules, Variable::new(DEFAULT_START))
    }

    pub fn with_start(rules: Rules, start_variable: Variable) -> Self {
        IndexedGrammar {
            rules,
            start_variable,
        }
    }

    pub fn get_rules(&self) -> &Rules {
        &self.rules
    }

    pub fn get_start_variable(&self) -> &Variable {
        &self.start_variable
    }

    pub fn non_terminals(&self) -> FxHashSet<Variable> {
        let mut non_terminals = self.rules.non_terminals();
        non_terminals.insert(self.start_variable.clone());
        non_terminals
    }

    pub fn terminals(&self) -> FxHashSet<Terminal> {
        self.rules.terminals()
    }

    /// Every non-terminal marks itself, and the empty set when it has an end rule
    pub fn initial_marking(&self) -> Marking {
        let mut marking = Marking {
            start: self.start_variable.clone(),
            marked: FxHashMap::default(),
        };
        for non_terminal in self.non_terminals() {
            let identity: MarkedSet = [non_terminal.clone()].into_iter().collect();
            marking.mark(&non_terminal, identity);
        }
        for rule in self.rules.get_rules() {
            if let Rule::End { left, .. } = rule {
                marking.mark(left, MarkedSet::new());
            }
        }
        marking
    }

    /// Applies every rule once. Returns whether a set was marked. Stops as soon as the start
    /// symbol generates.
    pub fn marking_pass(&self, marking: &mut Marking) -> bool {
        let mut was_modified = false;
        for rule in self.rules.get_rules() {
            was_modified |= match rule {
                Rule::Duplication { left, right0, right1 } => {
                    Self::_duplication_processing(marking, left, right0, right1)
                }
                Rule::Production {
                    left,
                    right,
                    production,
                } => self._production_processing(marking, left, right, production),
                Rule::Consumption { .. } | Rule::End { .. } => false,
            };
            if marking.start_generates() {
                break;
            }
        }
        trace!(marked = marking.count(), was_modified, "marking pass");
        was_modified
    }

    /// `A -> B C`: A marks every union of a set of B with a set of C
    fn _duplication_processing(marking: &mut Marking, left: &Variable, right0: &Variable, right1: &Variable) -> bool {
        let mut new_sets = Vec::new();
        for marked0 in marking.sets(right0) {
            for marked1 in marking.sets(right1) {
                let merged = merge(marked0, marked1);
                if !marking.is_marked(left, &merged) {
                    new_sets.push(merged);
                }
            }
        }
        let mut was_modified = false;
        for set in new_sets {
            was_modified |= marking.mark(left, set);
        }
        was_modified
    }

    /// `A[σ] -> B[r σ]`: for a set M of B, every member of M must consume `r`. A marks the
    /// unions made of one marked set of a consumption target for each member of M.
    fn _production_processing(
        &self,
        marking: &mut Marking,
        left: &Variable,
        right: &Variable,
        production: &Terminal,
    ) -> bool {
        let mut options: FxHashMap<&Variable, Vec<MarkedSet>> = FxHashMap::default();
        for rule in self.rules.get_consumption_rules(production) {
            if let Rule::Consumption {
                left: consumer,
                right: target,
                ..
            } = rule
            {
                let entry = options.entry(consumer).or_default();
                for set in marking.sets(target) {
                    if !entry.contains(set) {
                        entry.push(set.clone());
                    }
                }
            }
        }
        let mut new_sets = FxHashSet::default();
        for marked in marking.sets(right) {
            let groups: Option<Vec<&Vec<MarkedSet>>> = marked.iter().map(|c| options.get(c)).collect();
            if let Some(groups) = groups {
                new_sets.extend(combine(&groups));
            }
        }
        let mut was_modified = false;
        for set in new_sets {
            was_modified |= marking.mark(left, set);
        }
        was_modified
    }

    /// Whether the grammar generates no word, by running marking passes until nothing changes.
    ///
    /// A non-terminal can be marked with any subset of the non-terminals, so the worst case is
    /// exponential in their number. Grammars produced by `intersection` multiply the
    /// non-terminals by the square of the automaton's state count, and even small ones can take
    /// a long time.
    pub fn is_empty(&self) -> bool {
        debug!(
            rules = self.rules.length().0,
            consumed = self.rules.length().1,
            "checking indexed grammar emptiness"
        );
        let mut marking = self.initial_marking();
        loop {
            if marking.start_generates() {
                return false;
            }
            if !self.marking_pass(&mut marking) {
                return true;
            }
        }
    }

    /// Non-terminals reachable from the start variable through any rule
    pub fn get_reachable_non_terminals(&self) -> FxHashSet<Variable> {
        let mut reachable_from: FxHashMap<&Variable, Vec<&Variable>> = FxHashMap::default();
        for rule in self.rules.all_rules() {
            match rule {
                Rule::Duplication { left, right0, right1 } => {
                    reachable_from.entry(left).or_default().extend([right0, right1]);
                }
                Rule::Production { left, right, .. } | Rule::Consumption { left, right, .. } => {
                    reachable_from.entry(left).or_default().push(right);
                }
                Rule::End { .. } => {}
            }
        }
        let mut reachables: FxHashSet<Variable> = FxHashSet::default();
        reachables.insert(self.start_variable.clone());
        let mut to_process = vec![&self.start_variable];
        while let Some(current) = to_process.pop() {
            for &next in reachable_from.get(current).into_iter().flatten() {
                if reachables.insert(next.clone()) {
                    to_process.push(next);
                }
            }
        }
        reachables
    }

    /// Non-terminals from which an end rule can be reached, ignoring the index stacks.
    /// A duplication head needs both of its children.
    pub fn get_generating_non_terminals(&self) -> FxHashSet<Variable> {
        let mut generating_from: FxHashMap<&Variable, Vec<&Variable>> = FxHashMap::default();
        let mut duplication_pointer: FxHashMap<&Variable, Vec<usize>> = FxHashMap::default();
        let mut duplication_heads: Vec<&Variable> = Vec::new();
        let mut remaining: Vec<usize> = Vec::new();
        let mut generating: FxHashSet<Variable> = FxHashSet::default();
        let mut to_process: Vec<&Variable> = Vec::new();
        for rule in self.rules.all_rules() {
            match rule {
                Rule::Duplication { left, right0, right1 } => {
                    let index = duplication_heads.len();
                    duplication_heads.push(left);
                    remaining.push(2);
                    duplication_pointer.entry(right0).or_default().push(index);
                    duplication_pointer.entry(right1).or_default().push(index);
                }
                Rule::Production { left, right, .. } | Rule::Consumption { left, right, .. } => {
                    generating_from.entry(right).or_default().push(left);
                }
                Rule::End { left, .. } => {
                    if generating.insert(left.clone()) {
                        to_process.push(left);
                    }
                }
            }
        }
        while let Some(current) = to_process.pop() {
            for &symbol in generating_from.get(current).into_iter().flatten() {
                if generating.insert(symbol.clone()) {
                    to_process.push(symbol);
                }
            }
            for &index in duplication_pointer.get(current).into_iter().flatten() {
                remaining[index] -= 1;
                let head = duplication_heads[index];
                if remaining[index] == 0 && generating.insert(head.clone()) {
                    to_process.push(head);
                }
            }
        }
        generating
    }

    /// Keeps the rules whose non-terminals are all generating and reachable
    pub fn remove_useless_rules(&self) -> IndexedGrammar {
        let generating = self.get_generating_non_terminals();
        let reachables = self.get_reachable_non_terminals();
        let kept: Vec<Rule> = self
            .rules
            .all_rules()
            .filter(|rule| {
                rule.non_terminals()
                    .into_iter()
                    .all(|x| generating.contains(x) && reachables.contains(x))
            })
            .cloned()
            .collect();
        debug!(
            before = self.rules.all_rules().count(),
            after = kept.len(),
            "removed useless indexed grammar rules"
        );
        IndexedGrammar::with_start(
            Rules::with_ordering(kept, self.rules.get_ordering()),
            self.start_variable.clone(),
        )
    }

    /// Intersection with the language of a finite automaton.
    ///
    /// The automaton is read as the transducer copying its input. Every non-terminal `A`
    /// becomes the triples `(p, A, q)` deriving the words of `A` that lead from `p` to `q`.
    /// Terminals and the empty word get triples too, `T` derives the empty word.
    pub fn intersection(&self, other: &impl FiniteAutomaton) -> IndexedGrammar {
        self._intersection_with_dfa(&other.to_deterministic())
    }

    /// Intersection with an operand chosen at runtime. Only regular operands are supported.
    pub fn intersection_with(&self, other: &IntersectionOperand) -> Result<IndexedGrammar> {
        match other {
            IntersectionOperand::Dfa(dfa) => Ok(self.intersection(*dfa)),
            IntersectionOperand::Nfa(nfa) => Ok(self.intersection(*nfa)),
            IntersectionOperand::EpsilonNfa(enfa) => Ok(self.intersection(*enfa)),
            IntersectionOperand::Grammar(_) => Err(FormlangError::UnsupportedOperation(
                "intersection of an indexed grammar with a context-free grammar".to_string(),
            )),
        }
    }

    fn _intersection_with_dfa(&self, dfa: &DFA) -> IndexedGrammar {
        let states: Vec<State> = dfa.get_states().to_vec();
        debug!(
            rules = self.rules.all_rules().count(),
            states = states.len(),
            "intersecting indexed grammar with automaton"
        );
        let mut converter: VariableConverter<State, Symbol> = VariableConverter::new();
        let empty = Symbol::T(epsilon());
        let helper = Variable::new(EMPTY_HELPER);
        let new_start = Variable::new(INTERSECTION_START);
        let mut new_rules = vec![Rule::End {
            left: helper.clone(),
            right: epsilon(),
        }];

        for rule in self.rules.consumption_rules() {
            if let Rule::Consumption {
                f_parameter,
                left,
                right,
            } = rule
            {
                let (left, right) = (Symbol::V(left.clone()), Symbol::V(right.clone()));
                for state_r in &states {
                    for state_s in &states {
                        new_rules.push(Rule::Consumption {
                            f_parameter: f_parameter.clone(),
                            left: converter.to_combined(state_r, &left, state_s),
                            right: converter.to_combined(state_r, &right, state_s),
                        });
                    }
                }
            }
        }

        let mut emitted: Vec<Terminal> = Vec::new();
        for rule in self.rules.get_rules() {
            match rule {
                Rule::Duplication { left, right0, right1 } => {
                    let left = Symbol::V(left.clone());
                    let right0 = Symbol::V(right0.clone());
                    let right1 = Symbol::V(right1.clone());
                    for state_p in &states {
                        for state_q in &states {
                            for state_r in &states {
                                new_rules.push(Rule::Duplication {
                                    left: converter.to_combined(state_p, &left, state_q),
                                    right0: converter.to_combined(state_p, &right0, state_r),
                                    right1: converter.to_combined(state_r, &right1, state_q),
                                });
                            }
                        }
                    }
                }
                Rule::Production {
                    left,
                    right,
                    production,
                } => {
                    let (left, right) = (Symbol::V(left.clone()), Symbol::V(right.clone()));
                    for state_p in &states {
                        for state_q in &states {
                            new_rules.push(Rule::Production {
                                left: converter.to_combined(state_p, &left, state_q),
                                right: converter.to_combined(state_p, &right, state_q),
                                production: production.clone(),
                            });
                        }
                    }
                }
                Rule::End { left, right } => {
                    if !right.is_epsilon() && !emitted.contains(right) {
                        emitted.push(right.clone());
                    }
                    let left = Symbol::V(left.clone());
                    let right = Symbol::T(right.clone());
                    for state_p in &states {
                        for state_q in &states {
                            new_rules.push(Rule::Duplication {
                                left: converter.to_combined(state_p, &left, state_q),
                                right0: converter.to_combined(state_p, &right, state_q),
                                right1: helper.clone(),
                            });
                        }
                    }
                }
                Rule::Consumption { .. } => {}
            }
        }

        for terminal in &emitted {
            let terminal = Symbol::T(terminal.clone());
            for state_p in &states {
                for state_q in &states {
                    for state_r in &states {
                        new_rules.push(Rule::Duplication {
                            left: converter.to_combined(state_p, &terminal, state_q),
                            right0: converter.to_combined(state_p, &empty, state_r),
                            right1: converter.to_combined(state_r, &terminal, state_q),
                        });
                        new_rules.push(Rule::Duplication {
                            left: converter.to_combined(state_p, &terminal, state_q),
                            right0: converter.to_combined(state_p, &terminal, state_r),
                            right1: converter.to_combined(state_r, &empty, state_q),
                        });
                    }
                }
            }
        }

        for state_p in &states {
            for state_q in &states {
                for state_r in &states {
                    new_rules.push(Rule::Duplication {
                        left: converter.to_combined(state_p, &empty, state_q),
                        right0: converter.to_combined(state_p, &empty, state_r),
                        right1: converter.to_combined(state_r, &empty, state_q),
                    });
                }
            }
        }

        for (state_p, symbol, state_q) in dfa.get_transitions() {
            new_rules.push(Rule::End {
                left: converter.to_combined(&state_p, &Symbol::T(symbol.clone()), &state_q),
                right: symbol,
            });
        }

        for state_p in &states {
            new_rules.push(Rule::End {
                left: converter.to_combined(state_p, &empty, state_p),
                right: epsilon(),
            });
        }

        if let Some(start_state) = dfa.get_start_state() {
            let start = Symbol::V(self.start_variable.clone());
            let mut finals: Vec<State> = dfa.get_accept_states().into_iter().collect();
            finals.sort();
            for final_state in &finals {
                new_rules.push(Rule::Duplication {
                    left: new_start.clone(),
                    right0: converter.to_combined(start_state, &start, final_state),
                    right1: helper.clone(),
                });
            }
        }

        let rules = Rules::with_ordering(new_rules, self.rules.get_ordering());
        IndexedGrammar::with_start(rules, new_start).remove_useless_rules()
    }
}

impl Display for IndexedGrammar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "start: {}", self.start_variable)?;
        for rule in self.rules.all_rules() {
            writeln!(f, "{rule}")?;
        }
        Ok(())
    }
}
