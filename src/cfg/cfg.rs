use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use tracing::{debug, trace};

use crate::cfg::cyk_table::CYKTable;
use crate::cfg::parse_tree::ParseTree;
use crate::cfg::production::{Production, Symbol};
use crate::cfg::set_queue::SetQueue;
use crate::cfg::terminal::{Terminal, TERMINAL_EPSILON_SYMBOLS};
use crate::cfg::variable::Variable;
use crate::cfg::variable_converter::VariableConverter;
use crate::error::{FormlangError, Result};
use crate::fa::dfa::DFA;
use crate::fa::finite_automaton::FiniteAutomaton;
use crate::fa::state::State;
use crate::input_symbol::InputSymbol;
use crate::language::Language;

const SUBS_SUFFIX: &str = "#SUBS#";
const CNF_SUFFIX: &str = "#CNF#";
const CNF_CHAIN_PREFIX: &str = "C#CNF#";

#[derive(Debug, Clone, Default)]
pub struct ImpactsAndRemainingList {
    pub impacts: FxHashMap<Symbol, Vec<usize>>, // symbol -> productions whose body holds it, once per occurrence
    pub remaining_list: Vec<usize>,             // production -> body length
    pub added_impacts: Vec<Variable>,           // heads of empty productions
}

/// Configuration of `CFG::get_words_with`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordsConfig {
    /// Longest word to produce, `None` for no bound
    pub max_length: Option<usize>,
}

/// A context-free grammar.
///
/// Every transformation returns a new grammar. The only state mutated after construction are
/// the lazily computed impact lists and normal form, which equality ignores.
#[derive(Debug, Clone, Default)]
pub struct CFG {
    variables: FxHashSet<Variable>,
    terminals: FxHashSet<Terminal>,
    start_symbol: Option<Variable>,
    productions: Vec<Production>,

    _impacts_and_remaining_list: OnceCell<ImpactsAndRemainingList>,
    _normal_form: OnceCell<Box<CFG>>,
}

impl CFG {
    /// Creates a new Context-Free Grammar.
    ///
    /// Symbols used by the productions and the start symbol are added to the variable and
    /// terminal sets. Duplicate productions are dropped, the first occurrence keeps its place.
    pub fn new(
        variables: impl IntoIterator<Item = Variable>,
        terminals: impl IntoIterator<Item = Terminal>,
        start_symbol: Option<Variable>,
        productions: impl IntoIterator<Item = Production>,
    ) -> Self {
        let mut variables: FxHashSet<Variable> = variables.into_iter().collect();
        let mut terminals: FxHashSet<Terminal> =
            terminals.into_iter().filter(|t| !t.is_epsilon()).collect();
        if let Some(start) = &start_symbol {
            variables.insert(start.clone());
        }
        let mut seen = FxHashSet::default();
        let mut unique_productions = Vec::new();
        for production in productions {
            if !seen.insert(production.clone()) {
                continue;
            }
            variables.insert(production.head.clone());
            for symbol in &production.body {
                match symbol {
                    Symbol::V(v) => {
                        variables.insert(v.clone());
                    }
                    Symbol::T(t) if !t.is_epsilon() => {
                        terminals.insert(t.clone());
                    }
                    Symbol::T(_) => {}
                }
            }
            unique_productions.push(production);
        }
        CFG {
            variables,
            terminals,
            start_symbol,
            productions: unique_productions,
            _impacts_and_remaining_list: OnceCell::new(),
            _normal_form: OnceCell::new(),
        }
    }

    /// Creates the grammar made of the given productions only
    pub fn from_start_and_productions(
        start_symbol: Variable,
        productions: impl IntoIterator<Item = Production>,
    ) -> Self {
        CFG::new([], [], Some(start_symbol), productions)
    }

    /// Creates an empty CFG, without start symbol
    pub fn empty() -> Self {
        CFG::default()
    }

    pub fn get_variables(&self) -> &FxHashSet<Variable> {
        &self.variables
    }

    pub fn get_terminals(&self) -> &FxHashSet<Terminal> {
        &self.terminals
    }

    pub fn get_start_symbol(&self) -> Option<&Variable> {
        self.start_symbol.as_ref()
    }

    pub fn get_productions(&self) -> &[Production] {
        &self.productions
    }

    /// Returns the production rules for a given non-terminal symbol
    pub fn get_productions_of(&self, head: &Variable) -> Vec<&Production> {
        self.productions.iter().filter(|p| &p.head == head).collect()
    }

    /// Whether every production is `A -> a` or `A -> B C`
    pub fn is_normal_form(&self) -> bool {
        self.productions.iter().all(Production::is_normal_form)
    }

    pub fn get_impacts_and_remaining_list(&self) -> &ImpactsAndRemainingList {
        self._impacts_and_remaining_list
            .get_or_init(|| self._get_impacts_and_remaining_list())
    }

    fn _get_impacts_and_remaining_list(&self) -> ImpactsAndRemainingList {
        let mut lists = ImpactsAndRemainingList {
            remaining_list: vec![0; self.productions.len()],
            ..Default::default()
        };
        for (index, production) in self.productions.iter().enumerate() {
            if production.body.is_empty() {
                lists.added_impacts.push(production.head.clone());
                continue;
            }
            lists.remaining_list[index] = production.body.len();
            for symbol in &production.body {
                lists.impacts.entry(symbol.clone()).or_default().push(index);
            }
        }
        lists
    }

    /// Computes the set of generating (or nullable if enabled) symbols.
    ///
    /// A production fires once every occurrence in its body has been marked, which is tracked
    /// by counting down its remaining length.
    fn _get_generating_or_nullable(&self, nullable: bool) -> FxHashSet<Symbol> {
        let lists = self.get_impacts_and_remaining_list();
        let mut remaining = lists.remaining_list.clone();
        let mut marked: FxHashSet<Symbol> = FxHashSet::default();
        let mut to_process: Vec<Symbol> = Vec::new();

        for head in &lists.added_impacts {
            let symbol = Symbol::V(head.clone());
            if marked.insert(symbol.clone()) {
                to_process.push(symbol);
            }
        }
        if !nullable {
            for terminal in &self.terminals {
                let symbol = Symbol::T(terminal.clone());
                marked.insert(symbol.clone());
                to_process.push(symbol);
            }
        }

        while let Some(current) = to_process.pop() {
            let Some(impacted) = lists.impacts.get(&current) else {
                continue;
            };
            for &index in impacted {
                let head = Symbol::V(self.productions[index].head.clone());
                if marked.contains(&head) {
                    continue;
                }
                remaining[index] -= 1;
                if remaining[index] == 0 {
                    marked.insert(head.clone());
                    to_process.push(head);
                }
            }
        }
        trace!(nullable, marked = marked.len(), "symbol sweep done");
        marked
    }

    /// Symbols from which some terminal word is derivable, terminals included
    pub fn get_generating_symbols(&self) -> FxHashSet<Symbol> {
        self._get_generating_or_nullable(false)
    }

    /// Symbols from which the empty word is derivable
    pub fn get_nullable_symbols(&self) -> FxHashSet<Symbol> {
        self._get_generating_or_nullable(true)
    }

    /// Whether the start symbol derives the empty word. Stops as soon as it is found.
    pub fn generate_epsilon(&self) -> bool {
        let Some(start) = &self.start_symbol else {
            return false;
        };
        let lists = self.get_impacts_and_remaining_list();
        let mut nullable: FxHashSet<Variable> = FxHashSet::default();
        let mut to_process: Vec<Variable> = Vec::new();
        for head in &lists.added_impacts {
            if head == start {
                return true;
            }
            if nullable.insert(head.clone()) {
                to_process.push(head.clone());
            }
        }
        let mut remaining = lists.remaining_list.clone();
        while let Some(current) = to_process.pop() {
            let Some(impacted) = lists.impacts.get(&Symbol::V(current)) else {
                continue;
            };
            for &index in impacted {
                let head = &self.productions[index].head;
                if nullable.contains(head) {
                    continue;
                }
                remaining[index] -= 1;
                if remaining[index] == 0 {
                    if head == start {
                        return true;
                    }
                    nullable.insert(head.clone());
                    to_process.push(head.clone());
                }
            }
        }
        false
    }

    /// Symbols occurring in some sentential form derived from the start symbol
    pub fn get_reachable_symbols(&self) -> FxHashSet<Symbol> {
        let Some(start) = &self.start_symbol else {
            return FxHashSet::default();
        };
        let mut successors: FxHashMap<&Variable, Vec<&Symbol>> = FxHashMap::default();
        for production in &self.productions {
            successors
                .entry(&production.head)
                .or_default()
                .extend(production.body.iter());
        }
        let mut reachable: FxHashSet<Symbol> = FxHashSet::from_iter([Symbol::V(start.clone())]);
        let mut to_process = vec![start];
        while let Some(current) = to_process.pop() {
            let Some(next_symbols) = successors.get(current) else {
                continue;
            };
            for &next in next_symbols {
                if reachable.insert(next.clone()) {
                    if let Symbol::V(v) = next {
                        to_process.push(v);
                    }
                }
            }
        }
        reachable
    }

    /// Whether no word is generated
    pub fn is_empty(&self) -> bool {
        match &self.start_symbol {
            Some(start) => !self
                .get_generating_symbols()
                .contains(&Symbol::V(start.clone())),
            None => true,
        }
    }

    /// Removes non-generating symbols, then symbols unreachable from the start symbol
    pub fn remove_useless_symbols(&self) -> CFG {
        debug!(
            productions = self.productions.len(),
            variables = self.variables.len(),
            "removing useless symbols"
        );
        let generating = self.get_generating_symbols();
        let productions: Vec<Production> = self
            .productions
            .iter()
            .filter(|p| {
                generating.contains(&Symbol::V(p.head.clone()))
                    && p.body.iter().all(|s| generating.contains(s))
            })
            .cloned()
            .collect();
        let variables: Vec<Variable> = self
            .variables
            .iter()
            .filter(|v| generating.contains(&Symbol::V((*v).clone())))
            .cloned()
            .collect();
        let terminals: Vec<Terminal> = self
            .terminals
            .iter()
            .filter(|t| generating.contains(&Symbol::T((*t).clone())))
            .cloned()
            .collect();

        let reduced = CFG::new(
            variables.iter().cloned(),
            terminals.iter().cloned(),
            self.start_symbol.clone(),
            productions,
        );
        let reachable = reduced.get_reachable_symbols();
        CFG::new(
            variables
                .into_iter()
                .filter(|v| reachable.contains(&Symbol::V(v.clone()))),
            terminals
                .into_iter()
                .filter(|t| reachable.contains(&Symbol::T(t.clone()))),
            self.start_symbol.clone(),
            reduced
                .productions
                .into_iter()
                .filter(|p| reachable.contains(&Symbol::V(p.head.clone()))),
        )
    }

    /// All the bodies obtained by keeping or dropping each nullable symbol of `body`
    fn _remove_nullable_production(body: &[Symbol], nullable: &FxHashSet<Symbol>) -> Vec<Vec<Symbol>> {
        let Some((first, rest)) = body.split_first() else {
            return vec![vec![]];
        };
        let mut bodies = Vec::new();
        for suffix in CFG::_remove_nullable_production(rest, nullable) {
            if nullable.contains(first) {
                bodies.push(suffix.clone());
            }
            let mut with_first = Vec::with_capacity(suffix.len() + 1);
            with_first.push(first.clone());
            with_first.extend(suffix);
            bodies.push(with_first);
        }
        bodies
    }

    /// Removes the epsilon productions; the language loses the empty word only
    pub fn remove_epsilon(&self) -> CFG {
        debug!(productions = self.productions.len(), "removing epsilon productions");
        let nullable = self.get_nullable_symbols();
        let mut new_productions = Vec::new();
        for production in &self.productions {
            for body in CFG::_remove_nullable_production(&production.body, &nullable) {
                if !body.is_empty() {
                    new_productions.push(Production::new(production.head.clone(), body));
                }
            }
        }
        CFG::new(
            self.variables.iter().cloned(),
            self.terminals.iter().cloned(),
            self.start_symbol.clone(),
            new_productions,
        )
    }

    /// The pairs `(A, B)` such that `A` derives `B` through unit productions only,
    /// including every `(A, A)`
    pub fn get_unit_pairs(&self) -> FxHashSet<(Variable, Variable)> {
        let mut unit_productions: FxHashMap<&Variable, Vec<&Variable>> = FxHashMap::default();
        for production in &self.productions {
            if let [Symbol::V(body)] = production.body.as_slice() {
                unit_productions.entry(&production.head).or_default().push(body);
            }
        }
        let mut unit_pairs: FxHashSet<(Variable, Variable)> = self
            .variables
            .iter()
            .map(|v| (v.clone(), v.clone()))
            .collect();
        let mut to_process: SetQueue<(Variable, Variable)> = unit_pairs.iter().cloned().collect();
        while let Some((var_a, var_b)) = to_process.pop() {
            let Some(next_bodies) = unit_productions.get(&var_b) else {
                continue;
            };
            for &next in next_bodies {
                let pair = (var_a.clone(), next.clone());
                if unit_pairs.insert(pair.clone()) {
                    to_process.push(pair);
                }
            }
        }
        unit_pairs
    }

    /// Replaces every chain `A =>* B -> body` of unit productions by `A -> body`
    pub fn eliminate_unit_productions(&self) -> CFG {
        debug!(productions = self.productions.len(), "eliminating unit productions");
        let unit_pairs = self.get_unit_pairs();
        let mut productions: Vec<Production> = self
            .productions
            .iter()
            .filter(|p| !matches!(p.body.as_slice(), [Symbol::V(_)]))
            .cloned()
            .collect();
        let mut productions_d: FxHashMap<Variable, Vec<Vec<Symbol>>> = FxHashMap::default();
        for production in &productions {
            productions_d
                .entry(production.head.clone())
                .or_default()
                .push(production.body.clone());
        }
        for (var_a, var_b) in &unit_pairs {
            if let Some(bodies) = productions_d.get(var_b) {
                for body in bodies {
                    productions.push(Production::new_raw(var_a.clone(), body.clone()));
                }
            }
        }
        CFG::new(
            self.variables.iter().cloned(),
            self.terminals.iter().cloned(),
            self.start_symbol.clone(),
            productions,
        )
    }

    /// The four conditions under which the CNF can be built without further cleanup
    fn _is_cleaned(&self) -> bool {
        let symbols = self.variables.len() + self.terminals.len();
        self.get_nullable_symbols().is_empty()
            && self.get_unit_pairs().len() == self.variables.len()
            && self.get_generating_symbols().len() == symbols
            && self.get_reachable_symbols().len() == symbols
    }

    /// Replaces each terminal of a body of length > 1 by a proxy variable `t#CNF#`
    fn _get_productions_with_only_single_terminals(&self) -> Vec<Production> {
        let mut used: Vec<Terminal> = Vec::new();
        let mut used_set: FxHashSet<&Terminal> = FxHashSet::default();
        let proxy = |t: &Terminal| Variable::from_string(format!("{}{}", t.name, CNF_SUFFIX));
        let mut new_productions = Vec::with_capacity(self.productions.len());
        for production in &self.productions {
            if production.body.len() == 1 {
                new_productions.push(production.clone());
                continue;
            }
            let body = production
                .body
                .iter()
                .map(|symbol| match symbol {
                    Symbol::T(t) => {
                        if used_set.insert(t) {
                            used.push(t.clone());
                        }
                        Symbol::V(proxy(t))
                    }
                    Symbol::V(_) => symbol.clone(),
                })
                .collect();
            new_productions.push(Production::new_raw(production.head.clone(), body));
        }
        for terminal in used {
            new_productions.push(Production::new_raw(proxy(&terminal), vec![Symbol::T(terminal)]));
        }
        new_productions
    }

    fn _get_next_free_variable(&self, idx: &mut usize, prefix: &str) -> Variable {
        loop {
            *idx += 1;
            let candidate = Variable::from_string(format!("{}{}", prefix, idx));
            if !self.variables.contains(&candidate) {
                return candidate;
            }
        }
    }

    /// Splits the bodies longer than two into chains of binary productions.
    /// A chain built for a suffix is reused by every later body ending with the same suffix.
    fn _decompose_productions(&self, productions: Vec<Production>) -> Vec<Production> {
        let mut idx = 0;
        let mut done: FxHashMap<Vec<Symbol>, Variable> = FxHashMap::default();
        let mut new_productions = Vec::with_capacity(productions.len());
        for production in productions {
            let body = &production.body;
            if body.len() <= 2 {
                new_productions.push(production);
                continue;
            }
            let mut head = production.head.clone();
            let mut stopped = false;
            for i in 0..body.len() - 2 {
                let suffix = body[i + 1..].to_vec();
                if let Some(existing) = done.get(&suffix) {
                    new_productions.push(Production::new_raw(
                        head.clone(),
                        vec![body[i].clone(), Symbol::V(existing.clone())],
                    ));
                    stopped = true;
                    break;
                }
                let chain = self._get_next_free_variable(&mut idx, CNF_CHAIN_PREFIX);
                new_productions.push(Production::new_raw(
                    head,
                    vec![body[i].clone(), Symbol::V(chain.clone())],
                ));
                done.insert(suffix, chain.clone());
                head = chain;
            }
            if !stopped {
                let n = body.len();
                new_productions.push(Production::new_raw(
                    head,
                    vec![body[n - 2].clone(), body[n - 1].clone()],
                ));
            }
        }
        new_productions
    }

    /// Gets the Chomsky Normal Form of the grammar.
    ///
    /// A normal form cannot generate the empty word: the result generates the same words as
    /// `self` except epsilon. The result is computed once per grammar.
    pub fn to_normal_form(&self) -> CFG {
        self._normal_form
            .get_or_init(|| Box::new(self._compute_normal_form()))
            .as_ref()
            .clone()
    }

    fn _compute_normal_form(&self) -> CFG {
        debug!(productions = self.productions.len(), "converting to normal form");
        let mut current = self._without_caches();
        while !current._is_cleaned() {
            if current.productions.is_empty() {
                return current;
            }
            current = current
                .remove_useless_symbols()
                .remove_epsilon()
                .remove_useless_symbols()
                .eliminate_unit_productions()
                .remove_useless_symbols();
        }
        let single_terminals = current._get_productions_with_only_single_terminals();
        let decomposed = current._decompose_productions(single_terminals);
        CFG::new([], [], current.start_symbol.clone(), decomposed)
    }

    fn _without_caches(&self) -> CFG {
        CFG {
            variables: self.variables.clone(),
            terminals: self.terminals.clone(),
            start_symbol: self.start_symbol.clone(),
            productions: self.productions.clone(),
            _impacts_and_remaining_list: OnceCell::new(),
            _normal_form: OnceCell::new(),
        }
    }

    /// Replaces each terminal of `substitution` by the language of the associated grammar.
    ///
    /// Every variable is renamed with a `#SUBS#<n>` suffix so that the grammars do not clash.
    pub fn substitute(&self, substitution: &FxHashMap<Terminal, &CFG>) -> CFG {
        let mut idx = 0;
        let rename = |variable: &Variable, idx: &mut usize| {
            let renamed = Variable::from_string(format!("{}{}{}", variable.name, SUBS_SUFFIX, idx));
            *idx += 1;
            renamed
        };
        let mut new_variables: Vec<Variable> = Vec::new();
        let mut renamed: FxHashMap<Variable, Variable> = FxHashMap::default();
        for variable in &self.variables {
            let temp = rename(variable, &mut idx);
            new_variables.push(temp.clone());
            renamed.insert(variable.clone(), temp);
        }

        let mut productions = Vec::new();
        let mut final_replacement: FxHashMap<&Terminal, Variable> = FxHashMap::default();
        for (terminal, cfg) in substitution {
            let mut renamed_local: FxHashMap<Variable, Variable> = FxHashMap::default();
            for variable in &cfg.variables {
                let temp = rename(variable, &mut idx);
                new_variables.push(temp.clone());
                renamed_local.insert(variable.clone(), temp);
            }
            for production in &cfg.productions {
                let body = production
                    .body
                    .iter()
                    .map(|symbol| match symbol {
                        Symbol::V(v) => Symbol::V(renamed_local[v].clone()),
                        Symbol::T(_) => symbol.clone(),
                    })
                    .collect();
                productions.push(Production::new_raw(renamed_local[&production.head].clone(), body));
            }
            // a grammar without start symbol generates nothing: stand in a variable without rules
            let replacement = match &cfg.start_symbol {
                Some(start) => renamed_local[start].clone(),
                None => {
                    let empty = Variable::from_string(format!("#EMPTY#{}{}", SUBS_SUFFIX, idx));
                    idx += 1;
                    new_variables.push(empty.clone());
                    empty
                }
            };
            final_replacement.insert(terminal, replacement);
        }

        for production in &self.productions {
            let body = production
                .body
                .iter()
                .map(|symbol| match symbol {
                    Symbol::V(v) => Symbol::V(renamed[v].clone()),
                    Symbol::T(t) => match final_replacement.get(t) {
                        Some(v) => Symbol::V(v.clone()),
                        None => symbol.clone(),
                    },
                })
                .collect();
            productions.push(Production::new_raw(renamed[&production.head].clone(), body));
        }
        let start = self.start_symbol.as_ref().map(|s| renamed[s].clone());
        CFG::new(new_variables, [], start, productions)
    }

    /// Generates the words of either grammar
    pub fn union(&self, other: &CFG) -> CFG {
        let start = Variable::new("#STARTUNION#");
        let first = Terminal::new("#0UNION#");
        let second = Terminal::new("#1UNION#");
        let skeleton = CFG::from_start_and_productions(
            start.clone(),
            [
                Production::new(start.clone(), vec![Symbol::T(first.clone())]),
                Production::new(start, vec![Symbol::T(second.clone())]),
            ],
        );
        skeleton.substitute(&FxHashMap::from_iter([(first, self), (second, other)]))
    }

    /// Generates the words `uv` with `u` from `self` and `v` from `other`
    pub fn concatenate(&self, other: &CFG) -> CFG {
        let start = Variable::new("#STARTCONC#");
        let first = Terminal::new("#0CONC#");
        let second = Terminal::new("#1CONC#");
        let skeleton = CFG::from_start_and_productions(
            start.clone(),
            [Production::new(
                start,
                vec![Symbol::T(first.clone()), Symbol::T(second.clone())],
            )],
        );
        skeleton.substitute(&FxHashMap::from_iter([(first, self), (second, other)]))
    }

    /// Kleene star of the language
    pub fn get_closure(&self) -> CFG {
        let start = Variable::new("#STARTCLOS#");
        let inner = Terminal::new("#1CLOS#");
        let skeleton = CFG::from_start_and_productions(
            start.clone(),
            [
                Production::new(start.clone(), vec![Symbol::T(inner.clone())]),
                Production::new(
                    start.clone(),
                    vec![Symbol::V(start.clone()), Symbol::V(start.clone())],
                ),
                Production::new(start, vec![]),
            ],
        );
        skeleton.substitute(&FxHashMap::from_iter([(inner, self)]))
    }

    /// The concatenations of one or more words of the language
    pub fn get_positive_closure(&self) -> CFG {
        let start = Variable::new("#STARTPOSCLOS#");
        let repeat = Variable::new("#VARPOSCLOS#");
        let inner = Terminal::new("#1POSCLOS#");
        let skeleton = CFG::from_start_and_productions(
            start.clone(),
            [
                Production::new(
                    start,
                    vec![Symbol::T(inner.clone()), Symbol::V(repeat.clone())],
                ),
                Production::new(
                    repeat.clone(),
                    vec![Symbol::V(repeat.clone()), Symbol::V(repeat.clone())],
                ),
                Production::new(repeat.clone(), vec![Symbol::T(inner.clone())]),
                Production::new(repeat, vec![]),
            ],
        );
        skeleton.substitute(&FxHashMap::from_iter([(inner, self)]))
    }

    /// Generates the mirror image of every word
    pub fn reverse(&self) -> CFG {
        let productions = self.productions.iter().map(|p| {
            let mut body = p.body.clone();
            body.reverse();
            Production::new_raw(p.head.clone(), body)
        });
        CFG::new(
            self.variables.iter().cloned(),
            self.terminals.iter().cloned(),
            self.start_symbol.clone(),
            productions,
        )
    }

    /// Whether the word is generated. Epsilon symbols in the word are ignored.
    pub fn contains(&self, word: &[Terminal]) -> bool {
        let word: Vec<Terminal> = word.iter().filter(|t| !t.is_epsilon()).cloned().collect();
        if word.is_empty() {
            return self.generate_epsilon();
        }
        CYKTable::new(self, word).generate_word()
    }

    /// A parse tree of the word in the normal form of the grammar
    pub fn get_cnf_parse_tree(&self, word: &[Terminal]) -> Result<ParseTree> {
        let word: Vec<Terminal> = word.iter().filter(|t| !t.is_epsilon()).cloned().collect();
        CYKTable::new(self, word).get_parse_tree()
    }

    /// Returns the intersection language of this CFG with a regular language, given by any
    /// finite automaton
    pub fn intersection(&self, other: &impl FiniteAutomaton) -> CFG {
        self.intersection_with_dfa(&other.to_deterministic())
    }

    /// Bar-Hillel construction: the variables of the result are triples `(p, A, q)` standing
    /// for the words derivable from `A` that lead the automaton from `p` to `q`
    pub fn intersection_with_dfa(&self, dfa: &DFA) -> CFG {
        if self.is_empty() || dfa.is_empty() {
            return CFG::empty();
        }
        let generate_empty = self.contains(&[]) && dfa.accepts(&[]);
        let cfg = self.to_normal_form();
        let states: Vec<State> = dfa.get_states().to_vec();
        debug!(
            productions = cfg.productions.len(),
            states = states.len(),
            "intersecting grammar with automaton"
        );
        let mut converter: VariableConverter<State, Variable> = VariableConverter::new();
        let mut new_productions = Vec::new();
        for production in &cfg.productions {
            match production.body.as_slice() {
                [Symbol::V(left), Symbol::V(right)] => {
                    for state_p in &states {
                        for state_r in &states {
                            let head = converter.to_combined(state_p, &production.head, state_r);
                            for state_q in &states {
                                let body = vec![
                                    Symbol::V(converter.to_combined(state_p, left, state_q)),
                                    Symbol::V(converter.to_combined(state_q, right, state_r)),
                                ];
                                new_productions.push(Production::new_raw(head.clone(), body));
                            }
                        }
                    }
                }
                [Symbol::T(terminal)] => {
                    for state_p in &states {
                        if let Some(state_q) = dfa.get_next_state(state_p, terminal) {
                            let head = converter.to_combined(state_p, &production.head, state_q);
                            new_productions
                                .push(Production::new_raw(head, vec![Symbol::T(terminal.clone())]));
                        }
                    }
                }
                _ => {}
            }
        }

        let start = Variable::new("Start");
        if let (Some(cfg_start), Some(dfa_start)) = (&cfg.start_symbol, dfa.get_start_state()) {
            let mut finals: Vec<State> = dfa.get_accept_states().into_iter().collect();
            finals.sort();
            for final_state in &finals {
                let body = vec![Symbol::V(converter.to_combined(dfa_start, cfg_start, final_state))];
                new_productions.push(Production::new_raw(start.clone(), body));
            }
        }
        if generate_empty {
            new_productions.push(Production::new_raw(start.clone(), vec![]));
        }
        CFG::from_start_and_productions(start, new_productions)
    }

    /// The words of the grammar, shortest first, up to `max_length` symbols if given
    pub fn get_words(&self, max_length: Option<usize>) -> Words {
        self.get_words_with(WordsConfig { max_length })
    }

    pub fn get_words_with(&self, config: WordsConfig) -> Words {
        Words::new(self, config.max_length)
    }

    /// Whether the language is finite, i.e. the binary productions of the normal form are acyclic
    pub fn is_finite(&self) -> bool {
        let normal = self.to_normal_form();
        let mut edges: FxHashMap<&Variable, Vec<&Variable>> = FxHashMap::default();
        for production in &normal.productions {
            if let [Symbol::V(left), Symbol::V(right)] = production.body.as_slice() {
                let targets = edges.entry(&production.head).or_default();
                targets.push(left);
                targets.push(right);
            }
        }

        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Colour {
            InProgress,
            Done,
        }
        let mut colours: FxHashMap<&Variable, Colour> = FxHashMap::default();
        let mut heads: Vec<&Variable> = edges.keys().copied().collect();
        heads.sort();
        for root in heads {
            if colours.contains_key(root) {
                continue;
            }
            colours.insert(root, Colour::InProgress);
            let mut stack: Vec<(&Variable, usize)> = vec![(root, 0)];
            while let Some((node, next)) = stack.pop() {
                let successors = edges.get(node).map(Vec::as_slice).unwrap_or(&[]);
                if next == successors.len() {
                    colours.insert(node, Colour::Done);
                    continue;
                }
                stack.push((node, next + 1));
                let child = successors[next];
                match colours.get(child) {
                    Some(Colour::InProgress) => return false,
                    Some(Colour::Done) => {}
                    None => {
                        colours.insert(child, Colour::InProgress);
                        stack.push((child, 0));
                    }
                }
            }
        }
        true
    }

    /// One line per production, readable by `from_text`
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for production in &self.productions {
            text.push_str(&production.to_text());
            text.push('\n');
        }
        text
    }
}

impl CFG {
    /// Reads a context-free grammar from a string of text.
    ///
    /// Each rule in the grammar is represented as one line in the following format:
    ///   `head -> body1 | body2 | ... | bodyn`
    ///
    /// Variables start with an uppercase letter, every other symbol is a terminal. The
    /// epsilon spellings `epsilon`, `$`, `ε`, `ϵ` and `Є` stand for the empty body.
    /// `"VAR:x"` and `"TER:X"` force the kind of a symbol.
    pub fn from_text(text: &str, start_symbol: Variable) -> Result<Self> {
        let mut productions = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if !line.is_empty() {
                CFG::read_line(line, &mut productions)?;
            }
        }
        Ok(Self::from_start_and_productions(start_symbol, productions))
    }

    /// Splits an escaped symbol into its kind and name
    fn read_special(component: &str) -> Result<Option<(&str, &str)>> {
        for kind in ["VAR", "TER"] {
            let prefix = format!("\"{}:", kind);
            if let Some(rest) = component.strip_prefix(prefix.as_str()) {
                let name = rest.strip_suffix('"').ok_or_else(|| FormlangError::MalformedSymbol {
                    symbol: component.to_string(),
                })?;
                return Ok(Some((kind, name)));
            }
        }
        Ok(None)
    }

    fn read_line(line: &str, productions: &mut Vec<Production>) -> Result<()> {
        let (head_s, body_s) = line.split_once("->").ok_or_else(|| FormlangError::MalformedRule {
            line: line.to_string(),
        })?;
        let head_text = head_s.trim();
        let head = match CFG::read_special(head_text)? {
            Some((_, name)) => Variable::new(name),
            None => Variable::new(head_text),
        };

        for sub_body in body_s.split('|') {
            let mut body = Vec::new();
            for component in sub_body.split_whitespace() {
                let (kind, name) = match CFG::read_special(component)? {
                    Some((kind, name)) => (kind, name),
                    None => ("", component),
                };
                let uppercase = name.chars().next().map_or(false, char::is_uppercase);
                if kind == "VAR" || (kind.is_empty() && uppercase) {
                    body.push(Symbol::V(Variable::new(name)));
                } else if kind == "TER" || !TERMINAL_EPSILON_SYMBOLS.contains(&name) {
                    body.push(Symbol::T(Terminal::new(name)));
                }
            }
            productions.push(Production::new(head.clone(), body));
        }
        Ok(())
    }
}

impl PartialEq for CFG {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
            && self.terminals == other.terminals
            && self.start_symbol == other.start_symbol
            && self.productions.len() == other.productions.len()
            && {
                let own: FxHashSet<&Production> = self.productions.iter().collect();
                other.productions.iter().all(|p| own.contains(p))
            }
    }
}

impl Eq for CFG {}

impl Language for CFG {
    fn accepts(&self, input: &[InputSymbol]) -> bool {
        self.contains(input)
    }
}

impl Display for CFG {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Lazy enumeration of the words of a grammar, by increasing length.
///
/// Words of the same length come in discovery order. Enumeration stops at the maximum length
/// if one is given, or once no new word appeared for more than half of the lengths tried.
pub struct Words {
    normal_form: CFG,
    max_length: Option<usize>,
    generated: FxHashMap<Variable, Vec<Vec<Vec<Terminal>>>>, // variable -> length -> words
    seen: FxHashSet<(Variable, Vec<Terminal>)>,
    pending: VecDeque<Vec<Terminal>>,
    current_length: usize,
    total_no_modification: usize,
    done: bool,
}

impl Words {
    fn new(cfg: &CFG, max_length: Option<usize>) -> Self {
        let mut words = Words {
            normal_form: CFG::empty(),
            max_length,
            generated: FxHashMap::default(),
            seen: FxHashSet::default(),
            pending: VecDeque::new(),
            current_length: 2,
            total_no_modification: 0,
            done: false,
        };
        if cfg.generate_epsilon() {
            words.pending.push_back(vec![]);
        }
        if max_length == Some(0) {
            words.done = true;
            return words;
        }
        words.normal_form = cfg.to_normal_form();

        for production in &words.normal_form.productions {
            words
                .generated
                .entry(production.head.clone())
                .or_insert_with(|| vec![vec![]]);
            if production.body.len() == 2 {
                for symbol in &production.body {
                    if let Symbol::V(v) = symbol {
                        words.generated.entry(v.clone()).or_insert_with(|| vec![vec![]]);
                    }
                }
            }
        }
        for production in &words.normal_form.productions {
            let [Symbol::T(terminal)] = production.body.as_slice() else {
                continue;
            };
            let Some(generated) = words.generated.get_mut(&production.head) else {
                continue;
            };
            if generated.len() == 1 {
                generated.push(vec![]);
            }
            let word = vec![terminal.clone()];
            if words.seen.insert((production.head.clone(), word.clone())) {
                generated[1].push(word.clone());
                if Some(&production.head) == words.normal_form.start_symbol.as_ref() {
                    words.pending.push_back(word);
                }
            }
        }
        words
    }

    /// Computes all the words of length `current_length`
    fn next_round(&mut self) {
        let length = self.current_length;
        for generated in self.generated.values_mut() {
            if generated.len() != length {
                generated.push(vec![]);
            }
        }
        let mut was_modified = false;
        for production in &self.normal_form.productions {
            if let Some(generated) = self.generated.get_mut(&production.head) {
                if generated.len() != length + 1 {
                    generated.push(vec![]);
                }
            }
            let [Symbol::V(left), Symbol::V(right)] = production.body.as_slice() else {
                continue;
            };
            let mut candidates = Vec::new();
            if let (Some(left_words), Some(right_words)) =
                (self.generated.get(left), self.generated.get(right))
            {
                for i in 1..length {
                    let j = length - i;
                    let (Some(lefts), Some(rights)) = (left_words.get(i), right_words.get(j)) else {
                        continue;
                    };
                    for l in lefts {
                        for r in rights {
                            let mut word = l.clone();
                            word.extend(r.iter().cloned());
                            candidates.push(word);
                        }
                    }
                }
            }
            for word in candidates {
                if !self.seen.insert((production.head.clone(), word.clone())) {
                    continue;
                }
                was_modified = true;
                if let Some(generated) = self.generated.get_mut(&production.head) {
                    generated[length].push(word.clone());
                }
                if Some(&production.head) == self.normal_form.start_symbol.as_ref() {
                    self.pending.push_back(word);
                }
            }
        }
        if was_modified {
            self.total_no_modification = 0;
        } else {
            self.total_no_modification += 1;
        }
        self.current_length += 1;
        trace!(length, was_modified, "word generation round");
        if 2 * self.total_no_modification > self.current_length {
            self.done = true;
        }
    }
}

impl Iterator for Words {
    type Item = Vec<Terminal>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(word) = self.pending.pop_front() {
                return Some(word);
            }
            if self.done {
                return None;
            }
            if self.max_length.map_or(false, |max| self.current_length > max) {
                self.done = true;
                return None;
            }
            self.next_round();
        }
    }
}
