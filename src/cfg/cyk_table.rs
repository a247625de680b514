use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::cfg::cfg::CFG;
use crate::cfg::parse_tree::ParseTree;
use crate::cfg::production::Symbol;
use crate::cfg::terminal::{epsilon, Terminal};
use crate::cfg::variable::Variable;
use crate::error::{FormlangError, Result};

type Body = SmallVec<[Symbol; 2]>;

/// How a variable was derived over a span
#[derive(Debug, Clone)]
enum Backpointer {
    Leaf(Terminal),
    Split {
        mid: usize,
        left: Variable,
        right: Variable,
    },
}

/// The variables deriving one span. Each variable keeps the first derivation found for it.
#[derive(Debug, Clone, Default)]
struct CYKCell {
    order: Vec<Variable>,
    derivations: FxHashMap<Variable, Backpointer>,
}

impl CYKCell {
    fn insert(&mut self, variable: &Variable, backpointer: Backpointer) {
        if !self.derivations.contains_key(variable) {
            self.order.push(variable.clone());
            self.derivations.insert(variable.clone(), backpointer);
        }
    }

    fn contains(&self, variable: &Variable) -> bool {
        self.derivations.contains_key(variable)
    }
}

/// CYK recognition of one word against the normal form of a grammar.
///
/// `table[(i, j)]` holds the variables deriving `word[i..j]`. Spans are filled by increasing
/// length so both halves of a split are complete when a span is computed.
pub struct CYKTable {
    normal_form: CFG,
    word: Vec<Terminal>,
    productions_d: FxHashMap<Body, Vec<Variable>>,
    table: FxHashMap<(usize, usize), CYKCell>,
}

impl CYKTable {
    pub fn new(cfg: &CFG, word: Vec<Terminal>) -> Self {
        let mut cyk = CYKTable {
            normal_form: cfg.to_normal_form(),
            word,
            productions_d: FxHashMap::default(),
            table: FxHashMap::default(),
        };
        cyk._set_productions_by_body();
        if cyk._generates_all_terminals() {
            cyk._initialize_table();
            cyk._propagate_in_table();
        } else {
            cyk.table.insert((0, cyk.word.len()), CYKCell::default());
        }
        cyk
    }

    fn _set_productions_by_body(&mut self) {
        for production in self.normal_form.get_productions() {
            let body: Body = production.body.iter().cloned().collect();
            self.productions_d
                .entry(body)
                .or_default()
                .push(production.head.clone());
        }
    }

    fn _generates_all_terminals(&self) -> bool {
        self.word.iter().all(|t| {
            let body: Body = [Symbol::T(t.clone())].into_iter().collect();
            self.productions_d.contains_key(&body)
        })
    }

    fn _initialize_table(&mut self) {
        for (i, terminal) in self.word.iter().enumerate() {
            let mut cell = CYKCell::default();
            let body: Body = [Symbol::T(terminal.clone())].into_iter().collect();
            if let Some(heads) = self.productions_d.get(&body) {
                for head in heads {
                    cell.insert(head, Backpointer::Leaf(terminal.clone()));
                }
            }
            self.table.insert((i, i + 1), cell);
        }
    }

    fn _propagate_in_table(&mut self) {
        let n = self.word.len();
        for size in 2..=n {
            for start in 0..=n - size {
                let end = start + size;
                let mut cell = CYKCell::default();
                for mid in start + 1..end {
                    let (Some(left_cell), Some(right_cell)) =
                        (self.table.get(&(start, mid)), self.table.get(&(mid, end)))
                    else {
                        continue;
                    };
                    for left in &left_cell.order {
                        for right in &right_cell.order {
                            let body: Body =
                                [Symbol::V(left.clone()), Symbol::V(right.clone())].into_iter().collect();
                            let Some(heads) = self.productions_d.get(&body) else {
                                continue;
                            };
                            for head in heads {
                                cell.insert(
                                    head,
                                    Backpointer::Split {
                                        mid,
                                        left: left.clone(),
                                        right: right.clone(),
                                    },
                                );
                            }
                        }
                    }
                }
                self.table.insert((start, end), cell);
            }
            trace!(size, "cyk spans filled");
        }
    }

    /// Whether the start symbol derives the whole word. A normal form never derives the empty
    /// word.
    pub fn generate_word(&self) -> bool {
        let Some(start) = self.normal_form.get_start_symbol() else {
            return false;
        };
        if self.word.is_empty() {
            return false;
        }
        self.table
            .get(&(0, self.word.len()))
            .map_or(false, |cell| cell.contains(start))
    }

    /// A parse tree of the word rooted at the start symbol.
    ///
    /// Among several derivations, the first one found is returned: smallest split point first,
    /// then the order in which the variables entered the sub-spans.
    pub fn get_parse_tree(&self) -> Result<ParseTree> {
        if self.word.is_empty() {
            let root = match self.normal_form.get_start_symbol() {
                Some(start) => Symbol::V(start.clone()),
                None => Symbol::T(epsilon()),
            };
            return Ok(ParseTree::new(root));
        }
        let start = match self.normal_form.get_start_symbol() {
            Some(start) if self.generate_word() => start,
            _ => {
                let word: Vec<&str> = self.word.iter().map(|t| t.get_name()).collect();
                return Err(FormlangError::DerivationNotFound {
                    word: word.join(" "),
                });
            }
        };
        Ok(self._build_tree(start, 0, self.word.len()))
    }

    fn _build_tree(&self, variable: &Variable, start: usize, end: usize) -> ParseTree {
        let backpointer = self
            .table
            .get(&(start, end))
            .and_then(|cell| cell.derivations.get(variable));
        let sons = match backpointer {
            Some(Backpointer::Leaf(terminal)) => vec![ParseTree::new(Symbol::T(terminal.clone()))],
            Some(Backpointer::Split { mid, left, right }) => vec![
                self._build_tree(left, start, *mid),
                self._build_tree(right, *mid, end),
            ],
            None => vec![],
        };
        ParseTree::with_sons(Symbol::V(variable.clone()), sons)
    }
}
