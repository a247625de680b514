use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

use crate::cfg::terminal::Terminal;
use crate::cfg::variable::Variable;
use crate::error::FormlangError;

use super::rules::Rule;

pub const DEFAULT_SEED: u64 = 0x5EED;
const ARBORESCENCE_ROOT: &str = "S";

/// Order in which the marking pass visits the non consumption rules.
///
/// Only the speed of convergence depends on it. The heuristics look at the dependency graph
/// where `B -> A` means that marking `B` may mark `A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleOrdering {
    Given,
    Reverse,
    ByCore,
    ByCoreReversed,
    ByArborescenceReversed,
    ByArborescence,
    ByEdges,
    #[default]
    ByEdgesReversed,
    /// Shuffle with a fixed seed
    Random(u64),
}

impl TryFrom<u8> for RuleOrdering {
    type Error = FormlangError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => RuleOrdering::Given,
            1 => RuleOrdering::Reverse,
            2 => RuleOrdering::ByCore,
            3 => RuleOrdering::ByCoreReversed,
            4 => RuleOrdering::ByArborescenceReversed,
            5 => RuleOrdering::ByArborescence,
            6 => RuleOrdering::ByEdges,
            7 => RuleOrdering::ByEdgesReversed,
            8 => RuleOrdering::Random(DEFAULT_SEED),
            _ => return Err(FormlangError::UnknownRuleOrdering(code)),
        })
    }
}

/// Directed graph over non-terminals, edges deduplicated and kept in insertion order
#[derive(Default)]
struct DependencyGraph {
    nodes: Vec<Variable>,
    successors: FxHashMap<Variable, Vec<Variable>>,
    predecessors: FxHashMap<Variable, Vec<Variable>>,
    edges: Vec<(Variable, Variable)>,
}

impl DependencyGraph {
    fn build(rules: &[Rule], consumption_rules: &FxHashMap<Terminal, Vec<Rule>>) -> Self {
        let mut graph = DependencyGraph::default();
        for rule in rules {
            match rule {
                Rule::Duplication { left, right0, right1 } => {
                    if right0 != left {
                        graph.add_edge(right0, left);
                    }
                    if right1 != left {
                        graph.add_edge(right1, left);
                    }
                }
                Rule::Production { left, production, .. } => {
                    for f_rule in consumption_rules.get(production).into_iter().flatten() {
                        if let Rule::Consumption { right, .. } = f_rule {
                            if right != left {
                                graph.add_edge(right, left);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        graph
    }

    fn add_node(&mut self, node: &Variable) {
        if !self.successors.contains_key(node) {
            self.nodes.push(node.clone());
            self.successors.insert(node.clone(), Vec::new());
            self.predecessors.insert(node.clone(), Vec::new());
        }
    }

    fn add_edge(&mut self, from: &Variable, to: &Variable) {
        self.add_node(from);
        self.add_node(to);
        let successors = self.successors.entry(from.clone()).or_default();
        if successors.contains(to) {
            return;
        }
        successors.push(to.clone());
        self.predecessors.entry(to.clone()).or_default().push(from.clone());
        self.edges.push((from.clone(), to.clone()));
    }

    fn out_degree(&self, node: &Variable) -> usize {
        self.successors.get(node).map_or(0, Vec::len)
    }

    /// k-core numbers, the degree of a node counting both directions
    fn core_numbers(&self) -> FxHashMap<Variable, usize> {
        let mut degree: FxHashMap<&Variable, usize> = self
            .nodes
            .iter()
            .map(|n| (n, self.successors[n].len() + self.predecessors[n].len()))
            .collect();
        let mut removed: FxHashSet<&Variable> = FxHashSet::default();
        let mut cores = FxHashMap::default();
        let mut current = 0;
        while removed.len() < self.nodes.len() {
            let Some(node) = self
                .nodes
                .iter()
                .filter(|n| !removed.contains(n))
                .min_by_key(|n| degree[n])
            else {
                break;
            };
            current = current.max(degree[node]);
            cores.insert(node.clone(), current);
            removed.insert(node);
            for neighbour in self.successors[node].iter().chain(self.predecessors[node].iter()) {
                if !removed.contains(neighbour) {
                    if let Some(d) = degree.get_mut(neighbour) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
        }
        cores
    }

    /// Breadth-first depth of every node in a spanning forest of the undirected graph,
    /// measured from `root`. Nodes outside the tree of `root` are absent.
    fn arborescence_depths(&self, root: &Variable) -> FxHashMap<Variable, usize> {
        let mut parent: FxHashMap<&Variable, &Variable> = FxHashMap::default();
        fn find<'a>(parent: &mut FxHashMap<&'a Variable, &'a Variable>, node: &'a Variable) -> &'a Variable {
            let mut current = node;
            while let Some(&next) = parent.get(current) {
                if next == current {
                    break;
                }
                current = next;
            }
            parent.insert(node, current);
            current
        }
        let mut tree: FxHashMap<&Variable, Vec<&Variable>> = FxHashMap::default();
        for (from, to) in &self.edges {
            let root_from = find(&mut parent, from);
            let root_to = find(&mut parent, to);
            if root_from != root_to {
                parent.insert(root_from, root_to);
                tree.entry(from).or_default().push(to);
                tree.entry(to).or_default().push(from);
            }
        }
        let mut depths = FxHashMap::default();
        depths.insert(root.clone(), 0);
        let mut to_process = VecDeque::from([(root, 0)]);
        while let Some((current, depth)) = to_process.pop_front() {
            for &next in tree.get(current).into_iter().flatten() {
                if !depths.contains_key(next) {
                    depths.insert(next.clone(), depth + 1);
                    to_process.push_back((next, depth + 1));
                }
            }
        }
        depths
    }
}

fn sort_by_left<F>(mut rules: Vec<Rule>, reverse: bool, key: F) -> Vec<Rule>
where
    F: Fn(&Variable) -> usize,
{
    rules.sort_by_key(|rule| key(rule.left_term()));
    if reverse {
        rules.reverse();
    }
    rules
}

impl RuleOrdering {
    /// Reorders the non consumption rules
    pub fn order(&self, rules: Vec<Rule>, consumption_rules: &FxHashMap<Terminal, Vec<Rule>>) -> Vec<Rule> {
        match self {
            RuleOrdering::Given => rules,
            RuleOrdering::Reverse => rules.into_iter().rev().collect(),
            RuleOrdering::ByCore | RuleOrdering::ByCoreReversed => {
                let cores = DependencyGraph::build(&rules, consumption_rules).core_numbers();
                sort_by_left(rules, *self == RuleOrdering::ByCoreReversed, |v| {
                    cores.get(v).copied().unwrap_or(0)
                })
            }
            RuleOrdering::ByArborescence | RuleOrdering::ByArborescenceReversed => {
                let depths = DependencyGraph::build(&rules, consumption_rules)
                    .arborescence_depths(&Variable::new(ARBORESCENCE_ROOT));
                sort_by_left(rules, *self == RuleOrdering::ByArborescenceReversed, |v| {
                    depths.get(v).copied().unwrap_or(0)
                })
            }
            RuleOrdering::ByEdges | RuleOrdering::ByEdgesReversed => {
                let graph = DependencyGraph::build(&rules, consumption_rules);
                sort_by_left(rules, *self == RuleOrdering::ByEdgesReversed, |v| graph.out_degree(v))
            }
            RuleOrdering::Random(seed) => {
                let mut rules = rules;
                rules.shuffle(&mut StdRng::seed_from_u64(*seed));
                rules
            }
        }
    }
}
