use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{Display, Formatter};

use crate::cfg::terminal::Terminal;
use crate::cfg::variable::Variable;

use super::rule_ordering::RuleOrdering;

/// A rule of an indexed grammar in reduced form. `σ` stands for the index stack, which every
/// rule except `Consumption` and `Production` passes along unchanged.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Rule {
    /// `left[σ] -> right0[σ] right1[σ]`
    Duplication {
        left: Variable,
        right0: Variable,
        right1: Variable,
    },
    /// `left[σ] -> right[production σ]`
    Production {
        left: Variable,
        right: Variable,
        production: Terminal,
    },
    /// `left[f σ] -> right[σ]`
    Consumption {
        f_parameter: Terminal,
        left: Variable,
        right: Variable,
    },
    /// `left[σ] -> right`
    End { left: Variable, right: Terminal },
}

impl Rule {
    pub fn duplication(left: &str, right0: &str, right1: &str) -> Self {
        Rule::Duplication {
            left: Variable::new(left),
            right0: Variable::new(right0),
            right1: Variable::new(right1),
        }
    }

    pub fn production(left: &str, right: &str, production: &str) -> Self {
        Rule::Production {
            left: Variable::new(left),
            right: Variable::new(right),
            production: Terminal::new(production),
        }
    }

    pub fn consumption(f_parameter: &str, left: &str, right: &str) -> Self {
        Rule::Consumption {
            f_parameter: Terminal::new(f_parameter),
            left: Variable::new(left),
            right: Variable::new(right),
        }
    }

    pub fn end(left: &str, right: &str) -> Self {
        Rule::End {
            left: Variable::new(left),
            right: crate::cfg::terminal::to_terminal(right),
        }
    }

    pub fn left_term(&self) -> &Variable {
        match self {
            Rule::Duplication { left, .. }
            | Rule::Production { left, .. }
            | Rule::Consumption { left, .. }
            | Rule::End { left, .. } => left,
        }
    }

    /// The pushed index of a production rule
    pub fn get_production(&self) -> Option<&Terminal> {
        match self {
            Rule::Production { production, .. } => Some(production),
            _ => None,
        }
    }

    /// The consumed index of a consumption rule
    pub fn get_f_parameter(&self) -> Option<&Terminal> {
        match self {
            Rule::Consumption { f_parameter, .. } => Some(f_parameter),
            _ => None,
        }
    }

    pub fn is_duplication(&self) -> bool {
        matches!(self, Rule::Duplication { .. })
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Rule::Production { .. })
    }

    pub fn is_consumption(&self) -> bool {
        matches!(self, Rule::Consumption { .. })
    }

    pub fn is_end_rule(&self) -> bool {
        matches!(self, Rule::End { .. })
    }

    pub fn non_terminals(&self) -> Vec<&Variable> {
        match self {
            Rule::Duplication { left, right0, right1 } => vec![left, right0, right1],
            Rule::Production { left, right, .. } | Rule::Consumption { left, right, .. } => {
                vec![left, right]
            }
            Rule::End { left, .. } => vec![left],
        }
    }

    /// Terminals of the rule, indices included. The empty word is not a terminal.
    pub fn terminals(&self) -> Vec<&Terminal> {
        match self {
            Rule::Duplication { .. } => vec![],
            Rule::Production { production, .. } => vec![production],
            Rule::Consumption { f_parameter, .. } => vec![f_parameter],
            Rule::End { right, .. } if right.is_epsilon() => vec![],
            Rule::End { right, .. } => vec![right],
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Duplication { left, right0, right1 } => write!(f, "{left} -> {right0} {right1}"),
            Rule::Production {
                left,
                right,
                production,
            } => write!(f, "{left} -> {right} [ {production} ]"),
            Rule::Consumption {
                f_parameter,
                left,
                right,
            } => write!(f, "{left} [ {f_parameter} ] -> {right}"),
            Rule::End { left, right } => write!(f, "{left} -> {right}"),
        }
    }
}

/// The rules of an indexed grammar. Consumption rules are kept apart, grouped by the index
/// they consume; every other rule is kept in the order chosen by the rule ordering.
#[derive(Debug, Clone)]
pub struct Rules {
    rules: Vec<Rule>,
    consumption_rules: FxHashMap<Terminal, Vec<Rule>>,
    consumed_order: Vec<Terminal>,
    ordering: RuleOrdering,
}

impl Rules {
    /// Creates the rules with the default ordering
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Rules::with_ordering(rules, RuleOrdering::default())
    }

    pub fn with_ordering(rules: impl IntoIterator<Item = Rule>, ordering: RuleOrdering) -> Self {
        let mut non_consumption = Vec::new();
        let mut seen = FxHashSet::default();
        let mut consumption_rules: FxHashMap<Terminal, Vec<Rule>> = FxHashMap::default();
        let mut consumed_order = Vec::new();
        for rule in rules {
            if !seen.insert(rule.clone()) {
                continue;
            }
            match &rule {
                Rule::Consumption { f_parameter, .. } => {
                    if !consumption_rules.contains_key(f_parameter) {
                        consumed_order.push(f_parameter.clone());
                    }
                    consumption_rules.entry(f_parameter.clone()).or_default().push(rule);
                }
                _ => non_consumption.push(rule),
            }
        }
        let rules = ordering.order(non_consumption, &consumption_rules);
        Rules {
            rules,
            consumption_rules,
            consumed_order,
            ordering,
        }
    }

    pub fn get_ordering(&self) -> RuleOrdering {
        self.ordering
    }

    /// The non consumption rules
    pub fn get_rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The consumption rules consuming `f_parameter`
    pub fn get_consumption_rules(&self, f_parameter: &Terminal) -> &[Rule] {
        self.consumption_rules
            .get(f_parameter)
            .map_or(&[], |rules| rules.as_slice())
    }

    /// Every consumption rule, grouped by consumed index in first-seen order
    pub fn consumption_rules(&self) -> impl Iterator<Item = &Rule> {
        self.consumed_order
            .iter()
            .filter_map(|f| self.consumption_rules.get(f))
            .flatten()
    }

    /// Every rule, the non consumption ones first
    pub fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().chain(self.consumption_rules())
    }

    /// `(number of non consumption rules, number of consumed indices)`
    pub fn length(&self) -> (usize, usize) {
        (self.rules.len(), self.consumption_rules.len())
    }

    pub fn non_terminals(&self) -> FxHashSet<Variable> {
        self.all_rules()
            .flat_map(|rule| rule.non_terminals())
            .cloned()
            .collect()
    }

    pub fn terminals(&self) -> FxHashSet<Terminal> {
        self.all_rules()
            .flat_map(|rule| rule.terminals())
            .cloned()
            .collect()
    }

    /// Adds `left[σ] -> right[prod σ]`
    pub fn add_production(&mut self, left: &str, right: &str, prod: &str) {
        let rule = Rule::production(left, right, prod);
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
    }

    /// Removes `left[σ] -> right[prod σ]`
    pub fn remove_production(&mut self, left: &str, right: &str, prod: &str) {
        let rule = Rule::production(left, right, prod);
        self.rules.retain(|r| *r != rule);
    }
}
