use formlang::cfg::cfg::CFG;
use formlang::cfg::variable::Variable;
use formlang::fa::dfa::DFA;
use formlang::fa::epsilon_nfa::ENFA;
use formlang::fa::state::State;
use formlang::input_symbol::{epsilon, InputSymbol};
use formlang::language::Language;

fn build_dfa(start: &str, accepting: &[&str], transitions: &[(&str, &str, &str)]) -> DFA {
    let mut dfa = DFA::new();
    dfa.set_start_state(State::new(start));
    for state in accepting {
        dfa.add_accept_state(State::new(state));
    }
    for (from, symbol, to) in transitions {
        dfa.add_transition(&State::new(from), &InputSymbol::new(symbol), &State::new(to));
    }
    dfa
}

fn palindromes() -> CFG {
    CFG::from_text("S -> a S a | b", Variable::new("S")).unwrap()
}

/// a*ba*
fn one_b() -> DFA {
    build_dfa(
        "0",
        &["1"],
        &[("0", "a", "0"), ("0", "b", "1"), ("1", "a", "1")],
    )
}

fn even_length() -> DFA {
    build_dfa(
        "even",
        &["even"],
        &[
            ("even", "a", "odd"),
            ("even", "b", "odd"),
            ("odd", "a", "even"),
            ("odd", "b", "even"),
        ],
    )
}

#[test]
fn test_intersection_with_dfa() {
    let intersection = palindromes().intersection_with_dfa(&one_b());
    assert_eq!(intersection.get_start_symbol(), Some(&Variable::new("Start")));
    assert!(!intersection.is_empty());
    for word in ["b", "aba", "aabaa"] {
        assert!(intersection.accepts_string(word), "should accept '{word}'");
    }
    for word in ["", "aa", "ab", "abaa", "bab"] {
        assert!(!intersection.accepts_string(word), "should reject '{word}'");
    }
}

#[test]
fn test_intersection_can_be_empty() {
    let intersection = palindromes().intersection_with_dfa(&even_length());
    assert!(intersection.is_empty());
    assert!(!intersection.accepts_string("aba"));
}

#[test]
fn test_intersection_with_restricting_dfa() {
    // only the words with at most three symbols survive
    let short = build_dfa(
        "0",
        &["1", "3"],
        &[
            ("0", "a", "1"),
            ("0", "b", "1"),
            ("1", "a", "2"),
            ("1", "b", "2"),
            ("2", "a", "3"),
            ("2", "b", "3"),
        ],
    );
    let intersection = palindromes().intersection_with_dfa(&short);
    assert!(intersection.is_finite());
    let mut words: Vec<String> = intersection
        .get_words(None)
        .map(|w| w.iter().map(|t| t.get_name()).collect())
        .collect();
    words.sort();
    assert_eq!(words, vec!["aba", "b"]);
}

#[test]
fn test_intersection_keeps_the_empty_word() {
    let balanced = CFG::from_text("S -> a S b | $", Variable::new("S")).unwrap();
    // (ab)*
    let alternating = build_dfa("0", &["0"], &[("0", "a", "1"), ("1", "b", "0")]);
    let intersection = balanced.intersection_with_dfa(&alternating);
    assert!(intersection.contains(&[]));
    assert!(intersection.accepts_string("ab"));
    assert!(!intersection.accepts_string("abab"));
    assert!(!intersection.accepts_string("aabb"));

    let no_empty = build_dfa("0", &["1"], &[("0", "a", "1"), ("1", "b", "1")]);
    assert!(!balanced.intersection_with_dfa(&no_empty).contains(&[]));
}

#[test]
fn test_intersection_with_empty_operands() {
    assert!(palindromes().intersection_with_dfa(&DFA::new()).is_empty());
    assert!(CFG::empty().intersection_with_dfa(&one_b()).is_empty());
}

#[test]
fn test_intersection_with_nondeterministic_automaton() {
    // a*b a*, with an epsilon move before the b
    let mut enfa = ENFA::new();
    enfa.set_start_state(State::new("p"));
    enfa.add_accept_state(State::new("r"));
    enfa.add_transition(&State::new("p"), &InputSymbol::new("a"), &State::new("p"));
    enfa.add_transition(&State::new("p"), &epsilon(), &State::new("q"));
    enfa.add_transition(&State::new("q"), &InputSymbol::new("b"), &State::new("r"));
    enfa.add_transition(&State::new("r"), &InputSymbol::new("a"), &State::new("r"));

    let intersection = palindromes().intersection(&enfa);
    assert!(intersection.accepts_string("aabaa"));
    assert!(!intersection.accepts_string("aab"));
}
