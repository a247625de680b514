use formlang::cfg::cfg::CFG;
use formlang::cfg::variable::Variable;
use formlang::fa::dfa::DFA;
use formlang::fa::state::State;
use formlang::input_symbol::{epsilon, word_from_str, InputSymbol};
use formlang::language::Language;
use formlang::pda::pda::PDA;
use formlang::pda::transition_function::StackSymbol;

const MAX_STACK: usize = 12;

fn stack(names: &[&str]) -> Vec<StackSymbol> {
    names.iter().map(|n| StackSymbol::new(n)).collect()
}

fn balanced() -> CFG {
    CFG::from_text("S -> a S b | ε", Variable::new("S")).unwrap()
}

/// a^n b^n with n >= 1, accepted by final state
fn counting_pda() -> PDA {
    let mut pda = PDA::new();
    let (q0, q1, q2) = (State::new("q0"), State::new("q1"), State::new("q2"));
    let (a, b) = (InputSymbol::new("a"), InputSymbol::new("b"));
    let (z, x) = (StackSymbol::new("Z"), StackSymbol::new("A"));
    pda.set_start_state(q0.clone());
    pda.set_start_stack_symbol(z.clone());
    pda.add_final_state(q2.clone());
    pda.add_transition(&q0, &a, &z, &q0, &[x.clone(), z.clone()]);
    pda.add_transition(&q0, &a, &x, &q0, &[x.clone(), x.clone()]);
    pda.add_transition(&q0, &b, &x, &q1, &[]);
    pda.add_transition(&q1, &b, &x, &q1, &[]);
    pda.add_transition(&q1, &epsilon(), &z, &q2, &[z.clone()]);
    pda
}

const WORDS: [&str; 10] = ["", "a", "b", "ab", "ba", "aab", "abb", "aabb", "abab", "aaabbb"];

#[test]
fn test_construction() {
    let pda = counting_pda();
    assert_eq!(pda.get_states().len(), 3);
    assert_eq!(pda.get_input_symbols().len(), 2);
    assert_eq!(pda.get_stack_alphabet().len(), 2);
    assert_eq!(pda.get_number_transitions(), 5);
    assert_eq!(pda.get_start_state(), Some(&State::new("q0")));
    assert_eq!(pda.get_start_stack_symbol(), Some(&StackSymbol::new("Z")));
    assert!(pda.get_final_states().contains(&State::new("q2")));
    assert!(!pda.get_input_symbols().contains(&epsilon()));
}

#[test]
fn test_epsilon_stack_symbols_are_dropped() {
    let mut pda = PDA::new();
    let q = State::new("q");
    pda.add_transition(&q, &InputSymbol::new("$"), &StackSymbol::new("Z"), &q, &stack(&["ε", "A", "epsilon"]));
    let ((_, input, _), (_, pushed)) = pda.transitions().next().unwrap();
    assert!(input.is_epsilon());
    assert_eq!(pushed, &stack(&["A"]));
    assert!(pda.get_input_symbols().is_empty());
    assert!(!pda.get_stack_alphabet().iter().any(StackSymbol::is_epsilon));
}

#[test]
fn test_duplicate_transitions_are_ignored() {
    let mut pda = counting_pda();
    pda.add_transition(
        &State::new("q0"),
        &InputSymbol::new("a"),
        &StackSymbol::new("Z"),
        &State::new("q0"),
        &stack(&["A", "Z"]),
    );
    assert_eq!(pda.get_number_transitions(), 5);
}

#[test]
fn test_remove_transition() {
    let mut pda = counting_pda();
    let (q0, q1) = (State::new("q0"), State::new("q1"));
    assert!(pda.remove_transition(
        &q0,
        &InputSymbol::new("b"),
        &StackSymbol::new("A"),
        &q1,
        &stack(&["ε"]),
    ));
    assert_eq!(pda.get_number_transitions(), 4);
    assert!(!pda.transitions().any(|((from, input, _), _)| from == &q0 && input.get_name() == "b"));
    assert!(!pda.accepts_by_final_state(&word_from_str("ab"), MAX_STACK));
    assert_eq!(pda.get_states().len(), 3, "states are kept");

    assert!(
        !pda.remove_transition(&q0, &InputSymbol::new("b"), &StackSymbol::new("A"), &q1, &[]),
        "already removed"
    );
    assert!(!pda.remove_transition(&q1, &InputSymbol::new("a"), &StackSymbol::new("Z"), &q1, &[]));
    assert_eq!(pda.get_number_transitions(), 4);
}

#[test]
fn test_accepts_by_final_state() {
    let pda = counting_pda();
    for word in ["ab", "aabb", "aaabbb"] {
        assert!(pda.accepts_by_final_state(&word_from_str(word), MAX_STACK), "should accept '{word}'");
    }
    for word in ["", "a", "b", "ba", "aab", "abb", "abab"] {
        assert!(!pda.accepts_by_final_state(&word_from_str(word), MAX_STACK), "should reject '{word}'");
    }
    assert!(
        !pda.accepts_by_final_state(&word_from_str("aaabbb"), 2),
        "the stack bound cuts the run"
    );
}

#[test]
fn test_to_empty_stack() {
    let pda = counting_pda();
    let empty_stack = pda.to_empty_stack();
    assert!(empty_stack.get_states().contains(&State::new("#STARTEMPTYS#")));
    assert!(empty_stack.get_states().contains(&State::new("#ENDEMPTYS#")));
    assert_eq!(
        empty_stack.get_start_stack_symbol(),
        Some(&StackSymbol::new("#BOTTOMEMPTYS#"))
    );
    for word in WORDS {
        let word = word_from_str(word);
        assert_eq!(
            pda.accepts_by_final_state(&word, MAX_STACK),
            empty_stack.accepts_by_empty_stack(&word, MAX_STACK + 1),
            "{word:?}"
        );
    }
}

#[test]
fn test_to_final_state() {
    let pda = PDA::from_cfg(&balanced());
    let final_state = pda.to_final_state();
    assert!(final_state.get_states().contains(&State::new("#STARTTOFINAL#")));
    assert!(final_state.get_final_states().contains(&State::new("#ENDTOFINAL#")));
    for word in WORDS {
        let word = word_from_str(word);
        assert_eq!(
            pda.accepts_by_empty_stack(&word, MAX_STACK),
            final_state.accepts_by_final_state(&word, MAX_STACK + 1),
            "{word:?}"
        );
    }
}

#[test]
fn test_conversions_pick_fresh_names() {
    let mut pda = counting_pda();
    pda.add_transition(
        &State::new("q1"),
        &InputSymbol::new("b"),
        &StackSymbol::new("#BOTTOMEMPTYS#"),
        &State::new("#STARTEMPTYS#"),
        &[],
    );
    let empty_stack = pda.to_empty_stack();
    assert_eq!(empty_stack.get_start_state(), Some(&State::new("#STARTEMPTYS#0")));
    assert_eq!(
        empty_stack.get_start_stack_symbol(),
        Some(&StackSymbol::new("#BOTTOMEMPTYS#0"))
    );
}

#[test]
fn test_conversions_without_start() {
    let pda = PDA::new();
    assert_eq!(pda.to_final_state().get_number_transitions(), 0);
    assert_eq!(pda.to_empty_stack().get_number_transitions(), 0);
    assert!(pda.to_cfg().is_empty());
    assert!(!pda.accepts_by_empty_stack(&[], MAX_STACK));
}

#[test]
fn test_from_cfg() {
    let pda = PDA::from_cfg(&balanced());
    assert_eq!(pda.get_states().len(), 1);
    assert_eq!(pda.get_start_stack_symbol(), Some(&StackSymbol::new("S")));
    assert!(pda.get_stack_alphabet().contains(&StackSymbol::new("#TERM#a")));
    assert_eq!(pda.get_number_transitions(), 4);
    for word in ["", "ab", "aabb", "aaabbb"] {
        assert!(pda.accepts_by_empty_stack(&word_from_str(word), MAX_STACK), "should accept '{word}'");
    }
    for word in ["a", "ba", "abb", "abab"] {
        assert!(!pda.accepts_by_empty_stack(&word_from_str(word), MAX_STACK), "should reject '{word}'");
    }
}

#[test]
fn test_cfg_round_trip() {
    let cfg = balanced();
    let round_trip = PDA::from_cfg(&cfg).to_cfg();
    assert_eq!(round_trip.get_start_symbol(), Some(&Variable::new("#StartCFG#")));
    for word in WORDS {
        assert_eq!(cfg.accepts_string(word), round_trip.accepts_string(word), "word '{word}'");
    }
}

#[test]
fn test_to_cfg_of_final_state_automaton() {
    let pda = counting_pda();
    let cfg = pda.to_empty_stack().to_cfg();
    for word in WORDS {
        assert_eq!(
            pda.accepts_by_final_state(&word_from_str(word), MAX_STACK),
            cfg.accepts_string(word),
            "word '{word}'"
        );
    }
}

#[test]
fn test_intersection() {
    // words with at most two `a`
    let mut dfa = DFA::new();
    let (d0, d1, d2) = (State::new("0"), State::new("1"), State::new("2"));
    dfa.set_start_state(d0.clone());
    for state in [&d0, &d1, &d2] {
        dfa.add_accept_state(state.clone());
        dfa.add_transition(state, &InputSymbol::new("b"), state);
    }
    dfa.add_transition(&d0, &InputSymbol::new("a"), &d1);
    dfa.add_transition(&d1, &InputSymbol::new("a"), &d2);

    let intersection = counting_pda().intersection(&dfa);
    assert_eq!(intersection.get_start_state(), Some(&State::new("(q0, 0)")));
    assert!(intersection.get_final_states().contains(&State::new("(q2, 2)")));
    assert!(intersection.accepts_by_final_state(&word_from_str("ab"), MAX_STACK));
    assert!(intersection.accepts_by_final_state(&word_from_str("aabb"), MAX_STACK));
    assert!(!intersection.accepts_by_final_state(&word_from_str("aaabbb"), MAX_STACK));
    assert!(!intersection.accepts_by_final_state(&word_from_str("abb"), MAX_STACK));

    assert_eq!(counting_pda().intersection(&DFA::new()).get_number_transitions(), 0);
}

#[test]
fn test_display() {
    let printed = counting_pda().to_string();
    assert!(printed.contains("start: q0"));
    assert!(printed.contains("start stack: Z"));
    assert!(printed.contains("final: q2"));
    assert!(printed.contains("q0 --a, Z / A Z--> q0"));
}
