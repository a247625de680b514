use rustc_hash::FxHashMap;

use formlang::cfg::cfg::CFG;
use formlang::cfg::production::{Production, Symbol};
use formlang::cfg::terminal::Terminal;
use formlang::cfg::variable::Variable;
use formlang::error::FormlangError;
use formlang::input_symbol::word_from_str;
use formlang::language::Language;

fn parse(text: &str) -> CFG {
    CFG::from_text(text, Variable::new("S")).unwrap()
}

/// Every word over `alphabet` of length at most `max_length`
fn all_words(alphabet: &[&str], max_length: usize) -> Vec<Vec<Terminal>> {
    let mut words = vec![vec![]];
    let mut frontier: Vec<Vec<Terminal>> = vec![vec![]];
    for _ in 0..max_length {
        let mut next = Vec::new();
        for word in &frontier {
            for symbol in alphabet {
                let mut longer = word.clone();
                longer.push(Terminal::new(symbol));
                next.push(longer);
            }
        }
        words.extend(next.iter().cloned());
        frontier = next;
    }
    words
}

#[test]
fn test_from_text() {
    let text = r#"
        S -> A | B
        A -> Bobo r
        B -> a
        "#;

    let cfg = parse(text);
    assert_eq!(cfg.get_variables().len(), 4);
    assert_eq!(cfg.get_productions().len(), 4);
    assert_eq!(cfg.get_terminals().len(), 2);
}

#[test]
fn test_from_text2() {
    let text = r#"
        S -> A B
        A -> a
        B -> b
        "#;

    let cfg = parse(text);
    assert!(cfg.contains(&[Terminal::new("a"), Terminal::new("b")]));
    assert_eq!(cfg.get_variables().len(), 3);
    assert_eq!(cfg.get_terminals().len(), 2);
    assert_eq!(cfg.get_productions().len(), 3);
    assert!(!cfg.generate_epsilon());
}

#[test]
fn test_from_text_escapes() {
    let text = r#"
        "VAR:S" -> "TER:A" | b | "VAR:lower"
        "VAR:lower" -> c
        "#;

    let cfg = parse(text);
    assert_eq!(cfg.get_productions().len(), 4);
    assert!(cfg.get_terminals().contains(&Terminal::new("A")));
    assert!(cfg.get_variables().contains(&Variable::new("lower")));
    assert!(cfg.accepts_string("A"));
    assert!(cfg.accepts_string("c"));
    assert!(!cfg.generate_epsilon());
}

#[test]
fn test_from_text_errors() {
    let missing_arrow = CFG::from_text("S a b", Variable::new("S"));
    assert!(matches!(missing_arrow, Err(FormlangError::MalformedRule { .. })));

    let unclosed = CFG::from_text("S -> \"VAR:A b", Variable::new("S"));
    assert!(matches!(unclosed, Err(FormlangError::MalformedSymbol { .. })));
}

#[test]
fn test_to_text_round_trip() {
    let text = r#"
        S -> a S b | epsilon
        S -> "VAR:x"
        "VAR:x" -> "TER:Q"
        "#;

    let cfg = parse(text);
    let again = CFG::from_text(&cfg.to_text(), Variable::new("S")).unwrap();
    assert_eq!(cfg, again);
    assert!(cfg.to_text().contains("\"VAR:x\" -> \"TER:Q\""));
}

#[test]
fn test_epsilon() {
    let cfg = parse("S -> epsilon");
    assert!(!cfg.is_empty());
    assert_eq!(cfg.get_terminals().len(), 0);
    assert!(cfg.generate_epsilon());
    assert!(cfg.contains(&[]));
}

#[test]
fn test_epsilon2() {
    let text = r#"
        S -> A B | a
        A -> $
        B -> b
        "#;

    let cfg = parse(text);
    assert!(!cfg.is_empty());
    assert!(!cfg.generate_epsilon());
    assert!(cfg.get_nullable_symbols().contains(&Symbol::V(Variable::new("A"))));
    assert!(!cfg.get_nullable_symbols().contains(&Symbol::V(Variable::new("S"))));
}

#[test]
fn test_epsilon3() {
    let text = r#"
        S -> B | a A | a
        A -> ε
        B -> b | A
        "#;

    let cfg = parse(text);
    assert!(!cfg.is_empty());
    assert!(cfg.generate_epsilon());
}

#[test]
fn test_generating_and_reachable() {
    let text = r#"
        S -> A B | a
        A -> A c
        B -> b
        Z -> u
        "#;

    let cfg = parse(text);
    let generating = cfg.get_generating_symbols();
    assert!(generating.contains(&Symbol::V(Variable::new("S"))));
    assert!(generating.contains(&Symbol::V(Variable::new("B"))));
    assert!(!generating.contains(&Symbol::V(Variable::new("A"))));
    assert!(generating.contains(&Symbol::T(Terminal::new("c"))));

    let reachable = cfg.get_reachable_symbols();
    assert!(reachable.contains(&Symbol::V(Variable::new("A"))));
    assert!(!reachable.contains(&Symbol::V(Variable::new("Z"))));
    assert!(!reachable.contains(&Symbol::T(Terminal::new("u"))));
}

#[test]
fn test_remove_useless_symbols() {
    let text = r#"
        S -> A B | a | C A | A B A S
        A -> $
        B -> b
        A -> E
        Z -> u
        "#;

    let cfg = parse(text);
    assert!(!cfg.is_empty());
    let cleaned = cfg.remove_useless_symbols();
    assert!(!cleaned.is_empty());
    assert!(!cleaned.get_terminals().contains(&Terminal::new("u")));
    assert!(!cleaned.get_variables().contains(&Variable::new("Z")));
    assert!(!cleaned.get_variables().contains(&Variable::new("C")));
    assert!(!cleaned.get_variables().contains(&Variable::new("E")));
    assert_eq!(cleaned.get_productions().len(), 5);
}

#[test]
fn test_empty_grammar() {
    let text = r#"
        S -> A B | A B A S
        A -> $
        A -> c
        "#;

    let cfg = parse(text);
    assert!(cfg.is_empty());
    let cleaned = cfg.remove_useless_symbols();
    assert!(cleaned.is_empty());
    assert!(cleaned.get_productions().is_empty());
    assert!(cfg.to_normal_form().get_productions().is_empty());
    assert!(!cfg.accepts_string("c"));
    assert!(CFG::empty().is_empty());
    assert!(!CFG::empty().contains(&[]));
}

#[test]
fn test_removal_passes_keep_the_language() {
    let text = r#"
        S -> A B | C | A B A S | D
        A -> a | $
        B -> b | B
        C -> c | A
        D -> D d
        "#;

    let cfg = parse(text);
    let useless = cfg.remove_useless_symbols();
    let epsilon = cfg.remove_epsilon();
    let unit = cfg.eliminate_unit_productions();
    for word in all_words(&["a", "b", "c", "d"], 4) {
        assert_eq!(cfg.contains(&word), useless.contains(&word), "{word:?}");
        assert_eq!(cfg.contains(&word), unit.contains(&word), "{word:?}");
        if word.is_empty() {
            assert!(cfg.contains(&word));
            assert!(!epsilon.contains(&word));
        } else {
            assert_eq!(cfg.contains(&word), epsilon.contains(&word), "{word:?}");
        }
    }
    assert!(epsilon.get_productions().iter().all(|p| !p.body.is_empty()));
    assert!(unit
        .get_productions()
        .iter()
        .all(|p| !matches!(p.body.as_slice(), [Symbol::V(_)])));
}

#[test]
fn test_unit_pairs() {
    let text = r#"
        S -> A | a
        A -> B
        B -> b
        "#;

    let pairs = parse(text).get_unit_pairs();
    let pair = |a: &str, b: &str| (Variable::new(a), Variable::new(b));
    assert!(pairs.contains(&pair("S", "S")));
    assert!(pairs.contains(&pair("S", "A")));
    assert!(pairs.contains(&pair("S", "B")));
    assert!(pairs.contains(&pair("A", "B")));
    assert!(!pairs.contains(&pair("B", "A")));
    assert_eq!(pairs.len(), 6);
}

#[test]
fn test_to_normal_form_shape() {
    for text in [
        "S -> A B | a\nA -> a\nB -> b",
        "S -> A B | epsilon | A B A S\nA -> a\nB -> b\nB -> $",
        "S -> A B | C\nA -> a\nB -> b\nC -> D\nD -> E",
        "S -> A B C | D E\nA -> a\nB -> b\nC -> c\nD -> d\nE -> e",
        "S -> a S b | a b c d e | S S",
    ] {
        let cnf = parse(text).to_normal_form();
        assert!(cnf.is_normal_form(), "{text}");
        for production in cnf.get_productions() {
            match production.body.as_slice() {
                [Symbol::T(_)] | [Symbol::V(_), Symbol::V(_)] => {}
                body => panic!("{production} has body {body:?}"),
            }
        }
    }
}

#[test]
fn test_to_normal_form_removes_useless_chains() {
    let text = r#"
        S -> A B | C
        A -> a
        B -> b
        C -> D
        D -> E
        "#;

    let cnf = parse(text).to_normal_form();
    assert_eq!(cnf.get_productions().len(), 3);
    assert_eq!(cnf.get_variables().len(), 3);
}

#[test]
fn test_to_normal_form_reuses_chains() {
    let text = r#"
        S -> a B C D | b B C D
        B -> b
        C -> c
        D -> d
        "#;

    let cnf = parse(text).to_normal_form();
    // both long bodies end with `B C D`, which is decomposed once
    let chains = cnf
        .get_variables()
        .iter()
        .filter(|v| v.get_name().starts_with("C#CNF#"))
        .count();
    assert_eq!(chains, 2);
    assert!(cnf.accepts_string("abcd"));
    assert!(cnf.accepts_string("bbcd"));
    assert!(!cnf.accepts_string("cbcd"));
}

#[test]
fn test_to_normal_form_idempotent() {
    let text = r#"
        S -> A B | epsilon | A B A S | C
        A -> a
        B -> b | $
        C -> c C | c
        "#;

    let cnf = parse(text).to_normal_form();
    let twice = cnf.to_normal_form();
    assert_eq!(cnf, twice);
    for word in all_words(&["a", "b", "c"], 5) {
        assert_eq!(cnf.contains(&word), twice.contains(&word), "{word:?}");
    }
}

#[test]
fn test_normal_form_drops_the_empty_word() {
    let cfg = parse("S -> a S b | $");
    assert!(cfg.contains(&[]));
    let cnf = cfg.to_normal_form();
    assert!(!cnf.contains(&[]));
    assert!(cnf.accepts_string("aabb"));
}

#[test]
fn test_accept() {
    let text = r#"
        S -> A B | C | A B A S
        A -> a
        B -> b
        B -> $
        C -> c
        "#;

    let cfg = parse(text).to_normal_form();
    assert!(!cfg.is_empty());
    for word in ["ab", "c", "aac", "abaab", "aaab", "abac"] {
        assert!(cfg.accepts_string(word), "should accept '{word}'");
    }
    for word in ["e", "abc", "abaca", "bb", "aa", "aab"] {
        assert!(!cfg.accepts_string(word), "should reject '{word}'");
    }
}

#[test]
fn test_substitution() {
    let cfg = parse("S -> A B | C\nA -> a\nB -> b\nC -> c");
    let cfg2 = parse("S -> c S c | e");

    let substitution: FxHashMap<Terminal, &CFG> = [(Terminal::new("a"), &cfg2)].into_iter().collect();
    let substituted = cfg.substitute(&substitution);
    assert!(!substituted.is_empty());
    assert!(substituted.accepts_string("cecb"));
    assert!(substituted.accepts_string("eb"));
    assert!(substituted.accepts_string("c"));
    assert!(!substituted.accepts_string("a"));
    assert!(!substituted.accepts_string("ab"));
    assert!(!substituted.accepts_string("cb"));
    assert!(substituted
        .get_variables()
        .iter()
        .all(|v| v.get_name().contains("#SUBS#")));
}

#[test]
fn test_substitution_with_empty_grammar() {
    let cfg = parse("S -> a b | c");
    let empty = CFG::empty();
    let substitution: FxHashMap<Terminal, &CFG> = [(Terminal::new("a"), &empty)].into_iter().collect();
    let substituted = cfg.substitute(&substitution);
    assert!(substituted.accepts_string("c"));
    assert!(!substituted.accepts_string("b"));
    assert!(!substituted.accepts_string("ab"));
}

#[test]
fn test_concatenate() {
    let cfg = parse("S -> A B | C\nA -> a\nB -> b\nC -> c");
    let cfg2 = parse("S -> c S c | e");

    let concatenated = cfg.concatenate(&cfg2);
    assert!(!concatenated.is_empty());
    assert!(concatenated.accepts_string("abcec"));
    assert!(concatenated.accepts_string("ce"));
    assert!(!concatenated.accepts_string("a"));
    assert!(!concatenated.accepts_string("ab"));
}

#[test]
fn test_union() {
    let cfg = parse("S -> a S b | a b");
    let cfg2 = parse("S -> c | c S");

    let union = cfg.union(&cfg2);
    assert!(union.accepts_string("aabb"));
    assert!(union.accepts_string("ccc"));
    assert!(!union.accepts_string("abc"));
    assert!(!union.contains(&[]));
}

#[test]
fn test_closures() {
    let cfg = parse("S -> a b");

    let closure = cfg.get_closure();
    assert!(closure.contains(&[]));
    assert!(closure.accepts_string("ab"));
    assert!(closure.accepts_string("ababab"));
    assert!(!closure.accepts_string("aba"));

    let positive = cfg.get_positive_closure();
    assert!(!positive.contains(&[]));
    assert!(positive.accepts_string("ab"));
    assert!(positive.accepts_string("abab"));
    assert!(!positive.accepts_string("ba"));
}

#[test]
fn test_reverse() {
    let reversed = parse("S -> a S b | c").reverse();
    assert!(reversed.accepts_string("bca"));
    assert!(reversed.accepts_string("bbcaa"));
    assert!(!reversed.accepts_string("acb"));
}

#[test]
fn test_get_words() {
    let cfg = parse("S -> a S b | $");

    let words: Vec<Vec<Terminal>> = cfg.get_words(Some(6)).collect();
    assert_eq!(
        words,
        vec![
            vec![],
            word_from_str("ab"),
            word_from_str("aabb"),
            word_from_str("aaabbb"),
        ]
    );

    let first_five: Vec<Vec<Terminal>> = cfg.get_words(None).take(5).collect();
    assert_eq!(first_five.len(), 5);
    assert!(first_five.windows(2).all(|w| w[0].len() <= w[1].len()));
}

#[test]
fn test_get_words_finite_language_stops() {
    let cfg = parse("S -> A B | c\nA -> a\nB -> b | b b");
    let mut words: Vec<String> = cfg
        .get_words(None)
        .map(|w| w.iter().map(|t| t.get_name()).collect())
        .collect();
    words.sort();
    assert_eq!(words, vec!["ab", "abb", "c"]);
}

#[test]
fn test_is_finite() {
    assert!(!parse("S -> a S b | $").is_finite());
    assert!(parse("S -> A B | c\nA -> a\nB -> b | b b").is_finite());
    assert!(!parse("S -> A B\nA -> a A | a\nB -> b").is_finite());
    assert!(parse("S -> A\nA -> a\nB -> B B | b").is_finite());
}

#[test]
fn test_productions_are_deduplicated() {
    let s = Variable::new("S");
    let production = Production::new(s.clone(), vec![Symbol::T(Terminal::new("a"))]);
    let cfg = CFG::from_start_and_productions(s, vec![production.clone(), production]);
    assert_eq!(cfg.get_productions().len(), 1);
}

#[test]
fn test_production_filters_epsilon() {
    let production = Production::new(
        Variable::new("S"),
        vec![
            Symbol::V(Variable::new("A")),
            Symbol::T(Terminal::new("ε")),
            Symbol::V(Variable::new("B")),
        ],
    );
    assert_eq!(production.body.len(), 2);

    let raw = Production::new_raw(Variable::new("S"), vec![Symbol::T(Terminal::new("ε"))]);
    assert_eq!(raw.body.len(), 1);
}
