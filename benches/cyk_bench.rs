use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use formlang::cfg::cfg::CFG;
use formlang::cfg::terminal::Terminal;
use formlang::cfg::variable::Variable;

const EXPRESSION_GRAMMAR: &str = r#"
S -> Statement | Statement S
Statement -> identifier = Expr ; | if ( Expr ) Block | if ( Expr ) Block else Block | return Expr ;
Block -> { } | { S }
Expr -> Term | Expr + Term | Expr - Term
Term -> Factor | Term * Factor | Term / Factor
Factor -> identifier | number | ( Expr ) | - Factor | identifier ( Args ) | identifier ( )
Args -> Expr | Args , Expr
"#;

fn tokens(input: &str) -> Vec<Terminal> {
    input.split_whitespace().map(Terminal::new).collect()
}

fn load_grammar() -> CFG {
    match CFG::from_text(EXPRESSION_GRAMMAR, Variable::new("S")) {
        Ok(grammar) => grammar,
        Err(error) => panic!("benchmark grammar does not parse: {error}"),
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    let grammar = load_grammar();
    let short = tokens("identifier = number + number ;");
    let long = tokens(
        "if ( identifier ) { identifier = identifier ( number , - number ) * ( number + identifier ) ; } \
         else { return identifier / number ; } identifier = number ;",
    );
    let rejected = tokens("identifier = ( number + ;");

    c.bench_function("normal form", |b| {
        b.iter_batched(load_grammar, |fresh| fresh.to_normal_form(), BatchSize::SmallInput)
    });

    // the normal form is cached on the grammar after the first call
    let _ = grammar.to_normal_form();
    c.bench_function("cyk short statement", |b| {
        b.iter(|| grammar.contains(black_box(&short)))
    });
    c.bench_function("cyk nested program", |b| {
        b.iter(|| grammar.contains(black_box(&long)))
    });
    c.bench_function("cyk rejected statement", |b| {
        b.iter(|| grammar.contains(black_box(&rejected)))
    });
    c.bench_function("cyk parse tree", |b| {
        b.iter(|| grammar.get_cnf_parse_tree(black_box(&long)).is_ok())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
