//! Black-box scenarios against the public `Interpreter` surface: load a
//! program, run it to fixpoint, and check the printed normal form (or,
//! where the scenario is about metadata rather than a value, the relevant
//! name/operator state). Each test builds its own fresh `Interpreter` and
//! declares exactly the operators it needs — there is no shared "standard
//! library" program across tests, matching how a real Bertrand program is
//! self-contained.

use std::rc::Rc;

use bertrand::common::source::Source;
use bertrand::config::Config;
use bertrand::namespace::NameSpace;
use bertrand::operator::Category;
use bertrand::Interpreter;

fn run(program: &str) -> (Interpreter, String) {
    let mut interp = Interpreter::new(Config::default());
    interp.load_source(Rc::new(Source::source(program))).expect("load");
    let result = interp.run().expect("run");
    let printed = interp.print(&result);
    (interp, printed)
}

#[test]
fn arithmetic_normalization() {
    let program = r#"
#op + binary left 45
#op * binary left 50
n'constant + m'constant { add }
n'constant * m'constant { mul }
main { 2 + 3 * 4 }
"#;
    let (_, printed) = run(program);
    assert_eq!(printed, "14");
}

#[test]
fn operator_precedence_left_to_right_and_with_grouping() {
    let declarations = r#"
#op + binary left 45
#op * binary left 50
#op ( ) #1
n'constant + m'constant { add }
n'constant * m'constant { mul }
"#;

    let (_, left_first) = run(&format!("{declarations}\nmain {{ 2 + 3 * 4 }}\n"));
    assert_eq!(left_first, "14", "3 * 4 should bind tighter than 2 +");

    let (_, grouped) = run(&format!("{declarations}\nmain {{ (2 + 3) * 4 }}\n"));
    assert_eq!(grouped, "20", "parenthesized 2 + 3 must evaluate before the outer *");
}

#[test]
fn unary_minus_overloads_binary_minus_by_lookahead() {
    let program = r#"
#op - binary left 45
#op - unary prefix 60 #3
n'constant - m'constant { sub }
main { 3 - -4 }
"#;
    let (_, printed) = run(program);
    assert_eq!(printed, "7", "3 - (-4) should evaluate to 7");
}

#[test]
fn label_tag_sets_the_labeled_names_type() {
    // `main`'s own rule carries no head parameters, so firing it only
    // exercises the built-in label on the initial subject: `run()` hands
    // the walker a `main` term whose label is the global name space
    // itself, so firing `main { ... } 'positive` retypes the global space
    // directly (`interpreter::Interpreter::run`'s doc comment).
    let (interp, _) = run("main { 1 + 1 } 'positive\n");
    let positive = interp.operators().find(Category::Type, "'positive").unwrap();
    assert_eq!(interp.global_name_space().borrow().ty, positive);
}

#[test]
fn label_tag_sets_a_nested_name_introduced_in_a_rule_body() {
    // Here the label lives on a subterm introduced by `main`'s own body
    // (`r:(2 + 3)`), and a *different* rule (the `+` rule, tagged
    // `'positive`) is the one that actually fires on it and sets `r`'s
    // type. `r` is a fresh name under the global space once `main`'s
    // local space is merged into it, so it is reachable afterward via
    // `NameSpace::find_child`.
    let program = r#"
#op + binary left 45
#op : binary left 5 #2
#op ( ) #1
n'constant + m'constant { add } 'positive
main { r:(2 + 3) }
"#;
    let (interp, _) = run(program);
    let positive = interp.operators().find(Category::Type, "'positive").unwrap();
    let r = NameSpace::find_child(interp.global_name_space(), "r").expect("r should be a global child");
    assert_eq!(r.borrow().ty, positive);
}

#[test]
fn bind_substitutes_every_occurrence_of_the_bound_name() {
    // `bind` only ever runs against the real redex (spec.md's "the
    // dispatcher is always handed the redex node"), so the left side of
    // `<-` must be a genuine unbound name reachable from the subject, not
    // a rule-head parameter copy — hence the global `.n` rather than a
    // bare local identifier.
    let program = r#"
#op + binary left 45
#op <- binary left 10
#op ( ) #1
#type 'number
n'number + m'number { add }
x <- v { bind }
main { (.n <- 5) + .n }
"#;
    let (_, printed) = run(program);
    assert_eq!(
        printed, "true + 5",
        "binding .n should replace every occurrence of .n, not just the one under the fired redex"
    );
}

#[test]
fn specificity_prefers_the_typed_rule_on_a_matching_input() {
    let declarations = r#"
#op f unary prefix 80
#op - unary prefix 60 #3
f n'positive { pos_case }
f n { neg_case }
"#;

    let (_, positive_case) = run(&format!("{declarations}\nmain {{ f 5 }}\n"));
    assert_eq!(positive_case, "pos_case", "a positive argument should hit the typed rule");

    let (_, negative_case) = run(&format!("{declarations}\nmain {{ f -5 }}\n"));
    assert_eq!(negative_case, "neg_case", "a negative argument is not 'positive, only the untyped rule applies");
}
