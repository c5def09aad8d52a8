use arith_interpreter::{Environment, ErrorKind, Interpreter, process};
use pretty_assertions::assert_eq;

fn run(program: &str) -> Environment {
    process(program).unwrap_or_else(|e| panic!("program {program:?} failed: {e:?}"))
}

#[test]
fn sums_a_single_assignment() {
    assert_eq!(run("x = 2 + 3 ;").to_pairs(), [("x", 5)]);
}

#[test]
fn multiplication_before_addition() {
    assert_eq!(run("x = 2 + 3 * 4 ;").to_pairs(), [("x", 14)]);
}

#[test]
fn parentheses_group_first() {
    assert_eq!(run("x = ( 2 + 3 ) * 4 ;").to_pairs(), [("x", 20)]);
}

#[test]
fn variables_carry_across_statements() {
    assert_eq!(
        run("x = 4 ; y = x * 2 ;").to_pairs(),
        [("x", 4), ("y", 8)]
    );
}

#[test]
fn division_rounds_toward_negative_infinity() {
    assert_eq!(
        run("n = ( 0 - 7 ) / 2 ; p = 7 / 2 ;").to_pairs(),
        [("n", -4), ("p", 3)]
    );
}

#[test]
fn demo_program() {
    let program = include_str!("../demos/sample.calc");
    let environment = Interpreter::new(Some("sample.calc"), program)
        .run()
        .expect("demo runs");
    assert_eq!(
        environment.to_string(),
        "x_2 = 6\ny = 16\nm = 160\nk = 7\nd = -1494\n"
    );
}

#[test]
fn reruns_are_identical() {
    let program = "a = 9 ; b = a - 10 ; c = b * b * a ;";
    assert_eq!(process(program).unwrap(), process(program).unwrap());
}

#[test]
fn failures_carry_their_kind() {
    let cases = [
        ("x = 1", ErrorKind::Format),
        ("x : 1 ;", ErrorKind::Assignment),
        ("x = y + 1 ;", ErrorKind::UndefinedVariable),
        ("x = 5 / 0 ;", ErrorKind::DivisionByZero),
        ("x = 2 + # ;", ErrorKind::Lex),
        ("x = 2 + 3 ) ;", ErrorKind::Syntax),
        ("x = - 5 ;", ErrorKind::Syntax),
        ("x = 9223372036854775807 * 2 ;", ErrorKind::Overflow),
    ];
    for (program, kind) in cases {
        let err = process(program).expect_err(program);
        assert_eq!(err.kind(), kind, "{program}");
    }
}

#[test]
fn diagnostics_point_at_the_problem() {
    let err = process("x = 1 ; y = x / 0 ;").unwrap_err();
    let labels: Vec<_> = miette::Diagnostic::labels(&err)
        .expect("division errors are labelled")
        .map(|label| (label.offset(), label.len()))
        .collect();
    assert_eq!(labels, [(14, 1)]);
}

#[test]
fn long_programs_finish() {
    let program = format!("x = 1{} ; y = x * 2 ;", " + 1".repeat(100_000));
    assert_eq!(run(&program).to_pairs(), [("x", 100_001), ("y", 200_002)]);
}

#[test]
fn deep_parentheses_are_rejected_not_fatal() {
    let program = format!("x = {}1{} ;", "( ".repeat(100_000), " )".repeat(100_000));
    assert_eq!(process(&program).unwrap_err().kind(), ErrorKind::Syntax);
}
