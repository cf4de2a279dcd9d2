//! End-to-end script evaluation through the public API

use plotscript::{vars, Engine, ErrorPolicy, EvalError, ScriptError, Value, VariableTable};
use plotscript_core::ParseErrorKind;
use pretty_assertions::assert_eq;

fn engine() -> Engine {
    Engine::with_standard_library()
}

fn outputs(engine: &Engine, source: &str, table: &mut VariableTable) -> Vec<Result<Value, ScriptError>> {
    engine.evaluate(source, table).unwrap().collect()
}

#[test]
fn test_statement_sequence() {
    let engine = engine();
    let mut table = VariableTable::new();
    assert_eq!(
        outputs(&engine, "x = 2\ny = x + 3\ny", &mut table),
        vec![Ok(Value::Unit), Ok(Value::Unit), Ok(Value::Integer(5))]
    );
}

#[test]
fn test_division_by_zero() {
    let engine = engine();
    for source in ["1 / 0", "1.0 / 0"] {
        let results = outputs(&engine, source, &mut VariableTable::new());
        match &results[..] {
            [Err(ScriptError::Eval { error, .. })] => assert_eq!(error, &EvalError::DivisionByZero),
            other => panic!("{}: unexpected {:?}", source, other),
        }
    }
}

#[test]
fn test_table_from_host() {
    let engine = engine();
    let mut table = vars! { x: 10i64 };
    assert_eq!(outputs(&engine, "x", &mut table), vec![Ok(Value::Integer(10))]);
}

#[test]
fn test_table_persists_across_runs() {
    let engine = engine();
    let mut table = VariableTable::new();
    outputs(&engine, "square(v) = v * v; offset = 1", &mut table);
    assert_eq!(
        outputs(&engine, "square(4) + offset", &mut table),
        vec![Ok(Value::Integer(17))]
    );
}

#[test]
fn test_failed_statement_leaves_table() {
    let engine = engine();
    let mut table = vars! { x: 1i64 };
    let results = outputs(&engine, "x = nope\nx", &mut table);
    assert!(results[0].is_err());
    assert_eq!(results[1], Ok(Value::Integer(1)));
}

#[test]
fn test_parse_error_ends_run() {
    let engine = engine();
    let mut table = VariableTable::new();
    let results = outputs(&engine, "a = 1\nb = (2 +\nc = 3", &mut table);
    assert_eq!(results.len(), 2);
    assert!(matches!(results[1], Err(ScriptError::Parse { statement: 2, .. })));
    assert!(table.contains("a"));
    assert!(!table.contains("c"));
}

#[test]
fn test_lazy_evaluation() {
    let engine = engine();
    let mut table = VariableTable::new();
    {
        let mut evaluation = engine.evaluate("a = 1\nb = 2\nc = 3", &mut table).unwrap();
        assert_eq!(evaluation.next(), Some(Ok(Value::Unit)));
        assert_eq!(evaluation.statements(), 1);
    }
    assert!(table.contains("a"));
    assert!(!table.contains("b"));
}

#[test]
fn test_halt_after_error() {
    let engine = engine();
    let mut table = VariableTable::new();
    let results: Vec<_> = engine
        .evaluate("1 / 0\ny = 1", &mut table)
        .unwrap()
        .with_policy(ErrorPolicy::Halt)
        .collect();
    assert_eq!(results.len(), 1);
    assert!(!table.contains("y"));
}

#[test]
fn test_lambdas_and_builtins() {
    let engine = engine();
    let mut table = VariableTable::new();
    let results = outputs(
        &engine,
        "twice = fn(f, v) => f(f(v))\ntwice(fn(n) => n + 1, 5)\nmax(1, 7, 3)\npi > 3",
        &mut table,
    );
    assert_eq!(
        results,
        vec![
            Ok(Value::Unit),
            Ok(Value::Integer(7)),
            Ok(Value::Integer(7)),
            Ok(Value::Integer(1)),
        ]
    );
}

#[test]
fn test_comments_and_separators() {
    let engine = engine();
    let results = outputs(
        &engine,
        "# setup\na = 2 // two\n/* block */ a ^ 3;\n",
        &mut VariableTable::new(),
    );
    assert_eq!(
        results,
        vec![Ok(Value::Unit), Ok(Value::Unit), Ok(Value::Integer(8)), Ok(Value::Unit)]
    );
}

#[test]
fn test_runaway_recursion_is_a_statement_error() {
    let engine = engine();
    let mut table = VariableTable::new();
    let results = outputs(&engine, "w = fn(f) => f(f)\nw(w)\n1", &mut table);
    assert!(matches!(
        &results[1],
        Err(ScriptError::Eval { statement: 2, error: EvalError::RecursionLimit(_), .. })
    ));
    assert_eq!(results[2], Ok(Value::Integer(1)));

    let deep_body = format!("v = fn(f) => {}f(f)\nv(v)\n2", "- ".repeat(150));
    let results = outputs(&engine, &deep_body, &mut table);
    assert!(matches!(
        &results[1],
        Err(ScriptError::Eval { error: EvalError::RecursionLimit(_), .. })
    ));
    assert_eq!(results[2], Ok(Value::Integer(2)));
}

#[test]
fn test_very_long_expression_is_a_parse_error() {
    let engine = engine();
    let source = "1".to_string() + &"+1".repeat(20_000) + "\n2";
    let results = outputs(&engine, &source, &mut VariableTable::new());
    match &results[..] {
        [Err(ScriptError::Parse { statement: 1, error })] => {
            assert_eq!(error.kind, ParseErrorKind::TooDeep(plotscript::parser::MAX_DEPTH));
        }
        other => panic!("unexpected {:?}", other),
    }
}
