//! Script evaluator
//!
//! `evaluate` returns a lazy iterator over the statements of a token
//! list: each `next()` parses and evaluates exactly one statement against
//! the caller's variable table.

use crate::ast::{Expr, ExprKind, Statement, StatementKind, UnaryOp};
use crate::lexer::Token;
use crate::parser::parse_statement;
use plotscript_core::{Arity, Callable, EvalError, Function, ScriptError, Span, Value, VariableTable};
use plotscript_plugin::FunctionRegistry;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::sync::Arc;
use tracing::{debug, trace};

/// Script function calls allowed to be active at once on one thread
pub const MAX_CALL_DEPTH: usize = 128;

/// Grow the stack when less than this remains
const RED_ZONE: usize = 64 * 1024;
const STACK_GROWTH: usize = 1024 * 1024;

thread_local! {
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// What a run does after a statement fails to evaluate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Report the error and go on with the next statement
    #[default]
    Continue,
    /// Report the error and end the run
    Halt,
}

/// Evaluate `tokens` statement by statement.
///
/// Yields one result per statement. A parse error is yielded and ends the
/// run; evaluation errors follow the `ErrorPolicy` (see `with_policy`).
pub fn evaluate<'a>(
    tokens: impl Into<Arc<[Token]>>,
    table: &'a mut VariableTable,
    registry: &'a Arc<FunctionRegistry>,
) -> Evaluation<'a> {
    Evaluation {
        tokens: tokens.into(),
        cursor: 0,
        statement: 0,
        table,
        registry,
        policy: ErrorPolicy::default(),
        done: false,
    }
}

/// Lazy statement iterator returned by `evaluate`
pub struct Evaluation<'a> {
    tokens: Arc<[Token]>,
    cursor: usize,
    statement: usize,
    table: &'a mut VariableTable,
    registry: &'a Arc<FunctionRegistry>,
    policy: ErrorPolicy,
    done: bool,
}

impl<'a> Evaluation<'a> {
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Number of statements evaluated so far
    pub fn statements(&self) -> usize {
        self.statement
    }

    /// Tokens of the next statement and where it ends in the source
    fn next_segment(&mut self) -> Option<(usize, usize)> {
        let rest = self.tokens.get(self.cursor..)?;
        match rest.iter().position(Token::is_separator) {
            Some(offset) => {
                let (start, end) = (self.cursor, self.cursor + offset);
                self.cursor = end + 1;
                Some((start, end))
            }
            None if rest.is_empty() => None,
            None => {
                let start = self.cursor;
                self.cursor = self.tokens.len();
                Some((start, self.tokens.len()))
            }
        }
    }

    fn run(&mut self, statement: &Statement) -> Result<Value, (EvalError, Span)> {
        let scope = Scope::global(self.table, self.registry);
        match &statement.kind {
            StatementKind::Empty => Ok(Value::Unit),
            StatementKind::Expr(expr) => scope.eval(expr),
            StatementKind::Assign { name, value } => {
                let value = scope.eval(value)?;
                self.table.set(name.as_str(), value);
                Ok(Value::Unit)
            }
            StatementKind::Define { name, params, body } => {
                let function = scope.function(Some(name.as_str()), params, body);
                self.table.set(name.as_str(), Value::Function(function));
                Ok(Value::Unit)
            }
        }
    }
}

impl Iterator for Evaluation<'_> {
    type Item = Result<Value, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some((start, end)) = self.next_segment() else {
            self.done = true;
            return None;
        };
        self.statement += 1;
        let number = self.statement;

        let tokens = Arc::clone(&self.tokens);
        let segment = &tokens[start..end];
        let source_end = segment
            .last()
            .or_else(|| tokens.get(end))
            .map(|t| t.span.end)
            .unwrap_or(0);

        let statement = match parse_statement(segment, source_end) {
            Ok(statement) => statement,
            Err(error) => {
                debug!(statement = number, %error, "parse error, run ends");
                self.done = true;
                return Some(Err(ScriptError::Parse {
                    statement: number,
                    error,
                }));
            }
        };

        trace!(statement = number, span = %statement.span, "evaluating");
        match self.run(&statement) {
            Ok(value) => Some(Ok(value)),
            Err((error, span)) => {
                debug!(statement = number, %error, "evaluation error");
                if self.policy == ErrorPolicy::Halt {
                    self.done = true;
                }
                Some(Err(ScriptError::Eval {
                    statement: number,
                    span,
                    error,
                }))
            }
        }
    }
}

// ========== Expressions ==========

/// Name resolution for one evaluation: parameters, then a variable
/// table, then registry constants and functions.
struct Scope<'s> {
    params: &'s [String],
    args: &'s [Value],
    table: &'s VariableTable,
    registry: &'s Arc<FunctionRegistry>,
}

impl<'s> Scope<'s> {
    fn global(table: &'s VariableTable, registry: &'s Arc<FunctionRegistry>) -> Self {
        Self {
            params: &[],
            args: &[],
            table,
            registry,
        }
    }

    /// Parameter or variable
    fn local(&self, name: &str) -> Option<&'s Value> {
        self.params
            .iter()
            .zip(self.args)
            .find(|(param, _)| param.as_str() == name)
            .map(|(_, value)| value)
            .or_else(|| self.table.get(name))
    }

    fn lookup(&self, name: &str) -> Result<Value, EvalError> {
        if let Some(value) = self.local(name) {
            return Ok(value.clone());
        }
        if let Some(constant) = self.registry.constant(name) {
            return Ok(Value::Float(constant));
        }
        if let Some(function) = self.registry.function(name) {
            return Ok(Value::Function(function.clone()));
        }
        Err(EvalError::undefined(name))
    }

    /// Function to call for `callee(...)`: a function value in scope
    /// first, then a registry function.
    fn callee(&self, callee: &Expr) -> Result<Function, (EvalError, Span)> {
        if let ExprKind::Variable(name) = &callee.kind {
            if let Some(value) = self.local(name) {
                return callable(value).map_err(|e| (e, callee.span));
            }
            return self
                .registry
                .function(name)
                .cloned()
                .ok_or_else(|| (EvalError::undefined(name.as_str()), callee.span));
        }

        let value = self.eval(callee)?;
        callable(&value).map_err(|e| (e, callee.span))
    }

    fn eval(&self, expr: &Expr) -> Result<Value, (EvalError, Span)> {
        stacker::maybe_grow(RED_ZONE, STACK_GROWTH, || self.eval_node(expr))
    }

    fn eval_node(&self, expr: &Expr) -> Result<Value, (EvalError, Span)> {
        let at = |error: EvalError| (error, expr.span);

        match &expr.kind {
            ExprKind::Integer(i) => Ok(Value::Integer(*i)),
            ExprKind::Float(x) => Ok(Value::Float(*x)),
            ExprKind::Variable(name) => self.lookup(name).map_err(at),
            ExprKind::Unary(op, operand) => {
                let value = self.eval(operand)?;
                let result = match op {
                    UnaryOp::Neg => value.negate(),
                    UnaryOp::Plus => value.identity(),
                };
                result.map_err(at)
            }
            ExprKind::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                Value::binary(*op, &lhs, &rhs).map_err(at)
            }
            ExprKind::Call { callee, args } => {
                let function = self.callee(callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(&args).map_err(at)
            }
            ExprKind::Lambda { params, body } => Ok(Value::Function(self.function(None, params, body))),
        }
    }

    /// Script function capturing the current bindings
    fn function(&self, name: Option<&str>, params: &[String], body: &Arc<Expr>) -> Function {
        let mut captured = self.table.clone();
        for (param, value) in self.params.iter().zip(self.args) {
            captured.set(param.as_str(), value.clone());
        }

        let body = Arc::new(ScriptFunction {
            params: params.to_vec(),
            body: Arc::clone(body),
            captured,
            registry: Arc::clone(self.registry),
        });
        match name {
            Some(name) => Function::named(name, body),
            None => Function::new(body),
        }
    }
}

fn callable(value: &Value) -> Result<Function, EvalError> {
    value
        .as_function()
        .cloned()
        .ok_or(EvalError::NotCallable(value.type_name()))
}

/// A function defined in a script.
///
/// Sees the variables bound when it was defined, not later changes, so it
/// cannot call itself by name. Calls through function values nest at most
/// `MAX_CALL_DEPTH` deep.
struct ScriptFunction {
    params: Vec<String>,
    body: Arc<Expr>,
    captured: VariableTable,
    registry: Arc<FunctionRegistry>,
}

impl Callable for ScriptFunction {
    fn arity(&self) -> Arity {
        Arity::Exact(self.params.len())
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        let _depth = CallDepth::enter()?;
        let scope = Scope {
            params: &self.params,
            args,
            table: &self.captured,
            registry: &self.registry,
        };
        scope.eval(&self.body).map_err(|(error, _)| error)
    }
}

/// One active script call on this thread, released on drop
struct CallDepth;

impl CallDepth {
    fn enter() -> Result<Self, EvalError> {
        CALL_DEPTH.with(|depth| {
            if depth.get() >= MAX_CALL_DEPTH {
                trace!(limit = MAX_CALL_DEPTH, "call depth exceeded");
                return Err(EvalError::RecursionLimit(MAX_CALL_DEPTH));
            }
            depth.set(depth.get() + 1);
            Ok(CallDepth)
        })
    }
}

impl Drop for CallDepth {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<FunctionRegistry> {
        Arc::new(plotscript_std::standard_registry())
    }

    fn run(source: &str, table: &mut VariableTable) -> Vec<Result<Value, ScriptError>> {
        let registry = registry();
        evaluate(tokenize(source).unwrap(), table, &registry).collect()
    }

    fn values(source: &str) -> Vec<Value> {
        run(source, &mut VariableTable::new())
            .into_iter()
            .map(|r| r.unwrap())
            .collect()
    }

    fn single(source: &str) -> Result<Value, EvalError> {
        match run(source, &mut VariableTable::new()).pop() {
            Some(Ok(value)) => Ok(value),
            Some(Err(ScriptError::Eval { error, .. })) => Err(error),
            other => panic!("unexpected {:?}", other),
        }
    }

    mod statement_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_assignments_then_expression() {
            assert_eq!(
                values("x = 2\ny = x + 3\ny"),
                vec![Value::Unit, Value::Unit, Value::Integer(5)]
            );
        }

        #[test]
        fn test_table_persists_between_runs() {
            let mut table = VariableTable::new();
            run("x = 10", &mut table);
            let results = run("x", &mut table);
            assert_eq!(results, vec![Ok(Value::Integer(10))]);
        }

        #[test]
        fn test_reassignment_overwrites() {
            assert_eq!(values("x = 1; x = x + 1; x"), vec![Value::Unit, Value::Unit, Value::Integer(2)]);
        }

        #[test]
        fn test_separators_and_empty_statements() {
            assert_eq!(values("1;"), vec![Value::Integer(1)]);
            assert_eq!(values("1;;2"), vec![Value::Integer(1), Value::Unit, Value::Integer(2)]);
            assert_eq!(values("\n1"), vec![Value::Unit, Value::Integer(1)]);
            assert_eq!(values(""), vec![]);
        }

        #[test]
        fn test_statement_numbers_count_empty_statements() {
            let results = run("1\n\nundefined_name", &mut VariableTable::new());
            assert!(matches!(results[2], Err(ScriptError::Eval { statement: 3, .. })));
        }
    }

    mod expression_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_division_by_zero() {
            assert_eq!(single("1 / 0"), Err(EvalError::DivisionByZero));
            assert_eq!(single("1.0 / 0"), Err(EvalError::DivisionByZero));
        }

        #[test]
        fn test_precedence_in_values() {
            assert_eq!(single("2 + 3 * 4"), Ok(Value::Integer(14)));
            assert_eq!(single("2 ^ 3 ^ 2"), Ok(Value::Integer(512)));
            assert_eq!(single("- 2 ^ 2"), Ok(Value::Integer(-4)));
            assert_eq!(single("7 % 4 < 4"), Ok(Value::Integer(1)));
        }

        #[test]
        fn test_signed_literal_is_the_power_base() {
            assert_eq!(single("-2^2"), Ok(Value::Integer(4)));
            assert_eq!(single("- 2^2"), Ok(Value::Integer(-4)));
            assert_eq!(single("-(2^2)"), Ok(Value::Integer(-4)));
            assert_eq!(single("0 - 2^2"), Ok(Value::Integer(-4)));
        }

        #[test]
        fn test_constants_and_functions() {
            assert_eq!(single("pi"), Ok(Value::Float(std::f64::consts::PI)));
            assert_eq!(single("sqrt(16)"), Ok(Value::Float(4.0)));
            assert_eq!(single("max(1, 5, 3)"), Ok(Value::Integer(5)));
        }

        #[test]
        fn test_variable_shadows_constant() {
            assert_eq!(values("e = 3; e")[1], Value::Integer(3));
        }

        #[test]
        fn test_undefined_symbol() {
            assert_eq!(single("nope + 1"), Err(EvalError::undefined("nope")));
            assert_eq!(single("nope(1)"), Err(EvalError::undefined("nope")));
        }

        #[test]
        fn test_calling_a_number() {
            let mut table = VariableTable::new();
            let results = run("x = 3; x(1)", &mut table);
            assert!(matches!(
                &results[1],
                Err(ScriptError::Eval { error: EvalError::NotCallable("Integer"), .. })
            ));
        }

        #[test]
        fn test_error_span_points_at_failing_expression() {
            let results = run("1 + 2 / 0", &mut VariableTable::new());
            match &results[0] {
                Err(ScriptError::Eval { span, .. }) => assert_eq!(*span, Span::new(4, 9)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    mod function_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_define_and_call() {
            assert_eq!(
                values("f(x) = x * x + 1\nf(3)"),
                vec![Value::Unit, Value::Integer(10)]
            );
        }

        #[test]
        fn test_lambda_value() {
            assert_eq!(single("(fn(x, y) => x - y)(5, 2)"), Ok(Value::Integer(3)));
            let mut table = VariableTable::new();
            run("g = fn(t) => t / 2", &mut table);
            assert_eq!(run("g(3)", &mut table), vec![Ok(Value::Float(1.5))]);
            assert_eq!(table.get("g").unwrap().to_string(), "<fn fn/1>");
        }

        #[test]
        fn test_function_display() {
            let mut table = VariableTable::new();
            run("f(a, b) = a", &mut table);
            assert_eq!(table.get("f").unwrap().to_string(), "<fn f/2>");
        }

        #[test]
        fn test_captures_definition_time_bindings() {
            let results = values("k = 2\nf(x) = k * x\nk = 10\nf(3)\nk");
            assert_eq!(results[3], Value::Integer(6));
            assert_eq!(results[4], Value::Integer(10));
        }

        #[test]
        fn test_parameters_shadow_captured_names() {
            assert_eq!(values("x = 100\nf(x) = x + 1\nf(1)")[2], Value::Integer(2));
        }

        #[test]
        fn test_closures_capture_parameters() {
            let results = values("adder(n) = fn(x) => x + n\nadd2 = adder(2)\nadd2(5)");
            assert_eq!(results[2], Value::Integer(7));
        }

        #[test]
        fn test_functions_as_arguments() {
            let results = values("twice(f, x) = f(f(x))\ntwice(fn(v) => v * 3, 2)\ntwice(sqrt, 16)");
            assert_eq!(results[1], Value::Integer(18));
            assert_eq!(results[2], Value::Float(2.0));
        }

        #[test]
        fn test_redefinition_is_new_identity() {
            let mut table = VariableTable::new();
            run("f(x) = x", &mut table);
            let first = table.get("f").cloned().unwrap();
            run("f(x) = x", &mut table);
            assert_ne!(table.get("f").cloned().unwrap(), first);
        }

        #[test]
        fn test_no_self_recursion() {
            assert_eq!(single("f(x) = f(x)\nf(1)"), Err(EvalError::undefined("f")));
        }

        #[test]
        fn test_self_application_stops_at_call_limit() {
            let results = run("w = fn(f) => f(f)\nw(w)\n1", &mut VariableTable::new());
            match &results[1] {
                Err(ScriptError::Eval { statement, span, error }) => {
                    assert_eq!(*statement, 2);
                    assert_eq!(*error, EvalError::RecursionLimit(MAX_CALL_DEPTH));
                    assert_eq!(error.code(), plotscript_core::codes::RECURSION_LIMIT);
                    assert_eq!(span.start, 18);
                }
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(results[2], Ok(Value::Integer(1)));
        }

        #[test]
        fn test_call_depth_released_after_failure() {
            let mut table = VariableTable::new();
            run("w = fn(f) => f(f)\nw(w)", &mut table);
            CALL_DEPTH.with(|depth| assert_eq!(depth.get(), 0));

            let source = "d0 = fn(x) => x\n".to_string()
                + &(1..100)
                    .map(|i| format!("d{i} = fn(x) => d{}(x) + 1\n", i - 1))
                    .collect::<String>()
                + "d99(0)";
            let results = run(&source, &mut table);
            assert_eq!(results.last(), Some(&Ok(Value::Integer(99))));
        }

        #[test]
        fn test_wrong_argument_count() {
            let err = single("f(x) = x\nf(1, 2)").unwrap_err();
            assert_eq!(err.code(), plotscript_core::codes::ARG_COUNT);
        }

        #[test]
        fn test_registry_function_as_value() {
            let results = values("s = sin\ns(0)");
            assert_eq!(results[1], Value::Float(0.0));
        }

        #[test]
        fn test_plot_creates_graph() {
            let value = single("plot(fn(x) => x ^ 2, 0, 1)").unwrap();
            let graph = value.as_graphing_function().unwrap();
            assert_eq!(graph.invoke(3.0), Ok(Value::Float(9.0)));
            assert!(graph.default_range().is_some());
        }
    }

    mod error_policy_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn test_eval_error_does_not_touch_table() {
            let mut table = VariableTable::new();
            let results = run("x = 1\nx = 1 / 0\nx", &mut table);
            assert!(results[1].is_err());
            assert_eq!(results[2], Ok(Value::Integer(1)));
            assert_eq!(table.get("x"), Some(&Value::Integer(1)));
        }

        #[test]
        fn test_continue_after_eval_error() {
            let results = run("1 / 0\n2", &mut VariableTable::new());
            assert_eq!(results.len(), 2);
            assert_eq!(results[1], Ok(Value::Integer(2)));
        }

        #[test]
        fn test_halt_policy_stops() {
            let registry = registry();
            let mut table = VariableTable::new();
            let tokens = tokenize("y = 1 / 0\ny = 2").unwrap();
            let results: Vec<_> = evaluate(tokens, &mut table, &registry)
                .with_policy(ErrorPolicy::Halt)
                .collect();
            assert_eq!(results.len(), 1);
            assert!(table.get("y").is_none());
        }

        #[test]
        fn test_parse_error_ends_run() {
            let mut table = VariableTable::new();
            let results = run("a = 1\nb = (\nc = 3", &mut table);
            assert_eq!(results.len(), 2);
            assert!(matches!(results[1], Err(ScriptError::Parse { statement: 2, .. })));
            assert!(table.contains("a"));
            assert!(!table.contains("c"));
        }

        #[test]
        fn test_lazy_evaluation() {
            let registry = registry();
            let mut table = VariableTable::new();
            let tokens = tokenize("a = 1\nb = 2").unwrap();
            let mut run = evaluate(tokens, &mut table, &registry);
            assert_eq!(run.next(), Some(Ok(Value::Unit)));
            assert_eq!(run.statements(), 1);
            drop(run);
            assert!(table.contains("a"));
            assert!(!table.contains("b"));
        }
    }
}
