//! Sampling graphs produced by scripts

use plotscript::{Engine, EngineConfig, SampleRange, Value, VariableTable};
use plotscript_core::{Arity, EvalError};
use plotscript_plugin::{FunctionMeta, NativeFunction};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `x + 1`, counting calls
struct Counter(Arc<AtomicUsize>);

impl NativeFunction for Counter {
    fn meta(&self) -> FunctionMeta {
        FunctionMeta::new("counter", Arity::Exact(1))
    }

    fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        let x = args[0].as_f64().ok_or(EvalError::InvalidOperand {
            op: "counter",
            operand: args[0].type_name(),
        })?;
        Ok(Value::Float(x + 1.0))
    }
}

fn counting_engine() -> (Engine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = plotscript_std::standard_registry().with_function(Counter(Arc::clone(&calls)));
    let mut config = EngineConfig::default();
    config.plugins.enabled = false;
    (Engine::from_registry(registry, config), calls)
}

#[test]
fn test_cached_point_computed_once() {
    let (engine, calls) = counting_engine();
    let run = engine.run("plot(counter)", &mut VariableTable::new()).unwrap();
    let graph = &run.graphs[0];

    let first = engine.caches().get_or_compute(graph, 3.0).unwrap();
    let second = engine.caches().get_or_compute(graph, 3.0).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    engine.caches().clear(graph);
    engine.caches().get_or_compute(graph, 3.0).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_same_function_shares_cache_across_runs() {
    let (engine, calls) = counting_engine();
    let mut table = VariableTable::new();
    let first = engine.run("plot(counter, 0, 1, 0.5)", &mut table).unwrap();
    let second = engine.run("plot(counter)", &mut table).unwrap();

    engine.sample(&first.graphs[0], None);
    let curve = engine.sample(&second.graphs[0], Some(SampleRange::new(0.0, 1.0, 0.5).unwrap()));
    assert_eq!(curve.points, vec![(0.0, 1.0), (0.5, 1.5), (1.0, 2.0)]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_redefinition_gets_new_cache() {
    let (engine, _) = counting_engine();
    let mut table = VariableTable::new();
    let old = engine.run("f(x) = x\nplot(f)", &mut table).unwrap().graphs;
    let new = engine.run("f(x) = 2 * x\nplot(f)", &mut table).unwrap().graphs;

    let range = SampleRange::new(1.0, 1.0, 1.0).unwrap();
    assert_eq!(engine.sample(&old[0], Some(range)).points, vec![(1.0, 1.0)]);
    assert_eq!(engine.sample(&new[0], Some(range)).points, vec![(1.0, 2.0)]);
    assert_eq!(engine.caches().len(), 2);

    engine.retain_graphs(&new);
    assert_eq!(engine.caches().len(), 1);
}

#[test]
fn test_failing_points_are_gaps() {
    let engine = Engine::with_standard_library();
    let run = engine.run("plot(sqrt, -1, 1, 1)", &mut VariableTable::new()).unwrap();
    let curve = engine.sample(&run.graphs[0], None);
    assert_eq!(curve.points, vec![(0.0, 0.0), (1.0, 1.0)]);
    assert_eq!(curve.failures.len(), 1);
    assert_eq!(curve.failures[0].x, -1.0);
}
