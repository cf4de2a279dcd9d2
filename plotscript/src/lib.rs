//! PlotScript - an expression language for function plotting
//!
//! Scripts are lexed once, then parsed and evaluated lazily statement by
//! statement against a host-owned `VariableTable`. Graphing functions
//! produced by a script are sampled through a shared memoising cache.

pub mod ast;
pub mod config;
mod document;
mod eval;
pub mod lexer;
pub mod parser;
pub mod sample;

pub use config::{ConfigError, EngineConfig, PluginConfig, SamplingConfig};
pub use document::Document;
pub use eval::{evaluate, ErrorPolicy, Evaluation};
pub use lexer::{tokenize, Token, TokenKind};
pub use sample::{Curve, SampleCache, SampleCaches, SampleFailure};

pub use plotscript_core::{
    EvalError, Function, GraphingFunction, LexError, ParseError, SampleRange, ScriptError, Span,
    Value, VariableTable,
};
pub use plotscript_plugin::{FunctionRegistry, LoadReport, PluginContext};

use std::sync::Arc;
use tracing::info;

/// Everything one script run produced
#[derive(Debug, Clone, Default)]
pub struct ScriptRun {
    /// One entry per statement, in order
    pub outputs: Vec<Result<Value, ScriptError>>,
    /// Graphing functions among the successful results
    pub graphs: Vec<GraphingFunction>,
}

impl ScriptRun {
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.outputs.iter().filter_map(|output| output.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &ScriptError> {
        self.outputs.iter().filter_map(|output| output.as_ref().err())
    }
}

/// Main PlotScript engine: registry, loaded plugins and sample caches
pub struct Engine {
    config: EngineConfig,
    /// Registry before plugins, the starting point of a reload
    base: FunctionRegistry,
    registry: Arc<FunctionRegistry>,
    plugins: PluginContext,
    report: LoadReport,
    caches: SampleCaches,
}

impl Engine {
    /// Standard library plus whatever plugins `config` finds
    pub fn new(config: EngineConfig) -> Self {
        Self::from_registry(plotscript_std::standard_registry(), config)
    }

    /// Standard library only, default settings otherwise
    pub fn with_standard_library() -> Self {
        let mut config = EngineConfig::default();
        config.plugins.enabled = false;
        Self::new(config)
    }

    pub fn from_registry(base: FunctionRegistry, config: EngineConfig) -> Self {
        let mut engine = Self {
            config,
            registry: Arc::new(base.clone()),
            base,
            plugins: PluginContext::new(),
            report: LoadReport::default(),
            caches: SampleCaches::new(),
        };
        engine.reload_plugins();
        engine
    }

    /// Rebuild the registry from the base and load plugins again.
    ///
    /// Functions already handed out keep their plugin library alive.
    pub fn reload_plugins(&mut self) -> &LoadReport {
        let mut registry = self.base.clone();
        let (plugins, report) = self.config.plugins.loader().load_all(&mut registry);
        info!(
            plugins = plugins.len(),
            functions = registry.len(),
            conflicts = report.conflicts.len(),
            "registry ready"
        );
        self.registry = Arc::new(registry);
        self.plugins = plugins;
        self.report = report;
        &self.report
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn plugins(&self) -> &PluginContext {
        &self.plugins
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    pub fn caches(&self) -> &SampleCaches {
        &self.caches
    }

    /// Lex `source` and return the lazy statement iterator
    pub fn evaluate<'a>(
        &'a self,
        source: &str,
        table: &'a mut VariableTable,
    ) -> Result<Evaluation<'a>, LexError> {
        let tokens = tokenize(source)?;
        Ok(evaluate(tokens, table, &self.registry).with_policy(self.config.error_policy))
    }

    /// Run a document against `table` with this engine's registry and policy
    pub fn run_document<'a>(
        &'a self,
        document: &mut Document,
        table: &'a mut VariableTable,
    ) -> Result<Evaluation<'a>, LexError> {
        Ok(document
            .run(table, &self.registry)?
            .with_policy(self.config.error_policy))
    }

    /// Evaluate all of `source`, collecting results and graphs
    pub fn run(&self, source: &str, table: &mut VariableTable) -> Result<ScriptRun, LexError> {
        let mut run = ScriptRun::default();
        for output in self.evaluate(source, table)? {
            if let Ok(Value::GraphingFunction(graph)) = &output {
                run.graphs.push(graph.clone());
            }
            run.outputs.push(output);
        }
        Ok(run)
    }

    /// Sample over `range`, the graph's own range or the configured default
    pub fn sample(&self, graph: &GraphingFunction, range: Option<SampleRange>) -> Curve {
        let range = sample::resolve_range(range, graph, self.config.sampling.default_range());
        self.caches.sample(graph, range)
    }

    /// Sample `start..=end` split into the configured viewport intervals
    pub fn sample_viewport(&self, graph: &GraphingFunction, start: f64, end: f64) -> Option<Curve> {
        let range = self.config.sampling.viewport(start, end)?;
        Some(self.caches.sample(graph, range))
    }

    /// Forget cached samples of graphs no longer shown
    pub fn retain_graphs(&self, live: &[GraphingFunction]) {
        self.caches.retain(live);
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_standard_library()
    }
}

/// Build a `VariableTable` from `name: value` pairs
#[macro_export]
macro_rules! vars {
    {} => { $crate::VariableTable::new() };
    { $($key:ident : $value:expr),* $(,)? } => {{
        let mut table = $crate::VariableTable::new();
        $(
            table.set(stringify!($key), $crate::Value::from($value));
        )*
        table
    }};
}
