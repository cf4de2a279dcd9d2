//! PlotScript command-line host
//!
//! Runs a script file (or stdin) and prints each result as `> value`.
//! With an interactive stdin and no file it runs a REPL sharing one
//! variable table across lines.
//!
//! Usage:
//!   plotscript [--config FILE] [--no-plugins] [--halt] [--sample] [--json]
//!              [--list-functions] [--plugins] [FILE|-]

use plotscript::{Engine, EngineConfig, ErrorPolicy, ScriptError, ScriptRun, Value, VariableTable};
use serde_json::{json, Value as JsonValue};
use std::fs;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
usage: plotscript [options] [FILE|-]

options:
  --config FILE      read engine settings from a JSON file
  --no-plugins       do not load plugin modules
  --halt             stop at the first failing statement
  --sample           print the points of every graph produced
  --json             print results as JSON
  --list-functions   list built-in and plugin functions
  --plugins          show what the plugin loader found
  -h, --help         show this help
  -V, --version      show the version";

#[derive(Debug, Default, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    no_plugins: bool,
    halt: bool,
    sample: bool,
    json: bool,
    list_functions: bool,
    list_plugins: bool,
    help: bool,
    version: bool,
    /// `None` or `-` read stdin
    input: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a file")?;
                options.config = Some(PathBuf::from(path));
            }
            "--no-plugins" => options.no_plugins = true,
            "--halt" => options.halt = true,
            "--sample" => options.sample = true,
            "--json" => options.json = true,
            "--list-functions" => options.list_functions = true,
            "--plugins" => options.list_plugins = true,
            "-h" | "--help" => options.help = true,
            "-V" | "--version" => options.version = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option '{}'", flag)),
            _ if options.input.is_some() => return Err(format!("unexpected argument '{}'", arg)),
            _ => options.input = Some(arg),
        }
    }

    Ok(options)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("plotscript: {}\n\n{}", message, USAGE);
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("{}", USAGE);
        return ExitCode::SUCCESS;
    }
    if options.version {
        println!("plotscript {}", VERSION);
        return ExitCode::SUCCESS;
    }

    let mut config = match EngineConfig::load(options.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("plotscript: {}", e);
            return ExitCode::from(2);
        }
    };
    if options.no_plugins {
        config.plugins.enabled = false;
    }
    if options.halt {
        config.error_policy = ErrorPolicy::Halt;
    }
    debug!(?config, "configuration loaded");

    let engine = Engine::new(config);
    let mut stdout = io::stdout().lock();

    if options.list_functions || options.list_plugins {
        let text = if options.list_functions {
            list_functions(&engine, options.json)
        } else {
            list_plugins(&engine, options.json)
        };
        return finish(writeln!(stdout, "{}", text), true);
    }

    let interactive = options.input.is_none() && io::stdin().is_terminal();
    if interactive {
        return finish(repl(&engine, &options, &mut stdout), true);
    }

    let source = match read_input(options.input.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("plotscript: {}", e);
            return ExitCode::from(2);
        }
    };

    let mut table = VariableTable::new();
    let (text, ok) = match engine.run(&source, &mut table) {
        Ok(run) => {
            let ok = run.errors().next().is_none();
            let text = if options.json {
                render_json(&engine, &run, &source, options.sample).to_string()
            } else {
                render_text(&engine, &run, options.sample)
            };
            (text, ok)
        }
        Err(e) => {
            let text = if options.json {
                json!({ "error": e.to_string(), "code": plotscript_core::codes::LEX_ERROR })
                    .to_string()
            } else {
                format!("----- {} -----", e)
            };
            (text, false)
        }
    };
    finish(write!(stdout, "{}", text), ok)
}

fn finish(written: io::Result<()>, ok: bool) -> ExitCode {
    match written {
        Ok(()) if ok => ExitCode::SUCCESS,
        Ok(()) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("plotscript: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_input(input: Option<&str>) -> io::Result<String> {
    match input {
        None | Some("-") => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
        Some(path) => fs::read_to_string(path),
    }
}

// ========== REPL ==========

fn repl(engine: &Engine, options: &Options, out: &mut impl Write) -> io::Result<()> {
    let mut table = VariableTable::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    writeln!(out, "plotscript {} (:vars lists bindings, :quit exits)", VERSION)?;
    loop {
        write!(out, "ps> ")?;
        out.flush()?;

        let Some(line) = lines.next().transpose()? else {
            break;
        };
        match line.trim() {
            "" => continue,
            ":quit" | ":q" => break,
            ":vars" => {
                for (name, value) in table.iter() {
                    writeln!(out, "{} = {}", name, value)?;
                }
                continue;
            }
            _ => {}
        }

        let text = match engine.run(&line, &mut table) {
            Ok(run) if options.json => {
                format!("{}\n", render_json(engine, &run, &line, options.sample))
            }
            Ok(run) => render_text(engine, &run, options.sample),
            Err(e) => format!("----- {} -----\n", e),
        };
        write!(out, "{}", text)?;
    }
    Ok(())
}

// ========== Output ==========

fn render_text(engine: &Engine, run: &ScriptRun, sample: bool) -> String {
    let mut text = String::new();

    for output in &run.outputs {
        match output {
            Ok(Value::Unit) | Ok(Value::GraphingFunction(_)) => {}
            Ok(value) => text.push_str(&format!("> {}\n", value)),
            Err(e) => text.push_str(&format!("----- {} -----\n", e)),
        }
    }

    for graph in &run.graphs {
        text.push_str(&format!("graph {}\n", graph));
        if !sample {
            continue;
        }
        let curve = engine.sample(graph, None);
        for (x, y) in &curve.points {
            text.push_str(&format!("{}\t{}\n", x, y));
        }
        for failure in &curve.failures {
            text.push_str(&format!("{}\t# {}\n", failure.x, failure.error));
        }
    }

    text
}

fn render_json(engine: &Engine, run: &ScriptRun, source: &str, sample: bool) -> JsonValue {
    let outputs: Vec<JsonValue> = run
        .outputs
        .iter()
        .enumerate()
        .map(|(i, output)| match output {
            Ok(value) => json!({ "statement": i + 1, "value": value }),
            Err(e) => error_json(e, source),
        })
        .collect();

    let graphs: Vec<JsonValue> = run
        .graphs
        .iter()
        .map(|graph| {
            let mut entry = json!({ "graph": graph.to_string() });
            if sample {
                entry["curve"] = json!(engine.sample(graph, None));
            }
            entry
        })
        .collect();

    json!({ "outputs": outputs, "graphs": graphs })
}

fn error_json(error: &ScriptError, source: &str) -> JsonValue {
    let statement = match error {
        ScriptError::Lex(_) => None,
        ScriptError::Parse { statement, .. } | ScriptError::Eval { statement, .. } => {
            Some(*statement)
        }
    };
    let (line, column) = error.span().line_col(source);
    json!({
        "statement": statement,
        "error": error.to_string(),
        "code": error.code(),
        "line": line,
        "column": column,
    })
}

fn list_functions(engine: &Engine, as_json: bool) -> String {
    let registry = engine.registry();
    if as_json {
        let constants: Vec<JsonValue> = registry
            .constants()
            .iter()
            .map(|c| json!({ "name": c.name, "value": c.value, "description": c.description }))
            .collect();
        return json!({ "functions": registry.functions(), "constants": constants }).to_string();
    }

    let mut lines = Vec::new();
    for listing in registry.functions() {
        lines.push(format!(
            "{:<10} {:<28} {:<8} {:<12} {}",
            listing.meta.name,
            listing.meta.usage,
            listing.meta.category,
            listing.source.to_string(),
            listing.meta.description
        ));
    }
    for constant in registry.constants() {
        lines.push(format!("{:<10} = {}  {}", constant.name, constant.value, constant.description));
    }
    lines.join("\n")
}

fn list_plugins(engine: &Engine, as_json: bool) -> String {
    let report = engine.load_report();
    if as_json {
        return json!({
            "enabled": engine.config().plugins.enabled,
            "search_paths": engine.config().plugins.roots(),
            "report": report,
        })
        .to_string();
    }

    let mut lines = Vec::new();
    if !engine.config().plugins.enabled {
        lines.push("plugin loading is disabled".to_string());
    }
    for plugin in &report.loaded {
        lines.push(format!(
            "loaded  {} ({}): {}",
            plugin.name,
            plugin.path.display(),
            plugin.functions.join(", ")
        ));
    }
    for skipped in &report.skipped {
        lines.push(format!("skipped {}: {}", skipped.path.display(), skipped.reason));
    }
    for conflict in &report.conflicts {
        lines.push(format!(
            "dropped {} from plugin '{}', already provided by {}",
            conflict.function, conflict.plugin, conflict.existing
        ));
    }
    if lines.is_empty() {
        lines.push("no plugins found".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags_and_input() {
        let options = parse_args(args(&["--halt", "--json", "--config", "ps.json", "plot.ps"])).unwrap();
        assert_eq!(
            options,
            Options {
                config: Some(PathBuf::from("ps.json")),
                halt: true,
                json: true,
                input: Some("plot.ps".to_string()),
                ..Options::default()
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_args(args(&["--bogus"])).is_err());
        assert!(parse_args(args(&["--config"])).is_err());
        assert!(parse_args(args(&["a.ps", "b.ps"])).is_err());
        assert_eq!(parse_args(args(&["-"])).unwrap().input.as_deref(), Some("-"));
    }

    #[test]
    fn test_text_output() {
        let engine = Engine::with_standard_library();
        let mut table = VariableTable::new();
        let run = engine.run("x = 2\nx + 1\n1 / 0\nplot(sin)", &mut table).unwrap();
        assert_eq!(
            render_text(&engine, &run, false),
            "> 3\n----- statement 3 failed: division by zero -----\ngraph <graph sin/1>\n"
        );
    }

    #[test]
    fn test_json_output() {
        let engine = Engine::with_standard_library();
        let source = "1 + 1\nnope";
        let run = engine.run(source, &mut VariableTable::new()).unwrap();
        let output = render_json(&engine, &run, source, false);
        assert_eq!(output["outputs"][0]["statement"], 1);
        assert_eq!(output["outputs"][1]["line"], 2);
        assert!(output["outputs"][1]["error"].is_string());
    }

    #[test]
    fn test_sampled_graph() {
        let engine = Engine::with_standard_library();
        let run = engine.run("plot(fn(x) => x, 0, 1, 1)", &mut VariableTable::new()).unwrap();
        let text = render_text(&engine, &run, true);
        assert!(text.ends_with("0\t0\n1\t1\n"), "{}", text);
    }
}
