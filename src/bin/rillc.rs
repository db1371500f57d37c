// ABOUTME: rillc — the demo REPL/script-runner binary bundling rill's stdlib (spec section 6, SPEC_FULL.md section F)

use clap::Parser;
use rill::config::{CreateContextOptions, RuntimeOptions};
use rill::error::RillError;
use rill::scope::{Observability, ScopeRef};
use rill::stdlib;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const WELCOME: &str = "rillc — Rill pipeline-script interpreter";
const HISTORY_FILE: &str = ".rill_history";

/// Rill interpreter: runs a script file, or drops into an interactive REPL.
#[derive(Parser, Debug)]
#[command(name = "rillc")]
#[command(version = VERSION)]
#[command(about = "An embeddable pipeline-oriented scripting language")]
struct CliArgs {
    /// Script file to execute (if omitted, starts the REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Per-host-call timeout in milliseconds
    #[arg(long = "timeout-ms", value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Loop/lazy-iterator expansion cap
    #[arg(long = "iteration-limit", value_name = "N")]
    iteration_limit: Option<u64>,

    /// Skip registering the bundled demo standard library
    #[arg(long = "no-stdlib")]
    no_stdlib: bool,

    /// Trace host calls, function returns, and raised messages to stderr
    #[arg(long = "trace")]
    trace: bool,
}

fn trace_observability() -> Observability {
    Observability {
        on_host_call: Some(Rc::new(|name, args| {
            eprintln!("[trace] call {name}({args:?})");
        })),
        on_function_return: Some(Rc::new(|name, result| {
            eprintln!("[trace] {name} -> {result}");
        })),
        on_log_event: Some(Rc::new(|message| {
            eprintln!("[trace] {message}");
        })),
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let mut runtime = RuntimeOptions::default();
    if let Some(ms) = args.timeout_ms {
        runtime.timeout_ms = ms;
    }
    if let Some(limit) = args.iteration_limit {
        runtime.iteration_limit = limit;
    }

    let observability = if args.trace { trace_observability() } else { Observability::default() };

    let ctx = match rill::create_runtime_context(CreateContextOptions {
        runtime,
        observability,
        ..CreateContextOptions::new()
    }) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("failed to create runtime context: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !args.no_stdlib {
        stdlib::register_demo_builtins(&ctx);
    }

    if let Some(path) = args.script {
        return run_script(&path, &ctx);
    }

    run_repl(&ctx)
}

fn run_script(path: &PathBuf, ctx: &ScopeRef) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("could not read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };

    match run_source(&source, ctx) {
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", render_error(&e));
            ExitCode::FAILURE
        }
    }
}

fn run_repl(ctx: &ScopeRef) -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl = match DefaultEditor::with_config(config) {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("failed to initialize REPL: {e}");
            return ExitCode::FAILURE;
        }
    };
    let _ = rl.load_history(HISTORY_FILE);

    println!("{WELCOME} v{VERSION}");
    println!("type a pipe chain and press enter; :help, :help <name>, or :quit");

    loop {
        match rl.readline("rill> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match trimmed {
                    ":quit" | ":exit" => break,
                    ":help" => print_help_index(),
                    _ if trimmed.starts_with(":help ") => {
                        print_help_entry(trimmed.trim_start_matches(":help ").trim())
                    }
                    _ => match run_source(trimmed, ctx) {
                        Ok(value) => println!("=> {value}"),
                        Err(e) => eprintln!("{}", render_error(&e)),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\ngoodbye");
                break;
            }
            Err(e) => {
                eprintln!("readline error: {e}");
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_FILE);
    ExitCode::SUCCESS
}

fn run_source(source: &str, ctx: &ScopeRef) -> Result<rill::value::RillValue, RillError> {
    let script = rill::parse(source)?;
    rill::execute(&script, ctx)
}

fn render_error(e: &RillError) -> String {
    match e.location {
        Some(loc) => format!("{}: {} (line {}, col {})", e.code, e.message, loc.start.line, loc.start.column),
        None => format!("{}: {}", e.code, e.message),
    }
}

fn print_help_index() {
    let mut names = stdlib::help::list_all();
    names.sort();
    for name in names {
        println!("{name}");
    }
}

fn print_help_entry(name: &str) {
    match stdlib::help::lookup(name) {
        Some(entry) => {
            let skin = termimad::MadSkin::default();
            skin.print_text(&stdlib::help::render_markdown(&entry));
        }
        None => eprintln!("no help entry for '{name}'"),
    }
}
