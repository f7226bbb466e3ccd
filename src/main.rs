//! framequery command line
//! -----------------------
//! Runs SELECT queries against parquet-backed tables, either one-shot (`-q`)
//! or one query per line from stdin.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use framequery::engine::{read_parquet, Engine, LazyEngine, LocalEngine};
use framequery::output::dataframe_to_json;
use framequery::Context;

fn print_usage(program: &str) {
    println!(
        "Usage:\n  {program} [--engine local|lazy] [--root <dir>] [--table <name>=<file.parquet>]... [--json] -q \"<SQL>\"\n  {program} [flags]    # reads one query per line from stdin\n\nFlags:\n  --engine <name>          Backend engine: local (eager, default) or lazy (deferred plan)\n  --root <dir>             Directory of parquet files resolved as @db.schema.table\n  --table <name>=<path>    Register a parquet file under <name> (repeatable)\n  --json                   Print result rows as JSON instead of a table\n  -q, --query <SQL>        Run a one-shot query\n  -h, --help               Show this help\n\nInteractive:\n  quit | exit              leave\n  tables                   list registered tables"
    );
}

struct Options {
    engine: String,
    root: Option<String>,
    tables: Vec<(String, String)>,
    json: bool,
    query: Option<String>,
}

fn parse_args(program: &str, args: &[String]) -> anyhow::Result<Options> {
    let mut opts = Options { engine: "local".into(), root: None, tables: Vec::new(), json: false, query: None };
    let mut i = 0;
    while i < args.len() {
        let needs_value = |flag: &str| -> anyhow::Result<String> {
            args.get(i + 1).cloned().ok_or_else(|| anyhow!("{} requires a value", flag))
        };
        match args[i].as_str() {
            "--engine" => { opts.engine = needs_value("--engine")?; i += 2; }
            "--root" => { opts.root = Some(needs_value("--root")?); i += 2; }
            "--table" => {
                let entry = needs_value("--table")?;
                let (name, path) = entry.split_once('=').ok_or_else(|| anyhow!("--table expects <name>=<path>, got '{}'", entry))?;
                opts.tables.push((name.trim().to_string(), path.trim().to_string()));
                i += 2;
            }
            "--json" => { opts.json = true; i += 1; }
            "-q" | "--query" => { opts.query = Some(needs_value("--query")?); i += 2; }
            "-h" | "--help" => { print_usage(program); std::process::exit(0); }
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(opts)
}

fn build_context(opts: &Options) -> anyhow::Result<Context> {
    let engine: Arc<dyn Engine> = match opts.engine.as_str() {
        "local" => Arc::new(LocalEngine),
        "lazy" => Arc::new(LazyEngine),
        other => bail!("unknown engine '{}' (expected local or lazy)", other),
    };
    let mut ctx = Context::new();
    if let Some(root) = &opts.root {
        ctx.set_config(&format!("{}.source_root", engine.name()), Value::String(root.clone()));
    }
    for (name, path) in &opts.tables {
        let df = read_parquet(Path::new(path)).with_context(|| format!("reading {}", path))?;
        ctx.add_table(name, df.into(), true);
    }
    ctx.select_engine(engine)?;
    Ok(ctx)
}

fn run_one(ctx: &mut Context, query: &str, json: bool) -> anyhow::Result<()> {
    let df = framequery::run_collect(query, ctx)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&dataframe_to_json(&df))?);
    } else {
        println!("{}", df);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let mut args: Vec<String> = std::env::args().collect();
    let program = if args.is_empty() { "framequery".to_string() } else { args.remove(0) };
    let opts = match parse_args(&program, &args) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("{}", e);
            print_usage(&program);
            std::process::exit(2);
        }
    };
    let mut ctx = build_context(&opts)?;

    if let Some(q) = &opts.query {
        return run_one(&mut ctx, q, opts.json);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();
    loop {
        input.clear();
        print!("> ");
        let _ = stdout.flush();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = input.trim();
        if line.is_empty() { continue; }
        let up = line.to_uppercase();
        if up == "EXIT" || up == "QUIT" { break; }
        if up == "TABLES" {
            for t in ctx.table_names() { println!("{}", t); }
            continue;
        }
        // errors end the query, not the session
        if let Err(e) = run_one(&mut ctx, line, opts.json) {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}
