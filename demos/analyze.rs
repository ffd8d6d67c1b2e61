//! Session Viewer for the Bundled Demo Module
//!
//! This example builds a small web-handler module with the fluent API and
//! shows the analysis surfaces over it: rule reports, control flow graphs,
//! and the call graph.
//!
//! # Usage
//!
//! ```bash
//! # Run both demo rules and print the findings
//! cargo run --example analyze -- report
//!
//! # List the functions in the demo module
//! cargo run --example analyze -- list
//!
//! # Export a function's CFG in DOT format
//! cargo run --example analyze -- cfg --function handle_search
//!
//! # Export the call graph in DOT format
//! cargo run --example analyze -- callgraph
//! ```
//!
//! Set `RUST_LOG=flowscope=debug` to watch summary computation and rule
//! resolution as the session runs.

use clap::{Parser, Subcommand};
use flowscope::prelude::*;

#[derive(Parser)]
#[command(name = "analyze")]
#[command(about = "Session viewer for the bundled demo module", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the functions in the demo module
    List,

    /// Run the demo rules and print the report
    Report,

    /// Export a function's control flow graph in DOT format
    Cfg {
        /// Function name
        #[arg(short, long)]
        function: String,
    },

    /// Export the call graph in DOT format
    Callgraph,
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let module = demo_module();

    match cli.command {
        Command::List => list_functions(&module),
        Command::Report => run_report(&module),
        Command::Cfg { function } => export_cfg(&module, &function)?,
        Command::Callgraph => {
            let graph = CallGraph::build(&module);
            print!("{}", graph.to_dot(&module, Some("demo module")));
        }
    }

    Ok(())
}

/// Builds the demo module: two request handlers over shared helpers.
///
/// `handle_search` forwards raw input to the database and ships a cookie
/// with its insecure default; `handle_login` escapes the input first and
/// secures its cookie. The demo rules flag exactly the first handler's
/// behavior.
fn demo_module() -> Module {
    let mut mb = ModuleBuilder::new();
    let http_read = mb.external("Http.ReadParam");
    let sql_escape = mb.external("Sql.Escape");
    let sql_execute = mb.external("Sql.Execute");
    let add_cookie = mb.external("Response.AddCookie");
    let cookie = mb.ty("Cookie");
    let secure = mb.field("Secure");

    let mut f = mb.start_function("read_param");
    let raw = f.call_ext(http_read, vec![]);
    f.ret(Some(raw));
    let read_param = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("run_query");
    let q = f.param("q");
    let qv = f.read(q);
    let exec = f.call_ext(sql_execute, vec![qv]);
    f.eval(exec);
    f.ret(None);
    let run_query = mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handle_search");
    let x = f.local("x");
    let value = f.call_fn(read_param, vec![]);
    f.assign(x, value);
    let xv = f.read(x);
    let call = f.call_fn(run_query, vec![xv]);
    f.eval(call);
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let cv = f.read(c);
    let ship = f.call_ext(add_cookie, vec![cv]);
    f.eval(ship);
    f.ret(None);
    mb.finish_function(f).unwrap();

    let mut f = mb.start_function("handle_login");
    let y = f.local("y");
    let value = f.call_fn(read_param, vec![]);
    f.assign(y, value);
    let yv = f.read(y);
    let escaped = f.call_ext(sql_escape, vec![yv]);
    f.assign(y, escaped);
    let yv = f.read(y);
    let call = f.call_fn(run_query, vec![yv]);
    f.eval(call);
    let c = f.local("c");
    let fresh = f.new_object(cookie, vec![]);
    f.assign(c, fresh);
    let base = f.read(c);
    let flag = f.lit_bool(true);
    f.assign_field(base, secure, flag);
    let cv = f.read(c);
    let ship = f.call_ext(add_cookie, vec![cv]);
    f.eval(ship);
    f.ret(None);
    mb.finish_function(f).unwrap();

    mb.finish().unwrap()
}

fn demo_rules() -> (TaintRule, PropertyRule) {
    let taint = TaintRule::new("sql-injection")
        .source(CalleeSpec::symbol("Http.ReadParam"))
        .sanitizer(CalleeSpec::symbol("Sql.Escape"))
        .sink(CalleeSpec::symbol("Sql.Execute"));
    let property = PropertyRule::new("insecure-cookie")
        .track_type(TypeSpec::named("Cookie"))
        .property_bool("Secure", PropertyValue::Unflagged, PropertyValue::Flagged)
        .initial(vec![PropertyValue::Flagged])
        .hazard(CalleeSpec::symbol("Response.AddCookie"), worst_case);
    (taint, property)
}

fn list_functions(module: &Module) {
    for function in module.functions() {
        println!("{} ({} params)", function.name(), function.params().len());
    }
}

fn run_report(module: &Module) {
    let (taint, property) = demo_rules();
    let report = Session::new(module)
        .taint_rule(taint)
        .property_rule(property)
        .run();

    println!("Findings:");
    for finding in report.findings() {
        println!("  {finding}");
    }
    if report.findings().is_empty() {
        println!("  (none)");
    }

    if !report.skips().is_empty() {
        println!("Skips:");
        for skip in report.skips() {
            println!("  {skip}");
        }
    }

    let stats = report.stats();
    println!(
        "Analyzed {} functions under {} rules: {} findings, {} skips",
        stats.function_count,
        stats.taint_rule_count + stats.property_rule_count,
        stats.finding_count,
        stats.skip_count
    );
}

fn export_cfg(module: &Module, name: &str) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let function = module
        .function_by_name(name)
        .ok_or_else(|| format!("no function named {name}"))?;
    let cfg = Cfg::build(module, function)?;
    print!("{}", cfg.to_dot(Some(name)));
    Ok(())
}
