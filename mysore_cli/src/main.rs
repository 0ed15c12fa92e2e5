//! The MysoreScript driver: run a file, serve the REPL, report timing
//! and heap statistics.

mod args;
mod timing;

use args::{parse_args, usage, DriverArgs};
use mysore_gc::{collect, heap_stats, init_heap, GcConfig};
use mysore_interp::Context;
use mysore_parser::{parse, Statements};
use std::io::{BufRead, Write};
use std::process::ExitCode;
use timing::PhaseTimer;

fn main() -> ExitCode {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&raw) {
        Ok(options) => options,
        Err(error) => {
            eprintln!("mysore: {}", error);
            eprintln!("{}", usage("mysore"));
            return ExitCode::from(2);
        }
    };
    if options.help {
        println!("{}", usage("mysore"));
        return ExitCode::SUCCESS;
    }

    run(&options)
}

fn run(options: &DriverArgs) -> ExitCode {
    let timer = PhaseTimer::new(options.timing);

    // The heap must exist before the first object is allocated.
    let setup = timer.start();
    init_heap(GcConfig::default());
    let mut context = Context::new();
    // Every accepted statement block is retained for the session:
    // closures and method tables borrow their declaring nodes.
    let mut session_asts: Vec<Statements> = Vec::new();
    timer.log_since(setup, "Setup");

    if let Some(path) = &options.file {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(error) => {
                eprintln!("mysore: {}: {}", path.display(), error);
                return ExitCode::FAILURE;
            }
        };

        let parsing = timer.start();
        let ast = match parse(&source) {
            Ok(ast) => ast,
            Err(error) => {
                eprintln!("{}", error.render(&source));
                return ExitCode::FAILURE;
            }
        };
        timer.log_since(parsing, "Parsing program");

        let executing = timer.start();
        let result = context.interpret(&ast);
        timer.log_since(executing, "Executing program");
        session_asts.push(ast);
        if let Err(error) = result {
            eprintln!("error: {}", error);
            return ExitCode::FAILURE;
        }
    }

    if options.repl {
        repl(&mut context, &mut session_asts, timer);
    }

    if options.memstats {
        print_memstats();
    }

    ExitCode::SUCCESS
}

/// Read-evaluate loop: one statement block per line, empty line exits.
fn repl(context: &mut Context, session_asts: &mut Vec<Statements>, timer: PhaseTimer) {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        // A quiescent point: no interpreter frames are live, so a full
        // collection is safe here.
        let collecting = timer.start();
        collect();
        timer.log_since(collecting, "Garbage collection");

        print!("\nMysoreScript> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => return,
        };
        if line.is_empty() {
            return;
        }

        let parsing = timer.start();
        let ast = match parse(&line) {
            Ok(ast) => ast,
            Err(error) => {
                eprintln!("{}", error.render(&line));
                continue;
            }
        };
        timer.log_since(parsing, "Parsing program");

        let executing = timer.start();
        let result = context.interpret(&ast);
        timer.log_since(executing, "Executing program");
        if let Err(error) = result {
            eprintln!("error: {}", error);
        }
        // Retained even after an error: closures and classes from the
        // failed block may already be reachable.
        session_asts.push(ast);
    }
}

fn print_memstats() {
    let stats = heap_stats();
    eprintln!("Allocated {} bytes during execution.", stats.total_allocated);
    eprintln!("GC heap size: {} bytes.", stats.heap_bytes);
    collect();
    eprintln!(
        "After collection, GC heap size: {} bytes.",
        heap_stats().heap_bytes
    );
}
