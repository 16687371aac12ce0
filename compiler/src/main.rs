// main.rs — rcc command-line driver
//
// Reads a frontend-produced compilation unit (JSON), runs the composition
// pipeline, prints diagnostics, and emits the requested artifact.
//
// Exit codes: 0 on success, 1 when verification reported errors, 2 on
// input/decode failures.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use rcc::compose::{compose, compute_provenance, CompilationUnit};
use rcc::dot::emit_dot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// Verify only; print a summary.
    Verify,
    /// Textual dump of instances and trigger-graph nodes.
    Graph,
    /// Graphviz DOT of the trigger graph.
    Dot,
}

#[derive(Parser, Debug)]
#[command(name = "rcc", version, about = "Relay composition analyzer")]
struct Cli {
    /// Compilation unit (JSON) produced by the frontend.
    unit: PathBuf,

    /// Artifact to emit on stdout.
    #[arg(long, value_enum, default_value = "verify")]
    emit: Emit,

    /// Print the unit's provenance digest.
    #[arg(long)]
    provenance: bool,

    /// Phase timing on stderr.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let text = match fs::read_to_string(&cli.unit) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("rcc: cannot read {}: {e}", cli.unit.display());
            return ExitCode::from(2);
        }
    };
    let unit: CompilationUnit = match serde_json::from_str(&text) {
        Ok(unit) => unit,
        Err(e) => {
            eprintln!("rcc: {} is not a valid compilation unit: {e}", cli.unit.display());
            return ExitCode::from(2);
        }
    };

    if cli.provenance {
        println!("{}", compute_provenance(&unit).hex());
    }

    let result = compose(&unit, cli.verbose);
    for diag in result.diagnostics() {
        eprintln!("{diag}");
    }

    match cli.emit {
        Emit::Verify => {
            if !result.has_errors() {
                println!(
                    "composition verified: {} instances, {} nodes",
                    result.composer.instance_count(),
                    result.composer.node_count()
                );
            }
        }
        Emit::Graph => print!("{}", result.composer),
        Emit::Dot => print!("{}", emit_dot(&result.composer)),
    }

    if result.has_errors() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
