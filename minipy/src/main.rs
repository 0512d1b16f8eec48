//! minipy compiler CLI
//!
//! Consumes a JSON-encoded untyped AST produced by the external parser.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use minipy::ast::Program;

#[derive(Parser)]
#[command(name = "minipy", version, about = "Typed Python subset to WebAssembly compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Type check a program AST
    Check {
        /// JSON AST file to check
        file: PathBuf,
    },
    /// Type check and compile a program AST to a WAT module
    Compile {
        /// JSON AST file to compile
        file: PathBuf,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Check { file } => check_file(&file),
        Command::Compile { file, output } => compile_file(&file, output.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_program(path: &PathBuf) -> Result<Program<()>, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&source)?)
}

fn check_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let program = read_program(path)?;

    let mut checker = minipy::types::TypeChecker::new();
    checker.check_program(&program)?;

    println!("✓ {} type checks successfully", path.display());
    Ok(())
}

fn compile_file(
    path: &PathBuf,
    output: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let program = read_program(path)?;
    let wat = minipy::compile(&program)?;

    match output {
        Some(out) => {
            std::fs::write(out, wat)?;
            println!("✓ wrote {}", out.display());
        }
        None => print!("{wat}"),
    }
    Ok(())
}
