//! Tamarin CLI: run a script, evaluate a snippet, or start the REPL.

use std::env;
use std::fs;
use std::process;

use tamarin::repl::Repl;
use tamarin::{ExecutionMode, TamarinError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Start the REPL
    Repl,
    /// Run a script file
    Run { file: String },
    /// Evaluate a string and print the result
    Eval { code: String },
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    mode: ExecutionMode,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Tamarin {} - a small scripting language", VERSION);
    eprintln!();
    eprintln!("Usage: tamarin [options] [script.tam]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>       Evaluate code and print the result");
    eprintln!("  --tree-walk     Use the tree-walking evaluator instead of the VM");
    eprintln!("  --disassemble   Print bytecode before running (VM mode only)");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("With no script, tamarin starts an interactive REPL.");
}

fn parse_args() -> Options {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = Options {
        command: Command::Repl,
        mode: ExecutionMode::Bytecode,
        disassemble: false,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--tree-walk" => options.mode = ExecutionMode::TreeWalk,
            "--disassemble" => options.disassemble = true,
            "-e" | "--eval" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("-e requires an argument");
                    print_usage();
                    process::exit(64);
                }
                options.command = Command::Eval {
                    code: args[i].clone(),
                };
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                print_usage();
                process::exit(64);
            }
            file => {
                options.command = Command::Run {
                    file: file.to_string(),
                };
            }
        }
        i += 1;
    }

    options
}

fn exit_code(error: &TamarinError) -> i32 {
    match error {
        TamarinError::Runtime(_) => 70,
        TamarinError::Io(_) => 74,
        _ => 65,
    }
}

fn main() {
    let options = parse_args();

    match options.command {
        Command::Repl => {
            let user = env::var("USER").unwrap_or_else(|_| "there".to_string());
            println!("Hello {}! This is the Tamarin programming language!", user);
            println!("Feel free to type in commands");
            Repl::new().run();
        }

        Command::Run { file } => {
            let source = match fs::read_to_string(&file) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("Could not read {}: {}", file, err);
                    process::exit(74);
                }
            };
            if let Err(err) = tamarin::run_with_options(&source, options.mode, options.disassemble)
            {
                eprintln!("{}", err);
                process::exit(exit_code(&err));
            }
        }

        Command::Eval { code } => {
            match tamarin::run_with_options(&code, options.mode, options.disassemble) {
                Ok(value) => println!("{}", value.inspect()),
                Err(err) => {
                    eprintln!("{}", err);
                    process::exit(exit_code(&err));
                }
            }
        }
    }
}
