//! Rill CLI: run a script file and print its result.

use std::path::PathBuf;
use std::process;

use rill::vm::Vm;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run a script file
    Run { file: PathBuf },
    /// Evaluate a string
    Eval { code: String },
}

/// CLI options parsed from arguments.
struct Options {
    command: Command,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Rill {} - a small scripting language", VERSION);
    eprintln!();
    eprintln!("Usage: rill [options] <script.rl>");
    eprintln!("       rill [options] -e <code>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -e <code>       Evaluate code and print the result");
    eprintln!("  --disassemble   Print the compiled bytecode instead of running");
}

fn parse_args(args: &[String]) -> Option<Options> {
    let mut disassemble = false;
    let mut command = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--disassemble" => disassemble = true,
            "-e" => {
                let code = args.get(i + 1)?.clone();
                i += 1;
                command = Some(Command::Eval { code });
            }
            arg if arg.starts_with('-') => return None,
            file => {
                command = Some(Command::Run {
                    file: PathBuf::from(file),
                });
            }
        }
        i += 1;
    }

    Some(Options {
        command: command?,
        disassemble,
    })
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(options) = parse_args(&args) else {
        print_usage();
        process::exit(64);
    };

    let mut vm = Vm::new();

    if options.disassemble {
        let result = match &options.command {
            Command::Run { file } => std::fs::read_to_string(file)
                .map_err(rill::error::RillError::from)
                .and_then(|source| rill::disassemble_source(&mut vm, &source)),
            Command::Eval { code } => rill::disassemble_source(&mut vm, code),
        };
        match result {
            Ok(listing) => print!("{}", listing),
            Err(err) => {
                eprintln!("{}", err);
                process::exit(1);
            }
        }
        return;
    }

    let result = match &options.command {
        Command::Run { file } => rill::run_file(&mut vm, file),
        Command::Eval { code } => rill::run_source(&mut vm, code),
    };

    match result {
        Ok(value) => println!("{}", vm.display_value(value)),
        Err(err) => {
            eprintln!("{}", err);
            process::exit(1);
        }
    }
}
