//! `scptdecompile` — decompiles compiled AppleScript bytecode back into
//! readable source.
//!
//! Usage summary:
//! - With **no args** or `-h/--help`, print usage.
//! - With `-v/--version`, print the build-target + version string.
//! - Otherwise the first non-flag argument is the path to decompile;
//!   `-c/--comments`, `-f/--force`, `-d/--debug` and `--analyzer <name>`
//!   steer the Driver/Printer as described in the usage text.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use scpt_decompiler::analyzer::{self, BaseAnalyzer};
use scpt_decompiler::dictionary::BuiltinDictionary;
use scpt_decompiler::driver::{self, DriveOutcome};
use scpt_decompiler::loader::{FixtureLoader, Loader};
use scpt_decompiler::opcodes::BuiltinOpcodeTable;
use scpt_decompiler::printer::Printer;

/// Runtime version string, printed by `--version` and included in help text.
const VERSION: &str = "0.1.0";

/// Parsed command-line options. Plain fields threaded explicitly into the
/// Driver and Printer; there is no global/ambient configuration state.
struct Cli {
    path: String,
    comments: bool,
    force: bool,
    debug: bool,
    analyzer: Option<String>,
}

fn usage() -> String {
    format!(
        r#"scptdecompile v{VERSION}

Usage:
    scptdecompile [options] <script.scpt>

Arguments:
    <script.scpt>
        Path to a compiled AppleScript bytecode file to decompile.

Options:
    -c, --comments
        Emit a "-- <hex offset> <mnemonic>" comment before every
        instruction's output.
    -f, --force
        Swallow per-handler decompilation errors instead of aborting;
        recurse into script-block-shaped entries.
    -d, --debug
        Trace the value stack and mnemonic to standard error before
        each instruction runs.
    --analyzer <name>
        Rewrite expressions with a built-in analyzer ("naive-string",
        "shift100") instead of printing the decompiler's raw output.
    -h, --help
        Show this help message and exit.
    -v, --version
        Show the runtime version."#
    )
}

/// Parses argv (excluding the program name) into a [`Cli`], or `Err` with a
/// message to print to stderr before exiting 1.
fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut path = None;
    let mut comments = false;
    let mut force = false;
    let mut debug = false;
    let mut analyzer = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--comments" => comments = true,
            "-f" | "--force" => force = true,
            "-d" | "--debug" => debug = true,
            "--analyzer" => {
                i += 1;
                let name = args
                    .get(i)
                    .ok_or_else(|| "--analyzer requires a name".to_string())?;
                analyzer = Some(name.clone());
            }
            other if path.is_none() => path = Some(other.to_string()),
            other => return Err(format!("unexpected argument: {other}")),
        }
        i += 1;
    }

    let path = path.ok_or_else(|| "missing <script.scpt> argument".to_string())?;
    Ok(Cli {
        path,
        comments,
        force,
        debug,
        analyzer,
    })
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || args[0] == "-h" || args[0] == "--help" {
        println!("{}", usage());
        return ExitCode::SUCCESS;
    }

    if args[0] == "-v" || args[0] == "--version" {
        println!(
            "scptdecompile-build-{}-{}: v{VERSION}",
            env::consts::OS,
            env::consts::ARCH
        );
        return ExitCode::SUCCESS;
    }

    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let analyzer: Box<dyn analyzer::Analyzer> = match &cli.analyzer {
        Some(name) => match analyzer::lookup(name) {
            Some(a) => a,
            None => {
                eprintln!("error: unknown analyzer '{name}'");
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(BaseAnalyzer),
    };

    let loader = FixtureLoader;
    let root = match loader.load(Path::new(&cli.path)) {
        Ok(root) => root,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let opcodes = BuiltinOpcodeTable;
    let result = match driver::drive(&root, &opcodes, cli.comments, cli.force, cli.debug) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let dictionary = BuiltinDictionary;
    let printer = Printer::new(&dictionary, analyzer.as_ref());

    println!("-- {}", cli.path);
    for outcome in &result.order {
        match outcome {
            DriveOutcome::Handler(index) => {
                let handler = &result.script.handlers[*index];
                for line in driver::handler_header(*index, handler) {
                    println!("{line}");
                }
                println!("{}", printer.print_handler(handler, 0));
                println!();
            }
            DriveOutcome::Skipped(index) => println!("{}", result.skipped[*index].diagnostic()),
        }
    }

    ExitCode::SUCCESS
}
