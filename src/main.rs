//! Duplex CLI - compile and run a program from a file or stdin

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::process;

use duplex::codegen::provided::PROVIDED_VERSION;
use duplex::pipeline::{self, CompileOptions, DEFAULT_GC_THRESHOLD};
use duplex::{render_error, Colors, Error, ExitStatus, Outcome, SourceMap};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: duplex [options] [FILE]

Reads the program from stdin when FILE is omitted.

Options:
  -h, --help            Print this help message
  --no-opt              Skip call compaction
  --no-gc               Never collect the heap
  --gc-threshold <N>    Allocations between collections (default: 4096)
  --dump-ir             Print the lowered IR and exit
  --dump-cps            Print the annotated CPS program and exit

Set DUPLEX_LOG (e.g. DUPLEX_LOG=duplex=debug) to enable pipeline logging.";

enum Dump {
    Ir,
    Cps,
}

struct Cli {
    options: CompileOptions,
    dump: Option<Dump>,
    file: Option<String>,
}

fn parse_args() -> Result<Cli, String> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        println!("{}\n\nProvided names: version {}", USAGE, PROVIDED_VERSION);
        process::exit(0);
    }

    let optimize = !args.contains("--no-opt");
    let gc = !args.contains("--no-gc");
    let gc_threshold = args
        .opt_value_from_str("--gc-threshold")
        .map_err(|e| e.to_string())?
        .unwrap_or(DEFAULT_GC_THRESHOLD);
    let dump = match (args.contains("--dump-ir"), args.contains("--dump-cps")) {
        (true, true) => return Err("--dump-ir and --dump-cps are exclusive".to_string()),
        (true, false) => Some(Dump::Ir),
        (false, true) => Some(Dump::Cps),
        (false, false) => None,
    };
    let file = args.opt_free_from_str().map_err(|e| e.to_string())?;

    let rest = args.finish();
    if !rest.is_empty() {
        return Err(format!("unexpected arguments: {:?}", rest));
    }

    Ok(Cli {
        options: CompileOptions {
            optimize,
            gc,
            gc_threshold,
        },
        dump,
        file,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DUPLEX_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_source(file: Option<&str>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut source = String::new();
            io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn execute(cli: &Cli, source: &str) -> Result<ExitStatus, Error> {
    match cli.dump {
        Some(Dump::Ir) => {
            println!("{}", pipeline::lower_source(source)?);
            Ok(ExitStatus(0))
        }
        Some(Dump::Cps) => {
            let (expr, _) = pipeline::cps_source(source, &cli.options)?;
            println!("{}", expr);
            Ok(ExitStatus(0))
        }
        None => {
            let (outcome, _) = pipeline::run(source, &cli.options, io::stdout().lock())?;
            if let Outcome::Uncaught(exception) = &outcome {
                eprintln!("uncaught exception: {}", exception);
            }
            Ok(ExitStatus::from_outcome(&outcome))
        }
    }
}

fn main() {
    init_tracing();

    let cli = match parse_args() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, USAGE);
            process::exit(2);
        }
    };

    let source = match read_source(cli.file.as_deref()) {
        Ok(source) => source,
        Err(e) => {
            eprintln!(
                "error: could not read {}: {}",
                cli.file.as_deref().unwrap_or("stdin"),
                e
            );
            process::exit(2);
        }
    };

    let colors = Colors::new(io::stderr().is_terminal());
    match execute(&cli, &source) {
        Ok(status) => process::exit(status.code()),
        Err(e) => {
            let source_map = SourceMap::new(&source);
            eprint!(
                "{}",
                render_error(&e, &source_map, cli.file.as_deref(), &colors)
            );
            process::exit(1);
        }
    }
}
