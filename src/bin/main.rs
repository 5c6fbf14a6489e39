use std::{
    error::Error,
    fs,
    io::{self, Read, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use tracing::{debug, Level};

/// Compiles a program into the JSON three-address IR.
#[derive(Parser, Debug)]
#[command(name = "chococ", version)]
struct Args {
    /// Source file to compile; standard input is read when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the textual form of the IR instead of JSON
    #[arg(long, conflicts_with = "pretty")]
    text: bool,

    /// Log pipeline progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("failed to run: {error}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .compact()
        .init();
}

/// Returns `Ok(false)` if the source failed to compile.
fn run(args: &Args) -> Result<bool, Box<dyn Error>> {
    let (name, src) = match &args.file {
        Some(path) => (path.display().to_string(), fs::read_to_string(path)?),
        None => {
            let mut src = String::new();
            io::stdin().read_to_string(&mut src)?;
            ("<stdin>".to_owned(), src)
        }
    };
    debug!(file = %name, bytes = src.len(), "read source");

    let program = match choco::compile(&src) {
        Ok(program) => program,
        Err(error) => {
            let (line, col) = line_col(&src, error.span().lo);
            eprintln!("{name}:{line}:{col}: {error}");
            return Ok(false);
        }
    };

    let mut stdout = io::stdout().lock();
    if args.text {
        write!(stdout, "{program}")?;
    } else if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &program)?;
        writeln!(stdout)?;
    } else {
        serde_json::to_writer(&mut stdout, &program)?;
        writeln!(stdout)?;
    }
    Ok(true)
}

/// One-based line and column of the byte offset `pos`.
fn line_col(src: &str, pos: usize) -> (usize, usize) {
    let before = &src[..pos.min(src.len())];
    let line = before.matches('\n').count() + 1;
    let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
    (line, col)
}
