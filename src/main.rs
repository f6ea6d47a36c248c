//! The CLI shell. Positional arguments are source file paths; with none,
//! the program is read from standard input. For each input: a fresh
//! [`Interpreter`] is built, the source is parsed into the operator table
//! and rule database, the walker runs to fixpoint starting from the
//! `main` subject, and the normal form is printed to standard error. Any
//! fatal error aborts with a non-zero exit status.

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser as ClapParser;

use bertrand::common::source::Source;
use bertrand::config::{Config, DEFAULT_LIBRARY_DIR};
use bertrand::Interpreter;

/// `bertrand` — a term-rewriting interpreter for an extensible operator
/// language.
#[derive(Debug, ClapParser)]
#[command(name = "bertrand", version, about)]
struct Args {
    /// Source files to load and run. With none given, reads a single
    /// program from standard input.
    paths: Vec<PathBuf>,

    /// Equivalent to a leading `#trace` directive: logs every fired rule
    /// at `info` level instead of `trace`.
    #[arg(short = 'v', long = "trace")]
    trace: bool,

    /// Equivalent to `#quiet`: suppresses the "fired rule" log line.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Last-resort search directory for `#include path`. Defaults to
    /// `BERTRAND_LIBRARY_PATH`, or a compile-time constant if that
    /// variable is unset.
    #[arg(long = "library-path")]
    library_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::default();
    config.trace = args.trace;
    config.quiet = args.quiet;
    if let Some(path) = args.library_path {
        config.library_path = path;
    }

    let sources: Vec<std::io::Result<Source>> = if args.paths.is_empty() {
        vec![Source::stdin()]
    } else {
        args.paths.iter().map(|p| Source::path(p)).collect()
    };

    for source in sources {
        let source = match source {
            Ok(s) => s,
            Err(e) => {
                eprintln!("bertrand: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let mut interpreter = Interpreter::new(config.clone());
        if let Err(e) = interpreter.load_source(Rc::new(source)) {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
        match interpreter.run() {
            Ok(result) => eprintln!("{}", interpreter.print(&result)),
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
