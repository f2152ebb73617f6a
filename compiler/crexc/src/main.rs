//! crex CLI: preprocess C files through the regex-driven lexer.
//!
//! Default mode writes the preprocessed text to stdout; `--tokens`
//! dumps the emitted token stream one per line in the
//! `path:line:col: KIND -> "text"` shape. The exit code is 0 only when
//! no file produced an error diagnostic.

mod tracing_setup;

use crex_lexer::TokenKind;
use crex_preproc::{PreprocError, TranslationUnit};

fn main() {
    tracing_setup::init();

    let args: Vec<String> = std::env::args().collect();
    let mut dump_tokens = false;
    let mut paths: Vec<String> = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--tokens" | "-t" => dump_tokens = true,
            "--help" | "-h" => {
                print_usage();
                return;
            }
            _ if arg.starts_with('-') => {
                eprintln!("unknown option: {arg}");
                std::process::exit(2);
            }
            _ => paths.push(arg.clone()),
        }
    }

    if paths.is_empty() {
        print_usage();
        std::process::exit(2);
    }

    let mut failed = false;
    for path in &paths {
        match run_file(path, dump_tokens) {
            Ok(true) => {}
            Ok(false) => failed = true,
            Err(err) => {
                eprintln!("{err}");
                failed = true;
            }
        }
    }
    if failed {
        std::process::exit(1);
    }
}

fn print_usage() {
    eprintln!("Usage: crex [--tokens] <file.c>...");
    eprintln!();
    eprintln!("  --tokens, -t   dump the preprocessed token stream");
    eprintln!("  --help, -h     show this help");
}

/// Preprocess one file; `Ok(true)` means no error diagnostics.
fn run_file(path: &str, dump_tokens: bool) -> Result<bool, PreprocError> {
    let mut unit = TranslationUnit::open(path)?;

    if let Err(err) = unit.parse() {
        // Fatal diagnostics are already on stderr via the queue.
        if !matches!(err, PreprocError::Fatal(_)) {
            eprintln!("{err}");
        }
        return Ok(false);
    }

    if dump_tokens {
        for tok in unit.output() {
            if tok.kind.is_trivia() || tok.kind == TokenKind::Newline {
                continue;
            }
            println!(
                "{path}:{}:{}: {} -> \"{}\"",
                tok.line,
                tok.col,
                tok.kind.name(),
                tok.text.escape_default()
            );
        }
    } else {
        print!("{}", unit.output_text());
    }

    Ok(!unit.diagnostics().has_errors())
}
