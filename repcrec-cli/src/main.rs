use std::fs::File;
use std::io::{stdin, BufReader, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use repcli::session::Session;
use repcli::trace;

#[derive(Debug, Parser, PartialEq)]
#[command(version, author, about)]
pub struct Args {
    #[clap(short, long, help = "debug model")]
    debug: bool,

    /// Command script to run; stdin when absent.
    file: Option<PathBuf>,

    /// quiet model, no echo of script lines
    #[clap(long = "quiet", short = 'q', default_value = "false")]
    quiet: bool,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Log directory, default '$HOME/.repcli'
    #[clap(long)]
    log_dir: Option<String>,

    #[clap(short = 'n', long, help = "Force non-interactive mode", default_value = "false")]
    non_interactive: bool,

    #[clap(short = 'e', long, require_equals = true, help = "Script to execute inline")]
    query: Option<String>,
}

/// CMD like:
///     repcli script.txt
///     repcli --query="begin(T1)"
///     repcli            ==>  REPL when stdin is a terminal
pub fn main() -> Result<()> {
    let args = Args::parse();
    if args.debug {
        println!("{:?}", args);
    }

    let log_dir = args.log_dir.clone().unwrap_or_else(|| {
        format!("{}/.repcli", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
    });
    trace::init_logging(&log_dir, &args.log_level)?;
    info!("repcli start args: {:?}", &args);

    let is_repl = stdin().is_terminal()
        && !args.non_interactive
        && args.query.is_none()
        && args.file.is_none();

    let mut session = Session::new(is_repl, args.quiet);
    if is_repl {
        session.handle_repl();
        return Ok(());
    }

    match (args.file, args.query) {
        (Some(path), _) => {
            let file =
                File::open(&path).with_context(|| format!("cannot open script {:?}", path))?;
            session.handle_reader(BufReader::new(file))?;
        }
        (None, Some(query)) => session.handle_reader(std::io::Cursor::new(query))?,
        (None, None) => session.handle_reader(stdin().lock())?,
    }

    Ok(())
}
