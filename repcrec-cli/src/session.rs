use std::io::BufRead;

use anyhow::Result;
use colored::Colorize;
use log::info;
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};

use repcrec::txn::manager::TransactionManager;
use repcrec::Tick;

use crate::ast;
use crate::rusty::CliHelper;

const DEFAULT_PROMPT: &str = "repcrec";

/// One run of the engine: owns the transaction manager and the tick counter,
/// feeds it parsed commands and prints the events it emits. Batch mode echoes
/// each script line the way the reference driver does; the REPL skips the
/// echo since the user just typed the line.
pub struct Session {
    tm: TransactionManager,
    tick: Tick,
    is_repl: bool,
    quiet: bool,
}

impl Session {
    pub fn new(is_repl: bool, quiet: bool) -> Self {
        if is_repl {
            println!("Welcome to repcli.");
            println!();
        }
        Session { tm: TransactionManager::new(), tick: 0, is_repl, quiet }
    }

    /// Runs every line of a script. Blank lines and `//` comments are
    /// skipped without consuming a tick; a malformed or unknown command
    /// terminates the run.
    pub fn handle_reader<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            self.handle_line(&line?)?;
        }
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<()> {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            return Ok(());
        }
        self.tick += 1;
        if !self.is_repl && !self.quiet {
            println!("{}", trimmed);
        }
        let Some(command) = ast::parse_line(trimmed)? else {
            return Ok(());
        };
        info!("tick {}: {:?}", self.tick, command);
        self.tm.exec(&command, self.tick);
        for event in self.tm.drain_events() {
            println!("{}", event);
        }
        if !self.is_repl && !self.quiet {
            println!();
        }
        Ok(())
    }

    pub fn handle_repl(&mut self) {
        let config = Builder::new()
            .completion_prompt_limit(5)
            .completion_type(CompletionType::Circular)
            .build();
        let mut rl = match Editor::<CliHelper, DefaultHistory>::with_config(config) {
            Ok(rl) => rl,
            Err(err) => {
                eprintln!("{}", format!("cannot start line editor: {}", err).red());
                return;
            }
        };
        rl.set_helper(Some(CliHelper::new()));

        loop {
            match rl.readline(&format!("{} > ", DEFAULT_PROMPT)) {
                Ok(line) => {
                    let _ = rl.add_history_entry(&line);
                    match line.trim() {
                        "exit" | "quit" => break,
                        "status" => {
                            match serde_json::to_string_pretty(&self.tm.status()) {
                                Ok(json) => println!("{}", json),
                                Err(err) => eprintln!("{}", err.to_string().red()),
                            }
                            continue;
                        }
                        _ => {}
                    }
                    // A bad line ends a batch run, but the REPL shrugs it off.
                    if let Err(err) = self.handle_line(&line) {
                        eprintln!("{}", format!("error: {}", err).red());
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", format!("error: {}", err).red());
                    break;
                }
            }
        }
        println!("Bye~");
    }
}
