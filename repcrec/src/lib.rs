//! `repcrec` is a replicated concurrency control and recovery engine: ten
//! in-process storage sites replicate twenty integer variables, read-write
//! transactions run under strict two-phase locking with available-copies
//! writes, read-only transactions read multiversion snapshots, and a
//! wait-for graph aborts the youngest member of any deadlock cycle. Sites
//! can fail and recover; blocked work parks in a queue and is retried when
//! the world changes.
//!
//! The engine is single-threaded and event-driven: a driver feeds it one
//! command per logical tick and prints the events it emits.
//!
//! ## Getting started
//!
//! ```rust
//! use repcrec::command::Command;
//! use repcrec::error::CResult;
//! use repcrec::txn::manager::TransactionManager;
//!
//! fn main() -> CResult<()> {
//!     let mut tm = TransactionManager::new();
//!     let script = [
//!         Command::Begin("T1".to_string()),
//!         Command::Write("T1".to_string(), "x1".parse()?, 101),
//!         Command::End("T1".to_string()),
//!         Command::Dump,
//!     ];
//!     for (tick, command) in script.iter().enumerate() {
//!         tm.exec(command, tick as u64 + 1);
//!         for event in tm.drain_events() {
//!             println!("{}", event);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod error;
pub mod event;
pub mod site;
pub mod txn;

/// A logical timestamp. The driver hands the engine one monotonically
/// increasing tick per command; commit times and snapshot reads are expressed
/// in ticks.
pub type Tick = u64;
