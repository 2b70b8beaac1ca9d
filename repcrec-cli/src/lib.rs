//! `repcli` drives the `repcrec` transaction engine from a command script.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ repcli script.txt
//! begin(T1)
//! T1 begins at time 1
//!
//! W(T1, x1, 101)
//! T1 wrote x1=101 to sites 2
//!
//! end(T1)
//! T1 committed at time 3
//!
//! dump()
//! 1: x2:20, x4:40, x6:60, x8:80, x10:100, x12:120, x14:140, x16:160, x18:180, x20:200
//! 2: x1:101, x2:20, ...
//! ```
//!
//! Without a script (and with a terminal on stdin) it drops into a REPL with
//! command completion, plus `status` and `exit` meta-commands.

pub mod ast;
pub mod rusty;
pub mod session;
pub mod trace;
