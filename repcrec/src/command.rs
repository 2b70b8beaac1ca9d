use crate::site::variable::VarId;
use crate::site::SiteId;

/// One driver command, as dispatched by
/// [`TransactionManager::exec`](crate::txn::manager::TransactionManager::exec).
/// The driver crate parses `name(arg, ...)` lines into these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `begin(T)`: start a read-write transaction.
    Begin(String),
    /// `beginRO(T)`: start a read-only snapshot transaction.
    BeginRo(String),
    /// `R(T, x)`: read a variable.
    Read(String, VarId),
    /// `W(T, x, v)`: write an integer value.
    Write(String, VarId, i64),
    /// `end(T)`: commit, or finalize a pending abort.
    End(String),
    /// `fail(s)`: take a site down.
    Fail(SiteId),
    /// `recover(s)`: bring a site back up.
    Recover(SiteId),
    /// `dump()`: print committed state of every copy.
    Dump,
}
