pub mod manager;
pub mod waits_for;


use std::collections::BTreeSet;

use serde_derive::{Deserialize, Serialize};

use crate::site::variable::VarId;
use crate::site::SiteId;
use crate::Tick;

/// Lifecycle of a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnStatus {
    /// Created, no operation executed yet.
    Ready,
    /// At least one operation executed.
    Running,
    /// Last operation deferred to the reprocessing queue.
    Blocked,
    /// Doomed (deadlock victim or touched a failed site); finalized at `end`.
    Aborted,
    /// Terminal, only observed transiently while `end` runs.
    Committed,
}

/// A live transaction as tracked by the transaction manager.
#[derive(Clone, Debug)]
pub struct Transaction {
    pub id: String,
    pub status: TxnStatus,
    pub start_time: Tick,
    pub read_only: bool,
    /// Sites this transaction has read from or written to since it began.
    /// Snapshot reads never mark a site.
    pub sites_accessed: BTreeSet<SiteId>,
}

impl Transaction {
    pub fn new(id: &str, start_time: Tick, read_only: bool) -> Self {
        Transaction {
            id: id.to_string(),
            status: TxnStatus::Ready,
            start_time,
            read_only,
            sites_accessed: BTreeSet::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.status, TxnStatus::Aborted | TxnStatus::Committed)
    }
}

/// A deferred operation waiting in the reprocessing queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub txn: String,
    /// Original submission tick. Retries keep it so conflict ordering between
    /// deferred instructions never changes.
    pub time: Tick,
    pub kind: InstructionKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    Read { var: VarId },
    Write { var: VarId, value: i64 },
}

impl Instruction {
    pub fn read(txn: &str, var: VarId, time: Tick) -> Self {
        Instruction { txn: txn.to_string(), time, kind: InstructionKind::Read { var } }
    }

    pub fn write(txn: &str, var: VarId, value: i64, time: Tick) -> Self {
        Instruction { txn: txn.to_string(), time, kind: InstructionKind::Write { var, value } }
    }

    pub fn var(&self) -> VarId {
        match self.kind {
            InstructionKind::Read { var } | InstructionKind::Write { var, .. } => var,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, InstructionKind::Write { .. })
    }
}
