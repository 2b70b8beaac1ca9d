use std::collections::{BTreeMap, VecDeque};

use log::{debug, info};
use serde_derive::{Deserialize, Serialize};

use crate::command::Command;
use crate::event::{AbortReason, Event};
use crate::site::manager::SiteManager;
use crate::site::variable::VarId;
use crate::site::SiteId;
use crate::txn::waits_for::WaitsFor;
use crate::txn::{Instruction, InstructionKind, Transaction, TxnStatus};
use crate::Tick;

/// Top-level dispatcher owning all engine state: the transaction map, the
/// deferred-instruction queue, the site manager and the wait-for graph. One
/// value lives for the duration of the command stream; every operation runs
/// to completion within its tick or parks an instruction in the queue.
pub struct TransactionManager {
    txns: BTreeMap<String, Transaction>,
    deferred: VecDeque<Instruction>,
    sites: SiteManager,
    waits_for: WaitsFor,
    events: Vec<Event>,
    /// Reentrancy guard: retries triggered from within a reprocessing pass
    /// must not start a nested pass.
    reprocessing: bool,
}

/// A point-in-time diagnostic snapshot of the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Live transactions, blocked ones included.
    pub txns: u64,
    /// Transactions currently parked in the deferred queue.
    pub blocked: u64,
    /// Deferred instructions awaiting retry.
    pub deferred: u64,
    /// Sites currently available.
    pub sites_up: u64,
}

impl TransactionManager {
    pub fn new() -> Self {
        TransactionManager {
            txns: BTreeMap::new(),
            deferred: VecDeque::new(),
            sites: SiteManager::new(),
            waits_for: WaitsFor::new(),
            events: Vec::new(),
            reprocessing: false,
        }
    }

    /// Routes one driver command at its tick. The deferred queue is re-driven
    /// after `end` (inside [`Self::end`]) and after `recover`; recovery
    /// itself only flips the site state.
    pub fn exec(&mut self, command: &Command, now: Tick) {
        match command {
            Command::Begin(txn) => self.begin(txn, now),
            Command::BeginRo(txn) => self.begin_ro(txn, now),
            Command::Read(txn, var) => self.read(txn, *var, now),
            Command::Write(txn, var, value) => self.write(txn, *var, *value, now),
            Command::End(txn) => self.end(txn, now),
            Command::Fail(site) => self.fail(*site),
            Command::Recover(site) => {
                self.recover(*site);
                self.process_deferred();
            }
            Command::Dump => self.dump(),
        }
    }

    /// Drains the observable output lines produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn begin(&mut self, txn: &str, now: Tick) {
        self.txns.insert(txn.to_string(), Transaction::new(txn, now, false));
        self.events.push(Event::Begun { txn: txn.to_string(), read_only: false, time: now });
    }

    pub fn begin_ro(&mut self, txn: &str, now: Tick) {
        self.txns.insert(txn.to_string(), Transaction::new(txn, now, true));
        self.events.push(Event::Begun { txn: txn.to_string(), read_only: true, time: now });
    }

    /// Read `var` for `txn`. Read-only transactions take a snapshot value and
    /// never touch locks, the deferred-conflict scan or the wait-for graph;
    /// read-write transactions go through the full blocking protocol.
    pub fn read(&mut self, txn_id: &str, var: VarId, now: Tick) {
        let Some(txn) = self.txns.get(txn_id) else {
            self.events.push(Event::UnknownTransaction { txn: txn_id.to_string() });
            return;
        };
        if txn.status == TxnStatus::Aborted {
            return;
        }
        let read_only = txn.read_only;
        let start_time = txn.start_time;

        // A deferred write with an older submission tick to the same variable
        // from someone else goes first; the scan runs newest to oldest.
        let conflict = if read_only {
            None
        } else {
            self.deferred
                .iter()
                .rev()
                .find(|ins| {
                    ins.time < now && ins.txn != txn_id && ins.var() == var && ins.is_write()
                })
                .map(|ins| ins.txn.clone())
        };

        let mut served = false;
        match conflict {
            None => {
                let hit = if read_only {
                    self.sites
                        .read_snapshot(var, start_time)
                        .map(|(value, site)| (value, site, Some(start_time)))
                } else {
                    self.sites.read(txn_id, var).map(|(value, site)| (value, site, None))
                };
                match hit {
                    Some((value, site, snapshot)) => {
                        self.mark_executed(txn_id, if read_only { None } else { Some(site) });
                        self.events.push(Event::Read {
                            txn: txn_id.to_string(),
                            var,
                            value,
                            site,
                            snapshot,
                        });
                        served = true;
                    }
                    None if !read_only => {
                        for holder in self.sites.locking_txns(var) {
                            self.waits_for.add_edge(txn_id, &holder);
                        }
                    }
                    None => {}
                }
            }
            Some(conflict) => self.waits_for.add_edge(txn_id, &conflict),
        }

        if !served {
            self.defer(Instruction::read(txn_id, var, now));
        }
        if !read_only {
            self.detect_deadlock(txn_id);
        }
    }

    /// Write `var = value` for `txn` under the available-copies rule. A
    /// deferred instruction on the same variable from another transaction
    /// conflicts, unless that transaction has no outgoing wait-for edges:
    /// then it is parked on site availability and must not stall this
    /// writer.
    pub fn write(&mut self, txn_id: &str, var: VarId, value: i64, now: Tick) {
        let Some(txn) = self.txns.get(txn_id) else {
            self.events.push(Event::UnknownTransaction { txn: txn_id.to_string() });
            return;
        };
        if txn.status == TxnStatus::Aborted {
            return;
        }

        let conflict = self
            .deferred
            .iter()
            .rev()
            .find(|ins| ins.time < now && ins.txn != txn_id && ins.var() == var)
            .map(|ins| ins.txn.clone());
        let tolerated = conflict
            .as_ref()
            .map_or(true, |other| !self.waits_for.is_waiting(other));

        let mut served = false;
        if tolerated {
            let written = self.sites.write(txn_id, var, value);
            if !written.is_empty() {
                if let Some(txn) = self.txns.get_mut(txn_id) {
                    if txn.status != TxnStatus::Aborted {
                        txn.status = TxnStatus::Running;
                    }
                    txn.sites_accessed.extend(written.iter().copied());
                }
                self.events.push(Event::Written {
                    txn: txn_id.to_string(),
                    var,
                    value,
                    sites: written,
                });
                served = true;
            } else {
                for holder in self.sites.locking_txns(var) {
                    self.waits_for.add_edge(txn_id, &holder);
                }
            }
        } else if let Some(conflict) = conflict {
            self.waits_for.add_edge(txn_id, &conflict);
        }

        if !served {
            self.defer(Instruction::write(txn_id, var, value, now));
        }
        self.detect_deadlock(txn_id);
    }

    /// Commit `txn`, or finalize its abort if a site it touched failed since.
    pub fn end(&mut self, txn_id: &str, now: Tick) {
        let Some(txn) = self.txns.get(txn_id) else {
            debug!("end of unknown transaction {}", txn_id);
            return;
        };
        if txn.status == TxnStatus::Aborted {
            self.abort(txn_id, AbortReason::SiteFailure);
        } else {
            self.commit(txn_id, now);
        }
        self.process_deferred();
    }

    /// Take a site down. Locks there evaporate and every read-write
    /// transaction that touched the site is doomed; the abort is finalized at
    /// its `end`.
    pub fn fail(&mut self, site: SiteId) {
        self.sites.fail(site);
        self.events.push(Event::SiteFailed { site });
        for txn in self.txns.values_mut() {
            if txn.is_live() && txn.sites_accessed.contains(&site) {
                info!("{} doomed by failure of site {}", txn.id, site);
                txn.status = TxnStatus::Aborted;
            }
        }
    }

    /// Bring a site back up. Replicated copies there stay non-readable until
    /// a later commit; blocked work is retried by the dispatch loop, not
    /// here.
    pub fn recover(&mut self, site: SiteId) {
        self.sites.recover(site);
        self.events.push(Event::SiteRecovered { site });
    }

    /// Emit the committed state of every copy on every site.
    pub fn dump(&mut self) {
        for (site, entries) in self.sites.dump() {
            self.events.push(Event::DumpSite { site, entries });
        }
    }

    pub fn status(&self) -> Status {
        Status {
            txns: self.txns.len() as u64,
            blocked: self
                .txns
                .values()
                .filter(|txn| txn.status == TxnStatus::Blocked)
                .count() as u64,
            deferred: self.deferred.len() as u64,
            sites_up: self.sites.available_count() as u64,
        }
    }

    /// Read access for tests and diagnostics.
    pub fn sites(&self) -> &SiteManager {
        &self.sites
    }

    pub fn txn(&self, txn_id: &str) -> Option<&Transaction> {
        self.txns.get(txn_id)
    }

    fn mark_executed(&mut self, txn_id: &str, site: Option<SiteId>) {
        if let Some(txn) = self.txns.get_mut(txn_id) {
            if txn.status != TxnStatus::Aborted {
                txn.status = TxnStatus::Running;
            }
            if let Some(site) = site {
                txn.sites_accessed.insert(site);
            }
        }
    }

    /// Parks an instruction in the deferred queue, unless its transaction is
    /// already blocked (a retry that stays blocked keeps its queue slot) or
    /// doomed.
    fn defer(&mut self, ins: Instruction) {
        let Some(txn) = self.txns.get_mut(&ins.txn) else { return };
        if matches!(txn.status, TxnStatus::Blocked | TxnStatus::Aborted) {
            return;
        }
        txn.status = TxnStatus::Blocked;
        self.events.push(Event::Blocked {
            txn: ins.txn.clone(),
            var: ins.var(),
            write: ins.is_write(),
        });
        self.deferred.push_back(ins);
    }

    fn commit(&mut self, txn_id: &str, now: Tick) {
        if let Some(mut txn) = self.txns.remove(txn_id) {
            txn.status = TxnStatus::Committed;
            self.sites.commit(&txn.sites_accessed, txn_id, now);
            self.waits_for.remove(txn_id);
            self.events.push(Event::Committed { txn: txn_id.to_string(), time: now });
        }
    }

    fn abort(&mut self, txn_id: &str, reason: AbortReason) {
        if let Some(txn) = self.txns.remove(txn_id) {
            self.sites.abort(&txn.sites_accessed, txn_id);
            self.waits_for.remove(txn_id);
            self.events.push(Event::Aborted { txn: txn.id, reason });
        }
    }

    /// DFS from the transaction that just blocked. On a cycle, the victim is
    /// the member of the recursion stack with the greatest start time, ties
    /// going to the later-discovered; aborting it frees its waiters.
    fn detect_deadlock(&mut self, seed: &str) {
        let Some(stack) = self.waits_for.find_cycle_from(seed) else { return };
        let mut victim: Option<(String, Tick)> = None;
        for txn_id in &stack {
            if let Some(txn) = self.txns.get(txn_id) {
                if victim.as_ref().map_or(true, |(_, best)| txn.start_time >= *best) {
                    victim = Some((txn_id.clone(), txn.start_time));
                }
            }
        }
        if let Some((victim, _)) = victim {
            self.events.push(Event::Deadlock { victim: victim.clone() });
            self.abort(&victim, AbortReason::Deadlock);
            self.process_deferred();
        }
    }

    /// Retries the deferred queue in FIFO order at the original submission
    /// ticks, repeating passes until a fixed point: nothing executes, aborts
    /// or is dropped. Instructions whose owner is gone are dropped silently;
    /// ones that stay blocked keep their slot.
    fn process_deferred(&mut self) {
        if self.reprocessing {
            return;
        }
        self.reprocessing = true;
        loop {
            let queued = self.deferred.len();
            let emitted = self.events.len();
            let mut index = 0;
            while index < self.deferred.len() {
                let ins = self.deferred[index].clone();
                if !self.txns.contains_key(&ins.txn) {
                    let _ = self.deferred.remove(index);
                    continue;
                }
                match ins.kind {
                    InstructionKind::Read { var } => self.read(&ins.txn, var, ins.time),
                    InstructionKind::Write { var, value } => {
                        self.write(&ins.txn, var, value, ins.time)
                    }
                }
                let still_blocked = self
                    .txns
                    .get(&ins.txn)
                    .map_or(false, |txn| txn.status == TxnStatus::Blocked);
                if still_blocked {
                    index += 1;
                } else {
                    let _ = self.deferred.remove(index);
                }
            }
            if self.deferred.len() == queued && self.events.len() == emitted {
                break;
            }
        }
        self.reprocessing = false;
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
