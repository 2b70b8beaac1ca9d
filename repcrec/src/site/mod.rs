pub mod lock;
pub mod manager;
pub mod variable;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use log::debug;
use serde_derive::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::site::lock::{Lock, LockKind};
use crate::site::variable::{VarId, Variable};
use crate::Tick;

/// Number of sites in the fixed topology, named `1`..`10`.
pub const NUM_SITES: u8 = 10;

/// A site name. Sites are always iterated in numeric order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiteId(u8);

impl SiteId {
    pub fn new(n: u8) -> CResult<Self> {
        if n == 0 || n > NUM_SITES {
            return Err(Error::invalid_input(format!(
                "site {} out of range 1..={}",
                n, NUM_SITES
            )));
        }
        Ok(SiteId(n))
    }

    /// Infallible constructor for ids known to be in range (topology code and
    /// tests). Wraps into range rather than panicking.
    pub(crate) fn of(n: u8) -> Self {
        debug_assert!(n >= 1 && n <= NUM_SITES);
        SiteId(n.clamp(1, NUM_SITES))
    }

    pub fn all() -> impl Iterator<Item = SiteId> {
        (1..=NUM_SITES).map(SiteId)
    }
}

impl Display for SiteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SiteId {
    type Err = Error;

    fn from_str(s: &str) -> CResult<Self> {
        SiteId::new(s.parse::<u8>()?)
    }
}

/// Availability of a site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStatus {
    Available,
    Failed,
}

/// One storage site: the variable copies it holds and their lock table.
///
/// All methods take `&mut self` or `&self` directly; the engine is
/// single-threaded and serialized by the command stream, so there is nothing
/// to synchronize.
pub struct Site {
    pub id: SiteId,
    pub status: SiteStatus,
    variables: BTreeMap<VarId, Variable>,
    lock_table: BTreeMap<VarId, Vec<Lock>>,
}

impl Site {
    /// Builds the site with its share of the topology: every even variable,
    /// plus the odd ones homed here.
    pub fn new(id: SiteId) -> Self {
        let variables = VarId::all()
            .filter(|var| var.lives_on(id))
            .map(|var| (var, Variable::new(var)))
            .collect();
        Site { id, status: SiteStatus::Available, variables, lock_table: BTreeMap::new() }
    }

    pub fn is_available(&self) -> bool {
        self.status == SiteStatus::Available
    }

    pub fn variable(&self, var: VarId) -> Option<&Variable> {
        self.variables.get(&var)
    }

    fn locks(&self, var: VarId) -> &[Lock] {
        self.lock_table.get(&var).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True iff no other transaction holds a write lock on `var`.
    pub fn can_acquire_read_lock(&self, txn: &str, var: VarId) -> bool {
        self.locks(var)
            .iter()
            .all(|lock| lock.held_by(txn) || lock.kind != LockKind::Write)
    }

    /// Appends a read lock unless `txn` already holds any lock on `var`.
    pub fn acquire_read_lock(&mut self, txn: &str, var: VarId) {
        let locks = self.lock_table.entry(var).or_default();
        if locks.iter().any(|lock| lock.held_by(txn)) {
            return;
        }
        debug!("site {}: {} read-locks {}", self.id, txn, var);
        locks.push(Lock::read(var, txn));
    }

    /// True iff no other transaction holds any lock on `var`.
    pub fn can_acquire_write_lock(&self, txn: &str, var: VarId) -> bool {
        self.locks(var).iter().all(|lock| lock.held_by(txn))
    }

    /// Appends a write lock, or promotes `txn`'s existing lock in place.
    pub fn acquire_write_lock(&mut self, txn: &str, var: VarId) {
        let locks = self.lock_table.entry(var).or_default();
        match locks.iter_mut().find(|lock| lock.held_by(txn)) {
            Some(lock) => lock.kind = LockKind::Write,
            None => locks.push(Lock::write(var, txn)),
        }
        debug!("site {}: {} write-locks {}", self.id, txn, var);
    }

    /// Whether a locking read by `txn` can be served here right now.
    pub fn can_read(&self, txn: &str, var: VarId) -> bool {
        self.is_available()
            && self.variables.get(&var).map_or(false, |v| v.readable)
            && self.can_acquire_read_lock(txn, var)
    }

    /// Whether a snapshot read can be served here (no locks involved).
    pub fn can_read_snapshot(&self, var: VarId) -> bool {
        self.is_available() && self.variables.get(&var).map_or(false, |v| v.readable)
    }

    /// Whether this site is an eligible target for a write to `var`. Lock
    /// conflicts are checked separately by the site manager.
    pub fn can_write(&self, var: VarId) -> bool {
        self.is_available() && self.variables.contains_key(&var)
    }

    /// Buffers an uncommitted value under an already-acquired write lock.
    pub fn stage_write(&mut self, var: VarId, value: i64) {
        if let Some(variable) = self.variables.get_mut(&var) {
            variable.value = value;
        }
    }

    /// The site goes down: every lock is lost, buffered writes are wiped back
    /// to committed state, and replicated copies stop being readable until a
    /// later commit lands here. Committed values and version histories
    /// survive.
    pub fn fail(&mut self) {
        self.status = SiteStatus::Failed;
        self.lock_table.clear();
        for variable in self.variables.values_mut() {
            variable.revert();
            if variable.replicated {
                variable.readable = false;
            }
        }
    }

    /// The site comes back up. Locks stay cleared; replicated copies stay
    /// non-readable until overwritten and committed.
    pub fn recover(&mut self) {
        self.status = SiteStatus::Available;
    }

    /// Commits `txn`'s write-locked values at `now` and releases all of its
    /// locks. No-op while the site is down.
    pub fn commit(&mut self, txn: &str, now: Tick) {
        if !self.is_available() {
            return;
        }
        let written: Vec<VarId> = self
            .lock_table
            .values()
            .flatten()
            .filter(|lock| lock.held_by(txn) && lock.kind == LockKind::Write)
            .map(|lock| lock.var)
            .collect();
        for var in written {
            if let Some(variable) = self.variables.get_mut(&var) {
                variable.commit(now);
                debug!("site {}: committed {}={} at tick {}", self.id, var, variable.value, now);
            }
        }
        self.release_locks(txn);
    }

    /// Rolls back every variable `txn` holds a lock on and releases the
    /// locks. Runs whether or not the site is up.
    pub fn abort(&mut self, txn: &str) {
        let locked: Vec<VarId> = self
            .lock_table
            .values()
            .flatten()
            .filter(|lock| lock.held_by(txn))
            .map(|lock| lock.var)
            .collect();
        for var in locked {
            if let Some(variable) = self.variables.get_mut(&var) {
                variable.revert();
            }
        }
        self.release_locks(txn);
    }

    fn release_locks(&mut self, txn: &str) {
        self.lock_table.retain(|_, locks| {
            locks.retain(|lock| !lock.held_by(txn));
            !locks.is_empty()
        });
    }

    /// Every transaction holding any lock on `var` here.
    pub fn locking_txns(&self, var: VarId) -> BTreeSet<String> {
        self.locks(var).iter().map(|lock| lock.txn.clone()).collect()
    }

    /// Whether `txn` holds any lock on this site.
    pub fn holds_any_lock(&self, txn: &str) -> bool {
        self.lock_table.values().flatten().any(|lock| lock.held_by(txn))
    }

    /// Committed state of every copy, in variable index order.
    pub fn committed_state(&self) -> Vec<(VarId, i64)> {
        self.variables.iter().map(|(var, v)| (*var, v.committed_value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> VarId {
        name.parse().expect("test variable")
    }

    #[test]
    fn topology_per_site() {
        let site1 = Site::new(SiteId::of(1));
        let site2 = Site::new(SiteId::of(2));
        // Even variables everywhere; x1 (odd) is homed on site 1 + 1 mod 10 = 2.
        assert!(site1.variable(var("x2")).is_some());
        assert!(site1.variable(var("x1")).is_none());
        assert!(site2.variable(var("x1")).is_some());
        // 10 even + 2 odd (x1, x11) on site 2.
        assert_eq!(site2.committed_state().len(), 12);
        assert_eq!(site1.committed_state().len(), 10);
    }

    #[test]
    fn shared_reads_exclusive_writes() {
        let mut site = Site::new(SiteId::of(3));
        let x4 = var("x4");

        assert!(site.can_acquire_read_lock("T1", x4));
        site.acquire_read_lock("T1", x4);
        assert!(site.can_acquire_read_lock("T2", x4));
        site.acquire_read_lock("T2", x4);

        // Two read holders block any writer, including each of them.
        assert!(!site.can_acquire_write_lock("T1", x4));
        assert!(!site.can_acquire_write_lock("T3", x4));
    }

    #[test]
    fn promotion_in_place_and_coalescing() {
        let mut site = Site::new(SiteId::of(3));
        let x4 = var("x4");

        site.acquire_read_lock("T1", x4);
        site.acquire_read_lock("T1", x4);
        assert_eq!(site.locking_txns(x4).len(), 1);

        // Sole holder may promote; the record mutates rather than duplicates.
        assert!(site.can_acquire_write_lock("T1", x4));
        site.acquire_write_lock("T1", x4);
        assert!(!site.can_acquire_read_lock("T2", x4));
        assert_eq!(site.locking_txns(x4), BTreeSet::from(["T1".to_string()]));
    }

    #[test]
    fn fail_clears_locks_and_readability() {
        let mut site = Site::new(SiteId::of(5));
        let x2 = var("x2");

        site.acquire_write_lock("T1", x2);
        site.stage_write(x2, 200);
        site.fail();

        assert_eq!(site.status, SiteStatus::Failed);
        assert!(site.locking_txns(x2).is_empty());
        let copy = site.variable(x2).expect("x2 on every site");
        assert!(!copy.readable);
        // Buffered write wiped, committed state preserved.
        assert_eq!(copy.value, 20);
        assert_eq!(copy.committed_value, 20);
    }

    #[test]
    fn recover_keeps_replicated_unreadable_until_commit() {
        let mut site = Site::new(SiteId::of(4));
        let x2 = var("x2");
        let x3 = var("x3"); // odd, homed here

        site.fail();
        site.recover();

        assert!(site.is_available());
        assert!(!site.can_read("T1", x2));
        assert!(!site.can_read_snapshot(x2));
        // Non-replicated copies come back readable immediately.
        assert!(site.can_read("T1", x3));

        site.acquire_write_lock("T1", x2);
        site.stage_write(x2, 22);
        site.commit("T1", 7);
        assert!(site.can_read("T2", x2));
        assert_eq!(site.variable(x2).expect("x2").committed_at, 7);
    }

    #[test]
    fn commit_skips_failed_site() {
        let mut site = Site::new(SiteId::of(6));
        let x8 = var("x8");
        site.acquire_write_lock("T1", x8);
        site.stage_write(x8, 888);
        site.status = SiteStatus::Failed;

        site.commit("T1", 9);
        assert_eq!(site.variable(x8).expect("x8").committed_value, 80);
    }

    #[test]
    fn abort_restores_working_values() {
        let mut site = Site::new(SiteId::of(6));
        let x8 = var("x8");
        site.acquire_write_lock("T1", x8);
        site.stage_write(x8, 888);

        site.abort("T1");
        let copy = site.variable(x8).expect("x8");
        assert_eq!(copy.value, 80);
        assert!(site.locking_txns(x8).is_empty());
    }
}
