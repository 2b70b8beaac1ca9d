use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::site::variable::VarId;
use crate::site::{Site, SiteId};
use crate::Tick;

/// Owns the ten sites and fans transaction operations out across them under
/// the available-copies rule. Iteration is always in numeric site order, so
/// every decision (which copy serves a read, which sites take a write) is
/// deterministic for a given command stream.
pub struct SiteManager {
    sites: BTreeMap<SiteId, Site>,
}

impl SiteManager {
    pub fn new() -> Self {
        let sites = SiteId::all().map(|id| (id, Site::new(id))).collect();
        SiteManager { sites }
    }

    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.get(&id)
    }

    fn sites_mut(&mut self) -> impl Iterator<Item = &mut Site> {
        self.sites.values_mut()
    }

    /// Serves a locking read for a read-write transaction: the first site in
    /// numeric order that is up, holds a readable copy, and has no conflicting
    /// write lock. Acquires the read lock there.
    pub fn read(&mut self, txn: &str, var: VarId) -> Option<(i64, SiteId)> {
        for site in self.sites_mut() {
            if site.can_read(txn, var) {
                site.acquire_read_lock(txn, var);
                let value = site.variable(var)?.value;
                return Some((value, site.id));
            }
        }
        None
    }

    /// Serves a snapshot read for a read-only transaction: the first site in
    /// numeric order with a readable copy returns its committed value as of
    /// `at`. No locks are taken.
    pub fn read_snapshot(&self, var: VarId, at: Tick) -> Option<(i64, SiteId)> {
        for site in self.sites.values() {
            if site.can_read_snapshot(var) {
                if let Some(value) = site.variable(var).and_then(|v| v.version_at(at)) {
                    return Some((value, site.id));
                }
            }
        }
        None
    }

    /// Available-copies write: all-or-nothing across the eligible sites.
    /// Returns the sites written, or an empty vector when the variable is
    /// unreachable everywhere or any eligible copy is lock-conflicted.
    pub fn write(&mut self, txn: &str, var: VarId, value: i64) -> Vec<SiteId> {
        let eligible: Vec<SiteId> = self
            .sites
            .values()
            .filter(|site| site.can_write(var))
            .map(|site| site.id)
            .collect();
        if eligible.is_empty() {
            return Vec::new();
        }
        let conflicted = eligible.iter().any(|id| {
            self.sites
                .get(id)
                .map_or(false, |site| !site.can_acquire_write_lock(txn, var))
        });
        if conflicted {
            return Vec::new();
        }
        for id in &eligible {
            if let Some(site) = self.sites.get_mut(id) {
                site.acquire_write_lock(txn, var);
                site.stage_write(var, value);
            }
        }
        eligible
    }

    /// Commits `txn` on every touched site. Failed sites are skipped; their
    /// locks are already gone and their copies keep the old committed state.
    pub fn commit(&mut self, sites: &BTreeSet<SiteId>, txn: &str, now: Tick) {
        for id in sites {
            if let Some(site) = self.sites.get_mut(id) {
                site.commit(txn, now);
            }
        }
    }

    /// Aborts `txn` on every touched site, up or down.
    pub fn abort(&mut self, sites: &BTreeSet<SiteId>, txn: &str) {
        for id in sites {
            if let Some(site) = self.sites.get_mut(id) {
                site.abort(txn);
            }
        }
    }

    pub fn fail(&mut self, id: SiteId) {
        if let Some(site) = self.sites.get_mut(&id) {
            site.fail();
            info!("site {} failed", id);
        }
    }

    pub fn recover(&mut self, id: SiteId) {
        if let Some(site) = self.sites.get_mut(&id) {
            site.recover();
            info!("site {} recovered", id);
        }
    }

    /// Union of lock holders on `var` across all sites.
    pub fn locking_txns(&self, var: VarId) -> BTreeSet<String> {
        self.sites
            .values()
            .flat_map(|site| site.locking_txns(var))
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.sites.values().filter(|site| site.is_available()).count()
    }

    /// Committed state of every copy on every site, sites in numeric order,
    /// variables in index order. Includes failed sites, which retain their
    /// last committed values.
    pub fn dump(&self) -> Vec<(SiteId, Vec<(VarId, i64)>)> {
        self.sites
            .values()
            .map(|site| (site.id, site.committed_state()))
            .collect()
    }
}

impl Default for SiteManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> VarId {
        name.parse().expect("test variable")
    }

    #[test]
    fn read_prefers_lowest_site() {
        let mut sm = SiteManager::new();
        let (value, site) = sm.read("T1", var("x2")).expect("replicated read");
        assert_eq!((value, site), (20, SiteId::of(1)));

        // Non-replicated x7 only lives on site 8.
        let (value, site) = sm.read("T1", var("x7")).expect("homed read");
        assert_eq!((value, site), (70, SiteId::of(8)));
    }

    #[test]
    fn read_skips_failed_sites() {
        let mut sm = SiteManager::new();
        sm.fail(SiteId::of(1));
        let (_, site) = sm.read("T1", var("x2")).expect("other copies up");
        assert_eq!(site, SiteId::of(2));

        sm.fail(SiteId::of(8));
        assert_eq!(sm.read("T1", var("x7")), None);
    }

    #[test]
    fn write_targets_all_available_copies() {
        let mut sm = SiteManager::new();
        sm.fail(SiteId::of(2));
        let written = sm.write("T1", var("x4"), 400);
        assert_eq!(written.len(), 9);
        assert!(!written.contains(&SiteId::of(2)));

        let written = sm.write("T1", var("x5"), 500);
        assert_eq!(written, vec![SiteId::of(6)]);
    }

    #[test]
    fn write_is_all_or_nothing() {
        let mut sm = SiteManager::new();
        // T1 read-locks x4 on site 1 only; T2's replicated write must not
        // partially acquire on sites 2..10.
        let _ = sm.read("T1", var("x4"));
        assert_eq!(sm.write("T2", var("x4"), 44), Vec::new());
        for id in SiteId::all().skip(1) {
            assert!(sm.site(id).expect("site").locking_txns(var("x4")).is_empty());
        }
    }

    #[test]
    fn snapshot_read_walks_version_history() {
        let mut sm = SiteManager::new();
        assert_eq!(sm.write("T1", var("x2"), 22).len(), 10);
        let touched: BTreeSet<SiteId> = SiteId::all().collect();
        sm.commit(&touched, "T1", 4);

        assert_eq!(sm.read_snapshot(var("x2"), 3), Some((20, SiteId::of(1))));
        assert_eq!(sm.read_snapshot(var("x2"), 4), Some((22, SiteId::of(1))));
    }

    #[test]
    fn dump_covers_every_copy() {
        let sm = SiteManager::new();
        let dump = sm.dump();
        assert_eq!(dump.len(), 10);
        let (site, state) = &dump[1];
        assert_eq!(*site, SiteId::of(2));
        assert!(state.contains(&(var("x1"), 10)));
        assert!(state.contains(&(var("x20"), 200)));
    }
}
