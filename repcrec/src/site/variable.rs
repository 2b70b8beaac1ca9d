use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::{CResult, Error};
use crate::site::SiteId;
use crate::Tick;

/// Number of variables in the fixed topology, named `x1`..`x20`.
pub const NUM_VARIABLES: u8 = 20;

/// A variable index. Even-indexed variables are replicated on every site;
/// odd-indexed ones live only on site `1 + (j mod 10)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(u8);

impl VarId {
    pub fn new(index: u8) -> CResult<Self> {
        if index == 0 || index > NUM_VARIABLES {
            return Err(Error::invalid_input(format!(
                "variable index {} out of range 1..={}",
                index, NUM_VARIABLES
            )));
        }
        Ok(VarId(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn replicated(self) -> bool {
        self.0 % 2 == 0
    }

    /// The single site holding a non-replicated variable.
    pub fn home_site(self) -> SiteId {
        SiteId::of(1 + self.0 % 10)
    }

    /// Whether a copy of this variable lives on the given site.
    pub fn lives_on(self, site: SiteId) -> bool {
        self.replicated() || self.home_site() == site
    }

    /// Seed value of every copy, committed at tick 0.
    pub fn initial_value(self) -> i64 {
        10 * i64::from(self.0)
    }

    /// All valid variable ids in index order.
    pub fn all() -> impl Iterator<Item = VarId> {
        (1..=NUM_VARIABLES).map(VarId)
    }
}

impl Display for VarId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "x{}", self.0)
    }
}

impl FromStr for VarId {
    type Err = Error;

    fn from_str(s: &str) -> CResult<Self> {
        let index = s
            .strip_prefix('x')
            .ok_or_else(|| Error::invalid_input(format!("variable name {:?} must start with 'x'", s)))?
            .parse::<u8>()?;
        VarId::new(index)
    }
}

/// One copy of a variable on one site: the working value seen by writers, the
/// last committed value, and the committed version history used by snapshot
/// reads.
#[derive(Clone, Debug)]
pub struct Variable {
    pub id: VarId,
    /// Working value. Diverges from `committed_value` while a write lock holder
    /// has buffered an uncommitted write.
    pub value: i64,
    pub committed_value: i64,
    pub committed_at: Tick,
    pub replicated: bool,
    /// Gate for non-snapshot reads. Cleared when the owning site fails (for
    /// replicated copies) and set again only once a write commits here.
    pub readable: bool,
    versions: BTreeMap<Tick, i64>,
}

impl Variable {
    pub fn new(id: VarId) -> Self {
        let value = id.initial_value();
        Variable {
            id,
            value,
            committed_value: value,
            committed_at: 0,
            replicated: id.replicated(),
            readable: true,
            versions: BTreeMap::from([(0, value)]),
        }
    }

    /// Promote the working value to committed state at `now` and append it to
    /// the version history. Restores readability for this copy.
    pub fn commit(&mut self, now: Tick) {
        self.committed_value = self.value;
        self.committed_at = now;
        self.readable = true;
        self.versions.insert(now, self.value);
    }

    /// Throw away the uncommitted working value.
    pub fn revert(&mut self) {
        self.value = self.committed_value;
    }

    /// The committed value with the greatest commit tick `<= at`, if any
    /// version that old exists.
    pub fn version_at(&self, at: Tick) -> Option<i64> {
        self.versions.range(..=at).next_back().map(|(_, v)| *v)
    }
}
