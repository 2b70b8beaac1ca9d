use std::fmt::{Display, Formatter};

use crate::site::variable::VarId;
use crate::site::SiteId;
use crate::Tick;

/// Why a transaction was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbortReason {
    /// Chosen as the youngest member of a wait-for cycle.
    Deadlock,
    /// Accessed a site that later failed.
    SiteFailure,
}

/// One observable output line. The engine pushes these to an internal buffer
/// instead of printing; the driver drains and renders them, so the library
/// never owns stdout and tests can assert on exact lines.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Begun { txn: String, read_only: bool, time: Tick },
    Read { txn: String, var: VarId, value: i64, site: SiteId, snapshot: Option<Tick> },
    Written { txn: String, var: VarId, value: i64, sites: Vec<SiteId> },
    Blocked { txn: String, var: VarId, write: bool },
    Deadlock { victim: String },
    Committed { txn: String, time: Tick },
    Aborted { txn: String, reason: AbortReason },
    SiteFailed { site: SiteId },
    SiteRecovered { site: SiteId },
    UnknownTransaction { txn: String },
    DumpSite { site: SiteId, entries: Vec<(VarId, i64)> },
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Begun { txn, read_only: false, time } => {
                write!(f, "{} begins at time {}", txn, time)
            }
            Event::Begun { txn, read_only: true, time } => {
                write!(f, "{} begins read-only at time {}", txn, time)
            }
            Event::Read { txn, var, value, site, snapshot: None } => {
                write!(f, "{} read {}={} from site {}", txn, var, value, site)
            }
            Event::Read { txn, var, value, site, snapshot: Some(at) } => {
                write!(f, "{} read {}={} from site {} (snapshot at time {})", txn, var, value, site, at)
            }
            Event::Written { txn, var, value, sites } => {
                let names: Vec<String> = sites.iter().map(SiteId::to_string).collect();
                write!(f, "{} wrote {}={} to sites {}", txn, var, value, names.join(","))
            }
            Event::Blocked { txn, var, write: false } => {
                write!(f, "{} blocked on read of {}", txn, var)
            }
            Event::Blocked { txn, var, write: true } => {
                write!(f, "{} blocked on write of {}", txn, var)
            }
            Event::Deadlock { victim } => {
                write!(f, "deadlock detected: aborting youngest transaction {}", victim)
            }
            Event::Committed { txn, time } => write!(f, "{} committed at time {}", txn, time),
            Event::Aborted { txn, reason: AbortReason::Deadlock } => {
                write!(f, "{} aborted: deadlock victim", txn)
            }
            Event::Aborted { txn, reason: AbortReason::SiteFailure } => {
                write!(f, "{} aborted: accessed a failed site", txn)
            }
            Event::SiteFailed { site } => write!(f, "site {} failed", site),
            Event::SiteRecovered { site } => write!(f, "site {} recovered", site),
            Event::UnknownTransaction { txn } => {
                write!(f, "transaction {} was never started", txn)
            }
            Event::DumpSite { site, entries } => {
                let vals: Vec<String> = entries
                    .iter()
                    .map(|(var, value)| format!("{}:{}", var, value))
                    .collect();
                write!(f, "{}: {}", site, vals.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering() {
        let var: VarId = "x4".parse().expect("x4");
        let event = Event::Read {
            txn: "T1".to_string(),
            var,
            value: 44,
            site: SiteId::new(3).expect("site 3"),
            snapshot: None,
        };
        assert_eq!(event.to_string(), "T1 read x4=44 from site 3");

        let event = Event::DumpSite {
            site: SiteId::new(2).expect("site 2"),
            entries: vec![(("x1".parse().expect("x1")), 10), (var, 40)],
        };
        assert_eq!(event.to_string(), "2: x1:10, x4:40");
    }
}
