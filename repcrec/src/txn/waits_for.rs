use std::collections::{BTreeMap, BTreeSet};

/// The wait-for graph over live read-write transactions. An edge `a -> b`
/// means `a` is blocked waiting on `b`; a transaction blocked on several
/// holders has several outgoing edges.
#[derive(Debug, Default)]
pub struct WaitsFor {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl WaitsFor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.edges.entry(from.to_string()).or_default().insert(to.to_string());
    }

    /// Drops the node and every edge in either direction, as happens when a
    /// transaction commits or aborts.
    pub fn remove(&mut self, txn: &str) {
        self.edges.remove(txn);
        self.edges.retain(|_, targets| {
            targets.remove(txn);
            !targets.is_empty()
        });
    }

    /// Whether `txn` is waiting on anyone. A deferred instruction whose
    /// transaction has no outgoing edges is parked on site availability, not
    /// on another transaction.
    pub fn is_waiting(&self, txn: &str) -> bool {
        self.edges.get(txn).map_or(false, |targets| !targets.is_empty())
    }

    /// DFS from `start` looking for a back edge into the recursion stack.
    /// On detection, returns the stack at that moment (outermost first); the
    /// caller selects the victim from it.
    pub fn find_cycle_from(&self, start: &str) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut stack = Vec::new();
        let mut on_stack = BTreeSet::new();
        if self.dfs(start, &mut visited, &mut stack, &mut on_stack) {
            Some(stack)
        } else {
            None
        }
    }

    fn dfs(
        &self,
        node: &str,
        visited: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
        on_stack: &mut BTreeSet<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());
        on_stack.insert(node.to_string());
        if let Some(targets) = self.edges.get(node) {
            for next in targets {
                if on_stack.contains(next) {
                    return true;
                }
                if !visited.contains(next) && self.dfs(next, visited, stack, on_stack) {
                    return true;
                }
            }
        }
        stack.pop();
        on_stack.remove(node);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cycle_in_a_chain() {
        let mut graph = WaitsFor::new();
        graph.add_edge("T1", "T2");
        graph.add_edge("T2", "T3");
        assert_eq!(graph.find_cycle_from("T1"), None);
        assert!(graph.is_waiting("T1"));
        assert!(!graph.is_waiting("T3"));
    }

    #[test]
    fn two_cycle_returns_stack() {
        let mut graph = WaitsFor::new();
        graph.add_edge("T1", "T2");
        graph.add_edge("T2", "T1");
        let stack = graph.find_cycle_from("T1").expect("cycle");
        assert_eq!(stack, vec!["T1".to_string(), "T2".to_string()]);
    }

    #[test]
    fn cycle_beyond_the_seed_is_still_found() {
        let mut graph = WaitsFor::new();
        graph.add_edge("T1", "T2");
        graph.add_edge("T2", "T3");
        graph.add_edge("T3", "T2");
        let stack = graph.find_cycle_from("T1").expect("cycle");
        assert_eq!(stack.last().map(String::as_str), Some("T3"));
    }

    #[test]
    fn self_edges_are_ignored() {
        let mut graph = WaitsFor::new();
        graph.add_edge("T1", "T1");
        assert_eq!(graph.find_cycle_from("T1"), None);
    }

    #[test]
    fn removal_cuts_both_directions() {
        let mut graph = WaitsFor::new();
        graph.add_edge("T1", "T2");
        graph.add_edge("T2", "T1");
        graph.remove("T2");
        assert_eq!(graph.find_cycle_from("T1"), None);
        assert!(!graph.is_waiting("T1"));
    }
}
