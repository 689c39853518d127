use std::collections::{HashMap, VecDeque};

/// Remembers signaling message ids so repeated deliveries are handled once.
///
/// Ids are tagged with the ledger epoch they were seen in. Retiring a session
/// keeps the ids of the session that just closed (late duplicates of it are
/// still rejected) and forgets anything older.
#[derive(Debug)]
pub struct DedupLedger {
    seen: HashMap<String, u64>,
    order: VecDeque<String>,
    epoch: u64,
    capacity: usize,
}

impl DedupLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            epoch: 0,
            capacity: capacity.max(1),
        }
    }

    /// Returns `true` and remembers `id` if it was never seen, `false`
    /// without touching any state otherwise.
    pub fn record(&mut self, id: &str) -> bool {
        if self.seen.contains_key(id) {
            return false;
        }
        while self.seen.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.seen.remove(&oldest);
                }
                None => break,
            }
        }
        self.seen.insert(id.to_string(), self.epoch);
        self.order.push_back(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn retire_session(&mut self) {
        self.epoch += 1;
        let keep_from = self.epoch - 1;
        self.seen.retain(|_, epoch| *epoch >= keep_from);
        let seen = &self.seen;
        self.order.retain(|id| seen.contains_key(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_is_idempotent() {
        let mut ledger = DedupLedger::new(16);
        assert!(ledger.record("m1"));
        assert!(!ledger.record("m1"));
        assert!(!ledger.record("m1"));
        assert!(ledger.record("m2"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_retire_keeps_previous_session() {
        let mut ledger = DedupLedger::new(16);
        ledger.record("first-call");
        ledger.retire_session();
        assert!(!ledger.record("first-call"), "late duplicate of closed call");

        ledger.record("second-call");
        ledger.retire_session();
        assert!(!ledger.contains("first-call"));
        assert!(ledger.contains("second-call"));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut ledger = DedupLedger::new(3);
        for id in ["a", "b", "c", "d"] {
            assert!(ledger.record(id));
        }
        assert_eq!(ledger.len(), 3);
        assert!(!ledger.contains("a"));
        assert!(ledger.contains("d"));
    }
}
