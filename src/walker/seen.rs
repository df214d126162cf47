//! Duplicate suppression for the crawl frontier.

use std::collections::HashSet;
use std::sync::Mutex;

/// Thread-safe test-and-insert set of hostnames. Callers case-fold to
/// uppercase before calling so `KD2ABC-node` and `kd2abc-NODE` collapse to
/// one crawl.
#[derive(Debug, Default)]
pub struct SeenSet {
    entries: Mutex<HashSet<String>>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically test membership and insert if absent. Returns whether the
    /// value was already present; exactly one caller per value ever sees
    /// `false`.
    pub fn contains_or_set(&self, value: &str) -> bool {
        let mut entries = self.entries.lock().expect("seen set mutex poisoned");
        !entries.insert(value.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("seen set mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::SeenSet;
    use std::sync::Arc;

    #[test]
    fn first_insert_reports_absent() {
        let seen = SeenSet::new();
        assert!(!seen.contains_or_set("KD2ABC-NODE"));
        assert!(seen.contains_or_set("KD2ABC-NODE"));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn exactly_one_winner_under_contention() {
        let seen = Arc::new(SeenSet::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let seen = Arc::clone(&seen);
            handles.push(std::thread::spawn(move || {
                let mut wins = 0usize;
                for i in 0..100 {
                    if !seen.contains_or_set(&format!("NODE-{i}")) {
                        wins += 1;
                    }
                }
                wins
            }));
        }
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // 100 distinct values, each claimed exactly once across all threads.
        assert_eq!(total, 100);
        assert_eq!(seen.len(), 100);
    }
}
