//! Recently generated memes.

use std::collections::VecDeque;

/// Maximum number of entries kept in the history
pub const HISTORY_LIMIT: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub name: String,
    pub url: String,
}

/// Most-recent-first list of successful renders, unique by URL.
///
/// Capped by insertion: recording a URL that is already present does not
/// move it to the front.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a render. Returns `false` when the URL was already present.
    pub fn record(&mut self, name: &str, url: &str) -> bool {
        if self.entries.iter().any(|e| e.url == url) {
            return false;
        }
        if self.entries.len() >= HISTORY_LIMIT {
            if let Some(evicted) = self.entries.pop_back() {
                log::debug!("history full, evicting {}", evicted.url);
            }
        }
        self.entries.push_front(HistoryEntry {
            name: name.to_string(),
            url: url.to_string(),
        });
        true
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(h: &History) -> Vec<String> {
        h.iter().map(|e| e.url.clone()).collect()
    }

    #[test]
    fn newest_first() {
        let mut h = History::new();
        assert!(h.record("a", "u1"));
        assert!(h.record("b", "u2"));
        assert_eq!(urls(&h), vec!["u2", "u1"]);
        assert_eq!(h.get(0).unwrap().name, "b");
    }

    #[test]
    fn duplicate_url_is_a_noop() {
        let mut h = History::new();
        h.record("a", "u1");
        h.record("b", "u2");
        assert!(!h.record("a again", "u1"));
        assert_eq!(urls(&h), vec!["u2", "u1"]);
        assert_eq!(h.get(1).unwrap().name, "a");
    }

    #[test]
    fn seventh_entry_evicts_oldest() {
        let mut h = History::new();
        for i in 1..=7 {
            h.record("m", &format!("u{}", i));
        }
        assert_eq!(h.len(), HISTORY_LIMIT);
        assert_eq!(urls(&h), vec!["u7", "u6", "u5", "u4", "u3", "u2"]);
    }
}
