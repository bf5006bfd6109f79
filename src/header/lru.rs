//! Bounded least-recently-used map keyed by header strings.
use std::collections::{BTreeMap, HashMap};

pub(crate) const DEFAULT_CAPACITY: usize = 4096;

struct Entry<V> {
    value: V,
    tick: u64,
}

pub(crate) struct Lru<V> {
    capacity: usize,
    entries: HashMap<String, Entry<V>>,
    // tick -> key, oldest first
    order: BTreeMap<u64, String>,
    tick: u64,
}

impl<V> Lru<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
    /// Look up `key`, marking it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key.to_string());
        Some(&entry.value)
    }
    pub fn put(&mut self, key: String, value: V) {
        let tick = self.next_tick();
        if let Some(old) = self.entries.remove(&key) {
            self.order.remove(&old.tick);
        }
        while self.entries.len() >= self.capacity {
            let oldest = match self.order.keys().next() {
                Some(oldest) => *oldest,
                None => break,
            };
            if let Some(evicted) = self.order.remove(&oldest) {
                self.entries.remove(&evicted);
            }
        }
        self.order.insert(tick, key.clone());
        self.entries.insert(key, Entry { value, tick });
    }
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut lru = Lru::new(2);
        lru.put("a".to_string(), 1);
        lru.put("b".to_string(), 2);
        assert_eq!(lru.get("a"), Some(&1));
        lru.put("c".to_string(), 3);
        assert!(lru.contains("a"));
        assert!(!lru.contains("b"));
        assert!(lru.contains("c"));
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_replace_keeps_size() {
        let mut lru = Lru::new(2);
        lru.put("a".to_string(), 1);
        lru.put("a".to_string(), 2);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get("a"), Some(&2));
        assert_eq!(lru.get("missing"), None);
    }
}
