use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Remembers the last `capacity` ids so a consumer can drop events it has
/// already applied (for example after a reconnect replays state).
#[derive(Debug, Clone)]
pub struct SeenIds<T> {
    capacity: usize,
    order: VecDeque<T>,
    seen: HashSet<T>,
}

impl<T: Eq + Hash + Clone> SeenIds<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn insert(&mut self, id: T) -> bool {
        if self.seen.contains(&id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.clone());
        self.seen.insert(id);
        true
    }

    pub fn contains(&self, id: &T) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_are_dropped_and_old_ids_expire() {
        let mut seen = SeenIds::new(2);
        assert!(seen.insert("a"));
        assert!(!seen.insert("a"));
        assert!(seen.insert("b"));
        assert!(seen.insert("c"));
        assert!(!seen.contains(&"a"));
        assert!(seen.insert("a"));
        assert_eq!(seen.len(), 2);
    }
}
