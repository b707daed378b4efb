//! Bounded queue of memorized replies.

use std::collections::VecDeque;

use crate::rng::{rnd_int, RandomSource};

/// Replies banked by memory-flagged rules, delivered on later turns that
/// produce no direct keyword match.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    queue: VecDeque<String>,
    capacity: usize,
}

impl Memory {
    /// Create an empty memory holding at most `capacity` replies.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity,
        }
    }

    /// Bank a reply, dropping the oldest one when full.
    pub fn push(&mut self, reply: String) {
        self.queue.push_back(reply);
        while self.queue.len() > self.capacity {
            self.queue.pop_front();
        }
    }

    /// Take the oldest reply, or a random one when `randomize` is set.
    pub fn pop(&mut self, randomize: bool, rng: &mut dyn RandomSource) -> Option<String> {
        if self.queue.is_empty() {
            return None;
        }
        if randomize {
            let idx = rnd_int(self.queue.len(), rng);
            return self.queue.remove(idx);
        }
        self.queue.pop_front()
    }

    /// Number of banked replies.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when nothing is banked.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every banked reply.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SeededRandom;

    #[test]
    fn test_fifo() {
        let mut rng = SeededRandom::new(Some(0));
        let mut memory = Memory::new(10);
        memory.push("a".to_string());
        memory.push("b".to_string());
        assert_eq!(memory.pop(false, &mut rng).as_deref(), Some("a"));
        assert_eq!(memory.pop(false, &mut rng).as_deref(), Some("b"));
        assert_eq!(memory.pop(false, &mut rng), None);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut rng = SeededRandom::new(Some(0));
        let mut memory = Memory::new(2);
        for reply in ["a", "b", "c"] {
            memory.push(reply.to_string());
        }
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.pop(false, &mut rng).as_deref(), Some("b"));
    }

    #[test]
    fn test_random_extraction_drains() {
        let mut rng = SeededRandom::new(Some(5));
        let mut memory = Memory::new(10);
        for reply in ["a", "b", "c"] {
            memory.push(reply.to_string());
        }
        let mut seen: Vec<String> = std::iter::from_fn(|| memory.pop(true, &mut rng)).collect();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(memory.is_empty());
    }
}
