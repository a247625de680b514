use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use std::hash::Hash;

/// FIFO work list that never holds the same value twice.
///
/// A value can be pushed again once it has been popped.
#[derive(Debug, Clone)]
pub struct SetQueue<T: Hash + Eq + Clone> {
    queue: VecDeque<T>,
    pending: FxHashSet<T>,
}

impl<T: Hash + Eq + Clone> SetQueue<T> {
    pub fn new() -> Self {
        SetQueue {
            queue: VecDeque::new(),
            pending: FxHashSet::default(),
        }
    }

    /// Returns false when the value was already pending
    pub fn push(&mut self, value: T) -> bool {
        if !self.pending.insert(value.clone()) {
            return false;
        }
        self.queue.push_back(value);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        let value = self.queue.pop_front()?;
        self.pending.remove(&value);
        Some(value)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl<T: Hash + Eq + Clone> Default for SetQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq + Clone> FromIterator<T> for SetQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut queue = SetQueue::new();
        for value in iter {
            queue.push(value);
        }
        queue
    }
}
