use std::collections::VecDeque;

/// FIFO of node indices whose parents have all succeeded.
///
/// An index is accepted at most once per run, so a node can never be
/// dispatched twice even if it is offered again.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    queue: VecDeque<usize>,
    admitted: Vec<bool>,
}

impl ReadyQueue {
    /// Creates a queue for a graph of `capacity` nodes.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            admitted: vec![false; capacity],
        }
    }

    /// Pushes `index` unless it was admitted before. Returns whether it was
    /// queued.
    pub fn push(&mut self, index: usize) -> bool {
        if self.admitted[index] {
            return false;
        }
        self.admitted[index] = true;
        self.queue.push_back(index);
        true
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.queue.pop_front()
    }

    /// Removes and returns everything still waiting, in queue order.
    pub fn drain(&mut self) -> Vec<usize> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.admitted.len()
    }
}
