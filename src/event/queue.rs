use std::collections::VecDeque;

use super::BattleEvent;

/// Ordered FIFO buffer of [`BattleEvent`]s.
///
/// The translator appends; the presentation layer drains. Nothing is ever
/// reordered or dropped once added. Single owner; not meant for concurrent
/// producers.
///
/// The queue is its own iterator, so draining it is a plain `for` loop:
///
/// ```
/// use everymon::{BattleEvent, EventQueue};
///
/// let mut queue = EventQueue::new();
/// queue.add(BattleEvent::Turn { number: 1 });
/// queue.add(BattleEvent::Turn { number: 2 });
///
/// let turns: Vec<_> = queue.by_ref().collect();
/// assert_eq!(turns.len(), 2);
/// assert!(queue.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<BattleEvent>,
}

impl EventQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event at the back.
    pub fn add(&mut self, event: BattleEvent) {
        self.events.push_back(event);
    }

    /// Inspects the oldest pending event without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<&BattleEvent> {
        self.events.front()
    }

    /// Number of pending events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Discards all pending events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Pending events, oldest first, without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = &BattleEvent> {
        self.events.iter()
    }
}

impl Iterator for EventQueue {
    type Item = BattleEvent;

    /// Removes and returns the oldest pending event.
    fn next(&mut self) -> Option<BattleEvent> {
        self.events.pop_front()
    }
}

impl Extend<BattleEvent> for EventQueue {
    fn extend<T: IntoIterator<Item = BattleEvent>>(&mut self, iter: T) {
        self.events.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: u32) -> BattleEvent {
        BattleEvent::Turn { number: n }
    }

    #[test]
    fn test_fifo_order() {
        let mut q = EventQueue::new();
        q.add(turn(1));
        q.add(turn(2));
        q.add(turn(3));
        assert_eq!(q.next(), Some(turn(1)));
        assert_eq!(q.next(), Some(turn(2)));
        assert_eq!(q.next(), Some(turn(3)));
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_peek_does_not_remove() {
        let mut q = EventQueue::new();
        assert!(q.peek().is_none());
        q.add(turn(7));
        assert_eq!(q.peek(), Some(&turn(7)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next(), Some(turn(7)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut q = EventQueue::new();
        q.extend([turn(1), turn(2)]);
        assert_eq!(q.len(), 2);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.next(), None);
    }

    #[test]
    fn test_iter_is_non_destructive() {
        let mut q = EventQueue::new();
        q.extend([turn(1), turn(2)]);
        assert_eq!(q.iter().count(), 2);
        assert_eq!(q.len(), 2);
    }
}
