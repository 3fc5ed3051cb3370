use std::collections::VecDeque;

/// Events kept by [`EventBus::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One recorded event with its position in the log.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<E> {
    pub seq: u64,
    pub payload: E,
}

/// Bounded event log.
///
/// Consumers that mirror state elsewhere (info box, markers, tests) read the
/// log in `seq` order. Once `capacity` events are held the oldest one is
/// dropped for each new event; `seq` keeps counting.
#[derive(Debug)]
pub struct EventBus<E> {
    next_seq: u64,
    capacity: usize,
    events: VecDeque<Event<E>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            next_seq: 0,
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn emit(&mut self, payload: E) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(Event { seq, payload });
        seq
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &Event<E>> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;

    #[test]
    fn records_events_with_sequence() {
        let mut bus = EventBus::new();
        assert_eq!(bus.emit("a"), 0);
        assert_eq!(bus.emit("b"), 1);
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.events().nth(1).map(|e| e.payload), Some("b"));
    }

    #[test]
    fn oldest_events_fall_off_at_capacity() {
        let mut bus = EventBus::with_capacity(3);
        for i in 0..10 {
            bus.emit(i);
        }
        assert_eq!(bus.len(), 3);
        let seqs: Vec<u64> = bus.events().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![7, 8, 9]);
        assert_eq!(bus.emit(10), 10);
        assert_eq!(bus.events().next().map(|e| e.payload), Some(8));
    }
}
