use foundation::time::Millis;

/// Identifies a scheduled timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    due: Millis,
    id: TimerId,
}

#[derive(Debug)]
struct Entry<T> {
    key: Key,
    payload: T,
}

/// Deterministic one-shot timer queue driven by a host clock.
///
/// Key properties:
/// - Total ordering on `(due, id)`: equal deadlines fire in scheduling order.
/// - Cancellation does not perturb the order of remaining timers.
/// - Nothing fires until the host calls [`TimerQueue::pop_due`] with a clock
///   reading at or past the deadline.
///
/// Vec-backed; the number of concurrently pending timers is small.
#[derive(Debug)]
pub struct TimerQueue<T> {
    next_id: u64,
    entries: Vec<Entry<T>>,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn schedule(&mut self, due: Millis, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(Entry {
            key: Key { due, id },
            payload,
        });
        id
    }

    /// Returns `true` if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some(pos) = self.entries.iter().position(|e| e.key.id == id) else {
            return false;
        };
        self.entries.remove(pos);
        true
    }

    /// Earliest pending deadline.
    pub fn next_due(&self) -> Option<Millis> {
        self.entries.iter().map(|e| e.key.due).min()
    }

    /// Removes and returns the earliest timer whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerId, T)> {
        let pos = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.key.due <= now)
            .min_by_key(|(_, e)| e.key)
            .map(|(i, _)| i)?;
        let entry = self.entries.remove(pos);
        Some((entry.key.id, entry.payload))
    }
}
