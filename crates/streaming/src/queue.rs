use std::collections::BTreeMap;

use crate::request::{FetchRequest, FetchTicket};

/// Bookkeeping for fire-and-forget dataset fetches.
///
/// `submit` records the caller's context under a fresh ticket and queues a
/// [`FetchRequest`] in the outbox. The host drains the outbox, performs the
/// I/O in any order, and hands each ticket back to `complete`, which returns
/// the context exactly once. There is no cancellation: callers guard stale
/// completions with their own liveness checks.
#[derive(Debug)]
pub struct FetchQueue<T> {
    next_ticket: u64,
    outbox: Vec<FetchRequest>,
    pending: BTreeMap<FetchTicket, (String, T)>,
}

impl<T> Default for FetchQueue<T> {
    fn default() -> Self {
        Self {
            next_ticket: 1,
            outbox: Vec::new(),
            pending: BTreeMap::new(),
        }
    }
}

impl<T> FetchQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, dataset_id: impl Into<String>, context: T) -> FetchTicket {
        let dataset_id = dataset_id.into();
        let ticket = FetchTicket(self.next_ticket);
        self.next_ticket += 1;
        self.outbox.push(FetchRequest {
            ticket,
            dataset_id: dataset_id.clone(),
        });
        self.pending.insert(ticket, (dataset_id, context));
        ticket
    }

    /// Requests submitted since the last call, in submission order.
    pub fn take_outbox(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Resolves `ticket`. Returns `None` for unknown or already-completed tickets.
    pub fn complete(&mut self, ticket: FetchTicket) -> Option<(String, T)> {
        self.pending.remove(&ticket)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::FetchQueue;
    use crate::request::FetchTicket;

    #[test]
    fn outbox_drains_in_submission_order() {
        let mut q = FetchQueue::new();
        let a = q.submit("bike_station", 'a');
        let b = q.submit("metro_route", 'b');

        let out = q.take_outbox();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].ticket, a);
        assert_eq!(out[1].dataset_id, "metro_route");
        assert!(q.take_outbox().is_empty());
        assert_eq!(q.pending_len(), 2);
        assert!(a < b);
    }

    #[test]
    fn completes_out_of_order_exactly_once() {
        let mut q = FetchQueue::new();
        let a = q.submit("a", 1);
        let b = q.submit("b", 2);

        assert_eq!(q.complete(b), Some(("b".to_string(), 2)));
        assert_eq!(q.complete(a), Some(("a".to_string(), 1)));
        assert_eq!(q.complete(a), None);
        assert_eq!(q.complete(FetchTicket(99)), None);
        assert!(q.is_empty());
    }
}
