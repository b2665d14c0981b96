//! The send queue: a lock-free, FIFO-per-producer hand-off from the
//! generator thread to the transmitter thread.

use crossbeam_queue::SegQueue;

use crate::codec::Chain;

/// A packet chain queued for transmission, plus whether it counts toward
/// the completion total (`pkt_probe`).
pub struct QueuedChain {
    pub chain: Chain,
    pub probe: bool,
}

/// Thin wrapper over [`SegQueue`] giving the pipeline a named,
/// purpose-specific type instead of a bare generic queue.
#[derive(Default)]
pub struct SendQueue {
    inner: SegQueue<QueuedChain>,
}

impl SendQueue {
    pub fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    /// Enqueues a chain; safe to call concurrently from any number of
    /// producers.
    pub fn enqueue(&self, chain: Chain, probe: bool) {
        self.inner.push(QueuedChain { chain, probe });
    }

    /// Non-blocking dequeue; `None` means the queue was empty at the time
    /// of the call.
    pub fn dequeue(&self) -> Option<QueuedChain> {
        self.inner.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{eth, Layer};

    fn dummy_chain() -> Chain {
        vec![Layer::Eth(eth::build_eth(eth::ZERO, eth::ZERO))]
    }

    #[test]
    fn fifo_per_producer() {
        let q = SendQueue::new();
        q.enqueue(dummy_chain(), true);
        q.enqueue(dummy_chain(), false);
        let first = q.dequeue().unwrap();
        let second = q.dequeue().unwrap();
        assert!(first.probe);
        assert!(!second.probe);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn dequeue_empty_is_none() {
        let q = SendQueue::new();
        assert!(q.dequeue().is_none());
    }
}
