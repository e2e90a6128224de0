//! Pending pixel transfers, strictly FIFO
//!
//! The queue itself is not synchronized; the engine keeps it inside its state
//! lock so that queue mutation and state transitions happen together.

use super::pixels::PixelBuffer;
use std::collections::VecDeque;

/// One key's frame waiting to be pushed to the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub key_index: u8,
    pub pixels: PixelBuffer,
}

#[derive(Debug, Default)]
pub struct TransferQueue {
    pending: VecDeque<TransferRequest>,
}

impl TransferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Returns `true` if the queue was empty before.
    pub fn enqueue(&mut self, request: TransferRequest) -> bool {
        let was_empty = self.pending.is_empty();
        self.pending.push_back(request);
        was_empty
    }

    /// The request currently in flight (or next to start)
    pub fn peek_head(&self) -> Option<&TransferRequest> {
        self.pending.front()
    }

    pub fn dequeue_head(&mut self) -> Option<TransferRequest> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Key indices in queue order
    pub fn key_indices(&self) -> Vec<u8> {
        self.pending.iter().map(|r| r.key_index).collect()
    }
}
