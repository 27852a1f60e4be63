use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::request::IntervalRequest;

#[derive(Debug, Default)]
struct State {
    pending: VecDeque<IntervalRequest>,
    latest: Option<IntervalRequest>,
}

/// Unbounded FIFO of requests that also remembers the most recently enqueued one.
///
/// Producers never wait on the consumer: the lock only guards pushing and popping.
#[derive(Debug, Default)]
pub struct RequestQueue {
    state: Mutex<State>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Neither push nor pop can leave the state half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, request: IntervalRequest) {
        let mut state = self.lock();
        state.latest = Some(request.clone());
        state.pending.push_back(request);
    }

    /// Oldest pending request together with the latest enqueued one at the moment of the call.
    pub fn pop(&self) -> Option<(IntervalRequest, IntervalRequest)> {
        let mut state = self.lock();
        let request = state.pending.pop_front()?;
        let latest = state.latest.clone().unwrap_or_else(|| request.clone());
        Some((request, latest))
    }

    pub fn latest(&self) -> Option<IntervalRequest> {
        self.lock().latest.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }
}
