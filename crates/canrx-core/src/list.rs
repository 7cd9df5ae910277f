//! Copy-on-write receiver lists with lock-free readers.
//!
//! Readers load the current snapshot and walk it without taking a lock.
//! Writers (serialized by the engine's writer lock) build a replacement
//! vector and publish it with one atomic store, so a reader sees either the
//! old list or the new one, never a partial update. A receiver unlinked by a
//! writer stays alive for as long as any reader still holds a snapshot that
//! contains it; the last snapshot dropped frees it.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use canrx_frame::Frame;

use crate::receiver::Receiver;

pub(crate) struct ReceiverList {
    head: ArcSwapOption<Vec<Arc<Receiver>>>,
}

impl ReceiverList {
    pub(crate) fn new() -> Self {
        Self {
            head: ArcSwapOption::empty(),
        }
    }

    /// Deliver `frame` to every receiver accepted by `accept`, returning how
    /// many were invoked.
    pub(crate) fn deliver_if(&self, frame: &Frame, accept: impl Fn(&Receiver) -> bool) -> u32 {
        let snapshot = self.head.load();
        let Some(receivers) = &*snapshot else {
            return 0;
        };

        let mut matches = 0;
        for receiver in receivers.iter() {
            if accept(receiver) {
                receiver.deliver(frame);
                matches += 1;
            }
        }
        matches
    }

    /// Append a fully initialized receiver. Caller holds the writer lock.
    pub(crate) fn push(&self, receiver: Arc<Receiver>) {
        let mut next = match self.head.load_full() {
            Some(current) => Vec::clone(&current),
            None => Vec::with_capacity(1),
        };
        next.push(receiver);
        self.head.store(Some(Arc::new(next)));
    }

    /// Unlink the first receiver matching `pred`. Caller holds the writer lock.
    pub(crate) fn remove_first(
        &self,
        pred: impl Fn(&Arc<Receiver>) -> bool,
    ) -> Option<Arc<Receiver>> {
        let current = self.head.load_full()?;
        let position = current.iter().position(pred)?;

        let mut next = Vec::clone(&current);
        let removed = next.remove(position);
        self.head.store((!next.is_empty()).then(|| Arc::new(next)));
        Some(removed)
    }

    pub(crate) fn len(&self) -> usize {
        match &*self.head.load() {
            Some(list) => list.len(),
            None => 0,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Receiver>> {
        match &*self.head.load() {
            Some(list) => list.to_vec(),
            None => Vec::new(),
        }
    }
}
