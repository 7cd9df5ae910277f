use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use canrx_frame::{Filter, Frame, EFF_FLAG, ERR_FLAG, RTR_FLAG, SFF_MASK};

use crate::classify::{Bucket, SFF_BUCKETS};
use crate::device::InterfaceId;
use crate::list::ReceiverList;
use crate::receiver::{FrameHandler, Receiver, ReceiverInfo};

/// The receivers of one interface (or of the global "any interface" scope),
/// sorted into classification buckets.
///
/// Dispatch through [`Registry::dispatch`] is lock-free. Mutation goes through
/// the owning [`Engine`](crate::Engine), which serializes writers.
pub struct Registry {
    interface: Option<InterfaceId>,
    all: ReceiverList,
    filtered: ReceiverList,
    inverted: ReceiverList,
    error: ReceiverList,
    exact_extended: ReceiverList,
    standard: Box<[ReceiverList]>,
    entries: AtomicUsize,
    pending_removal: AtomicBool,
}

impl Registry {
    pub(crate) fn new(interface: Option<InterfaceId>) -> Self {
        Self {
            interface,
            all: ReceiverList::new(),
            filtered: ReceiverList::new(),
            inverted: ReceiverList::new(),
            error: ReceiverList::new(),
            exact_extended: ReceiverList::new(),
            standard: (0..SFF_BUCKETS).map(|_| ReceiverList::new()).collect(),
            entries: AtomicUsize::new(0),
            pending_removal: AtomicBool::new(false),
        }
    }

    /// `None` for the global registry.
    pub fn interface(&self) -> Option<InterfaceId> {
        self.interface
    }

    /// Number of receivers across all buckets.
    pub fn entries(&self) -> usize {
        self.entries.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.entries() == 0
    }

    /// Set once the interface has detached while receivers remained.
    pub fn is_pending_removal(&self) -> bool {
        self.pending_removal.load(Ordering::Acquire)
    }

    /// Receivers currently stored in `bucket`.
    pub fn bucket_len(&self, bucket: Bucket) -> usize {
        self.list(bucket).len()
    }

    /// Snapshot of every receiver, bucket by bucket.
    pub fn receivers(&self) -> Vec<ReceiverInfo> {
        self.lists()
            .flat_map(ReceiverList::snapshot)
            .map(|receiver| receiver.info(self.interface))
            .collect()
    }

    /// Deliver `frame` to every matching receiver of this registry and return
    /// the number of receivers invoked.
    pub fn dispatch(&self, frame: &Frame) -> u32 {
        let id = frame.id.raw();

        if id & ERR_FLAG != 0 {
            return self
                .error
                .deliver_if(frame, |r| id & r.filter().mask != 0);
        }

        let mut matches = self.all.deliver_if(frame, |_| true);
        matches += self.filtered.deliver_if(frame, |r| {
            let filter = r.filter();
            id & filter.mask == filter.id
        });
        matches += self.inverted.deliver_if(frame, |r| {
            let filter = r.filter();
            id & filter.mask != filter.id
        });

        // remote requests are only matched through the mask buckets
        if id & RTR_FLAG != 0 {
            return matches;
        }

        if id & EFF_FLAG != 0 {
            matches += self
                .exact_extended
                .deliver_if(frame, |r| r.filter().id == id);
        } else {
            matches += self.standard[(id & SFF_MASK) as usize].deliver_if(frame, |_| true);
        }

        matches
    }

    pub(crate) fn insert(&self, bucket: Bucket, receiver: Arc<Receiver>) {
        self.list(bucket).push(receiver);
        self.entries.fetch_add(1, Ordering::AcqRel);
    }

    /// Unlink the first receiver registered with this normalized filter and
    /// handler.
    pub(crate) fn remove(
        &self,
        bucket: Bucket,
        normalized: Filter,
        handler: &Arc<dyn FrameHandler>,
    ) -> Option<Arc<Receiver>> {
        self.remove_where(bucket, |r| r.is_same_subscription(normalized, handler))
    }

    pub(crate) fn remove_receiver(
        &self,
        bucket: Bucket,
        receiver: &Arc<Receiver>,
    ) -> Option<Arc<Receiver>> {
        self.remove_where(bucket, |r| Arc::ptr_eq(r, receiver))
    }

    pub(crate) fn mark_pending_removal(&self, pending: bool) {
        self.pending_removal.store(pending, Ordering::Release);
    }

    fn remove_where(
        &self,
        bucket: Bucket,
        pred: impl Fn(&Arc<Receiver>) -> bool,
    ) -> Option<Arc<Receiver>> {
        let removed = self.list(bucket).remove_first(pred)?;
        self.entries.fetch_sub(1, Ordering::AcqRel);
        Some(removed)
    }

    fn list(&self, bucket: Bucket) -> &ReceiverList {
        match bucket {
            Bucket::All => &self.all,
            Bucket::Filtered => &self.filtered,
            Bucket::Inverted => &self.inverted,
            Bucket::Error => &self.error,
            Bucket::ExactExtended => &self.exact_extended,
            Bucket::StandardHashed(index) => &self.standard[usize::from(index) & (SFF_BUCKETS - 1)],
        }
    }

    fn lists(&self) -> impl Iterator<Item = &ReceiverList> {
        [
            &self.all,
            &self.filtered,
            &self.inverted,
            &self.error,
            &self.exact_extended,
        ]
        .into_iter()
        .chain(self.standard.iter())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("interface", &self.interface)
            .field("entries", &self.entries())
            .field("pending_removal", &self.is_pending_removal())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use canrx_frame::{error_class, CanId, EFF_MASK, EFF_RTR_FLAGS, INV_FILTER};

    use super::*;
    use crate::classify::classify;

    fn counting_handler() -> (Arc<dyn FrameHandler>, Arc<AtomicU32>) {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        let handler: Arc<dyn FrameHandler> = Arc::new(move |_: &Frame| {
            seen.fetch_add(1, Ordering::Relaxed);
        });
        (handler, count)
    }

    fn add(registry: &Registry, filter: Filter, handler: &Arc<dyn FrameHandler>) -> Bucket {
        let (bucket, normalized) = classify(filter);
        let receiver = Receiver::new(
            filter,
            normalized,
            bucket,
            Arc::clone(handler),
            "test".to_string(),
        );
        registry.insert(bucket, Arc::new(receiver));
        bucket
    }

    fn data(id: CanId) -> Frame {
        Frame::new(id, &[0x01]).unwrap()
    }

    #[test]
    fn filtered_bucket_compares_masked_id() {
        let registry = Registry::new(None);
        let (handler, count) = counting_handler();
        add(&registry, Filter::new(0x120, 0x7F0), &handler);

        assert_eq!(registry.dispatch(&data(CanId::standard(0x12F))), 1);
        assert_eq!(registry.dispatch(&data(CanId::standard(0x130))), 0);
        assert_eq!(count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn inverted_bucket_matches_on_difference() {
        let registry = Registry::new(None);
        let (handler, _) = counting_handler();
        add(&registry, Filter::new(0x10 | INV_FILTER, SFF_MASK), &handler);

        assert_eq!(registry.dispatch(&data(CanId::standard(0x10))), 0);
        assert_eq!(registry.dispatch(&data(CanId::standard(0x11))), 1);
    }

    #[test]
    fn error_frames_only_reach_error_bucket() {
        let registry = Registry::new(None);
        let (catch_all, all_count) = counting_handler();
        let (errors, error_count) = counting_handler();
        add(&registry, Filter::all(), &catch_all);
        add(&registry, Filter::error(error_class::BUS_OFF), &errors);

        let bus_off = Frame::error(error_class::BUS_OFF, &[]).unwrap();
        let no_ack = Frame::error(error_class::NO_ACK, &[]).unwrap();
        assert_eq!(registry.dispatch(&bus_off), 1);
        assert_eq!(registry.dispatch(&no_ack), 0);
        assert_eq!(all_count.load(Ordering::Relaxed), 0);
        assert_eq!(error_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn exact_extended_requires_equal_id() {
        let registry = Registry::new(None);
        let (handler, _) = counting_handler();
        let bucket = add(
            &registry,
            Filter::new(EFF_FLAG | 0x1234, EFF_MASK | EFF_RTR_FLAGS),
            &handler,
        );
        assert_eq!(bucket, Bucket::ExactExtended);

        assert_eq!(registry.dispatch(&data(CanId::extended(0x1234))), 1);
        assert_eq!(registry.dispatch(&data(CanId::extended(0x1235))), 0);
        // same low bits, standard format
        assert_eq!(registry.dispatch(&data(CanId::standard(0x234))), 0);
    }

    #[test]
    fn standard_hash_bucket_is_indexed_by_id() {
        let registry = Registry::new(None);
        let (handler, _) = counting_handler();
        let bucket = add(
            &registry,
            Filter::new(0x321, SFF_MASK | EFF_RTR_FLAGS),
            &handler,
        );
        assert_eq!(bucket, Bucket::StandardHashed(0x321));
        assert_eq!(registry.bucket_len(bucket), 1);

        assert_eq!(registry.dispatch(&data(CanId::standard(0x321))), 1);
        assert_eq!(registry.dispatch(&data(CanId::standard(0x322))), 0);
        assert_eq!(registry.dispatch(&data(CanId::extended(0x321))), 0);
    }

    #[test]
    fn remote_requests_skip_exact_buckets() {
        let registry = Registry::new(None);
        let (exact, exact_count) = counting_handler();
        let (masked, masked_count) = counting_handler();
        add(&registry, Filter::new(0x321, SFF_MASK | EFF_RTR_FLAGS), &exact);
        add(&registry, Filter::new(0x321, SFF_MASK), &masked);

        let rtr = Frame::remote(CanId::standard(0x321), 0);
        assert_eq!(registry.dispatch(&rtr), 1);
        assert_eq!(exact_count.load(Ordering::Relaxed), 0);
        assert_eq!(masked_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn entries_track_bucket_membership() {
        let registry = Registry::new(Some(InterfaceId(3)));
        let (handler, _) = counting_handler();
        let filters = [
            Filter::all(),
            Filter::new(0x1, 0x1),
            Filter::inverted(0x2, 0x7FF),
            Filter::error(0x40),
            Filter::new(0x7FF, SFF_MASK | EFF_RTR_FLAGS),
        ];
        for filter in filters {
            add(&registry, filter, &handler);
        }
        assert_eq!(registry.entries(), filters.len());
        assert_eq!(registry.receivers().len(), filters.len());

        for filter in filters {
            let (bucket, normalized) = classify(filter);
            assert!(registry.remove(bucket, normalized, &handler).is_some());
        }
        assert!(registry.is_empty());
        assert!(registry.receivers().is_empty());
    }

    #[test]
    fn remove_requires_same_handler() {
        let registry = Registry::new(None);
        let (first, _) = counting_handler();
        let (second, _) = counting_handler();
        let filter = Filter::new(0x100, 0x700);
        add(&registry, filter, &first);

        let (bucket, normalized) = classify(filter);
        assert!(registry.remove(bucket, normalized, &second).is_none());
        assert!(registry.remove(bucket, normalized, &first).is_some());
    }
}
