//! Bridge from the dispatch path into async tasks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use canrx_frame::Frame;
use tokio::sync::mpsc;
use tracing::trace;

use crate::receiver::FrameHandler;

/// Handler that forwards frames into a bounded tokio channel.
///
/// Dispatch must not block, so a full channel drops the frame and counts it.
#[derive(Debug)]
pub struct ChannelHandler {
    tx: mpsc::Sender<Frame>,
    dropped: AtomicU64,
}

impl ChannelHandler {
    /// Frames dropped because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameHandler for ChannelHandler {
    fn on_frame(&self, frame: &Frame) {
        if let Err(err) = self.tx.try_send(*frame) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!(id = %frame.id, closed = matches!(err, mpsc::error::TrySendError::Closed(_)), "frame dropped");
        }
    }
}

/// Create a channel-backed handler with room for `capacity` frames.
pub fn channel_handler(capacity: usize) -> (Arc<ChannelHandler>, mpsc::Receiver<Frame>) {
    let (tx, rx) = mpsc::channel(capacity);
    let handler = Arc::new(ChannelHandler {
        tx,
        dropped: AtomicU64::new(0),
    });
    (handler, rx)
}

#[cfg(test)]
mod tests {
    use canrx_frame::{CanId, Filter};

    use super::*;
    use crate::{Engine, InterfaceId, StaticDevices};

    #[tokio::test]
    async fn frames_reach_async_consumer() {
        let can0 = InterfaceId(1);
        let engine = Engine::new(Arc::new(StaticDevices::with_can([can0])));
        engine.on_interface_attach(can0).unwrap();

        let (handler, mut rx) = channel_handler(1);
        engine
            .register(Some(can0), Filter::all(), handler.clone(), "async")
            .unwrap();

        let first = Frame::new(CanId::standard(0x100), &[1]).unwrap();
        let second = Frame::new(CanId::standard(0x101), &[2]).unwrap();
        assert_eq!(engine.dispatch(can0, &first), 1);
        assert_eq!(engine.dispatch(can0, &second), 1);

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(handler.dropped(), 1);
    }
}
