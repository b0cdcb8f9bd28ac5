//! An async-stream view over the same events the [`crate::emitter::Emitter`]
//! contract receives, for callers who'd rather `.next().await` than
//! implement a trait.
//!
//! This is explicitly *not* a channel for partial, in-flight node output —
//! streaming partial node results is out of scope. `EventStream` only ever
//! carries the same step/attempt lifecycle events an `Emitter` would.

use crate::emitter::{Emitter, Event};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// An `Emitter` that forwards every event into a bounded channel, paired
/// with the `EventStream` on the other end.
pub struct ChannelEmitter {
    tx: mpsc::Sender<Event>,
}

impl Emitter for ChannelEmitter {
    fn emit(&self, event: Event) {
        // A full channel means the consumer isn't keeping up; dropping the
        // event here is preferable to blocking the scheduler's hot path.
        let _ = self.tx.try_send(event);
    }
}

/// Async stream of lifecycle events. Construct with [`event_stream`]. A
/// plain alias over `ReceiverStream` — callers use `futures::StreamExt`
/// (`.next().await`) against it directly.
pub type EventStream = ReceiverStream<Event>;

/// Builds a connected `(ChannelEmitter, EventStream)` pair. Pass the
/// `ChannelEmitter` to `Engine::new`, and poll the `EventStream` to observe
/// run progress.
pub fn event_stream(capacity: usize) -> (ChannelEmitter, EventStream) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelEmitter { tx }, ReceiverStream::new(rx))
}
