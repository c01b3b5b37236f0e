use super::recorder::RecorderView;
use crate::messages::RecorderEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives events from an [`AppendingRecorder`](super::AppendingRecorder)
///
/// The recorder only keeps a weak reference, so the observer's owner decides
/// how long it lives. Events for one recorder arrive one at a time, in order,
/// on the recorder's worker thread.
pub trait RecorderObserver: Send + Sync {
    fn on_event(&self, recorder: &RecorderView, event: &RecorderEvent);
}

/// Observer that forwards every event into a channel
///
/// Lets the caller consume events on its own task instead of the worker thread.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RecorderEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<RecorderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl RecorderObserver for ChannelObserver {
    fn on_event(&self, _recorder: &RecorderView, event: &RecorderEvent) {
        if self.tx.send(event.clone()).is_err() {
            tracing::debug!("Event receiver dropped, discarding {:?}", event);
        }
    }
}
