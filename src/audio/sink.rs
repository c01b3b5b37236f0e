use super::format::AudioFormat;
use crate::error::RecorderError;
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

/// Channels a sink reports through for one record cycle
#[derive(Clone)]
pub struct SinkContext {
    /// Frames that actually reached the sink's storage, sent as they are written
    pub written_tx: mpsc::UnboundedSender<u64>,
    /// Failures that should end the cycle
    pub fault_tx: mpsc::UnboundedSender<RecorderError>,
}

/// Trait for streaming audio encoding
///
/// Implementations write audio samples to the destination as they arrive
/// rather than buffering the whole take.
#[async_trait]
pub trait AudioSink: Send {
    /// Write audio samples (streaming, called repeatedly during recording)
    /// The Vec is moved to avoid copying
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<(), RecorderError>;

    /// Bring the on-disk header up to date with what has been written so far
    fn flush_header(&mut self) -> Result<(), RecorderError>;

    /// Finalize and close the sink
    ///
    /// Every `written_tx` report for this sink has been sent once this returns.
    async fn finalize(&mut self) -> Result<(), RecorderError>;
}

/// Opens the sink for each record cycle
pub trait SinkProvider: Send {
    fn open(
        &mut self,
        path: &Path,
        format: AudioFormat,
        ctx: SinkContext,
    ) -> Result<Box<dyn AudioSink>, RecorderError>;
}
