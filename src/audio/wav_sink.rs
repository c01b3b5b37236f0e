use super::format::AudioFormat;
use super::sink::{AudioSink, SinkContext, SinkProvider};
use crate::error::RecorderError;
use async_trait::async_trait;
use hound::WavWriter;
use std::path::Path;
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    WriteChunk(Vec<f32>),
    FlushHeader,
    Finalize {
        reply: oneshot::Sender<Result<(), RecorderError>>,
    },
}

/// WAV appender using a dedicated blocking thread for I/O
///
/// The file is opened in append mode: new samples land after the existing
/// data and the header lengths are rewritten on flush and finalize. Frames are
/// reported on `written_tx` only once `write_sample` accepted them. A write
/// failure is reported once on `fault_tx`; later chunks are discarded so the
/// frames already on disk stay intact.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
}

impl WavSink {
    pub fn append(path: &Path, format: AudioFormat, ctx: SinkContext) -> Result<Self, RecorderError> {
        let mut writer = WavWriter::append(path)?;

        if writer.spec() != format.wav_spec() {
            return Err(RecorderError::Format(format!(
                "{} changed layout since it was opened",
                path.display()
            )));
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let channels = format.channels.max(1) as usize;

        std::thread::Builder::new()
            .name("wav-writer".into())
            .spawn(move || {
                let mut failed = false;

                while let Some(cmd) = rx.blocking_recv() {
                    match cmd {
                        WavCommand::WriteChunk(samples) => {
                            if failed {
                                continue;
                            }
                            let mut written = 0usize;
                            for sample in samples {
                                // Convert f32 (-1.0 to 1.0) to i16
                                let amplitude = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                                if let Err(e) = writer.write_sample(amplitude) {
                                    tracing::error!("Failed to write sample: {}", e);
                                    let _ = ctx.fault_tx.send(e.into());
                                    failed = true;
                                    break;
                                }
                                written += 1;
                            }
                            let frames = (written / channels) as u64;
                            if frames > 0 {
                                let _ = ctx.written_tx.send(frames);
                            }
                        }
                        WavCommand::FlushHeader => {
                            if let Err(e) = writer.flush() {
                                tracing::warn!("Failed to refresh WAV header: {}", e);
                            }
                        }
                        WavCommand::Finalize { reply } => {
                            let result = writer.finalize().map_err(RecorderError::from);
                            let _ = reply.send(result);
                            break;
                        }
                    }
                }
            })?;

        Ok(Self { tx })
    }

    fn send(&self, cmd: WavCommand) -> Result<(), RecorderError> {
        self.tx
            .send(cmd)
            .map_err(|_| RecorderError::Io("WAV writer thread has exited".into()))
    }
}

/// Opens a [`WavSink`] on the destination for every cycle
#[derive(Debug, Default, Clone, Copy)]
pub struct WavSinkProvider;

impl SinkProvider for WavSinkProvider {
    fn open(
        &mut self,
        path: &Path,
        format: AudioFormat,
        ctx: SinkContext,
    ) -> Result<Box<dyn AudioSink>, RecorderError> {
        Ok(Box::new(WavSink::append(path, format, ctx)?))
    }
}

#[async_trait]
impl AudioSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<(), RecorderError> {
        self.send(WavCommand::WriteChunk(samples))
    }

    fn flush_header(&mut self) -> Result<(), RecorderError> {
        self.send(WavCommand::FlushHeader)
    }

    async fn finalize(&mut self) -> Result<(), RecorderError> {
        let (reply, rx) = oneshot::channel();
        self.send(WavCommand::Finalize { reply })?;

        rx.await
            .map_err(|_| RecorderError::Io("WAV writer exited before finalizing".into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::container::{existing_frames, prepare_destination};
    use hound::WavReader;

    fn context() -> (
        SinkContext,
        mpsc::UnboundedReceiver<u64>,
        mpsc::UnboundedReceiver<RecorderError>,
    ) {
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        (SinkContext { written_tx, fault_tx }, written_rx, fault_rx)
    }

    #[tokio::test]
    async fn test_appends_after_existing_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("take.wav");
        let format = AudioFormat::default();
        prepare_destination(&path, format).unwrap();
        let (ctx, mut written_rx, mut fault_rx) = context();

        let mut sink = WavSink::append(&path, format, ctx.clone()).unwrap();
        sink.write_chunk(vec![0.5; 100]).unwrap();
        sink.finalize().await.unwrap();

        let mut sink = WavSink::append(&path, format, ctx).unwrap();
        sink.write_chunk(vec![-0.5; 50]).unwrap();
        sink.flush_header().unwrap();
        sink.finalize().await.unwrap();

        assert_eq!(existing_frames(&path, format).unwrap(), 150);
        let samples: Vec<i16> = WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert!(samples[..100].iter().all(|&s| s > 0));
        assert!(samples[100..].iter().all(|&s| s < 0));

        assert_eq!(written_rx.try_recv().ok(), Some(100));
        assert_eq!(written_rx.try_recv().ok(), Some(50));
        assert!(written_rx.try_recv().is_err());
        assert!(fault_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_samples_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loud.wav");
        let format = AudioFormat::default();
        prepare_destination(&path, format).unwrap();
        let (ctx, _written_rx, _fault_rx) = context();

        let mut sink = WavSink::append(&path, format, ctx).unwrap();
        sink.write_chunk(vec![4.0, -4.0]).unwrap();
        sink.finalize().await.unwrap();

        let samples: Vec<i16> = WavReader::open(&path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(samples, vec![i16::MAX, -i16::MAX]);
    }

    #[test]
    fn test_append_to_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _written_rx, _fault_rx) = context();

        let result = WavSinkProvider.open(&dir.path().join("missing.wav"), AudioFormat::default(), ctx);
        assert_eq!(result.err().map(|e| e.kind()), Some(crate::error::ErrorKind::Io));
    }
}
