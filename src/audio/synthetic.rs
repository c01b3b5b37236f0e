use super::capture::{CaptureContext, CaptureGuard, CaptureSource};
use super::format::AudioFormat;
use crate::error::RecorderError;
use crate::status::OsStatus;
use std::f64::consts::TAU;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, interval_at};

/// Sine tone input paced in real time
///
/// Stands in for a microphone on machines without one. Can also simulate a
/// platform failure after a fixed number of chunks.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    frequency_hz: f64,
    amplitude: f32,
    fail_after: Option<(usize, OsStatus)>,
}

impl Default for SyntheticCapture {
    fn default() -> Self {
        Self {
            frequency_hz: 440.0,
            amplitude: 0.25,
            fail_after: None,
        }
    }
}

struct SyntheticGuard {
    stop_tx: oneshot::Sender<()>,
}

impl CaptureGuard for SyntheticGuard {
    fn stop(self: Box<Self>) {
        let _ = self.stop_tx.send(());
    }
}

impl SyntheticCapture {
    pub fn new(frequency_hz: f64, amplitude: f32) -> Self {
        Self {
            frequency_hz,
            amplitude,
            fail_after: None,
        }
    }

    /// Deliver `chunks` chunks, then report `status` from the render call
    pub fn failing_after(mut self, chunks: usize, status: OsStatus) -> Self {
        self.fail_after = Some((chunks, status));
        self
    }
}

impl CaptureSource for SyntheticCapture {
    fn start(
        &mut self,
        format: AudioFormat,
        ctx: CaptureContext,
    ) -> Result<Box<dyn CaptureGuard>, RecorderError> {
        let frames_per_chunk = format.samples_for_duration(ctx.chunk_secs) / format.channels.max(1) as usize;
        if frames_per_chunk == 0 {
            return Err(RecorderError::Device("Chunk duration is shorter than one frame".into()));
        }

        let period = Duration::from_secs_f64(frames_per_chunk as f64 / format.sample_rate as f64);
        let step = TAU * self.frequency_hz / format.sample_rate as f64;
        let amplitude = self.amplitude;
        let fail_after = self.fail_after;
        let (stop_tx, mut stop_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut phase = 0.0f64;
            let mut delivered = 0usize;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = &mut stop_rx => break,
                }

                if let Some((after, status)) = fail_after {
                    if delivered >= after {
                        if let Err(e) = ctx.checker.check_status(status, "Synthetic input render") {
                            let _ = ctx.fault_tx.send(e.into());
                        }
                        break;
                    }
                }

                let mut chunk = Vec::with_capacity(frames_per_chunk * format.channels as usize);
                for _ in 0..frames_per_chunk {
                    let sample = amplitude * phase.sin() as f32;
                    phase = (phase + step) % TAU;
                    chunk.extend(std::iter::repeat_n(sample, format.channels as usize));
                }

                if ctx.chunk_tx.send(chunk).await.is_err() {
                    break;
                }
                delivered += 1;
            }

            tracing::debug!("Synthetic capture delivered {} chunks", delivered);
        });

        tracing::info!("Synthetic capture started ({} Hz tone)", self.frequency_hz);
        Ok(Box::new(SyntheticGuard { stop_tx }))
    }
}
