use super::format::AudioFormat;
use crate::error::RecorderError;
use crate::status::{OsStatus, StatusChecker};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, mpsc, oneshot};

const DEVICE_NOT_AVAILABLE: OsStatus = OsStatus::from_four_cc(b"!dev");
const BACKEND_FAILURE: OsStatus = OsStatus::from_four_cc(b"back");
const RING_OVERFLOW: OsStatus = OsStatus::from_four_cc(b"ovfl");

/// Everything a capture source needs to deliver audio for one record cycle
pub struct CaptureContext {
    /// Interleaved f32 chunks. The source must drop every sender once its
    /// guard has been stopped and residual samples were sent.
    pub chunk_tx: mpsc::Sender<Vec<f32>>,
    /// Failures that should end the cycle
    pub fault_tx: mpsc::UnboundedSender<RecorderError>,
    pub checker: StatusChecker,
    pub chunk_secs: f32,
    pub ring_buffer_secs: f32,
}

/// Keeps a capture running; stopping it ends delivery of new samples
pub trait CaptureGuard {
    fn stop(self: Box<Self>);
}

/// Something that can produce input audio
pub trait CaptureSource: Send {
    fn start(
        &mut self,
        format: AudioFormat,
        ctx: CaptureContext,
    ) -> Result<Box<dyn CaptureGuard>, RecorderError>;
}

/// Microphone capture through cpal
#[derive(Debug, Default, Clone)]
pub struct CpalCapture {
    device_name: Option<String>,
}

struct CpalGuard {
    stream: cpal::Stream,
    stop_tx: oneshot::Sender<()>,
}

impl CaptureGuard for CpalGuard {
    fn stop(self: Box<Self>) {
        let CpalGuard { stream, stop_tx } = *self;
        // Dropping the stream halts the callback before the bridge flushes
        drop(stream);
        let _ = stop_tx.send(());
    }
}

impl CpalCapture {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn find_device(&self, host: &cpal::Host) -> Result<cpal::Device, RecorderError> {
        let Some(wanted) = &self.device_name else {
            return host
                .default_input_device()
                .ok_or_else(|| RecorderError::Device("No input audio device available".into()));
        };

        let devices = host
            .input_devices()
            .map_err(|e| RecorderError::Device(format!("Failed to list input devices: {}", e)))?;

        for device in devices {
            if device.name().is_ok_and(|name| &name == wanted) {
                return Ok(device);
            }
        }

        Err(RecorderError::Device(format!("Input device {:?} not found", wanted)))
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
        mut stop_rx: oneshot::Receiver<()>,
        overflowed: Arc<AtomicUsize>,
        checker: StatusChecker,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {}
                _ = &mut stop_rx => break,
            }

            let dropped = overflowed.swap(0, Ordering::Relaxed);
            if dropped > 0 && checker.check_status(RING_OVERFLOW, "Input ring buffer push").is_err() {
                tracing::warn!("Dropped {} input samples", dropped);
            }

            while consumer.occupied_len() >= chunk_size {
                let mut chunk = vec![0.0f32; chunk_size];
                let n = consumer.pop_slice(&mut chunk);
                chunk.truncate(n);

                if tx.send(chunk).await.is_err() {
                    return;
                }
            }
        }

        let remaining = consumer.occupied_len();
        if remaining > 0 {
            let mut chunk = vec![0.0f32; remaining];
            let n = consumer.pop_slice(&mut chunk);
            chunk.truncate(n);
            let _ = tx.send(chunk).await;
        }
        tracing::debug!("Capture bridge flushed {} residual samples", remaining);
    }
}

impl CaptureSource for CpalCapture {
    /// Start audio capture
    ///
    /// The realtime callback only pushes into a ring buffer; a bridge task on
    /// the current LocalSet slices it into chunks for `ctx.chunk_tx`.
    fn start(
        &mut self,
        format: AudioFormat,
        ctx: CaptureContext,
    ) -> Result<Box<dyn CaptureGuard>, RecorderError> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(ctx.ring_buffer_secs).max(1));
        let (mut producer, consumer) = ring.split();

        let host = cpal::default_host();
        let device = self.find_device(&host)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };

        let notify = Arc::new(Notify::new());
        let notify_callback = notify.clone();
        let overflowed = Arc::new(AtomicUsize::new(0));
        let overflowed_callback = overflowed.clone();

        let fault_tx = ctx.fault_tx.clone();
        let error_checker = ctx.checker.clone();

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let pushed = producer.push_slice(data);
                    if pushed < data.len() {
                        overflowed_callback.fetch_add(data.len() - pushed, Ordering::Relaxed);
                    }
                    notify_callback.notify_one();
                },
                move |err| {
                    let status = match &err {
                        cpal::StreamError::DeviceNotAvailable => DEVICE_NOT_AVAILABLE,
                        _ => BACKEND_FAILURE,
                    };
                    if error_checker.check_status(status, "Input stream").is_err() {
                        let _ = fault_tx.send(RecorderError::Device(err.to_string()));
                    }
                },
                None,
            )
            .map_err(|e| RecorderError::Device(format!("Failed to build input stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| RecorderError::Device(format!("Failed to start audio stream: {}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let chunk_size = format
            .samples_for_duration(ctx.chunk_secs)
            .max(format.channels as usize);
        tokio::task::spawn_local(Self::bridge_task(
            consumer,
            ctx.chunk_tx,
            chunk_size,
            notify,
            stop_rx,
            overflowed,
            ctx.checker,
        ));

        tracing::info!("Audio capture started");
        Ok(Box::new(CpalGuard { stream, stop_tx }))
    }
}
