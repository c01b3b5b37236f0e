use super::observer::RecorderObserver;
use crate::audio::container::{existing_frames, prepare_destination};
use crate::audio::{
    AudioFormat, AudioSink, CaptureContext, CaptureGuard, CaptureSource, CpalCapture, SinkContext,
    SinkProvider, WavSinkProvider,
};
use crate::config::Config;
use crate::error::RecorderError;
use crate::messages::{RecorderCommand, RecorderEvent, RecorderState};
use crate::status::StatusChecker;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;

const CHUNK_QUEUE_DEPTH: usize = 100;

struct Shared {
    path: PathBuf,
    format: AudioFormat,
    frames: AtomicU64,
    recording: AtomicBool,
    last_error: Mutex<Option<RecorderError>>,
    observer: RwLock<Option<Weak<dyn RecorderObserver>>>,
}

impl Shared {
    fn set_last_error(&self, error: Option<RecorderError>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }

    fn observer(&self) -> Option<Arc<dyn RecorderObserver>> {
        self.observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }
}

/// Read-only view of a recorder, handed to observers with every event
#[derive(Clone)]
pub struct RecorderView {
    shared: Arc<Shared>,
}

impl RecorderView {
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Total seconds stored in the destination, including audio that was
    /// there before this recorder opened it
    pub fn duration(&self) -> f64 {
        self.shared.format.duration_of_frames(self.frames())
    }

    pub fn frames(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }

    /// Error that ended the most recent record attempt, if it failed
    pub fn last_error(&self) -> Option<RecorderError> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> RecorderState {
        if self.is_recording() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.shared.recording.load(Ordering::Acquire)
    }
}

/// Records microphone audio onto the end of a WAV file
///
/// `record` and `stop` return immediately; the work happens on a dedicated
/// worker thread and outcomes are reported to the observer. Dropping the
/// recorder stops any recording in progress and waits for the file to be
/// finalized.
pub struct AppendingRecorder {
    cmd_tx: mpsc::UnboundedSender<RecorderCommand>,
    view: RecorderView,
    worker: Option<JoinHandle<()>>,
}

impl AppendingRecorder {
    /// Open `path` for appending with the default configuration and input device
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, RecorderError> {
        Self::builder(path).build()
    }

    pub fn builder(path: impl Into<PathBuf>) -> RecorderBuilder {
        RecorderBuilder {
            path: path.into(),
            config: Config::default(),
            capture: None,
            sinks: None,
            checker: StatusChecker::new(),
        }
    }

    /// Start recording to a new or appending to an existing file
    pub fn record(&self) {
        self.send(RecorderCommand::Record);
    }

    /// Stop recording
    pub fn stop(&self) {
        self.send(RecorderCommand::Stop);
    }

    /// Register `observer` without taking ownership of it
    pub fn set_observer<O: RecorderObserver + 'static>(&self, observer: &Arc<O>) {
        let weak: Weak<dyn RecorderObserver> = Arc::downgrade(observer) as Weak<dyn RecorderObserver>;
        *self
            .view
            .shared
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    pub fn clear_observer(&self) {
        *self
            .view
            .shared
            .observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn view(&self) -> &RecorderView {
        &self.view
    }

    pub fn path(&self) -> &Path {
        self.view.path()
    }

    pub fn duration(&self) -> f64 {
        self.view.duration()
    }

    pub fn last_error(&self) -> Option<RecorderError> {
        self.view.last_error()
    }

    pub fn state(&self) -> RecorderState {
        self.view.state()
    }

    pub fn is_recording(&self) -> bool {
        self.view.is_recording()
    }

    fn send(&self, cmd: RecorderCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::warn!("Recorder worker has exited, dropping {:?}", cmd);
        }
    }
}

impl Drop for AppendingRecorder {
    fn drop(&mut self) {
        self.send(RecorderCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Recorder worker panicked during shutdown");
            }
        }
    }
}

/// Configures and opens an [`AppendingRecorder`]
pub struct RecorderBuilder {
    path: PathBuf,
    config: Config,
    capture: Option<Box<dyn CaptureSource>>,
    sinks: Option<Box<dyn SinkProvider>>,
    checker: StatusChecker,
}

impl RecorderBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Capture from `capture` instead of the default cpal input
    pub fn capture(mut self, capture: impl CaptureSource + 'static) -> Self {
        self.capture = Some(Box::new(capture));
        self
    }

    /// Write each cycle through sinks opened by `sinks` instead of [`WavSinkProvider`]
    pub fn sinks(mut self, sinks: impl SinkProvider + 'static) -> Self {
        self.sinks = Some(Box::new(sinks));
        self
    }

    pub fn status_checker(mut self, checker: StatusChecker) -> Self {
        self.checker = checker;
        self
    }

    pub fn build(self) -> Result<AppendingRecorder, RecorderError> {
        let format = AudioFormat::default();
        let frames = prepare_destination(&self.path, format)?;

        let shared = Arc::new(Shared {
            path: self.path,
            format,
            frames: AtomicU64::new(frames),
            recording: AtomicBool::new(false),
            last_error: Mutex::new(None),
            observer: RwLock::new(None),
        });

        let capture: Box<dyn CaptureSource> = match self.capture {
            Some(capture) => capture,
            None => Box::new(CpalCapture::new(self.config.input_device.clone())),
        };
        let sinks = self
            .sinks
            .unwrap_or_else(|| Box::new(WavSinkProvider) as Box<dyn SinkProvider>);

        // cpal::Stream is !Send, so the worker runs on its own LocalSet
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let view = RecorderView { shared };
        let worker_view = view.clone();
        let config = self.config;
        let checker = self.checker;

        let worker = std::thread::Builder::new()
            .name("appending-recorder".into())
            .spawn(move || {
                let worker = RecorderWorker {
                    view: worker_view,
                    config,
                    capture,
                    sinks,
                    checker,
                    cmd_rx,
                    cycle: None,
                };
                let local = tokio::task::LocalSet::new();
                local.block_on(&runtime, worker.run());
            })?;

        tracing::info!(
            "Appending recorder ready for {:?} ({:.2}s already recorded)",
            view.path(),
            view.duration()
        );

        Ok(AppendingRecorder {
            cmd_tx,
            view,
            worker: Some(worker),
        })
    }
}

/// One record/stop cycle
struct ActiveCycle {
    guard: Box<dyn CaptureGuard>,
    audio_rx: mpsc::Receiver<Vec<f32>>,
    fault_rx: mpsc::UnboundedReceiver<RecorderError>,
    written_rx: mpsc::UnboundedReceiver<u64>,
    sink: Box<dyn AudioSink>,
    frames_since_flush: u64,
}

enum Step {
    Command(Option<RecorderCommand>),
    Chunk(Option<Vec<f32>>),
    Written(u64),
    Fault(RecorderError),
}

/// Owns capture and file I/O; runs on the recorder's worker thread
struct RecorderWorker {
    view: RecorderView,
    config: Config,
    capture: Box<dyn CaptureSource>,
    sinks: Box<dyn SinkProvider>,
    checker: StatusChecker,
    cmd_rx: mpsc::UnboundedReceiver<RecorderCommand>,
    cycle: Option<ActiveCycle>,
}

impl RecorderWorker {
    async fn run(mut self) {
        loop {
            let step = match self.cycle.as_mut() {
                None => Step::Command(self.cmd_rx.recv().await),
                Some(cycle) => tokio::select! {
                    biased;

                    Some(fault) = cycle.fault_rx.recv() => Step::Fault(fault),
                    cmd = self.cmd_rx.recv() => Step::Command(cmd),
                    Some(frames) = cycle.written_rx.recv() => Step::Written(frames),
                    chunk = cycle.audio_rx.recv() => Step::Chunk(chunk),
                },
            };

            match step {
                Step::Command(Some(RecorderCommand::Record)) => self.start_cycle(),
                Step::Command(Some(RecorderCommand::Stop)) => self.stop_cycle(None).await,
                Step::Command(Some(RecorderCommand::Shutdown)) | Step::Command(None) => {
                    self.stop_cycle(None).await;
                    break;
                }
                Step::Chunk(Some(chunk)) => self.write_chunk(chunk).await,
                Step::Written(frames) => {
                    self.view.shared.frames.fetch_add(frames, Ordering::AcqRel);
                    self.emit(RecorderEvent::Progress {
                        duration: self.view.duration(),
                    });
                }
                Step::Chunk(None) => {
                    let err = RecorderError::Device("Audio input ended unexpectedly".into());
                    self.stop_cycle(Some(err)).await;
                }
                Step::Fault(err) => self.stop_cycle(Some(err)).await,
            }
        }

        tracing::debug!("Recorder worker exiting");
    }

    fn format(&self) -> AudioFormat {
        self.view.shared.format
    }

    fn start_cycle(&mut self) {
        if self.cycle.is_some() {
            tracing::debug!("Already recording, ignoring record");
            return;
        }

        self.view.shared.set_last_error(None);

        match self.open_cycle() {
            Ok(cycle) => {
                self.cycle = Some(cycle);
                self.view.shared.recording.store(true, Ordering::Release);
                tracing::info!("Recording started");
            }
            Err(e) => self.fail(e),
        }
    }

    fn open_cycle(&mut self) -> Result<ActiveCycle, RecorderError> {
        let format = self.format();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let (written_tx, written_rx) = mpsc::unbounded_channel();
        let sink = self.sinks.open(
            &self.view.shared.path,
            format,
            SinkContext {
                written_tx,
                fault_tx: fault_tx.clone(),
            },
        )?;

        let (audio_tx, audio_rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
        let ctx = CaptureContext {
            chunk_tx: audio_tx,
            fault_tx,
            checker: self.checker.clone(),
            chunk_secs: self.config.chunk_secs,
            ring_buffer_secs: self.config.ring_buffer_secs,
        };

        // On failure the sink is dropped and its writer finalizes the untouched file
        let guard = self.capture.start(format, ctx)?;

        Ok(ActiveCycle {
            guard,
            audio_rx,
            fault_rx,
            written_rx,
            sink,
            frames_since_flush: 0,
        })
    }

    async fn write_chunk(&mut self, chunk: Vec<f32>) {
        let format = self.format();
        let flush_every = (self.config.header_flush_secs as f64 * format.sample_rate as f64).max(1.0) as u64;

        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };

        let frames = format.frames_in(chunk.len());
        if let Err(e) = cycle.sink.write_chunk(chunk) {
            self.stop_cycle(Some(e)).await;
            return;
        }

        cycle.frames_since_flush += frames;
        if cycle.frames_since_flush >= flush_every {
            cycle.frames_since_flush = 0;
            if let Err(e) = cycle.sink.flush_header() {
                tracing::warn!("Header refresh failed, continuing: {}", e);
            }
        }
    }

    /// End the current cycle, keeping every captured frame
    ///
    /// `fault` is the reason the cycle ended early; `None` means a requested stop.
    /// Afterwards `frames` matches the length recorded in the file header.
    async fn stop_cycle(&mut self, fault: Option<RecorderError>) {
        let Some(cycle) = self.cycle.take() else {
            return;
        };
        let ActiveCycle {
            guard,
            mut audio_rx,
            mut fault_rx,
            mut written_rx,
            mut sink,
            ..
        } = cycle;
        let mut fault = fault;

        guard.stop();

        let format = self.format();
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(self.config.drain_timeout_ms);
        let mut drained = 0u64;
        loop {
            match tokio::time::timeout_at(deadline, audio_rx.recv()).await {
                Ok(Some(chunk)) => {
                    let frames = format.frames_in(chunk.len());
                    if let Err(e) = sink.write_chunk(chunk) {
                        fault.get_or_insert(e);
                        break;
                    }
                    drained += frames;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!("Timed out waiting for audio input to drain");
                    break;
                }
            }
        }
        tracing::debug!("Drained {} frames after stop", drained);

        if let Err(e) = sink.finalize().await {
            fault.get_or_insert(e);
        }
        while let Ok(e) = fault_rx.try_recv() {
            fault.get_or_insert(e);
        }
        while let Ok(frames) = written_rx.try_recv() {
            self.view.shared.frames.fetch_add(frames, Ordering::AcqRel);
        }

        // The header is what a later open will report
        match existing_frames(&self.view.shared.path, format) {
            Ok(on_disk) => {
                let counted = self.view.shared.frames.swap(on_disk, Ordering::AcqRel);
                if counted != on_disk {
                    tracing::warn!(
                        "Counted {} frames but the file holds {}, using the file",
                        counted,
                        on_disk
                    );
                }
            }
            Err(e) => tracing::warn!("Could not re-read recording length: {}", e),
        }

        self.view.shared.recording.store(false, Ordering::Release);

        match fault {
            None => {
                tracing::info!("Recording stopped ({:.2}s total)", self.view.duration());
                self.emit(RecorderEvent::Stopped {
                    duration: self.view.duration(),
                });
            }
            Some(e) => self.fail(e),
        }
    }

    fn fail(&self, err: RecorderError) {
        tracing::error!("Recording failed: {}", err);
        self.view.shared.set_last_error(Some(err.clone()));
        self.emit(RecorderEvent::Error(err));
    }

    fn emit(&self, event: RecorderEvent) {
        match self.view.shared.observer() {
            Some(observer) => observer.on_event(&self.view, &event),
            None => tracing::debug!("No observer registered for {:?}", event),
        }
    }
}
