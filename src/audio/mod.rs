pub mod capture;
pub mod container;
pub mod format;
pub mod sink;
pub mod synthetic;
pub mod wav_sink;

pub use capture::{CaptureContext, CaptureGuard, CaptureSource, CpalCapture};
pub use format::{AudioFormat, RECORDING_SAMPLE_RATE};
pub use sink::{AudioSink, SinkContext, SinkProvider};
pub use synthetic::SyntheticCapture;
pub use wav_sink::{WavSink, WavSinkProvider};
