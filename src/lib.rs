//! Record microphone audio onto the end of a WAV file.
//!
//! [`AppendingRecorder`] keeps appending across record/stop cycles and across
//! re-opening the same file. Platform status codes are checked through
//! [`status::StatusChecker`].

pub mod audio;
pub mod config;
pub mod error;
pub mod messages;
pub mod services;
pub mod status;

pub use audio::RECORDING_SAMPLE_RATE;
pub use config::Config;
pub use error::{ErrorKind, RecorderError};
pub use messages::{RecorderEvent, RecorderState};
pub use services::{AppendingRecorder, ChannelObserver, RecorderObserver, RecorderView};
pub use status::{OsStatus, StatusChecker, check_status};
