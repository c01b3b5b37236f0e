use crate::error::RecorderError;

/// Commands for the recorder worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Record,
    Stop,
    Shutdown,
}

/// Recorder state (readable from any thread)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Events delivered to the recorder's observer
///
/// A record cycle produces zero or more `Progress` events followed by exactly
/// one `Stopped` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// More audio was appended; `duration` is the new total in seconds
    Progress { duration: f64 },
    /// Recording stopped and the file was finalized
    Stopped { duration: f64 },
    /// The cycle ended because of this error; also available from `last_error`
    Error(RecorderError),
}

impl RecorderEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress { .. })
    }
}
