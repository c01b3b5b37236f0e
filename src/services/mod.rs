pub mod observer;
pub mod recorder;

pub use observer::{ChannelObserver, RecorderObserver};
pub use recorder::{AppendingRecorder, RecorderBuilder, RecorderView};
