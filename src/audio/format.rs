// NOTE: Recordings are always 16-bit signed integer PCM, mono, at
// RECORDING_SAMPLE_RATE. Appending to a file with any other layout is rejected.

use hound::{SampleFormat, WavSpec};

/// Sample rate of every recording, in Hz
pub const RECORDING_SAMPLE_RATE: u32 = 44_100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub const BITS_PER_SAMPLE: u16 = 16;

    /// Calculate number of samples for a given duration in seconds
    pub fn samples_for_duration(&self, seconds: f32) -> usize {
        (self.sample_rate as f32 * seconds) as usize * self.channels as usize
    }

    /// Seconds of audio represented by `frames` frames
    pub fn duration_of_frames(&self, frames: u64) -> f64 {
        frames as f64 / self.sample_rate as f64
    }

    /// Number of whole frames in `samples` interleaved samples
    pub fn frames_in(&self, samples: usize) -> u64 {
        (samples / self.channels.max(1) as usize) as u64
    }

    pub fn wav_spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: Self::BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: RECORDING_SAMPLE_RATE,
            channels: 1,
        }
    }
}
