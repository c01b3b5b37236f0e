use super::format::AudioFormat;
use crate::error::RecorderError;
use hound::{WavReader, WavWriter};
use std::path::Path;

/// Make sure `path` holds a WAVE file in `format`, creating an empty one if
/// nothing is there yet.
///
/// Returns the number of frames already stored in the file.
pub fn prepare_destination(path: &Path, format: AudioFormat) -> Result<u64, RecorderError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(RecorderError::Io(format!(
                "Destination directory does not exist: {}",
                parent.display()
            )));
        }
    }

    if path.exists() {
        let frames = existing_frames(path, format)?;
        tracing::debug!("Appending to {:?} ({} existing frames)", path, frames);
        return Ok(frames);
    }

    WavWriter::create(path, format.wav_spec())
        .and_then(|writer| writer.finalize())
        .map_err(|e| match RecorderError::from(e) {
            RecorderError::Io(msg) => {
                RecorderError::Io(format!("Failed to create {}: {}", path.display(), msg))
            }
            other => other,
        })?;

    tracing::debug!("Created new recording file {:?}", path);
    Ok(0)
}

/// Read the length in frames of an existing recording, rejecting files whose
/// layout differs from `format`.
pub fn existing_frames(path: &Path, format: AudioFormat) -> Result<u64, RecorderError> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let expected = format.wav_spec();

    if spec != expected {
        return Err(RecorderError::Format(format!(
            "{} is {} Hz / {} ch / {}-bit {:?}, expected {} Hz / {} ch / {}-bit {:?}",
            path.display(),
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format,
            expected.sample_rate,
            expected.channels,
            expected.bits_per_sample,
            expected.sample_format,
        )));
    }

    Ok(reader.duration() as u64)
}
