//! WAV buffer format checks.
//!
//! The recogniser only accepts the exact format the recorder is told to
//! produce: mono, 16-bit signed integer PCM, 16 kHz.  Anything else is a
//! [`FormatError::Mismatch`]; nothing is resampled.

use std::fmt;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};
use thiserror::Error;

/// The subset of a WAV header the pipeline cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub integer: bool,
}

impl WavFormat {
    /// Recorder output / recogniser input: mono, 16-bit PCM, 16 kHz.
    pub const SPEECH_16K: WavFormat = WavFormat {
        channels: 1,
        bits_per_sample: 16,
        sample_rate: 16_000,
        integer: true,
    };
}

impl From<WavSpec> for WavFormat {
    fn from(spec: WavSpec) -> Self {
        Self {
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            sample_rate: spec.sample_rate,
            integer: spec.sample_format == SampleFormat::Int,
        }
    }
}

impl fmt::Display for WavFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ch, {}-bit {}, {} Hz",
            self.channels,
            self.bits_per_sample,
            if self.integer { "int" } else { "float" },
            self.sample_rate
        )
    }
}

/// Why a buffer was rejected.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The file could not be opened or parsed as WAV.
    #[error("cannot read WAV {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: hound::Error,
    },

    /// The file is a WAV but not in the expected format.
    #[error("WAV format mismatch: expected {expected}, found {found}")]
    Mismatch { expected: WavFormat, found: WavFormat },
}

/// Open `path` and check its header against `expected`.
///
/// On success the open reader is returned, positioned at the first sample.
pub fn open_checked(
    path: &Path,
    expected: WavFormat,
) -> Result<WavReader<std::io::BufReader<std::fs::File>>, FormatError> {
    let reader = WavReader::open(path).map_err(|source| FormatError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let found = WavFormat::from(reader.spec());
    if found != expected {
        return Err(FormatError::Mismatch { expected, found });
    }

    Ok(reader)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use hound::WavWriter;
    use tempfile::tempdir;

    /// Write `frames` frames of a quiet square wave with the given spec.
    pub(crate) fn write_wav(path: &Path, spec: WavSpec, frames: usize) {
        let mut w = WavWriter::create(path, spec).unwrap();
        for i in 0..frames * spec.channels as usize {
            let v = if (i / 40) % 2 == 0 { 1_000 } else { -1_000 };
            match (spec.sample_format, spec.bits_per_sample) {
                (SampleFormat::Int, 8) => w.write_sample((v / 256) as i8).unwrap(),
                (SampleFormat::Int, 16) => w.write_sample(v as i16).unwrap(),
                (SampleFormat::Float, 32) => w.write_sample(v as f32 / 32_768.0).unwrap(),
                _ => w.write_sample(v).unwrap(),
            }
        }
        w.finalize().unwrap();
    }

    pub(crate) fn spec(channels: u16, bits: u16, rate: u32) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn accepts_speech_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.wav");
        write_wav(&path, spec(1, 16, 16_000), 1_600);

        let reader = open_checked(&path, WavFormat::SPEECH_16K).unwrap();
        assert_eq!(reader.len(), 1_600);
    }

    #[test]
    fn rejects_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, spec(2, 16, 16_000), 100);

        let err = open_checked(&path, WavFormat::SPEECH_16K).err().unwrap();
        match err {
            FormatError::Mismatch { found, .. } => assert_eq!(found.channels, 2),
            other => panic!("expected Mismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_wrong_rate_and_width() {
        let dir = tempdir().unwrap();

        let rate = dir.path().join("rate.wav");
        write_wav(&rate, spec(1, 16, 44_100), 100);
        assert!(matches!(
            open_checked(&rate, WavFormat::SPEECH_16K),
            Err(FormatError::Mismatch { .. })
        ));

        let width = dir.path().join("width.wav");
        write_wav(&width, spec(1, 8, 16_000), 100);
        assert!(matches!(
            open_checked(&width, WavFormat::SPEECH_16K),
            Err(FormatError::Mismatch { .. })
        ));
    }

    #[test]
    fn garbage_file_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();
        assert!(matches!(
            open_checked(&path, WavFormat::SPEECH_16K),
            Err(FormatError::Read { .. })
        ));
    }

    #[test]
    fn mismatch_message_names_both_formats() {
        let err = FormatError::Mismatch {
            expected: WavFormat::SPEECH_16K,
            found: WavFormat {
                channels: 2,
                ..WavFormat::SPEECH_16K
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("1 ch"));
        assert!(msg.contains("2 ch"));
    }
}
