//! Sample conversion for playback.
//!
//! Synthesised speech arrives as 16-bit PCM at the voice's native rate
//! (22 050 Hz for most Piper voices).  The output device may run at a
//! different rate and channel count, so each block is downmixed to mono
//! `f32` and fed through one [`StreamResampler`] per clip before it reaches
//! the cpal callback.
//!
//! The resampler keeps its filter state across blocks: splitting a clip into
//! blocks of any size yields exactly the same output as resampling it whole.

use rubato::{FftFixedIn, ResampleError, Resampler, ResamplerConstructionError};

/// FFT sub-chunks per input chunk.
const SUB_CHUNKS: usize = 2;

/// Upper bound on flush passes in [`StreamResampler::finish`].
const MAX_FLUSH_PASSES: usize = 16;

// ---------------------------------------------------------------------------
// downmix_i16
// ---------------------------------------------------------------------------

/// Convert interleaved `i16` frames to mono `f32` in `[-1.0, 1.0]` by
/// averaging the channels of each frame.
///
/// A trailing partial frame is dropped.  `channels == 0` yields nothing.
pub fn downmix_i16(samples: &[i16], channels: usize) -> Vec<f32> {
    if channels == 0 {
        return Vec::new();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: f32 = frame.iter().map(|&s| f32::from(s) / 32_768.0).sum();
            sum / channels as f32
        })
        .collect()
}

// ---------------------------------------------------------------------------
// StreamResampler
// ---------------------------------------------------------------------------

/// Mono resampler for one clip, fed block by block.
///
/// Input is buffered and handed to `rubato` in fixed chunks; the filter
/// delay is trimmed from the head and [`finish`](Self::finish) flushes the
/// tail so the clip comes out `ceil(n * to_rate / from_rate)` samples long.
/// Equal rates pass samples through untouched.
pub struct StreamResampler {
    inner: Option<FftFixedIn<f32>>,
    pending: Vec<f32>,
    ratio: f64,
    skip: usize,
    consumed: usize,
    emitted: usize,
}

impl StreamResampler {
    pub fn new(
        from_rate: u32,
        to_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, ResamplerConstructionError> {
        let inner = if from_rate == to_rate {
            None
        } else {
            Some(FftFixedIn::<f32>::new(
                from_rate as usize,
                to_rate as usize,
                chunk_size.max(1),
                SUB_CHUNKS,
                1,
            )?)
        };
        let skip = inner.as_ref().map_or(0, |r| r.output_delay());

        Ok(Self {
            inner,
            pending: Vec::new(),
            ratio: f64::from(to_rate) / f64::from(from_rate.max(1)),
            skip,
            consumed: 0,
            emitted: 0,
        })
    }

    /// Output length for everything pushed so far.
    fn expected_len(&self) -> usize {
        (self.consumed as f64 * self.ratio).ceil() as usize
    }

    /// Feed the next block; returns whatever output is ready.
    pub fn push(&mut self, samples: &[f32]) -> Result<Vec<f32>, ResampleError> {
        self.consumed += samples.len();
        let Some(inner) = self.inner.as_mut() else {
            self.emitted += samples.len();
            return Ok(samples.to_vec());
        };

        self.pending.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.pending.len() >= inner.input_frames_next() {
            let chunk: Vec<f32> = self.pending.drain(..inner.input_frames_next()).collect();
            let produced = inner.process(&[chunk], None)?;
            take_channel(produced, &mut self.skip, &mut out);
        }
        self.emitted += out.len();
        Ok(out)
    }

    /// Flush buffered input and the filter tail.  The resampler is spent
    /// afterwards.
    pub fn finish(&mut self) -> Result<Vec<f32>, ResampleError> {
        let expected = self.expected_len();
        let Some(inner) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            let produced = inner.process_partial(Some(&[rest][..]), None)?;
            take_channel(produced, &mut self.skip, &mut out);
        }
        for _ in 0..MAX_FLUSH_PASSES {
            if self.emitted + out.len() >= expected {
                break;
            }
            let produced = inner.process_partial(None::<&[Vec<f32>]>, None)?;
            take_channel(produced, &mut self.skip, &mut out);
        }

        out.truncate(expected.saturating_sub(self.emitted));
        self.emitted += out.len();
        Ok(out)
    }
}

/// Append the single channel of `produced` to `out`, dropping the first
/// `skip` samples of delay.
fn take_channel(produced: Vec<Vec<f32>>, skip: &mut usize, out: &mut Vec<f32>) {
    let Some(channel) = produced.into_iter().next() else {
        return;
    };
    let dropped = (*skip).min(channel.len());
    *skip -= dropped;
    out.extend_from_slice(&channel[dropped..]);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Resample `input` by pushing it in blocks of `block` samples.
    fn blockwise(input: &[f32], from: u32, to: u32, block: usize) -> Vec<f32> {
        let mut r = StreamResampler::new(from, to, 1_024).unwrap();
        let mut out = Vec::new();
        for b in input.chunks(block) {
            out.extend(r.push(b).unwrap());
        }
        out.extend(r.finish().unwrap());
        out
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| i as f32 / len as f32).collect()
    }

    #[test]
    fn downmix_mono_scales_only() {
        let out = downmix_i16(&[16_384, -16_384, 0], 1);
        assert_eq!(out.len(), 3);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!((out[1] + 0.5).abs() < 1e-6);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn downmix_stereo_averages_and_drops_partial_frame() {
        // L R | L R | L
        let out = downmix_i16(&[16_384, 0, -16_384, -16_384, 100], 2);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.25).abs() < 1e-6);
        assert!((out[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_i16(&[1, 2, 3], 0).is_empty());
    }

    #[test]
    fn same_rate_passes_through() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(blockwise(&input, 22_050, 22_050, 2), input);
    }

    #[test]
    fn blockwise_matches_whole_clip() {
        // One second of a 22.05 kHz ramp played on a 48 kHz device.
        let input = ramp(22_050);
        let whole = blockwise(&input, 22_050, 48_000, input.len());
        let blocks = blockwise(&input, 22_050, 48_000, 1_024);
        let uneven = blockwise(&input, 22_050, 48_000, 777);

        assert_eq!(whole.len(), 48_000);
        assert_eq!(blocks, whole);
        assert_eq!(uneven, whole);
    }

    #[test]
    fn clip_length_follows_rate_ratio() {
        assert_eq!(blockwise(&ramp(1_000), 22_050, 44_100, 1_024).len(), 2_000);
        assert_eq!(blockwise(&ramp(4_800), 48_000, 16_000, 1_024).len(), 1_600);
        // ceil(100 * 48000 / 22050) = 218
        assert_eq!(blockwise(&ramp(100), 22_050, 48_000, 1_024).len(), 218);
    }

    #[test]
    fn constant_level_survives_block_boundaries() {
        let input = vec![0.5_f32; 22_050];
        let out = blockwise(&input, 22_050, 48_000, 1_024);

        // Skip the filter's edge transients.
        let body = &out[2_400..out.len() - 2_400];
        assert!(
            body.iter().all(|&s| (s - 0.5).abs() < 0.02),
            "level drifted at a block boundary"
        );
    }

    #[test]
    fn empty_input() {
        assert!(blockwise(&[], 22_050, 48_000, 1_024).is_empty());
    }
}
