//! Speaker output via `cpal`.
//!
//! [`CpalSink::play_wav`] streams a WAV file to the default output device in
//! blocks of `frame_size` frames:
//!
//! ```text
//! WavReader ──frame_size frames──▶ downmix + StreamResampler ──sync_channel──▶ cpal callback
//! ```
//!
//! One resampler serves the whole clip, so block boundaries are seamless.
//!
//! The reader thread blocks until the callback has drained every block, then
//! drops the stream.  Nothing plays after `play_wav` returns.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use hound::{SampleFormat, WavReader};
use thiserror::Error;

use super::format::WavFormat;
use super::resample::{downmix_i16, StreamResampler};

/// Blocks buffered between the reader and the audio callback.
const BLOCKS_IN_FLIGHT: usize = 4;

/// Extra time allowed beyond the clip's nominal duration.
const DRAIN_MARGIN: Duration = Duration::from_millis(1_500);

/// Lets the device flush its own buffer before the stream is dropped.
const TAIL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("cannot read WAV {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: hound::Error,
    },

    #[error("unsupported WAV format for playback: {0}")]
    Unsupported(WavFormat),

    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("cannot build resampler: {0}")]
    Resampler(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Resample(#[from] rubato::ResampleError),

    #[error("output device stopped consuming audio")]
    Stalled,
}

// ---------------------------------------------------------------------------
// AudioSink
// ---------------------------------------------------------------------------

/// Plays a finished WAV file, blocking until playback ends.
pub trait AudioSink: Send + Sync {
    fn play_wav(&self, path: &Path) -> Result<(), PlaybackError>;
}

// ---------------------------------------------------------------------------
// CpalSink
// ---------------------------------------------------------------------------

/// Default output device of the default cpal host.
#[derive(Debug, Clone)]
pub struct CpalSink {
    frame_size: usize,
}

impl CpalSink {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
        }
    }
}

impl AudioSink for CpalSink {
    fn play_wav(&self, path: &Path) -> Result<(), PlaybackError> {
        let mut reader = WavReader::open(path).map_err(|source| PlaybackError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int
            || spec.bits_per_sample != 16
            || spec.channels == 0
            || spec.sample_rate == 0
        {
            return Err(PlaybackError::Unsupported(WavFormat::from(spec)));
        }

        let total_frames = u64::from(reader.duration());
        if total_frames == 0 {
            log::debug!("playback: {} is empty", path.display());
            return Ok(());
        }
        let nominal = Duration::from_millis(total_frames * 1_000 / u64::from(spec.sample_rate));

        let device = cpal::default_host()
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;
        let (config, device_rate) = output_config(&device, spec.sample_rate)?;
        let out_channels = usize::from(config.channels);

        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(BLOCKS_IN_FLIGHT);
        let finished = Arc::new(AtomicBool::new(false));
        let mut feed = BlockFeed::new(rx, Arc::clone(&finished));

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| feed.fill(data, out_channels),
            |err: cpal::StreamError| {
                log::error!("cpal output stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        let deadline = Instant::now() + nominal + DRAIN_MARGIN;
        let in_channels = usize::from(spec.channels);
        let block_len = self.frame_size * in_channels;
        let mut samples = reader.samples::<i16>();
        let mut resampler = StreamResampler::new(spec.sample_rate, device_rate, self.frame_size)?;
        let mut connected = true;

        while connected {
            let block = samples
                .by_ref()
                .take(block_len)
                .collect::<Result<Vec<i16>, _>>()
                .map_err(|source| PlaybackError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
            if block.is_empty() {
                break;
            }
            let out = resampler.push(&downmix_i16(&block, in_channels))?;
            if !out.is_empty() {
                connected = send_block(&tx, out, deadline)?;
            }
        }
        if connected {
            let tail = resampler.finish()?;
            if !tail.is_empty() {
                send_block(&tx, tail, deadline)?;
            }
        }
        drop(tx);

        while !finished.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                log::warn!("playback: drain timed out after {nominal:?} clip");
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        std::thread::sleep(TAIL);
        drop(stream);

        log::debug!(
            "playback: {} frames @ {} Hz (device {device_rate} Hz)",
            total_frames,
            spec.sample_rate
        );
        Ok(())
    }
}

/// Pick an `f32` output config running at `rate`, or the device default.
///
/// Returns the config and the rate it runs at.
fn output_config(
    device: &cpal::Device,
    rate: u32,
) -> Result<(cpal::StreamConfig, u32), PlaybackError> {
    let wanted = cpal::SampleRate(rate);
    let exact = device
        .supported_output_configs()?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .find(|c| c.min_sample_rate() <= wanted && c.max_sample_rate() >= wanted);

    if let Some(range) = exact {
        return Ok((range.with_sample_rate(wanted).config(), rate));
    }

    let default = device.default_output_config()?;
    let device_rate = default.sample_rate().0;
    log::debug!("playback: {rate} Hz unsupported, resampling to {device_rate} Hz");
    Ok((default.config(), device_rate))
}

/// Push one block, waiting for room until `deadline`.
///
/// Returns `Ok(false)` if the callback side has gone away.
fn send_block(
    tx: &SyncSender<Vec<f32>>,
    mut block: Vec<f32>,
    deadline: Instant,
) -> Result<bool, PlaybackError> {
    loop {
        match tx.try_send(block) {
            Ok(()) => return Ok(true),
            Err(TrySendError::Disconnected(_)) => return Ok(false),
            Err(TrySendError::Full(b)) => {
                if Instant::now() >= deadline {
                    return Err(PlaybackError::Stalled);
                }
                block = b;
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BlockFeed
// ---------------------------------------------------------------------------

/// Callback-side consumer of the block channel.
///
/// Emits silence on underrun and raises `finished` once the sender is gone
/// and every queued sample has been played.
struct BlockFeed {
    rx: Receiver<Vec<f32>>,
    current: Vec<f32>,
    pos: usize,
    finished: Arc<AtomicBool>,
}

impl BlockFeed {
    fn new(rx: Receiver<Vec<f32>>, finished: Arc<AtomicBool>) -> Self {
        Self {
            rx,
            current: Vec::new(),
            pos: 0,
            finished,
        }
    }

    fn next_sample(&mut self) -> Option<f32> {
        loop {
            if let Some(&s) = self.current.get(self.pos) {
                self.pos += 1;
                return Some(s);
            }
            match self.rx.try_recv() {
                Ok(block) => {
                    self.current = block;
                    self.pos = 0;
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.finished.store(true, Ordering::SeqCst);
                    return None;
                }
            }
        }
    }

    /// Fill an interleaved output buffer, copying each mono sample to every
    /// channel.
    fn fill(&mut self, data: &mut [f32], channels: usize) {
        for frame in data.chunks_mut(channels.max(1)) {
            let s = self.next_sample().unwrap_or(0.0);
            frame.fill(s);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
