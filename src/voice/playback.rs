//! Audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::SpeechError;

/// Extra time allowed past the clip's nominal length
const DRAIN_GRACE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Plays audio to the default output device
///
/// Blocking; call from a dedicated thread. The output stream is not `Send`,
/// so each clip builds its own stream on the calling thread.
pub struct AudioPlayback {
    device: Device,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self, SpeechError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| SpeechError::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio output opened"
        );

        Ok(Self { device })
    }

    /// Decode and play MP3 bytes, returning when playback completes
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<(), SpeechError> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        self.play_samples(samples, sample_rate)
    }

    /// Play mono f32 samples at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot play at this rate
    pub fn play_samples(&self, samples: Vec<f32>, sample_rate: u32) -> Result<(), SpeechError> {
        if samples.is_empty() {
            return Ok(());
        }

        let config = self.output_config(sample_rate)?;
        let channels = usize::from(config.channels);
        let sample_count = samples.len();

        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            self.device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);

                        for frame in data.chunks_mut(channels) {
                            let sample = if let Some(&s) = samples.get(pos) {
                                pos += 1;
                                s
                            } else {
                                finished.store(true, Ordering::Relaxed);
                                0.0
                            };
                            frame.fill(sample);
                        }

                        position.store(pos, Ordering::Relaxed);
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| SpeechError::Audio(e.to_string()))?
        };

        stream
            .play()
            .map_err(|e| SpeechError::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate.max(1));
        let deadline = Instant::now() + Duration::from_millis(duration_ms) + DRAIN_GRACE;

        while !finished.load(Ordering::Relaxed) {
            if Instant::now() > deadline {
                tracing::warn!("playback did not drain in time");
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        // Let the device flush its last buffer
        std::thread::sleep(POLL_INTERVAL * 2);

        drop(stream);
        tracing::debug!(samples = sample_count, sample_rate, "playback complete");

        Ok(())
    }

    /// Mono if the device offers it at `sample_rate`, otherwise stereo
    fn output_config(&self, sample_rate: u32) -> Result<StreamConfig, SpeechError> {
        let rate = SampleRate(sample_rate);
        let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
            c.channels() == channels
                && c.sample_format() == cpal::SampleFormat::F32
                && c.min_sample_rate() <= rate
                && c.max_sample_rate() >= rate
        };

        let configs: Vec<_> = self
            .device
            .supported_output_configs()
            .map_err(|e| SpeechError::Audio(e.to_string()))?
            .collect();

        configs
            .iter()
            .find(|c| supports(*c, 1))
            .or_else(|| configs.iter().find(|c| supports(*c, 2)))
            .map(|c| c.clone().with_sample_rate(rate).config())
            .ok_or_else(|| {
                SpeechError::Audio(format!("no output config supports {sample_rate} Hz"))
            })
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
#[allow(clippy::cast_precision_loss)]
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32), SpeechError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate.is_none() {
                    sample_rate = u32::try_from(frame.sample_rate).ok();
                }

                let channels = frame.channels.max(1);
                samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    sum / chunk.len() as f32
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(SpeechError::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| SpeechError::Audio("MP3 contains no frames".to_string()))?;
    Ok((samples, sample_rate))
}
