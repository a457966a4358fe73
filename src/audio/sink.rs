//! Audio output sink: the blocking write-with-timeout end of the pipeline.

use alsa::pcm::PCM;
use thiserror::Error;

use super::alsa_device::{self, PlaybackParams};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink did not accept samples within {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },
    #[error("sink is not active")]
    NotActive,
    #[error("audio device error: {0}")]
    Device(String),
}

/// Fixed-format (interleaved i16) PCM output.
pub trait AudioSink: Send {
    fn is_active(&self) -> bool;

    fn start(&mut self) -> Result<(), SinkError>;

    /// Match the output format to a stream before its first write.
    fn configure(&mut self, _sample_rate: u32, _channels: u16) -> Result<(), SinkError> {
        Ok(())
    }

    /// Write interleaved samples, blocking at most `timeout_ms`.
    ///
    /// Returns the number of samples accepted, which may be fewer than
    /// offered.
    fn write_samples(&mut self, samples: &[i16], timeout_ms: u32) -> Result<usize, SinkError>;

    /// Push a short run of silence so the output settles without a click.
    fn flush_silence(&mut self);
}

#[derive(Debug, Clone)]
pub struct AlsaSinkConfig {
    pub device: String,
    /// Requested period size in frames, `None` for the driver default.
    pub period_size: Option<usize>,
    pub sample_rate: u32,
    pub channels: u16,
    pub silence_ms: u32,
}

/// ALSA-backed sink. The device is opened on `start` and reopened when the
/// stream format changes.
pub struct AlsaSink {
    config: AlsaSinkConfig,
    pcm: Option<PCM>,
    params: Option<PlaybackParams>,
}

/// Consecutive failed writes tolerated before giving up on a block.
const MAX_RECOVERY_RETRIES: u32 = 3;

impl AlsaSink {
    pub fn new(config: AlsaSinkConfig) -> Self {
        Self {
            config,
            pcm: None,
            params: None,
        }
    }

    fn open(&mut self) -> Result<(), SinkError> {
        let (pcm, params) = alsa_device::open_playback(
            &self.config.device,
            self.config.sample_rate,
            self.config.channels as u32,
            self.config.period_size,
        )
        .map_err(|e| SinkError::Device(format!("{:#}", e)))?;
        self.pcm = Some(pcm);
        self.params = Some(params);
        Ok(())
    }
}

impl AudioSink for AlsaSink {
    fn is_active(&self) -> bool {
        self.pcm.is_some()
    }

    fn start(&mut self) -> Result<(), SinkError> {
        if self.pcm.is_some() {
            return Ok(());
        }
        self.open()
    }

    fn configure(&mut self, sample_rate: u32, channels: u16) -> Result<(), SinkError> {
        if self.config.sample_rate == sample_rate
            && self.config.channels == channels
            && self.pcm.is_some()
        {
            return Ok(());
        }
        log::info!(
            "Reconfiguring playback: {} Hz x{} -> {} Hz x{}",
            self.config.sample_rate,
            self.config.channels,
            sample_rate,
            channels,
        );
        if let Some(pcm) = self.pcm.take() {
            let _ = pcm.drain();
        }
        self.config.sample_rate = sample_rate;
        self.config.channels = channels;
        self.open()
    }

    fn write_samples(&mut self, samples: &[i16], timeout_ms: u32) -> Result<usize, SinkError> {
        let (Some(pcm), Some(params)) = (self.pcm.as_ref(), self.params.as_ref()) else {
            return Err(SinkError::NotActive);
        };
        let channels = params.channels.max(1) as usize;
        let io = pcm
            .io_i16()
            .map_err(|e| SinkError::Device(e.to_string()))?;

        let mut retry_count = 0u32;
        loop {
            match pcm.wait(Some(timeout_ms)) {
                Ok(true) => {}
                Ok(false) => return Err(SinkError::Timeout { timeout_ms }),
                Err(e) => {
                    log::warn!("ALSA wait failed: {}, recovering...", e);
                }
            }

            match io.writei(samples) {
                Ok(frames) => return Ok(frames * channels),
                Err(e) => {
                    retry_count += 1;
                    log::warn!("ALSA XRUN or error: {}, recovering...", e);
                    if let Err(e2) = alsa_device::recover(pcm) {
                        log::error!("Failed to recover PCM playback: {:#}", e2);
                        return Err(SinkError::Device(e.to_string()));
                    }
                    if retry_count >= MAX_RECOVERY_RETRIES {
                        log::error!("Max recovery retries ({}) reached", retry_count);
                        return Err(SinkError::Device(e.to_string()));
                    }
                }
            }
        }
    }

    fn flush_silence(&mut self) {
        let (Some(pcm), Some(params)) = (self.pcm.as_ref(), self.params.as_ref()) else {
            return;
        };
        let frames = params.sample_rate as usize * self.config.silence_ms as usize / 1000;
        let silence = vec![0i16; frames * params.channels as usize];

        if let Ok(io) = pcm.io_i16() {
            let mut written = 0;
            while written < frames {
                match io.writei(&silence[written * params.channels as usize..]) {
                    Ok(0) => break,
                    Ok(n) => written += n,
                    Err(e) => {
                        log::debug!("Silence flush interrupted: {}", e);
                        break;
                    }
                }
            }
        }
        if let Err(e) = pcm.drain() {
            log::debug!("PCM drain failed: {}", e);
        }
        // drain leaves the PCM in SETUP
        if let Err(e) = pcm.prepare() {
            log::warn!("Failed to re-prepare PCM after flush: {}", e);
        }
    }
}
