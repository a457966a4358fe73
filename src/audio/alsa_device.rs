//! ALSA PCM playback device setup.

use alsa::pcm::{Access, Format, HwParams, PCM, State};
use alsa::{Direction, ValueOr};
use anyhow::{Context, Result};

/// Parameters negotiated with the ALSA hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackParams {
    /// Actual sample rate after negotiation
    pub sample_rate: u32,
    pub channels: u32,
    /// Period size in frames (one frame = channels × 2 bytes)
    pub period_size: usize,
    /// Ring size in frames
    pub buffer_size: usize,
}

/// Open `device` for interleaved S16LE playback.
///
/// The rate is negotiated to the nearest the hardware supports; the channel
/// count must be supported exactly.
pub fn open_playback(
    device: &str,
    sample_rate: u32,
    channels: u32,
    period_size: Option<usize>,
) -> Result<(PCM, PlaybackParams)> {
    let pcm = PCM::new(device, Direction::Playback, false)
        .with_context(|| format!("Failed to open PCM device '{}' for playback", device))?;

    {
        let hwp = HwParams::any(&pcm).context("Failed to initialize HwParams")?;
        hwp.set_access(Access::RWInterleaved)?;
        hwp.set_format(Format::S16LE)?;
        hwp.set_channels(channels)
            .with_context(|| format!("Device '{}' does not support {} channels", device, channels))?;
        hwp.set_rate_near(sample_rate, ValueOr::Nearest)?;
        if let Some(ps) = period_size {
            hwp.set_period_size_near(ps as alsa::pcm::Frames, ValueOr::Nearest)?;
        }
        pcm.hw_params(&hwp)?;
    }

    let params = {
        let hwp = pcm.hw_params_current()?;
        PlaybackParams {
            sample_rate: hwp.get_rate()?,
            channels: hwp.get_channels()?,
            period_size: hwp.get_period_size()? as usize,
            buffer_size: hwp.get_buffer_size()? as usize,
        }
    };

    if params.sample_rate != sample_rate {
        log::warn!(
            "ALSA playback: requested {} Hz, hardware gave {} Hz; no resampling is done",
            sample_rate,
            params.sample_rate,
        );
    }
    log::info!(
        "ALSA Playback: device={}, rate={}, channels={}, period_size={}, buffer_size={}",
        device,
        params.sample_rate,
        params.channels,
        params.period_size,
        params.buffer_size,
    );

    Ok((pcm, params))
}

/// Bring a PCM back to a writable state after an XRUN or suspend.
pub fn recover(pcm: &PCM) -> Result<()> {
    match pcm.state() {
        State::Suspended => {
            if pcm.resume().is_err() {
                pcm.prepare().context("Failed to prepare PCM after suspend")?;
            }
        }
        _ => pcm.prepare().context("Failed to prepare PCM")?,
    }
    Ok(())
}
