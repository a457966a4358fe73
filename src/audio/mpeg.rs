//! MPEG-1/2/2.5 Layer III frame codec.
//!
//! Framing (sync search, header parsing, frame length) is done here so the
//! stream loop can resync byte by byte; the audio itself is decoded by
//! symphonia's MP3 decoder, one whole frame per packet.

use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CODEC_TYPE_MP3, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::formats::Packet;

use super::frame_codec::{DecodedFrame, FrameCodec, FrameError, FrameHeader};

const HEADER_LEN: usize = 4;

/// kbps, indexed by the header's bitrate field. Index 0 (free format) and 15
/// are rejected.
const BITRATES_V1_L3: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2_L3: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl Version {
    fn sample_rates(self) -> [u32; 3] {
        match self {
            Version::Mpeg1 => [44100, 48000, 32000],
            Version::Mpeg2 => [22050, 24000, 16000],
            Version::Mpeg25 => [11025, 12000, 8000],
        }
    }

    fn samples_per_frame(self) -> usize {
        match self {
            Version::Mpeg1 => 1152,
            _ => 576,
        }
    }
}

pub struct MpegCodec {
    decoder: Option<Box<dyn Decoder>>,
    /// (sample rate, channels) the decoder was built for. symphonia keeps
    /// its output spec for the decoder's lifetime, so a change rebuilds it.
    format: Option<(u32, u16)>,
    scratch: Option<SampleBuffer<i16>>,
    packets: u64,
}

impl MpegCodec {
    pub fn new() -> Self {
        Self {
            decoder: None,
            format: None,
            scratch: None,
            packets: 0,
        }
    }
}

fn make_decoder(header: &FrameHeader) -> Result<Box<dyn Decoder>, FrameError> {
    let channels = if header.channels == 1 {
        Channels::FRONT_LEFT
    } else {
        Channels::FRONT_LEFT | Channels::FRONT_RIGHT
    };
    let mut params = CodecParameters::new();
    params
        .for_codec(CODEC_TYPE_MP3)
        .with_sample_rate(header.sample_rate)
        .with_channels(channels);

    symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| {
            log::error!("Failed to create MP3 decoder: {}", e);
            FrameError::Corrupt
        })
}

impl Default for MpegCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for MpegCodec {
    fn sync_len(&self) -> usize {
        2
    }

    fn find_sync(&self, data: &[u8]) -> Option<usize> {
        data.windows(2).position(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0)
    }

    fn parse_header(&self, data: &[u8]) -> Result<FrameHeader, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::Underflow);
        }
        let (b0, b1, b2, b3) = (data[0], data[1], data[2], data[3]);
        if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
            return Err(FrameError::Corrupt);
        }

        let version = match (b1 >> 3) & 0x03 {
            0b11 => Version::Mpeg1,
            0b10 => Version::Mpeg2,
            0b00 => Version::Mpeg25,
            _ => return Err(FrameError::Corrupt),
        };
        // Layer III only.
        if (b1 >> 1) & 0x03 != 0b01 {
            return Err(FrameError::Corrupt);
        }

        let bitrate_index = (b2 >> 4) as usize;
        if bitrate_index == 0 || bitrate_index == 15 {
            return Err(FrameError::Corrupt);
        }
        let kbps = match version {
            Version::Mpeg1 => BITRATES_V1_L3[bitrate_index],
            _ => BITRATES_V2_L3[bitrate_index],
        };

        let rate_index = ((b2 >> 2) & 0x03) as usize;
        if rate_index == 3 {
            return Err(FrameError::Corrupt);
        }
        let sample_rate = version.sample_rates()[rate_index];
        let padding = ((b2 >> 1) & 0x01) as usize;
        let channels: u16 = if b3 >> 6 == 0b11 { 1 } else { 2 };

        let bit_rate = kbps * 1000;
        let slot_factor = version.samples_per_frame() / 8;
        let frame_len = slot_factor * bit_rate as usize / sample_rate as usize + padding;

        Ok(FrameHeader {
            sample_rate,
            channels,
            bit_rate,
            output_samples: version.samples_per_frame() * channels as usize,
            frame_len,
        })
    }

    fn decode_frame(&mut self, data: &[u8], out: &mut [i16]) -> Result<DecodedFrame, FrameError> {
        let header = self.parse_header(data)?;
        if data.len() < header.frame_len {
            return Err(FrameError::Underflow);
        }

        let packet = Packet::new_from_slice(0, self.packets, 0, &data[..header.frame_len]);
        self.packets += 1;

        let format = (header.sample_rate, header.channels);
        if self.decoder.is_none() || self.format != Some(format) {
            if let Some((rate, channels)) = self.format.filter(|_| self.decoder.is_some()) {
                log::debug!(
                    "MP3 format changed from {} Hz x{} to {} Hz x{}, rebuilding decoder",
                    rate,
                    channels,
                    format.0,
                    format.1,
                );
            }
            self.decoder = Some(make_decoder(&header)?);
            self.format = Some(format);
            self.scratch = None;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            return Err(FrameError::Corrupt);
        };
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!("MP3 frame rejected: {}", e);
                // A fresh decoder on the next frame; reset() keeps the old spec.
                self.decoder = None;
                return Err(FrameError::Corrupt);
            }
        };

        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();
        if self.scratch.as_ref().is_none_or(|buf| buf.capacity() < needed) {
            self.scratch = Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
        }
        let Some(scratch) = self.scratch.as_mut() else {
            return Err(FrameError::Corrupt);
        };
        scratch.copy_interleaved_ref(decoded);

        let samples = scratch.samples();
        let n = samples.len().min(out.len());
        out[..n].copy_from_slice(&samples[..n]);

        Ok(DecodedFrame {
            samples: n,
            consumed: header.frame_len,
        })
    }
}
