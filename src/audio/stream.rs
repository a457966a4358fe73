//! Streaming decode loop.
//!
//! A [`FrameStream`] owns a fixed [`StreamBuffer`] that it refills from a
//! reader, and turns the byte stream into decoded PCM blocks one frame at a
//! time:
//!
//! - locate a sync marker, discarding whatever precedes it
//! - parse the header; a bad header is a false sync, skip one byte
//! - decode; underflow refills and retries from the same byte, any other
//!   failure skips one byte
//!
//! Every retry either consumes at least one byte or appends at least one
//! byte from the source, so the loop always terminates.

use std::io::Read;
use std::time::Duration;

use serde::Serialize;

use super::frame_codec::{FrameCodec, FrameError, FrameHeader};
use super::growth::{GrowthPolicy, PcmAccumulator};
use super::ring_buffer::StreamBuffer;
use crate::error::{PlaybackError, Result};

/// Format metadata taken from the first decodable frame of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per second.
    pub bit_rate: u32,
    /// Estimated from the source size and the first frame's bit rate.
    pub duration: Option<Duration>,
}

impl StreamDescriptor {
    pub fn from_header(header: &FrameHeader, source_len: Option<u64>) -> Self {
        Self {
            sample_rate: header.sample_rate,
            channels: header.channels,
            bit_rate: header.bit_rate,
            duration: source_len.and_then(|len| estimate_duration(len, header.bit_rate)),
        }
    }
}

/// `len * 8 / bit_rate` seconds, or `None` for an unknown bit rate.
pub fn estimate_duration(len: u64, bit_rate: u32) -> Option<Duration> {
    if bit_rate == 0 {
        return None;
    }
    Some(Duration::from_secs_f64(len as f64 * 8.0 / bit_rate as f64))
}

/// A decoded block, valid only until the stream is stepped again.
#[derive(Debug)]
pub struct DecodedBlock<'a> {
    /// Interleaved PCM.
    pub samples: &'a [i16],
    pub descriptor: &'a StreamDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Source open, no sync marker seen yet.
    Opened,
    /// A sync marker was found but no header has parsed.
    Synced,
    /// Descriptor known, frames are flowing.
    Streaming,
    /// The consumer asked to stop.
    Stopped,
    /// Input ran out after at least one decoded frame.
    EndOfStream,
    /// Input ran out without a single decoded frame.
    Error,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::EndOfStream | Self::Error)
    }
}

/// Why a driven stream stopped producing blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EndReason {
    EndOfStream,
    /// The block consumer returned `false`.
    Stopped,
    /// The source failed mid-stream; playback ended at the point data ran out.
    SourceFault,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub frames: u64,
    pub samples: u64,
    /// Bytes discarded while searching for or recovering sync.
    pub skipped_bytes: u64,
    pub refills: u64,
}

/// Tunables for the streaming buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub buffer_size: usize,
    /// After a block is delivered, refill early when fewer unread bytes remain.
    pub low_water_mark: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_size: 8192,
            low_water_mark: 2048,
        }
    }
}

pub struct FrameStream<R, C> {
    source: R,
    codec: C,
    buffer: StreamBuffer,
    pcm: Vec<i16>,
    descriptor: Option<StreamDescriptor>,
    source_len: Option<u64>,
    state: StreamState,
    low_water_mark: usize,
    exhausted: bool,
    faulted: bool,
    position: u64,
    stats: StreamStats,
}

impl<R: Read, C: FrameCodec> FrameStream<R, C> {
    pub fn new(source: R, codec: C, settings: &StreamSettings) -> Result<Self> {
        let buffer = StreamBuffer::with_capacity(settings.buffer_size)?;
        Ok(Self {
            source,
            codec,
            buffer,
            pcm: Vec::new(),
            descriptor: None,
            source_len: None,
            state: StreamState::Opened,
            low_water_mark: settings.low_water_mark,
            exhausted: false,
            faulted: false,
            position: 0,
            stats: StreamStats::default(),
        })
    }

    /// Total source size, used for the duration estimate.
    pub fn with_source_len(mut self, len: u64) -> Self {
        self.source_len = Some(len);
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Unread encoded bytes resident in the buffer.
    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buffer.available()
    }

    pub fn end_reason(&self) -> EndReason {
        match self.state {
            StreamState::Stopped => EndReason::Stopped,
            _ if self.faulted => EndReason::SourceFault,
            _ => EndReason::EndOfStream,
        }
    }

    /// Compact and top the buffer up from the source.
    ///
    /// Returns `false` when nothing could be added: the source is exhausted,
    /// has failed, or the buffer has no free space.
    pub fn refill(&mut self) -> bool {
        if self.exhausted || self.faulted {
            return false;
        }
        match self.buffer.fill_from(&mut self.source) {
            Ok(fill) => {
                self.exhausted = fill.eof;
                if fill.added > 0 {
                    self.stats.refills += 1;
                }
                fill.added > 0
            }
            Err(e) => {
                log::warn!("Source read failed at byte {}: {}, ending stream", self.position, e);
                self.faulted = true;
                false
            }
        }
    }

    /// Decode the next frame.
    ///
    /// Returns `None` once the stream has reached a terminal state.
    pub fn next_block(&mut self) -> Option<DecodedBlock<'_>> {
        let samples = self.step()?;
        let descriptor = self.descriptor.as_ref()?;
        Some(DecodedBlock {
            samples: &self.pcm[..samples],
            descriptor,
        })
    }

    /// Stop the stream; later steps yield nothing.
    pub fn stop(&mut self) {
        if !self.state.is_terminal() {
            self.state = StreamState::Stopped;
        }
    }

    /// Hand every decoded block to `on_block` until the stream ends or the
    /// consumer returns `false`.
    ///
    /// Fails with [`PlaybackError::NoDecodableFrames`] when input ran out
    /// before a single frame decoded.
    pub fn drive<F>(&mut self, mut on_block: F) -> Result<EndReason>
    where
        F: FnMut(DecodedBlock<'_>) -> bool,
    {
        while let Some(samples) = self.step() {
            let Some(descriptor) = self.descriptor.as_ref() else {
                break;
            };
            let block = DecodedBlock {
                samples: &self.pcm[..samples],
                descriptor,
            };
            if !on_block(block) {
                self.stop();
                return Ok(EndReason::Stopped);
            }
            if self.buffer.available() < self.low_water_mark && !self.exhausted {
                self.refill();
            }
        }

        match self.state {
            StreamState::Error => Err(PlaybackError::NoDecodableFrames),
            _ => Ok(self.end_reason()),
        }
    }

    /// Run the stream to completion, collecting all PCM into one buffer.
    pub fn decode_to_end(mut self, policy: GrowthPolicy, input_len: usize) -> Result<DecodedPcm> {
        let mut pcm = PcmAccumulator::new(policy, input_len)?;
        let mut failure = None;

        let reason = self.drive(|block| match pcm.extend(block.samples) {
            Ok(()) => true,
            Err(e) => {
                failure = Some(e);
                false
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        reason?;

        let descriptor = self.descriptor.ok_or(PlaybackError::NoDecodableFrames)?;
        if pcm.growths() > 0 {
            log::debug!("Batch decode outgrew its estimate {} times", pcm.growths());
        }
        Ok(DecodedPcm {
            samples: pcm.finish(),
            descriptor,
            stats: self.stats,
        })
    }

    /// One state transition: produce the sample count of the next decoded
    /// frame, or `None` when the stream is over.
    fn step(&mut self) -> Option<usize> {
        if self.state.is_terminal() {
            return None;
        }

        loop {
            let Some(offset) = self.codec.find_sync(self.buffer.unread()) else {
                // A marker may straddle the end of the resident bytes.
                let resident = self.buffer.available();
                let keep = self.codec.sync_len().saturating_sub(1).min(resident);
                self.skip(resident - keep);
                if !self.refill() {
                    return self.finish();
                }
                continue;
            };
            self.skip(offset);
            if self.state == StreamState::Opened {
                self.state = StreamState::Synced;
            }

            let header = match self.codec.parse_header(self.buffer.unread()) {
                Ok(header) => header,
                Err(FrameError::Underflow) => {
                    self.on_underflow();
                    continue;
                }
                Err(FrameError::Corrupt) => {
                    log::debug!("False sync at byte {}", self.position);
                    self.skip(1);
                    continue;
                }
            };

            if self.pcm.len() < header.output_samples {
                let extra = header.output_samples - self.pcm.len();
                if self.pcm.try_reserve_exact(extra).is_err() {
                    log::error!("Cannot allocate {} PCM samples for frame", header.output_samples);
                    self.state = StreamState::Error;
                    return None;
                }
                self.pcm.resize(header.output_samples, 0);
            }

            match self.codec.decode_frame(self.buffer.unread(), &mut self.pcm) {
                Ok(frame) => {
                    let consumed = frame.consumed.max(1);
                    self.buffer.consume(consumed);
                    self.position += consumed as u64;
                    self.stats.frames += 1;
                    if self.descriptor.is_none() {
                        self.capture_descriptor(&header);
                    }

                    let samples = frame.samples.min(self.pcm.len());
                    if samples == 0 {
                        continue;
                    }
                    self.stats.samples += samples as u64;
                    return Some(samples);
                }
                Err(FrameError::Underflow) => self.on_underflow(),
                Err(FrameError::Corrupt) => {
                    log::debug!("Corrupt frame at byte {}, resyncing", self.position);
                    self.skip(1);
                }
            }
        }
    }

    /// The frame at the cursor is incomplete. Pull more input, or when none
    /// can arrive (full buffer, exhausted source) treat the sync as false.
    fn on_underflow(&mut self) {
        if !self.buffer.is_full() && self.refill() {
            return;
        }
        log::debug!("Frame at byte {} cannot complete, skipping", self.position);
        self.skip(1);
    }

    fn capture_descriptor(&mut self, header: &FrameHeader) {
        let descriptor = StreamDescriptor::from_header(header, self.source_len);
        log::info!(
            "Stream format: rate={}, ch={}, bitrate={}bps, duration={:?}",
            descriptor.sample_rate,
            descriptor.channels,
            descriptor.bit_rate,
            descriptor.duration,
        );
        self.descriptor = Some(descriptor);
        self.state = StreamState::Streaming;
    }

    fn skip(&mut self, n: usize) {
        let n = n.min(self.buffer.available());
        self.buffer.consume(n);
        self.position += n as u64;
        self.stats.skipped_bytes += n as u64;
    }

    fn finish(&mut self) -> Option<usize> {
        let leftover = self.buffer.available();
        self.skip(leftover);
        self.state = if self.stats.frames == 0 {
            StreamState::Error
        } else {
            StreamState::EndOfStream
        };
        log::debug!(
            "Stream ended at byte {}: frames={}, skipped={}",
            self.position,
            self.stats.frames,
            self.stats.skipped_bytes,
        );
        None
    }
}

/// Whole-stream decode output.
#[derive(Debug, Clone)]
pub struct DecodedPcm {
    pub samples: Vec<i16>,
    pub descriptor: StreamDescriptor,
    pub stats: StreamStats,
}

/// Format of the first frame plus the header it came from.
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub descriptor: StreamDescriptor,
    pub header: FrameHeader,
}

/// Read at most `probe_size` leading bytes and parse the first frame header
/// found in them. No frame is decoded.
pub fn probe<R: Read, C: FrameCodec + ?Sized>(
    source: &mut R,
    codec: &C,
    probe_size: usize,
    source_len: Option<u64>,
) -> Result<Probe> {
    let mut buffer = StreamBuffer::with_capacity(probe_size)?;
    if let Err(e) = buffer.fill_from(source) {
        log::warn!("Probe read failed: {}", e);
        return Err(PlaybackError::NoFrameFound);
    }

    let mut data = buffer.unread();
    while let Some(offset) = codec.find_sync(data) {
        data = &data[offset..];
        match codec.parse_header(data) {
            Ok(header) => {
                return Ok(Probe {
                    descriptor: StreamDescriptor::from_header(&header, source_len),
                    header,
                });
            }
            Err(FrameError::Underflow) => break,
            Err(FrameError::Corrupt) => data = &data[1..],
        }
    }
    Err(PlaybackError::NoFrameFound)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Trivial framing used to exercise the loop without a real bitstream.
    //!
    //! Frame layout: `0xA5 0x5A len_hi len_lo channels payload...` where
    //! `len` is the whole frame length. A payload byte of `0xEE` makes the
    //! frame fail to decode. Each frame decodes to one sample per payload
    //! byte per channel, equal to the byte value.

    use super::*;
    use crate::audio::frame_codec::DecodedFrame;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub const SYNC: [u8; 2] = [0xA5, 0x5A];
    pub const HEADER_LEN: usize = 5;
    pub const POISON: u8 = 0xEE;

    pub fn frame(len: usize, channels: u8, fill: u8) -> Vec<u8> {
        assert!(len > HEADER_LEN && len <= u16::MAX as usize);
        let mut out = vec![SYNC[0], SYNC[1], (len >> 8) as u8, len as u8, channels];
        out.resize(len, fill);
        out
    }

    #[derive(Clone, Default)]
    pub struct ScriptedCodec {
        decodes: Arc<AtomicUsize>,
    }

    impl ScriptedCodec {
        pub fn new() -> Self {
            Self::default()
        }

        /// Shared count of decode attempts, including failed ones.
        pub fn decode_counter(&self) -> Arc<AtomicUsize> {
            self.decodes.clone()
        }
    }

    impl FrameCodec for ScriptedCodec {
        fn sync_len(&self) -> usize {
            SYNC.len()
        }

        fn find_sync(&self, data: &[u8]) -> Option<usize> {
            data.windows(2).position(|w| w == SYNC)
        }

        fn parse_header(&self, data: &[u8]) -> std::result::Result<FrameHeader, FrameError> {
            if data.len() < HEADER_LEN {
                return Err(FrameError::Underflow);
            }
            if data[..2] != SYNC {
                return Err(FrameError::Corrupt);
            }
            let len = u16::from_be_bytes([data[2], data[3]]) as usize;
            let channels = data[4];
            if len <= HEADER_LEN || !(1..=2).contains(&channels) {
                return Err(FrameError::Corrupt);
            }
            Ok(FrameHeader {
                sample_rate: 8000,
                channels: channels as u16,
                bit_rate: 64_000,
                output_samples: (len - HEADER_LEN) * channels as usize,
                frame_len: len,
            })
        }

        fn decode_frame(
            &mut self,
            data: &[u8],
            out: &mut [i16],
        ) -> std::result::Result<DecodedFrame, FrameError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            let header = self.parse_header(data)?;
            if data.len() < header.frame_len {
                return Err(FrameError::Underflow);
            }
            let payload = &data[HEADER_LEN..header.frame_len];
            if payload.contains(&POISON) {
                return Err(FrameError::Corrupt);
            }
            let channels = header.channels as usize;
            for (i, &b) in payload.iter().enumerate() {
                for ch in 0..channels {
                    out[i * channels + ch] = b as i16;
                }
            }
            Ok(DecodedFrame {
                samples: header.output_samples,
                consumed: header.frame_len,
            })
        }
    }
}
