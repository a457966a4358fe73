//! Frame codec seam between the streaming decode loop and a concrete
//! bitstream decoder.

/// Why a header parse or a frame decode could not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes are resident than the frame needs. Refill and retry
    /// from the same position.
    Underflow,
    /// The bytes at the cursor are not a decodable frame.
    Corrupt,
}

/// Format parameters carried by one frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bits per second.
    pub bit_rate: u32,
    /// Interleaved i16 samples one decoded frame produces.
    pub output_samples: usize,
    /// Encoded size of the frame in bytes, header included.
    pub frame_len: usize,
}

/// Result of decoding a single frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Interleaved samples written to the output slice.
    pub samples: usize,
    /// Encoded bytes the frame occupied.
    pub consumed: usize,
}

/// A decoder for a framed compressed audio stream.
///
/// `data` always starts at the decode loop's read cursor and spans every
/// unread byte currently resident in the stream buffer.
pub trait FrameCodec: Send {
    /// Number of bytes a sync marker spans.
    fn sync_len(&self) -> usize;

    /// Offset of the first sync marker in `data`.
    fn find_sync(&self, data: &[u8]) -> Option<usize>;

    /// Parse the frame header at the start of `data`.
    fn parse_header(&self, data: &[u8]) -> Result<FrameHeader, FrameError>;

    /// Decode the frame at the start of `data` into interleaved PCM.
    fn decode_frame(&mut self, data: &[u8], out: &mut [i16]) -> Result<DecodedFrame, FrameError>;
}

/// Builds a fresh codec for every session so no decoder state leaks across files.
pub trait CodecFactory: Send + Sync {
    type Codec: FrameCodec;

    fn create(&self) -> Self::Codec;
}

impl<F, C> CodecFactory for F
where
    F: Fn() -> C + Send + Sync,
    C: FrameCodec,
{
    type Codec = C;

    fn create(&self) -> C {
        self()
    }
}
