//! audio - Streaming MP3 decode and ALSA playback
//!
//! Encoded bytes flow from a [`Storage`] through a fixed-size buffer
//! into a [`FrameCodec`]; decoded PCM goes out through an [`AudioSink`].

mod alsa_device;
mod frame_codec;
mod growth;
mod mpeg;
mod ring_buffer;
mod sink;
pub(crate) mod source;
pub(crate) mod stream;
mod tone;

pub use frame_codec::{CodecFactory, FrameCodec};
pub use growth::GrowthPolicy;
pub use mpeg::MpegCodec;
pub use sink::{AlsaSink, AlsaSinkConfig, AudioSink, SinkError};
pub use source::{FsStorage, MediaFile, Storage};
pub use stream::{
    DecodedPcm, EndReason, FrameStream, Probe, StreamDescriptor, StreamSettings, probe,
};
pub use tone::{Chime, ToneGenerator, Waveform};
