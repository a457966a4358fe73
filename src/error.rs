//! Error taxonomy for playback sessions and batch decoding.
//!
//! Recoverable stream conditions (false sync, corrupt frame, input underflow)
//! never show up here: the decode loop absorbs them. What remains is what a
//! caller of `Player` or the batch decoder can actually observe.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::audio::SinkError;

#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Another session holds the player.
    #[error("a playback session is already active")]
    AlreadyPlaying,

    /// The file could not be opened or has no readable content.
    #[error("audio source unavailable: {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A fixed buffer could not be obtained.
    #[error("failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    /// No frame header could be located in the leading bytes of the source.
    #[error("no decodable frame header found")]
    NoFrameFound,

    /// The stream ended without a single frame decoding successfully.
    #[error("stream contained no decodable frames")]
    NoDecodableFrames,

    /// The output device could not be started or reconfigured.
    #[error("audio sink unavailable: {0}")]
    SinkUnavailable(#[source] SinkError),

    /// A write to the output device failed mid-session.
    #[error("audio sink write failed: {0}")]
    Sink(#[source] SinkError),
}

impl PlaybackError {
    pub fn source_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
