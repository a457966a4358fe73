use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::audio::{Chime, Waveform};

/// Stream MP3 files to an ALSA device
#[derive(Parser, Debug)]
#[command(name = "mp3stream")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play a file until it ends or Ctrl+C
    Play {
        path: PathBuf,
        /// 0.0 - 1.0, defaults to the configured volume
        #[arg(short, long)]
        volume: Option<f32>,
    },
    /// Show the stream format without decoding
    Info {
        path: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a whole file into memory; `-` reads the stream from stdin
    Decode {
        path: PathBuf,
        /// Write the raw interleaved S16LE samples here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Play a built-in chime
    Chime {
        #[arg(value_enum)]
        name: Chime,
        #[arg(short, long)]
        volume: Option<f32>,
    },
    /// Play a single tone
    Beep {
        #[arg(short, long, default_value_t = 1000.0)]
        frequency: f32,
        #[arg(short, long, default_value_t = 200)]
        duration_ms: u32,
        #[arg(short, long, value_enum, default_value_t = Waveform::Sine)]
        waveform: Waveform,
        #[arg(short, long)]
        volume: Option<f32>,
    },
    /// Dial a sequence of keypad tones (0-9, *, #, A-D)
    Dtmf {
        digits: String,
        #[arg(short, long, default_value_t = 200)]
        duration_ms: u32,
        #[arg(short, long)]
        volume: Option<f32>,
    },
    /// Play white noise
    Noise {
        #[arg(short, long, default_value_t = 1000)]
        duration_ms: u32,
        #[arg(short, long)]
        volume: Option<f32>,
    },
    /// Print the compiled-in configuration as JSON
    Config,
}
