mod audio;
mod cli;
mod config;
mod error;
mod player;

use std::io::{self, Read};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;

use audio::{AlsaSink, AlsaSinkConfig, AudioSink, CodecFactory, FsStorage, MpegCodec, Storage, ToneGenerator};
use cli::{Cli, Command};
use config::Config;
use player::{PlaybackSummary, Player, PlayerSettings};

/// Gap between dialled DTMF digits.
const DTMF_GAP_MS: u32 = 50;

/// `decode -` reads the encoded stream from stdin.
const STDIN_PATH: &str = "-";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    let cli = Cli::parse();

    // 加载配置
    let config = Config::new().unwrap_or_else(|e| {
        log::warn!("Built-in configuration rejected ({}), using defaults", e);
        Config::default()
    });
    log::info!("{} v{}", config.app_name, config.app_version);

    let storage = match config.storage_root() {
        Some(root) => FsStorage::rooted(root),
        None => FsStorage::new(),
    };
    let sink = AlsaSink::new(AlsaSinkConfig {
        device: config.playback_device.to_string(),
        period_size: config.period_size(),
        sample_rate: config.playback_sample_rate,
        channels: config.playback_channels,
        silence_ms: config.playback_silence_ms,
    });
    let settings = PlayerSettings::from(&config);
    let player = Arc::new(Player::new(sink, storage, MpegCodec::new, settings));
    let volume_or_default = |volume: Option<f32>| volume.unwrap_or(settings.default_volume);

    match cli.command {
        Command::Play { path, volume } => {
            let volume = volume_or_default(volume);
            let summary = run_session(&player, move |player| {
                let mut last_decile = 0;
                let mut report = |fraction: f32| {
                    let decile = (fraction * 10.0) as u32;
                    if decile > last_decile {
                        last_decile = decile;
                        log::info!("Progress: {}%", decile * 10);
                    }
                };
                player.start(&path, volume, Some(&mut report))
            })
            .await?;
            print_summary(&summary);
        }
        Command::Info { path, json } => {
            let descriptor = player
                .file_info(&path)
                .with_context(|| format!("Failed to read stream info from {}", path.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&descriptor)?);
            } else {
                println!("File:        {}", path.display());
                println!("Sample rate: {} Hz", descriptor.sample_rate);
                println!("Channels:    {}", descriptor.channels);
                println!("Bit rate:    {} kbps", descriptor.bit_rate / 1000);
                match descriptor.duration {
                    Some(duration) => println!("Duration:    {:.1} s", duration.as_secs_f64()),
                    None => println!("Duration:    unknown"),
                }
            }
        }
        Command::Decode { path, output } => {
            let worker = player.clone();
            let source = path.clone();
            let pcm = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
                if source.as_os_str() == STDIN_PATH {
                    let mut data = Vec::new();
                    io::stdin().lock().read_to_end(&mut data)?;
                    log::info!("Read {} bytes from stdin", data.len());
                    Ok(player::decode_data(&data, MpegCodec::new(), worker.settings())?)
                } else {
                    Ok(worker.decode_file(&source)?)
                }
            })
            .await?
            .with_context(|| format!("Failed to decode {}", path.display()))?;
            println!(
                "Decoded {} samples ({} Hz, {} ch), {} frames, {} bytes skipped",
                pcm.samples.len(),
                pcm.descriptor.sample_rate,
                pcm.descriptor.channels,
                pcm.stats.frames,
                pcm.stats.skipped_bytes,
            );
            if let Some(output) = output {
                let bytes: Vec<u8> = pcm.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                std::fs::write(&output, bytes)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("Wrote raw PCM to {}", output.display());
            }
        }
        Command::Chime { name, volume } => {
            let volume = volume_or_default(volume);
            let summary = run_session(&player, move |player| player.play_chime(name, volume)).await?;
            print_summary(&summary);
        }
        Command::Beep {
            frequency,
            duration_ms,
            waveform,
            volume,
        } => {
            let tones = ToneGenerator::default();
            let pcm = tones.tone(frequency, duration_ms, 1.0, waveform);
            let summary = play_tones(&player, pcm, tones, volume_or_default(volume)).await?;
            print_summary(&summary);
        }
        Command::Dtmf {
            digits,
            duration_ms,
            volume,
        } => {
            let tones = ToneGenerator::default();
            let mut pcm = Vec::new();
            for (i, digit) in digits.chars().enumerate() {
                if i > 0 {
                    pcm.extend(tones.silence(DTMF_GAP_MS));
                }
                let tone = tones
                    .dtmf(digit, duration_ms, 1.0)
                    .with_context(|| format!("'{}' is not a DTMF key", digit))?;
                pcm.extend(tone);
            }
            let summary = play_tones(&player, pcm, tones, volume_or_default(volume)).await?;
            print_summary(&summary);
        }
        Command::Noise { duration_ms, volume } => {
            let tones = ToneGenerator::default();
            let pcm = tones.noise(duration_ms, 1.0, std::process::id());
            let summary = play_tones(&player, pcm, tones, volume_or_default(volume)).await?;
            print_summary(&summary);
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn play_tones<S, St, F>(
    player: &Arc<Player<S, St, F>>,
    pcm: Vec<i16>,
    tones: ToneGenerator,
    volume: f32,
) -> anyhow::Result<PlaybackSummary>
where
    S: AudioSink + 'static,
    St: Storage + 'static,
    F: CodecFactory + 'static,
{
    run_session(player, move |player| {
        player.play_pcm(&pcm, tones.sample_rate(), 1, volume)
    })
    .await
}

/// Run a blocking playback job on a worker thread; Ctrl+C stops the session
/// and waits for it to wind down.
async fn run_session<S, St, F, T, J>(player: &Arc<Player<S, St, F>>, job: J) -> anyhow::Result<T>
where
    S: AudioSink + 'static,
    St: Storage + 'static,
    F: CodecFactory + 'static,
    T: Send + 'static,
    J: FnOnce(&Player<S, St, F>) -> error::Result<T> + Send + 'static,
{
    let worker_player = player.clone();
    let mut worker = tokio::task::spawn_blocking(move || job(&worker_player));

    tokio::select! {
        result = &mut worker => Ok(result??),
        _ = signal::ctrl_c() => {
            log::info!("Ctrl+C received, stopping playback");
            player.stop();
            Ok(worker.await??)
        }
    }
}

fn print_summary(summary: &PlaybackSummary) {
    println!(
        "Finished ({:?}): {} blocks, {} samples at {} Hz x{}, {} bytes skipped",
        summary.end,
        summary.blocks,
        summary.samples,
        summary.descriptor.sample_rate,
        summary.descriptor.channels,
        summary.skipped_bytes,
    );
}
