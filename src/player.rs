//! Playback session controller.
//!
//! One [`Player`] owns the output sink and allows a single active session at
//! a time. A session runs synchronously on the caller's thread: decode a
//! frame, scale it by the current volume, write it to the sink, report
//! progress, yield, repeat. [`Player::stop`] may be called from any thread
//! (or from the progress callback) and takes effect at the next block
//! boundary.

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use crate::audio::{
    AudioSink, Chime, CodecFactory, DecodedPcm, EndReason, FrameCodec, FrameStream, GrowthPolicy,
    MediaFile, Probe, SinkError, Storage, StreamDescriptor, StreamSettings, ToneGenerator, probe,
};
use crate::config::Config;
use crate::error::{PlaybackError, Result};

const IDLE: u8 = 0;
const PLAYING: u8 = 1;
const STOPPING: u8 = 2;

/// Controller tunables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub stream: StreamSettings,
    /// Bytes read by [`Player::file_info`] and the pre-start probe.
    pub probe_size: usize,
    pub growth: GrowthPolicy,
    pub write_timeout_ms: u32,
    /// Pause after each delivered block; zero only yields the thread.
    pub yield_interval: Duration,
    pub default_volume: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            stream: StreamSettings::default(),
            probe_size: 4096,
            growth: GrowthPolicy::default(),
            write_timeout_ms: 1000,
            yield_interval: Duration::from_millis(1),
            default_volume: 0.5,
        }
    }
}

impl From<&Config> for PlayerSettings {
    fn from(config: &Config) -> Self {
        Self {
            stream: StreamSettings {
                buffer_size: config.stream_buffer_size,
                low_water_mark: config.stream_low_water_mark,
            },
            probe_size: config.stream_probe_size,
            growth: GrowthPolicy {
                compression_ratio: config.stream_compression_ratio,
                factor: config.stream_growth_factor,
            },
            write_timeout_ms: config.playback_write_timeout_ms,
            yield_interval: Duration::from_millis(config.playback_yield_ms),
            default_volume: clamp_volume(config.playback_default_volume),
        }
    }
}

/// What a finished session delivered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaybackSummary {
    pub descriptor: StreamDescriptor,
    pub blocks: u64,
    /// Samples written to the sink, all channels.
    pub samples: u64,
    pub skipped_bytes: u64,
    pub end: EndReason,
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) }
}

/// Copy `samples` into `out` scaled by `volume`.
fn scale_into(out: &mut Vec<i16>, samples: &[i16], volume: f32) {
    out.clear();
    if volume <= 0.0 {
        out.resize(samples.len(), 0);
    } else if volume >= 1.0 {
        out.extend_from_slice(samples);
    } else {
        out.extend(samples.iter().map(|&s| (s as f32 * volume) as i16));
    }
}

/// Write all of `samples`; a write that accepts nothing counts as a timeout.
fn write_all<S: AudioSink + ?Sized>(
    sink: &mut S,
    samples: &[i16],
    timeout_ms: u32,
) -> std::result::Result<(), SinkError> {
    let mut offset = 0;
    while offset < samples.len() {
        let written = sink.write_samples(&samples[offset..], timeout_ms)?;
        if written == 0 {
            return Err(SinkError::Timeout { timeout_ms });
        }
        offset += written;
    }
    Ok(())
}

/// Holds the sink for the lifetime of a session. Dropping it flushes the
/// sink and frees the player, on every exit path.
struct ActiveSession<'a, S: AudioSink> {
    sink: MutexGuard<'a, S>,
    state: &'a AtomicU8,
}

impl<S: AudioSink> Drop for ActiveSession<'_, S> {
    fn drop(&mut self) {
        self.sink.flush_silence();
        self.state.store(IDLE, Ordering::SeqCst);
    }
}

pub struct Player<S, St, F> {
    sink: Mutex<S>,
    storage: St,
    codecs: F,
    settings: PlayerSettings,
    state: AtomicU8,
    /// f32 bits
    volume: AtomicU32,
}

impl<S, St, F> Player<S, St, F>
where
    S: AudioSink,
    St: Storage,
    F: CodecFactory,
{
    pub fn new(sink: S, storage: St, codecs: F, settings: PlayerSettings) -> Self {
        Self {
            sink: Mutex::new(sink),
            storage,
            codecs,
            volume: AtomicU32::new(clamp_volume(settings.default_volume).to_bits()),
            settings,
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn is_playing(&self) -> bool {
        self.state.load(Ordering::SeqCst) == PLAYING
    }

    /// Ask the active session to end after the block in flight. No-op when
    /// nothing is playing.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(PLAYING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            log::info!("Playback stop requested");
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Clamped to [0, 1]; applies from the next delivered block.
    pub fn set_volume(&self, volume: f32) {
        self.volume.store(clamp_volume(volume).to_bits(), Ordering::Relaxed);
    }

    /// Format of `path` from its leading bytes, without decoding.
    pub fn file_info(&self, path: &Path) -> Result<StreamDescriptor> {
        Ok(self.probe_path(path)?.0.descriptor)
    }

    /// Stream `path` to the sink, returning when the stream ends, the sink
    /// fails, or [`stop`](Self::stop) is called.
    ///
    /// `progress` receives the estimated fraction played after every block.
    pub fn start(
        &self,
        path: &Path,
        volume: f32,
        mut progress: Option<&mut dyn FnMut(f32)>,
    ) -> Result<PlaybackSummary> {
        let mut session = self.begin(volume)?;

        let (probe, size) = self.probe_path(path)?;
        let mut configured = (probe.descriptor.sample_rate, probe.descriptor.channels);
        session
            .sink
            .configure(configured.0, configured.1)
            .map_err(PlaybackError::SinkUnavailable)?;

        let file = self
            .storage
            .open(path)
            .map_err(|e| PlaybackError::source_unavailable(path, e))?;
        let mut stream =
            FrameStream::new(file, self.codecs.create(), &self.settings.stream)?.with_source_len(size);

        let total_blocks = (size / probe.header.frame_len.max(1) as u64).max(1);
        log::info!(
            "Playback started: {} ({} bytes, ~{} frames, volume {:.2})",
            path.display(),
            size,
            total_blocks,
            self.volume(),
        );

        let timeout_ms = self.settings.write_timeout_ms;
        let sink = &mut *session.sink;
        let mut scaled = Vec::new();
        let mut blocks = 0u64;
        let mut samples = 0u64;
        let mut failure = None;

        let result = stream.drive(|block| {
            if !self.is_playing() {
                return false;
            }
            // The probe only parsed a header; the decoded stream has the final say.
            let format = (block.descriptor.sample_rate, block.descriptor.channels);
            if format != configured {
                log::warn!(
                    "Stream format {} Hz x{} differs from probed {} Hz x{}, reconfiguring sink",
                    format.0,
                    format.1,
                    configured.0,
                    configured.1,
                );
                if let Err(e) = sink.configure(format.0, format.1) {
                    log::error!("Sink reconfiguration failed: {}", e);
                    failure = Some(PlaybackError::SinkUnavailable(e));
                    return false;
                }
                configured = format;
            }
            scale_into(&mut scaled, block.samples, self.volume());
            if let Err(e) = write_all(&mut *sink, &scaled, timeout_ms) {
                log::error!("Sink write failed after {} blocks: {}", blocks, e);
                failure = Some(PlaybackError::Sink(e));
                return false;
            }
            blocks += 1;
            samples += scaled.len() as u64;
            if let Some(report) = progress.as_mut() {
                report((blocks as f32 / total_blocks as f32).min(1.0));
            }
            self.pause();
            self.is_playing()
        });

        if let Some(e) = failure {
            return Err(e);
        }
        let end = result?;
        let stats = stream.stats();
        let summary = PlaybackSummary {
            descriptor: stream.descriptor().copied().unwrap_or(probe.descriptor),
            blocks,
            samples,
            skipped_bytes: stats.skipped_bytes,
            end,
        };
        log::info!(
            "Playback finished: {:?}, blocks={}, samples={}, skipped={} bytes",
            summary.end,
            summary.blocks,
            summary.samples,
            summary.skipped_bytes,
        );
        Ok(summary)
    }

    /// Play already-decoded interleaved PCM under the same single-session
    /// rule as [`start`](Self::start).
    pub fn play_pcm(
        &self,
        pcm: &[i16],
        sample_rate: u32,
        channels: u16,
        volume: f32,
    ) -> Result<PlaybackSummary> {
        let mut session = self.begin(volume)?;
        session
            .sink
            .configure(sample_rate, channels)
            .map_err(PlaybackError::SinkUnavailable)?;

        // 20 ms blocks
        let block_len = ((sample_rate as usize / 50) * channels.max(1) as usize).max(1);
        let timeout_ms = self.settings.write_timeout_ms;
        let mut scaled = Vec::with_capacity(block_len);
        let mut blocks = 0u64;
        let mut samples = 0u64;
        let mut end = EndReason::EndOfStream;

        for chunk in pcm.chunks(block_len) {
            if !self.is_playing() {
                end = EndReason::Stopped;
                break;
            }
            scale_into(&mut scaled, chunk, self.volume());
            write_all(&mut *session.sink, &scaled, timeout_ms).map_err(PlaybackError::Sink)?;
            blocks += 1;
            samples += scaled.len() as u64;
            self.pause();
        }

        let frames = pcm.len() as u64 / channels.max(1) as u64;
        Ok(PlaybackSummary {
            descriptor: StreamDescriptor {
                sample_rate,
                channels,
                bit_rate: sample_rate * channels as u32 * 16,
                duration: Some(Duration::from_secs_f64(frames as f64 / sample_rate.max(1) as f64)),
            },
            blocks,
            samples,
            skipped_bytes: 0,
            end,
        })
    }

    pub fn play_chime(&self, chime: Chime, volume: f32) -> Result<PlaybackSummary> {
        let tones = ToneGenerator::default();
        let pcm = tones.chime(chime, 1.0);
        log::info!("Playing chime {:?}", chime);
        self.play_pcm(&pcm, tones.sample_rate(), 1, volume)
    }

    /// Decode the whole of `path` into memory.
    pub fn decode_file(&self, path: &Path) -> Result<DecodedPcm> {
        let file = self
            .storage
            .open(path)
            .map_err(|e| PlaybackError::source_unavailable(path, e))?;
        let size = file.size();
        let input_len = usize::try_from(size).unwrap_or(usize::MAX);
        FrameStream::new(file, self.codecs.create(), &self.settings.stream)?
            .with_source_len(size)
            .decode_to_end(self.settings.growth, input_len)
    }

    /// Claim the player, set the volume and make sure the sink is running.
    fn begin(&self, volume: f32) -> Result<ActiveSession<'_, S>> {
        if self
            .state
            .compare_exchange(IDLE, PLAYING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PlaybackError::AlreadyPlaying);
        }
        let mut session = ActiveSession {
            sink: self.sink.lock().unwrap_or_else(PoisonError::into_inner),
            state: &self.state,
        };
        self.set_volume(volume);

        if !session.sink.is_active() {
            session.sink.start().map_err(PlaybackError::SinkUnavailable)?;
        }
        Ok(session)
    }

    fn probe_path(&self, path: &Path) -> Result<(Probe, u64)> {
        let mut file = self
            .storage
            .open(path)
            .map_err(|e| PlaybackError::source_unavailable(path, e))?;
        let size = file.size();
        let codec = self.codecs.create();
        let found = probe(&mut file, &codec, self.settings.probe_size, Some(size))?;
        Ok((found, size))
    }

    fn pause(&self) {
        if self.settings.yield_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(self.settings.yield_interval);
        }
    }
}

/// Decode an in-memory encoded stream.
pub fn decode_data<C: FrameCodec>(data: &[u8], codec: C, settings: &PlayerSettings) -> Result<DecodedPcm> {
    decode_reader(Cursor::new(data), data.len(), codec, settings)
}

fn decode_reader<R: Read, C: FrameCodec>(
    reader: R,
    input_len: usize,
    codec: C,
    settings: &PlayerSettings,
) -> Result<DecodedPcm> {
    FrameStream::new(reader, codec, &settings.stream)?
        .with_source_len(input_len as u64)
        .decode_to_end(settings.growth, input_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::testing::MemoryStorage;
    use crate::audio::stream::testing::{POISON, ScriptedCodec, frame};
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum WriteMode {
        Accept,
        /// Accept at most this many samples per call.
        Partial(usize),
        Timeout,
    }

    #[derive(Debug, Default)]
    struct Recorder {
        writes: Vec<Vec<i16>>,
        flushes: usize,
        starts: usize,
        configured: Vec<(u32, u16)>,
    }

    struct MockSink {
        log: Arc<Mutex<Recorder>>,
        active: bool,
        mode: WriteMode,
    }

    impl AudioSink for MockSink {
        fn is_active(&self) -> bool {
            self.active
        }

        fn start(&mut self) -> std::result::Result<(), SinkError> {
            self.active = true;
            self.log.lock().unwrap().starts += 1;
            Ok(())
        }

        fn configure(&mut self, sample_rate: u32, channels: u16) -> std::result::Result<(), SinkError> {
            self.log.lock().unwrap().configured.push((sample_rate, channels));
            Ok(())
        }

        fn write_samples(&mut self, samples: &[i16], timeout_ms: u32) -> std::result::Result<usize, SinkError> {
            let n = match self.mode {
                WriteMode::Accept => samples.len(),
                WriteMode::Partial(max) => samples.len().min(max),
                WriteMode::Timeout => return Err(SinkError::Timeout { timeout_ms }),
            };
            self.log.lock().unwrap().writes.push(samples[..n].to_vec());
            Ok(n)
        }

        fn flush_silence(&mut self) {
            self.log.lock().unwrap().flushes += 1;
        }
    }

    struct Harness<F> {
        player: Player<MockSink, MemoryStorage, F>,
        log: Arc<Mutex<Recorder>>,
        decodes: Arc<AtomicUsize>,
    }

    impl<F: CodecFactory> Harness<F> {
        fn written(&self) -> Vec<i16> {
            self.log.lock().unwrap().writes.concat()
        }

        fn opens(&self) -> usize {
            self.player.storage.opens()
        }
    }

    fn settings() -> PlayerSettings {
        PlayerSettings {
            stream: StreamSettings {
                buffer_size: 256,
                low_water_mark: 64,
            },
            probe_size: 64,
            yield_interval: Duration::ZERO,
            ..PlayerSettings::default()
        }
    }

    /// `count` mono frames of 40 bytes (35 samples each), frame `i` filled
    /// with `i + 1`.
    fn song(count: u8) -> Vec<u8> {
        (0..count).flat_map(|i| frame(40, 1, i + 1)).collect()
    }

    fn harness(
        mode: WriteMode,
        files: &[(&str, Vec<u8>)],
    ) -> Harness<impl CodecFactory<Codec = ScriptedCodec> + use<>> {
        let mut storage = MemoryStorage::new(16);
        for (path, data) in files {
            storage = storage.with_file(path, data.clone());
        }
        let log = Arc::new(Mutex::new(Recorder::default()));
        let sink = MockSink {
            log: log.clone(),
            active: false,
            mode,
        };
        let codec = ScriptedCodec::new();
        let decodes = codec.decode_counter();
        let player = Player::new(sink, storage, move || codec.clone(), settings());
        Harness { player, log, decodes }
    }

    #[test]
    fn test_start_plays_whole_file() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(5))]);
        let summary = h.player.start(Path::new("song.mp3"), 1.0, None).unwrap();

        assert_eq!(summary.end, EndReason::EndOfStream);
        assert_eq!(summary.blocks, 5);
        assert_eq!(summary.samples, 5 * 35);
        assert_eq!(summary.descriptor.sample_rate, 8000);
        assert_eq!(h.written().len(), 5 * 35);
        assert_eq!(h.written()[35], 2);

        let log = h.log.lock().unwrap();
        assert_eq!(log.starts, 1);
        assert_eq!(log.flushes, 1);
        assert_eq!(log.configured, vec![(8000, 1)]);
        drop(log);
        assert!(!h.player.is_playing());
    }

    #[test]
    fn test_sink_follows_decoded_format_over_probed_header() {
        // A stereo header with an undecodable body, then three mono frames.
        let mut data = frame(20, 2, POISON);
        data.extend(song(3));
        let h = harness(WriteMode::Accept, &[("song.mp3", data)]);
        let summary = h.player.start(Path::new("song.mp3"), 1.0, None).unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(summary.descriptor.channels, 1);
        assert_eq!(h.written().len(), 3 * 35);
        let log = h.log.lock().unwrap();
        assert_eq!(log.configured, vec![(8000, 2), (8000, 1)]);
    }

    #[test]
    fn test_sink_timeout_fails_start_and_releases_player() {
        let h = harness(WriteMode::Timeout, &[("song.mp3", song(5))]);
        let result = h.player.start(Path::new("song.mp3"), 1.0, None);

        assert!(matches!(result, Err(PlaybackError::Sink(SinkError::Timeout { .. }))));
        assert!(!h.player.is_playing());
        assert_eq!(h.log.lock().unwrap().flushes, 1);
        assert_eq!(h.decodes.load(Ordering::SeqCst), 1);

        // The player is free for the next session.
        let again = h.player.start(Path::new("song.mp3"), 1.0, None);
        assert!(matches!(again, Err(PlaybackError::Sink(_))));
    }

    #[test]
    fn test_stop_from_progress_callback_after_third_block() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(10))]);
        let player = &h.player;
        let mut seen = Vec::new();
        let mut progress = |fraction: f32| {
            seen.push(fraction);
            if seen.len() == 3 {
                player.stop();
            }
        };
        let summary = player.start(Path::new("song.mp3"), 1.0, Some(&mut progress)).unwrap();

        assert_eq!(summary.end, EndReason::Stopped);
        assert_eq!(summary.blocks, 3);
        assert_eq!(h.decodes.load(Ordering::SeqCst), 3);
        let log = h.log.lock().unwrap();
        assert_eq!(log.writes.len(), 3);
        assert_eq!(log.flushes, 1);
        drop(log);

        assert_eq!(seen.len(), 3);
        assert!((seen[0] - 0.1).abs() < 1e-6);
        assert!((seen[2] - 0.3).abs() < 1e-6);
        assert!(!player.is_playing());
    }

    #[test]
    fn test_empty_file_fails_before_streaming() {
        let h = harness(WriteMode::Accept, &[("empty.mp3", Vec::new())]);

        let info = h.player.file_info(Path::new("empty.mp3"));
        assert!(matches!(info, Err(PlaybackError::NoFrameFound)));
        assert_eq!(h.opens(), 1);

        let result = h.player.start(Path::new("empty.mp3"), 1.0, None);
        assert!(matches!(result, Err(PlaybackError::NoFrameFound)));
        // Only the probe opened the file; the stream was never set up.
        assert_eq!(h.opens(), 2);
        assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
        assert!(h.log.lock().unwrap().writes.is_empty());
        assert!(!h.player.is_playing());
    }

    #[test]
    fn test_missing_file() {
        let h = harness(WriteMode::Accept, &[]);
        let result = h.player.start(Path::new("nope.mp3"), 1.0, None);
        assert!(matches!(result, Err(PlaybackError::SourceUnavailable { .. })));
        assert!(!h.player.is_playing());
    }

    #[test]
    fn test_second_start_while_playing_is_rejected() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(3))]);
        let player = &h.player;
        let mut nested = None;
        let mut progress = |_: f32| {
            if nested.is_none() {
                nested = Some(player.start(Path::new("song.mp3"), 1.0, None));
            }
        };
        let summary = player.start(Path::new("song.mp3"), 1.0, Some(&mut progress)).unwrap();

        assert!(matches!(nested, Some(Err(PlaybackError::AlreadyPlaying))));
        assert_eq!(summary.blocks, 3);
    }

    #[test]
    fn test_file_info_while_playing() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(3))]);
        let player = &h.player;
        let mut info = None;
        let mut progress = |_: f32| {
            info.get_or_insert_with(|| player.file_info(Path::new("song.mp3")).ok());
        };
        player.start(Path::new("song.mp3"), 1.0, Some(&mut progress)).unwrap();

        let descriptor = info.flatten().unwrap();
        assert_eq!(descriptor.channels, 1);
        // 120 bytes at 64 kbit/s
        let duration = descriptor.duration.unwrap();
        assert!((duration.as_secs_f64() - 0.015).abs() < 1e-6);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(4))]);
        h.player.stop();
        h.player.stop();
        assert!(!h.player.is_playing());

        let player = &h.player;
        let mut progress = |_: f32| {
            player.stop();
            player.stop();
        };
        let summary = player.start(Path::new("song.mp3"), 1.0, Some(&mut progress)).unwrap();
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.end, EndReason::Stopped);

        // A new session starts normally afterwards.
        let summary = player.start(Path::new("song.mp3"), 1.0, None).unwrap();
        assert_eq!(summary.blocks, 4);
    }

    #[test]
    fn test_volume_is_clamped() {
        let h = harness(WriteMode::Accept, &[]);
        h.player.set_volume(-1.0);
        assert_eq!(h.player.volume(), 0.0);
        h.player.set_volume(2.0);
        assert_eq!(h.player.volume(), 1.0);
        h.player.set_volume(f32::NAN);
        assert_eq!(h.player.volume(), 0.0);
        h.player.set_volume(0.25);
        assert_eq!(h.player.volume(), 0.25);
    }

    #[test]
    fn test_zero_volume_still_delivers_silence() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(4))]);
        let mut reports = 0;
        let mut progress = |_: f32| reports += 1;
        let summary = h
            .player
            .start(Path::new("song.mp3"), 0.0, Some(&mut progress))
            .unwrap();

        assert_eq!(summary.blocks, 4);
        assert_eq!(reports, 4);
        let written = h.written();
        assert_eq!(written.len(), 4 * 35);
        assert!(written.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_volume_change_applies_to_next_block() {
        let data: Vec<u8> = (0..3).flat_map(|_| frame(40, 1, 100)).collect();
        let h = harness(WriteMode::Accept, &[("song.mp3", data)]);
        let player = &h.player;
        let mut progress = |_: f32| player.set_volume(0.5);
        player.start(Path::new("song.mp3"), 1.0, Some(&mut progress)).unwrap();

        let log = h.log.lock().unwrap();
        assert!(log.writes[0].iter().all(|&s| s == 100));
        assert!(log.writes[1].iter().all(|&s| s == 50));
        assert!(log.writes[2].iter().all(|&s| s == 50));
    }

    #[test]
    fn test_partial_writes_are_completed() {
        let h = harness(WriteMode::Partial(8), &[("song.mp3", song(2))]);
        let summary = h.player.start(Path::new("song.mp3"), 1.0, None).unwrap();

        assert_eq!(summary.samples, 70);
        assert_eq!(h.written().len(), 70);
        // 35 samples per block in chunks of 8
        assert_eq!(h.log.lock().unwrap().writes.len(), 2 * 5);
    }

    #[test]
    fn test_zero_length_write_counts_as_timeout() {
        let h = harness(WriteMode::Partial(0), &[("song.mp3", song(2))]);
        let result = h.player.start(Path::new("song.mp3"), 1.0, None);
        assert!(matches!(result, Err(PlaybackError::Sink(SinkError::Timeout { .. }))));
    }

    #[test]
    fn test_corrupt_file_reports_no_decodable_frames() {
        let data: Vec<u8> = (0..4).flat_map(|_| frame(40, 1, 0xEE)).collect();
        let h = harness(WriteMode::Accept, &[("bad.mp3", data)]);
        let result = h.player.start(Path::new("bad.mp3"), 1.0, None);
        assert!(matches!(result, Err(PlaybackError::NoDecodableFrames)));
        assert_eq!(h.log.lock().unwrap().flushes, 1);
        assert!(!h.player.is_playing());
    }

    #[test]
    fn test_garbage_is_skipped_and_reported() {
        let mut data = vec![0x33; 50];
        data.extend(song(2));
        let h = harness(WriteMode::Accept, &[("song.mp3", data)]);
        let summary = h.player.start(Path::new("song.mp3"), 1.0, None).unwrap();
        assert_eq!(summary.blocks, 2);
        assert_eq!(summary.skipped_bytes, 50);
    }

    #[test]
    fn test_play_chime_uses_tone_format() {
        let h = harness(WriteMode::Accept, &[]);
        let summary = h.player.play_chime(Chime::BeepShort, 1.0).unwrap();

        assert_eq!(summary.samples, 3200);
        assert_eq!(summary.end, EndReason::EndOfStream);
        let duration = summary.descriptor.duration.unwrap();
        assert!((duration.as_secs_f64() - 0.2).abs() < 1e-6);
        let log = h.log.lock().unwrap();
        assert_eq!(log.configured, vec![(16_000, 1)]);
        assert_eq!(log.flushes, 1);
        // 20 ms blocks at 16 kHz
        assert_eq!(log.writes.len(), 10);
    }

    #[test]
    fn test_decode_file_collects_all_frames() {
        let h = harness(WriteMode::Accept, &[("song.mp3", song(6))]);
        let pcm = h.player.decode_file(Path::new("song.mp3")).unwrap();
        assert_eq!(pcm.samples.len(), 6 * 35);
        assert_eq!(pcm.descriptor.channels, 1);
        assert!(h.log.lock().unwrap().writes.is_empty());
    }

    #[test]
    fn test_decode_data_in_memory() {
        let data = song(3);
        let pcm = decode_data(&data, ScriptedCodec::new(), &settings()).unwrap();
        assert_eq!(pcm.samples.len(), 3 * 35);
        assert_eq!(pcm.stats.frames, 3);

        let garbage = vec![0u8; 100];
        let result = decode_data(&garbage, ScriptedCodec::new(), &settings());
        assert!(matches!(result, Err(PlaybackError::NoDecodableFrames)));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = PlayerSettings::from(&Config::default());
        assert_eq!(settings.stream.buffer_size, 8192);
        assert_eq!(settings.stream.low_water_mark, 2048);
        assert_eq!(settings.probe_size, 4096);
        assert_eq!(settings.growth, GrowthPolicy::default());
    }
}
