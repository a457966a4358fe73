//! Synthesized tones and UI chimes, rendered to mono i16 PCM.

use std::f32::consts::{PI, TAU};

/// Rate chimes are rendered at.
pub const TONE_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    /// Value in [-1, 1] at `phase` radians.
    fn sample(self, phase: f32) -> f32 {
        let phase = phase.rem_euclid(TAU);
        match self {
            Waveform::Sine => phase.sin(),
            Waveform::Square => {
                if phase < PI {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Triangle => {
                if phase < PI {
                    2.0 * phase / PI - 1.0
                } else {
                    3.0 - 2.0 * phase / PI
                }
            }
            Waveform::Sawtooth => phase / PI - 1.0,
        }
    }
}

/// Named UI sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Chime {
    BeepShort,
    BeepLong,
    DoubleBeep,
    TripleBeep,
    Confirmation,
    Error,
    Startup,
    Notification,
    AlarmSoft,
    AlarmUrgent,
    Click,
    Success,
    Warning,
    PowerOn,
    PowerOff,
}

#[derive(Debug, Clone, Copy)]
pub struct ToneGenerator {
    sample_rate: u32,
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new(TONE_SAMPLE_RATE)
    }
}

impl ToneGenerator {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn samples_for(&self, duration_ms: u32) -> usize {
        self.sample_rate as usize * duration_ms as usize / 1000
    }

    fn peak(amplitude: f32) -> f32 {
        amplitude.clamp(0.0, 1.0) * i16::MAX as f32
    }

    pub fn silence(&self, duration_ms: u32) -> Vec<i16> {
        vec![0; self.samples_for(duration_ms)]
    }

    /// A single tone with a short fade at both ends.
    pub fn tone(&self, frequency: f32, duration_ms: u32, amplitude: f32, waveform: Waveform) -> Vec<i16> {
        let n = self.samples_for(duration_ms);
        let step = TAU * frequency / self.sample_rate as f32;
        let peak = Self::peak(amplitude);

        let mut out: Vec<i16> = (0..n)
            .map(|i| (waveform.sample(step * i as f32) * peak) as i16)
            .collect();
        let fade = (n / 20).min(self.samples_for(5));
        apply_fade(&mut out, fade);
        out
    }

    /// Sine tones separated by `pause_ms` of silence.
    pub fn sequence(&self, steps: &[(f32, u32)], pause_ms: u32, amplitude: f32) -> Vec<i16> {
        let mut out = Vec::new();
        for (i, &(frequency, duration_ms)) in steps.iter().enumerate() {
            if i > 0 {
                out.extend(self.silence(pause_ms));
            }
            out.extend(self.tone(frequency, duration_ms, amplitude, Waveform::Sine));
        }
        out
    }

    /// Linear sine sweep from `start_hz` to `end_hz`.
    pub fn sweep(&self, start_hz: f32, end_hz: f32, duration_ms: u32, amplitude: f32) -> Vec<i16> {
        let n = self.samples_for(duration_ms);
        let peak = Self::peak(amplitude);
        let mut phase = 0.0f32;
        let mut out = Vec::with_capacity(n);

        for i in 0..n {
            let t = i as f32 / n as f32;
            let frequency = start_hz + (end_hz - start_hz) * t;
            out.push((phase.sin() * peak) as i16);
            phase = (phase + TAU * frequency / self.sample_rate as f32) % TAU;
        }
        let fade = (n / 20).min(self.samples_for(10));
        apply_fade(&mut out, fade);
        out
    }

    /// Telephone keypad tone, or `None` for a character with no DTMF pair.
    pub fn dtmf(&self, digit: char, duration_ms: u32, amplitude: f32) -> Option<Vec<i16>> {
        let (low, high) = dtmf_pair(digit)?;
        let n = self.samples_for(duration_ms);
        // Each component at half level so the sum cannot clip.
        let peak = Self::peak(amplitude) * 0.5;
        let rate = self.sample_rate as f32;

        let mut out: Vec<i16> = (0..n)
            .map(|i| {
                let t = i as f32 / rate;
                (((TAU * low * t).sin() + (TAU * high * t).sin()) * peak) as i16
            })
            .collect();
        let fade = (n / 40).min(self.samples_for(2));
        apply_fade(&mut out, fade);
        Some(out)
    }

    /// Uniform white noise; `seed` makes the output reproducible.
    pub fn noise(&self, duration_ms: u32, amplitude: f32, seed: u32) -> Vec<i16> {
        let n = self.samples_for(duration_ms);
        let peak = Self::peak(amplitude);
        let mut state = seed.max(1);

        let mut out: Vec<i16> = (0..n)
            .map(|_| {
                // xorshift32
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let unit = (state >> 16) as f32 / 32768.0 - 1.0;
                (unit * peak) as i16
            })
            .collect();
        let fade = (n / 20).min(self.samples_for(10));
        apply_fade(&mut out, fade);
        out
    }

    pub fn chime(&self, chime: Chime, amplitude: f32) -> Vec<i16> {
        match chime {
            Chime::BeepShort => self.tone(1000.0, 200, amplitude, Waveform::Sine),
            Chime::BeepLong => self.tone(1000.0, 500, amplitude, Waveform::Sine),
            Chime::DoubleBeep => self.sequence(&[(1000.0, 150); 2], 100, amplitude),
            Chime::TripleBeep => self.sequence(&[(1000.0, 100); 3], 80, amplitude),
            Chime::Confirmation => self.sequence(&[(800.0, 150), (1200.0, 200)], 50, amplitude),
            Chime::Error => self.sequence(&[(400.0, 300), (300.0, 300)], 100, amplitude),
            Chime::Startup => self.sequence(
                &[(523.0, 200), (659.0, 200), (784.0, 200), (1047.0, 400)],
                50,
                amplitude,
            ),
            Chime::Notification => {
                self.sequence(&[(1000.0, 100), (1500.0, 100), (1000.0, 100)], 50, amplitude)
            }
            Chime::AlarmSoft => self.sweep(500.0, 800.0, 1000, amplitude),
            Chime::AlarmUrgent => self.sweep(800.0, 1200.0, 500, amplitude),
            Chime::Click => self.tone(2000.0, 50, amplitude, Waveform::Square),
            Chime::Success => self.sequence(&[(523.0, 150), (659.0, 150), (784.0, 300)], 30, amplitude),
            Chime::Warning => self.sequence(
                &[(800.0, 200), (600.0, 200), (800.0, 200), (600.0, 200)],
                50,
                amplitude,
            ),
            Chime::PowerOn => self.sequence(&power_steps(false), 20, amplitude),
            Chime::PowerOff => self.sequence(&power_steps(true), 20, amplitude),
        }
    }
}

/// 300 Hz to 800 Hz in 100 Hz steps, the last one held longer.
fn power_steps(descending: bool) -> [(f32, u32); 6] {
    let mut steps = [(0.0, 100); 6];
    for (i, step) in steps.iter_mut().enumerate() {
        let offset = if descending { 5 - i } else { i };
        step.0 = 300.0 + 100.0 * offset as f32;
    }
    steps[5].1 = 200;
    steps
}

fn dtmf_pair(digit: char) -> Option<(f32, f32)> {
    const LOW: [f32; 4] = [697.0, 770.0, 852.0, 941.0];
    const HIGH: [f32; 4] = [1209.0, 1336.0, 1477.0, 1633.0];
    const KEYS: [[char; 4]; 4] = [
        ['1', '2', '3', 'A'],
        ['4', '5', '6', 'B'],
        ['7', '8', '9', 'C'],
        ['*', '0', '#', 'D'],
    ];
    let digit = digit.to_ascii_uppercase();
    KEYS.iter().enumerate().find_map(|(row, keys)| {
        keys.iter()
            .position(|&k| k == digit)
            .map(|col| (LOW[row], HIGH[col]))
    })
}

/// Linear ramp over the first and last `len` samples.
fn apply_fade(samples: &mut [i16], len: usize) {
    let n = samples.len();
    if len == 0 || n == 0 {
        return;
    }
    for i in 0..len.min(n) {
        samples[i] = (samples[i] as f32 * i as f32 / len as f32) as i16;
    }
    for i in n.saturating_sub(len)..n {
        samples[i] = (samples[i] as f32 * (n - i) as f32 / len as f32) as i16;
    }
}
