use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    playback: Playback,
    stream: Stream,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Playback {
    device: String,
    period_size: usize,
    sample_rate: u32,
    channels: u16,
    write_timeout_ms: u32,
    silence_ms: u32,
    default_volume: f32,
    yield_ms: u64,
    #[serde(default)]
    storage_root: String,
}

#[derive(Deserialize)]
struct Stream {
    buffer_size: usize,
    low_water_mark: usize,
    probe_size: usize,
    compression_ratio: usize,
    growth_factor: usize,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 播放配置
    let playback = &config.playback;
    println!("cargo:rustc-env=PLAYBACK_DEVICE={}", playback.device);
    println!("cargo:rustc-env=PLAYBACK_PERIOD_SIZE={}", playback.period_size);
    println!("cargo:rustc-env=PLAYBACK_SAMPLE_RATE={}", playback.sample_rate);
    println!("cargo:rustc-env=PLAYBACK_CHANNELS={}", playback.channels);
    println!("cargo:rustc-env=PLAYBACK_WRITE_TIMEOUT_MS={}", playback.write_timeout_ms);
    println!("cargo:rustc-env=PLAYBACK_SILENCE_MS={}", playback.silence_ms);
    println!("cargo:rustc-env=PLAYBACK_DEFAULT_VOLUME={}", playback.default_volume);
    println!("cargo:rustc-env=PLAYBACK_YIELD_MS={}", playback.yield_ms);
    println!("cargo:rustc-env=STORAGE_ROOT={}", playback.storage_root);

    // 流缓冲配置
    let stream = &config.stream;
    println!("cargo:rustc-env=STREAM_BUFFER_SIZE={}", stream.buffer_size);
    println!("cargo:rustc-env=STREAM_LOW_WATER_MARK={}", stream.low_water_mark);
    println!("cargo:rustc-env=STREAM_PROBE_SIZE={}", stream.probe_size);
    println!("cargo:rustc-env=STREAM_COMPRESSION_RATIO={}", stream.compression_ratio);
    println!("cargo:rustc-env=STREAM_GROWTH_FACTOR={}", stream.growth_factor);
}
