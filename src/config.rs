use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Config {
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 播放设备
    pub playback_device: &'static str,
    /// 0 keeps the driver default
    pub playback_period_size: usize,
    pub playback_sample_rate: u32,
    pub playback_channels: u16,
    pub playback_write_timeout_ms: u32,
    pub playback_silence_ms: u32,
    pub playback_default_volume: f32,
    pub playback_yield_ms: u64,
    /// Relative paths resolve against this directory; empty for the cwd.
    pub storage_root: &'static str,

    // 流缓冲
    pub stream_buffer_size: usize,
    pub stream_low_water_mark: usize,
    pub stream_probe_size: usize,
    pub stream_compression_ratio: usize,
    pub stream_growth_factor: usize,
}

impl Config {
    /// Build the configuration from the environment variables `build.rs`
    /// exports from config.toml at compile time.
    pub fn new() -> Result<Self, &'static str> {
        let config = Self {
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            playback_device: env!("PLAYBACK_DEVICE"),
            playback_period_size: env!("PLAYBACK_PERIOD_SIZE").parse()
                .map_err(|_| "Failed to parse PLAYBACK_PERIOD_SIZE")?,
            playback_sample_rate: env!("PLAYBACK_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse PLAYBACK_SAMPLE_RATE")?,
            playback_channels: env!("PLAYBACK_CHANNELS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_CHANNELS")?,
            playback_write_timeout_ms: env!("PLAYBACK_WRITE_TIMEOUT_MS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_WRITE_TIMEOUT_MS")?,
            playback_silence_ms: env!("PLAYBACK_SILENCE_MS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_SILENCE_MS")?,
            playback_default_volume: env!("PLAYBACK_DEFAULT_VOLUME").parse()
                .map_err(|_| "Failed to parse PLAYBACK_DEFAULT_VOLUME")?,
            playback_yield_ms: env!("PLAYBACK_YIELD_MS").parse()
                .map_err(|_| "Failed to parse PLAYBACK_YIELD_MS")?,
            storage_root: env!("STORAGE_ROOT"),

            stream_buffer_size: env!("STREAM_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse STREAM_BUFFER_SIZE")?,
            stream_low_water_mark: env!("STREAM_LOW_WATER_MARK").parse()
                .map_err(|_| "Failed to parse STREAM_LOW_WATER_MARK")?,
            stream_probe_size: env!("STREAM_PROBE_SIZE").parse()
                .map_err(|_| "Failed to parse STREAM_PROBE_SIZE")?,
            stream_compression_ratio: env!("STREAM_COMPRESSION_RATIO").parse()
                .map_err(|_| "Failed to parse STREAM_COMPRESSION_RATIO")?,
            stream_growth_factor: env!("STREAM_GROWTH_FACTOR").parse()
                .map_err(|_| "Failed to parse STREAM_GROWTH_FACTOR")?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.stream_buffer_size == 0 {
            return Err("STREAM_BUFFER_SIZE must be non-zero");
        }
        if self.stream_low_water_mark > self.stream_buffer_size {
            return Err("STREAM_LOW_WATER_MARK exceeds STREAM_BUFFER_SIZE");
        }
        if self.stream_probe_size == 0 {
            return Err("STREAM_PROBE_SIZE must be non-zero");
        }
        if !(1..=2).contains(&self.playback_channels) {
            return Err("PLAYBACK_CHANNELS must be 1 or 2");
        }
        Ok(())
    }

    pub fn period_size(&self) -> Option<usize> {
        (self.playback_period_size > 0).then_some(self.playback_period_size)
    }

    pub fn storage_root(&self) -> Option<&'static str> {
        (!self.storage_root.is_empty()).then_some(self.storage_root)
    }
}

impl Default for Config {
    /// Built-in values, used when the compiled-in configuration is unusable.
    fn default() -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME"),
            app_version: env!("CARGO_PKG_VERSION"),
            playback_device: "default",
            playback_period_size: 0,
            playback_sample_rate: 44100,
            playback_channels: 2,
            playback_write_timeout_ms: 1000,
            playback_silence_ms: 50,
            playback_default_volume: 0.5,
            playback_yield_ms: 1,
            storage_root: "",
            stream_buffer_size: 8192,
            stream_low_water_mark: 2048,
            stream_probe_size: 4096,
            stream_compression_ratio: 10,
            stream_growth_factor: 2,
        }
    }
}
