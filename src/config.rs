use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub audio: AudioConfig,
    pub call: CallTimingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Remote dialogue backend endpoints. `base_url` is the single setting that
/// selects the host; the stream URL defaults to the same host over ws://.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub stream_url: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Length of each recorded chunk handed to the backend
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration_secs: u64,
    /// Recorder poll cadence while waiting for the may-record signal
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

/// Coordinator timing. The echo cooldown keeps the microphone closed long
/// enough that trailing reply audio is never re-captured as user input.
#[derive(Debug, Deserialize)]
pub struct CallTimingConfig {
    #[serde(default = "default_greeting_delay")]
    pub greeting_delay_ms: u64,
    #[serde(default = "default_reply_delay")]
    pub reply_delay_ms: u64,
    #[serde(default = "default_echo_cooldown")]
    pub echo_cooldown_ms: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_chunk_duration() -> u64 {
    4
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_greeting_delay() -> u64 {
    1000
}

fn default_reply_delay() -> u64 {
    1000
}

fn default_echo_cooldown() -> u64 {
    3000
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
