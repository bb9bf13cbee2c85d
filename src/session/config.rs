use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Driver this call belongs to
    pub driver_id: String,

    /// Unique session identifier (e.g. "call-<uuid>")
    pub session_id: String,

    /// Pause before the opening greeting is sent
    pub greeting_delay: Duration,

    /// Pause before listening resumes after a reply with no audio
    pub reply_delay: Duration,

    /// Cooldown after playback so the microphone misses trailing reply audio
    pub echo_cooldown: Duration,
}

impl CallConfig {
    pub fn new(driver_id: impl Into<String>) -> Self {
        Self {
            driver_id: driver_id.into(),
            ..Default::default()
        }
    }

    /// Apply the `[call]` section of the service configuration
    pub fn with_timings(mut self, timings: &crate::config::CallTimingConfig) -> Self {
        self.greeting_delay = Duration::from_millis(timings.greeting_delay_ms);
        self.reply_delay = Duration::from_millis(timings.reply_delay_ms);
        self.echo_cooldown = Duration::from_millis(timings.echo_cooldown_ms);
        self
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            driver_id: "default".to_string(),
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            greeting_delay: Duration::from_millis(1000),
            reply_delay: Duration::from_millis(1000),
            echo_cooldown: Duration::from_millis(3000),
        }
    }
}
