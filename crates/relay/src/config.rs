//! Session configuration.

use std::time::Duration;

use crate::bridge::protocol::DEFAULT_LANGUAGE;

/// Response timeout applied to every request when nothing else is configured.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a request waits for its reply before failing with `RequestTimeout`.
    pub response_timeout: Duration,
    /// Listening window sent to the device with `listen` requests.
    pub listen_timeout: Duration,
    /// Language tag for speech and transcription.
    pub language: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let response_timeout = std::env::var("RELAY_RESPONSE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT);

        Self {
            response_timeout,
            listen_timeout: DEFAULT_RESPONSE_TIMEOUT,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_listen_timeout(mut self, timeout: Duration) -> Self {
        self.listen_timeout = timeout;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}
