//! Client configuration.

use std::time::Duration;

/// Default REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.finlight.me";

/// Default streaming endpoint.
pub const DEFAULT_WSS_URL: &str = "wss://wss.finlight.me";

/// Configuration shared by the REST facade and the streaming clients.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// API key sent as `x-api-key` on every surface.
    pub api_key: String,

    /// Base URL for REST requests.
    pub base_url: String,

    /// Base URL for the article stream.
    pub wss_url: String,

    // Heartbeat settings
    /// Interval between application-level ping frames.
    pub ping_interval: Duration,
    /// Maximum silence after the last pong before the connection is recycled.
    pub pong_timeout: Duration,

    // Reconnection settings
    /// Initial delay before a reconnection attempt.
    pub base_reconnect_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_reconnect_delay: Duration,

    /// Maximum age of a single connection before proactive rotation.
    ///
    /// Kept below the infrastructure's two-hour connection ceiling so the
    /// client rotates on its own terms.
    pub connection_lifetime: Duration,

    /// Request that the server terminate any other session for this key.
    pub takeover: bool,

    // REST retry settings
    /// Maximum attempts per REST request (first try included).
    pub retry_attempts: u32,
    /// Delay before the first REST retry; doubles per attempt.
    pub retry_base_delay: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            wss_url: DEFAULT_WSS_URL.to_string(),
            ping_interval: Duration::from_secs(25),
            pong_timeout: Duration::from_secs(60),
            base_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            connection_lifetime: Duration::from_secs(6_900),
            takeover: false,
            retry_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

impl ApiConfig {
    /// Create a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Set the REST base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the stream base URL.
    #[must_use]
    pub fn wss_url(mut self, url: impl Into<String>) -> Self {
        self.wss_url = url.into();
        self
    }

    /// Set the heartbeat ping interval.
    #[must_use]
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the pong watchdog threshold.
    #[must_use]
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Set the initial reconnection delay.
    #[must_use]
    pub fn base_reconnect_delay(mut self, delay: Duration) -> Self {
        self.base_reconnect_delay = delay;
        self
    }

    /// Set the maximum reconnection delay.
    #[must_use]
    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Set the proactive rotation deadline.
    #[must_use]
    pub fn connection_lifetime(mut self, lifetime: Duration) -> Self {
        self.connection_lifetime = lifetime;
        self
    }

    /// Enable or disable session takeover.
    #[must_use]
    pub fn takeover(mut self, takeover: bool) -> Self {
        self.takeover = takeover;
        self
    }

    /// Set the maximum REST attempts per request.
    #[must_use]
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the base REST retry delay.
    #[must_use]
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_key.is_empty() {
            return Err("API key cannot be empty".to_string());
        }
        url::Url::parse(&self.base_url).map_err(|e| format!("Invalid base URL: {e}"))?;
        url::Url::parse(&self.wss_url).map_err(|e| format!("Invalid stream URL: {e}"))?;
        if self.ping_interval.is_zero() {
            return Err("Ping interval must be > 0".to_string());
        }
        if self.pong_timeout.is_zero() {
            return Err("Pong timeout must be > 0".to_string());
        }
        if self.base_reconnect_delay.is_zero() {
            return Err("Base reconnect delay must be > 0".to_string());
        }
        if self.max_reconnect_delay < self.base_reconnect_delay {
            return Err("Max reconnect delay must be >= base reconnect delay".to_string());
        }
        if self.connection_lifetime.is_zero() {
            return Err("Connection lifetime must be > 0".to_string());
        }
        if self.retry_attempts == 0 {
            return Err("Retry attempts must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert!(config.api_key.is_empty());
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.wss_url, DEFAULT_WSS_URL);
        assert_eq!(config.ping_interval, Duration::from_secs(25));
        assert_eq!(config.pong_timeout, Duration::from_secs(60));
        assert_eq!(config.base_reconnect_delay, Duration::from_millis(500));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(10));
        assert_eq!(config.connection_lifetime, Duration::from_secs(6_900));
        assert!(!config.takeover);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ApiConfig::new("key")
            .wss_url("wss://example.com")
            .ping_interval(Duration::from_secs(15))
            .connection_lifetime(Duration::from_secs(60))
            .takeover(true);

        assert_eq!(config.api_key, "key");
        assert_eq!(config.wss_url, "wss://example.com");
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.connection_lifetime, Duration::from_secs(60));
        assert!(config.takeover);
    }

    #[test]
    fn test_validation_empty_api_key() {
        let config = ApiConfig::default();
        let result = config.validate();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "API key cannot be empty");
    }

    #[test]
    fn test_validation_invalid_url() {
        let config = ApiConfig::new("key").wss_url("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_delay_ordering() {
        let config = ApiConfig::new("key")
            .base_reconnect_delay(Duration::from_secs(20))
            .max_reconnect_delay(Duration::from_secs(10));
        let result = config.validate();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err(),
            "Max reconnect delay must be >= base reconnect delay"
        );
    }

    #[test]
    fn test_validation_valid_config() {
        let config = ApiConfig::new("key");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_ping_interval() {
        let mut config = ApiConfig::new("key");
        config.ping_interval = Duration::ZERO;
        let result = config.validate();
        assert!(result.is_err());
        assert_eq!(result.unwrap_err(), "Ping interval must be > 0");
    }
}
