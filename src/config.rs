//! Client configuration.

use std::time::Duration;

use crate::error::Error;
use crate::tls::TlsClientConfig;

/// Runtime configuration for [`Client`](crate::Client).
#[derive(Clone)]
pub struct Config {
    /// Maximum number of requests holding a socket at once.
    pub concurrency: usize,
    /// Maximum redirect hops before a chain fails.
    pub max_redirects: usize,
    /// Bound on each readiness wait inside one event-loop tick.
    pub poll_timeout: Duration,
    /// Value of the default `User-Agent` header.
    pub user_agent: String,
    /// TLS client configuration for https requests. When absent, https
    /// requests fail at admission.
    pub tls_client: Option<TlsClientConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_redirects: 3,
            poll_timeout: Duration::from_millis(50),
            user_agent: format!("fetchline/{}", env!("CARGO_PKG_VERSION")),
            tls_client: None,
        }
    }
}

impl Config {
    /// Validate configuration values. Returns an error if any value is out
    /// of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be > 0".to_string()));
        }
        if self.user_agent.is_empty() {
            return Err(Error::Config("user_agent must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for [`Config`] with discoverable methods and `build()` validation.
///
/// # Example
///
/// ```rust
/// use fetchline::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .concurrency(4)
///     .max_redirects(5)
///     .build()
///     .expect("invalid config");
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrently connected requests.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Set the maximum redirect hops.
    pub fn max_redirects(mut self, n: usize) -> Self {
        self.config.max_redirects = n;
        self
    }

    /// Set the bound on each readiness wait.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    /// Set the default `User-Agent` header value.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.config.user_agent = ua.to_string();
        self
    }

    /// Set the TLS client configuration for https requests.
    pub fn tls_client(mut self, config: TlsClientConfig) -> Self {
        self.config.tls_client = Some(config);
        self
    }

    /// Validate and build the final [`Config`].
    pub fn build(self) -> Result<Config, Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.max_redirects, 3);
        assert_eq!(config.poll_timeout, Duration::from_millis(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let config = ConfigBuilder::new()
            .concurrency(2)
            .max_redirects(7)
            .poll_timeout(Duration::from_millis(5))
            .user_agent("test-agent/1.0")
            .build()
            .unwrap();
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_redirects, 7);
        assert_eq!(config.user_agent, "test-agent/1.0");
    }

    #[test]
    fn rejects_zero_concurrency() {
        assert!(matches!(
            ConfigBuilder::new().concurrency(0).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn rejects_empty_user_agent() {
        assert!(matches!(
            ConfigBuilder::new().user_agent("").build(),
            Err(Error::Config(_))
        ));
    }
}
