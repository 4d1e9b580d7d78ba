//! Programmatic configuration builder for integration tests

use conduit_config::Config;
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Point at a mock server with short retry delays
    pub fn new(base_url: &str) -> Self {
        let mut config = Config::default();
        config.server.url = base_url.parse().expect("valid URL");
        config.server.request_timeout_ms = 5_000;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 5;

        Self { config }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.config.server.api_key = Some(SecretString::from(key));
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry_delays(mut self, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.config.retry.base_delay_ms = base_delay_ms;
        self.config.retry.max_delay_ms = max_delay_ms;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.server.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_limits(mut self, max_context_tokens: u32, max_output_tokens: u32) -> Self {
        self.config.limits.max_context_tokens = max_context_tokens;
        self.config.limits.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_parallel_tools(mut self) -> Self {
        self.config.tools.parallel = true;
        self
    }

    pub fn without_tools(mut self) -> Self {
        self.config.tools.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
