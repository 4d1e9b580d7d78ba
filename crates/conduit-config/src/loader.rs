use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, placeholder expansion
    /// fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if placeholder expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(
            server = %config.server.url,
            context_tokens = config.limits.max_context_tokens,
            output_tokens = config.limits.max_output_tokens,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistent setting
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server()?;
        self.validate_limits()?;
        self.validate_sampling()?;
        self.validate_retry()?;
        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        if !matches!(self.server.url.scheme(), "http" | "https") {
            anyhow::bail!("server.url must use http or https, got '{}'", self.server.url.scheme());
        }

        if self.server.request_timeout_ms == 0 {
            anyhow::bail!("server.request_timeout_ms must be greater than 0");
        }

        Ok(())
    }

    fn validate_limits(&self) -> anyhow::Result<()> {
        let limits = &self.limits;

        if limits.max_context_tokens == 0 {
            anyhow::bail!("limits.max_context_tokens must be greater than 0");
        }

        if limits.max_output_tokens == 0 {
            anyhow::bail!("limits.max_output_tokens must be greater than 0");
        }

        if limits.max_output_tokens >= limits.max_context_tokens {
            anyhow::bail!(
                "limits.max_output_tokens ({}) must be smaller than limits.max_context_tokens ({})",
                limits.max_output_tokens,
                limits.max_context_tokens
            );
        }

        Ok(())
    }

    fn validate_sampling(&self) -> anyhow::Result<()> {
        let sampling = &self.sampling;

        if !(0.0..=2.0).contains(&sampling.temperature) {
            anyhow::bail!("sampling.temperature must be within 0.0..=2.0");
        }

        if !(0.0..=1.0).contains(&sampling.top_p) {
            anyhow::bail!("sampling.top_p must be within 0.0..=1.0");
        }

        for (name, value) in [
            ("frequency_penalty", sampling.frequency_penalty),
            ("presence_penalty", sampling.presence_penalty),
        ] {
            if !(-2.0..=2.0).contains(&value) {
                anyhow::bail!("sampling.{name} must be within -2.0..=2.0");
            }
        }

        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }

        Ok(())
    }
}
