use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let expanded =
            crate::env::expand_env(&raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent.
    ///
    /// # Errors
    ///
    /// Returns an error if the breaker or failover tuning is nonsensical,
    /// or a provider override names an unknown provider kind.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_breaker()?;
        self.validate_failover()?;
        self.validate_providers()?;
        self.validate_priority()?;
        Ok(())
    }

    fn validate_breaker(&self) -> anyhow::Result<()> {
        if self.breaker.failure_threshold == 0 {
            anyhow::bail!("breaker.failure_threshold must be greater than 0");
        }
        if self.breaker.half_open_max_attempts == 0 {
            anyhow::bail!("breaker.half_open_max_attempts must be greater than 0");
        }
        Ok(())
    }

    fn validate_failover(&self) -> anyhow::Result<()> {
        if self.failover.first_token_timeout_ms == 0 {
            anyhow::bail!("failover.first_token_timeout_ms must be greater than 0");
        }
        if self.failover.backoff_multiplier == 0 {
            anyhow::bail!("failover.backoff_multiplier must be greater than 0");
        }
        if self.failover.backoff_max_ms < self.failover.backoff_initial_ms {
            anyhow::bail!("failover.backoff_max_ms must be at least backoff_initial_ms");
        }
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        for provider in &self.providers {
            if !KNOWN_PROVIDER_KINDS.contains(&provider.provider_kind.as_str()) {
                anyhow::bail!(
                    "providers entry names unknown provider_kind '{}' (expected one of {KNOWN_PROVIDER_KINDS:?})",
                    provider.provider_kind
                );
            }
        }
        Ok(())
    }

    fn validate_priority(&self) -> anyhow::Result<()> {
        for kind in self.priority.overrides().keys() {
            if !KNOWN_PROVIDER_KINDS.contains(&kind.as_str()) {
                anyhow::bail!(
                    "priority entry names unknown provider_kind '{kind}' (expected one of {KNOWN_PROVIDER_KINDS:?})"
                );
            }
        }
        Ok(())
    }
}

const KNOWN_PROVIDER_KINDS: &[&str] = &["groq", "gemini", "openrouter", "cerebras"];
