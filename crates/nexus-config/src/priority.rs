use std::collections::HashMap;

use serde::Deserialize;

/// Static priority bonuses keyed by provider kind, read as lowercase
/// strings (`"cerebras"`, `"groq"`, `"openrouter"`, `"gemini"`) so this
/// crate does not need to know the engine's `ProviderKind` enum.
///
/// Entries here override the engine's built-in defaults; providers not
/// named keep their default bonus.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct PriorityConfig(HashMap<String, f64>);

impl PriorityConfig {
    #[must_use]
    pub fn overrides(&self) -> &HashMap<String, f64> {
        &self.0
    }
}
