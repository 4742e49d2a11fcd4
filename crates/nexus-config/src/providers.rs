use serde::Deserialize;
use url::Url;

/// A base URL override for one provider kind, for self-hosted or
/// regional endpoints. Matched against the engine's `ProviderKind` by
/// its lowercase name.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderOverride {
    pub provider_kind: String,
    pub base_url: Option<Url>,
}
