//! Environment-based upstream key discovery.
//!
//! At startup, scans `<PROVIDER>_KEY_<N>` (preferred) and
//! `<PROVIDER>_API_KEY_<N>` (fallback) for each provider kind and each `N
//! = 1, 2, 3, ...`, stopping at the first gap. Adding an upstream is
//! adding an environment variable, not editing a config file.

use secrecy::SecretString;
use strum::IntoEnumIterator;

use crate::upstream::{ProviderKind, UpstreamId};

/// One discovered upstream instance: its identity plus the key it was
/// found under.
pub struct DiscoveredUpstream {
    pub id: UpstreamId,
    pub api_key: SecretString,
}

/// Scan the process environment for every `(provider_kind, N)` pair that
/// has a key configured.
#[must_use]
pub fn discover_from_env() -> Vec<DiscoveredUpstream> {
    ProviderKind::iter().flat_map(discover_provider).collect()
}

fn discover_provider(kind: ProviderKind) -> Vec<DiscoveredUpstream> {
    let prefix = kind.to_string().to_uppercase();
    let mut discovered = Vec::new();

    for n in 1.. {
        let preferred_var = format!("{prefix}_KEY_{n}");
        let fallback_var = format!("{prefix}_API_KEY_{n}");

        let preferred = std::env::var(&preferred_var).ok();
        let fallback = std::env::var(&fallback_var).ok();

        let key = match (preferred, fallback) {
            (Some(key), Some(_)) => {
                tracing::warn!(
                    provider = %kind,
                    instance = n,
                    preferred = %preferred_var,
                    fallback = %fallback_var,
                    "both key forms set for the same upstream, preferring the former"
                );
                Some(key)
            }
            (Some(key), None) | (None, Some(key)) => Some(key),
            (None, None) => None,
        };

        let Some(key) = key else {
            break;
        };

        discovered.push(DiscoveredUpstream {
            id: UpstreamId {
                provider_kind: kind,
                instance_id: n.to_string(),
            },
            api_key: SecretString::from(key),
        });
    }

    discovered
}
