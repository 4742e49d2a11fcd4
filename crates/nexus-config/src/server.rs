use std::net::SocketAddr;

use secrecy::SecretString;
use serde::Deserialize;

use crate::{cors::CorsConfig, health::HealthConfig};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub listen_address: Option<SocketAddr>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub cors: Option<CorsConfig>,
    /// Bearer token required on every gateway request, via
    /// `Authorization: Bearer <master_key>`. Requests are rejected with
    /// 401 when this is set and absent or mismatched.
    #[serde(default)]
    pub master_key: Option<SecretString>,
}
