//! Client Configuration
//!
//! Settings for the example programs, loaded from environment variables.
//! There are no CLI flags; every program targets one venue endpoint and
//! env overrides replace the hardcoded values.
//!
//! # Environment Variables
//!
//! - `VENUE_HOST`: gateway host (default: localhost)
//! - `VENUE_PORT`: gateway port (default: 8194)
//! - `VENUE_ORDER_SERVICE`: order-entry service name
//! - `VENUE_HISTORY_SERVICE`: fills-history service name
//! - `VENUE_REQUEST_TIMEOUT_SECS`: one-shot request deadline (default: 30)
//! - `VENUE_USER_UUID`: user scope for lookups (default: 1234)

use std::time::Duration;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that does not parse.
    #[error("invalid value for {var}: `{value}`")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Venue gateway endpoint.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8194,
        }
    }
}

/// Service names requests and subscriptions target.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Order entry, routing, and order/route subscriptions.
    pub order_entry: String,
    /// Fills history lookups.
    pub history: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            order_entry: "//venue/order-entry".to_string(),
            history: "//venue/fills-history".to_string(),
        }
    }
}

/// Full client settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway endpoint.
    pub gateway: GatewaySettings,
    /// Target service names.
    pub services: ServiceSettings,
    /// Deadline for one-shot request flows.
    pub request_timeout: Duration,
    /// User scope for broker-spec and fills lookups.
    pub user_uuid: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gateway: GatewaySettings::default(),
            services: ServiceSettings::default(),
            request_timeout: Duration::from_secs(30),
            user_uuid: 1234,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = std::env::var("VENUE_HOST").unwrap_or(defaults.gateway.host);
        let port = parse_var("VENUE_PORT", defaults.gateway.port)?;
        let order_entry =
            std::env::var("VENUE_ORDER_SERVICE").unwrap_or(defaults.services.order_entry);
        let history = std::env::var("VENUE_HISTORY_SERVICE").unwrap_or(defaults.services.history);
        let timeout_secs = parse_var(
            "VENUE_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        let user_uuid = parse_var("VENUE_USER_UUID", defaults.user_uuid)?;

        Ok(Self {
            gateway: GatewaySettings { host, port },
            services: ServiceSettings {
                order_entry,
                history,
            },
            request_timeout: Duration::from_secs(timeout_secs),
            user_uuid,
        })
    }
}

/// Parse an env var into `T`, using the default when unset.
fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Load a `.env` file from the current directory or any ancestor.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_local_gateway() {
        let settings = Settings::default();
        assert_eq!(settings.gateway.host, "localhost");
        assert_eq!(settings.gateway.port, 8194);
        assert_eq!(settings.services.order_entry, "//venue/order-entry");
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parse_var_falls_back_when_unset() {
        // Uses a name no test environment sets.
        let port: u16 = parse_var("VENUE_TEST_UNSET_PORT_XYZ", 8194).unwrap();
        assert_eq!(port, 8194);
    }
}
