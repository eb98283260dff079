use std::env;

pub const DEFAULT_TABLE_NAME: &str = "learnhub";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Dynamo,
    Memory,
}

/// Environment-driven settings, read once at cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub store_backend: StoreBackend,
    /// Enables the payment gateway stub when present.
    pub payment_secret_key: Option<String>,
    pub ws_api_endpoint: Option<String>,
    pub cognito_user_pool_id: Option<String>,
    pub currency: String,
    /// Trust `X-User-Id` when no authorizer claim is present. Local runs only.
    pub allow_user_id_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            store_backend: StoreBackend::Dynamo,
            payment_secret_key: None,
            ws_api_endpoint: None,
            cognito_user_pool_id: None,
            currency: "EUR".to_string(),
            allow_user_id_header: false,
        }
    }
}

impl Config {
    /// In-memory store with the identity header trusted.
    pub fn local() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            allow_user_id_header: true,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let store_backend = match non_empty("STORE_BACKEND").as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("dynamo") | None => StoreBackend::Dynamo,
            Some(other) => {
                tracing::warn!("Unknown STORE_BACKEND {:?}, using dynamo", other);
                StoreBackend::Dynamo
            }
        };

        Self {
            table_name: non_empty("TABLE_NAME").unwrap_or(defaults.table_name),
            store_backend,
            payment_secret_key: non_empty("PAYMENT_SECRET_KEY"),
            ws_api_endpoint: non_empty("WS_API_ENDPOINT"),
            cognito_user_pool_id: non_empty("COGNITO_USER_POOL_ID"),
            currency: non_empty("CURRENCY").unwrap_or(defaults.currency),
            allow_user_id_header: store_backend == StoreBackend::Memory
                || matches!(non_empty("ALLOW_USER_ID_HEADER").as_deref(), Some("true" | "1")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.table_name, DEFAULT_TABLE_NAME);
        assert_eq!(config.store_backend, StoreBackend::Dynamo);
        assert!(config.payment_secret_key.is_none());
        assert!(!config.allow_user_id_header);
    }

    #[test]
    fn identity_header_needs_memory_backend_or_flag() {
        let vars = HashMap::from([("ALLOW_USER_ID_HEADER", "true")]);
        let flagged = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(flagged.store_backend, StoreBackend::Dynamo);
        assert!(flagged.allow_user_id_header);

        let vars = HashMap::from([("ALLOW_USER_ID_HEADER", "no")]);
        let unflagged = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(!unflagged.allow_user_id_header);
    }

    #[test]
    fn blank_secret_counts_as_unset() {
        let vars = HashMap::from([
            ("PAYMENT_SECRET_KEY", "  "),
            ("STORE_BACKEND", "memory"),
            ("TABLE_NAME", "learnhub-dev"),
        ]);
        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));
        assert!(config.payment_secret_key.is_none());
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.table_name, "learnhub-dev");
        assert!(config.allow_user_id_header);
    }
}
