//! Platform-wide settings documents.
//!
//! `SETTINGS#global` holds the money rules, `SETTINGS#global_config` the
//! platform switches. Missing documents read as defaults.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Key, Record};

pub const DEFAULT_COMMISSION_RATE_BPS: u32 = 1500;
pub const DEFAULT_MINIMUM_PAYOUT_CENTS: i64 = 5000;
pub const MAX_BPS: u32 = 10_000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GlobalSettings {
    /// Platform commission in basis points (1500 = 15%).
    pub commission_rate_bps: u32,
    pub minimum_payout_cents: i64,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            commission_rate_bps: DEFAULT_COMMISSION_RATE_BPS,
            minimum_payout_cents: DEFAULT_MINIMUM_PAYOUT_CENTS,
        }
    }
}

impl Record for GlobalSettings {
    const ENTITY: &'static str = "settings";

    fn key(&self) -> Key {
        keys::settings("global")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlatformConfig {
    pub platform_name: String,
    pub support_email: String,
    #[serde(default)]
    pub maintenance_mode: bool,
    #[serde(default = "default_true")]
    pub allow_instructor_applications: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            platform_name: "LearnHub".to_string(),
            support_email: "support@learnhub.example".to_string(),
            maintenance_mode: false,
            allow_instructor_applications: true,
        }
    }
}

impl Record for PlatformConfig {
    const ENTITY: &'static str = "settings";

    fn key(&self) -> Key {
        keys::settings("global_config")
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSettingsRequest {
    pub commission_rate_bps: Option<u32>,
    pub minimum_payout_cents: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdatePlatformConfigRequest {
    pub platform_name: Option<String>,
    pub support_email: Option<String>,
    pub maintenance_mode: Option<bool>,
    pub allow_instructor_applications: Option<bool>,
}

pub async fn global_settings(store: &dyn DocumentStore) -> Result<GlobalSettings, AppError> {
    Ok(store::load(store, &keys::settings("global"))
        .await?
        .unwrap_or_default())
}

pub async fn platform_config(store: &dyn DocumentStore) -> Result<PlatformConfig, AppError> {
    Ok(store::load(store, &keys::settings("global_config"))
        .await?
        .unwrap_or_default())
}

pub async fn update_global_settings(
    store: &dyn DocumentStore,
    req: UpdateSettingsRequest,
) -> Result<GlobalSettings, AppError> {
    let mut settings = global_settings(store).await?;

    if let Some(bps) = req.commission_rate_bps {
        if bps > MAX_BPS {
            return Err(AppError::BadRequest(
                "commission_rate_bps must be between 0 and 10000".to_string(),
            ));
        }
        settings.commission_rate_bps = bps;
    }
    if let Some(minimum) = req.minimum_payout_cents {
        if minimum < 0 {
            return Err(AppError::BadRequest(
                "minimum_payout_cents cannot be negative".to_string(),
            ));
        }
        settings.minimum_payout_cents = minimum;
    }

    store::save(store, &settings).await?;
    tracing::info!(
        "Global settings updated: commission {} bps, minimum payout {}",
        settings.commission_rate_bps,
        settings.minimum_payout_cents
    );
    Ok(settings)
}

pub async fn update_platform_config(
    store: &dyn DocumentStore,
    req: UpdatePlatformConfigRequest,
) -> Result<PlatformConfig, AppError> {
    let mut config = platform_config(store).await?;

    if let Some(name) = req.platform_name {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("platform_name cannot be empty".to_string()));
        }
        config.platform_name = name;
    }
    if let Some(email) = req.support_email {
        config.support_email = email;
    }
    if let Some(flag) = req.maintenance_mode {
        config.maintenance_mode = flag;
    }
    if let Some(flag) = req.allow_instructor_applications {
        config.allow_instructor_applications = flag;
    }

    store::save(store, &config).await?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn missing_documents_read_as_defaults() {
        let store = MemoryStore::new();
        assert_eq!(global_settings(&store).await.unwrap(), GlobalSettings::default());
        assert!(platform_config(&store).await.unwrap().allow_instructor_applications);
    }

    #[tokio::test]
    async fn commission_above_full_rate_is_rejected() {
        let store = MemoryStore::new();
        let result = update_global_settings(
            &store,
            UpdateSettingsRequest {
                commission_rate_bps: Some(10_001),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let store = MemoryStore::new();
        update_global_settings(
            &store,
            UpdateSettingsRequest {
                commission_rate_bps: Some(2000),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let settings = global_settings(&store).await.unwrap();
        assert_eq!(settings.commission_rate_bps, 2000);
        assert_eq!(settings.minimum_payout_cents, DEFAULT_MINIMUM_PAYOUT_CENTS);
    }
}
