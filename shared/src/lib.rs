pub mod types;
pub mod config;
pub mod error;
pub mod response;
pub mod store;
pub mod auth;
pub mod users;
pub mod settings;
pub mod courses;
pub mod curriculum;
pub mod enrollments;
pub mod payments;
pub mod revenue;
pub mod payouts;
pub mod refunds;
pub mod reviews;
pub mod tickets;
pub mod chats;
pub mod dashboard;
pub mod sockets;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use std::sync::Arc;

use config::Config;
use store::{DocumentStore, MemoryStore};

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    /// Only needed for admin user deletion.
    pub cognito_client: Option<CognitoClient>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn DocumentStore>,
        cognito_client: Option<CognitoClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            cognito_client,
        })
    }

    /// State backed by an empty in-memory store and no AWS clients.
    pub fn in_memory(config: Config) -> Arc<Self> {
        Self::new(config, Arc::new(MemoryStore::new()), None)
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }
}
