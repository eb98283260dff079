use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{self, keys, DocumentStore, Filter, Key, Record, StoreError};
use crate::types::{now_rfc3339, Role};

/// WebSocket connection stored in DynamoDB
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Connection {
    pub connection_id: String,
    pub user_id: String,
    pub role: Role,
    pub connected_at: String,
}

impl Record for Connection {
    const ENTITY: &'static str = "connection";

    fn key(&self) -> Key {
        keys::connection(&self.connection_id)
    }
}

pub async fn save_connection(
    store: &dyn DocumentStore,
    connection_id: &str,
    user_id: &str,
    role: Role,
) -> Result<Connection, StoreError> {
    let connection = Connection {
        connection_id: connection_id.to_string(),
        user_id: user_id.to_string(),
        role,
        connected_at: now_rfc3339(),
    };
    store::save(store, &connection).await?;
    tracing::info!("Connection saved: {} (user: {})", connection_id, user_id);
    Ok(connection)
}

pub async fn get_connection(
    store: &dyn DocumentStore,
    connection_id: &str,
) -> Result<Option<Connection>, StoreError> {
    store::load(store, &keys::connection(connection_id)).await
}

pub async fn remove_connection(store: &dyn DocumentStore, connection_id: &str) -> Result<(), StoreError> {
    store.delete(&keys::connection(connection_id)).await?;
    tracing::info!("Connection removed: {}", connection_id);
    Ok(())
}

pub async fn all_connections(store: &dyn DocumentStore) -> Result<Vec<Connection>, StoreError> {
    store::scan_as(store, &[]).await
}

pub async fn connections_for_users(
    store: &dyn DocumentStore,
    user_ids: &[String],
) -> Result<Vec<Connection>, StoreError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Value> = user_ids.iter().cloned().map(Value::String).collect();
    store::scan_as(store, &[Filter::one_of("user_id", ids)]).await
}

pub async fn admin_connections(store: &dyn DocumentStore) -> Result<Vec<Connection>, StoreError> {
    store::scan_as(store, &[Filter::eq("role", Role::Admin.as_str())]).await
}
