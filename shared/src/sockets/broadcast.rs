use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;

use super::audience::Audience;
use super::connections::{self, Connection};
use super::messages::BroadcastMessage;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The client disconnected without a `$disconnect` reaching us.
    #[error("connection is gone")]
    Gone,
    #[error("{0}")]
    Failed(String),
}

/// Delivers payloads to WebSocket connections.
#[async_trait]
pub trait ConnectionSender: Send + Sync {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), SendError>;
}

#[async_trait]
impl ConnectionSender for ApiGatewayManagementClient {
    async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), SendError> {
        self.post_to_connection()
            .connection_id(connection_id)
            .data(payload.to_vec().into())
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_gone_exception())
                {
                    SendError::Gone
                } else {
                    SendError::Failed(err.to_string())
                }
            })
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
    pub removed: usize,
}

pub async fn resolve_connections(
    store: &dyn DocumentStore,
    audience: &Audience,
) -> Result<Vec<Connection>, StoreError> {
    let mut found = match audience {
        Audience::Nobody => return Ok(Vec::new()),
        Audience::Everyone => connections::all_connections(store).await?,
        Audience::Users(user_ids) => connections::connections_for_users(store, user_ids).await?,
        Audience::UsersAndAdmins(user_ids) => {
            let mut found = connections::connections_for_users(store, user_ids).await?;
            found.extend(connections::admin_connections(store).await?);
            found
        }
    };
    found.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
    found.dedup_by(|a, b| a.connection_id == b.connection_id);
    Ok(found)
}

/// Send `message` to every connection of the audience. Connections the
/// gateway reports as gone are deleted.
pub async fn broadcast(
    store: &dyn DocumentStore,
    sender: &dyn ConnectionSender,
    audience: &Audience,
    message: &BroadcastMessage,
) -> Result<BroadcastReport, StoreError> {
    let targets = resolve_connections(store, audience).await?;
    let payload = serde_json::to_vec(message)?;
    let mut report = BroadcastReport::default();

    tracing::info!("Broadcasting {} to {} connections", message.r#type, targets.len());

    for conn in targets {
        match sender.send(&conn.connection_id, &payload).await {
            Ok(()) => report.delivered += 1,
            Err(SendError::Gone) => {
                tracing::info!("Connection {} is gone, removing", conn.connection_id);
                connections::remove_connection(store, &conn.connection_id).await?;
                report.removed += 1;
            }
            Err(SendError::Failed(e)) => {
                tracing::warn!("Failed to send to connection {}: {}", conn.connection_id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::sockets::connections::save_connection;
    use crate::store::MemoryStore;
    use crate::types::Role;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records deliveries; connection ids listed in `gone` fail with `Gone`.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub gone: Vec<String>,
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ConnectionSender for RecordingSender {
        async fn send(&self, connection_id: &str, payload: &[u8]) -> Result<(), SendError> {
            if self.gone.iter().any(|g| g == connection_id) {
                return Err(SendError::Gone);
            }
            self.sent.lock().unwrap().push((
                connection_id.to_string(),
                String::from_utf8_lossy(payload).into_owned(),
            ));
            Ok(())
        }
    }

    #[tokio::test]
    async fn stale_connections_are_removed() {
        let store = MemoryStore::new();
        save_connection(&store, "live", "alice", Role::Student).await.unwrap();
        save_connection(&store, "stale", "alice", Role::Student).await.unwrap();
        save_connection(&store, "other", "bob", Role::Student).await.unwrap();
        let sender = RecordingSender {
            gone: vec!["stale".to_string()],
            ..Default::default()
        };

        let report = broadcast(
            &store,
            &sender,
            &Audience::Users(vec!["alice".to_string()]),
            &BroadcastMessage::new("enrollment_updated", json!({"progress": 50})),
        )
        .await
        .unwrap();

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0, removed: 1 });
        assert!(connections::get_connection(&store, "stale").await.unwrap().is_none());
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent[0].0, "live");
        assert!(sent[0].1.contains("enrollment_updated"));
    }

    #[tokio::test]
    async fn admins_included_once() {
        let store = MemoryStore::new();
        save_connection(&store, "c-owner", "s1", Role::Student).await.unwrap();
        save_connection(&store, "c-admin", "root", Role::Admin).await.unwrap();

        let targets = resolve_connections(
            &store,
            &Audience::UsersAndAdmins(vec!["s1".to_string(), "root".to_string()]),
        )
        .await
        .unwrap();
        let ids: Vec<&str> = targets.iter().map(|c| c.connection_id.as_str()).collect();
        assert_eq!(ids, vec!["c-admin", "c-owner"]);
    }
}
