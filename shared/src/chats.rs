use serde_json::json;

use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Filter, Record, WriteOp};
use crate::types::{new_id, now_rfc3339, Chat, ChatMessage, User};

/// Longest preview kept in `last_message`.
const PREVIEW_CHARS: usize = 120;

/// Chat id for a pair of users: the sorted ids joined by `_`.
pub fn chat_id_for(a: &str, b: &str) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

/// Get or create the direct chat between the caller and another user.
pub async fn open_chat(
    store: &dyn DocumentStore,
    caller: &User,
    with_user_id: &str,
) -> Result<Chat, AppError> {
    if caller.user_id == with_user_id {
        return Err(AppError::BadRequest("Cannot open a chat with yourself".to_string()));
    }
    if store.get(&keys::user(with_user_id)).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let mut participants = vec![caller.user_id.clone(), with_user_id.to_string()];
    participants.sort();
    let now = now_rfc3339();
    let chat = Chat {
        chat_id: chat_id_for(&caller.user_id, with_user_id),
        participants,
        last_message: None,
        created_at: now.clone(),
        updated_at: now,
    };

    if store.put_if_absent(&chat.key(), store::encode(&chat)?).await? {
        tracing::info!("Chat {} opened", chat.chat_id);
        return Ok(chat);
    }
    store::load(store, &chat.key())
        .await?
        .ok_or_else(|| AppError::not_found("Chat"))
}

/// Load a chat the caller takes part in.
pub async fn get_chat(store: &dyn DocumentStore, caller: &User, chat_id: &str) -> Result<Chat, AppError> {
    let chat: Chat = store::load(store, &keys::chat(chat_id))
        .await?
        .ok_or_else(|| AppError::not_found("Chat"))?;
    if !chat.participants.contains(&caller.user_id) {
        return Err(AppError::Forbidden("Not a participant of this chat".to_string()));
    }
    Ok(chat)
}

pub async fn send_message(
    store: &dyn DocumentStore,
    caller: &User,
    chat_id: &str,
    body: &str,
) -> Result<ChatMessage, AppError> {
    let chat = get_chat(store, caller, chat_id).await?;
    post_message(store, &chat, &caller.user_id, body, &now_rfc3339()).await
}

pub(crate) async fn post_message(
    store: &dyn DocumentStore,
    chat: &Chat,
    sender_id: &str,
    body: &str,
    created_at: &str,
) -> Result<ChatMessage, AppError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Message body is required".to_string()));
    }

    let message = ChatMessage {
        message_id: new_id(),
        chat_id: chat.chat_id.clone(),
        participants: chat.participants.clone(),
        sender_id: sender_id.to_string(),
        body: body.to_string(),
        created_at: created_at.to_string(),
    };
    let preview: String = body.chars().take(PREVIEW_CHARS).collect();

    store
        .transact(vec![
            store::put_op(&message)?,
            WriteOp::Update {
                key: chat.key(),
                fields: store::fields([
                    ("last_message", json!(preview)),
                    ("updated_at", json!(created_at)),
                ]),
            },
        ])
        .await?;
    Ok(message)
}

pub async fn list_messages(
    store: &dyn DocumentStore,
    caller: &User,
    chat_id: &str,
) -> Result<Vec<ChatMessage>, AppError> {
    get_chat(store, caller, chat_id).await?;
    Ok(store::query_as(store, &keys::chat_pk(chat_id), keys::MESSAGE_PREFIX).await?)
}

/// The user's chats, most recently active first.
pub async fn list_user_chats(store: &dyn DocumentStore, user_id: &str) -> Result<Vec<Chat>, AppError> {
    let mut chats: Vec<Chat> =
        store::scan_as(store, &[Filter::contains("participants", user_id)]).await?;
    chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(chats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tests::user;
    use crate::store::MemoryStore;
    use crate::types::Role;

    async fn with_users(store: &MemoryStore, ids: &[&str]) {
        for id in ids {
            store::save(store, &user(id, Role::Student, false)).await.unwrap();
        }
    }

    #[test]
    fn chat_id_ignores_argument_order() {
        assert_eq!(chat_id_for("bob", "alice"), "alice_bob");
        assert_eq!(chat_id_for("alice", "bob"), "alice_bob");
    }

    #[tokio::test]
    async fn opening_twice_returns_the_same_chat() {
        let store = MemoryStore::new();
        with_users(&store, &["alice", "bob"]).await;
        let alice = user("alice", Role::Student, false);
        let bob = user("bob", Role::Student, false);

        let first = open_chat(&store, &alice, "bob").await.unwrap();
        post_message(&store, &first, "alice", "hi", "2999-01-01T00:00:00.000000Z")
            .await
            .unwrap();
        let second = open_chat(&store, &bob, "alice").await.unwrap();
        assert_eq!(second.chat_id, first.chat_id);
        assert_eq!(second.last_message.as_deref(), Some("hi"));
    }

    #[tokio::test]
    async fn messages_list_in_order_for_participants_only() {
        let store = MemoryStore::new();
        with_users(&store, &["alice", "bob", "eve"]).await;
        let alice = user("alice", Role::Student, false);
        let eve = user("eve", Role::Student, false);
        let chat = open_chat(&store, &alice, "bob").await.unwrap();

        post_message(&store, &chat, "bob", "second", "2999-01-01T00:00:02.000000Z")
            .await
            .unwrap();
        post_message(&store, &chat, "alice", "first", "2999-01-01T00:00:01.000000Z")
            .await
            .unwrap();

        let messages = list_messages(&store, &alice, &chat.chat_id).await.unwrap();
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);

        assert!(matches!(
            send_message(&store, &eve, &chat.chat_id, "let me in").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn user_chats_sorted_by_activity() {
        let store = MemoryStore::new();
        with_users(&store, &["alice", "bob", "carol"]).await;
        let alice = user("alice", Role::Student, false);
        let with_bob = open_chat(&store, &alice, "bob").await.unwrap();
        let with_carol = open_chat(&store, &alice, "carol").await.unwrap();
        post_message(&store, &with_bob, "bob", "ping", "2999-01-01T00:00:00.000000Z")
            .await
            .unwrap();

        let chats = list_user_chats(&store, "alice").await.unwrap();
        let ids: Vec<&str> = chats.iter().map(|c| c.chat_id.as_str()).collect();
        assert_eq!(ids, vec![with_bob.chat_id.as_str(), with_carol.chat_id.as_str()]);
        assert_eq!(list_user_chats(&store, "carol").await.unwrap().len(), 1);
    }
}
