use serde::Serialize;
use serde_json::json;

use crate::auth::{ensure_owner_or_admin, is_admin};
use crate::error::AppError;
use crate::store::{self, keys, DocumentStore, Filter, Record, WriteOp};
use crate::types::{
    new_id, now_rfc3339, CreateTicketRequest, SupportTicket, TicketCategory, TicketMessage,
    TicketStatus, User,
};

/// Sender id of messages the platform writes itself.
pub const SYSTEM_SENDER: &str = "system";

#[derive(Debug, Serialize)]
pub struct TicketThread {
    pub ticket: SupportTicket,
    pub messages: Vec<TicketMessage>,
}

pub(crate) fn message_for(
    ticket: &SupportTicket,
    sender_id: &str,
    body: &str,
    created_at: &str,
) -> TicketMessage {
    TicketMessage {
        message_id: new_id(),
        ticket_id: ticket.ticket_id.clone(),
        ticket_owner_id: ticket.user_id.clone(),
        sender_id: sender_id.to_string(),
        body: body.to_string(),
        created_at: created_at.to_string(),
    }
}

pub async fn open_ticket(
    store: &dyn DocumentStore,
    caller: &User,
    req: CreateTicketRequest,
) -> Result<SupportTicket, AppError> {
    if req.subject.trim().is_empty() || req.message.trim().is_empty() {
        return Err(AppError::BadRequest("subject and message are required".to_string()));
    }
    if req.category == TicketCategory::Refund && req.course_id.is_none() {
        return Err(AppError::BadRequest(
            "Refund requests must name a course".to_string(),
        ));
    }

    let now = now_rfc3339();
    let ticket = SupportTicket {
        ticket_id: new_id(),
        user_id: caller.user_id.clone(),
        subject: req.subject,
        category: req.category,
        course_id: req.course_id,
        status: TicketStatus::Open,
        created_at: now.clone(),
        updated_at: now.clone(),
    };
    let first = message_for(&ticket, &caller.user_id, &req.message, &now);

    store.transact(vec![store::put_op(&ticket)?, store::put_op(&first)?]).await?;
    tracing::info!("Ticket {} opened by {}", ticket.ticket_id, caller.user_id);
    Ok(ticket)
}

pub async fn get_ticket(store: &dyn DocumentStore, ticket_id: &str) -> Result<SupportTicket, AppError> {
    store::load(store, &keys::ticket(ticket_id))
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))
}

async fn load_visible(
    store: &dyn DocumentStore,
    caller: &User,
    ticket_id: &str,
) -> Result<SupportTicket, AppError> {
    let ticket = get_ticket(store, ticket_id).await?;
    ensure_owner_or_admin(caller, &ticket.user_id)?;
    Ok(ticket)
}

pub async fn list_user_tickets(
    store: &dyn DocumentStore,
    user_id: &str,
) -> Result<Vec<SupportTicket>, AppError> {
    let mut tickets: Vec<SupportTicket> =
        store::scan_as(store, &[Filter::eq("user_id", user_id)]).await?;
    tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(tickets)
}

pub async fn list_all_tickets(
    store: &dyn DocumentStore,
    status: Option<TicketStatus>,
) -> Result<Vec<SupportTicket>, AppError> {
    let filters: Vec<Filter> = status
        .map(|s| vec![Filter::eq("status", s.as_str())])
        .unwrap_or_default();
    let mut tickets: Vec<SupportTicket> = store::scan_as(store, &filters).await?;
    tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(tickets)
}

pub async fn get_ticket_thread(
    store: &dyn DocumentStore,
    caller: &User,
    ticket_id: &str,
) -> Result<TicketThread, AppError> {
    let ticket = load_visible(store, caller, ticket_id).await?;
    let messages =
        store::query_as(store, &keys::ticket_pk(ticket_id), keys::MESSAGE_PREFIX).await?;
    Ok(TicketThread { ticket, messages })
}

/// Add a message from the owner or an admin. Closed tickets take no more
/// messages; the first admin reply moves an open ticket to in progress.
pub async fn reply(
    store: &dyn DocumentStore,
    caller: &User,
    ticket_id: &str,
    body: &str,
) -> Result<TicketMessage, AppError> {
    let ticket = load_visible(store, caller, ticket_id).await?;
    append_message(store, &ticket, caller, body, &now_rfc3339()).await
}

pub(crate) async fn append_message(
    store: &dyn DocumentStore,
    ticket: &SupportTicket,
    sender: &User,
    body: &str,
    created_at: &str,
) -> Result<TicketMessage, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Message body is required".to_string()));
    }
    if ticket.status == TicketStatus::Closed {
        return Err(AppError::Conflict("Ticket is closed".to_string()));
    }

    let message = message_for(ticket, &sender.user_id, body, created_at);
    let mut patch = store::fields([("updated_at", json!(created_at))]);
    if is_admin(sender) && ticket.status == TicketStatus::Open {
        patch.insert("status".to_string(), json!(TicketStatus::InProgress));
    }

    store
        .transact(vec![
            store::put_op(&message)?,
            WriteOp::Update {
                key: ticket.key(),
                fields: patch,
            },
        ])
        .await?;
    Ok(message)
}

pub async fn set_status(
    store: &dyn DocumentStore,
    ticket_id: &str,
    status: TicketStatus,
) -> Result<SupportTicket, AppError> {
    let doc = store
        .update(
            &keys::ticket(ticket_id),
            store::fields([
                ("status", json!(status)),
                ("updated_at", json!(now_rfc3339())),
            ]),
        )
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))?;
    tracing::info!("Ticket {} set to {}", ticket_id, status.as_str());
    Ok(store::decode(doc)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::tests::user;
    use crate::store::MemoryStore;
    use crate::types::Role;

    pub(crate) fn request(category: TicketCategory, course_id: Option<&str>) -> CreateTicketRequest {
        CreateTicketRequest {
            subject: "Help".to_string(),
            category,
            course_id: course_id.map(str::to_string),
            message: "Something went wrong".to_string(),
        }
    }

    #[tokio::test]
    async fn opening_a_ticket_stores_first_message() {
        let store = MemoryStore::new();
        let student = user("s1", Role::Student, false);
        let ticket = open_ticket(&store, &student, request(TicketCategory::General, None))
            .await
            .unwrap();

        let thread = get_ticket_thread(&store, &student, &ticket.ticket_id).await.unwrap();
        assert_eq!(thread.ticket.status, TicketStatus::Open);
        assert_eq!(thread.messages.len(), 1);
        assert_eq!(thread.messages[0].ticket_owner_id, "s1");
    }

    #[tokio::test]
    async fn refund_tickets_need_a_course() {
        let store = MemoryStore::new();
        let student = user("s1", Role::Student, false);
        let result = open_ticket(&store, &student, request(TicketCategory::Refund, None)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn messages_are_ordered_and_admin_reply_starts_work() {
        let store = MemoryStore::new();
        let student = user("s1", Role::Student, false);
        let admin = user("a1", Role::Admin, false);
        let ticket = open_ticket(&store, &student, request(TicketCategory::Technical, None))
            .await
            .unwrap();

        append_message(&store, &ticket, &admin, "second", "2999-01-01T00:00:02.000000Z")
            .await
            .unwrap();
        let ticket = get_ticket(&store, &ticket.ticket_id).await.unwrap();
        append_message(&store, &ticket, &student, "third", "2999-01-01T00:00:03.000000Z")
            .await
            .unwrap();

        let thread = get_ticket_thread(&store, &admin, &ticket.ticket_id).await.unwrap();
        let bodies: Vec<&str> = thread.messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["Something went wrong", "second", "third"]);
        assert_eq!(thread.ticket.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn closed_ticket_rejects_messages() {
        let store = MemoryStore::new();
        let student = user("s1", Role::Student, false);
        let ticket = open_ticket(&store, &student, request(TicketCategory::Billing, None))
            .await
            .unwrap();
        set_status(&store, &ticket.ticket_id, TicketStatus::Closed).await.unwrap();

        let result = reply(&store, &student, &ticket.ticket_id, "hello?").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn strangers_cannot_read_tickets() {
        let store = MemoryStore::new();
        let student = user("s1", Role::Student, false);
        let other = user("s2", Role::Student, false);
        let ticket = open_ticket(&store, &student, request(TicketCategory::General, None))
            .await
            .unwrap();
        assert!(matches!(
            get_ticket_thread(&store, &other, &ticket.ticket_id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(list_user_tickets(&store, "s2").await.unwrap().len(), 0);
    }
}
