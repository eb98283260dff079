use lambda_http::{request::RequestContext, Body, Error, Request, RequestExt, Response};
use std::sync::Arc;

use super::connections::{get_connection, remove_connection, save_connection};
use super::messages::{ChatMessagePayload, TicketReplyPayload, WebSocketAction, WebSocketMessage};
use crate::error::AppError;
use crate::{auth, chats, response, tickets, AppState};

fn header<'a>(event: &'a Request, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .find_map(|name| event.headers().get(*name))
        .and_then(|v| v.to_str().ok())
}

/// Route key and connection id from the WebSocket request context, falling
/// back to headers.
fn route_and_connection(event: &Request) -> (Option<String>, Option<String>) {
    let (mut route_key, mut connection_id) = (None, None);
    if let Some(RequestContext::WebSocket(ctx)) = event.request_context_ref() {
        route_key = ctx.route_key.clone();
        connection_id = ctx.connection_id.clone();
    }
    let route_key = route_key.or_else(|| header(event, &["routekey", "routeKey"]).map(str::to_string));
    let connection_id =
        connection_id.or_else(|| header(event, &["connectionid", "connectionId"]).map(str::to_string));
    (route_key, connection_id)
}

/// Handle WebSocket events ($connect, $disconnect, $default)
pub async fn handle_websocket_event(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let (route_key, connection_id) = route_and_connection(&event);
    let Some(connection_id) = connection_id else {
        return Ok(AppError::BadRequest("Missing connection id".to_string()).into_response());
    };
    let route_key = route_key.unwrap_or_else(|| "$default".to_string());

    tracing::info!("WebSocket event: {} for connection: {}", route_key, connection_id);

    let result = match route_key.as_str() {
        "$connect" => handle_connect(&event, &state, &connection_id).await,
        "$disconnect" => handle_disconnect(&state, &connection_id).await,
        "$default" => handle_message(&event, &state, &connection_id).await,
        other => Err(AppError::BadRequest(format!("Unknown WebSocket route: {}", other))),
    };

    Ok(result.unwrap_or_else(AppError::into_response))
}

async fn handle_connect(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, AppError> {
    let user_id = auth::require_caller_id(event, &state.config)?;
    let user = auth::load_caller(state.store(), &user_id).await?;

    tracing::info!("WebSocket connect: {} (user: {})", connection_id, user_id);
    save_connection(state.store(), connection_id, &user_id, user.role).await?;
    Ok(response::no_content())
}

async fn handle_disconnect(state: &AppState, connection_id: &str) -> Result<Response<Body>, AppError> {
    tracing::info!("WebSocket disconnect: {}", connection_id);
    remove_connection(state.store(), connection_id).await?;
    Ok(response::no_content())
}

/// Messages are attributed to the user stored with the connection.
async fn handle_message(
    event: &Request,
    state: &AppState,
    connection_id: &str,
) -> Result<Response<Body>, AppError> {
    let message: WebSocketMessage = serde_json::from_slice(event.body())?;
    tracing::info!("WebSocket message action: {}", message.action);

    let connection = get_connection(state.store(), connection_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let user = auth::load_caller(state.store(), &connection.user_id).await?;

    match WebSocketAction::parse(&message.action) {
        Some(WebSocketAction::SendChatMessage) => {
            let payload: ChatMessagePayload = serde_json::from_value(message.data)?;
            let sent = chats::send_message(state.store(), &user, &payload.chat_id, &payload.body).await?;
            response::created(&sent)
        }
        Some(WebSocketAction::ReplyTicket) => {
            let payload: TicketReplyPayload = serde_json::from_value(message.data)?;
            let sent = tickets::reply(state.store(), &user, &payload.ticket_id, &payload.body).await?;
            response::created(&sent)
        }
        Some(WebSocketAction::Ping) => response::ok(&serde_json::json!({"type": "pong"})),
        None => Err(AppError::BadRequest(format!("Unknown action: {}", message.action))),
    }
}
