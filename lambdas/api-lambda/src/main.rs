use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{request::RequestContext, run, service_fn, tracing, Error, Request, RequestExt};
use learnhub_shared::config::{Config, StoreBackend};
use learnhub_shared::store::{DocumentStore, DynamoStore, MemoryStore};
use learnhub_shared::AppState;
use std::sync::Arc;

mod http_handler;

/// WebSocket events carry a WebSocket request context; local tools send the
/// route key as a header instead.
fn is_websocket(event: &Request) -> bool {
    matches!(event.request_context_ref(), Some(RequestContext::WebSocket(_)))
        || event.headers().contains_key("routekey")
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    let config = Config::from_env();
    if config.allow_user_id_header {
        tracing::warn!("Trusting the X-User-Id header for requests without an authorizer claim");
    }
    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;

    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Dynamo => Arc::new(DynamoStore::new(
            DynamoClient::new(&aws_config),
            config.table_name.clone(),
        )),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost when the instance stops");
            Arc::new(MemoryStore::new())
        }
    };

    let cognito_client = config
        .cognito_user_pool_id
        .as_ref()
        .map(|_| CognitoClient::new(&aws_config));

    tracing::info!(
        "Starting API lambda (table: {}, backend: {:?})",
        config.table_name,
        config.store_backend
    );
    let state = AppState::new(config, store, cognito_client);

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move {
            if is_websocket(&event) {
                learnhub_shared::sockets::handle_websocket_event(event, state).await
            } else {
                http_handler::function_handler(event, state).await
            }
        }
    }))
    .await
}
