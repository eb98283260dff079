use aws_lambda_events::event::dynamodb::{Event, EventRecord};
use aws_sdk_apigatewaymanagement::Client as ApiGatewayManagementClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use learnhub_shared::config::Config;
use learnhub_shared::sockets::audience::{audience_for, Audience};
use learnhub_shared::sockets::broadcast::broadcast;
use learnhub_shared::sockets::connections::Connection;
use learnhub_shared::sockets::messages::{BroadcastMessage, ChangeKind};
use learnhub_shared::store::{attributes, Document, DynamoStore, Record};
use learnhub_shared::types::Payment;
use serde_json::Value;

/// Clients shared by every invocation of this instance.
struct Broadcaster {
    store: DynamoStore,
    api_gateway_client: ApiGatewayManagementClient,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::from_env();
    let aws_config = aws_config::load_from_env().await;

    let broadcaster = match config.ws_api_endpoint.as_deref() {
        Some(endpoint) => {
            let api_config = aws_sdk_apigatewaymanagement::config::Builder::from(&aws_config)
                .endpoint_url(endpoint)
                .build();
            Some(Broadcaster {
                store: DynamoStore::new(DynamoClient::new(&aws_config), config.table_name.clone()),
                api_gateway_client: ApiGatewayManagementClient::from_conf(api_config),
            })
        }
        None => {
            tracing::error!("WS_API_ENDPOINT is not set; stream records will be skipped");
            None
        }
    };
    let broadcaster = &broadcaster;

    run(service_fn(move |event: LambdaEvent<Event>| async move {
        function_handler(event, broadcaster.as_ref()).await
    }))
    .await
}

async fn function_handler(
    event: LambdaEvent<Event>,
    broadcaster: Option<&Broadcaster>,
) -> Result<(), Error> {
    tracing::info!(
        "DynamoDB Stream event received with {} records",
        event.payload.records.len()
    );
    let Some(broadcaster) = broadcaster else {
        return Ok(());
    };

    for record in &event.payload.records {
        if let Err(e) = process_record(record, broadcaster).await {
            tracing::error!("Failed to process record: {}", e);
        }
    }

    Ok(())
}

async fn process_record(record: &EventRecord, broadcaster: &Broadcaster) -> Result<(), Error> {
    let doc = image_of(record)?;
    let Some((audience, message)) = message_for_record(&record.event_name, doc) else {
        return Ok(());
    };

    let report = broadcast(
        &broadcaster.store,
        &broadcaster.api_gateway_client,
        &audience,
        &message,
    )
    .await?;

    tracing::info!(
        "Broadcast {} sent: {} delivered, {} failed, {} removed",
        message.r#type,
        report.delivered,
        report.failed,
        report.removed
    );
    Ok(())
}

/// The changed item as plain JSON. REMOVE records only carry the old image.
fn image_of(record: &EventRecord) -> Result<Document, Error> {
    let image = if record.change.new_image.is_empty() {
        &record.change.old_image
    } else {
        &record.change.new_image
    };

    match serde_json::to_value(image)? {
        Value::Object(map) => Ok(attributes::untag_map(&map)),
        _ => Ok(Document::new()),
    }
}

/// Who hears about a change, and what they receive. Connection records and
/// entities nobody subscribes to produce nothing.
fn message_for_record(event_name: &str, mut doc: Document) -> Option<(Audience, BroadcastMessage)> {
    let kind = ChangeKind::from_event_name(event_name)?;
    let entity_type = doc.get("entity_type").and_then(Value::as_str)?.to_string();
    if entity_type == Connection::ENTITY {
        return None;
    }

    let audience = audience_for(&entity_type, &doc);
    if audience == Audience::Nobody {
        return None;
    }

    doc.remove("PK");
    doc.remove("SK");
    if entity_type == Payment::ENTITY {
        // Receipts are verified server side only.
        doc.remove("receipt_signature");
    }
    Some((
        audience,
        BroadcastMessage::change(&entity_type, kind, Value::Object(doc)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn chat_messages_go_to_participants() {
        let doc = document(json!({
            "PK": "CHAT#alice_bob",
            "SK": "MESSAGE#2026",
            "entity_type": "chat_message",
            "participants": ["alice", "bob"],
            "body": "hi",
        }));

        let (audience, message) = message_for_record("INSERT", doc).unwrap();
        assert_eq!(
            audience,
            Audience::Users(vec!["alice".to_string(), "bob".to_string()])
        );
        assert_eq!(message.r#type, "chat_message_created");
        let payload = serde_json::to_value(&message).unwrap();
        assert_eq!(payload["body"], "hi");
        assert!(payload.get("PK").is_none());
    }

    #[test]
    fn connections_and_private_records_are_skipped() {
        let connection = document(json!({"entity_type": "connection", "user_id": "alice"}));
        assert!(message_for_record("INSERT", connection).is_none());

        let settings = document(json!({"entity_type": "settings", "commission_rate_bps": 1500}));
        assert!(message_for_record("MODIFY", settings).is_none());

        let course = document(json!({"entity_type": "course", "course_id": "c1"}));
        assert!(message_for_record("TTL", course).is_none());
    }

    #[test]
    fn payment_updates_omit_the_receipt() {
        let payment = document(json!({
            "PK": "PAYMENT#p1",
            "SK": "PAYMENT#p1",
            "entity_type": "payment",
            "student_id": "s1",
            "instructor_id": "t1",
            "amount_cents": 4900,
            "receipt_signature": "c2lnbmVk",
        }));

        let (audience, message) = message_for_record("INSERT", payment).unwrap();
        assert_eq!(audience, Audience::Users(vec!["s1".to_string(), "t1".to_string()]));
        let payload = serde_json::to_value(&message).unwrap();
        assert_eq!(payload["amount_cents"], 4900);
        assert!(payload.get("receipt_signature").is_none());
    }

    #[test]
    fn draft_courses_stay_with_author_and_admins() {
        let draft = document(json!({
            "entity_type": "course",
            "course_id": "c1",
            "instructor_id": "t1",
            "status": "Draft",
        }));
        let (audience, message) = message_for_record("MODIFY", draft).unwrap();
        assert_eq!(audience, Audience::UsersAndAdmins(vec!["t1".to_string()]));
        assert_eq!(message.r#type, "course_updated");
    }

    #[test]
    fn removed_items_are_read_from_the_old_image() {
        let event: Event = serde_json::from_value(json!({
            "Records": [{
                "eventID": "1",
                "eventName": "REMOVE",
                "eventVersion": "1.1",
                "eventSource": "aws:dynamodb",
                "awsRegion": "eu-west-1",
                "eventSourceARN": "arn:aws:dynamodb:eu-west-1:123456789012:table/learnhub/stream/2026",
                "dynamodb": {
                    "ApproximateCreationDateTime": 1760000000,
                    "Keys": {
                        "PK": {"S": "ENROLLMENT#s1_c1"},
                        "SK": {"S": "ENROLLMENT#s1_c1"}
                    },
                    "OldImage": {
                        "PK": {"S": "ENROLLMENT#s1_c1"},
                        "SK": {"S": "ENROLLMENT#s1_c1"},
                        "entity_type": {"S": "enrollment"},
                        "student_id": {"S": "s1"},
                        "progress": {"N": "40"}
                    },
                    "SequenceNumber": "111",
                    "SizeBytes": 26,
                    "StreamViewType": "NEW_AND_OLD_IMAGES"
                }
            }]
        }))
        .unwrap();

        let record = &event.records[0];
        let doc = image_of(record).unwrap();
        assert_eq!(doc["student_id"], "s1");

        let (audience, message) = message_for_record(&record.event_name, doc).unwrap();
        assert_eq!(audience, Audience::Users(vec!["s1".to_string()]));
        assert_eq!(message.r#type, "enrollment_deleted");
    }
}
