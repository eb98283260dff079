use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue, Delete, KeysAndAttributes, Put, ReturnValue, TransactWriteItem, Update,
};
use aws_sdk_dynamodb::Client as DynamoClient;

use super::attributes::{from_item, to_attribute, to_item};
use super::{Document, DocumentStore, Filter, Key, StoreError, WriteOp, ENTITY_TYPE, PK, SK};

/// DynamoDB allows at most 100 keys per BatchGetItem and 100 items per transaction.
const BATCH_GET_LIMIT: usize = 100;
const TRANSACT_LIMIT: usize = super::MAX_TRANSACTION_OPS;

/// Single-table DynamoDB adapter.
#[derive(Clone)]
pub struct DynamoStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

fn backend<E: std::fmt::Debug>(context: &str) -> impl FnOnce(E) -> StoreError + '_ {
    move |e| {
        tracing::error!("DynamoDB {} failed: {:?}", context, e);
        StoreError::Backend(format!("{} failed: {:?}", context, e))
    }
}

fn key_item(key: &Key) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (PK.to_string(), AttributeValue::S(key.pk.clone())),
        (SK.to_string(), AttributeValue::S(key.sk.clone())),
    ])
}

fn full_item(key: &Key, doc: &Document) -> HashMap<String, AttributeValue> {
    let mut item = to_item(doc);
    item.extend(key_item(key));
    item
}

/// `SET #f0 = :v0, #f1 = :v1` with its name and value maps.
struct SetExpression {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

fn set_expression(fields: &Document) -> SetExpression {
    let mut clauses = Vec::with_capacity(fields.len());
    let mut names = HashMap::new();
    let mut values = HashMap::new();
    for (i, (field, value)) in fields
        .iter()
        .filter(|(field, _)| field.as_str() != PK && field.as_str() != SK)
        .enumerate()
    {
        clauses.push(format!("#f{i} = :v{i}"));
        names.insert(format!("#f{i}"), field.clone());
        values.insert(format!(":v{i}"), to_attribute(value));
    }
    SetExpression {
        expression: format!("SET {}", clauses.join(", ")),
        names,
        values,
    }
}

/// Filter expression over `entity_type` plus every predicate.
struct FilterExpression {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

fn filter_expression(entity_type: &str, filters: &[Filter]) -> FilterExpression {
    let mut clauses = vec!["#entity = :entity".to_string()];
    let mut names = HashMap::from([("#entity".to_string(), ENTITY_TYPE.to_string())]);
    let mut values = HashMap::from([(
        ":entity".to_string(),
        AttributeValue::S(entity_type.to_string()),
    )]);

    for (i, filter) in filters.iter().enumerate() {
        let name = format!("#p{i}");
        match filter {
            Filter::Eq(field, value) => {
                clauses.push(format!("{name} = :p{i}"));
                names.insert(name, field.clone());
                values.insert(format!(":p{i}"), to_attribute(value));
            }
            Filter::BeginsWith(field, prefix) => {
                clauses.push(format!("begins_with({name}, :p{i})"));
                names.insert(name, field.clone());
                values.insert(format!(":p{i}"), AttributeValue::S(prefix.clone()));
            }
            Filter::Contains(field, value) => {
                clauses.push(format!("contains({name}, :p{i})"));
                names.insert(name, field.clone());
                values.insert(format!(":p{i}"), to_attribute(value));
            }
            Filter::In(field, options) => {
                if options.is_empty() {
                    // Nothing can match an empty IN list.
                    clauses.push("attribute_not_exists(#entity)".to_string());
                    continue;
                }
                let placeholders: Vec<String> = options
                    .iter()
                    .enumerate()
                    .map(|(j, option)| {
                        let placeholder = format!(":p{i}_{j}");
                        values.insert(placeholder.clone(), to_attribute(option));
                        placeholder
                    })
                    .collect();
                clauses.push(format!("{name} IN ({})", placeholders.join(", ")));
                names.insert(name, field.clone());
            }
        }
    }

    FilterExpression {
        expression: clauses.join(" AND "),
        names,
        values,
    }
}

#[async_trait]
impl DocumentStore for DynamoStore {
    async fn get(&self, key: &Key) -> Result<Option<Document>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .send()
            .await
            .map_err(backend("get_item"))?;

        Ok(result.item().map(from_item))
    }

    async fn put(&self, key: &Key, doc: Document) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(full_item(key, &doc)))
            .send()
            .await
            .map_err(backend("put_item"))?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &Key, doc: Document) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(full_item(key, &doc)))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(backend("put_item")(e)),
        }
    }

    async fn update(&self, key: &Key, fields: Document) -> Result<Option<Document>, StoreError> {
        if fields.is_empty() {
            return self.get(key).await;
        }
        let set = set_expression(&fields);

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .update_expression(set.expression)
            .condition_expression("attribute_exists(PK)")
            .set_expression_attribute_names(Some(set.names))
            .set_expression_attribute_values(Some(set.values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.attributes().map(from_item)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(backend("update_item")(e)),
        }
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key_item(key)))
            .send()
            .await
            .map_err(backend("delete_item"))?;
        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut request = self
                .client
                .query()
                .table_name(&self.table_name)
                .expression_attribute_values(":pk", AttributeValue::S(pk.to_string()))
                .set_exclusive_start_key(start_key.take());
            // Key conditions reject empty strings; an empty prefix means the whole partition.
            request = if sk_prefix.is_empty() {
                request.key_condition_expression("PK = :pk")
            } else {
                request
                    .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
                    .expression_attribute_values(":sk_prefix", AttributeValue::S(sk_prefix.to_string()))
            };
            let result = request.send().await.map_err(backend("query"))?;

            docs.extend(result.items().iter().map(from_item));

            match result.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }

        Ok(docs)
    }

    async fn scan(&self, entity_type: &str, filters: &[Filter]) -> Result<Vec<Document>, StoreError> {
        let filter = filter_expression(entity_type, filters);
        let mut docs = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression(&filter.expression)
                .set_expression_attribute_names(Some(filter.names.clone()))
                .set_expression_attribute_values(Some(filter.values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend("scan"))?;

            docs.extend(result.items().iter().map(from_item));

            match result.last_evaluated_key() {
                Some(last) if !last.is_empty() => start_key = Some(last.clone()),
                _ => break,
            }
        }

        Ok(docs)
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Document>, StoreError> {
        let mut docs = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(BATCH_GET_LIMIT) {
            let mut pending = Some(
                KeysAndAttributes::builder()
                    .set_keys(Some(chunk.iter().map(key_item).collect()))
                    .build()
                    .map_err(backend("batch_get_item build"))?,
            );

            while let Some(request) = pending.take() {
                let result = self
                    .client
                    .batch_get_item()
                    .request_items(&self.table_name, request)
                    .send()
                    .await
                    .map_err(backend("batch_get_item"))?;

                if let Some(items) = result.responses().and_then(|r| r.get(&self.table_name)) {
                    docs.extend(items.iter().map(from_item));
                }

                pending = result
                    .unprocessed_keys()
                    .and_then(|u| u.get(&self.table_name))
                    .filter(|k| !k.keys().is_empty())
                    .cloned();
            }
        }

        Ok(docs)
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.len() > TRANSACT_LIMIT {
            return Err(StoreError::TransactionCancelled(format!(
                "{} writes exceed the transaction limit of {}",
                ops.len(),
                TRANSACT_LIMIT
            )));
        }

        let mut items = Vec::with_capacity(ops.len());
        for op in ops {
            let item = match op {
                WriteOp::Put { key, doc } => TransactWriteItem::builder()
                    .put(
                        Put::builder()
                            .table_name(&self.table_name)
                            .set_item(Some(full_item(&key, &doc)))
                            .build()
                            .map_err(backend("transact put build"))?,
                    )
                    .build(),
                WriteOp::Create { key, doc } => TransactWriteItem::builder()
                    .put(
                        Put::builder()
                            .table_name(&self.table_name)
                            .set_item(Some(full_item(&key, &doc)))
                            .condition_expression("attribute_not_exists(PK)")
                            .build()
                            .map_err(backend("transact create build"))?,
                    )
                    .build(),
                WriteOp::Update { key, fields } => {
                    let set = set_expression(&fields);
                    TransactWriteItem::builder()
                        .update(
                            Update::builder()
                                .table_name(&self.table_name)
                                .set_key(Some(key_item(&key)))
                                .update_expression(set.expression)
                                .condition_expression("attribute_exists(PK)")
                                .set_expression_attribute_names(Some(set.names))
                                .set_expression_attribute_values(Some(set.values))
                                .build()
                                .map_err(backend("transact update build"))?,
                        )
                        .build()
                }
                WriteOp::Delete { key } => TransactWriteItem::builder()
                    .delete(
                        Delete::builder()
                            .table_name(&self.table_name)
                            .set_key(Some(key_item(&key)))
                            .build()
                            .map_err(backend("transact delete build"))?,
                    )
                    .build(),
            };
            items.push(item);
        }

        let result = self
            .client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_transaction_canceled_exception()) =>
            {
                tracing::warn!("Transaction cancelled: {:?}", e);
                Err(StoreError::TransactionCancelled(format!("{:?}", e)))
            }
            Err(e) => Err(backend("transact_write_items")(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_expression_skips_key_attributes() {
        let fields = json!({"PK": "X", "status": "closed", "progress": 50})
            .as_object()
            .cloned()
            .unwrap();
        let set = set_expression(&fields);
        assert!(set.expression.starts_with("SET "));
        assert_eq!(set.names.len(), 2);
        assert!(!set.names.values().any(|n| n == "PK"));
    }

    #[test]
    fn filter_expression_always_restricts_entity_type() {
        let filter = filter_expression(
            "course",
            &[
                Filter::eq("status", "Published"),
                Filter::begins_with("title_lower", "ru"),
                Filter::one_of("category", vec![json!("dev"), json!("design")]),
            ],
        );
        assert!(filter.expression.starts_with("#entity = :entity AND "));
        assert!(filter.expression.contains("begins_with(#p1, :p1)"));
        assert!(filter.expression.contains("#p2 IN (:p2_0, :p2_1)"));
        assert_eq!(filter.values.len(), 5);
    }
}
