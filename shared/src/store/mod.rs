//! Document store port.
//!
//! Every record lives in a single table keyed by `PK`/`SK`, the layout the
//! DynamoDB table uses. Top-level documents use the same value for both keys
//! (`USER#123` / `USER#123`); child documents share their parent's `PK` and
//! carry a type prefix in `SK` (`COURSE#1` / `SECTION#9`).

pub mod attributes;
pub mod dynamo;
pub mod keys;
pub mod memory;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// A stored document: a flat JSON object.
pub type Document = Map<String, Value>;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const ENTITY_TYPE: &str = "entity_type";

/// Largest number of writes one transaction may carry.
pub const MAX_TRANSACTION_OPS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub pk: String,
    pub sk: String,
}

impl Key {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Key for a top-level document (`PK == SK`).
    pub fn single(pk: impl Into<String>) -> Self {
        let pk = pk.into();
        Self {
            sk: pk.clone(),
            pk,
        }
    }
}

/// Scan predicates on document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    BeginsWith(String, String),
    In(String, Vec<Value>),
    /// Array field contains the value.
    Contains(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::Eq(field.to_string(), value.into())
    }

    pub fn begins_with(field: &str, prefix: &str) -> Self {
        Self::BeginsWith(field.to_string(), prefix.to_string())
    }

    pub fn one_of(field: &str, values: Vec<Value>) -> Self {
        Self::In(field.to_string(), values)
    }

    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Self::Contains(field.to_string(), value.into())
    }

    /// Evaluate against an in-memory document.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::BeginsWith(field, prefix) => doc
                .get(field)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Filter::In(field, values) => doc.get(field).is_some_and(|v| values.contains(v)),
            Filter::Contains(field, value) => doc
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// One write inside an atomic transaction.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put { key: Key, doc: Document },
    /// Insert; the transaction fails if a document already exists.
    Create { key: Key, doc: Document },
    /// Patch fields on an existing document; the transaction fails if it is missing.
    Update { key: Key, fields: Document },
    Delete { key: Key },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("transaction cancelled: {0}")]
    TransactionCancelled(String),
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Document>, StoreError>;

    /// Insert or overwrite.
    async fn put(&self, key: &Key, doc: Document) -> Result<(), StoreError>;

    /// Insert only when no document exists at `key`. Returns whether it was written.
    async fn put_if_absent(&self, key: &Key, doc: Document) -> Result<bool, StoreError>;

    /// Patch fields on an existing document and return the merged result,
    /// or `None` when nothing is stored at `key`.
    async fn update(&self, key: &Key, fields: Document) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, key: &Key) -> Result<(), StoreError>;

    /// Documents under `pk` whose `SK` begins with `sk_prefix`, ordered by `SK`.
    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Document>, StoreError>;

    /// All documents of one entity type matching every filter.
    async fn scan(&self, entity_type: &str, filters: &[Filter]) -> Result<Vec<Document>, StoreError>;

    /// Fetch several documents; missing keys are skipped.
    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Document>, StoreError>;

    /// Apply all writes or none.
    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;
}

/// A typed document with a fixed entity type and a key derived from its fields.
pub trait Record: Serialize + DeserializeOwned {
    const ENTITY: &'static str;

    fn key(&self) -> Key;
}

/// Serialize a record into a storable document tagged with its entity type.
pub fn encode<R: Record>(record: &R) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(mut doc) => {
            doc.insert(ENTITY_TYPE.to_string(), Value::String(R::ENTITY.to_string()));
            Ok(doc)
        }
        other => Err(StoreError::Malformed(format!(
            "{} serialized to non-object {}",
            R::ENTITY,
            other
        ))),
    }
}

/// Deserialize a stored document. Key and type attributes are ignored.
pub fn decode<R: Record>(doc: Document) -> Result<R, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

pub fn decode_all<R: Record>(docs: Vec<Document>) -> Result<Vec<R>, StoreError> {
    docs.into_iter().map(decode).collect()
}

/// Transaction step that writes `record` at its key.
pub fn put_op<R: Record>(record: &R) -> Result<WriteOp, StoreError> {
    Ok(WriteOp::Put {
        key: record.key(),
        doc: encode(record)?,
    })
}

pub async fn save<R: Record>(store: &dyn DocumentStore, record: &R) -> Result<(), StoreError> {
    store.put(&record.key(), encode(record)?).await
}

pub async fn load<R: Record>(store: &dyn DocumentStore, key: &Key) -> Result<Option<R>, StoreError> {
    store.get(key).await?.map(decode).transpose()
}

pub async fn scan_as<R: Record>(
    store: &dyn DocumentStore,
    filters: &[Filter],
) -> Result<Vec<R>, StoreError> {
    decode_all(store.scan(R::ENTITY, filters).await?)
}

pub async fn query_as<R: Record>(
    store: &dyn DocumentStore,
    pk: &str,
    sk_prefix: &str,
) -> Result<Vec<R>, StoreError> {
    decode_all(store.query(pk, sk_prefix).await?)
}

/// Build a patch document from field/value pairs.
pub fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Document {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filters_match_documents() {
        let d = doc(json!({
            "title_lower": "rust for beginners",
            "status": "Published",
            "participants": ["a", "b"],
        }));

        assert!(Filter::eq("status", "Published").matches(&d));
        assert!(!Filter::eq("status", "Draft").matches(&d));
        assert!(Filter::begins_with("title_lower", "rust").matches(&d));
        assert!(!Filter::begins_with("title_lower", "go").matches(&d));
        assert!(Filter::one_of("status", vec![json!("Draft"), json!("Published")]).matches(&d));
        assert!(Filter::contains("participants", "b").matches(&d));
        assert!(!Filter::contains("participants", "c").matches(&d));
        assert!(!Filter::eq("missing", "x").matches(&d));
    }

    #[test]
    fn single_key_repeats_partition_key() {
        let key = Key::single("USER#1");
        assert_eq!(key.pk, "USER#1");
        assert_eq!(key.sk, "USER#1");
    }
}
