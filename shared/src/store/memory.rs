use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::{
    Document, DocumentStore, Filter, Key, StoreError, WriteOp, ENTITY_TYPE, MAX_TRANSACTION_OPS, PK,
    SK,
};

type Table = BTreeMap<(String, String), Document>;

/// In-process store used by tests and `STORE_BACKEND=memory` local runs.
#[derive(Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Table>, StoreError> {
        self.table
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn slot(key: &Key) -> (String, String) {
    (key.pk.clone(), key.sk.clone())
}

fn with_key(key: &Key, mut doc: Document) -> Document {
    doc.insert(PK.to_string(), Value::String(key.pk.clone()));
    doc.insert(SK.to_string(), Value::String(key.sk.clone()));
    doc
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, key: &Key) -> Result<Option<Document>, StoreError> {
        Ok(self.lock()?.get(&slot(key)).cloned())
    }

    async fn put(&self, key: &Key, doc: Document) -> Result<(), StoreError> {
        self.lock()?.insert(slot(key), with_key(key, doc));
        Ok(())
    }

    async fn put_if_absent(&self, key: &Key, doc: Document) -> Result<bool, StoreError> {
        let mut table = self.lock()?;
        if table.contains_key(&slot(key)) {
            return Ok(false);
        }
        table.insert(slot(key), with_key(key, doc));
        Ok(true)
    }

    async fn update(&self, key: &Key, fields: Document) -> Result<Option<Document>, StoreError> {
        let mut table = self.lock()?;
        let Some(existing) = table.get_mut(&slot(key)) else {
            return Ok(None);
        };
        for (field, value) in fields {
            if field != PK && field != SK {
                existing.insert(field, value);
            }
        }
        Ok(Some(existing.clone()))
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        self.lock()?.remove(&slot(key));
        Ok(())
    }

    async fn query(&self, pk: &str, sk_prefix: &str) -> Result<Vec<Document>, StoreError> {
        let table = self.lock()?;
        Ok(table
            .range((pk.to_string(), sk_prefix.to_string())..)
            .take_while(|((p, s), _)| p == pk && s.starts_with(sk_prefix))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    async fn scan(&self, entity_type: &str, filters: &[Filter]) -> Result<Vec<Document>, StoreError> {
        let table = self.lock()?;
        Ok(table
            .values()
            .filter(|doc| doc.get(ENTITY_TYPE).and_then(Value::as_str) == Some(entity_type))
            .filter(|doc| filters.iter().all(|f| f.matches(doc)))
            .cloned()
            .collect())
    }

    async fn batch_get(&self, keys: &[Key]) -> Result<Vec<Document>, StoreError> {
        let table = self.lock()?;
        Ok(keys
            .iter()
            .filter_map(|key| table.get(&slot(key)).cloned())
            .collect())
    }

    async fn transact(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.len() > MAX_TRANSACTION_OPS {
            return Err(StoreError::TransactionCancelled(format!(
                "{} writes exceed the transaction limit of {}",
                ops.len(),
                MAX_TRANSACTION_OPS
            )));
        }
        let mut table = self.lock()?;

        // Check every condition before touching the table.
        for op in &ops {
            match op {
                WriteOp::Update { key, .. } if !table.contains_key(&slot(key)) => {
                    return Err(StoreError::TransactionCancelled(format!(
                        "update target {}/{} does not exist",
                        key.pk, key.sk
                    )));
                }
                WriteOp::Create { key, .. } if table.contains_key(&slot(key)) => {
                    return Err(StoreError::TransactionCancelled(format!(
                        "create target {}/{} already exists",
                        key.pk, key.sk
                    )));
                }
                _ => {}
            }
        }

        for op in ops {
            match op {
                WriteOp::Put { key, doc } | WriteOp::Create { key, doc } => {
                    table.insert(slot(&key), with_key(&key, doc));
                }
                WriteOp::Update { key, fields } => {
                    if let Some(existing) = table.get_mut(&slot(&key)) {
                        for (field, value) in fields {
                            if field != PK && field != SK {
                                existing.insert(field, value);
                            }
                        }
                    }
                }
                WriteOp::Delete { key } => {
                    table.remove(&slot(&key));
                }
            }
        }
        Ok(())
    }
}
