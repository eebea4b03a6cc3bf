use super::{DurableStore, RecordKey, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// 메모리 저장소
/// 로컬 실행(STORE_BACKEND=memory)과 테스트에서 사용한다.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, HashMap<String, Value>>>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// true로 설정하면 이후 모든 쓰기가 실패한다
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, table: &str, key: &RecordKey) -> Option<Value> {
        let tables = self.tables.read().await;
        tables.get(table)?.get(&key.to_string()).cloned()
    }

    pub async fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map_or(0, HashMap::len)
    }

    /// 성공한 쓰기 횟수 (덮어쓰기 포함)
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for InMemoryStore {
    async fn put_item(
        &self,
        table: &str,
        key: &RecordKey,
        item: &Value,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "write to {table} rejected"
            )));
        }
        let mut tables = self.tables.write().await;
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), item.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
