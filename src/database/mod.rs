/// 내구성 저장소 (키-값 테이블)
/// 키 기준 upsert만 제공하며, 같은 내용을 다시 쓰면 결과가 같다(멱등).
// region:    --- Imports
use crate::config::is_plain_identifier;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

mod memory;

pub use memory::InMemoryStore;
// endregion: --- Imports

// region:    --- Store Trait
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid table name {0:?}")]
    InvalidTable(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// 테이블 기본 키
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Text(String),
    Number(i64),
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(key) => f.write_str(key),
            Self::Number(key) => write!(f, "{key}"),
        }
    }
}

/// 저장소 트레이트
/// 프로세스당 한 번 생성해 각 핸들러에 주입한다.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// 키가 같은 레코드가 있으면 덮어쓰고, 없으면 새로 쓴다
    async fn put_item(&self, table: &str, key: &RecordKey, item: &Value)
        -> Result<(), StoreError>;
}
// endregion: --- Store Trait

// region:    --- Postgres Store
/// Postgres 구현체
/// 테이블마다 (pk TEXT, item JSONB) 형태로 레코드를 보관한다.
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    /// 커넥션 풀 생성
    pub async fn connect(database_url: &str, region: &str) -> Result<Self, StoreError> {
        let options = PgConnectOptions::from_str(database_url)?
            .application_name(&format!("auction-pipeline-{region}"));
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!("{:<12} --> Postgres 연결 성공 (region: {})", "Store", region);
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// 테이블이 없으면 생성
    pub async fn ensure_table(&self, table: &str) -> Result<(), StoreError> {
        let table = quoted(table)?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                pk TEXT PRIMARY KEY,
                item JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"
        );
        sqlx::query(&ddl).execute(&*self.pool).await?;
        info!("{:<12} --> 테이블 확인 완료: {}", "Store", table);
        Ok(())
    }
}

#[async_trait]
impl DurableStore for PostgresStore {
    async fn put_item(
        &self,
        table: &str,
        key: &RecordKey,
        item: &Value,
    ) -> Result<(), StoreError> {
        let table = quoted(table)?;
        let upsert = format!(
            "INSERT INTO {table} (pk, item, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (pk) DO UPDATE SET item = EXCLUDED.item, updated_at = EXCLUDED.updated_at"
        );
        sqlx::query(&upsert)
            .bind(key.to_string())
            .bind(item)
            .execute(&*self.pool)
            .await?;
        debug!("{:<12} --> upsert 완료: {} / {}", "Store", table, key);
        Ok(())
    }
}

/// 식별자 검증 후 따옴표로 감싼다 (대소문자 보존)
fn quoted(table: &str) -> Result<String, StoreError> {
    if !is_plain_identifier(table) {
        return Err(StoreError::InvalidTable(table.to_string()));
    }
    Ok(format!("\"{table}\""))
}
// endregion: --- Postgres Store
