/// 파이프라인 설정
/// 프로세스 시작 시 한 번만 환경 변수에서 읽고 검증한다.
/// 필수 항목이 없으면 메시지 처리와 무관하게 시작 단계에서 실패한다.
// region:    --- Imports
use std::time::Duration;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Defaults
const DEFAULT_KAFKA_BROKERS: &str = "localhost:9092";
const DEFAULT_AUCTION_TOPIC: &str = "auction-topic";
const DEFAULT_STOCK_QUEUE: &str = "auction-queue";
const DEFAULT_DEAD_LETTER_QUEUE: &str = "auction-dlq";
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_RECEIVE_COUNT: u32 = 1;
const DEFAULT_STOCK_BATCH_SIZE: usize = 5;
const DEFAULT_STOCK_BATCH_WINDOW_SECS: u64 = 6;
const DEFAULT_HANDLER_TIMEOUT_SECS: u64 = 15;
const DEFAULT_BID_MAX_DELIVERY_ATTEMPTS: u32 = 3;
// endregion: --- Defaults

// region:    --- Errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}
// endregion: --- Errors

// region:    --- Config Model
/// 저장소 백엔드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// 브로커(Kafka) 연결 및 토폴로지 이름
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub brokers: String,
    pub topic: String,
    pub stock_queue: String,
    pub dead_letter_queue: String,
}

/// 재고 큐 배치 수집 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub max_size: usize,
    pub window: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub stock_table: String,
    pub bids_table: String,
    pub region: String,
    pub store: StoreBackend,
    pub broker: BrokerConfig,
    pub stock_batch: BatchSettings,
    pub max_receive_count: u32,
    pub bid_max_delivery_attempts: u32,
    pub handler_timeout: Duration,
    pub http_addr: String,
}
// endregion: --- Config Model

// region:    --- Loading
impl PipelineConfig {
    /// 프로세스 환경 변수에서 설정 로드
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키 조회 함수로 설정 로드
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let stock_table = table_name(&get, "TABLE_NAME")?;
        let bids_table = table_name(&get, "BIDS_TABLE")?;
        let region = get("REGION").ok_or(ConfigError::Missing("REGION"))?;

        let store = match get("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres {
                database_url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                    reason: "expected `postgres` or `memory`",
                })
            }
        };

        let broker = BrokerConfig {
            brokers: get("KAFKA_BROKERS").unwrap_or_else(|| DEFAULT_KAFKA_BROKERS.to_string()),
            topic: get("AUCTION_TOPIC").unwrap_or_else(|| DEFAULT_AUCTION_TOPIC.to_string()),
            stock_queue: get("STOCK_QUEUE").unwrap_or_else(|| DEFAULT_STOCK_QUEUE.to_string()),
            dead_letter_queue: get("DEAD_LETTER_QUEUE")
                .unwrap_or_else(|| DEFAULT_DEAD_LETTER_QUEUE.to_string()),
        };

        let stock_batch = BatchSettings {
            max_size: positive(&get, "STOCK_BATCH_SIZE", DEFAULT_STOCK_BATCH_SIZE as u64)? as usize,
            window: Duration::from_secs(number(
                &get,
                "STOCK_BATCH_WINDOW_SECS",
                DEFAULT_STOCK_BATCH_WINDOW_SECS,
            )?),
        };

        Ok(Self {
            stock_table,
            bids_table,
            region,
            store,
            broker,
            stock_batch,
            max_receive_count: positive(
                &get,
                "MAX_RECEIVE_COUNT",
                u64::from(DEFAULT_MAX_RECEIVE_COUNT),
            )? as u32,
            bid_max_delivery_attempts: positive(
                &get,
                "BID_MAX_DELIVERY_ATTEMPTS",
                u64::from(DEFAULT_BID_MAX_DELIVERY_ATTEMPTS),
            )? as u32,
            handler_timeout: Duration::from_secs(positive(
                &get,
                "HANDLER_TIMEOUT_SECS",
                DEFAULT_HANDLER_TIMEOUT_SECS,
            )?),
            http_addr: get("HTTP_ADDR").unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
        })
    }
}

/// 테이블 이름은 SQL 식별자로 그대로 쓰이므로 영문/숫자/밑줄만 허용
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn table_name<G>(get: &G, key: &'static str) -> Result<String, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = get(key).ok_or(ConfigError::Missing(key))?;
    if !is_plain_identifier(&value) {
        return Err(ConfigError::Invalid {
            key,
            value,
            reason: "table names must be plain identifiers",
        });
    }
    Ok(value)
}

fn number<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected a non-negative integer",
        }),
    }
}

fn positive<G>(get: &G, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = number(get, key, default)?;
    if value == 0 || value > u64::from(u32::MAX) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "expected a positive integer",
        });
    }
    Ok(value)
}
// endregion: --- Loading

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("TABLE_NAME", "Stock"),
        ("BIDS_TABLE", "Bids"),
        ("REGION", "eu-west-1"),
        ("DATABASE_URL", "postgres://localhost/auction"),
    ];

    #[test]
    fn loads_defaults_when_only_required_keys_are_set() {
        let config = PipelineConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.stock_table, "Stock");
        assert_eq!(config.bids_table, "Bids");
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.max_receive_count, 1);
        assert_eq!(config.stock_batch.max_size, 5);
        assert_eq!(config.stock_batch.window, Duration::from_secs(6));
        assert_eq!(config.handler_timeout, Duration::from_secs(15));
        assert_eq!(config.broker.topic, "auction-topic");
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/auction".to_string()
            }
        );
    }

    #[test]
    fn missing_region_is_fatal() {
        let err = PipelineConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("REGION"));
    }

    #[test]
    fn missing_table_is_fatal() {
        let err = PipelineConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TABLE_NAME"));
    }

    #[test]
    fn memory_backend_does_not_need_database_url() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("TABLE_NAME", "Stock"),
            ("BIDS_TABLE", "Bids"),
            ("REGION", "eu-west-1"),
            ("STORE_BACKEND", "memory"),
        ]))
        .unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
    }

    #[test]
    fn rejects_non_identifier_table_names() {
        let err = PipelineConfig::from_lookup(lookup(&[
            ("TABLE_NAME", "Stock; DROP TABLE x"),
            ("BIDS_TABLE", "Bids"),
            ("REGION", "eu-west-1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TABLE_NAME", .. }));
    }

    #[test]
    fn rejects_zero_receive_count() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("MAX_RECEIVE_COUNT", "0"));
        let err = PipelineConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "MAX_RECEIVE_COUNT",
                ..
            }
        ));
    }

    #[test]
    fn rejects_non_numeric_batch_size() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("STOCK_BATCH_SIZE", "five"));
        let err = PipelineConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "STOCK_BATCH_SIZE",
                ..
            }
        ));
    }
}
