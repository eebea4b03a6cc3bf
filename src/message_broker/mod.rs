// region:    --- Imports
use crate::config::BrokerConfig;
use crate::message::{MessageAttributes, QueueDelivery};
use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, error, info, warn};

pub mod topology;
pub mod workers;

// endregion: --- Imports

/// 메시지 ID 헤더
pub const MESSAGE_ID_HEADER: &str = "x-message-id";
/// 지금까지 전달된 횟수 헤더
pub const RECEIVE_COUNT_HEADER: &str = "x-receive-count";

// region:    --- Publisher
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("topic {topic} could not be created: {reason}")]
    Provision { topic: String, reason: String },
}

/// 토픽/큐 발행 트레이트
#[async_trait]
pub trait TopicPublisher: Send + Sync {
    async fn publish(&self, topic: &str, delivery: &QueueDelivery) -> Result<(), BrokerError>;
}
// endregion: --- Publisher

// region:    --- Kafka Producer
#[derive(Clone)]
pub struct KafkaProducer {
    producer: Arc<FutureProducer>,
}

/// KafkaProducer 구현
impl KafkaProducer {
    pub fn new(brokers: &str, client_id: &str) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", client_id)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(KafkaProducer {
            producer: Arc::new(producer),
        })
    }
}

#[async_trait]
impl TopicPublisher for KafkaProducer {
    /// 메시지 전송
    /// 메시지 속성은 헤더로, 메시지 ID와 전달 횟수는 예약 헤더로 보낸다.
    async fn publish(&self, topic: &str, delivery: &QueueDelivery) -> Result<(), BrokerError> {
        debug!(
            "{:<12} --> Kafka 메시지 전송: topic={}, message_id={}",
            "Producer", topic, delivery.message_id
        );
        let receive_count = delivery.receive_count.to_string();
        let mut headers = OwnedHeaders::new_with_capacity(delivery.attributes.len() + 2)
            .insert(Header {
                key: MESSAGE_ID_HEADER,
                value: Some(delivery.message_id.as_str()),
            })
            .insert(Header {
                key: RECEIVE_COUNT_HEADER,
                value: Some(receive_count.as_str()),
            });
        for (key, value) in &delivery.attributes {
            headers = headers.insert(Header {
                key: key.as_str(),
                value: Some(value.as_str()),
            });
        }

        let record = FutureRecord::to(topic)
            .key(delivery.message_id.as_str())
            .payload(delivery.body.as_str())
            .headers(headers);

        self.producer
            .send(record, Duration::from_secs(0))
            .await
            .map_err(|(e, _)| BrokerError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;

        Ok(())
    }
}
// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topic: String,
}

/// KafkaConsumer 구현
impl KafkaConsumer {
    pub fn new(
        brokers: &str,
        group_id: &str,
        client_id: &str,
        topic: &str,
    ) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("client.id", client_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .set("fetch.max.bytes", "5242880")
            .set("allow.auto.create.topics", "true")
            .create()?;
        consumer.subscribe(&[topic])?;
        info!(
            "{:<12} --> Kafka 구독 시작: topic={}, group={}",
            "Consumer", topic, group_id
        );

        Ok(KafkaConsumer {
            consumer,
            topic: topic.to_string(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 배치 수집
    /// 첫 메시지는 도착할 때까지 기다리고, 이후 max_size건 또는 window 경과 시까지 모은다.
    pub async fn next_batch(
        &self,
        max_size: usize,
        window: Duration,
    ) -> Result<Vec<QueueDelivery>, BrokerError> {
        let mut batch = vec![to_delivery(&self.consumer.recv().await?)];
        let deadline = time::Instant::now() + window;

        while batch.len() < max_size {
            match time::timeout_at(deadline, self.consumer.recv()).await {
                Ok(Ok(message)) => batch.push(to_delivery(&message)),
                Ok(Err(e)) => {
                    warn!("{:<12} --> 메시지 수신 오류: {:?}", "Consumer", e);
                    break;
                }
                Err(_) => break,
            }
        }

        debug!(
            "{:<12} --> 배치 수집 완료: topic={}, {}건",
            "Consumer",
            self.topic,
            batch.len()
        );
        Ok(batch)
    }

    /// 처리(정산)가 끝난 뒤에만 오프셋 커밋
    pub fn commit(&self) -> Result<(), BrokerError> {
        self.consumer.commit_consumer_state(CommitMode::Async)?;
        Ok(())
    }
}

/// Kafka 메시지를 큐 메시지로 변환
fn to_delivery(message: &BorrowedMessage<'_>) -> QueueDelivery {
    let mut attributes = MessageAttributes::new();
    let mut message_id = None;
    let mut previous_receives = 0u32;

    if let Some(headers) = message.headers() {
        for header in headers.iter() {
            let value = header
                .value
                .map(|v| String::from_utf8_lossy(v).into_owned())
                .unwrap_or_default();
            match header.key {
                MESSAGE_ID_HEADER => message_id = Some(value),
                RECEIVE_COUNT_HEADER => previous_receives = value.parse().unwrap_or(0),
                key => {
                    attributes.insert(key.to_string(), value);
                }
            }
        }
    }

    QueueDelivery {
        message_id: message_id.unwrap_or_else(|| {
            format!(
                "{}-{}-{}",
                message.topic(),
                message.partition(),
                message.offset()
            )
        }),
        body: message
            .payload()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
            .unwrap_or_default(),
        attributes,
        receive_count: previous_receives.saturating_add(1),
    }
}
// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
pub struct KafkaManager {
    producer: Arc<KafkaProducer>,
    brokers: String,
    client_id: String,
}

/// KafkaManager 구현
impl KafkaManager {
    pub fn new(config: &BrokerConfig, region: &str) -> Result<Self, BrokerError> {
        let client_id = format!("auction-pipeline-{region}");
        let producer = Arc::new(KafkaProducer::new(&config.brokers, &client_id)?);

        Ok(KafkaManager {
            producer,
            brokers: config.brokers.clone(),
            client_id,
        })
    }

    /// 프로듀서 반환
    pub fn get_producer(&self) -> Arc<KafkaProducer> {
        Arc::clone(&self.producer)
    }

    /// 컨슈머 생성 (워커마다 별도 그룹)
    pub fn consumer(&self, group_id: &str, topic: &str) -> Result<KafkaConsumer, BrokerError> {
        KafkaConsumer::new(&self.brokers, group_id, &self.client_id, topic)
    }

    /// 토픽, 큐, DLQ 토픽이 없으면 생성
    pub async fn ensure_topology(&self, config: &BrokerConfig) -> Result<(), BrokerError> {
        for topic in [&config.topic, &config.stock_queue, &config.dead_letter_queue] {
            self.create_topic(topic, 5, 1).await?;
        }
        Ok(())
    }

    /// 토픽 생성
    pub async fn create_topic(
        &self,
        topic_name: &str,
        num_partitions: i32,
        replication_factor: i32,
    ) -> Result<(), BrokerError> {
        info!("{:<12} --> Kafka 토픽 생성 시작: {}", "Manager", topic_name);

        let admin_client: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()?;

        let new_topic = NewTopic::new(
            topic_name,
            num_partitions,
            TopicReplication::Fixed(replication_factor),
        );

        let results = admin_client
            .create_topics(&[new_topic], &AdminOptions::new())
            .await?;

        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> Kafka 토픽 생성 성공: {}", "Manager", name),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("{:<12} --> Kafka 토픽 이미 존재: {}", "Manager", name)
                }
                Err((name, code)) => {
                    error!(
                        "{:<12} --> Kafka 토픽 생성 실패: {} ({:?})",
                        "Manager", name, code
                    );
                    return Err(BrokerError::Provision {
                        topic: name,
                        reason: format!("{code:?}"),
                    });
                }
            }
        }
        Ok(())
    }
}
// endregion: --- Kafka Manager
