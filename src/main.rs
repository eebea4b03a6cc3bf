// region:    --- Imports
use auction_pipeline::bidding::BidIngestHandler;
use auction_pipeline::config::{PipelineConfig, StoreBackend};
use auction_pipeline::database::{DurableStore, InMemoryStore, PostgresStore};
use auction_pipeline::dead_letter::DeadLetterLogger;
use auction_pipeline::handlers::{self, ApiState};
use auction_pipeline::message_broker::topology::{FilterPolicy, RedrivePolicy};
use auction_pipeline::message_broker::workers::{
    BidSubscriptionWorker, DeadLetterWorker, StockBatchProcessor, StockQueueWorker,
    SubscriptionForwarder, PUBLISH_RETRY_DELAY,
};
use auction_pipeline::message_broker::{KafkaManager, TopicPublisher};
use auction_pipeline::stock::StockIngestHandler;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
// endregion: --- Imports

// 워커별 컨슈머 그룹
const STOCK_SUBSCRIPTION_GROUP: &str = "stock-subscription";
const BID_SUBSCRIPTION_GROUP: &str = "bid-subscription";
const STOCK_INGEST_GROUP: &str = "stock-ingest";
const DEAD_LETTER_GROUP: &str = "dead-letter-logger";

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드 (필수 항목 누락 시 시작 실패)
    let config = match PipelineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{:<12} --> 설정 오류: {}", "Main", e);
            return Err(e.into());
        }
    };
    info!(
        "{:<12} --> 설정 로드 완료: stock={}, bids={}, region={}",
        "Main", config.stock_table, config.bids_table, config.region
    );

    // 저장소 생성 (프로세스당 하나, 모든 핸들러가 공유)
    let store: Arc<dyn DurableStore> = match &config.store {
        StoreBackend::Postgres { database_url } => {
            let store = PostgresStore::connect(database_url, &config.region).await?;
            for table in [&config.stock_table, &config.bids_table] {
                if let Err(e) = store.ensure_table(table).await {
                    error!("{:<12} --> 테이블 초기화 실패: {:?}", "Main", e);
                    return Err(e.into());
                }
            }
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("{:<12} --> 메모리 저장소 사용", "Main");
            Arc::new(InMemoryStore::new())
        }
    };
    info!("{:<12} --> 저장소 초기화 성공", "Main");

    // Kafka 매니저 생성 및 토폴로지 준비
    let kafka_manager = KafkaManager::new(&config.broker, &config.region)?;
    if let Err(e) = kafka_manager.ensure_topology(&config.broker).await {
        error!("{:<12} --> Kafka 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> Kafka 초기화 성공", "Main");
    let publisher: Arc<dyn TopicPublisher> = kafka_manager.get_producer();

    // 토픽 -> 필터 -> 재고 큐
    let forwarder = SubscriptionForwarder {
        consumer: kafka_manager.consumer(STOCK_SUBSCRIPTION_GROUP, &config.broker.topic)?,
        publisher: Arc::clone(&publisher),
        filter: FilterPolicy::auction_types(),
        queue: config.broker.stock_queue.clone(),
    };
    tokio::spawn(forwarder.run());

    // 재고 큐 -> StockIngestHandler (실패 시 재전달/DLQ)
    let stock_worker = StockQueueWorker {
        consumer: kafka_manager.consumer(STOCK_INGEST_GROUP, &config.broker.stock_queue)?,
        processor: StockBatchProcessor {
            publisher: Arc::clone(&publisher),
            handler: StockIngestHandler::new(Arc::clone(&store), &config),
            redrive: RedrivePolicy::new(config.max_receive_count),
            timeout: config.handler_timeout,
            queue: config.broker.stock_queue.clone(),
            dead_letter_queue: config.broker.dead_letter_queue.clone(),
            retry_delay: PUBLISH_RETRY_DELAY,
        },
        batch: config.stock_batch,
    };
    tokio::spawn(stock_worker.run());

    // DLQ -> DeadLetterLogger
    let dead_letter_worker = DeadLetterWorker {
        consumer: kafka_manager.consumer(DEAD_LETTER_GROUP, &config.broker.dead_letter_queue)?,
        logger: DeadLetterLogger::new(),
    };
    tokio::spawn(dead_letter_worker.run());

    // 토픽 -> BidIngestHandler (필터 없음)
    let bid_worker = BidSubscriptionWorker {
        consumer: kafka_manager.consumer(BID_SUBSCRIPTION_GROUP, &config.broker.topic)?,
        handler: BidIngestHandler::new(Arc::clone(&store), &config),
        max_attempts: config.bid_max_delivery_attempts,
        timeout: config.handler_timeout,
    };
    tokio::spawn(bid_worker.run());

    // 발행 API
    let routes_all = handlers::routes(ApiState {
        publisher,
        topic: config.broker.topic.clone(),
    });

    let listener = TcpListener::bind(&config.http_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
