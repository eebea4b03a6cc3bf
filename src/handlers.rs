/// 발행 API
/// 생산자가 재고 상품과 입찰을 토픽에 발행하는 HTTP 진입점
// region:    --- Imports
use crate::message::QueueDelivery;
use crate::message_broker::TopicPublisher;
use crate::stock::AUCTION_TYPE_ATTRIBUTE;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- State
#[derive(Clone)]
pub struct ApiState {
    pub publisher: Arc<dyn TopicPublisher>,
    pub topic: String,
}

#[derive(Debug, Deserialize)]
pub struct StockItemParams {
    #[serde(rename = "auctionType")]
    pub auction_type: Option<String>,
}
// endregion: --- State

// region:    --- Routes
/// 라우터 설정
pub fn routes(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/stock-items", post(handle_publish_stock_item))
        .route("/bids", post(handle_publish_bid))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}
// endregion: --- Routes

// region:    --- Handlers
/// 재고 상품 발행
/// auctionType은 본문이 아니라 메시지 속성으로 실린다.
pub async fn handle_publish_stock_item(
    State(state): State<ApiState>,
    Query(params): Query<StockItemParams>,
    Json(item): Json<Value>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 재고 상품 발행 요청: auctionType={:?}",
        "HandlerPublish", params.auction_type
    );
    let mut delivery = match new_delivery(&item) {
        Ok(delivery) => delivery,
        Err(response) => return response,
    };
    if let Some(auction_type) = params.auction_type {
        delivery = delivery.with_attribute(AUCTION_TYPE_ATTRIBUTE, auction_type);
    }
    publish(&state, delivery).await
}

/// 입찰 발행
pub async fn handle_publish_bid(
    State(state): State<ApiState>,
    Json(bid): Json<Value>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 발행 요청", "HandlerPublish");
    match new_delivery(&bid) {
        Ok(delivery) => publish(&state, delivery).await,
        Err(response) => response,
    }
}

pub async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn new_delivery(body: &Value) -> Result<QueueDelivery, axum::response::Response> {
    if !body.is_object() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "본문은 JSON 객체여야 합니다."})),
        )
            .into_response());
    }
    Ok(QueueDelivery::new(
        uuid::Uuid::new_v4().to_string(),
        body.to_string(),
    ))
}

async fn publish(state: &ApiState, delivery: QueueDelivery) -> axum::response::Response {
    match state.publisher.publish(&state.topic, &delivery).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"messageId": delivery.message_id})),
        )
            .into_response(),
        Err(e) => {
            error!("{:<12} --> 토픽 발행 실패: {:?}", "HandlerPublish", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({"error": e.to_string()})),
            )
                .into_response()
        }
    }
}
// endregion: --- Handlers
