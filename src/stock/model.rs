use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// auctionType 속성 이름
pub const AUCTION_TYPE_ATTRIBUTE: &str = "auctionType";

const MARKET_VALUE_FIELD: &str = "marketValue";
const MINIMUM_PRICE_FIELD: &str = "minimumPrice";

// 경매 유형
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionType {
    Public,
    Private,
    Online,
}

impl AuctionType {
    pub const ALL: [AuctionType; 3] = [Self::Public, Self::Private, Self::Online];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "Public",
            Self::Private => "Private",
            Self::Online => "Online",
        }
    }
}

impl FromStr for AuctionType {
    type Err = String;

    // 브로커 필터와 같이 대소문자를 구분한다
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|auction_type| auction_type.as_str() == value)
            .ok_or_else(|| format!("unknown auction type {value:?}"))
    }
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 신규 재고 상품 이벤트
// id 외의 필드(title, description, marketValue, minimumPrice 포함)는
// 해석하지 않고 null까지 그대로 보존한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockItemEvent {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl StockItemEvent {
    /// marketValue, minimumPrice 둘 다 숫자일 때만 Some
    pub fn prices(&self) -> Option<(f64, f64)> {
        let market_value = self.fields.get(MARKET_VALUE_FIELD)?.as_f64()?;
        let minimum_price = self.fields.get(MINIMUM_PRICE_FIELD)?.as_f64()?;
        Some((market_value, minimum_price))
    }
}

// 저장되는 재고 상품
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedStockItem {
    #[serde(flatten)]
    pub item: StockItemEvent,
    #[serde(rename = "auctionType")]
    pub auction_type: AuctionType,
}

impl PersistedStockItem {
    /// 본문에 auctionType이 있더라도 속성 값으로 대체한다
    pub fn new(mut item: StockItemEvent, auction_type: AuctionType) -> Self {
        item.fields.remove(AUCTION_TYPE_ATTRIBUTE);
        Self { item, auction_type }
    }
}
