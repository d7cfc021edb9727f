use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// One row of the versioned allocation ledger. The "current" ledger is the
// set of rows sharing the newest created_at; replacement writes a whole new
// set under one fresh timestamp and never touches older rows.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: uuid::Uuid,
    pub symbol: String,
    pub percent: BigDecimal,
    pub amount_usd: BigDecimal,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

// A ledger row before it is stamped and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPosition {
    pub symbol: String,
    pub percent: BigDecimal,
    pub amount_usd: BigDecimal,
}

impl NewPosition {
    pub fn zeroed(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            percent: BigDecimal::from(0),
            amount_usd: BigDecimal::from(0),
        }
    }
}

impl From<&Position> for NewPosition {
    fn from(p: &Position) -> Self {
        Self {
            symbol: p.symbol.clone(),
            percent: p.percent.clone(),
            amount_usd: p.amount_usd.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionRequest {
    pub symbol: String,
    pub percent: BigDecimal,
    pub amount_usd: BigDecimal,
}
