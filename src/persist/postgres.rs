use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info, instrument, warn};

use crate::engine::types::{OrderIntent, OrderType, Side};
use crate::persist::types::{PersistError, PersistResult, TradeRecord};
use crate::persist::{HoldingsProvider, TradeExecutor};

/// Schema under `migrations/`, embedded at build time.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// `trades` table store. Balance and holdings are derived from the user's
/// rows on top of a fixed starting balance.
pub struct PostgresTradeStore {
    connection_pool: PgPool,
    user_id: String,
    starting_balance: Decimal,
}

impl PostgresTradeStore {
    pub async fn connect(database_url: &str, user_id: &str, starting_balance: Decimal) -> PersistResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        MIGRATOR.run(&pool).await?;
        info!(user_id, "Connected to trades database");
        Ok(Self {
            connection_pool: pool,
            user_id: user_id.to_string(),
            starting_balance,
        })
    }

    pub fn from_pool(pool: PgPool, user_id: &str, starting_balance: Decimal) -> Self {
        Self {
            connection_pool: pool,
            user_id: user_id.to_string(),
            starting_balance,
        }
    }
}

fn side_from_db(value: &str) -> PersistResult<Side> {
    match value {
        "buy" => Ok(Side::Buy),
        "sell" => Ok(Side::Sell),
        other => Err(PersistError::Serialization(format!("unknown trade type '{}'", other))),
    }
}

fn order_type_from_db(value: &str) -> PersistResult<OrderType> {
    match value {
        "market" => Ok(OrderType::Market),
        "limit" => Ok(OrderType::Limit),
        other => Err(PersistError::Serialization(format!("unknown order type '{}'", other))),
    }
}

fn record_from_row(row: &PgRow) -> PersistResult<TradeRecord> {
    let side: String = row.try_get("type")?;
    let order_type: String = row.try_get("order_type")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    Ok(TradeRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        asset_id: row.try_get("asset_id")?,
        symbol: row.try_get("symbol")?,
        name: row.try_get("name")?,
        side: side_from_db(&side)?,
        order_type: order_type_from_db(&order_type)?,
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        total: row.try_get("total")?,
        created_at,
    })
}

// Held until commit or rollback; one booking per user at a time
const LOCK_USER_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

const CASH_DELTA_SQL: &str = r#"
    SELECT COALESCE(SUM(CASE WHEN type = 'buy' THEN -total ELSE total END), 0) AS delta
    FROM trades
    WHERE user_id = $1
"#;

const OWNED_SQL: &str = r#"
    SELECT COALESCE(SUM(CASE WHEN type = 'buy' THEN quantity ELSE -quantity END), 0) AS owned
    FROM trades
    WHERE user_id = $1 AND asset_id = $2
"#;

#[async_trait]
impl TradeExecutor for PostgresTradeStore {
    #[instrument(skip(self, intent), fields(asset = %intent.instrument.id, side = ?intent.side))]
    async fn execute(&self, intent: &OrderIntent) -> PersistResult<TradeRecord> {
        let mut tx = self.connection_pool.begin().await?;
        // Balance/holdings checks below must see every earlier booking for this user
        sqlx::query(LOCK_USER_SQL).bind(&self.user_id).execute(&mut *tx).await?;

        match intent.side {
            Side::Buy => {
                let delta: Decimal = sqlx::query(CASH_DELTA_SQL)
                    .bind(&self.user_id)
                    .fetch_one(&mut *tx)
                    .await?
                    .try_get("delta")?;
                let cash = self.starting_balance + delta;
                if intent.notional_total > cash {
                    warn!(total = %intent.notional_total, cash = %cash, "Rejecting unfunded buy");
                    return Err(PersistError::InsufficientFunds {
                        needed: intent.notional_total,
                        available: cash,
                    });
                }
            }
            Side::Sell => {
                let owned: Decimal = sqlx::query(OWNED_SQL)
                    .bind(&self.user_id)
                    .bind(&intent.instrument.id)
                    .fetch_one(&mut *tx)
                    .await?
                    .try_get("owned")?;
                if intent.quantity > owned {
                    warn!(qty = %intent.quantity, owned = %owned, "Rejecting sell beyond holdings");
                    return Err(PersistError::InsufficientHoldings {
                        asset_id: intent.instrument.id.clone(),
                        needed: intent.quantity,
                        owned,
                    });
                }
            }
        }

        let row = sqlx::query(
            r#"
            INSERT INTO trades (user_id, asset_id, symbol, name, type, order_type, quantity, price, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id::text AS id, user_id, asset_id, symbol, name, type, order_type,
                      quantity, price, total, created_at
            "#,
        )
        .bind(&self.user_id)
        .bind(&intent.instrument.id)
        .bind(&intent.instrument.symbol)
        .bind(&intent.instrument.name)
        .bind(intent.side.as_str())
        .bind(intent.order_type.as_str())
        .bind(intent.quantity)
        .bind(intent.price)
        .bind(intent.notional_total)
        .fetch_one(&mut *tx)
        .await?;

        let record = record_from_row(&row)?;
        tx.commit().await?;
        debug!(id = %record.id, "Inserted trade");
        Ok(record)
    }
}

#[async_trait]
impl HoldingsProvider for PostgresTradeStore {
    async fn available_balance(&self) -> PersistResult<Decimal> {
        let delta: Decimal = sqlx::query(CASH_DELTA_SQL)
            .bind(&self.user_id)
            .fetch_one(&self.connection_pool)
            .await?
            .try_get("delta")?;
        Ok(self.starting_balance + delta)
    }

    async fn owned_quantity(&self, asset_id: &str) -> PersistResult<Decimal> {
        let owned: Decimal = sqlx::query(OWNED_SQL)
            .bind(&self.user_id)
            .bind(asset_id)
            .fetch_one(&self.connection_pool)
            .await?
            .try_get("owned")?;
        Ok(owned)
    }

    async fn trades(&self) -> PersistResult<Vec<TradeRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id::text AS id, user_id, asset_id, symbol, name, type, order_type,
                   quantity, price, total, created_at
            FROM trades
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(&self.user_id)
        .fetch_all(&self.connection_pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}
