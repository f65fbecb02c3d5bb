use std::str::FromStr;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use sqlx::{Pool, Postgres};
use st_domain::{ShipSymbol, Transaction, TransactionType, WaypointSymbol, YieldRecord, TradeGoodSymbol, TradeRecord};

/// Backs `TRANSACTIONS`, `TRADES` and `YIELDS`/`YIELD_SALES` — the append-only
/// logs the controllers write for reporting (`get_ship_trade_profit_since`,
/// `get_yield_since` in the source).
#[automock]
#[async_trait]
pub trait TradeBmcTrait: Send + Sync + std::fmt::Debug {
    async fn insert_transaction(&self, tx: Transaction) -> Result<()>;
    async fn insert_trade(&self, trade: TradeRecord) -> Result<()>;
    async fn insert_yield(&self, yield_record: YieldRecord) -> Result<()>;
    async fn get_yields_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<YieldRecord>>;
    async fn get_trades_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<TradeRecord>>;
}

#[derive(Debug)]
pub struct DbTradeBmc {
    pub pool: Pool<Postgres>,
}

#[async_trait]
impl TradeBmcTrait for DbTradeBmc {
    async fn insert_transaction(&self, tx: Transaction) -> Result<()> {
        sqlx::query(
            r#"insert into transactions
               (ship_symbol, waypoint_symbol, trade_symbol, transaction_type, units, price_per_unit, total_price, timestamp)
               values ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&tx.ship_symbol.0)
        .bind(&tx.waypoint_symbol.0)
        .bind(tx.trade_symbol.to_string())
        .bind(tx.transaction_type.to_string())
        .bind(tx.units)
        .bind(tx.price_per_unit)
        .bind(tx.total_price)
        .bind(tx.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_trade(&self, trade: TradeRecord) -> Result<()> {
        sqlx::query(
            r#"insert into trades (ship_symbol, trade_symbol, source, sink, units, net_profit, completed_at)
               values ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&trade.ship_symbol.0)
        .bind(trade.trade_symbol.to_string())
        .bind(&trade.source.0)
        .bind(&trade.sink.0)
        .bind(trade.units)
        .bind(trade.net_profit)
        .bind(trade.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_yield(&self, yield_record: YieldRecord) -> Result<()> {
        sqlx::query(
            r#"insert into yields (ship_symbol, waypoint_symbol, trade_symbol, units, observed_at)
               values ($1, $2, $3, $4, $5)"#,
        )
        .bind(&yield_record.ship_symbol.0)
        .bind(&yield_record.waypoint_symbol.0)
        .bind(yield_record.trade_symbol.to_string())
        .bind(yield_record.units)
        .bind(yield_record.observed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_yields_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<YieldRecord>> {
        let rows: Vec<(String, String, String, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"select ship_symbol, waypoint_symbol, trade_symbol, units, observed_at from yields
               where ship_symbol = $1 and observed_at >= $2 order by observed_at asc"#,
        )
        .bind(&ship_symbol.0)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(ship, wp, good, units, observed_at)| {
                Some(YieldRecord {
                    ship_symbol: ShipSymbol(ship),
                    waypoint_symbol: WaypointSymbol(wp),
                    trade_symbol: TradeGoodSymbol::from_str(&good).ok()?,
                    units,
                    observed_at,
                })
            })
            .collect())
    }

    async fn get_trades_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<TradeRecord>> {
        let rows: Vec<(String, String, String, String, i64, i64, DateTime<Utc>)> = sqlx::query_as(
            r#"select ship_symbol, trade_symbol, source, sink, units, net_profit, completed_at from trades
               where ship_symbol = $1 and completed_at >= $2 order by completed_at asc"#,
        )
        .bind(&ship_symbol.0)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(ship, good, source, sink, units, net_profit, completed_at)| {
                Some(TradeRecord {
                    ship_symbol: ShipSymbol(ship),
                    trade_symbol: TradeGoodSymbol::from_str(&good).ok()?,
                    source: WaypointSymbol(source),
                    sink: WaypointSymbol(sink),
                    units,
                    net_profit,
                    completed_at,
                })
            })
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTradeBmc {
    transactions: RwLock<Vec<Transaction>>,
    trades: RwLock<Vec<TradeRecord>>,
    yields: RwLock<Vec<YieldRecord>>,
}

#[async_trait]
impl TradeBmcTrait for InMemoryTradeBmc {
    async fn insert_transaction(&self, tx: Transaction) -> Result<()> {
        self.transactions.write().unwrap().push(tx);
        Ok(())
    }

    async fn insert_trade(&self, trade: TradeRecord) -> Result<()> {
        self.trades.write().unwrap().push(trade);
        Ok(())
    }

    async fn insert_yield(&self, yield_record: YieldRecord) -> Result<()> {
        self.yields.write().unwrap().push(yield_record);
        Ok(())
    }

    async fn get_yields_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<YieldRecord>> {
        Ok(self
            .yields
            .read()
            .unwrap()
            .iter()
            .filter(|y| &y.ship_symbol == ship_symbol && y.observed_at >= since)
            .cloned()
            .collect())
    }

    async fn get_trades_since(&self, ship_symbol: &ShipSymbol, since: DateTime<Utc>) -> Result<Vec<TradeRecord>> {
        Ok(self
            .trades
            .read()
            .unwrap()
            .iter()
            .filter(|t| &t.ship_symbol == ship_symbol && t.completed_at >= since)
            .cloned()
            .collect())
    }
}
