//! PostgreSQL store
//!
//! Layout: one raw table per vendor (`symbol`, `price`, `last_updated` in
//! unix seconds), the `tokens` and `fiats` output tables keyed by `symbol`,
//! `token_whitelist` / `fiat_whitelist` and `token_supply`.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use oracle_core::{
    AggregateKind, AggregatedPrice, PriceSample, PriceSource, StoreError, StoreResult, TokenQuote,
    Whitelist,
};

use crate::port::PriceStore;

fn db_error(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn whitelist_table(kind: AggregateKind) -> &'static str {
    match kind {
        AggregateKind::Token => "token_whitelist",
        AggregateKind::Fiat => "fiat_whitelist",
    }
}

fn samples_sql(source: PriceSource) -> String {
    format!("SELECT symbol, price, last_updated FROM {}", source.table())
}

fn whitelist_sql(kind: AggregateKind) -> String {
    format!("SELECT symbol FROM {} ORDER BY position, symbol", whitelist_table(kind))
}

fn select_prices_sql(kind: AggregateKind) -> String {
    format!(
        "SELECT symbol, price FROM {} WHERE symbol = ANY($1) ORDER BY symbol",
        kind.table()
    )
}

/// Native insert-or-update; no window between the existence check and the write.
fn upsert_sql(kind: AggregateKind) -> String {
    format!(
        "INSERT INTO {} (symbol, price) VALUES ($1, $2) \
         ON CONFLICT (symbol) DO UPDATE SET price = EXCLUDED.price",
        kind.table()
    )
}

const TOKEN_QUOTES_SQL: &str = r#"
    SELECT t.symbol, t.price, s.supply
    FROM tokens t
    LEFT JOIN token_supply s ON s.symbol = t.symbol
    WHERE t.symbol = ANY($1)
    ORDER BY t.symbol
"#;

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PriceStore for PgStore {
    async fn samples(&self, source: PriceSource) -> StoreResult<Vec<PriceSample>> {
        let rows = sqlx::query_as::<_, (String, f64, i64)>(&samples_sql(source))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|(symbol, price, observed_at)| PriceSample {
                symbol,
                price,
                observed_at,
                source,
            })
            .collect())
    }

    async fn whitelist(&self, kind: AggregateKind) -> StoreResult<Whitelist> {
        let symbols = sqlx::query_scalar::<_, String>(&whitelist_sql(kind))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(Whitelist::new(symbols))
    }

    async fn aggregated_prices(
        &self,
        kind: AggregateKind,
        symbols: &[String],
    ) -> StoreResult<Vec<AggregatedPrice>> {
        let rows = sqlx::query_as::<_, (String, f64)>(&select_prices_sql(kind))
            .bind(symbols)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|(symbol, price)| AggregatedPrice { symbol, price })
            .collect())
    }

    async fn token_quotes(&self, symbols: &[String]) -> StoreResult<Vec<TokenQuote>> {
        let rows = sqlx::query_as::<_, (String, f64, Option<f64>)>(TOKEN_QUOTES_SQL)
            .bind(symbols)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|(symbol, price, supply)| TokenQuote {
                symbol,
                price,
                supply,
            })
            .collect())
    }

    async fn upsert_prices(
        &self,
        kind: AggregateKind,
        prices: &[AggregatedPrice],
    ) -> StoreResult<usize> {
        let sql = upsert_sql(kind);
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        for price in prices {
            sqlx::query(&sql)
                .bind(&price.symbol)
                .bind(price.price)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(|e| StoreError::CommitFailed {
            kind,
            reason: e.to_string(),
        })?;

        debug!("Upserted {} {} prices", prices.len(), kind);
        Ok(prices.len())
    }
}
