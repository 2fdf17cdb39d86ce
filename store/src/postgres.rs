//! PostgreSQL rate store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use ratefeed_common::{CurrencyCode, RateObservation, Timestamp};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info, instrument};

use crate::error::{StoreError, StoreResult};
use crate::store::RateStore;

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS currency_rates (
    currency_code VARCHAR(3) NOT NULL,
    observed_at TIMESTAMPTZ NOT NULL,
    rate NUMERIC(19, 4) NOT NULL,
    PRIMARY KEY (currency_code, observed_at)
)";

type RateRow = (String, Decimal, Timestamp);

/// Rate store persisted in the `currency_rates` table.
pub struct PgRateStore {
    pool: PgPool,
}

impl PgRateStore {
    /// Connect a new pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table if it does not exist.
    #[instrument(skip(self))]
    pub async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!("Rate store schema ready");
        Ok(())
    }

    fn to_observation((code, rate, observed_at): RateRow) -> StoreResult<RateObservation> {
        let currency = CurrencyCode::parse(&code)
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?;
        Ok(RateObservation::new(currency, rate, observed_at))
    }
}

#[async_trait]
impl RateStore for PgRateStore {
    async fn save(&self, observation: &RateObservation) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO currency_rates (currency_code, observed_at, rate) VALUES ($1, $2, $3) \
             ON CONFLICT (currency_code, observed_at) DO NOTHING",
        )
        .bind(observation.currency.as_str())
        .bind(observation.observed_at)
        .bind(observation.rate)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_all(
        &self,
        observations: &[RateObservation],
    ) -> StoreResult<Vec<RateObservation>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }

        // One multi-row statement, so the batch lands or fails as a whole.
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO currency_rates (currency_code, observed_at, rate) ");
        builder.push_values(observations, |mut row, observation| {
            row.push_bind(observation.currency.to_string())
                .push_bind(observation.observed_at)
                .push_bind(observation.rate);
        });
        builder.push(
            " ON CONFLICT (currency_code, observed_at) DO NOTHING \
             RETURNING currency_code, rate, observed_at",
        );

        let rows: Vec<RateRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        let written = rows
            .into_iter()
            .map(Self::to_observation)
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(
            submitted = observations.len(),
            written = written.len(),
            "Saved observation batch"
        );
        Ok(written)
    }

    async fn latest_for(&self, code: &CurrencyCode) -> StoreResult<Option<RateObservation>> {
        let row: Option<RateRow> = sqlx::query_as(
            "SELECT currency_code, rate, observed_at FROM currency_rates \
             WHERE currency_code = $1 ORDER BY observed_at DESC LIMIT 1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::to_observation).transpose()
    }

    async fn all_for(&self, code: &CurrencyCode) -> StoreResult<Vec<RateObservation>> {
        let rows: Vec<RateRow> = sqlx::query_as(
            "SELECT currency_code, rate, observed_at FROM currency_rates \
             WHERE currency_code = $1 ORDER BY observed_at DESC",
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::to_observation).collect()
    }

    async fn all_distinct_codes(&self) -> StoreResult<BTreeSet<CurrencyCode>> {
        let codes: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT currency_code FROM currency_rates")
                .fetch_all(&self.pool)
                .await?;

        codes
            .iter()
            .map(|code| {
                CurrencyCode::parse(code).map_err(|e| StoreError::InvalidRow(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_mapping() {
        let at = Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap();
        let obs = PgRateStore::to_observation(("eur".to_string(), dec!(0.91234), at)).unwrap();

        assert_eq!(obs.currency, CurrencyCode::eur());
        assert_eq!(obs.rate, dec!(0.9123));
        assert_eq!(obs.observed_at, at);
    }

    #[test]
    fn test_row_mapping_rejects_bad_code() {
        let at = Utc.with_ymd_and_hms(2024, 7, 31, 12, 0, 0).unwrap();
        let result = PgRateStore::to_observation(("E1".to_string(), dec!(1), at));

        assert!(matches!(result, Err(StoreError::InvalidRow(_))));
    }
}
