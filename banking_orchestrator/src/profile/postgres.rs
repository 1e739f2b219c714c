//! Postgres-backed profile source

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::AnalysisError;
use crate::models::Transaction;
use crate::profile::ProfileSource;
use crate::Result;

pub struct PostgresProfileSource {
    pool: PgPool,
}

impl PostgresProfileSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a small pool and check it answers before handing it out.
    pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(|e| {
                AnalysisError::DataSource(format!("Failed to connect to profile database: {}", e))
            })?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        info!("Profile database connection test successful");

        Ok(Self { pool })
    }
}

#[async_trait]
impl ProfileSource for PostgresProfileSource {
    async fn fetch_income(&self, customer_id: &str) -> Result<Option<f64>> {
        let row = sqlx::query(
            r#"
            SELECT income::FLOAT8 AS income
            FROM transactions
            WHERE customer_id = $1
            ORDER BY ts DESC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<f64>, _>("income")?),
            None => Ok(None),
        }
    }

    async fn fetch_transactions(&self, customer_id: &str) -> Result<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT amount::FLOAT8 AS amount, description, ts
            FROM transactions
            WHERE customer_id = $1
            ORDER BY ts DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            // NULL is skipped; a column that will not decode is an error
            let timestamp: Option<DateTime<Utc>> = row.try_get("ts")?;
            let Some(timestamp) = timestamp else {
                warn!(customer_id = %customer_id, "Skipping transaction without timestamp");
                continue;
            };

            transactions.push(Transaction {
                amount: row.try_get::<Option<f64>, _>("amount")?.unwrap_or(0.0),
                description: row
                    .try_get::<Option<String>, _>("description")?
                    .unwrap_or_else(|| "N/A".to_string()),
                timestamp,
            });
        }

        Ok(transactions)
    }
}
