use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::sink::{Sink, TimeseriesRecord};

pub async fn new_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(4)
        .connect(database_url)
        .await
        .context("failed to connect to database")
}

/// Writes records into the `timeseries_records` table.
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Sink for PgSink {
    async fn write_batch(&self, records: &[TimeseriesRecord]) -> Result<()> {
        bulk_insert_records(&self.pool, records).await
    }
}

pub async fn bulk_insert_records(pool: &PgPool, records: &[TimeseriesRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let measurements: Vec<String> = records.iter().map(|r| r.measurement.clone()).collect();
    let tags: Vec<Value> = records
        .iter()
        .map(|r| serde_json::to_value(&r.tags))
        .collect::<Result<_, _>>()
        .context("failed to encode tags")?;
    let fields: Vec<Value> = records
        .iter()
        .map(|r| serde_json::to_value(&r.fields))
        .collect::<Result<_, _>>()
        .context("failed to encode fields")?;
    let recorded_ats: Vec<DateTime<Utc>> = records.iter().map(|r| r.timestamp).collect();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query(
        r#"
        INSERT INTO timeseries_records (measurement, tags, fields, recorded_at)
        SELECT * FROM UNNEST($1::TEXT[], $2::JSONB[], $3::JSONB[], $4::TIMESTAMPTZ[])
        "#,
    )
    .bind(&measurements)
    .bind(&tags)
    .bind(&fields)
    .bind(&recorded_ats)
    .execute(&mut *tx)
    .await
    .context("failed to execute bulk insert query")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(())
}
