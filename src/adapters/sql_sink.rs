use crate::core::pipeline::ChunkWriter;
use crate::domain::model::{Chunk, DatabaseDriver, EndpointDescriptor, FieldValue, Record};
use crate::domain::ports::RecordSink;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_identifier;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const POOL_SIZE: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// 依資料庫設定建立對應的 sink
pub async fn connect(target: &EndpointDescriptor) -> Result<Arc<dyn RecordSink>> {
    let params = target
        .database_params()
        .ok_or_else(|| EtlError::SinkUnavailableError {
            message: format!("{} is not a database endpoint", target),
        })?;

    let driver = DatabaseDriver::parse(&params.db_type).ok_or_else(|| EtlError::SinkUnavailableError {
        message: format!(
            "unsupported database type '{}' (expected sqlite or postgres)",
            params.db_type
        ),
    })?;
    let url = params.connection_url()?;

    tracing::info!("🔌 Connecting to {} table '{}'", driver, target.identifier());
    match driver {
        DatabaseDriver::Sqlite => Ok(Arc::new(SqliteSink::connect(&url, target.identifier()).await?)),
        DatabaseDriver::Postgres => Ok(Arc::new(PostgresSink::connect(&url, target.identifier()).await?)),
    }
}

fn unavailable(e: impl std::fmt::Display) -> EtlError {
    EtlError::SinkUnavailableError {
        message: e.to_string(),
    }
}

/// 連線類錯誤視為整體失敗，其餘 (約束違反等) 只影響該 chunk
fn classify(e: sqlx::Error) -> EtlError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Configuration(_)
        | sqlx::Error::WorkerCrashed => unavailable(e),
        other => EtlError::SinkWriteError {
            message: other.to_string(),
        },
    }
}

/// 對應目標表欄位的一列
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRow {
    pub id: i64,
    pub name: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<BigDecimal>,
}

impl SinkRow {
    pub fn from_record(record: &Record) -> Result<Self> {
        let write_error = |message: String| EtlError::SinkWriteError { message };

        let id = match record.get("id") {
            Some(FieldValue::Text(raw)) => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| write_error(format!("record id '{}' is not an integer", raw)))?,
            Some(FieldValue::Decimal(value)) => value
                .to_string()
                .parse::<i64>()
                .map_err(|_| write_error(format!("record id '{}' is not an integer", value)))?,
            _ => return Err(write_error("record has no id".to_string())),
        };

        let name = match record.get("name") {
            None | Some(FieldValue::Null) => None,
            Some(value) => Some(value.to_string()),
        };

        let date = match record.get("date") {
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Date(date)) => Some(*date),
            Some(other) => {
                let raw = other.to_string();
                Some(
                    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                        .map_err(|_| write_error(format!("record {} has invalid date '{}'", id, raw)))?,
                )
            }
        };

        let amount = match record.get("amount") {
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Decimal(amount)) => Some(amount.clone()),
            Some(other) => {
                let raw = other.to_string();
                Some(
                    BigDecimal::from_str(raw.trim())
                        .map_err(|_| write_error(format!("record {} has invalid amount '{}'", id, raw)))?,
                )
            }
        };

        Ok(Self {
            id,
            name,
            date,
            amount,
        })
    }
}

fn rows_from(records: &[Record]) -> Result<Vec<SinkRow>> {
    records.iter().map(SinkRow::from_record).collect()
}

/// 以 id 為鍵 upsert，每個 chunk 一個 transaction
pub struct SqliteSink {
    pool: SqlitePool,
    table: String,
}

impl SqliteSink {
    pub async fn connect(url: &str, table: &str) -> Result<Self> {
        // 表名不合法時不建立資料庫檔
        validate_identifier("table", table)?;
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        Self::from_pool(pool, table)
    }

    pub fn from_pool(pool: SqlitePool, table: &str) -> Result<Self> {
        validate_identifier("table", table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn ensure_schema(&self) -> Result<()> {
        // amount 存成文字以保留精確小數
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY,
                name TEXT,
                date DATE,
                amount TEXT
            )",
            self.table
        );
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn write(&self, records: &[Record]) -> Result<u64> {
        let rows = rows_from(records)?;
        let sql = format!(
            "INSERT INTO {} (id, name, date, amount) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                date = excluded.date,
                amount = excluded.amount",
            self.table
        );

        let mut tx = self.pool.begin().await.map_err(classify)?;
        let mut affected = 0;
        for row in &rows {
            let result = sqlx::query(&sql)
                .bind(row.id)
                .bind(row.name.as_deref())
                .bind(row.date)
                .bind(row.amount.as_ref().map(|amount| amount.to_string()))
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
            affected += result.rows_affected();
        }
        tx.commit().await.map_err(classify)?;

        Ok(affected)
    }
}

pub struct PostgresSink {
    pool: PgPool,
    table: String,
}

impl PostgresSink {
    pub async fn connect(url: &str, table: &str) -> Result<Self> {
        validate_identifier("table", table)?;
        let pool = PgPoolOptions::new()
            .max_connections(POOL_SIZE)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
            .map_err(unavailable)?;

        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn ensure_schema(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGINT PRIMARY KEY,
                name TEXT,
                date DATE,
                amount NUMERIC
            )",
            self.table
        );

        match sqlx::query(&sql).execute(&self.pool).await {
            Ok(_) => Ok(()),
            // 並行建立時另一個連線已經建好同名的表
            Err(sqlx::Error::Database(db))
                if matches!(db.code().as_deref(), Some("23505") | Some("42P07")) =>
            {
                tracing::debug!("Table {} was created concurrently", self.table);
                Ok(())
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    async fn write(&self, records: &[Record]) -> Result<u64> {
        let rows = rows_from(records)?;
        let sql = format!(
            "INSERT INTO {} (id, name, date, amount) VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                date = EXCLUDED.date,
                amount = EXCLUDED.amount",
            self.table
        );

        let mut tx = self.pool.begin().await.map_err(classify)?;
        let mut affected = 0;
        for row in &rows {
            let result = sqlx::query(&sql)
                .bind(row.id)
                .bind(row.name.as_deref())
                .bind(row.date)
                .bind(row.amount.clone())
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
            affected += result.rows_affected();
        }
        tx.commit().await.map_err(classify)?;

        Ok(affected)
    }
}

/// 把 sink 接到 chunk pipeline 上
pub struct DatabaseWriter {
    sink: Arc<dyn RecordSink>,
}

impl DatabaseWriter {
    pub fn new(sink: Arc<dyn RecordSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl ChunkWriter for DatabaseWriter {
    async fn write_chunk(&mut self, chunk: Chunk) -> Result<u64> {
        self.sink.write(&chunk.records).await
    }
}
