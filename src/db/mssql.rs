//! SQL Server-backed implementation of [`super::SqlExecutor`] and
//! [`super::MetadataReader`], built on `tiberius`.
//!
//! `tiberius` has no synchronous API, and the rest of the pipeline is
//! written as plain blocking calls (one table, one connection, one query at
//! a time). Rather than colour every caller `async`, each call drives a
//! dedicated current-thread Tokio runtime to completion, the same shape the
//! ecosystem's blocking SQL client wrappers use internally.

use std::time::Duration;

use futures_util::TryStreamExt;
use tiberius::{AuthMethod, Client, Config as TiberiusConfig, EncryptionLevel, QueryItem};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::SourceConfig;
use crate::error::{AuditError, Result};
use crate::quoting::quote_qualified;
use crate::value::SqlValue;

use super::{ColumnInfo, MetadataReader, Row, SqlExecutor, TableRef};

type TiberiusClient = Client<Compat<TcpStream>>;

/// A connection to one SQL Server source, plus the runtime used to drive it.
pub struct MssqlExecutor {
    runtime: Runtime,
    client: TiberiusClient,
    query_timeout: Duration,
}

impl MssqlExecutor {
    pub fn connect(source: &SourceConfig, query_timeout_seconds: u64) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AuditError::Connection {
                source_name: source.name.clone(),
                message: format!("could not start async runtime: {e}"),
            })?;

        let mut config = TiberiusConfig::new();
        config.host(&source.host);
        config.port(source.port);
        config.database(&source.database);
        config.authentication(AuthMethod::sql_server(&source.user, &source.password));
        if source.trust_cert {
            config.trust_cert();
        } else {
            config.encryption(EncryptionLevel::Required);
        }

        let client = runtime
            .block_on(async {
                let tcp = TcpStream::connect(config.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(config, tcp.compat_write()).await
            })
            .map_err(|e| AuditError::Connection {
                source_name: source.name.clone(),
                message: e.to_string(),
            })?;

        Ok(MssqlExecutor {
            runtime,
            client,
            query_timeout: Duration::from_secs(query_timeout_seconds),
        })
    }

    fn run_query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let timeout = self.query_timeout;
        let client = &mut self.client;
        self.runtime.block_on(async move {
            let fut = async {
                let mut stream = client.simple_query(sql).await?;
                let mut rows = Vec::new();
                while let Some(item) = stream.try_next().await? {
                    if let QueryItem::Row(row) = item {
                        rows.push(row_to_row(&row));
                    }
                }
                Ok::<_, tiberius::error::Error>(rows)
            };
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result.map_err(|e| AuditError::Measurement(e.to_string())),
                Err(_) => Err(AuditError::Measurement(format!(
                    "query timed out after {}s: {sql}",
                    timeout.as_secs()
                ))),
            }
        })
    }
}

impl SqlExecutor for MssqlExecutor {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.run_query(sql)
    }

    fn fetch_value(&mut self, sql: &str) -> Result<SqlValue> {
        let rows = self.run_query(sql)?;
        Ok(rows
            .into_iter()
            .next()
            .map(|r| r.get(0).clone())
            .unwrap_or(SqlValue::Null))
    }
}

impl MetadataReader for MssqlExecutor {
    fn list_tables(&mut self) -> Result<Vec<TableRef>> {
        let sql = "SELECT s.name, t.name FROM sys.tables t \
                    JOIN sys.schemas s ON s.schema_id = t.schema_id \
                    ORDER BY s.name, t.name";
        let rows = self.run_query(sql)?;
        Ok(rows
            .into_iter()
            .map(|r| TableRef {
                schema: r.get(0).to_string(),
                table: r.get(1).to_string(),
            })
            .collect())
    }

    fn list_columns(&mut self, table: &TableRef) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            "SELECT c.name, ty.name, c.is_nullable, c.column_id \
             FROM sys.columns c \
             JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
             JOIN sys.tables t ON t.object_id = c.object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             WHERE s.name = '{}' AND t.name = '{}' \
             ORDER BY c.column_id",
            table.schema.replace('\'', "''"),
            table.table.replace('\'', "''"),
        );
        let rows = self.run_query(&sql).map_err(|e| AuditError::Metadata {
            schema: table.schema.clone(),
            table: table.table.clone(),
            message: e.to_string(),
        })?;
        Ok(rows
            .into_iter()
            .map(|r| ColumnInfo {
                name: r.get(0).to_string(),
                sql_type: r.get(1).to_string(),
                is_nullable: matches!(r.get(2), SqlValue::Int(1)),
                ordinal_position: match r.get(3) {
                    SqlValue::Int(i) => *i as u32,
                    _ => 0,
                },
            })
            .collect())
    }

    fn row_count(&mut self, table: &TableRef) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT_BIG(*) FROM {}",
            quote_qualified(&table.schema, &table.table)
        );
        match self.fetch_value(&sql)? {
            SqlValue::Int(i) => Ok(i.max(0) as u64),
            _ => Ok(0),
        }
    }
}

fn row_to_row(row: &tiberius::Row) -> Row {
    let values = (0..row.len()).map(|i| column_value(row, i)).collect();
    Row(values)
}

fn column_value(row: &tiberius::Row, i: usize) -> SqlValue {
    if let Ok(Some(v)) = row.try_get::<i64, _>(i) {
        return SqlValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(i) {
        return SqlValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<i16, _>(i) {
        return SqlValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<u8, _>(i) {
        return SqlValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<bool, _>(i) {
        return SqlValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(i) {
        return SqlValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<f32, _>(i) {
        return SqlValue::Float(v as f64);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(i) {
        return SqlValue::Text(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<&[u8], _>(i) {
        return SqlValue::Bytes(v.to_vec());
    }
    if let Ok(Some(v)) = row.try_get::<chrono::NaiveDateTime, _>(i) {
        return SqlValue::DateTime(v);
    }
    SqlValue::Null
}
