//! MariaDB Executor
//!
//! Runs administrative statements against a MariaDB server through sqlx.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Executor, MySqlPool, Row as _};

use super::{DatabaseInterface, Row};
use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// MariaDB executor backed by a connection pool
pub struct MariaDbExecutor {
    pool: MySqlPool,
    /// host:port, for log messages
    address: String,
}

impl MariaDbExecutor {
    /// Connect using the configured server
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.connect_timeout())
            .connect_with(config.connect_options())
            .await?;

        Ok(Self {
            pool,
            address: format!("{}:{}", config.host, config.port),
        })
    }

    /// Open a single-connection pool to another server
    ///
    /// Used for the candidate master during "change master".
    pub async fn connect_to(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_with(candidate_options(host, port, user, password))
            .await
            .map_err(|e| Error::ConnectFailed {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pool,
            address: format!("{}:{}", host, port),
        })
    }

    /// Check if connection is healthy
    pub async fn health_check(&self) -> Result<bool> {
        let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(result.0 == 1)
    }

    /// Server address this executor talks to
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl DatabaseInterface for MariaDbExecutor {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        tracing::debug!("Query on {}: {}", self.address, preview(sql));

        // A bare &str runs over the text protocol, so every column decodes as bytes
        let rows = self.pool.fetch_all(sql).await.map_err(|e| Error::QueryFailed {
            sql: sql.to_string(),
            reason: e.to_string(),
        })?;

        rows.iter().map(|row| decode_row(row, sql)).collect()
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        tracing::debug!("Execute on {}: {}", self.address, preview(sql));

        let result = self.pool.execute(sql).await.map_err(|e| Error::QueryFailed {
            sql: sql.to_string(),
            reason: e.to_string(),
        })?;

        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connection options for a candidate master, taken verbatim from the form
fn candidate_options(host: &str, port: u16, user: &str, password: &str) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .password(password)
}

/// First 100 characters of a statement for logging
fn preview(sql: &str) -> String {
    sql.chars().take(100).collect()
}

fn decode_row(row: &MySqlRow, sql: &str) -> Result<Row> {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw: Option<Vec<u8>> = row.try_get_unchecked(i).map_err(|e| Error::QueryFailed {
            sql: sql.to_string(),
            reason: format!("cannot decode column {}: {}", column.name(), e),
        })?;
        out.push(
            column.name(),
            raw.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        );
    }
    Ok(out)
}


#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn test_config() -> DatabaseConfig {
        DatabaseConfig {
            host: std::env::var("WOLFREPL_TEST_HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: 3306,
            user: "root".into(),
            password: std::env::var("WOLFREPL_TEST_PASSWORD").unwrap_or_default(),
            database: None,
            pool_size: 2,
            connect_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_query_decodes_mixed_columns() {
        let executor = MariaDbExecutor::new(&test_config()).await.unwrap();
        assert!(executor.health_check().await.unwrap());

        let rows = executor.query("SELECT 1 AS n, 'x' AS s, NULL AS z").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("n"), Some("1"));
        assert_eq!(rows[0].get("s"), Some("x"));
        assert_eq!(rows[0].get("z"), None);
        executor.close().await;
    }
}
