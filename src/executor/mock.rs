//! Mock Executor
//!
//! Scripted in-memory database used by tests and dry runs. Responses are
//! matched by statement prefix; every statement is recorded in order.

use std::sync::Mutex;

use async_trait::async_trait;

use super::{DatabaseInterface, Row};
use crate::error::{Error, Result};

/// Scripted executor
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<Vec<(String, Vec<Row>)>>,
    failures: Mutex<Vec<String>>,
    statements: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `rows` for any statement starting with `prefix`
    pub fn with_rows(self, prefix: &str, rows: Vec<Row>) -> Self {
        lock(&self.responses).push((prefix.to_string(), rows));
        self
    }

    /// Fail any statement starting with `prefix`
    pub fn failing_on(self, prefix: &str) -> Self {
        lock(&self.failures).push(prefix.to_string());
        self
    }

    /// Every statement seen so far, in order
    pub fn statements(&self) -> Vec<String> {
        lock(&self.statements).clone()
    }

    fn record(&self, sql: &str) -> Result<()> {
        lock(&self.statements).push(sql.to_string());

        if lock(&self.failures).iter().any(|p| sql.starts_with(p.as_str())) {
            return Err(Error::QueryFailed {
                sql: sql.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DatabaseInterface for MockExecutor {
    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.record(sql)?;

        Ok(lock(&self.responses)
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.record(sql)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_and_fails() {
        let db = MockExecutor::new()
            .with_rows("SHOW SLAVE STATUS", vec![Row::from_pairs([("Slave_IO_Running", "Yes")])])
            .failing_on("RESET SLAVE");

        assert_eq!(db.query("SHOW SLAVE STATUS").await.unwrap().len(), 1);
        assert!(db.query("SHOW MASTER STATUS").await.unwrap().is_empty());
        assert!(db.execute("RESET SLAVE").await.is_err());
        assert_eq!(db.execute("STOP SLAVE").await.unwrap(), 0);

        assert_eq!(
            db.statements(),
            vec!["SHOW SLAVE STATUS", "SHOW MASTER STATUS", "RESET SLAVE", "STOP SLAVE"]
        );
    }
}
