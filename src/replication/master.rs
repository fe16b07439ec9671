//! Change Master
//!
//! Points the local replica at a new primary: connect to the candidate,
//! read its binlog position, then issue `CHANGE MASTER TO` and start the
//! replica.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::{DatabaseInterface, MariaDbExecutor};
use crate::error::{Error, Result};

/// Credentials for a candidate primary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCredentials {
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl MasterCredentials {
    /// Copy with every string field escaped for SQL
    pub fn escaped(&self, db: &dyn DatabaseInterface) -> Self {
        Self {
            user: db.escape_string(&self.user),
            password: db.escape_string(&self.password),
            host: db.escape_string(&self.host),
            port: self.port,
        }
    }
}

/// Binlog coordinates read from a primary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinlogPosition {
    pub file: String,
    pub position: u64,
}

/// Opens connections to candidate primaries
#[async_trait]
pub trait MasterConnector: Send + Sync {
    async fn connect(&self, credentials: &MasterCredentials) -> Result<Box<dyn DatabaseInterface>>;
}

/// Connects with sqlx
pub struct MariaDbConnector {
    timeout: Duration,
}

impl MariaDbConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl MasterConnector for MariaDbConnector {
    async fn connect(&self, credentials: &MasterCredentials) -> Result<Box<dyn DatabaseInterface>> {
        let executor = MariaDbExecutor::connect_to(
            &credentials.host,
            credentials.port,
            &credentials.user,
            &credentials.password,
            self.timeout,
        )
        .await?;
        Ok(Box::new(executor))
    }
}

/// What a change-master attempt achieved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeMasterOutcome {
    pub host: String,
    pub position: BinlogPosition,
    /// Whether START SLAVE after the change went through
    pub started: bool,
}

impl ChangeMasterOutcome {
    pub fn message(&self) -> String {
        format!("Master server changed successfully to {}.", self.host)
    }
}

/// User-facing text for a change-master failure
pub fn failure_message(error: &Error, host: &str) -> String {
    match error {
        Error::Disabled(_) => "Connection to server is disabled, please enable \
             allow_arbitrary_server in the configuration."
            .to_string(),
        Error::ConnectFailed { .. } => format!("Unable to connect to master {}.", host),
        Error::PositionUnreadable(_) => {
            "Unable to read master log position. Possible privilege problem on master.".to_string()
        }
        Error::ChangeMasterFailed(_) => "Unable to change master!".to_string(),
        other => other.to_string(),
    }
}

/// Read the current binlog coordinates of a primary
pub async fn read_master_position(db: &dyn DatabaseInterface) -> Result<BinlogPosition> {
    let row = db
        .fetch_first("SHOW MASTER STATUS")
        .await
        .map_err(|e| Error::PositionUnreadable(e.to_string()))?
        .ok_or_else(|| Error::PositionUnreadable("SHOW MASTER STATUS returned no row".into()))?;

    let file = row
        .get("File")
        .filter(|f| !f.is_empty())
        .ok_or_else(|| Error::PositionUnreadable("no binlog file".into()))?;
    let position = row
        .get("Position")
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| Error::PositionUnreadable("no binlog position".into()))?;

    Ok(BinlogPosition {
        file: file.to_string(),
        position,
    })
}

/// Build the CHANGE MASTER statement. Credentials and the log file name must
/// already be escaped.
pub fn change_master_statement(credentials: &MasterCredentials, position: &BinlogPosition) -> String {
    format!(
        "CHANGE MASTER TO MASTER_HOST='{}',MASTER_PORT={},MASTER_USER='{}',\
         MASTER_PASSWORD='{}',MASTER_LOG_FILE='{}',MASTER_LOG_POS={}",
        credentials.host,
        credentials.port,
        credentials.user,
        credentials.password,
        position.file,
        position.position
    )
}

/// Negotiates a new primary for the local replica
pub struct MasterNegotiator<'a> {
    local: &'a dyn DatabaseInterface,
    connector: &'a dyn MasterConnector,
    allow_arbitrary_server: bool,
}

impl<'a> MasterNegotiator<'a> {
    pub fn new(
        local: &'a dyn DatabaseInterface,
        connector: &'a dyn MasterConnector,
        allow_arbitrary_server: bool,
    ) -> Self {
        Self {
            local,
            connector,
            allow_arbitrary_server,
        }
    }

    /// Check the candidate and return its position without changing anything
    pub async fn probe(&self, credentials: &MasterCredentials) -> Result<BinlogPosition> {
        if !self.allow_arbitrary_server {
            return Err(Error::Disabled("allow_arbitrary_server is off".into()));
        }

        tracing::info!(
            "Connecting to candidate master {}:{} as {}",
            credentials.host,
            credentials.port,
            credentials.user
        );
        let remote = self.connector.connect(credentials).await.map_err(|e| match e {
            Error::ConnectFailed { .. } => e,
            other => Error::ConnectFailed {
                host: credentials.host.clone(),
                reason: other.to_string(),
            },
        })?;

        let position = read_master_position(remote.as_ref()).await;
        remote.close().await;
        position
    }

    /// Point the local replica at the candidate and start it
    pub async fn change_master(&self, credentials: &MasterCredentials) -> Result<ChangeMasterOutcome> {
        let position = self.probe(credentials).await?;
        tracing::info!(
            "Candidate master {} is at {}:{}",
            credentials.host,
            position.file,
            position.position
        );

        let escaped = credentials.escaped(self.local);
        let escaped_position = BinlogPosition {
            file: self.local.escape_string(&position.file),
            position: position.position,
        };
        let sql = change_master_statement(&escaped, &escaped_position);
        self.local
            .execute(&sql)
            .await
            .map_err(|e| Error::ChangeMasterFailed(e.to_string()))?;

        let started = match self.local.execute("START SLAVE").await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Master changed but START SLAVE failed: {}", e);
                false
            }
        };

        Ok(ChangeMasterOutcome {
            host: credentials.host.clone(),
            position,
            started,
        })
    }
}
