//! Replication Status
//!
//! Reads primary/replica status rows and classifies the known variables
//! for display.

use serde::{Deserialize, Serialize};

use crate::executor::{DatabaseInterface, Row};
use crate::error::{Error, Result};

/// Variables shown for a primary
pub const PRIMARY_VARIABLES: &[&str] = &["File", "Position", "Binlog_Do_DB", "Binlog_Ignore_DB"];

/// Variables shown for a replica
pub const REPLICA_VARIABLES: &[&str] = &[
    "Slave_IO_State",
    "Master_Host",
    "Master_User",
    "Master_Port",
    "Connect_Retry",
    "Master_Log_File",
    "Read_Master_Log_Pos",
    "Relay_Log_File",
    "Relay_Log_Pos",
    "Relay_Master_Log_File",
    "Slave_IO_Running",
    "Slave_SQL_Running",
    "Replicate_Do_DB",
    "Replicate_Ignore_DB",
    "Replicate_Do_Table",
    "Replicate_Ignore_Table",
    "Replicate_Wild_Do_Table",
    "Replicate_Wild_Ignore_Table",
    "Last_Errno",
    "Last_Error",
    "Skip_Counter",
    "Exec_Master_Log_Pos",
    "Relay_Log_Space",
    "Until_Condition",
    "Until_Log_File",
    "Until_Log_Pos",
    "Master_SSL_Allowed",
    "Master_SSL_CA_File",
    "Master_SSL_CA_Path",
    "Master_SSL_Cert",
    "Master_SSL_Cipher",
    "Master_SSL_Key",
    "Seconds_Behind_Master",
];

/// Replica values that mean something is wrong
const REPLICA_ALERTS: &[(&str, &str)] = &[("Slave_IO_Running", "No"), ("Slave_SQL_Running", "No")];

/// Replica values that mean all is fine
const REPLICA_OKS: &[(&str, &str)] = &[("Slave_IO_Running", "Yes"), ("Slave_SQL_Running", "Yes")];

/// Comma-separated filter lists, spaced out for display
const LIST_VARIABLES: &[&str] = &[
    "Replicate_Do_DB",
    "Replicate_Ignore_DB",
    "Replicate_Do_Table",
    "Replicate_Ignore_Table",
    "Replicate_Wild_Do_Table",
    "Replicate_Wild_Ignore_Table",
];

/// Which side of replication to report on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "master")]
    Primary,
    #[serde(alias = "slave")]
    Replica,
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "master" => Ok(Role::Primary),
            "replica" | "slave" => Ok(Role::Replica),
            other => Err(Error::invalid("type", format!("unknown role '{}'", other))),
        }
    }
}

/// Display classification of a status variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableStatus {
    Alert,
    Ok,
    Neutral,
}

/// One row of the status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusVariable {
    pub name: String,
    pub value: String,
    pub status: VariableStatus,
}

/// Suggested next action for a replica thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Start,
    Stop,
}

/// Control links offered for a replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaControls {
    pub io_running: bool,
    pub sql_running: bool,
    pub io_action: SuggestedAction,
    pub sql_action: SuggestedAction,
    pub full_action: SuggestedAction,
}

/// A replica connected to this primary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaHost {
    pub server_id: String,
    pub host: String,
    pub port: Option<u16>,
}

/// Preset choice for the user or host field of the add-replica-user form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Predefined {
    Any,
    Localhost,
    Userdefined,
}

/// Schemas that never take part in replication filters
const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "performance_schema", "mysql", "sys"];

pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// A submitted but empty user name means "any user"
pub fn predefined_username(username: Option<&str>) -> Option<Predefined> {
    match username {
        Some("") => Some(Predefined::Any),
        _ => None,
    }
}

/// Classify a submitted host name
pub fn predefined_hostname(hostname: Option<&str>) -> Option<Predefined> {
    let hostname = hostname?.to_lowercase();
    Some(match hostname.as_str() {
        "localhost" | "127.0.0.1" => Predefined::Localhost,
        "%" => Predefined::Any,
        _ => Predefined::Userdefined,
    })
}

/// Host part of `USER()`, unless it is the local machine
pub fn this_host(current_user: &str) -> Option<String> {
    let (_, host) = current_user.rsplit_once('@')?;
    let host = host.replace('\'', "");
    match host.as_str() {
        "" | "localhost" | "127.0.0.1" => None,
        _ => Some(host),
    }
}

/// Status table for one role
#[derive(Debug, Clone, Serialize)]
pub struct StatusTable {
    pub role: Role,
    pub variables: Vec<StatusVariable>,
}

/// Classify a single variable's value
pub fn classify(role: Role, name: &str, value: &str) -> VariableStatus {
    if role == Role::Primary {
        return VariableStatus::Neutral;
    }
    if REPLICA_ALERTS.iter().any(|(n, v)| *n == name && *v == value) {
        VariableStatus::Alert
    } else if REPLICA_OKS.iter().any(|(n, v)| *n == name && *v == value) {
        VariableStatus::Ok
    } else {
        VariableStatus::Neutral
    }
}

/// Space out a comma-separated list for display
pub fn format_list(value: &str) -> String {
    value.replace(',', ", ")
}

/// Build the status table from an optional status row
pub fn reconcile(role: Role, row: Option<&Row>) -> StatusTable {
    let names = match role {
        Role::Primary => PRIMARY_VARIABLES,
        Role::Replica => REPLICA_VARIABLES,
    };

    let variables = names
        .iter()
        .map(|name| {
            let raw = row.and_then(|r| r.get(name)).unwrap_or("");
            let status = classify(role, name, raw);
            let value = if LIST_VARIABLES.contains(name) {
                format_list(raw)
            } else {
                raw.to_string()
            };
            StatusVariable {
                name: name.to_string(),
                value,
                status,
            }
        })
        .collect();

    StatusTable { role, variables }
}

/// Work out which control actions to offer for a replica
pub fn replica_controls(row: &Row) -> ReplicaControls {
    let io_running = row.get("Slave_IO_Running") != Some("No");
    let sql_running = row.get("Slave_SQL_Running") != Some("No");
    let action = |running: bool| {
        if running {
            SuggestedAction::Stop
        } else {
            SuggestedAction::Start
        }
    };

    ReplicaControls {
        io_running,
        sql_running,
        io_action: action(io_running),
        sql_action: action(sql_running),
        full_action: action(io_running && sql_running),
    }
}

/// Reads replication information from a server
pub struct ReplicationInfo<'a> {
    db: &'a dyn DatabaseInterface,
}

impl<'a> ReplicationInfo<'a> {
    pub fn new(db: &'a dyn DatabaseInterface) -> Self {
        Self { db }
    }

    /// Statement that fetches the status row for a role
    pub fn status_query(&self, role: Role, connection: Option<&str>) -> String {
        match (role, connection) {
            (Role::Primary, _) => "SHOW MASTER STATUS".to_string(),
            (Role::Replica, Some(conn)) if !conn.is_empty() => {
                format!("SHOW SLAVE '{}' STATUS", self.db.escape_string(conn))
            }
            (Role::Replica, _) => "SHOW SLAVE STATUS".to_string(),
        }
    }

    /// Raw status row for a role
    pub async fn status_row(&self, role: Role, connection: Option<&str>) -> Result<Option<Row>> {
        let sql = self.status_query(role, connection);
        self.db.fetch_first(&sql).await
    }

    /// Classified status table for a role
    pub async fn status_table(&self, role: Role, connection: Option<&str>) -> Result<StatusTable> {
        let row = self.status_row(role, connection).await?;
        Ok(reconcile(role, row.as_ref()))
    }

    /// Whether the server acts as primary and/or replica
    pub async fn server_roles(&self, connection: Option<&str>) -> Result<(bool, bool)> {
        let is_primary = self.status_row(Role::Primary, None).await?.is_some();
        let is_replica = self.status_row(Role::Replica, connection).await?.is_some();
        Ok((is_primary, is_replica))
    }

    /// Replicas registered with this primary
    pub async fn replica_hosts(&self) -> Result<Vec<ReplicaHost>> {
        let rows = self.db.query("SHOW SLAVE HOSTS").await?;
        Ok(rows
            .iter()
            .map(|row| ReplicaHost {
                server_id: row.get("Server_id").unwrap_or("").to_string(),
                host: row.get("Host").unwrap_or("").to_string(),
                port: row.get("Port").and_then(|p| p.parse().ok()),
            })
            .collect())
    }

    /// Named master connections (MariaDB multi-source). Servers without
    /// multi-source support report none.
    pub async fn master_connections(&self) -> Vec<String> {
        match self.db.fetch_column("SHOW ALL SLAVES STATUS", "Connection_name").await {
            Ok(names) => names,
            Err(e) => {
                tracing::debug!("Multi-source status unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Maximum user name and host name lengths accepted by mysql.user
    pub async fn user_host_lengths(&self) -> Result<(u32, u32)> {
        let rows = self.db.query("SHOW COLUMNS FROM `mysql`.`user`").await?;
        let mut username_length = 16;
        let mut hostname_length = 41;

        for row in &rows {
            let length = row.get("Type").and_then(column_length);
            match (row.get("Field"), length) {
                (Some("User"), Some(len)) => username_length = len,
                (Some("Host"), Some(len)) => hostname_length = len,
                _ => {}
            }
        }

        Ok((username_length, hostname_length))
    }

    /// Host this session connects from, as seen by the server
    pub async fn current_user_host(&self) -> Result<Option<String>> {
        let row = self.db.fetch_first("SELECT USER()").await?;
        Ok(row.and_then(|r| r.get("USER()").and_then(this_host)))
    }

    /// Databases that can be picked in the primary's replication filter
    pub async fn replicable_databases(&self) -> Result<Vec<String>> {
        let names = self.db.fetch_column("SHOW DATABASES", "Database").await?;
        Ok(names.into_iter().filter(|n| !is_system_schema(n)).collect())
    }
}

/// Parse the length out of a column type like `char(80)`
fn column_length(column_type: &str) -> Option<u32> {
    let start = column_type.find('(')? + 1;
    let end = start + column_type[start..].find(')')?;
    column_type[start..end].trim().parse().ok()
}
