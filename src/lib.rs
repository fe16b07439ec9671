//! WolfRepl - MariaDB Replication Administration
//!
//! A small service for looking after a MariaDB server's built-in
//! replication: browse the binary log page by page, read primary and
//! replica status, and start, stop, reset or skip errors on the replica.
//!
//! # Architecture
//!
//! Every operation is a single request against the server through the
//! [`executor::DatabaseInterface`] trait. The replication engine itself
//! lives in the server; WolfRepl only issues the statements that drive it
//! and reports what happened.
//!
//! # Features
//!
//! - Paginated `SHOW BINLOG EVENTS` viewer with compact and full-query modes
//! - Primary/replica status tables with alert/ok classification
//! - Replica control (start, stop, reset, skip errors) with per-step outcomes
//! - Change master: verify a candidate primary and point the replica at it
//! - HTTP API and command-line control tool

pub mod config;
pub mod error;
pub mod executor;
pub mod binlog;
pub mod replication;
pub mod state;
pub mod api;
pub mod form;

pub use config::WolfReplConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfReplConfig;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::executor::{DatabaseInterface, MariaDbExecutor, Row};
    pub use crate::binlog::{BinlogPager, BinlogView};
    pub use crate::replication::{
        ControlAction, ControlOutcome, MasterNegotiator, ReplicaController, ReplicationInfo, Role,
    };
    pub use crate::state::SessionStore;
}
