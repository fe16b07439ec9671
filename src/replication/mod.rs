//! Replication Module
//!
//! Status reporting and control of the server's built-in replication.

pub mod status;
pub mod control;
pub mod master;

pub use status::{
    Predefined, ReplicationInfo, Role, StatusTable, StatusVariable, VariableStatus,
};
pub use control::{ControlAction, ControlOutcome, ReplicaController, ThreadScope};
pub use master::{
    ChangeMasterOutcome, MariaDbConnector, MasterConnector, MasterCredentials, MasterNegotiator,
};
