//! State Module
//!
//! Request-spanning state: the per-user replication session.

mod session;

pub use session::{ActionMessage, ActionStatus, CachedMaster, ReplicationSession, SessionStore};
