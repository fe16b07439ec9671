//! HTTP API Module
//!
//! Provides the REST API for binlog viewing and replication administration.

mod http;

pub use http::{AppState, HttpServer, SESSION_HEADER};
