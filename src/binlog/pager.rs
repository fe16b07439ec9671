//! Binlog Pager
//!
//! Turns page/position parameters into a `SHOW BINLOG EVENTS ... LIMIT`
//! query and computes previous/next/full-query link parameters.

use serde::{Deserialize, Serialize};

use crate::config::BinlogConfig;
use crate::executor::{DatabaseInterface, Row};
use crate::error::Result;
use crate::form;

/// Raw form fields accepted by the binlog page
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BinlogParams {
    pub log: Option<String>,
    pub pos: Option<String>,
    pub is_full_query: Option<String>,
}

/// A validated page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogPageRequest {
    /// Log to read; None reads the server's first log
    pub log: Option<String>,
    pub position: u64,
    pub page_size: u64,
    pub is_full_query: bool,
}

impl BinlogPageRequest {
    /// Build a request from form fields. A log name that is not in
    /// `known_logs` is dropped.
    pub fn from_params(params: &BinlogParams, known_logs: &[BinaryLog], page_size: u64) -> Self {
        let log = form::non_empty(params.log.as_deref())
            .filter(|name| known_logs.iter().any(|l| l.name == *name))
            .map(str::to_string);

        if log.is_none() && form::non_empty(params.log.as_deref()).is_some() {
            tracing::debug!("Ignoring unknown binary log {:?}", params.log);
        }

        Self {
            log,
            position: form::offset(params.pos.as_deref()),
            page_size,
            is_full_query: form::flag(params.is_full_query.as_deref()),
        }
    }
}

/// Query-string parameters for a link back into the binlog page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_full_query: bool,
}

/// Navigation around one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub has_previous: bool,
    pub has_next: bool,
    pub previous: UrlParams,
    pub full_queries: UrlParams,
    pub next: UrlParams,
}

/// A binary log file known to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryLog {
    pub name: String,
    pub size: Option<u64>,
}

/// Everything the binlog page displays
#[derive(Debug, Clone, Serialize)]
pub struct BinlogView {
    pub url_params: UrlParams,
    pub binary_logs: Vec<BinaryLog>,
    pub log: Option<String>,
    pub sql_query: String,
    pub values: Vec<Row>,
    pub has_previous: bool,
    pub has_next: bool,
    pub previous_params: UrlParams,
    pub full_queries_params: UrlParams,
    pub next_params: UrlParams,
    pub is_full_query: bool,
}

/// Build the events query. `log` must already be escaped.
pub fn build_query(log: Option<&str>, position: u64, page_size: u64) -> String {
    let mut sql = String::from("SHOW BINLOG EVENTS");
    if let Some(log) = log.filter(|l| !l.is_empty()) {
        sql.push_str(&format!(" IN '{}'", log));
    }
    sql.push_str(&format!(" LIMIT {}, {}", position, page_size));
    sql
}

/// Work out link parameters for a page. Row count at or above the page size
/// only suggests that more rows might exist.
pub fn navigation(base: &UrlParams, position: u64, page_size: u64, row_count: usize) -> Navigation {
    let has_previous = position > 0;
    let has_next = row_count as u64 >= page_size;

    let mut previous = base.clone();
    let prev_pos = position.saturating_sub(page_size);
    previous.pos = (prev_pos > 0).then_some(prev_pos);

    let mut full_queries = base.clone();
    full_queries.pos = has_previous.then_some(position);
    full_queries.is_full_query = !base.is_full_query;

    let mut next = base.clone();
    if has_next {
        next.pos = Some(position + page_size);
    }

    Navigation {
        has_previous,
        has_next,
        previous,
        full_queries,
        next,
    }
}

/// Shorten an event's Info text for the compact view
pub fn truncate_info(info: &str, limit: usize) -> String {
    if info.chars().count() <= limit {
        return info.to_string();
    }
    let mut out: String = info.chars().take(limit).collect();
    out.push_str("...");
    out
}

/// Binlog pager over a database connection
pub struct BinlogPager<'a> {
    db: &'a dyn DatabaseInterface,
    config: BinlogConfig,
}

impl<'a> BinlogPager<'a> {
    pub fn new(db: &'a dyn DatabaseInterface, config: BinlogConfig) -> Self {
        Self { db, config }
    }

    /// List binary logs known to the server
    pub async fn binary_logs(&self) -> Result<Vec<BinaryLog>> {
        let rows = self.db.query("SHOW MASTER LOGS").await?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                Some(BinaryLog {
                    name: row.get("Log_name")?.to_string(),
                    size: row.get("File_size").and_then(|s| s.parse().ok()),
                })
            })
            .collect())
    }

    /// Fetch one page of events
    pub async fn page(&self, params: &BinlogParams) -> Result<BinlogView> {
        let binary_logs = self.binary_logs().await?;
        let request = BinlogPageRequest::from_params(params, &binary_logs, self.config.max_rows);
        self.fetch(request, binary_logs, params.log.clone()).await
    }

    async fn fetch(
        &self,
        request: BinlogPageRequest,
        binary_logs: Vec<BinaryLog>,
        requested_log: Option<String>,
    ) -> Result<BinlogView> {
        let escaped = request.log.as_deref().map(|l| self.db.escape_string(l));
        let sql_query = build_query(escaped.as_deref(), request.position, request.page_size);

        tracing::debug!("Reading binlog page: {}", sql_query);
        let mut values = self.db.query(&sql_query).await?;

        if !request.is_full_query {
            for row in values.iter_mut() {
                let shortened = row.get("Info").map(|i| truncate_info(i, self.config.limit_chars));
                if let Some(info) = shortened {
                    row.set("Info", Some(info));
                }
            }
        }

        let url_params = UrlParams {
            log: request.log.clone(),
            pos: None,
            is_full_query: request.is_full_query,
        };
        let nav = navigation(&url_params, request.position, request.page_size, values.len());

        Ok(BinlogView {
            url_params,
            binary_logs,
            log: requested_log,
            sql_query,
            values,
            has_previous: nav.has_previous,
            has_next: nav.has_next,
            previous_params: nav.previous,
            full_queries_params: nav.full_queries,
            next_params: nav.next,
            is_full_query: request.is_full_query,
        })
    }
}
