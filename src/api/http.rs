//! HTTP API Server
//!
//! Binlog viewing, replication status and replica control over HTTP. Views
//! are returned as JSON documents for an external renderer.

use std::sync::Arc;

use axum::{
    extract::{Form, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::binlog::{BinlogParams, BinlogPager, BinlogView};
use crate::config::{BinlogConfig, ReplicationConfig, ServerConfig};
use crate::error::{Error, Result};
use crate::executor::DatabaseInterface;
use crate::form;
use crate::replication::master::failure_message;
use crate::replication::status::{self, replica_controls, ReplicaControls, ReplicaHost};
use crate::replication::{
    ControlAction, ControlOutcome, MasterConnector, MasterCredentials, MasterNegotiator,
    Predefined, ReplicaController, ReplicationInfo, Role, StatusTable,
};
use crate::state::{ActionMessage, CachedMaster, SessionStore};

/// Header carrying the caller's session id
pub const SESSION_HEADER: &str = "x-session-id";

/// Sessions idle longer than this are dropped
const SESSION_IDLE_HOURS: i64 = 24;

/// Shared application state
pub struct AppState {
    /// Local server connection
    pub db: Arc<dyn DatabaseInterface>,
    /// Opens connections to candidate masters
    pub connector: Arc<dyn MasterConnector>,
    /// Per-user replication sessions
    pub sessions: SessionStore,
    pub binlog: BinlogConfig,
    pub replication: ReplicationConfig,
}

/// HTTP API server
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the state for sharing with other components
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Create the router
    pub fn create_router(state: Arc<AppState>) -> Router {
        Router::new()
            .route("/health", get(handle_health))
            .route("/server/binlog", get(handle_binlog_get).post(handle_binlog_post))
            .route("/server/replication", get(handle_overview).post(handle_control))
            .route("/server/replication/status", get(handle_status))
            .route("/server/replication/change-master", get(handle_change_master_form))
            .route("/server/replication/add-user", get(handle_add_user_form))
            .route("/server/replication/master-config", get(handle_master_config))
            .with_state(state)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<()> {
        let mut app = Self::create_router(Arc::clone(&self.state)).layer(TraceLayer::new_for_http());
        if self.config.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }

        let listener = tokio::net::TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", self.config.bind_address);

        axum::serve(listener, app)
            .await
            .map_err(|e| Error::Internal(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Request/Response Types ============

/// Query fields for the replication pages
#[derive(Debug, Default, Deserialize)]
pub struct ReplicationQuery {
    #[serde(rename = "type")]
    pub role: Option<String>,
    pub master_connection: Option<String>,
}

/// Replication form fields
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ControlForm {
    pub sr_take_action: Option<String>,
    pub sr_slave_server_control: Option<String>,
    pub sr_slave_action: Option<String>,
    pub sr_slave_control_parm: Option<String>,
    pub sr_slave_skip_error: Option<String>,
    pub sr_skip_errors_count: Option<String>,
    pub slave_changemaster: Option<String>,
    pub username: Option<String>,
    pub pma_pw: Option<String>,
    pub hostname: Option<String>,
    pub text_port: Option<String>,
    pub master_connection: Option<String>,
}

/// JSON envelope for control actions
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<serde_json::Value>,
}

/// Primary side of the overview
#[derive(Debug, Serialize)]
pub struct PrimaryView {
    pub status: StatusTable,
    pub replicas: Vec<ReplicaHost>,
}

/// Replica side of the overview
#[derive(Debug, Serialize)]
pub struct ReplicaView {
    pub status: StatusTable,
    pub controls: ReplicaControls,
    pub master_connection: Option<String>,
    pub master_connections: Vec<String>,
}

/// Replication overview page
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub message: Option<ActionMessage>,
    pub is_primary: bool,
    pub is_replica: bool,
    pub primary: Option<PrimaryView>,
    pub replica: Option<ReplicaView>,
}

/// Change-master form metadata
#[derive(Debug, Serialize)]
pub struct ChangeMasterForm {
    pub server_id: i64,
    pub username_length: u32,
    pub hostname_length: u32,
    pub cached: Option<CachedMaster>,
}

/// Fields already entered in the add-replica-user form
#[derive(Debug, Default, Deserialize)]
pub struct AddUserQuery {
    pub username: Option<String>,
    pub hostname: Option<String>,
}

/// Add-replica-user form metadata
#[derive(Debug, Serialize)]
pub struct AddReplicaUserForm {
    pub username_length: u32,
    pub hostname_length: u32,
    pub has_username: bool,
    pub username: String,
    pub hostname: String,
    pub predefined_username: Option<Predefined>,
    pub predefined_hostname: Option<Predefined>,
    /// Host this session connects from, when it is not the local machine
    pub this_host: Option<String>,
}

/// Primary configuration page
#[derive(Debug, Serialize)]
pub struct MasterConfigResponse {
    pub databases: Vec<String>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            crate::error::ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            crate::error::ErrorKind::Disabled => StatusCode::FORBIDDEN,
            crate::error::ErrorKind::Connection | crate::error::ErrorKind::PositionUnreadable => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                code: kind.code().to_string(),
            }),
        )
            .into_response()
    }
}

// ============ Sessions ============

/// Session id from the request, or a fresh one
fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn with_session(session_id: &str, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

// ============ Handlers ============

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.db.query("SELECT 1").await.is_ok();
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(HealthResponse { healthy }))
}

async fn handle_binlog_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BinlogParams>,
) -> Result<Json<BinlogView>> {
    binlog_page(&state, params).await
}

async fn handle_binlog_post(
    State(state): State<Arc<AppState>>,
    Form(params): Form<BinlogParams>,
) -> Result<Json<BinlogView>> {
    binlog_page(&state, params).await
}

async fn binlog_page(state: &AppState, params: BinlogParams) -> Result<Json<BinlogView>> {
    let pager = BinlogPager::new(state.db.as_ref(), state.binlog.clone());
    Ok(Json(pager.page(&params).await?))
}

async fn handle_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReplicationQuery>,
) -> Result<Json<StatusTable>> {
    let role: Role = form::non_empty(query.role.as_deref())
        .ok_or_else(|| Error::invalid("type", "required"))?
        .parse()?;
    let info = ReplicationInfo::new(state.db.as_ref());
    let connection = form::non_empty(query.master_connection.as_deref());

    Ok(Json(info.status_table(role, connection).await?))
}

async fn handle_overview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ReplicationQuery>,
) -> Response {
    let session_id = session_id(&headers);
    let result = overview(&state, &session_id, &query).await;
    match result {
        Ok(view) => with_session(&session_id, Json(view)),
        Err(e) => with_session(&session_id, e),
    }
}

async fn overview(
    state: &AppState,
    session_id: &str,
    query: &ReplicationQuery,
) -> Result<OverviewResponse> {
    let info = ReplicationInfo::new(state.db.as_ref());
    let connection = form::non_empty(query.master_connection.as_deref());
    let message = state.sessions.take_action(session_id).await;

    let primary_row = info.status_row(Role::Primary, None).await?;
    let replica_row = info.status_row(Role::Replica, connection).await?;

    let primary = match &primary_row {
        Some(row) => Some(PrimaryView {
            status: status::reconcile(Role::Primary, Some(row)),
            replicas: info.replica_hosts().await?,
        }),
        None => None,
    };

    let replica = match &replica_row {
        Some(row) => Some(ReplicaView {
            status: status::reconcile(Role::Replica, Some(row)),
            controls: replica_controls(row),
            master_connection: connection.map(str::to_string),
            master_connections: info.master_connections().await,
        }),
        None => None,
    };

    Ok(OverviewResponse {
        message,
        is_primary: primary.is_some(),
        is_replica: replica.is_some(),
        primary,
        replica,
    })
}

async fn handle_change_master_form(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let session_id = session_id(&headers);
    let info = ReplicationInfo::new(state.db.as_ref());

    let response = match info.user_host_lengths().await {
        Ok((username_length, hostname_length)) => {
            let cached = state.sessions.get(&session_id).await.and_then(|s| s.master);
            Json(ChangeMasterForm {
                server_id: chrono::Utc::now().timestamp(),
                username_length,
                hostname_length,
                cached,
            })
            .into_response()
        }
        Err(e) => e.into_response(),
    };
    with_session(&session_id, response)
}

async fn handle_add_user_form(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AddUserQuery>,
) -> Result<Json<AddReplicaUserForm>> {
    let info = ReplicationInfo::new(state.db.as_ref());
    let (username_length, hostname_length) = info.user_host_lengths().await?;
    let this_host = info.current_user_host().await?;

    Ok(Json(AddReplicaUserForm {
        username_length,
        hostname_length,
        has_username: query.username.is_some(),
        username: query.username.clone().unwrap_or_default(),
        hostname: query.hostname.clone().unwrap_or_default(),
        predefined_username: status::predefined_username(query.username.as_deref()),
        predefined_hostname: status::predefined_hostname(query.hostname.as_deref()),
        this_host,
    }))
}

async fn handle_master_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MasterConfigResponse>> {
    let info = ReplicationInfo::new(state.db.as_ref());
    Ok(Json(MasterConfigResponse {
        databases: info.replicable_databases().await?,
    }))
}

async fn handle_control(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<ControlForm>,
) -> Response {
    let session_id = session_id(&headers);

    let cutoff = chrono::Utc::now() - chrono::Duration::hours(SESSION_IDLE_HOURS);
    let expired = state.sessions.expire_before(cutoff).await;
    if expired > 0 {
        tracing::debug!("Expired {} idle sessions", expired);
    }

    if !form::flag(form.sr_take_action.as_deref()) {
        return with_session(&session_id, Error::invalid("sr_take_action", "required"));
    }

    let response = if form::flag(form.slave_changemaster.as_deref()) {
        change_master(&state, &session_id, &form).await
    } else if form::flag(form.sr_slave_server_control.as_deref()) {
        let action = ControlAction::parse(
            form.sr_slave_action.as_deref().unwrap_or(""),
            form.sr_slave_control_parm.as_deref(),
        );
        match action {
            Ok(action) => control(&state, action).await,
            Err(e) => {
                tracing::warn!("Rejected replica control request: {}", e);
                ActionResponse {
                    success: false,
                    message: "Error.".to_string(),
                    outcome: None,
                }
            }
        }
    } else if form::flag(form.sr_slave_skip_error.as_deref()) {
        match ControlAction::skip_error(form.sr_skip_errors_count.as_deref()) {
            Ok(action) => control(&state, action).await,
            Err(e) => ActionResponse {
                success: false,
                message: e.to_string(),
                outcome: None,
            },
        }
    } else {
        return with_session(
            &session_id,
            Error::invalid("sr_take_action", "no action selected"),
        );
    };

    let message = if response.success {
        ActionMessage::success(response.message.clone())
    } else {
        ActionMessage::error(response.message.clone())
    };
    state.sessions.set_action(&session_id, message).await;

    with_session(&session_id, Json(response))
}

async fn control(state: &AppState, action: ControlAction) -> ActionResponse {
    let outcome: ControlOutcome = ReplicaController::new(state.db.as_ref()).run(action).await;
    ActionResponse {
        success: outcome.success,
        message: outcome.message(),
        outcome: serde_json::to_value(&outcome).ok(),
    }
}

async fn change_master(state: &AppState, session_id: &str, form: &ControlForm) -> ActionResponse {
    let host = form.hostname.clone().unwrap_or_default();

    let credentials = match parse_credentials(form) {
        Ok(c) => c,
        Err(e) => {
            return ActionResponse {
                success: false,
                message: e.to_string(),
                outcome: None,
            }
        }
    };

    if state.replication.allow_arbitrary_server {
        state.sessions.set_master(session_id, credentials.clone()).await;
    }

    let negotiator = MasterNegotiator::new(
        state.db.as_ref(),
        state.connector.as_ref(),
        state.replication.allow_arbitrary_server,
    );

    match negotiator.change_master(&credentials).await {
        Ok(outcome) => {
            state.sessions.mark_master_correct(session_id).await;
            ActionResponse {
                success: true,
                message: outcome.message(),
                outcome: serde_json::to_value(&outcome).ok(),
            }
        }
        Err(e) => {
            tracing::warn!("Change master to {} failed: {}", host, e);
            if matches!(e, Error::ChangeMasterFailed(_)) {
                state.sessions.mark_master_correct(session_id).await;
            }
            ActionResponse {
                success: false,
                message: failure_message(&e, &host),
                outcome: None,
            }
        }
    }
}

fn parse_credentials(form: &ControlForm) -> Result<MasterCredentials> {
    let host = form::non_empty(form.hostname.as_deref())
        .ok_or_else(|| Error::invalid("hostname", "required"))?;
    let port = match form::non_empty(form.text_port.as_deref()) {
        None => 3306,
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| Error::invalid("text_port", format!("'{}' is not a port", p)))?,
    };

    Ok(MasterCredentials {
        user: form.username.clone().unwrap_or_default(),
        password: form.pma_pw.clone().unwrap_or_default(),
        host: host.to_string(),
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MockExecutor, Row};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct RefusingConnector;

    #[async_trait::async_trait]
    impl MasterConnector for RefusingConnector {
        async fn connect(
            &self,
            credentials: &MasterCredentials,
        ) -> Result<Box<dyn DatabaseInterface>> {
            Err(Error::ConnectFailed {
                host: credentials.host.clone(),
                reason: "refused".into(),
            })
        }
    }

    /// Hands out a primary at a fixed binlog position
    struct ReachableConnector;

    #[async_trait::async_trait]
    impl MasterConnector for ReachableConnector {
        async fn connect(
            &self,
            _credentials: &MasterCredentials,
        ) -> Result<Box<dyn DatabaseInterface>> {
            Ok(Box::new(MockExecutor::new().with_rows(
                "SHOW MASTER STATUS",
                vec![Row::from_pairs([("File", "mysql-bin.000042"), ("Position", "777")])],
            )))
        }
    }

    fn app_with(db: Arc<MockExecutor>, allow_arbitrary_server: bool) -> Router {
        app_with_connector(db, Arc::new(RefusingConnector), allow_arbitrary_server)
    }

    fn app_with_connector(
        db: Arc<MockExecutor>,
        connector: Arc<dyn MasterConnector>,
        allow_arbitrary_server: bool,
    ) -> Router {
        let state = Arc::new(AppState {
            db,
            connector,
            sessions: SessionStore::new(),
            binlog: BinlogConfig::default(),
            replication: ReplicationConfig {
                allow_arbitrary_server,
                ..ReplicationConfig::default()
            },
        });
        HttpServer::create_router(state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_form(uri: &str, body: &str, session: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header(SESSION_HEADER, session)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_binlog_page_over_http() {
        let db = Arc::new(
            MockExecutor::new()
                .with_rows("SHOW MASTER LOGS", vec![Row::from_pairs([("Log_name", "bin.000001")])]),
        );
        let app = app_with(db.clone(), false);

        let response = app
            .oneshot(post_form("/server/binlog", "log=bin.000001&pos=50", "s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["sql_query"], "SHOW BINLOG EVENTS IN 'bin.000001' LIMIT 50, 25");
        assert_eq!(json["has_previous"], true);
        assert_eq!(json["has_next"], false);
        assert_eq!(json["previous_params"]["pos"], 25);
    }

    #[tokio::test]
    async fn test_skip_error_control() {
        let db = Arc::new(MockExecutor::new().failing_on("SET GLOBAL"));
        let app = app_with(db.clone(), false);

        let response = app
            .clone()
            .oneshot(post_form(
                "/server/replication",
                "sr_take_action=1&sr_slave_skip_error=1&sr_skip_errors_count=5",
                "s1",
            ))
            .await
            .unwrap();
        assert_eq!(response.headers()[SESSION_HEADER], "s1");

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Error skipping replication error.");
        assert_eq!(json["outcome"]["steps"].as_array().unwrap().len(), 3);
        assert_eq!(
            db.statements(),
            vec!["STOP SLAVE", "SET GLOBAL SQL_SLAVE_SKIP_COUNTER = 5", "START SLAVE"]
        );

        // the outcome is waiting on the next overview for the same session
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/server/replication")
                    .header(SESSION_HEADER, "s1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["message"]["status"], "error");
        assert_eq!(json["is_replica"], false);
    }

    #[tokio::test]
    async fn test_server_control_start_io() {
        let db = Arc::new(MockExecutor::new());
        let app = app_with(db.clone(), false);

        let response = app
            .oneshot(post_form(
                "/server/replication",
                "sr_take_action=1&sr_slave_server_control=1&sr_slave_action=start&sr_slave_control_parm=IO_THREAD",
                "s2",
            ))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Replication started successfully.");
        assert_eq!(db.statements(), vec!["START SLAVE IO_THREAD"]);
    }

    #[tokio::test]
    async fn test_unknown_action_runs_nothing() {
        let db = Arc::new(MockExecutor::new());
        let app = app_with(db.clone(), false);

        let response = app
            .oneshot(post_form(
                "/server/replication",
                "sr_take_action=1&sr_slave_server_control=1&sr_slave_action=reboot",
                "s3",
            ))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Error.");
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_change_master_disabled() {
        let db = Arc::new(MockExecutor::new());
        let app = app_with(db.clone(), false);

        let response = app
            .oneshot(post_form(
                "/server/replication",
                "sr_take_action=1&slave_changemaster=1&username=repl&pma_pw=x&hostname=db9&text_port=3306",
                "s4",
            ))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].as_str().unwrap().contains("allow_arbitrary_server"));
        assert!(db.statements().is_empty());
    }

    #[tokio::test]
    async fn test_change_master_unreachable() {
        let db = Arc::new(MockExecutor::new());
        let app = app_with(db.clone(), true);

        let response = app
            .oneshot(post_form(
                "/server/replication",
                "sr_take_action=1&slave_changemaster=1&username=repl&pma_pw=x&hostname=db9&text_port=3307",
                "s5",
            ))
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["message"], "Unable to connect to master db9.");
    }

    #[tokio::test]
    async fn test_missing_take_action() {
        let app = app_with(Arc::new(MockExecutor::new()), false);
        let response = app
            .oneshot(post_form("/server/replication", "sr_slave_skip_error=1", "s6"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["code"], "INVALID_PARAMETER");
    }

    #[tokio::test]
    async fn test_status_table() {
        let db = Arc::new(MockExecutor::new().with_rows(
            "SHOW SLAVE STATUS",
            vec![Row::from_pairs([
                ("Slave_IO_Running", "No"),
                ("Slave_SQL_Running", "Yes"),
                ("Replicate_Do_DB", "db1,db2"),
            ])],
        ));
        let app = app_with(db, false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/server/replication/status?type=replica")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        let vars = json["variables"].as_array().unwrap();
        let io = vars.iter().find(|v| v["name"] == "Slave_IO_Running").unwrap();
        assert_eq!(io["status"], "alert");
        let dbs = vars.iter().find(|v| v["name"] == "Replicate_Do_DB").unwrap();
        assert_eq!(dbs["value"], "db1, db2");
    }

    fn get_with_session(uri: &str, session: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(SESSION_HEADER, session)
            .body(Body::empty())
            .unwrap()
    }

    const CHANGE_MASTER_FORM: &str =
        "sr_take_action=1&slave_changemaster=1&username=repl&pma_pw=p%23ss&hostname=db9&text_port=3307";

    #[tokio::test]
    async fn test_change_master_success_updates_session() {
        let db = Arc::new(MockExecutor::new());
        let app = app_with_connector(db.clone(), Arc::new(ReachableConnector), true);

        let response = app
            .clone()
            .oneshot(post_form("/server/replication", CHANGE_MASTER_FORM, "s8"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Master server changed successfully to db9.");
        assert_eq!(json["outcome"]["position"]["position"], 777);
        assert_eq!(
            db.statements(),
            vec![
                "CHANGE MASTER TO MASTER_HOST='db9',MASTER_PORT=3307,MASTER_USER='repl',\
                 MASTER_PASSWORD='p#ss',MASTER_LOG_FILE='mysql-bin.000042',MASTER_LOG_POS=777",
                "START SLAVE",
            ]
        );

        let response = app
            .clone()
            .oneshot(get_with_session("/server/replication/change-master", "s8"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["cached"]["correct"], true);
        assert_eq!(json["cached"]["credentials"]["host"], "db9");
        assert_eq!(json["cached"]["credentials"]["port"], 3307);
        assert!(json["cached"]["credentials"].get("password").is_none());

        let response = app
            .oneshot(get_with_session("/server/replication", "s8"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["message"]["status"], "success");
        assert_eq!(json["message"]["info"], "Master server changed successfully to db9.");
    }

    #[tokio::test]
    async fn test_change_master_rejected_locally_marks_credentials_correct() {
        let db = Arc::new(MockExecutor::new().failing_on("CHANGE MASTER"));
        let app = app_with_connector(db.clone(), Arc::new(ReachableConnector), true);

        let response = app
            .clone()
            .oneshot(post_form("/server/replication", CHANGE_MASTER_FORM, "s9"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Unable to change master!");
        assert_eq!(db.statements().len(), 1);

        let response = app
            .clone()
            .oneshot(get_with_session("/server/replication/change-master", "s9"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["cached"]["correct"], true);

        let response = app
            .oneshot(get_with_session("/server/replication", "s9"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["message"]["status"], "error");
        assert_eq!(json["message"]["info"], "Unable to change master!");
    }

    #[tokio::test]
    async fn test_unreachable_master_is_cached_but_not_correct() {
        let app = app_with(Arc::new(MockExecutor::new()), true);

        app.clone()
            .oneshot(post_form("/server/replication", CHANGE_MASTER_FORM, "s10"))
            .await
            .unwrap();

        let response = app
            .oneshot(get_with_session("/server/replication/change-master", "s10"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["cached"]["correct"], false);
        assert_eq!(json["cached"]["credentials"]["user"], "repl");
    }

    #[tokio::test]
    async fn test_credentials_not_cached_when_disabled() {
        let app = app_with_connector(
            Arc::new(MockExecutor::new()),
            Arc::new(ReachableConnector),
            false,
        );

        let response = app
            .clone()
            .oneshot(post_form("/server/replication", CHANGE_MASTER_FORM, "s11"))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["success"], false);

        let response = app
            .oneshot(get_with_session("/server/replication/change-master", "s11"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert!(json["cached"].is_null());
        assert_eq!(json["username_length"], 16);
        assert_eq!(json["hostname_length"], 41);
    }

    #[tokio::test]
    async fn test_add_user_form() {
        let db = Arc::new(
            MockExecutor::new()
                .with_rows("SELECT USER()", vec![Row::from_pairs([("USER()", "admin@10.0.0.5")])])
                .with_rows(
                    "SHOW COLUMNS FROM",
                    vec![Row::from_pairs([("Field", "User"), ("Type", "char(80)")])],
                ),
        );
        let app = app_with(db, false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/server/replication/add-user?username=&hostname=%25")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["username_length"], 80);
        assert_eq!(json["hostname_length"], 41);
        assert_eq!(json["has_username"], true);
        assert_eq!(json["predefined_username"], "any");
        assert_eq!(json["predefined_hostname"], "any");
        assert_eq!(json["hostname"], "%");
        assert_eq!(json["this_host"], "10.0.0.5");
    }

    #[tokio::test]
    async fn test_add_user_form_defaults() {
        let db = Arc::new(
            MockExecutor::new()
                .with_rows("SELECT USER()", vec![Row::from_pairs([("USER()", "root@localhost")])]),
        );
        let app = app_with(db, false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/server/replication/add-user")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["has_username"], false);
        assert!(json["predefined_username"].is_null());
        assert!(json["predefined_hostname"].is_null());
        assert!(json["this_host"].is_null());
    }

    #[tokio::test]
    async fn test_master_config_hides_system_schemas() {
        let db = Arc::new(MockExecutor::new().with_rows(
            "SHOW DATABASES",
            vec![
                Row::from_pairs([("Database", "information_schema")]),
                Row::from_pairs([("Database", "shop")]),
                Row::from_pairs([("Database", "mysql")]),
            ],
        ));
        let app = app_with(db, false);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/server/replication/master-config")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["databases"], serde_json::json!(["shop"]));
    }
}
