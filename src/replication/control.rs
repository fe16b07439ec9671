//! Replica Control
//!
//! Start, stop, reset and skip-error as fixed statement sequences. Every
//! step is attempted in order; nothing is retried or compensated. The
//! outcome keeps each step's result so a half-applied sequence is visible.

use serde::{Deserialize, Serialize};

use crate::executor::DatabaseInterface;
use crate::error::{Error, Result};

/// Which replica threads a start/stop applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadScope {
    #[serde(rename = "IO_THREAD")]
    Io,
    #[serde(rename = "SQL_THREAD")]
    Sql,
}

impl ThreadScope {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ThreadScope::Io => "IO_THREAD",
            ThreadScope::Sql => "SQL_THREAD",
        }
    }

    /// Parse a form value; empty means both threads
    pub fn parse(value: Option<&str>) -> Result<Option<Self>> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("IO_THREAD") => Ok(Some(ThreadScope::Io)),
            Some(v) if v.eq_ignore_ascii_case("SQL_THREAD") => Ok(Some(ThreadScope::Sql)),
            Some(v) => Err(Error::invalid(
                "sr_slave_control_parm",
                format!("unknown thread '{}'", v),
            )),
        }
    }
}

/// A replica control command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    Start { scope: Option<ThreadScope> },
    Stop { scope: Option<ThreadScope> },
    Reset,
    SkipError { count: u32 },
}

impl ControlAction {
    /// Parse the start/stop/reset action from form values
    pub fn parse(action: &str, scope: Option<&str>) -> Result<Self> {
        match action.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ControlAction::Start { scope: ThreadScope::parse(scope)? }),
            "stop" => Ok(ControlAction::Stop { scope: ThreadScope::parse(scope)? }),
            "reset" => Ok(ControlAction::Reset),
            other => Err(Error::invalid(
                "sr_slave_action",
                format!("unknown action '{}'", other),
            )),
        }
    }

    /// Skip-error with a form-supplied count, defaulting to 1
    pub fn skip_error(count: Option<&str>) -> Result<Self> {
        let count = match count.map(str::trim).filter(|c| !c.is_empty()) {
            None => 1,
            Some(c) => c.parse::<u32>().map_err(|_| {
                Error::invalid("sr_skip_errors_count", format!("'{}' is not a count", c))
            })?,
        };
        Ok(ControlAction::SkipError { count })
    }

    /// The statements this action runs, in order
    pub fn statements(&self) -> Vec<String> {
        match self {
            ControlAction::Start { scope } => vec![thread_statement("START", *scope)],
            ControlAction::Stop { scope } => vec![thread_statement("STOP", *scope)],
            ControlAction::Reset => vec![
                thread_statement("STOP", None),
                "RESET SLAVE".to_string(),
                thread_statement("START", None),
            ],
            ControlAction::SkipError { count } => vec![
                thread_statement("STOP", None),
                format!("SET GLOBAL SQL_SLAVE_SKIP_COUNTER = {}", count),
                thread_statement("START", None),
            ],
        }
    }

    /// Message shown when the action succeeds
    pub fn success_message(&self) -> &'static str {
        match self {
            ControlAction::Start { .. } => "Replication started successfully.",
            ControlAction::Stop { .. } => "Replication stopped successfully.",
            ControlAction::Reset => "Replication resetting successfully.",
            ControlAction::SkipError { .. } => "Replication error skipped successfully.",
        }
    }

    /// Message shown when the action fails
    pub fn error_message(&self) -> &'static str {
        match self {
            ControlAction::Start { .. } => "Error starting replication.",
            ControlAction::Stop { .. } => "Error stopping replication.",
            ControlAction::Reset => "Error resetting replication.",
            ControlAction::SkipError { .. } => "Error skipping replication error.",
        }
    }
}

fn thread_statement(verb: &str, scope: Option<ThreadScope>) -> String {
    match scope {
        Some(scope) => format!("{} SLAVE {}", verb, scope.as_sql()),
        None => format!("{} SLAVE", verb),
    }
}

/// Result of one statement in a sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub statement: String,
    pub result: std::result::Result<u64, String>,
}

impl StepOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a whole control action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlOutcome {
    pub action: ControlAction,
    pub steps: Vec<StepOutcome>,
    pub success: bool,
    /// Stop went through but the replica was not started again
    pub replica_left_stopped: bool,
}

impl ControlOutcome {
    fn from_steps(action: ControlAction, steps: Vec<StepOutcome>) -> Self {
        let success = steps.iter().all(StepOutcome::succeeded);

        let stopped = steps
            .iter()
            .any(|s| s.statement.starts_with("STOP SLAVE") && s.succeeded());
        let restarted = steps
            .iter()
            .any(|s| s.statement.starts_with("START SLAVE") && s.succeeded());
        let is_sequence = steps.len() > 1;

        Self {
            action,
            steps,
            success,
            replica_left_stopped: is_sequence && stopped && !restarted,
        }
    }

    /// First failure, for log messages
    pub fn first_error(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| s.result.as_ref().err().map(String::as_str))
    }

    /// Message for the user
    pub fn message(&self) -> String {
        if self.success {
            self.action.success_message().to_string()
        } else if self.replica_left_stopped {
            format!(
                "{} The replica was stopped and could not be started again.",
                self.action.error_message()
            )
        } else {
            self.action.error_message().to_string()
        }
    }
}

/// Runs control actions against the local server
pub struct ReplicaController<'a> {
    db: &'a dyn DatabaseInterface,
}

impl<'a> ReplicaController<'a> {
    pub fn new(db: &'a dyn DatabaseInterface) -> Self {
        Self { db }
    }

    /// Run every statement of `action` and collect the outcome
    pub async fn run(&self, action: ControlAction) -> ControlOutcome {
        let mut steps = Vec::new();

        for statement in action.statements() {
            let result = self.db.execute(&statement).await.map_err(|e| e.to_string());
            if let Err(e) = &result {
                tracing::warn!("Replica control step '{}' failed: {}", statement, e);
            }
            steps.push(StepOutcome { statement, result });
        }

        let outcome = ControlOutcome::from_steps(action, steps);
        if outcome.success {
            tracing::info!("Replica control {:?} succeeded", action);
        } else if outcome.replica_left_stopped {
            tracing::error!("Replica control {:?} left the replica stopped", action);
        }
        outcome
    }
}
