#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sql_fluent::prelude::*;

/// What a `RecordingEngine` saw, shared with the test after the engine is boxed.
#[derive(Debug, Default)]
pub struct Recorded {
    pub opens: usize,
    pub closes: usize,
    pub cancels: usize,
    pub begins: Vec<IsolationLevel>,
    pub commits: usize,
    pub rollbacks: usize,
    pub commands: Vec<(String, CommandKind, ExecuteMode)>,
}

/// In-memory engine returning canned result sets, for driving the session protocol
/// without a database.
pub struct RecordingEngine {
    open: bool,
    delay: Option<Duration>,
    replies: VecDeque<(Vec<ResultSet>, i64)>,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            open: false,
            delay: None,
            replies: VecDeque::new(),
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    /// Queue the raw result sets (including any trailing output row) for the next run.
    pub fn reply(mut self, result_sets: Vec<ResultSet>, rows_affected: i64) -> Self {
        self.replies.push_back((result_sets, rows_affected));
        self
    }

    /// Make every run sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn handle(&self) -> Arc<Mutex<Recorded>> {
        Arc::clone(&self.recorded)
    }
}

#[async_trait]
impl QueryEngine for RecordingEngine {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), FluentDbError> {
        self.open = true;
        self.recorded.lock().unwrap().opens += 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), FluentDbError> {
        self.open = false;
        self.recorded.lock().unwrap().closes += 1;
        Ok(())
    }

    async fn run(&mut self, command: &Command, mode: ExecuteMode) -> Result<Execution, FluentDbError> {
        self.recorded
            .lock()
            .unwrap()
            .commands
            .push((command.text.clone(), command.kind, mode));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let (result_sets, rows_affected) = self.replies.pop_front().unwrap_or_default();
        Ok(Execution::from_raw(result_sets, rows_affected, &command.parameters))
    }

    async fn begin(&mut self, isolation_level: IsolationLevel) -> Result<(), FluentDbError> {
        self.recorded.lock().unwrap().begins.push(isolation_level);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), FluentDbError> {
        self.recorded.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), FluentDbError> {
        self.recorded.lock().unwrap().rollbacks += 1;
        Ok(())
    }

    fn cancel(&self) {
        self.recorded.lock().unwrap().cancels += 1;
    }
}

/// Build a result set from column names and rows.
pub fn result_set(columns: &[&str], rows: Vec<Vec<RowValues>>) -> ResultSet {
    let mut set = ResultSet::new(columns.iter().map(|c| (*c).to_string()).collect());
    for row in rows {
        set.add_row_values(row);
    }
    set
}
