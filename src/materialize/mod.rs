//! Terminal operations: run the configured command and reshape its output.

mod mapping;
mod multiple;
mod reader;
mod single;

use std::future;

use tracing::{debug, warn};

pub use mapping::MappedRows;
pub use reader::RowReader;

use crate::command::{Command, ExecuteMode, Execution};
use crate::error::FluentDbError;
use crate::params::ParameterBag;
use crate::session::CommandSession;

enum Interrupted {
    Timeout(std::time::Duration),
    Cancelled,
}

impl CommandSession {
    fn snapshot(&mut self) -> Result<Command, FluentDbError> {
        if self.engine.is_none() {
            return Err(FluentDbError::ObjectDisposed);
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.cancelled {
            return Err(FluentDbError::InvalidOperation(
                "a previous command was cancelled; dispose this session".into(),
            ));
        }
        let text = self
            .command_text
            .clone()
            .ok_or_else(|| FluentDbError::InvalidOperation("no command text has been set".into()))?;
        Ok(Command {
            text,
            kind: self.command_kind,
            parameters: self.parameters.clone(),
            timeout: self.command_timeout,
        })
    }

    /// One round-trip: snapshot the configuration, race the engine against the timeout
    /// and cancellation token, then write output parameters back into the bag.
    pub(crate) async fn run_command(&mut self, mode: ExecuteMode) -> Result<Execution, FluentDbError> {
        let command = self.snapshot()?;
        let token = self.cancellation.clone();
        let engine = self.engine.as_mut().ok_or(FluentDbError::ObjectDisposed)?;

        debug!(
            kind = ?command.kind,
            ?mode,
            parameters = command.parameters.len(),
            in_transaction = self.transaction.is_some(),
            "executing command"
        );

        if token.as_ref().is_some_and(|t| t.is_cancelled()) {
            self.cancelled = true;
            return Err(FluentDbError::Cancelled);
        }

        let timeout = command.timeout;
        let deadline = async move {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => future::pending().await,
            }
        };
        let cancelled = async move {
            match token {
                Some(token) => token.cancelled().await,
                None => future::pending().await,
            }
        };

        let interrupted = tokio::select! {
            result = engine.run(&command, mode) => {
                let execution = result?;
                write_outputs(&mut self.parameters, &execution);
                self.outputs_ready =
                    !execution.output_values.is_empty() || !self.parameters.has_outputs();
                return Ok(execution);
            }
            () = deadline => Interrupted::Timeout(timeout.unwrap_or_default()),
            () = cancelled => Interrupted::Cancelled,
        };

        engine.cancel();
        self.cancelled = true;
        match interrupted {
            Interrupted::Timeout(limit) => {
                warn!(?limit, "command timed out");
                Err(FluentDbError::Timeout(limit))
            }
            Interrupted::Cancelled => {
                debug!("command cancelled");
                Err(FluentDbError::Cancelled)
            }
        }
    }
}

fn write_outputs(parameters: &mut ParameterBag, execution: &Execution) {
    for (name, value) in &execution.output_values {
        if let Some(parameter) = parameters.get_mut(name) {
            parameter.value = value.clone();
        }
    }
}
