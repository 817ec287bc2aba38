//! The chainable command session.

mod tx;

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use tx::Transaction;

use crate::config::ConnectionConfig;
use crate::engine::QueryEngine;
use crate::error::FluentDbError;
use crate::mapping::from_value;
use crate::params::{Parameter, ParameterBag};
use crate::types::{CommandKind, DatabaseType, DbType, ParameterDirection, RowValues};

/// A fluent builder over one open `QueryEngine`.
///
/// Configuration methods mutate the session in place and return it, so calls chain;
/// an `async` terminal call (see the `materialize` methods) then runs the command.
/// Configuration never touches the database. Invalid input (empty command text, an
/// unserializable parameter object, ...) is held back and returned by the next
/// terminal call.
///
/// ```rust,no_run
/// use sql_fluent::prelude::*;
///
/// # async fn demo() -> Result<(), FluentDbError> {
/// let mut session = CommandSession::connect(&ConnectionConfig::sqlite(":memory:")).await?;
/// let names: Vec<String> = session
///     .set_command("SELECT name FROM categories WHERE id > @min")
///     .set_parameter("@min", 2)
///     .execute_list()
///     .await?;
/// session.dispose().await;
/// # let _ = names;
/// # Ok(())
/// # }
/// ```
///
/// One session must not be shared between tasks; the `&mut self` receivers already
/// rule out overlapping calls.
pub struct CommandSession {
    pub(crate) engine: Option<Box<dyn QueryEngine>>,
    pub(crate) command_text: Option<String>,
    pub(crate) command_kind: CommandKind,
    pub(crate) command_timeout: Option<Duration>,
    pub(crate) parameters: ParameterBag,
    pub(crate) transaction: Option<Transaction>,
    pub(crate) pending_error: Option<FluentDbError>,
    pub(crate) outputs_ready: bool,
    pub(crate) cancelled: bool,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl CommandSession {
    /// Wrap an engine, opening it if it is not open yet.
    ///
    /// # Errors
    /// Returns the engine's error if opening fails.
    pub async fn new<E: QueryEngine + 'static>(engine: E) -> Result<Self, FluentDbError> {
        Self::with_engine(Box::new(engine)).await
    }

    /// Same as [`CommandSession::new`] for an already boxed engine.
    ///
    /// # Errors
    /// Returns the engine's error if opening fails.
    pub async fn with_engine(mut engine: Box<dyn QueryEngine>) -> Result<Self, FluentDbError> {
        if !engine.is_open() {
            engine.open().await?;
        }
        debug!(provider = ?engine.database_type(), "command session opened");
        Ok(Self {
            engine: Some(engine),
            command_text: None,
            command_kind: CommandKind::Text,
            command_timeout: None,
            parameters: ParameterBag::new(),
            transaction: None,
            pending_error: None,
            outputs_ready: false,
            cancelled: false,
            cancellation: None,
        })
    }

    /// Build the engine described by `config` and open a session on it.
    ///
    /// # Errors
    /// Returns `FluentDbError::ConfigError` for an unusable connection string, or the
    /// engine's error if opening fails.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, FluentDbError> {
        Self::with_engine(config.build_engine()?).await
    }

    fn latch(&mut self, error: FluentDbError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    fn set_text(&mut self, text: String, kind: CommandKind) {
        if text.trim().is_empty() {
            self.latch(FluentDbError::Argument("command text cannot be empty".into()));
        }
        self.command_text = Some(text);
        self.command_kind = kind;
        self.outputs_ready = false;
    }

    /// Set SQL text to run. Parameters are left untouched.
    pub fn set_command(&mut self, text: impl Into<String>) -> &mut Self {
        self.set_text(text.into(), CommandKind::Text);
        self
    }

    /// Set SQL text and upsert one Input parameter per field of `params`.
    pub fn set_command_with<P: Serialize + ?Sized>(
        &mut self,
        text: impl Into<String>,
        params: &P,
    ) -> &mut Self {
        self.set_parameters(params);
        self.set_command(text)
    }

    /// Set the name of a stored procedure to run.
    pub fn set_procedure(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_text(name.into(), CommandKind::StoredProcedure);
        self
    }

    /// Set a stored procedure name and upsert one Input parameter per field of `params`.
    pub fn set_procedure_with<P: Serialize + ?Sized>(
        &mut self,
        name: impl Into<String>,
        params: &P,
    ) -> &mut Self {
        self.set_parameters(params);
        self.set_procedure(name)
    }

    /// Bound each terminal call; a zero duration removes the bound.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.command_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Cancel in-flight terminal calls when `token` fires.
    pub fn set_cancellation(&mut self, token: CancellationToken) -> &mut Self {
        self.cancellation = Some(token);
        self
    }

    fn upsert(&mut self, parameter: Parameter) -> &mut Self {
        if parameter.key().trim().is_empty() {
            self.latch(FluentDbError::Argument(
                "parameter name cannot be empty".into(),
            ));
            return self;
        }
        self.parameters.upsert(parameter);
        self
    }

    /// Upsert an Input parameter whose type is inferred from `value`.
    pub fn set_parameter(
        &mut self,
        name: impl Into<String>,
        value: impl Into<RowValues>,
    ) -> &mut Self {
        self.upsert(Parameter::input(name, value))
    }

    /// Upsert a parameter with an explicit type, direction and size.
    ///
    /// Pass `RowValues::Null` to declare an Output or `InputOutput` slot before execution.
    pub fn set_parameter_with(
        &mut self,
        name: impl Into<String>,
        value: impl Into<RowValues>,
        db_type: DbType,
        direction: ParameterDirection,
        size: Option<u32>,
    ) -> &mut Self {
        self.upsert(Parameter {
            name: name.into(),
            value: value.into(),
            db_type,
            direction,
            size,
        })
    }

    /// Declare an Output parameter with no initial value.
    pub fn set_output_parameter(&mut self, name: impl Into<String>, db_type: DbType) -> &mut Self {
        self.upsert(Parameter::output(name, db_type))
    }

    /// Declare the slot receiving a stored procedure's return code.
    pub fn set_return_parameter(&mut self, name: impl Into<String>) -> &mut Self {
        self.set_parameter_with(
            name,
            RowValues::Null,
            DbType::Int32,
            ParameterDirection::ReturnValue,
            None,
        )
    }

    /// Upsert one Input parameter per field of a serializable struct or map.
    pub fn set_parameters<P: Serialize + ?Sized>(&mut self, params: &P) -> &mut Self {
        match ParameterBag::from_serialize(params) {
            Ok(bag) => self.merge_parameters(bag),
            Err(err) => {
                self.latch(err);
                self
            }
        }
    }

    /// Upsert every entry of an existing bag; same-named entries are overwritten.
    pub fn merge_parameters(&mut self, bag: ParameterBag) -> &mut Self {
        for parameter in bag {
            self.upsert(parameter);
        }
        self
    }

    pub fn clear_parameters(&mut self) -> &mut Self {
        self.parameters.clear();
        self.outputs_ready = false;
        self
    }

    /// Read a parameter's current value.
    ///
    /// Input values are readable at any time; Output, `InputOutput` and `ReturnValue`
    /// entries only after a terminal call has written them back. A command whose last
    /// result set does not name every output leaves them unwritten.
    ///
    /// # Errors
    /// `FluentDbError::ParameterNotFound` if `name` was never declared,
    /// `FluentDbError::InvalidOperation` if its output value is not populated yet, or a
    /// mapping error if the value does not convert to `T`.
    pub fn get_parameter_value<T: DeserializeOwned>(&self, name: &str) -> Result<T, FluentDbError> {
        let parameter = self
            .parameters
            .get(name)
            .ok_or_else(|| FluentDbError::ParameterNotFound(name.to_string()))?;
        if parameter.direction.is_output() && !self.outputs_ready {
            return Err(FluentDbError::InvalidOperation(format!(
                "parameter {name} is written by the database; execute the command first"
            )));
        }
        from_value(&parameter.value)
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterBag {
        &self.parameters
    }

    #[must_use]
    pub fn command_text(&self) -> Option<&str> {
        self.command_text.as_deref()
    }

    #[must_use]
    pub fn command_kind(&self) -> CommandKind {
        self.command_kind
    }

    #[must_use]
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Provider of the owned engine; `None` once disposed.
    #[must_use]
    pub fn database_type(&self) -> Option<DatabaseType> {
        self.engine.as_ref().map(|engine| engine.database_type())
    }

    /// Whether a terminal call was cancelled or timed out. Such a session should be
    /// disposed rather than reused.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSession")
            .field("provider", &self.database_type())
            .field("command_text", &self.command_text)
            .field("command_kind", &self.command_kind)
            .field("command_timeout", &self.command_timeout)
            .field("parameters", &self.parameters.len())
            .field("transaction", &self.transaction)
            .field("cancelled", &self.cancelled)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        if self.engine.take().is_some() {
            debug!("command session dropped without dispose; releasing engine");
        }
    }
}
