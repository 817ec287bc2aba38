//! T-SQL batch generation.
//!
//! Every bag entry becomes a local variable named after it. Values travel as the
//! positional `@P1..@Pn` arguments of `sp_executesql`; output slots are declared
//! without a value and selected as the batch's last result set.

use std::fmt::Write;
use std::sync::LazyLock;

use regex::Regex;

use crate::command::Command;
use crate::error::FluentDbError;
use crate::params::Parameter;
use crate::types::{CommandKind, DbType, ParameterDirection};

/// A ready-to-send batch and the parameters bound to `@P1..@Pn`, in order.
#[derive(Debug)]
pub(crate) struct Batch<'a> {
    pub sql: String,
    pub arguments: Vec<&'a Parameter>,
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}_]*$").expect("identifier pattern compiles"));

fn variable_name(parameter: &Parameter) -> Result<String, FluentDbError> {
    let key = parameter.key();
    if IDENTIFIER.is_match(key) {
        Ok(format!("@{key}"))
    } else {
        Err(FluentDbError::Argument(format!(
            "{} is not a valid SQL Server parameter name",
            parameter.name
        )))
    }
}

fn sized(base: &str, size: Option<u32>, max: u32) -> String {
    match size {
        Some(n) if n > 0 && n <= max => format!("{base}({n})"),
        _ => format!("{base}(MAX)"),
    }
}

/// SQL Server type used to declare a parameter variable.
#[must_use]
pub fn sql_type(db_type: DbType, size: Option<u32>) -> String {
    match db_type {
        DbType::Boolean => "BIT".into(),
        DbType::Byte => "TINYINT".into(),
        DbType::Int16 => "SMALLINT".into(),
        DbType::Int32 => "INT".into(),
        DbType::Int64 => "BIGINT".into(),
        DbType::Single => "REAL".into(),
        DbType::Double => "FLOAT".into(),
        DbType::Decimal => "DECIMAL(38, 10)".into(),
        DbType::Currency => "MONEY".into(),
        DbType::String | DbType::Json => sized("NVARCHAR", size, 4000),
        DbType::AnsiString => sized("VARCHAR", size, 8000),
        DbType::Date => "DATE".into(),
        DbType::DateTime => "DATETIME2".into(),
        DbType::Time => "TIME".into(),
        DbType::Binary => sized("VARBINARY", size, 8000),
        DbType::Guid => "UNIQUEIDENTIFIER".into(),
    }
}

fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Build the batch for `command`.
///
/// # Errors
/// Returns `FluentDbError::Argument` for a parameter name that is not a valid T-SQL
/// identifier.
pub(crate) fn build_batch(command: &Command) -> Result<Batch<'_>, FluentDbError> {
    let mut sql = String::new();
    let mut arguments = Vec::new();
    let mut return_slot = None;
    let mut call_arguments = Vec::new();
    let mut selected = Vec::new();

    for parameter in &command.parameters {
        let variable = variable_name(parameter)?;
        let declared = sql_type(parameter.db_type, parameter.size);
        if parameter.direction.is_input() && !parameter.value.is_null() {
            arguments.push(parameter);
            let _ = writeln!(sql, "DECLARE {variable} {declared} = @P{};", arguments.len());
        } else {
            let _ = writeln!(sql, "DECLARE {variable} {declared};");
        }

        match parameter.direction {
            ParameterDirection::ReturnValue => return_slot = Some(variable.clone()),
            ParameterDirection::Input => call_arguments.push(format!("{variable} = {variable}")),
            ParameterDirection::Output | ParameterDirection::InputOutput => {
                call_arguments.push(format!("{variable} = {variable} OUTPUT"));
            }
        }
        if parameter.direction.is_output() {
            selected.push(format!("{variable} AS {}", quote_identifier(parameter.key())));
        }
    }

    match command.kind {
        CommandKind::Text => {
            sql.push_str(&command.text);
            sql.push_str(";\n");
        }
        CommandKind::StoredProcedure => {
            sql.push_str("EXEC ");
            if let Some(slot) = &return_slot {
                let _ = write!(sql, "{slot} = ");
            }
            sql.push_str(&command.text);
            if !call_arguments.is_empty() {
                sql.push(' ');
                sql.push_str(&call_arguments.join(", "));
            }
            sql.push_str(";\n");
        }
    }

    if !selected.is_empty() {
        let _ = writeln!(sql, "SELECT {};", selected.join(", "));
    }

    Ok(Batch { sql, arguments })
}
