use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::TryStreamExt;
use tiberius::numeric::Numeric;
use tiberius::{Query, QueryItem, Uuid};

use super::batch::Batch;
use super::client::MssqlClient;
use crate::error::FluentDbError;
use crate::params::Parameter;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Read every result set of a query stream, in order.
pub async fn build_result_sets(
    client: &mut MssqlClient,
    batch: &Batch<'_>,
) -> Result<Vec<ResultSet>, FluentDbError> {
    let mut stream = bind_query_params(&batch.sql, &batch.arguments)
        .query(client)
        .await?;

    let mut result_sets: Vec<ResultSet> = Vec::new();
    while let Some(item) = stream.try_next().await? {
        match item {
            QueryItem::Metadata(meta) => {
                let column_names = meta
                    .columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect();
                result_sets.push(ResultSet::new(column_names));
            }
            QueryItem::Row(row) => {
                let Some(result_set) = result_sets.last_mut() else {
                    return Err(FluentDbError::ExecutionError(
                        "SQL Server sent a row before its column metadata".into(),
                    ));
                };
                let col_count = result_set.column_names().len();
                let mut row_values = Vec::with_capacity(col_count);
                for i in 0..col_count {
                    row_values.push(extract_value(&row, i)?.unwrap_or(RowValues::Null));
                }
                result_set.add_row_values(row_values);
            }
        }
    }

    Ok(result_sets)
}

/// Run the batch for its row counts; `-1` when the server reported none.
pub async fn execute_batch(client: &mut MssqlClient, batch: &Batch<'_>) -> Result<i64, FluentDbError> {
    let exec_result = bind_query_params(&batch.sql, &batch.arguments)
        .execute(client)
        .await?;
    let counts = exec_result.rows_affected();
    if counts.is_empty() {
        return Ok(-1);
    }
    let total: u64 = counts.iter().sum();
    i64::try_from(total)
        .map_err(|e| FluentDbError::ExecutionError(format!("Invalid rows affected count: {e}")))
}

/// Extract a value from a row at a specific index
#[allow(clippy::cast_precision_loss)]
fn extract_value(row: &tiberius::Row, idx: usize) -> Result<Option<RowValues>, FluentDbError> {
    // tiberius only converts between matching wire types, so try each in turn

    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return Ok(Some(RowValues::Int(i64::from(val))));
    }

    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return Ok(Some(RowValues::Int(val)));
    }

    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return Ok(Some(RowValues::Int(i64::from(val))));
    }

    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return Ok(Some(RowValues::Int(i64::from(val))));
    }

    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return Ok(Some(RowValues::Float(f64::from(val))));
    }

    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return Ok(Some(RowValues::Float(val)));
    }

    if let Ok(Some(val)) = row.try_get::<Numeric, _>(idx) {
        let scale = 10_f64.powi(i32::from(val.scale()));
        return Ok(Some(RowValues::Float(val.value() as f64 / scale)));
    }

    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return Ok(Some(RowValues::Bool(val)));
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Ok(Some(RowValues::Timestamp(val)));
    }

    if let Ok(Some(val)) = row.try_get::<NaiveDate, _>(idx) {
        return Ok(Some(RowValues::Timestamp(val.and_time(NaiveTime::default()))));
    }

    if let Ok(Some(val)) = row.try_get::<Uuid, _>(idx) {
        return Ok(Some(RowValues::Text(val.to_string())));
    }

    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return Ok(Some(RowValues::Text(val.to_string())));
    }

    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return Ok(Some(RowValues::Blob(val.to_vec())));
    }

    Ok(None)
}

/// Bind parameter values to `@P1..@Pn` of the batch, in order.
pub fn bind_query_params<'a>(query: &'a str, params: &[&Parameter]) -> Query<'a> {
    let mut query_builder = Query::new(query);

    for param in params {
        match &param.value {
            RowValues::Int(i) => query_builder.bind(*i),
            RowValues::Float(f) => query_builder.bind(*f),
            RowValues::Text(s) => query_builder.bind(s.clone()),
            RowValues::Bool(b) => query_builder.bind(*b),
            RowValues::Timestamp(dt) => {
                query_builder.bind(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
            }
            RowValues::Null => query_builder.bind(Option::<String>::None),
            RowValues::JSON(jsval) => query_builder.bind(jsval.to_string()),
            RowValues::Blob(bytes) => query_builder.bind(bytes.clone()),
        }
    }

    query_builder
}
