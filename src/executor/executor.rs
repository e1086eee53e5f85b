//! Predicate execution
//!
//! Only a single `column OP literal` predicate is ever executed. JOIN,
//! GROUP BY, ORDER BY and LIMIT are detected for planning but never change
//! the returned rows, and the projection list is not applied.

use crate::catalog::TableMetadata;
use crate::error::{Error, Result};
use crate::sql::{ComparisonOp, Predicate, QueryStructure};
use arrow::array::{Array, ArrayRef, BooleanArray, Datum, Float64Array, StringArray};
use arrow::compute::kernels::cmp;
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::DataType as ArrowType;
use arrow::record_batch::RecordBatch;
use tracing::warn;

/// How unsupported WHERE clauses are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicatePolicy {
    /// Log and return unfiltered rows
    #[default]
    Lenient,
    /// Fail the query with `InvalidQuery`
    Strict,
}

impl PredicatePolicy {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            PredicatePolicy::Strict
        } else {
            PredicatePolicy::Lenient
        }
    }
}

/// Pick the predicate to execute for `query` on `table`.
///
/// Under the lenient policy an unrecognized operator, a malformed or
/// multi-condition WHERE clause, or an unknown column yields `None`.
pub fn resolve_predicate(
    query: &QueryStructure,
    table: &TableMetadata,
    policy: PredicatePolicy,
) -> Result<Option<Predicate>> {
    let resolved = query.filter_predicate().and_then(|predicate| match predicate {
        Some(p) if !table.has_column(&p.column) => Err(Error::InvalidQuery(format!(
            "column '{}' not found in table '{}'",
            p.column, table.name
        ))),
        other => Ok(other),
    });

    match (resolved, policy) {
        (Ok(predicate), _) => Ok(predicate),
        (Err(err), PredicatePolicy::Lenient) => {
            warn!(table = %table.name, error = %err, "ignoring WHERE clause, returning unfiltered rows");
            Ok(None)
        }
        (Err(err), PredicatePolicy::Strict) => Err(err),
    }
}

/// Keep the rows of `batch` that satisfy `predicate`, in their original order
pub fn filter_batch(batch: &RecordBatch, predicate: &Predicate) -> Result<RecordBatch> {
    let column = batch
        .column_by_name(&predicate.column)
        .ok_or_else(|| Error::ColumnNotFound(predicate.column.clone(), "<batch>".to_string()))?;

    let mask = evaluate(column, predicate)?;
    Ok(filter_record_batch(batch, &mask)?)
}

/// Evaluate the predicate to a selection mask; null cells never match
fn evaluate(column: &ArrayRef, predicate: &Predicate) -> Result<BooleanArray> {
    let literal = &predicate.literal;
    let mismatch = || Error::TypeMismatch {
        from: format!("{} column '{}'", column.data_type(), predicate.column),
        to: format!("literal '{}'", literal.raw),
    };

    match column.data_type() {
        ArrowType::Utf8 => {
            let scalar = StringArray::new_scalar(literal.raw.as_str());
            compare(column, &scalar, predicate.op)
        }
        ArrowType::Boolean => {
            let value = match literal.raw.to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(mismatch()),
            };
            compare(column, &BooleanArray::new_scalar(value), predicate.op)
        }
        ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::Float32
        | ArrowType::Float64
        | ArrowType::Date32
        | ArrowType::Timestamp(_, _) => {
            let value = literal.value.as_f64().ok_or_else(mismatch)?;
            let values = as_float64(column)?;
            compare(&values, &Float64Array::new_scalar(value), predicate.op)
        }
        other => Err(Error::UnsupportedType(other.to_string())),
    }
}

/// Float64 view of a numeric or temporal column
fn as_float64(column: &ArrayRef) -> Result<ArrayRef> {
    let column = match column.data_type() {
        ArrowType::Date32 => cast(column, &ArrowType::Int32)?,
        ArrowType::Timestamp(_, _) => cast(column, &ArrowType::Int64)?,
        _ => column.clone(),
    };
    Ok(cast(&column, &ArrowType::Float64)?)
}

fn compare(lhs: &dyn Datum, rhs: &dyn Datum, op: ComparisonOp) -> Result<BooleanArray> {
    let mask = match op {
        ComparisonOp::Eq => cmp::eq(lhs, rhs)?,
        ComparisonOp::Gt => cmp::gt(lhs, rhs)?,
        ComparisonOp::Lt => cmp::lt(lhs, rhs)?,
        ComparisonOp::Gte => cmp::gt_eq(lhs, rhs)?,
        ComparisonOp::Lte => cmp::lt_eq(lhs, rhs)?,
    };
    Ok(mask)
}
