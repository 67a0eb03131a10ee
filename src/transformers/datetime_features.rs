//! ## Transformers for extracting datetime-based features
//!
//! This module implements a transformer for deriving model-ready features from datetime
//! columns.
//!
//! - **DateFeatures:** For each configured datetime column, appends `<column>_year`,
//!   `<column>_month`, `<column>_quarter`, `<column>_weekday`, and `<column>_is_weekend`,
//!   optionally dropping the original column once its components are extracted.
//!
//! Weekday numbering follows `date_part('dow', ..)`: Sunday is 0 and Saturday is 6, so
//! the weekend indicator is set for 0 and 6.
//! Errors are returned as `TablePrepError` and results are wrapped in `TablePrepResult`.

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use datafusion::arrow::datatypes::DataType;
use datafusion::prelude::*;
use datafusion_expr::{col, lit, Case as DFCase, Expr};
use datafusion_functions::datetime::date_part;

/// Validates that a column exists and is of a datetime type (Timestamp, Date32, or Date64).
fn validate_datetime_column(df: &DataFrame, col_name: &str) -> TablePrepResult<()> {
    let field = df.schema().field_with_name(None, col_name).map_err(|_| {
        TablePrepError::MissingColumn(format!("Column '{}' not found", col_name))
    })?;
    match field.data_type() {
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => Ok(()),
        dt => Err(TablePrepError::InvalidParameter(format!(
            "Column '{}' must be a datetime type (Timestamp, Date32, or Date64), but found {:?}",
            col_name, dt
        ))),
    }
}

/// Extracts calendar features from datetime columns.
pub struct DateFeatures {
    pub columns: Vec<String>,
    /// If true, the original datetime columns are removed from the output.
    pub drop_original: bool,
}

impl DateFeatures {
    pub fn new(columns: Vec<String>, drop_original: bool) -> Self {
        Self {
            columns,
            drop_original,
        }
    }

    /// Validates that each specified datetime column exists and is of a valid datetime type.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        for col_name in &self.columns {
            validate_datetime_column(df, col_name)?;
        }
        Ok(())
    }

    /// Transforms the DataFrame by appending the extracted calendar features next to
    /// each source column (which is dropped when `drop_original` is set).
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        let mut exprs: Vec<Expr> = Vec::new();
        for field in df.schema().fields() {
            let name = field.name();
            if !self.columns.contains(name) {
                exprs.push(col(name));
                continue;
            }
            validate_datetime_column(&df, name)?;
            if !self.drop_original {
                exprs.push(col(name));
            }
            let base = col(name);
            for part in ["year", "month", "quarter"] {
                exprs.push(
                    date_part()
                        .call(vec![lit(part), base.clone()])
                        .alias(format!("{}_{}", name, part)),
                );
            }
            let weekday = date_part().call(vec![lit("dow"), base.clone()]);
            exprs.push(weekday.clone().alias(format!("{}_weekday", name)));
            let weekend_expr = Expr::Case(DFCase {
                expr: None,
                when_then_expr: vec![
                    (Box::new(weekday.clone().eq(lit(0))), Box::new(lit(1_i32))),
                    (Box::new(weekday.eq(lit(6))), Box::new(lit(1_i32))),
                ],
                else_expr: Some(Box::new(lit(0_i32))),
            })
            .alias(format!("{}_is_weekend", name));
            exprs.push(weekend_expr);
        }

        df.select(exprs).map_err(TablePrepError::DataFusionError)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(DateFeatures);
