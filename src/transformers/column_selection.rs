//! ## Column Selection Transformers
//!
//! This module provides transformers for removing columns from a dataset by name.
//!
//! - [`DropColumns`]: Removes the specified columns, leaving all rows and the
//!   relative order of the remaining columns unchanged.
//!
//! Requesting a column that does not exist in the DataFrame is treated as a
//! configuration error rather than being silently ignored.
//! Errors are returned as [`TablePrepError`], and results are wrapped in [`TablePrepResult`].

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use datafusion::dataframe::DataFrame;
use datafusion::logical_expr::{col, Expr};

/// Removes the specified columns from the DataFrame.
///
/// All other columns keep their relative order, and rows are untouched.
pub struct DropColumns {
    pub columns: Vec<String>,
}

impl DropColumns {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Checks that every requested column exists in the DataFrame.
    fn validate(&self, df: &DataFrame) -> TablePrepResult<()> {
        let schema = df.schema();
        for col_name in &self.columns {
            if schema.field_with_name(None, col_name).is_err() {
                return Err(TablePrepError::MissingColumn(format!(
                    "Column '{}' not found in DataFrame",
                    col_name
                )));
            }
        }
        Ok(())
    }

    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        self.validate(df)
    }

    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        self.validate(&df)?;
        let keep_exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .filter_map(|field| {
                if !self.columns.contains(field.name()) {
                    Some(col(field.name()))
                } else {
                    None
                }
            })
            .collect();

        if keep_exprs.is_empty() {
            return Err(TablePrepError::InvalidParameter(
                "Dropping these columns would result in an empty DataFrame.".to_string(),
            ));
        }
        df.select(keep_exprs).map_err(TablePrepError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(DropColumns);
