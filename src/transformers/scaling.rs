//! ## Scaling and Normalization Transformers
//!
//! This module provides transformers for rescaling numeric columns.
//!
//! - [`StandardScaler`]: Centers each column on its fit-set mean and scales by the
//!   sample standard deviation.
//! - [`MinMaxScaler`]: Rescales each column to the `[0, 1]` range of its fit-set
//!   minimum and maximum.
//!
//! Both transformers learn their parameters once at fit time and apply the frozen
//! parameters to every subsequent batch. Constant columns scale by 1 (centering only)
//! rather than dividing by zero.
//! Errors are returned as [`TablePrepError`], and results are wrapped in [`TablePrepResult`].

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{avg, stddev};
use datafusion::functions_aggregate::min_max::{max, min};
use datafusion::logical_expr::{cast, col, lit, Expr};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;

/// Validates that every column in `target_cols` exists in the DataFrame.
fn validate_columns(df: &DataFrame, target_cols: &[String]) -> TablePrepResult<()> {
    let schema = df.schema();
    for col_name in target_cols {
        if schema.field_with_name(None, col_name).is_err() {
            return Err(TablePrepError::MissingColumn(format!(
                "Column '{}' not found in DataFrame",
                col_name
            )));
        }
    }
    Ok(())
}

/// Runs a two-aggregate query over a column and extracts both results as Float64.
/// The second aggregate may be null (e.g. stddev of a single row), reported as None.
async fn compute_pair(
    df: &DataFrame,
    col_name: &str,
    first: Expr,
    second: Expr,
) -> TablePrepResult<(f64, Option<f64>)> {
    let agg_df = df
        .clone()
        .aggregate(vec![], vec![first.alias("first"), second.alias("second")])
        .map_err(TablePrepError::from)?;
    let batches = agg_df.collect().await.map_err(TablePrepError::from)?;
    let batch = batches.first().filter(|b| b.num_rows() > 0).ok_or_else(|| {
        TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(format!(
            "No data found when computing statistics for column {}",
            col_name
        )))
    })?;
    let first_scalar =
        ScalarValue::try_from_array(batch.column(0), 0).map_err(TablePrepError::from)?;
    let second_scalar =
        ScalarValue::try_from_array(batch.column(1), 0).map_err(TablePrepError::from)?;
    let first_val = match first_scalar {
        ScalarValue::Float64(Some(val)) => val,
        _ => {
            return Err(TablePrepError::DataFusionError(
                datafusion::error::DataFusionError::Plan(format!(
                    "Failed to compute statistics for column {}",
                    col_name
                )),
            ))
        }
    };
    let second_val = match second_scalar {
        ScalarValue::Float64(val) => val,
        _ => None,
    };
    Ok((first_val, second_val))
}

/// Builds the per-column rescaling expression `(col - offset) / divisor`.
fn rescale_expr(col_name: &str, offset: f64, divisor: f64) -> Expr {
    (cast(col(col_name), DataType::Float64) - lit(offset)) / lit(divisor)
}

/// Centers columns on the fit-set mean and scales by the sample standard deviation.
pub struct StandardScaler {
    pub columns: Vec<String>,
    /// Per-column (mean, std) learned at fit time.
    pub params: HashMap<String, (f64, f64)>,
    fitted: bool,
}

impl StandardScaler {
    /// Create a new StandardScaler for the specified columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            params: HashMap::new(),
            fitted: false,
        }
    }

    /// Compute the mean and sample standard deviation for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let (mean, std) = compute_pair(
                df,
                col_name,
                avg(cast(col(col_name), DataType::Float64)),
                stddev(cast(col(col_name), DataType::Float64)),
            )
            .await?;
            self.params.insert(col_name.clone(), (mean, std.unwrap_or(0.0)));
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame with each target column mapped to `(x - mean) / std`.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.params.get(name) {
                    Some(&(mean, std)) if self.columns.contains(name) => {
                        let divisor = if std.is_finite() && std != 0.0 { std } else { 1.0 };
                        rescale_expr(name, mean, divisor).alias(name)
                    }
                    _ => col(name),
                }
            })
            .collect();
        df.select(exprs).map_err(TablePrepError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// Rescales columns to the `[0, 1]` range of the fit-set minimum and maximum.
pub struct MinMaxScaler {
    pub columns: Vec<String>,
    /// Per-column (min, max) learned at fit time.
    pub params: HashMap<String, (f64, f64)>,
    fitted: bool,
}

impl MinMaxScaler {
    /// Create a new MinMaxScaler for the specified columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            params: HashMap::new(),
            fitted: false,
        }
    }

    /// Compute the minimum and maximum for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let (min_val, max_val) = compute_pair(
                df,
                col_name,
                min(cast(col(col_name), DataType::Float64)),
                max(cast(col(col_name), DataType::Float64)),
            )
            .await?;
            let max_val = max_val.ok_or_else(|| {
                TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(
                    format!("Failed to compute maximum for column {}", col_name),
                ))
            })?;
            self.params.insert(col_name.clone(), (min_val, max_val));
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame with each target column mapped to `(x - min) / (max - min)`.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        let exprs: Vec<Expr> = df
            .schema()
            .fields()
            .iter()
            .map(|field| {
                let name = field.name();
                match self.params.get(name) {
                    Some(&(min_val, max_val)) if self.columns.contains(name) => {
                        let range = max_val - min_val;
                        let divisor = if range.is_finite() && range != 0.0 { range } else { 1.0 };
                        rescale_expr(name, min_val, divisor).alias(name)
                    }
                    _ => col(name),
                }
            })
            .collect();
        df.select(exprs).map_err(TablePrepError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(StandardScaler);
impl_transformer!(MinMaxScaler);
