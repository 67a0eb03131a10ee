//! ## Transformers for imputing missing values
//!
//! This module provides several transformers (or imputers) for dealing with missing values.
//!
//! Currently, the following transformers are implemented:
//!
//! - **MeanImputer**: Imputes numeric columns using the fit-set mean.
//! - **ConstantImputer**: Imputes numeric columns using a fixed arbitrary number.
//! - **CategoricalImputer**: Imputes categorical columns using the mode (or a provided default).
//!
//! Each transformer returns a new DataFrame with the applied imputation strategy on the
//! specified columns. Errors are returned as `TablePrepError` and results are wrapped
//! in `TablePrepResult`.

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use arrow::datatypes::DataType;
use datafusion::functions_aggregate::expr_fn::{avg, count};
use datafusion::logical_expr::{cast, col, lit, not, Case as DFCase, Expr};
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

/// Constructs an expression equivalent to SQL COALESCE(col, fallback).
/// This is implemented as a CASE expression: if `col` is not null then return it, otherwise return `fallback`.
fn coalesce_expr_for(name: &str, fallback: Expr) -> Expr {
    Expr::Case(DFCase {
        expr: None,
        when_then_expr: vec![(Box::new(not(col(name).is_null())), Box::new(col(name)))],
        else_expr: Some(Box::new(fallback)),
    })
}

/// Generic helper function to apply a fallback to a set of target columns.
/// For each field in the DataFrame, if its name is in `target_cols` and a fallback is
/// available via `get_fallback`, then the column is replaced by a CASE–WHEN expression;
/// otherwise, the original column is retained.
fn apply_imputation<F>(
    df: DataFrame,
    target_cols: &[String],
    get_fallback: F,
) -> TablePrepResult<DataFrame>
where
    F: Fn(&str) -> Option<Expr>,
{
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if target_cols.contains(name) {
                if let Some(fallback_expr) = get_fallback(name) {
                    coalesce_expr_for(name, fallback_expr).alias(name)
                } else {
                    col(name)
                }
            } else {
                col(name)
            }
        })
        .collect();
    df.select(exprs).map_err(TablePrepError::from)
}

/// Replaces missing values with the fit-set mean for numeric columns.
pub struct MeanImputer {
    pub columns: Vec<String>,
    pub impute_values: HashMap<String, f64>,
    fitted: bool,
}

impl MeanImputer {
    /// Create a new mean imputer for the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            impute_values: HashMap::new(),
            fitted: false,
        }
    }

    /// For each target column, compute the mean value via an aggregate query.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let agg_df = df
                .clone()
                .aggregate(
                    vec![],
                    vec![avg(cast(col(col_name), DataType::Float64)).alias("avg")],
                )
                .map_err(TablePrepError::from)?;
            let batches = agg_df.collect().await.map_err(TablePrepError::from)?;
            if let Some(batch) = batches.first() {
                if batch.num_rows() > 0 {
                    let scalar = ScalarValue::try_from_array(batch.column(0), 0)
                        .map_err(TablePrepError::from)?;
                    if let ScalarValue::Float64(Some(avg_val)) = scalar {
                        self.impute_values.insert(col_name.clone(), avg_val);
                    } else {
                        return Err(TablePrepError::DataFusionError(
                            datafusion::error::DataFusionError::Plan(format!(
                                "Failed to compute average for column {}",
                                col_name
                            )),
                        ));
                    }
                }
            }
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame where, for each target column, missing values are replaced with the mean.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        apply_imputation(df, &self.columns, |name| {
            self.impute_values.get(name).map(|&v| lit(v))
        })
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// Replaces missing values with the given number.
pub struct ConstantImputer {
    pub columns: Vec<String>,
    pub number: f64,
}

impl ConstantImputer {
    /// Create a new constant imputer for the given columns.
    pub fn new(columns: Vec<String>, number: f64) -> Self {
        Self { columns, number }
    }

    /// This transformer is stateless; fit validates the configuration.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        if !self.number.is_finite() {
            return Err(TablePrepError::InvalidParameter(format!(
                "Fixed number {} must be finite",
                self.number
            )));
        }
        Ok(())
    }

    /// Returns a new DataFrame where, for each target column, missing values are replaced with the fixed number.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        validate_columns(&df, &self.columns)?;
        apply_imputation(df, &self.columns, |_| Some(lit(self.number)))
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

/// Replaces missing values with the mode (or a provided default) for categorical columns.
pub struct CategoricalImputer {
    pub columns: Vec<String>,
    pub default: Option<String>,
    pub impute_values: HashMap<String, String>,
    fitted: bool,
}

impl CategoricalImputer {
    /// Create a new categorical imputer for the given columns and optional default.
    pub fn new(columns: Vec<String>, default: Option<String>) -> Self {
        Self {
            columns,
            default,
            impute_values: HashMap::new(),
            fitted: false,
        }
    }

    /// For each target column, if no default is provided, compute the mode via grouping and counting.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        if self.default.is_none() {
            for col_name in &self.columns {
                let grouped = df
                    .clone()
                    .aggregate(vec![col(col_name)], vec![count(col(col_name)).alias("cnt")])
                    .map_err(TablePrepError::from)?
                    .sort(vec![col("cnt").sort(false, false)])
                    .map_err(TablePrepError::from)?
                    .limit(0, Some(1))
                    .map_err(TablePrepError::from)?;
                let batches = grouped.collect().await.map_err(TablePrepError::from)?;
                if let Some(batch) = batches.first() {
                    let scalar = ScalarValue::try_from_array(batch.column(0), 0)
                        .map_err(TablePrepError::from)?;
                    if let ScalarValue::Utf8(Some(mode_val)) = scalar {
                        self.impute_values.insert(col_name.clone(), mode_val);
                    } else {
                        return Err(TablePrepError::DataFusionError(
                            datafusion::error::DataFusionError::Plan(format!(
                                "Failed to compute mode for column {}",
                                col_name
                            )),
                        ));
                    }
                }
            }
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame where, for each target column, missing values are replaced
    /// with the computed mode (or the provided default).
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        apply_imputation(df, &self.columns, |name| {
            if let Some(default_val) = &self.default {
                Some(lit(default_val.clone()))
            } else {
                self.impute_values
                    .get(name)
                    .map(|mode_val| lit(mode_val.clone()))
            }
        })
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

impl_transformer!(MeanImputer);
impl_transformer!(ConstantImputer);
impl_transformer!(CategoricalImputer);
