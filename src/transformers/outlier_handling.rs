//! ## Transformers for handling outliers
//!
//! This module provides a transformer for removing statistical outliers from a dataset.
//!
//! - [`ZScoreOutlierRemover`]: Removes whole rows whose z-score in **any** monitored
//!   numeric column exceeds an absolute threshold.
//!
//! The mean and standard deviation used for the z-scores come either from the fit set
//! (frozen at fit time) or from the transform input itself, chosen explicitly via
//! [`StatsPolicy`] — the statistics source is configuration, never hidden behavior.
//! The per-row exclusion mask is retained after each `transform` call and can be
//! inspected via [`ZScoreOutlierRemover::outlier_mask`].
//! Errors are returned as [`TablePrepError`], and results are wrapped in [`TablePrepResult`].

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use arrow::array::{Array, BooleanArray, Float64Array};
use arrow::compute::{cast as cast_kernel, filter_record_batch};
use arrow::datatypes::DataType;
use datafusion::datasource::MemTable;
use datafusion::functions_aggregate::expr_fn::{avg, stddev};
use datafusion::logical_expr::{cast, col};
use datafusion::prelude::*;
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Absolute z-score above which a value marks its row as an outlier.
pub const DEFAULT_ZSCORE_THRESHOLD: f64 = 3.0;

/// Where the mean and standard deviation for z-scores come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsPolicy {
    /// Use the statistics computed from the fit set, frozen at fit time.
    FitSet,
    /// Recompute the statistics from the transform input itself on every call.
    PerBatch,
}

/// Returns true for the numeric column types the remover monitors.
fn is_numeric(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
    )
}

/// Mean and sample standard deviation over the non-null values, or None when
/// fewer than two values are available.
fn sample_stats(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let xs: Vec<f64> = values.iter().flatten().copied().collect();
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

/// Computes (mean, sample std) for a column via an aggregate query.
/// Returns None when the column has no usable values (empty or all-null input).
async fn compute_column_stats(
    df: &DataFrame,
    col_name: &str,
) -> TablePrepResult<Option<(f64, f64)>> {
    let agg_df = df
        .clone()
        .aggregate(
            vec![],
            vec![
                avg(cast(col(col_name), DataType::Float64)).alias("mean"),
                stddev(cast(col(col_name), DataType::Float64)).alias("std"),
            ],
        )
        .map_err(TablePrepError::from)?;
    let batches = agg_df.collect().await.map_err(TablePrepError::from)?;
    if let Some(batch) = batches.first() {
        if batch.num_rows() > 0 {
            let mean = ScalarValue::try_from_array(batch.column(0), 0)
                .map_err(TablePrepError::from)?;
            let std = ScalarValue::try_from_array(batch.column(1), 0)
                .map_err(TablePrepError::from)?;
            if let (ScalarValue::Float64(Some(mean)), ScalarValue::Float64(Some(std))) =
                (mean, std)
            {
                return Ok(Some((mean, std)));
            }
        }
    }
    Ok(None)
}

/// Removes rows whose absolute z-score exceeds the threshold in any monitored column.
///
/// Rows, not columns, are the unit of removal: a single extreme value drops the whole
/// row. Columns with zero (or undefined) standard deviation flag nothing, nulls are
/// never flagged, and an output with zero surviving rows is valid. The transformer can
/// monitor an explicit column list or auto-detect the numeric columns at fit time.
pub struct ZScoreOutlierRemover {
    /// Explicit columns to monitor; None auto-detects numeric columns at fit time.
    pub columns: Option<Vec<String>>,
    pub threshold: f64,
    pub stats_policy: StatsPolicy,
    /// Columns actually monitored, resolved at fit time.
    pub target_columns: Vec<String>,
    /// Per-column (mean, std) frozen at fit time under [`StatsPolicy::FitSet`].
    pub stats: HashMap<String, (f64, f64)>,
    last_mask: Mutex<Option<Vec<bool>>>,
    fitted: bool,
}

impl ZScoreOutlierRemover {
    /// Create a remover that auto-detects numeric columns at fit time.
    pub fn new(threshold: f64, stats_policy: StatsPolicy) -> Self {
        Self {
            columns: None,
            threshold,
            stats_policy,
            target_columns: Vec::new(),
            stats: HashMap::new(),
            last_mask: Mutex::new(None),
            fitted: false,
        }
    }

    /// Create a remover that monitors exactly the given columns.
    pub fn with_columns(columns: Vec<String>, threshold: f64, stats_policy: StatsPolicy) -> Self {
        Self {
            columns: Some(columns),
            ..Self::new(threshold, stats_policy)
        }
    }

    /// Resolve the monitored columns and, under [`StatsPolicy::FitSet`], freeze
    /// the per-column statistics.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(TablePrepError::InvalidParameter(format!(
                "Z-score threshold {} must be a positive finite number",
                self.threshold
            )));
        }
        let schema = df.schema();
        self.target_columns = match &self.columns {
            Some(cols) => {
                for col_name in cols {
                    let field = schema.field_with_name(None, col_name).map_err(|_| {
                        TablePrepError::MissingColumn(format!(
                            "Column '{}' not found in DataFrame",
                            col_name
                        ))
                    })?;
                    if !is_numeric(field.data_type()) {
                        return Err(TablePrepError::InvalidParameter(format!(
                            "Column '{}' must be numeric for z-score filtering, but found {:?}",
                            col_name,
                            field.data_type()
                        )));
                    }
                }
                cols.clone()
            }
            None => schema
                .fields()
                .iter()
                .filter(|field| is_numeric(field.data_type()))
                .map(|field| field.name().to_string())
                .collect(),
        };

        self.stats.clear();
        if self.stats_policy == StatsPolicy::FitSet {
            for col_name in &self.target_columns {
                if let Some(stats) = compute_column_stats(df, col_name).await? {
                    self.stats.insert(col_name.clone(), stats);
                }
            }
        }
        self.fitted = true;
        Ok(())
    }

    /// Returns a new DataFrame with flagged rows removed, retaining the exclusion mask.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        let schema = df.schema();
        for col_name in &self.target_columns {
            if schema.field_with_name(None, col_name).is_err() {
                return Err(TablePrepError::MissingColumn(format!(
                    "Column '{}' not found in DataFrame",
                    col_name
                )));
            }
        }

        let arrow_schema = Arc::new(df.schema().as_arrow().clone());
        let batches = df.collect().await.map_err(TablePrepError::from)?;
        let num_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        let mut flags = vec![false; num_rows];

        for col_name in &self.target_columns {
            let mut values: Vec<Option<f64>> = Vec::with_capacity(num_rows);
            for batch in &batches {
                let idx = batch
                    .schema()
                    .index_of(col_name)
                    .map_err(TablePrepError::from)?;
                let casted = cast_array(batch.column(idx), col_name)?;
                for i in 0..casted.len() {
                    values.push(if casted.is_null(i) {
                        None
                    } else {
                        Some(casted.value(i))
                    });
                }
            }
            let (mean, std) = match self.stats_policy {
                StatsPolicy::FitSet => match self.stats.get(col_name) {
                    Some(&stats) => stats,
                    None => continue,
                },
                StatsPolicy::PerBatch => match sample_stats(&values) {
                    Some(stats) => stats,
                    None => continue,
                },
            };
            // Constant columns (std = 0) cannot flag anything.
            if !std.is_finite() || std == 0.0 {
                continue;
            }
            for (i, value) in values.iter().enumerate() {
                if let Some(value) = value {
                    if ((value - mean) / std).abs() > self.threshold {
                        flags[i] = true;
                    }
                }
            }
        }

        let mut out_batches = Vec::with_capacity(batches.len());
        let mut offset = 0;
        for batch in &batches {
            let keep: BooleanArray = flags[offset..offset + batch.num_rows()]
                .iter()
                .map(|&flagged| Some(!flagged))
                .collect();
            offset += batch.num_rows();
            out_batches.push(filter_record_batch(batch, &keep).map_err(TablePrepError::from)?);
        }

        *self
            .last_mask
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(flags);

        let table = MemTable::try_new(arrow_schema, vec![out_batches])?;
        let ctx = SessionContext::new();
        ctx.read_table(Arc::new(table)).map_err(TablePrepError::from)
    }

    /// The per-row exclusion mask from the most recent `transform` call
    /// (`true` = row was removed as an outlier), or None before the first call.
    pub fn outlier_mask(&self) -> Option<Vec<bool>> {
        self.last_mask
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// Casts a monitored column to Float64 for z-score computation.
fn cast_array(
    array: &arrow::array::ArrayRef,
    col_name: &str,
) -> TablePrepResult<Float64Array> {
    let casted = cast_kernel(array, &DataType::Float64).map_err(TablePrepError::from)?;
    casted
        .as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| {
            TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(format!(
                "Expected numeric array for column {}",
                col_name
            )))
        })
}

impl_transformer!(ZScoreOutlierRemover);
