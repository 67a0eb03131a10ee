//! # Categorical Encoding Transformers
//!
//! This module provides several categorical encoding strategies to transform categorical
//! columns into numeric representations.
//!
//! The encoders include:
//! - **LabelEncoder:** Replaces each category with a stable integer code learned from the data.
//! - **OrdinalEncoder:** Replaces each category with its rank in an explicitly supplied order.
//! - **OneHotEncoder:** Expands each categorical column into binary indicator columns, one per
//!   active category, with optional frequency-based filtering of the active set.
//!
//! Each encoder exposes a similar API with a constructor, an asynchronous `fit` method
//! to learn necessary mappings from a training DataFrame, and a `transform` method that applies
//! the encoding to a DataFrame. The learned mappings are frozen after `fit`: categories unseen
//! at fit time map to the sentinel [`UNSEEN_SENTINEL`] (label/ordinal) or to the all-zero
//! indicator vector (one-hot), so inference stays robust to values absent from the training set.
//!
//! The module also provides [`align_to_columns`] for reindexing an encoded DataFrame against
//! the full column schema a downstream model expects.

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use arrow::array::Array;
use datafusion::logical_expr::{col, lit, Case as DFCase, Expr};
use datafusion::prelude::*;
use std::collections::{HashMap, HashSet};

/// Integer code emitted by [`LabelEncoder`] and [`OrdinalEncoder`] for values
/// (including nulls) that were not part of the fit-time vocabulary.
pub const UNSEEN_SENTINEL: i64 = -1;

/// Policy for category values outside the fit-time active set at transform time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPolicy {
    /// Encode unknown values as the all-zero indicator vector.
    Ignore,
    /// Fail the transform with [`TablePrepError::UnknownCategory`].
    Error,
}

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

/// Helper to build a CASE WHEN expression given a mapping from category strings to values.
/// For each pair, the expression generated is:
/// `WHEN <col> = lit(<category>) THEN lit(<encoded_value>)`
/// If provided, `default` is used as the ELSE branch; otherwise, the original column is returned.
fn build_case_expr<T: Clone + 'static + datafusion::logical_expr::Literal>(
    col_name: &str,
    mapping: &[(String, T)],
    default: Option<Expr>,
) -> Expr {
    let when_then_expr = mapping
        .iter()
        .map(|(cat, val)| {
            (
                Box::new(col(col_name).eq(lit(cat.clone()))),
                Box::new(lit(val.clone())),
            )
        })
        .collect();
    Expr::Case(DFCase {
        expr: None,
        when_then_expr,
        else_expr: default.map(Box::new),
    })
}

/// Extract distinct string values for a given column from a DataFrame.
async fn extract_distinct_values(
    df: &DataFrame,
    col_name: &str,
) -> TablePrepResult<Vec<String>> {
    let distinct_df = df.clone().select(vec![col(col_name)])?.distinct()?;
    let batches = distinct_df.collect().await.map_err(TablePrepError::from)?;
    let mut values = Vec::new();
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<datafusion::arrow::array::StringArray>()
            .ok_or_else(|| {
                TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(
                    format!("Expected Utf8 array for column {}", col_name),
                ))
            })?;
        for i in 0..array.len() {
            if !array.is_null(i) {
                values.push(array.value(i).to_string());
            }
        }
    }
    Ok(values)
}

/// Extract the active category set for a column, ranked by descending frequency with ties
/// broken by first-seen order. The scan is eager because the tie-break needs row order,
/// which an unordered aggregate cannot provide.
async fn extract_ranked_categories(
    df: &DataFrame,
    col_name: &str,
    min_frequency: Option<f64>,
    max_categories: Option<usize>,
) -> TablePrepResult<Vec<String>> {
    let batches = df
        .clone()
        .select(vec![col(col_name)])?
        .collect()
        .await
        .map_err(TablePrepError::from)?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut ranked: Vec<String> = Vec::new();
    let mut total = 0usize;
    for batch in batches {
        let array = batch
            .column(0)
            .as_any()
            .downcast_ref::<datafusion::arrow::array::StringArray>()
            .ok_or_else(|| {
                TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(
                    format!("Expected Utf8 array for column {}", col_name),
                ))
            })?;
        for i in 0..array.len() {
            if array.is_null(i) {
                continue;
            }
            let value = array.value(i);
            total += 1;
            match counts.get_mut(value) {
                Some(count) => *count += 1,
                None => {
                    counts.insert(value.to_string(), 1);
                    ranked.push(value.to_string());
                }
            }
        }
    }
    // `ranked` holds first-appearance order; the stable sort keeps it for equal counts.
    ranked.sort_by_key(|cat| std::cmp::Reverse(counts[cat]));
    if let Some(min_freq) = min_frequency {
        let total = total.max(1) as f64;
        ranked.retain(|cat| counts[cat] as f64 / total >= min_freq);
    }
    if let Some(max_cats) = max_categories {
        ranked.truncate(max_cats);
    }
    Ok(ranked)
}

/// Generic helper to apply a mapping to each target column in a DataFrame.
/// For each field, if the column is in `target_cols` and a mapping is available via `mapping_fn`,
/// then the function replaces the column with a CASE–WHEN expression; otherwise, the original
/// column is retained. The `default_fn` closure produces the ELSE expression for a given column.
fn apply_mapping<T: Clone + 'static + datafusion::logical_expr::Literal>(
    df: DataFrame,
    target_cols: &[String],
    mapping_fn: impl Fn(&str) -> Option<Vec<(String, T)>>,
    default_fn: impl Fn(&str) -> Option<Expr>,
) -> TablePrepResult<DataFrame> {
    let exprs: Vec<Expr> = df
        .schema()
        .fields()
        .iter()
        .map(|field| {
            let name = field.name();
            if target_cols.contains(name) {
                if let Some(map) = mapping_fn(name) {
                    build_case_expr(name, &map, default_fn(name)).alias(name)
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

/// ------------------------- LabelEncoder -------------------------
///
/// LabelEncoder replaces each category with an integer code. The vocabulary is learned at
/// fit time from the distinct observed values, sorted lexicographically so that the
/// value-to-code assignment is stable across runs. Values unseen at fit time (including
/// nulls) encode to [`UNSEEN_SENTINEL`]. Encoding one column never affects another.
pub struct LabelEncoder {
    pub columns: Vec<String>,
    /// Mapping from column to (category -> integer code), frozen after fit.
    pub mapping: HashMap<String, HashMap<String, i64>>,
    fitted: bool,
}

impl LabelEncoder {
    /// Create a new LabelEncoder for the specified columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            mapping: HashMap::new(),
            fitted: false,
        }
    }

    /// Learn a stable value-to-code map for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        for col_name in &self.columns {
            let mut values = extract_distinct_values(df, col_name).await?;
            values.sort();
            let mapping = values
                .into_iter()
                .enumerate()
                .map(|(i, cat)| (cat, i as i64))
                .collect();
            self.mapping.insert(col_name.clone(), mapping);
        }
        self.fitted = true;
        Ok(())
    }

    /// Transform the DataFrame by replacing each target column's value with its code.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        apply_mapping(
            df,
            &self.columns,
            |name| {
                self.mapping.get(name).map(|m| {
                    m.iter()
                        .map(|(k, &v)| (k.clone(), v))
                        .collect::<Vec<(String, i64)>>()
                })
            },
            |_| Some(lit(UNSEEN_SENTINEL)),
        )
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// ------------------------- OrdinalEncoder -------------------------
///
/// OrdinalEncoder replaces each category with its rank in an explicitly supplied total
/// order (low to high). Unlike [`LabelEncoder`], the code assignment comes from
/// configuration, not from the data; fit only validates the columns and order specs.
/// Values outside the supplied order encode to [`UNSEEN_SENTINEL`].
pub struct OrdinalEncoder {
    /// Per-column category order, low to high.
    pub orderings: Vec<(String, Vec<String>)>,
    /// Mapping from column to (category -> rank), frozen after fit.
    pub mapping: HashMap<String, HashMap<String, i64>>,
    fitted: bool,
}

impl OrdinalEncoder {
    /// Create a new OrdinalEncoder from explicit per-column category orders.
    pub fn new(orderings: Vec<(String, Vec<String>)>) -> Self {
        Self {
            orderings,
            mapping: HashMap::new(),
            fitted: false,
        }
    }

    fn column_names(&self) -> Vec<String> {
        self.orderings.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Validate the order specs and assign rank indices per the supplied order.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.column_names())?;
        for (col_name, order) in &self.orderings {
            if order.is_empty() {
                return Err(TablePrepError::InvalidParameter(format!(
                    "Category order for column '{}' must not be empty",
                    col_name
                )));
            }
            let mut seen = HashSet::new();
            for cat in order {
                if !seen.insert(cat) {
                    return Err(TablePrepError::InvalidParameter(format!(
                        "Category order for column '{}' contains duplicate value '{}'",
                        col_name, cat
                    )));
                }
            }
            let mapping = order
                .iter()
                .enumerate()
                .map(|(i, cat)| (cat.clone(), i as i64))
                .collect();
            self.mapping.insert(col_name.clone(), mapping);
        }
        self.fitted = true;
        Ok(())
    }

    /// Transform the DataFrame by replacing each target column's value with its rank.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        let columns = self.column_names();
        validate_columns(&df, &columns)?;
        apply_mapping(
            df,
            &columns,
            |name| {
                self.mapping.get(name).map(|m| {
                    m.iter()
                        .map(|(k, &v)| (k.clone(), v))
                        .collect::<Vec<(String, i64)>>()
                })
            },
            |_| Some(lit(UNSEEN_SENTINEL)),
        )
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// ------------------------- OneHotEncoder -------------------------
///
/// OneHotEncoder expands each categorical column, in place, into one binary indicator
/// column per active category, named `{column}_{category}`. The active set is learned at
/// fit time: all observed values, or — when `min_frequency` and/or `max_categories` are
/// set — only the values meeting the relative-frequency floor and within the top-N,
/// ranked by descending frequency with ties broken by first-seen order.
///
/// The output column set and order is identical for every call after fit, regardless of
/// what categories appear in the input batch. Values outside the active set (including
/// nulls) produce the all-zero vector under [`UnknownPolicy::Ignore`] or an error under
/// [`UnknownPolicy::Error`].
pub struct OneHotEncoder {
    pub columns: Vec<String>,
    pub policy: UnknownPolicy,
    /// Minimum relative frequency for a category to stay in the active set.
    pub min_frequency: Option<f64>,
    /// Maximum number of categories kept per column.
    pub max_categories: Option<usize>,
    /// Mapping from column name to its ordered active category set, frozen after fit.
    pub categories: HashMap<String, Vec<String>>,
    fitted: bool,
}

impl OneHotEncoder {
    /// Create a new OneHotEncoder keeping every observed category and ignoring unknowns.
    pub fn new(columns: Vec<String>) -> Self {
        Self::with_config(columns, UnknownPolicy::Ignore, None, None)
    }

    /// Create a new OneHotEncoder with an explicit unknown-value policy and
    /// optional frequency filtering of the active category set.
    pub fn with_config(
        columns: Vec<String>,
        policy: UnknownPolicy,
        min_frequency: Option<f64>,
        max_categories: Option<usize>,
    ) -> Self {
        Self {
            columns,
            policy,
            min_frequency,
            max_categories,
            categories: HashMap::new(),
            fitted: false,
        }
    }

    /// Learn the active category set for each target column.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        validate_columns(df, &self.columns)?;
        if let Some(min_freq) = self.min_frequency {
            if !(0.0..=1.0).contains(&min_freq) {
                return Err(TablePrepError::InvalidParameter(format!(
                    "min_frequency {} must be between 0 and 1",
                    min_freq
                )));
            }
        }
        if let Some(max_cats) = self.max_categories {
            if max_cats == 0 {
                return Err(TablePrepError::InvalidParameter(
                    "max_categories must be at least 1".to_string(),
                ));
            }
        }
        for col_name in &self.columns {
            let cats = extract_ranked_categories(
                df,
                col_name,
                self.min_frequency,
                self.max_categories,
            )
            .await?;
            self.categories.insert(col_name.clone(), cats);
        }
        self.fitted = true;
        Ok(())
    }

    /// Scan the batch for category values outside the active set and fail on the first one.
    /// Nulls are missing data, not unknown categories, and are not rejected here.
    async fn reject_unknown(&self, df: &DataFrame) -> TablePrepResult<()> {
        for col_name in &self.columns {
            let active: HashSet<&str> = match self.categories.get(col_name) {
                Some(cats) => cats.iter().map(|s| s.as_str()).collect(),
                None => continue,
            };
            let batches = df
                .clone()
                .select(vec![col(col_name)])?
                .collect()
                .await
                .map_err(TablePrepError::from)?;
            for batch in batches {
                let array = batch
                    .column(0)
                    .as_any()
                    .downcast_ref::<datafusion::arrow::array::StringArray>()
                    .ok_or_else(|| {
                        TablePrepError::DataFusionError(datafusion::error::DataFusionError::Plan(
                            format!("Expected Utf8 array for column {}", col_name),
                        ))
                    })?;
                for i in 0..array.len() {
                    if !array.is_null(i) && !active.contains(array.value(i)) {
                        return Err(TablePrepError::UnknownCategory(format!(
                            "column '{}' value '{}' was not seen during fit",
                            col_name,
                            array.value(i)
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Transform the DataFrame by replacing each target column with its indicator columns.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        if !self.fitted {
            return Err(TablePrepError::FitNotCalled);
        }
        validate_columns(&df, &self.columns)?;
        if self.policy == UnknownPolicy::Error {
            self.reject_unknown(&df).await?;
        }
        let mut exprs = vec![];
        for field in df.schema().fields() {
            let name = field.name();
            if self.columns.contains(name) {
                let cats = self.categories.get(name).ok_or_else(|| {
                    TablePrepError::InvalidParameter(format!(
                        "No fitted categories for column '{}'",
                        name
                    ))
                })?;
                for cat in cats {
                    let new_col_name = format!("{}_{}", name, cat);
                    let case_expr = Expr::Case(DFCase {
                        expr: None,
                        when_then_expr: vec![(
                            Box::new(col(name).eq(lit(cat.clone()))),
                            Box::new(lit(1_i32)),
                        )],
                        else_expr: Some(Box::new(lit(0_i32))),
                    })
                    .alias(new_col_name);
                    exprs.push(case_expr);
                }
            } else {
                exprs.push(col(name));
            }
        }
        df.select(exprs).map_err(TablePrepError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        true
    }
}

/// Reindexes a DataFrame against the full column list a downstream model expects.
/// Expected columns present in the input are kept in the given order, absent indicator
/// columns are filled with zero, and columns not in the expected list are dropped.
pub fn align_to_columns(df: DataFrame, expected: &[String]) -> TablePrepResult<DataFrame> {
    if expected.is_empty() {
        return Err(TablePrepError::InvalidParameter(
            "Expected column list must not be empty.".to_string(),
        ));
    }
    let schema = df.schema();
    let exprs: Vec<Expr> = expected
        .iter()
        .map(|name| {
            if schema.field_with_name(None, name).is_ok() {
                col(name)
            } else {
                lit(0_i32).alias(name)
            }
        })
        .collect();
    df.select(exprs).map_err(TablePrepError::from)
}

impl_transformer!(LabelEncoder);
impl_transformer!(OrdinalEncoder);
impl_transformer!(OneHotEncoder);
