//! ## Measurement Parsing Transformers
//!
//! This module provides a transformer for turning free-text measurement columns into
//! canonical numeric values.
//!
//! - [`MeasurementParser`]: Parses unit-decorated numeric strings (e.g. `23.5 inch`, `13"`)
//!   and compound feet-and-inches strings (e.g. `9' 6"`, canonicalized to inches).
//!
//! Values that cannot be parsed, and explicitly-missing values, become nulls — never zero —
//! so downstream imputation can treat them uniformly. Parsing requires the actual cell
//! contents, so `transform` materializes the batches and rebuilds the DataFrame with the
//! target columns retyped as nullable Float64.
//! Errors are returned as [`TablePrepError`], and results are wrapped in [`TablePrepResult`].

use crate::exceptions::{TablePrepError, TablePrepResult};
use crate::impl_transformer;
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use rayon::prelude::*;
use std::sync::Arc;

/// How a measurement column's text should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementFormat {
    /// A number with unit decoration; the first numeric token is used,
    /// fractional parts preserved.
    UnitSuffixed,
    /// A feet-and-inches compound (`9' 6"`), converted to inches.
    FeetInches,
}

/// Returns the first run of digits and dots in `raw` parsed as a float, if any.
fn first_number(raw: &str) -> Option<f64> {
    let mut token = String::new();
    for ch in raw.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            token.push(ch);
        } else if !token.is_empty() {
            break;
        }
    }
    token.parse::<f64>().ok()
}

/// Parses a feet-and-inches string such as `9' 6"` into total inches.
/// The part after the inch mark is ignored; a missing inches component counts as zero.
fn parse_feet_inches(raw: &str) -> Option<f64> {
    let cleaned = raw.replace('\'', "");
    let before_inch_mark = cleaned.split('"').next().unwrap_or("");
    let mut parts = before_inch_mark.split_whitespace();
    let feet: f64 = parts.next()?.parse().ok()?;
    let inches: f64 = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0.0,
    };
    Some(feet * 12.0 + inches)
}

fn parse_value(raw: &str, format: MeasurementFormat) -> Option<f64> {
    match format {
        MeasurementFormat::UnitSuffixed => first_number(raw),
        MeasurementFormat::FeetInches => parse_feet_inches(raw),
    }
}

/// Parses free-text measurement columns into nullable Float64 columns.
///
/// Each target column is configured with the [`MeasurementFormat`] describing its
/// contents. All other columns pass through unchanged, and row order is preserved.
pub struct MeasurementParser {
    /// Target columns and the format to parse each one with.
    pub formats: Vec<(String, MeasurementFormat)>,
}

impl MeasurementParser {
    pub fn new(formats: Vec<(String, MeasurementFormat)>) -> Self {
        Self { formats }
    }

    fn format_for(&self, col_name: &str) -> Option<MeasurementFormat> {
        self.formats
            .iter()
            .find(|(name, _)| name == col_name)
            .map(|(_, format)| *format)
    }

    /// Checks that every target column exists and holds Utf8 text.
    fn validate(&self, df: &DataFrame) -> TablePrepResult<()> {
        for (col_name, _) in &self.formats {
            let field = df.schema().field_with_name(None, col_name).map_err(|_| {
                TablePrepError::MissingColumn(format!(
                    "Column '{}' not found in DataFrame",
                    col_name
                ))
            })?;
            match field.data_type() {
                DataType::Utf8 => {}
                dt => {
                    return Err(TablePrepError::InvalidParameter(format!(
                        "Column '{}' must be Utf8 text to parse measurements, but found {:?}",
                        col_name, dt
                    )))
                }
            }
        }
        Ok(())
    }

    /// This transformer learns nothing from the data; fit only validates configuration.
    pub async fn fit(&mut self, df: &DataFrame) -> TablePrepResult<()> {
        self.validate(df)
    }

    /// Returns a new DataFrame with each target column parsed to nullable Float64.
    pub async fn transform(&self, df: DataFrame) -> TablePrepResult<DataFrame> {
        self.validate(&df)?;
        let input_schema = df.schema().as_arrow().clone();
        let batches = df.collect().await.map_err(TablePrepError::from)?;

        let fields: Vec<Field> = input_schema
            .fields()
            .iter()
            .map(|field| {
                if self.format_for(field.name()).is_some() {
                    Field::new(field.name(), DataType::Float64, true)
                } else {
                    field.as_ref().clone()
                }
            })
            .collect();
        let out_schema = Arc::new(Schema::new(fields));

        let mut out_batches = Vec::with_capacity(batches.len());
        for batch in &batches {
            let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
            for (i, field) in batch.schema().fields().iter().enumerate() {
                if let Some(format) = self.format_for(field.name()) {
                    let array = batch
                        .column(i)
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .ok_or_else(|| {
                            TablePrepError::DataFusionError(
                                datafusion::error::DataFusionError::Plan(format!(
                                    "Expected Utf8 array for column {}",
                                    field.name()
                                )),
                            )
                        })?;
                    let parsed: Vec<Option<f64>> = (0..array.len())
                        .into_par_iter()
                        .map(|row| {
                            if array.is_null(row) {
                                None
                            } else {
                                parse_value(array.value(row), format)
                            }
                        })
                        .collect();
                    columns.push(Arc::new(Float64Array::from(parsed)));
                } else {
                    columns.push(batch.column(i).clone());
                }
            }
            out_batches.push(
                RecordBatch::try_new(out_schema.clone(), columns).map_err(TablePrepError::from)?,
            );
        }

        let table = MemTable::try_new(out_schema, vec![out_batches])?;
        let ctx = SessionContext::new();
        ctx.read_table(Arc::new(table)).map_err(TablePrepError::from)
    }

    fn inherent_is_stateful(&self) -> bool {
        false
    }
}

impl_transformer!(MeasurementParser);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number() {
        assert_eq!(first_number("23.5 inch"), Some(23.5));
        assert_eq!(first_number("13\""), Some(13.0));
        assert_eq!(first_number("None or Unspecified"), None);
        assert_eq!(first_number(""), None);
        assert_eq!(first_number("size 10 to 20"), Some(10.0));
    }

    #[test]
    fn test_parse_feet_inches() {
        assert_eq!(parse_feet_inches("9' 6\""), Some(114.0));
        assert_eq!(parse_feet_inches("9'"), Some(108.0));
        assert_eq!(parse_feet_inches("None or Unspecified"), None);
        assert_eq!(parse_feet_inches(""), None);
    }
}
