use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::DashError;

/// Plot-ready measurements for one source.
///
/// `x_values` and `y_values` are always the same length and index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    x_values: Vec<DateTime<Utc>>,
    y_values: Vec<f64>,
}

impl PlotSeries {
    pub fn from_payload(payload: &Value) -> Result<Self, DashError> {
        let object = payload
            .as_object()
            .ok_or_else(|| DashError::PayloadParse("expected a JSON object".to_string()))?;

        let mut x_values = Vec::with_capacity(object.len());
        let mut y_values = Vec::with_capacity(object.len());
        for (timestamp, value) in object {
            x_values.push(parse_timestamp(timestamp)?);
            y_values.push(parse_value(timestamp, value)?);
        }

        Ok(Self { x_values, y_values })
    }

    pub fn x_values(&self) -> &[DateTime<Utc>] {
        &self.x_values
    }

    pub fn y_values(&self) -> &[f64] {
        &self.y_values
    }

    pub fn len(&self) -> usize {
        self.x_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_values.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.x_values
            .iter()
            .copied()
            .zip(self.y_values.iter().copied())
    }

    pub fn time_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.x_values.iter().min()?;
        let last = self.x_values.iter().max()?;
        Some((*first, *last))
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DashError> {
    let millis: i64 = raw
        .trim()
        .parse()
        .map_err(|_| DashError::PayloadParse(format!("invalid timestamp {raw:?}")))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DashError::PayloadParse(format!("timestamp out of range {raw:?}")))
}

fn parse_value(timestamp: &str, value: &Value) -> Result<f64, DashError> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| DashError::PayloadParse(format!("unrepresentable value at {timestamp}"))),
        other => Err(DashError::PayloadParse(format!(
            "non-numeric value at {timestamp}: {other}"
        ))),
    }
}
