//! Row coercion from report cells to typed JSON values

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use csv::StringRecord;
use serde_json::{Map, Number, Value};

use crate::catalog::PrimitiveType;
use crate::error::{Result, TapError};
use crate::schema::OutputSchema;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Coerce one raw cell.
///
/// Surrounding whitespace is ignored and a blank cell is `null` for every
/// type. Integers and numbers may carry thousands separators; numbers may
/// carry a trailing `%`, which is dropped without rescaling.
pub fn coerce(kind: PrimitiveType, raw: &str) -> std::result::Result<Value, String> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(Value::Null);
    }

    match kind {
        PrimitiveType::String => Ok(Value::String(value.to_string())),
        PrimitiveType::Integer => {
            let cleaned: String = value.chars().filter(|&c| c != ',').collect();
            cleaned
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| format!("not an integer: {e}"))
        },
        PrimitiveType::Number => {
            let cleaned: String = value.chars().filter(|&c| c != ',' && c != '%').collect();
            let parsed = cleaned
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("not a number: {e}"))?;
            Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(|| "not a finite number".to_string())
        },
        PrimitiveType::Date => parse_date(value)
            .map(|date| Value::String(render(date.and_time(NaiveTime::MIN).and_utc())))
            .ok_or_else(|| "unrecognised date".to_string()),
        PrimitiveType::DateTime => parse_datetime(value)
            .map(|dt| Value::String(render(dt)))
            .ok_or_else(|| "unrecognised date-time".to_string()),
    }
}

fn render(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(value).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
            .map(|date| date.and_time(NaiveTime::MIN).and_utc())
    })
}

// Date columns occasionally arrive with a midnight time component.
fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| parse_timestamp(value).map(|dt| dt.date_naive()))
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

struct Column {
    index: usize,
    raw: String,
    canonical: String,
    kind: PrimitiveType,
}

/// Turns report rows into records keyed by canonical field name
pub struct RowTransformer {
    columns: Vec<Column>,
}

impl RowTransformer {
    /// Bind each schema field to its position in `header`
    pub fn new(header: &[String], schema: &OutputSchema) -> Self {
        let columns = schema
            .fields()
            .iter()
            .filter_map(|field| {
                header
                    .iter()
                    .position(|h| h.trim() == field.raw)
                    .map(|index| Column {
                        index,
                        raw: field.raw.clone(),
                        canonical: field.canonical.clone(),
                        kind: field.kind,
                    })
            })
            .collect();

        Self { columns }
    }

    /// Build one record.
    ///
    /// Every schema field is present; a short row yields `null` for the
    /// missing cells.
    pub fn transform(&self, row: &StringRecord) -> Result<Map<String, Value>> {
        let mut record = Map::with_capacity(self.columns.len());
        for column in &self.columns {
            let cell = row.get(column.index).unwrap_or("");
            let value = coerce(column.kind, cell)
                .map_err(|reason| TapError::transform(&column.raw, cell, reason))?;
            record.insert(column.canonical.clone(), value);
        }
        Ok(record)
    }
}
