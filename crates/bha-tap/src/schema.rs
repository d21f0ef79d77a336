//! Output schema inferred from the report header
//!
//! Only header columns present in the [`FieldMapping`] make it into the
//! schema; everything else is dropped, here and in every record.

use serde_json::{json, Map, Value};
use std::collections::HashSet;

use crate::catalog::{FieldMapping, PrimitiveType};

/// One output field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    /// Raw header the field is read from
    pub raw: String,
    pub canonical: String,
    pub kind: PrimitiveType,
    pub is_key: bool,
}

impl SchemaField {
    /// JSON Schema for this field.
    ///
    /// Dates are published as strings with a `date-time` format; the
    /// `Date`/`DateTime` distinction only matters during coercion.
    pub fn json_schema(&self) -> Value {
        let nullable = |ty: &str| json!({ "type": ["null", ty] });
        match self.kind {
            PrimitiveType::String => nullable("string"),
            PrimitiveType::Integer => nullable("integer"),
            PrimitiveType::Number => nullable("number"),
            PrimitiveType::Date | PrimitiveType::DateTime => {
                json!({ "type": ["null", "string"], "format": "date-time" })
            },
        }
    }
}

/// Schema for one run, fixed once inferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    fields: Vec<SchemaField>,
    key_fields: Vec<String>,
}

impl OutputSchema {
    /// Fields in header order
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, canonical: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.canonical == canonical)
    }

    /// Key fields, in the order they were requested
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// JSON Schema object describing a record
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.canonical.clone(), f.json_schema()))
            .collect();

        json!({
            "type": ["null", "object"],
            "additionalProperties": false,
            "properties": properties,
        })
    }
}

/// Derive the run's schema from the report header.
///
/// A raw column that appears more than once contributes only its first
/// occurrence.
pub fn infer_schema(
    header: &[String],
    mapping: &FieldMapping,
    key_field_names: &[String],
) -> OutputSchema {
    let mut seen = HashSet::new();
    let fields: Vec<SchemaField> = header
        .iter()
        .filter_map(|raw| mapping.get(raw.trim()))
        .filter(|spec| seen.insert(spec.canonical))
        .map(|spec| SchemaField {
            raw: spec.raw.to_string(),
            canonical: spec.canonical.to_string(),
            kind: spec.kind,
            is_key: key_field_names.iter().any(|k| k == spec.canonical),
        })
        .collect();

    let key_fields = key_field_names
        .iter()
        .filter(|k| fields.iter().any(|f| &f.canonical == *k))
        .cloned()
        .collect();

    OutputSchema { fields, key_fields }
}

/// Schema covering every catalog field, as published by discovery
pub fn catalog_schema(mapping: &FieldMapping) -> OutputSchema {
    infer_schema(&mapping.raw_columns(), mapping, &mapping.key_fields())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{FieldSpec, HOTEL_PERFORMANCE_FIELDS};
    use proptest::prelude::*;

    fn header(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_hotel_clicks_impressions() {
        let mapping = FieldMapping::hotel_performance();
        let schema = infer_schema(
            &header(&["HotelId", "Clicks", "Impressions"]),
            mapping,
            &mapping.key_fields(),
        );

        assert_eq!(schema.len(), 3);
        assert_eq!(schema.key_fields(), ["hotel_id"]);
        assert!(schema.field("hotel_id").unwrap().is_key);
        assert!(!schema.field("clicks").unwrap().is_key);
        assert_eq!(schema.field("impressions").unwrap().kind, PrimitiveType::Integer);
    }

    #[test]
    fn test_unknown_columns_are_dropped() {
        let mapping = FieldMapping::hotel_performance();
        let schema = infer_schema(&header(&["Mystery", "Clicks", "Bogus"]), mapping, &[]);
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.fields()[0].canonical, "clicks");
        assert!(schema.key_fields().is_empty());
    }

    #[test]
    fn test_duplicate_header_keeps_first() {
        let mapping = FieldMapping::hotel_performance();
        let schema = infer_schema(&header(&["Clicks", "Clicks"]), mapping, &[]);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn test_dates_publish_as_date_time_strings() {
        let mapping = FieldMapping::new(vec![
            FieldSpec {
                raw: "Day",
                canonical: "day",
                kind: PrimitiveType::Date,
                key: true,
            },
            FieldSpec {
                raw: "Stamp",
                canonical: "stamp",
                kind: PrimitiveType::DateTime,
                key: false,
            },
        ]);
        let schema = infer_schema(&header(&["Day", "Stamp"]), &mapping, &mapping.key_fields());
        let json = schema.to_json_schema();

        for name in ["day", "stamp"] {
            assert_eq!(json["properties"][name]["type"], json!(["null", "string"]));
            assert_eq!(json["properties"][name]["format"], "date-time");
        }
        // coercion still tells them apart
        assert_eq!(schema.field("day").unwrap().kind, PrimitiveType::Date);
        assert_eq!(schema.field("stamp").unwrap().kind, PrimitiveType::DateTime);
    }

    #[test]
    fn test_catalog_schema_covers_everything() {
        let mapping = FieldMapping::hotel_performance();
        let schema = catalog_schema(mapping);
        assert_eq!(schema.len(), mapping.len());
        assert_eq!(schema.key_fields(), mapping.key_fields().as_slice());
    }

    proptest! {
        #[test]
        fn prop_schema_is_header_intersect_catalog(
            picks in proptest::collection::vec(0usize..HOTEL_PERFORMANCE_FIELDS.len() + 8, 0..24)
        ) {
            let mapping = FieldMapping::hotel_performance();
            let header: Vec<String> = picks
                .iter()
                .map(|&i| match HOTEL_PERFORMANCE_FIELDS.get(i) {
                    Some(spec) => spec.raw.to_string(),
                    None => format!("Unmapped{i}"),
                })
                .collect();

            let schema = infer_schema(&header, mapping, &mapping.key_fields());

            let expected: HashSet<&str> = header
                .iter()
                .filter_map(|raw| mapping.get(raw))
                .map(|spec| spec.canonical)
                .collect();
            let actual: HashSet<&str> =
                schema.fields().iter().map(|f| f.canonical.as_str()).collect();

            prop_assert_eq!(actual, expected);
            for field in schema.fields() {
                prop_assert!(mapping.by_canonical(&field.canonical).is_some());
            }
        }
    }
}
