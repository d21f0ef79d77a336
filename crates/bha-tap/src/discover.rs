//! Discovery catalog

use bha_common::{Catalog, CatalogEntry};
use serde_json::{json, Value};

use crate::catalog::FieldMapping;
use crate::output::STREAM_NAME;
use crate::schema::catalog_schema;

/// Catalog describing the report stream with every known field
pub fn discover(mapping: &FieldMapping) -> Catalog {
    let schema = catalog_schema(mapping);
    let key_properties = schema.key_fields().to_vec();

    let mut metadata: Vec<Value> = vec![json!({
        "breadcrumb": [],
        "metadata": {
            "table-key-properties": key_properties,
            "forced-replication-method": "INCREMENTAL",
            "valid-replication-keys": ["date"],
            "inclusion": "available",
        }
    })];

    metadata.extend(schema.fields().iter().map(|field| {
        let inclusion = if field.is_key { "automatic" } else { "available" };
        json!({
            "breadcrumb": ["properties", field.canonical],
            "metadata": {
                "inclusion": inclusion,
                "tap-bing-hotel-ads.raw-column": field.raw,
            }
        })
    }));

    Catalog {
        streams: vec![CatalogEntry {
            stream: STREAM_NAME.to_string(),
            tap_stream_id: STREAM_NAME.to_string(),
            schema: schema.to_json_schema(),
            key_properties,
            metadata,
        }],
    }
}
