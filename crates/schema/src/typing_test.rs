//! Tests for type inference, mapping and driver error classification

use std::collections::BTreeSet;

use courier_protocol::{Event, Value};

use crate::{DataType, FieldTypes, SchemaError, TypeMapping};

#[test]
fn test_infer_scalars() {
    assert_eq!(DataType::infer(&Value::Null), None);
    assert_eq!(DataType::infer(&Value::Bool(true)), Some(DataType::Bool));
    assert_eq!(DataType::infer(&Value::Int(1)), Some(DataType::Int64));
    assert_eq!(DataType::infer(&Value::Float(1.5)), Some(DataType::Float64));
    assert_eq!(DataType::infer(&Value::from("x")), Some(DataType::String));
    assert_eq!(
        DataType::infer(&Value::from("2024-01-02T03:04:05Z")),
        Some(DataType::Timestamp)
    );
    assert_eq!(
        DataType::infer(&Value::from("2024-01-02")),
        Some(DataType::String)
    );
}

#[test]
fn test_common_type() {
    use DataType::*;
    assert_eq!(Int64.common(Int64), Int64);
    assert_eq!(Bool.common(Int64), Int64);
    assert_eq!(Int64.common(Float64), Float64);
    assert_eq!(Bool.common(Float64), Float64);
    assert_eq!(Float64.common(String), String);
    assert_eq!(Timestamp.common(Timestamp), Timestamp);
    assert_eq!(Timestamp.common(Int64), String);
    assert_eq!(String.common(Timestamp), String);
}

#[test]
fn test_field_types_merge_batch() {
    let first = Event::from_json(br#"{"a": 1, "b": "x", "c": null}"#).unwrap();
    let second = Event::from_json(br#"{"a": 2.5, "c": true}"#).unwrap();

    let mut types = FieldTypes::from_event(&first);
    assert_eq!(types.len(), 2);
    types.merge_event(&second);

    assert_eq!(types.get("a"), Some(DataType::Float64));
    assert_eq!(types.get("b"), Some(DataType::String));
    assert_eq!(types.get("c"), Some(DataType::Bool));
}

#[test]
fn test_mapping_table() {
    let event = Event::from_json(br#"{"id": 1, "ok": true, "at": "2024-01-02T03:04:05Z"}"#).unwrap();
    let mapping = TypeMapping::default().with_type(DataType::Timestamp, "timestamptz");
    let pk: BTreeSet<String> = ["id".to_string()].into();

    let table = mapping.table("events", &FieldTypes::from_event(&event), &pk);

    assert_eq!(table.name, "events");
    assert_eq!(table.column_type("id"), Some("bigint"));
    assert_eq!(table.column_type("ok"), Some("boolean"));
    assert_eq!(table.column_type("at"), Some("timestamptz"));
    assert!(table.pk_fields.contains("id"));
}

#[test]
fn test_mapping_falls_back_to_string_type() {
    let mapping = TypeMapping::new([(DataType::String, "String")]);
    assert_eq!(mapping.sql_type(DataType::Int64), "String");
    assert_eq!(TypeMapping::new::<_, &str>([]).sql_type(DataType::Bool), "text");
}

#[test]
fn test_mapping_reverse_lookup() {
    let mapping = TypeMapping::default();
    assert_eq!(mapping.data_type("BIGINT"), Some(DataType::Int64));
    assert_eq!(mapping.data_type("jsonb"), None);
}

// =============================================================================
// Driver errors
// =============================================================================

#[test]
fn test_table_not_exist_detection() {
    let messages = [
        r#"pq: relation "public.events" does not exist"#,
        "Code: 60. DB::Exception: Table default.events doesn't exist",
        "Error 1146: Table 'db.events' doesn't exist",
        "no such table: events",
    ];
    for message in messages {
        let err = SchemaError::from_driver("insert", "events", message);
        assert!(err.is_table_not_exist(), "not classified: {message}");
    }
}

#[test]
fn test_other_driver_errors_are_kept() {
    let err = SchemaError::from_driver("insert", "events", "connection refused");
    assert!(!err.is_table_not_exist());
    assert_eq!(
        err.to_string(),
        "insert failed for table 'events': connection refused"
    );
}
