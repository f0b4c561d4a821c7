use pretty_assertions::assert_eq;
use widelong_core::{
    check_long_coverage, check_wide_coverage, crosstab, join_metadata, unpivot, JoinOptions,
    MatchPolicy, MetadataBuilder, MetadataTable, Table, UnpivotOptions, Value, WidelongError,
};

fn wide() -> Table {
    Table::from_rows(
        ["id", "a", "b", "c"],
        [
            vec![1.into(), 10.into(), 11.into(), 12.into()],
            vec![2.into(), 20.into(), 21.into(), 22.into()],
        ],
    )
    .unwrap()
}

fn groups() -> MetadataTable {
    MetadataBuilder::new("key", ["group"])
        .entry("a", ["group1"])
        .entry("b", ["group1"])
        .entry("c", ["group2"])
        .build()
        .unwrap()
}

fn column(table: &Table, name: &str) -> Vec<Value> {
    table.column_values(name).unwrap().cloned().collect()
}

#[test]
fn unpivot_groups_by_input_row_then_measure_order() {
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();

    assert_eq!(long.columns(), ["id", "key", "value"]);
    assert_eq!(long.row_count(), 6);
    assert_eq!(
        column(&long, "id"),
        vec![
            Value::from(1),
            Value::from(1),
            Value::from(1),
            Value::from(2),
            Value::from(2),
            Value::from(2)
        ]
    );
    assert_eq!(
        column(&long, "key"),
        ["a", "b", "c", "a", "b", "c"]
            .into_iter()
            .map(Value::from)
            .collect::<Vec<_>>()
    );
    assert_eq!(
        column(&long, "value"),
        [10, 11, 12, 20, 21, 22]
            .into_iter()
            .map(Value::from)
            .collect::<Vec<_>>()
    );
}

#[test]
fn unpivot_honors_custom_field_names() {
    let options = UnpivotOptions::new(["id"])
        .with_key_field("variable")
        .with_value_field("score");
    let long = unpivot(&wide(), &options).unwrap();
    assert_eq!(long.columns(), ["id", "variable", "score"]);
}

#[test]
fn unpivot_rejects_unknown_identifier_column() {
    let err = unpivot(&wide(), &UnpivotOptions::new(["subject"])).unwrap_err();
    match err {
        WidelongError::InvalidColumn { column, available } => {
            assert_eq!(column, "subject");
            assert_eq!(available, ["id", "a", "b", "c"]);
        }
        other => panic!("expected InvalidColumn, got {other:?}"),
    }
}

#[test]
fn unpivot_with_only_identifier_columns_is_empty() {
    let long = unpivot(&wide(), &UnpivotOptions::new(["id", "a", "b", "c"])).unwrap();
    assert_eq!(long.row_count(), 0);
    assert_eq!(long.columns(), ["id", "a", "b", "c", "key", "value"]);
}

#[test]
fn full_coverage_join_keeps_every_row() {
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();
    let joined = join_metadata(&long, &groups(), &JoinOptions::default()).unwrap();

    assert!(joined.warnings.is_empty());
    assert_eq!(joined.table.columns(), ["id", "key", "value", "group"]);
    assert_eq!(joined.table.row_count(), 6);

    let tab = crosstab(&joined.table, "key", "group").unwrap();
    assert_eq!(tab.count(&"a".into(), &"group1".into()), 2);
    assert_eq!(tab.count(&"c".into(), &"group2".into()), 2);
    assert_eq!(tab.count(&"c".into(), &"group1".into()), 0);

    let groups_col = column(&joined.table, "group");
    assert_eq!(groups_col.iter().filter(|g| **g == Value::from("group1")).count(), 4);
    assert_eq!(groups_col.iter().filter(|g| **g == Value::from("group2")).count(), 2);
}

#[test]
fn missing_metadata_key_silently_shrinks_the_join() {
    let meta = MetadataBuilder::new("key", ["group"])
        .entry("a", ["group1"])
        .entry("b", ["group1"])
        .build()
        .unwrap();
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();

    let joined = join_metadata(&long, &meta, &JoinOptions::default()).unwrap();

    assert_eq!(joined.table.row_count(), 4);
    assert!(!column(&joined.table, "key").contains(&Value::from("c")));
    assert_eq!(joined.warnings.len(), 1);
    assert_eq!(joined.warnings[0].key, Value::from("c"));
    assert_eq!(joined.warnings[0].dropped_rows, 2);
    assert_eq!(
        joined.warnings[0].to_string(),
        "key 'c' has no metadata row; dropped 2 row(s)"
    );
}

#[test]
fn strict_join_fails_on_missing_metadata_key() {
    let meta = MetadataBuilder::new("key", ["group"])
        .entry("a", ["group1"])
        .build()
        .unwrap();
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();
    let options = JoinOptions {
        policy: MatchPolicy::Strict,
        ..JoinOptions::default()
    };

    let err = join_metadata(&long, &meta, &options).unwrap_err();
    match err {
        WidelongError::UnmatchedKeys { keys, dropped_rows } => {
            assert_eq!(keys, vec![Value::from("b"), Value::from("c")]);
            assert_eq!(dropped_rows, 4);
        }
        other => panic!("expected UnmatchedKeys, got {other:?}"),
    }
}

#[test]
fn duplicate_metadata_keys_fan_out_in_metadata_order() {
    let meta = MetadataBuilder::new("key", ["group"])
        .entry("a", ["group1"])
        .entry("b", ["group1"])
        .entry("c", ["group2"])
        .entry("c", ["group3"])
        .build()
        .unwrap();
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();

    let joined = join_metadata(&long, &meta, &JoinOptions::default()).unwrap();

    assert_eq!(joined.table.row_count(), 8);
    let rows: Vec<Vec<String>> = joined
        .table
        .rows()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect();
    assert_eq!(rows[2], vec!["1", "c", "12", "group2"]);
    assert_eq!(rows[3], vec!["1", "c", "12", "group3"]);
    assert_eq!(rows[7], vec!["2", "c", "22", "group3"]);
}

#[test]
fn metadata_key_column_may_be_named_differently() {
    let meta = MetadataBuilder::new("column", ["group"])
        .entry("a", ["group1"])
        .entry("b", ["group1"])
        .entry("c", ["group2"])
        .build()
        .unwrap();
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();

    let joined = join_metadata(&long, &meta, &JoinOptions::default()).unwrap();
    assert_eq!(joined.table.columns(), ["id", "key", "value", "group"]);
    assert_eq!(joined.table.row_count(), 6);
}

#[test]
fn attribute_colliding_with_long_column_is_rejected() {
    let meta = MetadataBuilder::new("key", ["value"])
        .entry("a", ["x"])
        .build()
        .unwrap();
    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();

    let err = join_metadata(&long, &meta, &JoinOptions::default()).unwrap_err();
    assert!(matches!(err, WidelongError::DuplicateColumn { column } if column == "value"));
}

#[test]
fn coverage_report_flags_missing_unused_and_duplicate_keys() {
    let meta = MetadataBuilder::new("key", ["group"])
        .entry("a", ["group1"])
        .entry("a", ["group1b"])
        .entry("b", ["group1"])
        .entry("typo_c", ["group2"])
        .build()
        .unwrap();
    let id_columns = vec!["id".to_string()];

    let report = check_wide_coverage(&wide(), &id_columns, &meta).unwrap();
    assert!(!report.is_complete());
    assert_eq!(report.missing, vec![Value::from("c")]);
    assert_eq!(report.unused, vec![Value::from("typo_c")]);
    assert_eq!(report.duplicates, vec![(Value::from("a"), 2)]);

    let long = unpivot(&wide(), &UnpivotOptions::new(["id"])).unwrap();
    assert_eq!(check_long_coverage(&long, "key", &meta).unwrap(), report);
}

#[test]
fn complete_coverage_is_reported_as_complete() {
    let report = check_wide_coverage(&wide(), &["id".to_string()], &groups()).unwrap();
    assert!(report.is_complete());
    assert!(report.unused.is_empty());
}
