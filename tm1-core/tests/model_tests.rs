//! Integration tests for core models and version gates.

use tm1_core::{Capability, Cellset, ContentRoot, CoreError, ServerVersion};

#[test]
fn test_cellset_from_server_json() {
    let json = r#"{
        "ID": "abc",
        "Axes": [
            {"Ordinal": 0, "Tuples": [
                {"Ordinal": 0, "Members": [{"Name": "Jan", "UniqueName": "[Month].[Month].[Jan]", "Ordinal": 0}]},
                {"Ordinal": 1, "Members": [{"Name": "Feb", "UniqueName": "[Month].[Month].[Feb]", "Ordinal": 1}]}
            ]},
            {"Ordinal": 1, "Tuples": [
                {"Ordinal": 0, "Members": [{"Name": "EU", "UniqueName": "[Region].[Region].[EU]", "Ordinal": 0}]}
            ]}
        ],
        "Cells": [
            {"Ordinal": 0, "Value": 10, "RuleDerived": false, "Consolidated": false, "Updateable": 0},
            {"Ordinal": 1, "Value": null, "RuleDerived": false, "Consolidated": false, "Updateable": 0}
        ]
    }"#;

    let cellset: Cellset = serde_json::from_str(json).unwrap();
    assert_eq!(cellset.cardinalities(), vec![2, 1]);

    let map = cellset.to_cell_map(&[]);
    assert_eq!(map.len(), 2);
    assert!(map.contains_key("[Month].[Month].[Jan],[Region].[Region].[EU]"));
    assert!(map.contains_key("[Month].[Month].[Feb],[Region].[Region].[EU]"));
}

#[test]
fn test_v12_gates() {
    let v12 = ServerVersion::from("12.0.1");
    assert!(Capability::Jobs.check(v12.as_str()).is_ok());
    assert!(matches!(
        Capability::Threads.check(v12.as_str()),
        Err(CoreError::FeatureRemoved { .. })
    ));
    assert_eq!(ContentRoot::for_version(v12.as_str()), ContentRoot::Files);
}
