//! Cellset models and coordinate reconstruction.
//!
//! The server returns a cellset as a list of axes (each a list of tuples of
//! members) plus a flat list of cells identified only by ordinal. This module
//! maps ordinals back to per-axis tuple indices and builds the coordinate key
//! (comma-joined member unique names) used to address cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Wire Types
// ============================================================================

/// A cellset as returned by `GET /Cellsets('{id}')?$expand=Axes(...),Cells(...)`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cellset {
    /// Opaque cellset ID.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Axes in server order (columns, rows, ...).
    #[serde(default)]
    pub axes: Vec<CellsetAxis>,
    /// Cells, each identified by ordinal.
    #[serde(default)]
    pub cells: Vec<Cell>,
}

/// One axis of a cellset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CellsetAxis {
    /// Axis ordinal.
    #[serde(default)]
    pub ordinal: Option<u32>,
    /// Tuples on this axis.
    #[serde(default)]
    pub tuples: Vec<Tuple>,
}

/// A tuple: one member per hierarchy on the axis.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tuple {
    /// Tuple ordinal within the axis.
    #[serde(default)]
    pub ordinal: Option<u64>,
    /// Members, one per cross-joined hierarchy.
    #[serde(default)]
    pub members: Vec<Member>,
}

/// A member of a tuple.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Member {
    /// Element name.
    #[serde(default)]
    pub name: String,
    /// Fully qualified unique name, e.g. `[Region].[Region].[Europe]`.
    #[serde(default)]
    pub unique_name: String,
    /// Member ordinal.
    #[serde(default)]
    pub ordinal: Option<i64>,
}

/// A single cell.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cell {
    /// Cell ordinal; see [`ordinal_to_indices`] for the axis mapping.
    #[serde(default)]
    pub ordinal: u64,
    /// Raw value (number, string or null).
    #[serde(default)]
    pub value: Value,
    /// Display-formatted value.
    #[serde(default)]
    pub formatted_value: Option<String>,
    /// True if the value comes from a rule.
    #[serde(default)]
    pub rule_derived: Option<bool>,
    /// True if the cell is a consolidation.
    #[serde(default)]
    pub consolidated: Option<bool>,
    /// Updateable bit mask.
    #[serde(default)]
    pub updateable: Option<i64>,
}

// ============================================================================
// Projected Properties
// ============================================================================

/// A projected cell property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellProperty {
    /// `Value`
    Value(Value),
    /// `Ordinal`
    Ordinal(u64),
    /// `RuleDerived`
    RuleDerived(bool),
    /// `Consolidated`
    Consolidated(bool),
    /// `Updateable`
    Updateable(i64),
    /// `FormattedValue`
    FormattedValue(String),
}

impl CellProperty {
    /// Returns the raw value when this is a `Value` property.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Properties of one cell, keyed by property name.
pub type CellProperties = BTreeMap<String, CellProperty>;

/// Coordinate key → cell properties.
pub type CellMap = BTreeMap<String, CellProperties>;

/// Properties emitted when the caller does not ask for specific ones.
pub const DEFAULT_CELL_PROPERTIES: [&str; 5] =
    ["Value", "Ordinal", "RuleDerived", "Consolidated", "Updateable"];

impl Cell {
    /// Projects the cell onto the requested properties.
    ///
    /// `Value` and `Ordinal` are always emitted; `RuleDerived`, `Consolidated`
    /// and `Updateable` only when requested (all of them when `requested` is
    /// empty). `FormattedValue` is emitted whenever it is non-empty.
    pub fn project(&self, requested: &[String]) -> CellProperties {
        let wants = |name: &str| {
            requested.is_empty() || requested.iter().any(|p| p.eq_ignore_ascii_case(name))
        };

        let mut props = CellProperties::new();
        props.insert("Value".into(), CellProperty::Value(self.value.clone()));
        props.insert("Ordinal".into(), CellProperty::Ordinal(self.ordinal));

        if wants("RuleDerived") {
            props.insert(
                "RuleDerived".into(),
                CellProperty::RuleDerived(self.rule_derived.unwrap_or(false)),
            );
        }
        if wants("Consolidated") {
            props.insert(
                "Consolidated".into(),
                CellProperty::Consolidated(self.consolidated.unwrap_or(false)),
            );
        }
        if wants("Updateable") {
            props.insert(
                "Updateable".into(),
                CellProperty::Updateable(self.updateable.unwrap_or(0)),
            );
        }
        if let Some(formatted) = self.formatted_value.as_deref().filter(|f| !f.is_empty()) {
            props.insert(
                "FormattedValue".into(),
                CellProperty::FormattedValue(formatted.to_string()),
            );
        }

        props
    }
}

// ============================================================================
// Coordinates
// ============================================================================

/// Decomposes a cell ordinal into one tuple index per axis.
///
/// The last axis varies fastest: for cardinalities `[2, 3, 4]`, ordinal `13` maps to
/// `[1, 0, 1]`. An axis with cardinality 0 contributes index 0 and does not
/// divide the remainder.
pub fn ordinal_to_indices(ordinal: u64, cardinalities: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; cardinalities.len()];
    let mut remaining = ordinal;

    for (j, &card) in cardinalities.iter().enumerate().rev() {
        if card == 0 {
            continue;
        }
        let card = card as u64;
        indices[j] = (remaining % card) as usize;
        remaining /= card;
    }

    indices
}

impl Cellset {
    /// Tuple count per axis.
    pub fn cardinalities(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.tuples.len()).collect()
    }

    /// Builds the coordinate key for a cell ordinal.
    ///
    /// Unique names of every member of the addressed tuple on each axis are
    /// joined with `,` in axis order.
    pub fn coordinate_key(&self, ordinal: u64) -> String {
        let indices = ordinal_to_indices(ordinal, &self.cardinalities());
        let mut names: Vec<&str> = Vec::new();

        for (axis, index) in self.axes.iter().zip(indices) {
            if let Some(tuple) = axis.tuples.get(index) {
                names.extend(tuple.members.iter().map(|m| m.unique_name.as_str()));
            }
        }

        names.join(",")
    }

    /// Maps every cell to its coordinate key with the requested properties.
    pub fn to_cell_map(&self, requested: &[String]) -> CellMap {
        self.cells
            .iter()
            .map(|cell| (self.coordinate_key(cell.ordinal), cell.project(requested)))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn axis(names: &[&[&str]]) -> CellsetAxis {
        CellsetAxis {
            ordinal: None,
            tuples: names
                .iter()
                .map(|members| Tuple {
                    ordinal: None,
                    members: members
                        .iter()
                        .map(|n| Member {
                            name: (*n).to_string(),
                            unique_name: format!("[{n}]"),
                            ordinal: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_ordinal_to_indices_examples() {
        // ordinal = i0 * 12 + i1 * 4 + i2 with axis 0 most significant
        assert_eq!(ordinal_to_indices(13, &[2, 3, 4]), vec![1, 0, 1]);
        assert_eq!(ordinal_to_indices(4, &[2, 3]), vec![1, 1]);
        assert!(ordinal_to_indices(7, &[]).is_empty());
    }

    #[test]
    fn test_zero_cardinality_axis() {
        assert_eq!(ordinal_to_indices(5, &[0, 3]), vec![0, 2]);
    }

    #[test]
    fn test_coordinate_key_crossjoin() {
        let cellset = Cellset {
            id: "cs".into(),
            axes: vec![
                axis(&[&["Jan"], &["Feb"]]),
                axis(&[&["EU", "Actual"], &["US", "Actual"]]),
            ],
            cells: vec![],
        };

        assert_eq!(cellset.coordinate_key(0), "[Jan],[EU],[Actual]");
        assert_eq!(cellset.coordinate_key(3), "[Feb],[US],[Actual]");
    }

    #[test]
    fn test_cell_map_unique_keys() {
        let cells = (0..6)
            .map(|o| Cell {
                ordinal: o,
                value: Value::from(o),
                ..Default::default()
            })
            .collect();
        let cellset = Cellset {
            id: "cs".into(),
            axes: vec![axis(&[&["A"], &["B"]]), axis(&[&["X"], &["Y"], &["Z"]])],
            cells,
        };

        let map = cellset.to_cell_map(&[]);
        assert_eq!(map.len(), 6);
        assert_eq!(map["[B],[Z]"]["Value"], CellProperty::Value(Value::from(5)));
    }

    #[test]
    fn test_projection_defaults() {
        let cell = Cell {
            ordinal: 2,
            value: Value::from(10.5),
            formatted_value: Some("10.50".into()),
            rule_derived: Some(true),
            consolidated: Some(false),
            updateable: Some(0),
        };

        let props = cell.project(&[]);
        assert_eq!(props.len(), 6);
        assert_eq!(props["RuleDerived"], CellProperty::RuleDerived(true));
        assert_eq!(
            props["FormattedValue"],
            CellProperty::FormattedValue("10.50".into())
        );
    }

    #[test]
    fn test_projection_requested_subset() {
        let cell = Cell {
            ordinal: 0,
            value: Value::Null,
            formatted_value: Some(String::new()),
            rule_derived: Some(false),
            consolidated: Some(true),
            updateable: Some(1),
        };

        let props = cell.project(&["consolidated".to_string(), "HasPicklist".to_string()]);
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Consolidated", "Ordinal", "Value"]);
    }

    proptest! {
        #[test]
        fn prop_decomposition_recomposes(
            cards in prop::collection::vec(1usize..6, 1..5),
            seed in any::<u64>(),
        ) {
            let total: u64 = cards.iter().map(|&c| c as u64).product();
            let k = seed % total;
            let indices = ordinal_to_indices(k, &cards);

            let mut recomposed = 0u64;
            for (j, &i) in indices.iter().enumerate() {
                prop_assert!(i < cards[j]);
                let stride: u64 = cards[j + 1..].iter().map(|&c| c as u64).product();
                recomposed += i as u64 * stride;
            }
            prop_assert_eq!(recomposed, k);
        }
    }
}
