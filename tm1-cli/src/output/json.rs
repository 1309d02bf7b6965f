//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use tm1_core::CellMap;

// ============================================================================
// Output Types
// ============================================================================

/// Server and session summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoOutput {
    pub base_url: String,
    pub version: String,
    pub user: String,
    pub admin: bool,
    pub data_admin: bool,
}

// ============================================================================
// Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats cells as `{coordinates: {property: value}}`.
    ///
    /// With `values_only` each coordinate maps straight to its value.
    pub fn format_cells(&self, cells: &CellMap, values_only: bool) -> Result<String> {
        if !values_only {
            return self.format(cells);
        }

        let values: Map<String, Value> = cells
            .iter()
            .map(|(coord, props)| {
                let value = props
                    .get("Value")
                    .and_then(|p| p.as_value())
                    .cloned()
                    .unwrap_or(Value::Null);
                (coord.clone(), value)
            })
            .collect();
        self.format(&values)
    }
}
