//! The cellset engine.
//!
//! Queries run as a create / extract / delete lifecycle against a
//! server-side cellset. Extraction fetches axes and cells in one round trip
//! and rebuilds each cell's coordinates from its ordinal. The cellset is
//! deleted after every extraction attempt, whatever its outcome.
//!
//! Writes go through `tm1.Update`, one request per cell.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tm1_core::{CellMap, Cellset, DEFAULT_CELL_PROPERTIES};
use tm1_rest::{RestApi, RestApiExt, Result, Tm1Error, add_sandbox, quote};
use tracing::{debug, instrument, warn};

use crate::common::bind_key;
use crate::cube::CubeService;

/// Page size used for every `$top` in the extraction query.
const EXTRACT_TOP: u32 = 100_000;

/// Properties always requested from the server.
const BASE_PROPERTIES: [&str; 3] = ["Ordinal", "Value", "FormattedValue"];

#[derive(Debug, Deserialize)]
struct CellsetId {
    #[serde(rename = "ID")]
    id: String,
}

/// Executes queries and writes cells.
#[derive(Clone)]
pub struct CellService {
    rest: Arc<dyn RestApi>,
    cubes: CubeService,
}

impl CellService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self {
            cubes: CubeService::new(Arc::clone(&rest)),
            rest,
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Executes MDX into a new cellset and returns its ID.
    #[instrument(skip(self, mdx))]
    pub async fn create_cellset(&self, mdx: &str, sandbox: Option<&str>) -> Result<String> {
        let endpoint = add_sandbox("/ExecuteMDX?$select=ID", sandbox);
        let created: CellsetId = self.rest.post_json(&endpoint, &json!({ "MDX": mdx })).await?;
        debug!(cellset = %created.id, "Cellset created");
        Ok(created.id)
    }

    /// Executes a view into a new cellset and returns its ID.
    #[instrument(skip(self))]
    pub async fn create_cellset_from_view(
        &self,
        cube: &str,
        view: &str,
        private: bool,
        sandbox: Option<&str>,
    ) -> Result<String> {
        let collection = if private { "PrivateViews" } else { "Views" };
        let endpoint = add_sandbox(
            &format!(
                "/Cubes('{}')/{collection}('{}')/tm1.Execute?$select=ID",
                quote(cube),
                quote(view)
            ),
            sandbox,
        );
        let created: CellsetId = self.rest.post_json(&endpoint, &json!({})).await?;
        Ok(created.id)
    }

    /// Fetches axes and cells of a cellset in one request.
    pub async fn get_cellset(
        &self,
        id: &str,
        properties: &[String],
        sandbox: Option<&str>,
    ) -> Result<Cellset> {
        let endpoint = add_sandbox(&extract_endpoint(id, properties), sandbox);
        self.rest.get_json(&endpoint).await
    }

    /// Fetches a cellset and maps its cells to coordinate keys.
    #[instrument(skip(self, properties))]
    pub async fn extract_cellset(
        &self,
        id: &str,
        properties: &[String],
        sandbox: Option<&str>,
    ) -> Result<CellMap> {
        let cellset = self.get_cellset(id, properties, sandbox).await?;
        debug!(
            axes = cellset.axes.len(),
            cells = cellset.cells.len(),
            "Cellset extracted"
        );
        Ok(cellset.to_cell_map(properties))
    }

    /// Deletes a cellset.
    pub async fn delete_cellset(&self, id: &str, sandbox: Option<&str>) -> Result<()> {
        let endpoint = add_sandbox(&format!("/Cellsets('{}')", quote(id)), sandbox);
        self.rest.delete(&endpoint).await
    }

    /// Extracts and then deletes the cellset, keeping the extraction outcome.
    async fn extract_and_delete(
        &self,
        id: &str,
        properties: &[String],
        sandbox: Option<&str>,
    ) -> Result<CellMap> {
        let extracted = self.extract_cellset(id, properties, sandbox).await;
        if let Err(e) = self.delete_cellset(id, sandbox).await {
            warn!(cellset = %id, error = %e, "Failed to delete cellset");
        }
        extracted
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Runs an MDX query.
    ///
    /// With no `properties`, every cell carries `Value`, `Ordinal`,
    /// `RuleDerived`, `Consolidated` and `Updateable`.
    pub async fn execute_mdx(
        &self,
        mdx: &str,
        properties: &[String],
        sandbox: Option<&str>,
    ) -> Result<CellMap> {
        let id = self.create_cellset(mdx, sandbox).await?;
        self.extract_and_delete(&id, properties, sandbox).await
    }

    /// Runs a saved view.
    pub async fn execute_view(
        &self,
        cube: &str,
        view: &str,
        private: bool,
        properties: &[String],
        sandbox: Option<&str>,
    ) -> Result<CellMap> {
        let id = self
            .create_cellset_from_view(cube, view, private, sandbox)
            .await?;
        self.extract_and_delete(&id, properties, sandbox).await
    }

    /// Runs an MDX query and keeps only cell values.
    pub async fn execute_mdx_values(
        &self,
        mdx: &str,
        sandbox: Option<&str>,
    ) -> Result<BTreeMap<String, Value>> {
        let cells = self
            .execute_mdx(mdx, &["Value".to_string()], sandbox)
            .await?;
        Ok(cells
            .into_iter()
            .map(|(coord, mut props)| {
                let value = props
                    .remove("Value")
                    .and_then(|p| p.as_value().cloned())
                    .unwrap_or(Value::Null);
                (coord, value)
            })
            .collect())
    }

    /// Reads a single cell value.
    ///
    /// Dimensions are looked up when not given. Returns `None` when the cell
    /// is empty.
    pub async fn get_value(
        &self,
        cube: &str,
        elements: &[String],
        dimensions: Option<&[String]>,
        sandbox: Option<&str>,
    ) -> Result<Option<Value>> {
        let dimensions = self.resolve_dimensions(cube, dimensions).await?;
        check_address(elements, &dimensions)?;

        let mdx = single_cell_mdx(cube, elements, &dimensions);
        let values = self.execute_mdx_values(&mdx, sandbox).await?;
        Ok(values.into_values().find(|v| !v.is_null()))
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Writes one cell.
    #[instrument(skip(self, value))]
    pub async fn write_value(
        &self,
        cube: &str,
        elements: &[String],
        dimensions: Option<&[String]>,
        value: Value,
        sandbox: Option<&str>,
    ) -> Result<()> {
        let dimensions = self.resolve_dimensions(cube, dimensions).await?;
        check_address(elements, &dimensions)?;
        self.post_update(cube, elements, &dimensions, value, sandbox)
            .await
    }

    /// Writes many cells keyed by comma-separated element names.
    ///
    /// Every key is validated before the first write. Writes happen in key
    /// order and stop at the first failure.
    #[instrument(skip(self, cells), fields(cells = cells.len()))]
    pub async fn write_values(
        &self,
        cube: &str,
        cells: &BTreeMap<String, Value>,
        dimensions: Option<&[String]>,
        sandbox: Option<&str>,
    ) -> Result<()> {
        let dimensions = self.resolve_dimensions(cube, dimensions).await?;

        let addressed = cells
            .iter()
            .map(|(coord, value)| {
                let elements = split_coordinates(coord);
                check_address(&elements, &dimensions)?;
                Ok((elements, value))
            })
            .collect::<Result<Vec<_>>>()?;

        for (elements, value) in addressed {
            self.post_update(cube, &elements, &dimensions, value.clone(), sandbox)
                .await?;
        }
        Ok(())
    }

    async fn post_update(
        &self,
        cube: &str,
        elements: &[String],
        dimensions: &[String],
        value: Value,
        sandbox: Option<&str>,
    ) -> Result<()> {
        let endpoint = add_sandbox(&format!("/Cubes('{}')/tm1.Update", quote(cube)), sandbox);
        let body = update_body(elements, dimensions, value);
        self.rest.post_discard(&endpoint, &body).await
    }

    async fn resolve_dimensions(
        &self,
        cube: &str,
        dimensions: Option<&[String]>,
    ) -> Result<Vec<String>> {
        match dimensions {
            Some(dims) if !dims.is_empty() => Ok(dims.to_vec()),
            _ => self.cubes.dimension_names(cube).await,
        }
    }
}

// ============================================================================
// Request Shapes
// ============================================================================

/// Cell properties requested from the server for a projection.
fn selected_properties(requested: &[String]) -> Vec<String> {
    let extra: Vec<String> = if requested.is_empty() {
        DEFAULT_CELL_PROPERTIES.iter().map(|p| (*p).to_string()).collect()
    } else {
        requested.to_vec()
    };

    let mut selected: Vec<String> = BASE_PROPERTIES.iter().map(|p| (*p).to_string()).collect();
    for prop in extra {
        if !selected.iter().any(|s| s.eq_ignore_ascii_case(&prop)) {
            selected.push(prop);
        }
    }
    selected
}

/// Extraction endpoint for a cellset.
pub fn extract_endpoint(id: &str, properties: &[String]) -> String {
    format!(
        "/Cellsets('{id}')?$expand=\
         Axes($expand=Tuples($expand=Members($select=Name,UniqueName,Ordinal;$top={top});$top={top})),\
         Cells($select={props};$top={top})",
        id = quote(id),
        top = EXTRACT_TOP,
        props = selected_properties(properties).join(","),
    )
}

/// Body of a single-cell `tm1.Update`.
fn update_body(elements: &[String], dimensions: &[String], value: Value) -> Value {
    let binds: Vec<String> = dimensions
        .iter()
        .zip(elements)
        .map(|(dim, element)| {
            let dim = bind_key(dim);
            format!(
                "Dimensions('{dim}')/Hierarchies('{dim}')/Elements('{}')",
                bind_key(element)
            )
        })
        .collect();

    json!({
        "Tuple@odata.bind": binds,
        "Value": value,
    })
}

/// Splits a coordinate key into element names.
pub fn split_coordinates(coord: &str) -> Vec<String> {
    coord.split(',').map(|e| e.trim().to_string()).collect()
}

fn check_address(elements: &[String], dimensions: &[String]) -> Result<()> {
    if elements.is_empty() {
        return Err(Tm1Error::validation("elements must not be empty"));
    }
    if elements.len() != dimensions.len() {
        return Err(Tm1Error::validation(format!(
            "{} elements given for {} dimensions",
            elements.len(),
            dimensions.len()
        )));
    }
    Ok(())
}

fn mdx_member(dimension: &str, element: &str) -> String {
    let dim = dimension.replace(']', "]]");
    format!("[{dim}].[{dim}].[{}]", element.replace(']', "]]"))
}

/// MDX addressing a single cell.
///
/// The last dimension goes on columns, the others are crossjoined on rows.
pub fn single_cell_mdx(cube: &str, elements: &[String], dimensions: &[String]) -> String {
    let members: Vec<String> = dimensions
        .iter()
        .zip(elements)
        .map(|(d, e)| format!("{{{}}}", mdx_member(d, e)))
        .collect();

    let (columns, rows) = match members.split_last() {
        Some((last, rest)) => (last.clone(), rest),
        None => ("{}".to_string(), &[][..]),
    };
    let rows = if rows.is_empty() {
        "{}".to_string()
    } else {
        rows.join("*")
    };

    format!(
        "SELECT {rows} ON ROWS, {columns} ON COLUMNS FROM [{}]",
        cube.replace(']', "]]")
    )
}

// ============================================================================
// Tests
// ============================================================================
