//! Cube service: dimension lookup and version-gated cube actions.

use std::sync::Arc;

use serde_json::json;
use tm1_core::Capability;
use tm1_rest::{RestApi, RestApiExt, Result, quote};
use tracing::{debug, instrument};

use crate::common::{NameList, bind_key, require};

/// Prefix of the sandbox dimension, which is never part of a cell address.
pub const SANDBOX_DIMENSION_PREFIX: &str = "Sandboxes";

/// Cube operations.
#[derive(Clone)]
pub struct CubeService {
    rest: Arc<dyn RestApi>,
}

impl CubeService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self { rest }
    }

    /// Names of all cubes.
    pub async fn get_all_names(&self) -> Result<Vec<String>> {
        let list: NameList = self.rest.get_json("/Cubes?$select=Name").await?;
        Ok(list.into_names())
    }

    /// Returns false when the cube does not exist.
    pub async fn exists(&self, cube: &str) -> Result<bool> {
        let endpoint = format!("/Cubes('{}')?$select=Name", quote(cube));
        match self.rest.get_text(&endpoint).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Dimensions of a cube in cube order, without the sandbox dimension.
    #[instrument(skip(self))]
    pub async fn dimension_names(&self, cube: &str) -> Result<Vec<String>> {
        let endpoint = format!("/Cubes('{}')/Dimensions?$select=Name", quote(cube));
        let list: NameList = self.rest.get_json(&endpoint).await?;
        Ok(list
            .into_names()
            .into_iter()
            .filter(|name| !name.starts_with(SANDBOX_DIMENSION_PREFIX))
            .collect())
    }

    /// Loads the cube into memory. 11.6 and later.
    pub async fn load(&self, cube: &str) -> Result<()> {
        require(self.rest.as_ref(), Capability::CubeLoadUnload)?;
        self.action(cube, "tm1.Load").await
    }

    /// Unloads the cube from memory. 11.6 and later.
    pub async fn unload(&self, cube: &str) -> Result<()> {
        require(self.rest.as_ref(), Capability::CubeLoadUnload)?;
        self.action(cube, "tm1.Unload").await
    }

    /// Storage order of the cube's dimensions. 11.4 and later.
    pub async fn storage_dimension_order(&self, cube: &str) -> Result<Vec<String>> {
        require(self.rest.as_ref(), Capability::StorageDimensionOrder)?;
        let endpoint = format!(
            "/Cubes('{}')/tm1.DimensionsStorageOrder()?$select=Name",
            quote(cube)
        );
        let list: NameList = self.rest.get_json(&endpoint).await?;
        Ok(list.into_names())
    }

    /// Reorders the cube's dimensions in storage. 11.4 and later.
    ///
    /// Returns the memory change reported by the server, in percent.
    #[instrument(skip(self))]
    pub async fn update_storage_dimension_order(
        &self,
        cube: &str,
        dimensions: &[String],
    ) -> Result<f64> {
        require(self.rest.as_ref(), Capability::StorageDimensionOrder)?;

        let binds: Vec<String> = dimensions
            .iter()
            .map(|d| format!("Dimensions('{}')", bind_key(d)))
            .collect();
        let endpoint = format!("/Cubes('{}')/tm1.ReorderDimensions", quote(cube));

        let response: serde_json::Value = self
            .rest
            .post_json(&endpoint, &json!({ "Dimensions@odata.bind": binds }))
            .await?;
        let change = response["value"].as_f64().unwrap_or_default();
        debug!(change, "Storage order updated");
        Ok(change)
    }

    /// Deletes persistent feeders. Before v12 only.
    pub async fn delete_persistent_feeders(&self, cube: &str) -> Result<()> {
        require(self.rest.as_ref(), Capability::DeletePersistentFeeders)?;
        self.action(cube, "tm1.DeletePersistentFeeders").await
    }

    async fn action(&self, cube: &str, action: &str) -> Result<()> {
        let endpoint = format!("/Cubes('{}')/{action}", quote(cube));
        self.rest.post_discard(&endpoint, &json!({})).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRest;
    use tm1_core::CoreError;
    use tm1_rest::{Method, Tm1Error};

    fn service(mock: MockRest) -> (CubeService, Arc<MockRest>) {
        let mock = Arc::new(mock);
        (CubeService::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_dimension_names_skip_sandbox() {
        let (cubes, _) = service(MockRest::new("11.8").on(
            Method::GET,
            "/Cubes('Sales')/Dimensions",
            200,
            json!({"value": [{"Name": "Sandboxes"}, {"Name": "Year"}, {"Name": "Region"}]}),
        ));

        let names = cubes.dimension_names("Sales").await.unwrap();
        assert_eq!(names, vec!["Year", "Region"]);
    }

    #[tokio::test]
    async fn test_exists() {
        let (cubes, _) = service(MockRest::new("11.8").on(
            Method::GET,
            "/Cubes('Sales')",
            200,
            json!({"Name": "Sales"}),
        ));
        assert!(cubes.exists("Sales").await.unwrap());
        assert!(!cubes.exists("Nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_load_gated_below_11_6() {
        let (cubes, mock) = service(MockRest::new("11.5.0"));
        let err = cubes.load("Sales").await.unwrap_err();
        assert!(matches!(
            err,
            Tm1Error::Core(CoreError::VersionUnsupported { .. })
        ));
        assert!(mock.trace().is_empty());
    }

    #[tokio::test]
    async fn test_unload_on_v12() {
        let (cubes, mock) = service(MockRest::new("12.0.0").on(
            Method::POST,
            "/Cubes('Sales')/tm1.Unload",
            204,
            json!(null),
        ));
        cubes.unload("Sales").await.unwrap();
        assert_eq!(mock.trace(), vec!["POST /Cubes('Sales')/tm1.Unload"]);
    }

    #[tokio::test]
    async fn test_persistent_feeders_removed_in_v12() {
        let (cubes, _) = service(MockRest::new("12.0.0"));
        assert!(cubes.delete_persistent_feeders("Sales").await.is_err());
    }

    #[tokio::test]
    async fn test_update_storage_order() {
        let (cubes, mock) = service(MockRest::new("11.4.0").on(
            Method::POST,
            "/Cubes('Sales')/tm1.ReorderDimensions",
            200,
            json!({"value": -12.5}),
        ));

        let change = cubes
            .update_storage_dimension_order("Sales", &["Region".into(), "Year".into()])
            .await
            .unwrap();
        assert!((change + 12.5).abs() < f64::EPSILON);

        let body = mock.requests()[0].body.clone().unwrap();
        assert_eq!(
            body["Dimensions@odata.bind"],
            json!(["Dimensions('Region')", "Dimensions('Year')"])
        );
    }
}
