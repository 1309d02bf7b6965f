//! Helpers shared by the services.

use serde::Deserialize;
use tm1_core::Capability;
use tm1_rest::{RestApi, Result};

/// `{"value": [{"Name": ...}, ...]}`
#[derive(Debug, Default, Deserialize)]
pub(crate) struct NameList {
    #[serde(default)]
    value: Vec<Named>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Named {
    name: String,
}

impl NameList {
    pub fn into_names(self) -> Vec<String> {
        self.value.into_iter().map(|n| n.name).collect()
    }
}

/// `{"value": [...]}`
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub(crate) struct ValueList<T> {
    #[serde(default)]
    pub value: Vec<T>,
}

/// Fails when the server version does not offer `capability`.
pub(crate) fn require(rest: &dyn RestApi, capability: Capability) -> Result<()> {
    capability.check(rest.version())?;
    Ok(())
}

/// Escapes a name for an `@odata.bind` path, e.g. `Dimensions('{name}')`.
pub(crate) fn bind_key(name: &str) -> String {
    name.replace('\'', "''")
}
