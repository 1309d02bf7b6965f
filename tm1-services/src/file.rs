//! Server-side files.
//!
//! v12 keeps files under `/Contents('Files')` with nested folders. Older
//! servers use the flat `/Contents('Blobs')` collection, where paths with
//! folders are rejected and listings never recurse.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tm1_core::ContentRoot;
use tm1_rest::{RestApi, RestApiExt, RestRequest, Result, Tm1Error, quote};
use tracing::{debug, instrument};

use crate::common::ValueList;

const DOCUMENT_TYPE: &str = "#ibm.tm1.api.v1.Document";
const FOLDER_TYPE: &str = "#ibm.tm1.api.v1.Folder";

/// A file or folder.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    /// Entry name.
    #[serde(rename = "Name")]
    pub name: String,
    /// OData type, document or folder.
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    /// Children, when the listing was expanded this deep.
    #[serde(rename = "Contents", default)]
    pub contents: Vec<ContentEntry>,
}

impl ContentEntry {
    /// Returns true for folders.
    pub fn is_folder(&self) -> bool {
        self.odata_type.as_deref() == Some(FOLDER_TYPE)
    }
}

/// Reads and writes server-side files.
#[derive(Clone)]
pub struct FileService {
    rest: Arc<dyn RestApi>,
}

impl FileService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self { rest }
    }

    /// Content root for the connected server.
    pub fn root(&self) -> ContentRoot {
        ContentRoot::for_version(self.rest.version())
    }

    /// Endpoint of a path below the content root. Empty paths address the root.
    fn endpoint(&self, path: &str) -> Result<String> {
        let root = self.root();
        let segments: Vec<&str> = path
            .split('/')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if root == ContentRoot::Blobs && segments.len() > 1 {
            return Err(Tm1Error::validation(format!(
                "folders are not supported before v12: {path}"
            )));
        }

        let mut endpoint = root.path().to_string();
        for segment in segments {
            endpoint.push_str(&format!("/Contents('{}')", quote(segment)));
        }
        Ok(endpoint)
    }

    /// Lists a folder. `depth` levels of subfolders are expanded.
    #[instrument(skip(self))]
    pub async fn list(&self, path: &str, depth: u32) -> Result<Vec<ContentEntry>> {
        let depth = self.root().effective_depth(depth);
        let mut query = "$select=Name".to_string();
        if depth > 0 {
            query.push_str(&format!("&$expand={}", folder_expand(depth)));
        }

        let endpoint = format!("{}/Contents?{query}", self.endpoint(path)?);
        let entries: ValueList<ContentEntry> = self.rest.get_json(&endpoint).await?;
        Ok(entries.value)
    }

    /// Reads a file.
    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let endpoint = format!("{}/Content", self.endpoint(path)?);
        self.rest.send(RestRequest::get(endpoint)).await?.bytes().await
    }

    /// Returns false when the file or folder does not exist.
    pub async fn exists(&self, path: &str) -> Result<bool> {
        let endpoint = format!("{}?$select=Name", self.endpoint(path)?);
        match self.rest.get_text(&endpoint).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates a file and uploads its content.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub async fn create(&self, path: &str, content: &[u8]) -> Result<()> {
        let (parent, name) = match path.trim_end_matches('/').rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };
        if name.trim().is_empty() {
            return Err(Tm1Error::validation("file name must not be empty"));
        }
        self.endpoint(path)?;

        let collection = format!("{}/Contents", self.endpoint(parent)?);
        self.rest
            .post_discard(
                &collection,
                &json!({ "@odata.type": DOCUMENT_TYPE, "ID": name, "Name": name }),
            )
            .await?;
        debug!(file = %path, "Document created");

        self.update(path, content).await
    }

    /// Replaces a file's content.
    pub async fn update(&self, path: &str, content: &[u8]) -> Result<()> {
        let endpoint = format!("{}/Content", self.endpoint(path)?);
        self.rest
            .request_discard(RestRequest::put(endpoint).raw(content))
            .await
    }

    /// Deletes a file.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.rest.delete(&self.endpoint(path)?).await
    }
}

/// `$expand` clause recursing `depth` folder levels.
fn folder_expand(depth: u32) -> String {
    let mut clause = String::new();
    for level in 0..depth {
        if level == 0 {
            clause = "tm1.Folder/Contents($select=Name)".to_string();
        } else {
            clause = format!("tm1.Folder/Contents($select=Name;$expand={clause})");
        }
    }
    clause
}
