//! Server-wide operations: product version, SaveData and log tailing.

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tm1_core::{Capability, DeltaPage, LogTail};
use tm1_rest::odata::encode_component;
use tm1_rest::{RestApi, RestApiExt, Result, Tm1Error};
use tracing::{debug, instrument};

use crate::common::require;
use crate::user::UserService;

/// A delta-tracked server log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// `TransactionLogEntries`
    Transaction,
    /// `MessageLogEntries`
    Message,
    /// `AuditLogEntries`
    Audit,
}

impl LogKind {
    /// Entity collection holding the entries.
    pub fn collection(&self) -> &'static str {
        match self {
            Self::Transaction => "TransactionLogEntries",
            Self::Message => "MessageLogEntries",
            Self::Audit => "AuditLogEntries",
        }
    }

    /// Function that opens a tail and returns the first delta link.
    fn tail_function(&self) -> &'static str {
        match self {
            Self::Transaction => "TailTransactionLog()",
            Self::Message => "TailMessageLog()",
            Self::Audit => "TailAuditLog()",
        }
    }

    fn capability(&self) -> Capability {
        match self {
            Self::Transaction => Capability::TransactionLogDelta,
            Self::Message => Capability::MessageLogDelta,
            Self::Audit => Capability::AuditLog,
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Server-level operations.
#[derive(Clone)]
pub struct ServerService {
    rest: Arc<dyn RestApi>,
    users: UserService,
}

impl ServerService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self {
            users: UserService::new(Arc::clone(&rest)),
            rest,
        }
    }

    /// Product version as reported by the server.
    pub async fn product_version(&self) -> Result<String> {
        let version = self
            .rest
            .get_text("/Configuration/ProductVersion/$value")
            .await?;
        Ok(version.trim().to_string())
    }

    /// Writes all cube data to disk. Before v12 only, data admin required.
    #[instrument(skip(self))]
    pub async fn save_data(&self) -> Result<()> {
        require(self.rest.as_ref(), Capability::SaveData)?;
        self.users.require_data_admin().await?;
        self.rest.post_discard("/tm1.SaveDataAll", &json!({})).await
    }

    // ------------------------------------------------------------------------
    // Log Tailing
    // ------------------------------------------------------------------------

    /// Opens a tail on a log, positioned after the newest entry.
    ///
    /// `filter` is an OData `$filter` expression applied to every later page.
    #[instrument(skip(self))]
    pub async fn start_log_tail(&self, kind: LogKind, filter: Option<&str>) -> Result<LogTail> {
        require(self.rest.as_ref(), kind.capability())?;

        let mut endpoint = format!("/{}", kind.tail_function());
        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            endpoint.push_str(&format!("?$filter={}", encode_component(filter)));
        }

        let page: DeltaPage = self.rest.get_json(&endpoint).await?;
        if page.delta_link.is_none() {
            return Err(Tm1Error::InvalidResponse(format!(
                "{kind} tail returned no delta link"
            )));
        }

        let mut tail = LogTail::new(kind.collection());
        tail.advance(page);
        debug!(next = tail.next_endpoint(), "Log tail opened");
        Ok(tail)
    }

    /// Fetches the entries written since the last call and advances the tail.
    pub async fn log_delta(&self, kind: LogKind, tail: &mut LogTail) -> Result<Vec<Value>> {
        require(self.rest.as_ref(), kind.capability())?;
        let page: DeltaPage = self.rest.get_json(tail.next_endpoint()).await?;
        Ok(tail.advance(page))
    }

    /// New transaction log entries. Before v12 only.
    pub async fn transaction_log_delta(&self, tail: &mut LogTail) -> Result<Vec<Value>> {
        self.log_delta(LogKind::Transaction, tail).await
    }

    /// New message log entries. Before v12 only.
    pub async fn message_log_delta(&self, tail: &mut LogTail) -> Result<Vec<Value>> {
        self.log_delta(LogKind::Message, tail).await
    }

    /// New audit log entries. 11.6 and later, before v12.
    pub async fn audit_log_delta(&self, tail: &mut LogTail) -> Result<Vec<Value>> {
        self.log_delta(LogKind::Audit, tail).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRest;
    use tm1_core::CoreError;
    use tm1_rest::Method;

    fn service(mock: MockRest) -> (ServerService, Arc<MockRest>) {
        let mock = Arc::new(mock);
        (ServerService::new(mock.clone()), mock)
    }

    #[tokio::test]
    async fn test_product_version() {
        let (server, _) = service(MockRest::new("11.8").on_text(
            Method::GET,
            "/Configuration/ProductVersion/$value",
            200,
            "11.8.02500.3\n",
        ));
        assert_eq!(server.product_version().await.unwrap(), "11.8.02500.3");
    }

    #[tokio::test]
    async fn test_save_data_checks_privilege() {
        let (server, mock) = service(MockRest::new("11.8").on(
            Method::GET,
            "/ActiveUser",
            200,
            json!({"Name": "bob", "Groups": [{"Name": "Sales"}]}),
        ));

        let err = server.save_data().await.unwrap_err();
        assert!(matches!(err, Tm1Error::Core(CoreError::PrivilegeRequired(_))));
        assert_eq!(mock.trace(), vec!["GET /ActiveUser"]);
    }

    #[tokio::test]
    async fn test_save_data() {
        let (server, mock) = service(
            MockRest::new("11.8")
                .on(
                    Method::GET,
                    "/ActiveUser",
                    200,
                    json!({"Name": "admin", "Groups": [{"Name": "ADMIN"}]}),
                )
                .on(Method::POST, "/tm1.SaveDataAll", 204, json!(null)),
        );

        server.save_data().await.unwrap();
        assert_eq!(mock.trace().last().unwrap(), "POST /tm1.SaveDataAll");
    }

    #[tokio::test]
    async fn test_save_data_rejected_on_v12() {
        let (server, mock) = service(MockRest::new("12.0.0"));
        let err = server.save_data().await.unwrap_err();
        assert!(matches!(err, Tm1Error::Core(CoreError::VersionUnsupported { .. })));
        assert!(mock.trace().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_log_tail() {
        let (server, mock) = service(
            MockRest::new("11.8")
                .on(
                    Method::GET,
                    "/TailTransactionLog()",
                    200,
                    json!({"value": [], "@odata.deltaLink": "TransactionLogEntries/!delta('A')"}),
                )
                .on(
                    Method::GET,
                    "TransactionLogEntries/!delta('A')",
                    200,
                    json!({
                        "value": [{"Cube": "Sales"}, {"Cube": "Plan"}],
                        "@odata.deltaLink": "TransactionLogEntries/!delta('B')"
                    }),
                ),
        );

        let mut tail = server
            .start_log_tail(LogKind::Transaction, Some("Cube eq 'Sales'"))
            .await
            .unwrap();
        assert_eq!(tail.next_endpoint(), "TransactionLogEntries/!delta('A')");
        assert!(mock.requests()[0]
            .endpoint
            .ends_with("?$filter=Cube%20eq%20%27Sales%27"));

        let entries = server.transaction_log_delta(&mut tail).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(tail.next_endpoint(), "TransactionLogEntries/!delta('B')");
    }

    #[tokio::test]
    async fn test_tail_without_delta_link_is_invalid() {
        let (server, _) = service(MockRest::new("11.8").on(
            Method::GET,
            "/TailMessageLog()",
            200,
            json!({"value": []}),
        ));
        let err = server.start_log_tail(LogKind::Message, None).await.unwrap_err();
        assert!(matches!(err, Tm1Error::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_audit_log_window() {
        let (server, _) = service(MockRest::new("11.5.0"));
        let mut tail = LogTail::new("AuditLogEntries");
        assert!(server.audit_log_delta(&mut tail).await.is_err());

        let (server, _) = service(MockRest::new("12.0.0"));
        assert!(server.audit_log_delta(&mut tail).await.is_err());
    }
}
