//! Connection configuration.
//!
//! [`Tm1Config`] holds everything needed to reach a server: where it lives,
//! how to authenticate, and how requests behave. The deployment topology and
//! authentication mode are derived from which fields are set.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, Tm1Error};
use crate::odata::{encode_component, quote, with_trailing_slash};

/// Host substring identifying IBM's SaaS offering.
pub const SAAS_HOST_MARKER: &str = "planninganalytics.saas.ibm.com";

/// Default IBM Cloud IAM endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("tm1-rs/", env!("CARGO_PKG_VERSION"));

/// Default session context label.
pub const DEFAULT_SESSION_CONTEXT: &str = "tm1-rs";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_POOL_SIZE: usize = 10;

// ============================================================================
// Config
// ============================================================================

/// Connection settings for a TM1 server.
///
/// Every field has a default so the struct can be loaded from a partial
/// YAML/JSON document or built with struct-update syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Tm1Config {
    // Connection
    /// Server host name.
    pub address: Option<String>,
    /// HTTP port.
    pub port: Option<u16>,
    /// Use `https`.
    pub ssl: bool,
    /// Explicit base URL; overrides address/port/ssl.
    pub base_url: Option<String>,
    /// SaaS tenant.
    pub tenant: Option<String>,
    /// Database name (SaaS, named instance, workspace proxy).
    pub database: Option<String>,
    /// Named instance.
    pub instance: Option<String>,
    /// Planning Analytics Workspace proxy host.
    pub proxy_host: Option<String>,

    // Credentials
    /// User name.
    pub user: Option<String>,
    /// Password.
    pub password: Option<String>,
    /// The password is base64-encoded.
    pub decode_b64: bool,
    /// CAM namespace.
    pub namespace: Option<String>,
    /// CAM passport token.
    pub cam_passport: Option<String>,
    /// Existing session ID to reuse.
    pub session_id: Option<String>,
    /// OAuth access token.
    pub access_token: Option<String>,
    /// Service-to-service application client ID.
    pub application_client_id: Option<String>,
    /// Service-to-service application client secret.
    pub application_client_secret: Option<String>,
    /// API key (SaaS or IBM Cloud).
    pub api_key: Option<String>,
    /// IBM Cloud IAM endpoint.
    pub iam_url: Option<String>,
    /// Windows integrated login.
    pub integrated_login: bool,

    // Behavior
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Send every request with `Prefer: respond-async`.
    pub async_requests_mode: bool,
    /// Cancel server-side async work when the timeout elapses.
    pub cancel_at_timeout: bool,
    /// `TM1-SessionContext` header value.
    pub session_context: String,
    /// User to impersonate.
    pub impersonate: Option<String>,
    /// Declared only; a mid-session 401 is surfaced to the caller.
    pub reconnect_on_session_timeout: bool,
    /// Declared only; remote disconnects are surfaced to the caller.
    pub reconnect_on_remote_disconnect: bool,
    /// Verify TLS certificates.
    pub verify_tls: bool,
    /// Maximum idle connections kept per host.
    pub connection_pool_size: usize,
    /// Skip `tm1.Close` on logout.
    pub keep_alive: bool,
    /// Extra headers sent with every request.
    pub additional_headers: BTreeMap<String, String>,
}

impl Default for Tm1Config {
    fn default() -> Self {
        Self {
            address: None,
            port: None,
            ssl: true,
            base_url: None,
            tenant: None,
            database: None,
            instance: None,
            proxy_host: None,
            user: None,
            password: None,
            decode_b64: false,
            namespace: None,
            cam_passport: None,
            session_id: None,
            access_token: None,
            application_client_id: None,
            application_client_secret: None,
            api_key: None,
            iam_url: None,
            integrated_login: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            async_requests_mode: false,
            cancel_at_timeout: false,
            session_context: DEFAULT_SESSION_CONTEXT.to_string(),
            impersonate: None,
            reconnect_on_session_timeout: false,
            reconnect_on_remote_disconnect: false,
            verify_tls: true,
            connection_pool_size: DEFAULT_POOL_SIZE,
            keep_alive: false,
            additional_headers: BTreeMap::new(),
        }
    }
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

// ============================================================================
// Topology
// ============================================================================

/// Deployment topology of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    /// `{scheme}://{host}:{port}/api/v1`
    Legacy {
        /// `http` or `https`.
        scheme: String,
        /// Host.
        host: String,
        /// Port.
        port: u16,
    },
    /// `https://{host}/api/{tenant}/v0/tm1/{database}`
    MultiTenant {
        /// Host.
        host: String,
        /// Tenant.
        tenant: String,
        /// Database.
        database: String,
    },
    /// `{scheme}://{host}:{port}/{instance}/api/v1/Databases('{database}')`
    NamedInstance {
        /// `http` or `https`.
        scheme: String,
        /// Host.
        host: String,
        /// Port.
        port: u16,
        /// Instance.
        instance: String,
        /// Database.
        database: String,
    },
    /// `{scheme}://{host}/tm1/{database}/api/v1`
    WorkspaceProxy {
        /// `http` or `https`.
        scheme: String,
        /// Proxy host.
        host: String,
        /// Database.
        database: String,
    },
    /// Caller-supplied base URL.
    Explicit {
        /// The URL as given.
        url: String,
    },
}

/// Topology family, as inferred from a base URL's path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyKind {
    /// Single-tenant `/api/v1`.
    Legacy,
    /// SaaS `/api/{tenant}/v0/tm1/{database}`.
    MultiTenant,
    /// `/{instance}/api/v1/Databases('{database}')`.
    NamedInstance,
    /// `/tm1/{database}/api/v1`.
    WorkspaceProxy,
}

impl TopologyKind {
    /// Infers the topology family from a URL path.
    pub fn infer(url: &Url) -> Self {
        let path = url.path();
        if path.contains("/api/v1/Databases(") {
            Self::NamedInstance
        } else if path.contains("/v0/tm1/") {
            Self::MultiTenant
        } else if path.starts_with("/tm1/") && path.trim_end_matches('/').ends_with("/api/v1") {
            Self::WorkspaceProxy
        } else {
            Self::Legacy
        }
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Tm1Error::InvalidUrl(format!("{raw}: {e}")))
}

fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

impl Topology {
    /// Composed base URL, always ending with a single `/`.
    ///
    /// Database names are percent-encoded. A scheme's default port is
    /// elided by URL normalization (`https://host:443` becomes `https://host`).
    pub fn base_url(&self) -> Result<Url> {
        let raw = match self {
            Self::Legacy { scheme, host, port } => format!("{scheme}://{host}:{port}/api/v1"),
            Self::MultiTenant {
                host,
                tenant,
                database,
            } => format!(
                "https://{host}/api/{tenant}/v0/tm1/{}",
                encode_component(database)
            ),
            Self::NamedInstance {
                scheme,
                host,
                port,
                instance,
                database,
            } => format!(
                "{scheme}://{host}:{port}/{instance}/api/v1/Databases('{}')",
                quote(database)
            ),
            Self::WorkspaceProxy {
                scheme,
                host,
                database,
            } => format!(
                "{scheme}://{host}/tm1/{}/api/v1",
                encode_component(database)
            ),
            Self::Explicit { url } => url.clone(),
        };
        Ok(with_trailing_slash(parse_url(&raw)?))
    }

    /// Separate authentication endpoint, for topologies that have one.
    pub fn auth_url(&self) -> Result<Option<Url>> {
        match self {
            Self::NamedInstance {
                scheme,
                host,
                port,
                instance,
                ..
            } => Ok(Some(parse_url(&format!(
                "{scheme}://{host}:{port}/{instance}/auth/v1/session"
            ))?)),
            Self::WorkspaceProxy { scheme, host, .. } => {
                Ok(Some(parse_url(&format!("{scheme}://{host}/login"))?))
            }
            Self::Explicit { .. } => {
                let base = self.base_url()?;
                match TopologyKind::infer(&base) {
                    TopologyKind::NamedInstance => {
                        let path = base.path();
                        let prefix = path.split("/api/v1/Databases(").next().unwrap_or("");
                        Ok(Some(parse_url(&format!(
                            "{}{prefix}/auth/v1/session",
                            origin(&base)
                        ))?))
                    }
                    TopologyKind::WorkspaceProxy => {
                        Ok(Some(parse_url(&format!("{}/login", origin(&base)))?))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Topology family.
    pub fn kind(&self) -> Result<TopologyKind> {
        Ok(match self {
            Self::Legacy { .. } => TopologyKind::Legacy,
            Self::MultiTenant { .. } => TopologyKind::MultiTenant,
            Self::NamedInstance { .. } => TopologyKind::NamedInstance,
            Self::WorkspaceProxy { .. } => TopologyKind::WorkspaceProxy,
            Self::Explicit { .. } => TopologyKind::infer(&self.base_url()?),
        })
    }
}

// ============================================================================
// Auth Mode
// ============================================================================

/// How the client authenticates, selected from the declared credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// `Authorization: Basic base64(user:pass)`.
    Basic,
    /// Windows integrated login. Declared but unsupported.
    WindowsIntegrated,
    /// `Authorization: CAMNamespace base64(user:pass:namespace)`.
    CamWithNamespace,
    /// `Authorization: CAMPassport {token}`.
    CamPassport,
    /// Application client credentials against the paired auth URL.
    ServiceToService,
    /// API key exchanged for a bearer token at IBM Cloud IAM.
    IbmCloudApiKey,
    /// SaaS API key sent as basic credentials for user `apikey`.
    BasicApiKey,
    /// Bearer access token.
    AccessToken,
    /// Form login against the workspace proxy.
    WorkspaceProxy,
    /// Reuse an existing session cookie.
    SessionReuse,
}

impl Tm1Config {
    /// Derives the deployment topology.
    pub fn topology(&self) -> Result<Topology> {
        if let Some(url) = present(self.base_url.as_ref()) {
            return Ok(Topology::Explicit {
                url: url.to_string(),
            });
        }

        let scheme = if self.ssl { "https" } else { "http" }.to_string();

        if let Some(host) = present(self.proxy_host.as_ref()) {
            let database = self.require(self.database.as_ref(), "database")?;
            return Ok(Topology::WorkspaceProxy {
                scheme,
                host: host.to_string(),
                database,
            });
        }

        let host = self.require(self.address.as_ref(), "address")?;

        if let Some(tenant) = present(self.tenant.as_ref()) {
            let database = self.require(self.database.as_ref(), "database")?;
            return Ok(Topology::MultiTenant {
                host,
                tenant: tenant.to_string(),
                database,
            });
        }

        let port = self
            .port
            .ok_or_else(|| Tm1Error::validation("port is required"))?;

        if let Some(instance) = present(self.instance.as_ref()) {
            let database = self.require(self.database.as_ref(), "database")?;
            return Ok(Topology::NamedInstance {
                scheme,
                host,
                port,
                instance: instance.to_string(),
                database,
            });
        }

        Ok(Topology::Legacy { scheme, host, port })
    }

    fn require(&self, field: Option<&String>, name: &str) -> Result<String> {
        present(field)
            .map(str::to_string)
            .ok_or_else(|| Tm1Error::validation(format!("{name} is required")))
    }

    /// Base URL for the configured topology.
    pub fn base_url(&self) -> Result<Url> {
        self.topology()?.base_url()
    }

    /// Auth endpoint for the configured topology, if it has one.
    pub fn auth_url(&self) -> Result<Option<Url>> {
        self.topology()?.auth_url()
    }

    /// Selects the authentication mode. First match wins.
    pub fn auth_mode(&self) -> Option<AuthMode> {
        let has = |f: &Option<String>| present(f.as_ref()).is_some();

        if has(&self.session_id) {
            return Some(AuthMode::SessionReuse);
        }
        if has(&self.api_key) {
            let saas_host = [&self.address, &self.base_url, &self.proxy_host]
                .into_iter()
                .filter_map(|f| present(f.as_ref()))
                .any(|h| h.contains(SAAS_HOST_MARKER));
            if saas_host {
                return Some(AuthMode::BasicApiKey);
            }
            if has(&self.tenant) || has(&self.iam_url) {
                return Some(AuthMode::IbmCloudApiKey);
            }
        }
        if has(&self.application_client_id) && has(&self.application_client_secret) {
            return Some(AuthMode::ServiceToService);
        }
        if has(&self.access_token) {
            return Some(AuthMode::AccessToken);
        }
        if has(&self.cam_passport) {
            return Some(AuthMode::CamPassport);
        }
        if has(&self.namespace) {
            return Some(AuthMode::CamWithNamespace);
        }
        if self.integrated_login {
            return Some(AuthMode::WindowsIntegrated);
        }
        if has(&self.user) {
            if has(&self.proxy_host) {
                return Some(AuthMode::WorkspaceProxy);
            }
            return Some(AuthMode::Basic);
        }
        None
    }

    /// Password in clear text, decoding it first when flagged as base64.
    pub fn decoded_password(&self) -> Result<String> {
        let raw = self.password.clone().unwrap_or_default();
        if !self.decode_b64 {
            return Ok(raw);
        }
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| Tm1Error::validation(format!("password is not valid base64: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| Tm1Error::validation(format!("password is not valid UTF-8: {e}")))
    }

    /// IAM endpoint, falling back to the public IBM Cloud one.
    pub fn iam_url(&self) -> &str {
        present(self.iam_url.as_ref()).unwrap_or(DEFAULT_IAM_URL)
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Headers cloned into every request.
    pub fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; odata.streaming=true; charset=utf-8"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json;odata.metadata=none,text/plain"),
        );
        insert_header(&mut headers, "TM1-SessionContext", &self.session_context)?;

        for (name, value) in &self.additional_headers {
            insert_header(&mut headers, name, value)?;
        }
        if let Some(user) = present(self.impersonate.as_ref()) {
            insert_header(&mut headers, "TM1-Impersonate", user)?;
        }

        Ok(headers)
    }
}

/// Parses and inserts a header, replacing any previous value.
pub fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<()> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Tm1Error::InvalidHeader(format!("{name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| Tm1Error::InvalidHeader(format!("{name}: {e}")))?;
    headers.insert(name, value);
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> Tm1Config {
        Tm1Config {
            address: Some("tm1.local".into()),
            port: Some(8010),
            user: Some("admin".into()),
            password: Some("apple".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_legacy_base_url() {
        let cfg = Tm1Config {
            ssl: false,
            ..legacy()
        };
        assert_eq!(cfg.base_url().unwrap().as_str(), "http://tm1.local:8010/api/v1/");
        assert_eq!(cfg.auth_url().unwrap(), None);
    }

    #[test]
    fn test_multi_tenant_base_url() {
        let cfg = Tm1Config {
            address: Some("us-east-2.planninganalytics.saas.ibm.com".into()),
            tenant: Some("T1".into()),
            database: Some("Plan DB".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.base_url().unwrap().as_str(),
            "https://us-east-2.planninganalytics.saas.ibm.com/api/T1/v0/tm1/Plan%20DB/"
        );
    }

    #[test]
    fn test_named_instance_urls() {
        let cfg = Tm1Config {
            address: Some("pa.local".into()),
            port: Some(443),
            instance: Some("tm1".into()),
            database: Some("Planning".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.base_url().unwrap().as_str(),
            "https://pa.local/tm1/api/v1/Databases('Planning')/"
        );
        assert_eq!(
            cfg.auth_url().unwrap().unwrap().as_str(),
            "https://pa.local/tm1/auth/v1/session"
        );
    }

    #[test]
    fn test_database_names_are_encoded() {
        let named = Tm1Config {
            address: Some("pa.local".into()),
            port: Some(9443),
            instance: Some("tm1".into()),
            database: Some("Plan DB's".into()),
            ..Default::default()
        };
        assert_eq!(
            named.base_url().unwrap().as_str(),
            "https://pa.local:9443/tm1/api/v1/Databases('Plan%20DB%27%27s')/"
        );
        assert_eq!(named.topology().unwrap().kind().unwrap(), TopologyKind::NamedInstance);

        let proxy = Tm1Config {
            proxy_host: Some("paw.local".into()),
            database: Some("Sales EU".into()),
            ..Default::default()
        };
        assert_eq!(
            proxy.base_url().unwrap().as_str(),
            "https://paw.local/tm1/Sales%20EU/api/v1/"
        );
    }

    #[test]
    fn test_workspace_proxy_urls() {
        let cfg = Tm1Config {
            proxy_host: Some("paw.local".into()),
            database: Some("Sales".into()),
            user: Some("bob".into()),
            ssl: false,
            ..Default::default()
        };
        assert_eq!(cfg.base_url().unwrap().as_str(), "http://paw.local/tm1/Sales/api/v1/");
        assert_eq!(cfg.auth_url().unwrap().unwrap().as_str(), "http://paw.local/login");
        assert_eq!(cfg.auth_mode(), Some(AuthMode::WorkspaceProxy));
    }

    #[test]
    fn test_explicit_base_url_inference() {
        let cfg = Tm1Config {
            base_url: Some("https://pa.local:9443/inst/api/v1/Databases('DB')".into()),
            ..Default::default()
        };
        assert_eq!(
            cfg.base_url().unwrap().as_str(),
            "https://pa.local:9443/inst/api/v1/Databases('DB')/"
        );
        assert_eq!(
            cfg.auth_url().unwrap().unwrap().as_str(),
            "https://pa.local:9443/inst/auth/v1/session"
        );
        assert_eq!(cfg.topology().unwrap().kind().unwrap(), TopologyKind::NamedInstance);

        let cfg = Tm1Config {
            base_url: Some("http://h:8010/api/v1".into()),
            ..Default::default()
        };
        assert_eq!(cfg.topology().unwrap().kind().unwrap(), TopologyKind::Legacy);
        assert_eq!(cfg.auth_url().unwrap(), None);
    }

    #[test]
    fn test_missing_fields() {
        assert!(Tm1Config::default().base_url().is_err());
        let cfg = Tm1Config {
            address: Some("h".into()),
            ..Default::default()
        };
        assert!(cfg.base_url().is_err());
    }

    #[test]
    fn test_auth_mode_selection() {
        let saas = Tm1Config {
            api_key: Some("k".into()),
            address: Some("us-east-2.planninganalytics.saas.ibm.com".into()),
            ..Default::default()
        };
        assert_eq!(saas.auth_mode(), Some(AuthMode::BasicApiKey));

        let cloud = Tm1Config {
            api_key: Some("k".into()),
            tenant: Some("T".into()),
            ..Default::default()
        };
        assert_eq!(cloud.auth_mode(), Some(AuthMode::IbmCloudApiKey));

        let s2s = Tm1Config {
            application_client_id: Some("a".into()),
            application_client_secret: Some("s".into()),
            ..Default::default()
        };
        assert_eq!(s2s.auth_mode(), Some(AuthMode::ServiceToService));

        let reuse = Tm1Config {
            session_id: Some("sid".into()),
            ..legacy()
        };
        assert_eq!(reuse.auth_mode(), Some(AuthMode::SessionReuse));
    }

    #[test]
    fn test_auth_mode_priority_tail() {
        let cam = Tm1Config {
            namespace: Some("LDAP".into()),
            ..legacy()
        };
        assert_eq!(cam.auth_mode(), Some(AuthMode::CamWithNamespace));

        let passport = Tm1Config {
            cam_passport: Some("p".into()),
            namespace: Some("LDAP".into()),
            ..legacy()
        };
        assert_eq!(passport.auth_mode(), Some(AuthMode::CamPassport));

        let token = Tm1Config {
            access_token: Some("t".into()),
            ..legacy()
        };
        assert_eq!(token.auth_mode(), Some(AuthMode::AccessToken));

        let windows = Tm1Config {
            integrated_login: true,
            ..legacy()
        };
        assert_eq!(windows.auth_mode(), Some(AuthMode::WindowsIntegrated));

        assert_eq!(legacy().auth_mode(), Some(AuthMode::Basic));
        assert_eq!(Tm1Config::default().auth_mode(), None);
    }

    #[test]
    fn test_decoded_password() {
        let cfg = Tm1Config {
            password: Some("YXBwbGU=".into()),
            decode_b64: true,
            ..legacy()
        };
        assert_eq!(cfg.decoded_password().unwrap(), "apple");
        assert_eq!(legacy().decoded_password().unwrap(), "apple");
    }

    #[test]
    fn test_default_headers() {
        let mut cfg = legacy();
        cfg.impersonate = Some("carol".into());
        cfg.additional_headers
            .insert("X-Trace".into(), "abc".into());

        let headers = cfg.default_headers().unwrap();
        assert_eq!(headers["Connection"], "keep-alive");
        assert_eq!(
            headers["Accept"],
            "application/json;odata.metadata=none,text/plain"
        );
        assert_eq!(headers["TM1-SessionContext"], DEFAULT_SESSION_CONTEXT);
        assert_eq!(headers["TM1-Impersonate"], "carol");
        assert_eq!(headers["X-Trace"], "abc");
    }

    #[test]
    fn test_config_from_yaml_like_json() {
        let cfg: Tm1Config =
            serde_json::from_str(r#"{"address": "h", "port": 5000, "user": "u"}"#).unwrap();
        assert!(cfg.ssl);
        assert!(cfg.verify_tls);
        assert_eq!(cfg.timeout(), Duration::from_secs(60));
        assert_eq!(cfg.connection_pool_size, 10);
    }
}
