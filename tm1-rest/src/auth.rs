//! Authentication providers and credential acquisition.
//!
//! An [`AuthProvider`] decorates the headers of every outgoing request.
//! [`resolve_provider`] turns the credentials declared in a [`Tm1Config`]
//! into a provider, talking to IAM or a login endpoint first when the
//! selected [`AuthMode`] needs it.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{AuthMode, Tm1Config, TopologyKind, insert_header};
use crate::error::{Result, Tm1Error};

/// Session cookie set by v11 servers.
pub const TM1_SESSION_COOKIE: &str = "TM1SessionId";

/// Session cookie set by v12 servers and Planning Analytics Workspace.
pub const PA_SESSION_COOKIE: &str = "paSession";

const CSRF_COOKIE: &str = "ba-sso-csrf";
const CSRF_HEADER: &str = "ba-sso-authenticity";

/// Signature of a caller-supplied auth function.
pub type AuthFn = dyn Fn(&mut HeaderMap) -> Result<()> + Send + Sync;

// ============================================================================
// Provider
// ============================================================================

/// Decorates outgoing requests with credentials.
#[derive(Clone)]
pub enum AuthProvider {
    /// `Authorization: Basic base64(user:password)`.
    Basic {
        /// User name.
        user: String,
        /// Clear-text password.
        password: String,
    },
    /// `Authorization: Bearer {token}`.
    Bearer(String),
    /// `Authorization: CAMNamespace base64(user:password:namespace)`.
    CamNamespace {
        /// User name.
        user: String,
        /// Clear-text password.
        password: String,
        /// CAM namespace.
        namespace: String,
    },
    /// `Authorization: CAMPassport {passport}`.
    CamPassport(String),
    /// Sends an existing session cookie.
    SessionCookie {
        /// Cookie name.
        name: String,
        /// Session ID.
        id: String,
    },
    /// Fixed set of headers.
    HeaderBag(HeaderMap),
    /// Caller-supplied function.
    Function(Arc<AuthFn>),
}

impl AuthProvider {
    /// Basic credentials.
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Wraps a closure.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut HeaderMap) -> Result<()> + Send + Sync + 'static,
    {
        Self::Function(Arc::new(f))
    }

    /// Applies the credentials to a request's headers.
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        match self {
            Self::Basic { user, password } => {
                let token = STANDARD.encode(format!("{user}:{password}"));
                set_authorization(headers, &format!("Basic {token}"))
            }
            Self::Bearer(token) => set_authorization(headers, &format!("Bearer {token}")),
            Self::CamNamespace {
                user,
                password,
                namespace,
            } => {
                let token = STANDARD.encode(format!("{user}:{password}:{namespace}"));
                set_authorization(headers, &format!("CAMNamespace {token}"))
            }
            Self::CamPassport(passport) => {
                set_authorization(headers, &format!("CAMPassport {passport}"))
            }
            Self::SessionCookie { name, id } => {
                if id.is_empty() {
                    return Err(Tm1Error::Auth("session ID is empty".to_string()));
                }
                if !headers.contains_key(header::COOKIE) {
                    insert_header(headers, header::COOKIE.as_str(), &format!("{name}={id}"))?;
                }
                Ok(())
            }
            Self::HeaderBag(bag) => {
                for (name, value) in bag {
                    headers.insert(name.clone(), value.clone());
                }
                Ok(())
            }
            Self::Function(f) => f(headers),
        }
    }
}

fn set_authorization(headers: &mut HeaderMap, value: &str) -> Result<()> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|e| Tm1Error::Auth(format!("invalid authorization header: {e}")))?;
    value.set_sensitive(true);
    headers.insert(header::AUTHORIZATION, value);
    Ok(())
}

impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic { user, .. } => f
                .debug_struct("Basic")
                .field("user", user)
                .finish_non_exhaustive(),
            Self::Bearer(_) => f.write_str("Bearer(..)"),
            Self::CamNamespace { user, namespace, .. } => f
                .debug_struct("CamNamespace")
                .field("user", user)
                .field("namespace", namespace)
                .finish_non_exhaustive(),
            Self::CamPassport(_) => f.write_str("CamPassport(..)"),
            Self::SessionCookie { name, .. } => f
                .debug_struct("SessionCookie")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::HeaderBag(bag) => f
                .debug_list()
                .entries(bag.keys().map(HeaderName::as_str))
                .finish(),
            Self::Function(_) => f.write_str("Function(..)"),
        }
    }
}

// ============================================================================
// Cookies
// ============================================================================

/// Looks up a cookie value in the jar for a URL.
pub fn find_cookie(jar: &Jar, url: &Url, name: &str) -> Option<String> {
    let header = jar.cookies(url)?;
    let raw = header.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Session cookie name for reusing a session on a topology.
pub fn session_cookie_name(kind: TopologyKind) -> &'static str {
    match kind {
        TopologyKind::Legacy => TM1_SESSION_COOKIE,
        _ => PA_SESSION_COOKIE,
    }
}

// ============================================================================
// Credential Acquisition
// ============================================================================

#[derive(Debug, Deserialize)]
struct IamToken {
    access_token: String,
}

/// Exchanges an IBM Cloud API key for a bearer token.
#[instrument(skip(client, api_key))]
pub async fn exchange_api_key(client: &Client, iam_url: &str, api_key: &str) -> Result<String> {
    let url = format!("{}/identity/token", iam_url.trim_end_matches('/'));
    debug!(url = %url, "Exchanging API key for access token");

    let response = client
        .post(&url)
        .header(header::ACCEPT, "application/json")
        .form(&[
            ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
            ("apikey", api_key),
        ])
        .send()
        .await?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        let body = response.text().await.unwrap_or_default();
        return Err(Tm1Error::Auth(format!(
            "IAM token exchange failed with status {status}: {body}"
        )));
    }

    let token: IamToken = response
        .json()
        .await
        .map_err(|e| Tm1Error::Auth(format!("invalid IAM token response: {e}")))?;
    Ok(token.access_token)
}

/// Opens a session with application client credentials.
///
/// The session cookie lands in the client's cookie jar.
#[instrument(skip(client, config), fields(url = %auth_url))]
async fn login_service_to_service(
    client: &Client,
    config: &Tm1Config,
    auth_url: &Url,
) -> Result<()> {
    let client_id = config.application_client_id.clone().unwrap_or_default();
    let secret = config.application_client_secret.clone().unwrap_or_default();

    let mut headers = HeaderMap::new();
    AuthProvider::basic(client_id, secret).apply(&mut headers)?;

    let response = client
        .post(auth_url.clone())
        .headers(headers)
        .json(&serde_json::json!({ "User": config.user.clone().unwrap_or_default() }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(Tm1Error::Auth(format!(
            "service-to-service login failed with status {status}: {body}"
        )));
    }
    Ok(())
}

/// Logs in through the workspace proxy and returns the CSRF header to send.
#[instrument(skip(client, jar, config), fields(url = %login_url))]
async fn login_workspace_proxy(
    client: &Client,
    jar: &Jar,
    config: &Tm1Config,
    login_url: &Url,
) -> Result<HeaderMap> {
    let user = config.user.clone().unwrap_or_default();
    let password = config.decoded_password()?;

    let response = client
        .post(login_url.clone())
        .form(&[("username", user.as_str()), ("password", password.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(Tm1Error::Auth(format!(
            "workspace login failed with status {status}"
        )));
    }

    let mut bag = HeaderMap::new();
    match find_cookie(jar, login_url, CSRF_COOKIE) {
        Some(token) => insert_header(&mut bag, CSRF_HEADER, &token)?,
        None => debug!("No CSRF cookie after workspace login"),
    }
    Ok(bag)
}

/// Builds the auth provider for a configuration.
///
/// Returns `None` when no credentials are declared.
pub async fn resolve_provider(
    config: &Tm1Config,
    client: &Client,
    jar: &Jar,
) -> Result<Option<AuthProvider>> {
    let Some(mode) = config.auth_mode() else {
        return Ok(None);
    };
    debug!(mode = ?mode, "Selected auth mode");

    let value = |f: &Option<String>| f.clone().unwrap_or_default();

    let provider = match mode {
        AuthMode::SessionReuse => AuthProvider::SessionCookie {
            name: session_cookie_name(config.topology()?.kind()?).to_string(),
            id: value(&config.session_id),
        },
        AuthMode::BasicApiKey => AuthProvider::basic("apikey", value(&config.api_key)),
        AuthMode::IbmCloudApiKey => {
            let token = exchange_api_key(client, config.iam_url(), &value(&config.api_key)).await?;
            AuthProvider::Bearer(token)
        }
        AuthMode::ServiceToService => {
            let auth_url = config.auth_url()?.ok_or_else(|| {
                Tm1Error::Auth("service-to-service auth requires a named instance".to_string())
            })?;
            login_service_to_service(client, config, &auth_url).await?;
            AuthProvider::HeaderBag(HeaderMap::new())
        }
        AuthMode::AccessToken => AuthProvider::Bearer(value(&config.access_token)),
        AuthMode::CamPassport => AuthProvider::CamPassport(value(&config.cam_passport)),
        AuthMode::CamWithNamespace => AuthProvider::CamNamespace {
            user: value(&config.user),
            password: config.decoded_password()?,
            namespace: value(&config.namespace),
        },
        AuthMode::WindowsIntegrated => {
            return Err(Tm1Error::NotImplemented(
                "Windows integrated login".to_string(),
            ));
        }
        AuthMode::WorkspaceProxy => {
            let login_url = config
                .auth_url()?
                .ok_or_else(|| Tm1Error::Auth("workspace proxy has no login URL".to_string()))?;
            AuthProvider::HeaderBag(login_workspace_proxy(client, jar, config, &login_url).await?)
        }
        AuthMode::Basic => AuthProvider::basic(value(&config.user), config.decoded_password()?),
    };

    Ok(Some(provider))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(provider: &AuthProvider) -> HeaderMap {
        let mut headers = HeaderMap::new();
        provider.apply(&mut headers).unwrap();
        headers
    }

    #[test]
    fn test_basic_header() {
        let headers = applied(&AuthProvider::basic("admin", "apple"));
        assert_eq!(headers[header::AUTHORIZATION], "Basic YWRtaW46YXBwbGU=");
        assert!(headers[header::AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_cam_headers() {
        let headers = applied(&AuthProvider::CamNamespace {
            user: "u".into(),
            password: "p".into(),
            namespace: "LDAP".into(),
        });
        assert_eq!(
            headers[header::AUTHORIZATION],
            format!("CAMNamespace {}", STANDARD.encode("u:p:LDAP"))
        );

        let headers = applied(&AuthProvider::CamPassport("tok".into()));
        assert_eq!(headers[header::AUTHORIZATION], "CAMPassport tok");
    }

    #[test]
    fn test_session_cookie() {
        let provider = AuthProvider::SessionCookie {
            name: TM1_SESSION_COOKIE.into(),
            id: "sid".into(),
        };
        assert_eq!(applied(&provider)[header::COOKIE], "TM1SessionId=sid");

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("manual=1"));
        provider.apply(&mut headers).unwrap();
        assert_eq!(headers[header::COOKIE], "manual=1");
    }

    #[test]
    fn test_empty_session_id_fails() {
        let provider = AuthProvider::SessionCookie {
            name: PA_SESSION_COOKIE.into(),
            id: String::new(),
        };
        let err = provider.apply(&mut HeaderMap::new()).unwrap_err();
        assert!(matches!(err, Tm1Error::Auth(_)));
    }

    #[test]
    fn test_function_provider() {
        let provider = AuthProvider::function(|headers| {
            insert_header(headers, "X-Api-Key", "secret")
        });
        assert_eq!(applied(&provider)["X-Api-Key"], "secret");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let text = format!("{:?}", AuthProvider::basic("admin", "apple"));
        assert!(text.contains("admin"));
        assert!(!text.contains("apple"));
        assert_eq!(format!("{:?}", AuthProvider::bearer("tok")), "Bearer(..)");
    }

    #[test]
    fn test_find_cookie() {
        let jar = Jar::default();
        let url = Url::parse("https://tm1.local:8010/api/v1/").unwrap();
        jar.add_cookie_str("TM1SessionId=abc; Path=/api/v1", &url);
        jar.add_cookie_str("other=1; Path=/", &url);

        assert_eq!(find_cookie(&jar, &url, TM1_SESSION_COOKIE).as_deref(), Some("abc"));
        assert_eq!(find_cookie(&jar, &url, PA_SESSION_COOKIE), None);
    }

    #[test]
    fn test_session_cookie_name() {
        assert_eq!(session_cookie_name(TopologyKind::Legacy), TM1_SESSION_COOKIE);
        assert_eq!(session_cookie_name(TopologyKind::NamedInstance), PA_SESSION_COOKIE);
    }

    #[tokio::test]
    async fn test_resolve_basic_and_session() {
        let client = Client::new();
        let jar = Jar::default();

        let config = Tm1Config {
            address: Some("h".into()),
            port: Some(1),
            user: Some("admin".into()),
            password: Some("apple".into()),
            ..Default::default()
        };
        let provider = resolve_provider(&config, &client, &jar).await.unwrap().unwrap();
        assert!(matches!(provider, AuthProvider::Basic { .. }));

        let config = Tm1Config {
            session_id: Some("sid".into()),
            ..config
        };
        let provider = resolve_provider(&config, &client, &jar).await.unwrap().unwrap();
        assert_eq!(applied(&provider)[header::COOKIE], "TM1SessionId=sid");
    }

    #[tokio::test]
    async fn test_resolve_integrated_not_implemented() {
        let config = Tm1Config {
            integrated_login: true,
            ..Default::default()
        };
        let err = resolve_provider(&config, &Client::new(), &Jar::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Tm1Error::NotImplemented(_)));
    }

    #[tokio::test]
    async fn test_resolve_saas_api_key() {
        let config = Tm1Config {
            api_key: Some("k".into()),
            address: Some("us-east-2.planninganalytics.saas.ibm.com".into()),
            ..Default::default()
        };
        let provider = resolve_provider(&config, &Client::new(), &Jar::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            applied(&provider)[header::AUTHORIZATION],
            format!("Basic {}", STANDARD.encode("apikey:k"))
        );
    }
}
