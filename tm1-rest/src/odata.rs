//! OData URL helpers.
//!
//! Endpoints are resolved as relative references against a base URL that
//! always ends with `/`. Query strings use form encoding with spaces written
//! as `%20`, which keeps `$filter` expressions readable on the wire.

use url::Url;
use url::form_urlencoded;

use crate::error::{Result, Tm1Error};

/// Percent-encodes a single value, spaces as `%20`.
pub fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Form-encodes query pairs, spaces as `%20`.
pub fn encode_query<K, V>(pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (k, v) in pairs {
        serializer.append_pair(k.as_ref(), v.as_ref());
    }
    serializer.finish().replace('+', "%20")
}

/// Escapes an entity name for use inside an OData key, e.g. `Cubes('{key}')`.
///
/// Single quotes are doubled, then the result is percent-encoded.
pub fn quote(name: &str) -> String {
    encode_component(&name.replace('\'', "''"))
}

/// Ensures a URL path ends with a single `/`.
pub fn with_trailing_slash(mut url: Url) -> Url {
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{trimmed}/"));
    url
}

/// Resolves an endpoint against the base URL.
///
/// An empty endpoint yields the base URL, absolute URLs pass through, and
/// relative endpoints lose any leading `/` before being joined. Query
/// strings in the endpoint are preserved.
pub fn resolve_url(base: &Url, endpoint: &str) -> Result<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Ok(base.clone());
    }

    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Url::parse(endpoint).map_err(|e| Tm1Error::InvalidUrl(format!("{endpoint}: {e}")));
    }

    base.join(endpoint.trim_start_matches('/'))
        .map_err(|e| Tm1Error::InvalidUrl(format!("{endpoint}: {e}")))
}

/// Appends already-encoded query text to a URL, keeping existing parameters.
pub fn append_query(url: &mut Url, encoded: &str) {
    if encoded.is_empty() {
        return;
    }
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
        _ => encoded.to_string(),
    };
    url.set_query(Some(&query));
}

/// Routes an endpoint to a sandbox by appending `!sandbox={name}`.
///
/// An empty or missing sandbox leaves the endpoint untouched.
pub fn add_sandbox(endpoint: &str, sandbox: Option<&str>) -> String {
    match sandbox.filter(|s| !s.is_empty()) {
        Some(name) => {
            let sep = if endpoint.contains('?') { '&' } else { '?' };
            format!("{endpoint}{sep}!sandbox={}", encode_component(name))
        }
        None => endpoint.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
