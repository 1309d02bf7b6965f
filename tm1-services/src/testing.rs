//! Recording in-memory transport for service tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tm1_rest::{
    HeaderMap, HttpError, Method, RequestBody, Result, RestApi, RestRequest, RestResponse,
    StatusCode,
};

#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub raw: Option<Vec<u8>>,
}

impl Recorded {
    /// `METHOD path`, without the query string.
    pub fn line(&self) -> String {
        let path = self.endpoint.split('?').next().unwrap_or_default();
        format!("{} {path}", self.method)
    }
}

struct Rule {
    method: Method,
    path: String,
    replies: VecDeque<(StatusCode, String)>,
}

/// Answers requests from scripted rules and records every request.
///
/// Rules match on method and the endpoint path without its query string.
/// A rule with several replies hands them out in order and keeps repeating
/// the last one. Unmatched requests get a `404`.
pub(crate) struct MockRest {
    version: String,
    rules: Mutex<Vec<Rule>>,
    seen: Mutex<Vec<Recorded>>,
}

impl MockRest {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            rules: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn on_text(self, method: Method, path: &str, status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|r| r.method == method && r.path == path) {
                Some(rule) => rule.replies.push_back((status, body.to_string())),
                None => rules.push(Rule {
                    method,
                    path: path.to_string(),
                    replies: VecDeque::from([(status, body.to_string())]),
                }),
            }
        }
        self
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: Value) -> Self {
        self.on_text(method, path, status, &body.to_string())
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }

    pub fn trace(&self) -> Vec<String> {
        self.requests().iter().map(Recorded::line).collect()
    }

    fn reply(&self, method: &Method, path: &str) -> (StatusCode, String) {
        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules
            .iter_mut()
            .find(|r| &r.method == method && r.path == path)
        else {
            return (StatusCode::NOT_FOUND, String::new());
        };
        if rule.replies.len() > 1 {
            rule.replies.pop_front().unwrap()
        } else {
            rule.replies.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl RestApi for MockRest {
    async fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let recorded = Recorded {
            method: request.method.clone(),
            endpoint: request.endpoint.clone(),
            body: request.json_body().cloned(),
            raw: match &request.body {
                Some(RequestBody::Raw(bytes)) => Some(bytes.clone()),
                _ => None,
            },
        };
        let path = recorded
            .endpoint
            .split('?')
            .next()
            .unwrap_or_default()
            .to_string();
        self.seen.lock().unwrap().push(recorded);

        let (status, body) = self.reply(&request.method, &path);
        if status.as_u16() >= 400 {
            return Err(HttpError {
                method: request.method,
                url: request.endpoint,
                status,
                body,
            }
            .into());
        }
        Ok(RestResponse::buffered(status, HeaderMap::new(), body))
    }

    fn version(&self) -> &str {
        &self.version
    }
}
