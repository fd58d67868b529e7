//! Serverless event handlers: HTTP events replayed through the route table,
//! and token authorizer events.

use super::Handler;
use crate::error::{RelayError, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Method, Request};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tower::ServiceExt;
use tracing::{debug, info};

/// An HTTP request delivered as a serverless event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEvent {
    pub http_method: String,
    pub path: String,
    #[serde(default)]
    pub query_string_parameters: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Response to an [`HttpEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpEventResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Largest router response an HTTP event may return.
pub const MAX_EVENT_RESPONSE_BYTES: usize = 6 * 1024 * 1024;

/// Replays HTTP events through the same router the HTTP server uses.
#[derive(Clone)]
pub struct HttpEventHandler {
    router: Router,
    response_limit: usize,
}

impl HttpEventHandler {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            response_limit: MAX_EVENT_RESPONSE_BYTES,
        }
    }

    pub fn with_response_limit(mut self, bytes: usize) -> Self {
        self.response_limit = bytes;
        self
    }

    fn to_request(event: HttpEvent) -> Result<Request<Body>> {
        let method = Method::from_bytes(event.http_method.as_bytes()).map_err(|e| {
            RelayError::decode_failure(format!("HTTP method '{}'", event.http_method), e)
        })?;

        let mut url = Url::parse("http://event.local")
            .map_err(|e| RelayError::internal_error(e.to_string()))?;
        url.set_path(&event.path);
        if let Some(params) = event.query_string_parameters.filter(|p| !p.is_empty()) {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        let uri = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let body = match event.body {
            Some(body) if event.is_base64_encoded => BASE64
                .decode(body.as_bytes())
                .map_err(|e| RelayError::decode_failure("base64 event body", e))?,
            Some(body) => body.into_bytes(),
            None => Vec::new(),
        };

        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in event.headers.unwrap_or_default() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| RelayError::decode_failure(format!("header name '{}'", name), e))?;
            let value = HeaderValue::from_str(&value)
                .map_err(|e| RelayError::decode_failure("header value", e))?;
            builder = builder.header(name, value);
        }

        builder
            .body(Body::from(body))
            .map_err(|e| RelayError::decode_failure("HTTP event", e))
    }
}

#[async_trait]
impl Handler for HttpEventHandler {
    type Input = HttpEvent;
    type Output = HttpEventResponse;

    fn name(&self) -> &'static str {
        "http-event"
    }

    async fn handle(&self, event: HttpEvent) -> Result<HttpEventResponse> {
        debug!("HTTP event {} {}", event.http_method, event.path);
        let request = Self::to_request(event)?;
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        let status_code = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let bytes = axum::body::to_bytes(response.into_body(), self.response_limit)
            .await
            .map_err(|e| {
                RelayError::internal_error(format!(
                    "Failed to read response body (limit {} bytes): {}",
                    self.response_limit, e
                ))
            })?;
        let (body, is_base64_encoded) = match String::from_utf8(bytes.to_vec()) {
            Ok(text) => (text, false),
            Err(_) => (BASE64.encode(&bytes), true),
        };

        Ok(HttpEventResponse {
            status_code,
            headers,
            body,
            is_base64_encoded,
        })
    }
}

/// A token authorizer event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub authorization_token: String,
    pub method_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    pub context: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: String,
    pub effect: String,
    pub resource: Option<String>,
}

pub const POLICY_VERSION: &str = "2012-10-17";
pub const INVOKE_ACTION: &str = "execute-api:Invoke";
const PRINCIPAL_ID: &str = "pi_everywhere";

/// Allows invocation iff the presented token equals the configured one.
#[derive(Debug, Clone)]
pub struct AuthorizerHandler {
    expected_token: Option<String>,
}

impl AuthorizerHandler {
    /// With no token configured every request is denied.
    pub fn new(expected_token: Option<String>) -> Self {
        Self { expected_token }
    }

    pub fn allows(&self, token: &str) -> bool {
        self.expected_token.as_deref() == Some(token)
    }
}

#[async_trait]
impl Handler for AuthorizerHandler {
    type Input = AuthorizerEvent;
    type Output = AuthResponse;

    fn name(&self) -> &'static str {
        "authorizer"
    }

    async fn handle(&self, event: AuthorizerEvent) -> Result<AuthResponse> {
        let effect = if self.allows(&event.authorization_token) {
            "Allow"
        } else {
            "Deny"
        };
        info!("Authorizer: {} {}", effect, event.method_arn);

        let mut context = HashMap::new();
        context.insert("principalId".to_string(), PRINCIPAL_ID.to_string());

        Ok(AuthResponse {
            principal_id: PRINCIPAL_ID.to_string(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_string(),
                statement: vec![PolicyStatement {
                    action: INVOKE_ACTION.to_string(),
                    effect: effect.to_string(),
                    resource: Some(event.method_arn),
                }],
            },
            context,
        })
    }
}
