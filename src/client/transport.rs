//! Wire transports.
//!
//! The client describes every request as a protocol-neutral [`Call`]. A
//! [`Transport`] renders it onto the wire: [`HttpTransport`] speaks the JSON
//! gateway (`/v1/...`) for REST collections and Connect
//! (`/bytebase.v1.{Service}/{Method}`) for RPC collections, over one
//! authenticated `reqwest` client.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Method as HttpMethod, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use tonic::Code;
use url::Url;

use crate::error::ProviderError;
use crate::types::API_VERSION;

/// Wire protocol of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// JSON over HTTP through the gateway.
    Rest,
    /// Connect RPC with JSON bodies.
    Connect,
}

/// Static routing facts about one server collection.
#[derive(Debug, PartialEq, Eq)]
pub struct Collection {
    /// Name segment, e.g. `projects`.
    pub segment: &'static str,
    /// Message kind used in RPC method names, e.g. `Project`.
    pub kind: &'static str,
    /// Plural used by the list method, e.g. `Projects`.
    pub plural: &'static str,
    /// RPC service, e.g. `ProjectService`.
    pub service: &'static str,
    /// Request field carrying the message in create and update, e.g. `project`.
    pub field: &'static str,
    /// Response field carrying list items, e.g. `projects`.
    pub list_field: &'static str,
    /// Query/body parameter carrying the id on create, e.g. `project_id`.
    pub id_param: Option<&'static str>,
    /// Wire protocol.
    pub protocol: Protocol,
    /// Updates upsert by default.
    pub allow_missing: bool,
    /// Deletion is a state transition; the object can be undeleted.
    pub soft_delete: bool,
    /// Update requests carry a field mask.
    pub field_mask: bool,
}

impl Collection {
    /// Defaults for a REST collection; override fields with struct update syntax.
    pub const fn rest(
        segment: &'static str,
        kind: &'static str,
        service: &'static str,
        field: &'static str,
    ) -> Self {
        Self {
            segment,
            kind,
            plural: segment,
            service,
            field,
            list_field: segment,
            id_param: None,
            protocol: Protocol::Rest,
            allow_missing: false,
            soft_delete: false,
            field_mask: true,
        }
    }

    fn plural_kind(&self) -> String {
        let mut chars = self.plural.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Operation of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Fetch one object by name.
    Get,
    /// Fetch one page of a collection.
    List,
    /// Create an object under a parent.
    Create,
    /// Apply a field-masked update.
    Update,
    /// Delete by name.
    Delete,
    /// Restore a soft-deleted object.
    Undelete,
    /// Read the IAM policy of a resource.
    GetIamPolicy,
    /// Overwrite the IAM policy of a resource.
    SetIamPolicy,
}

impl Method {
    fn rpc_verb(self) -> &'static str {
        match self {
            Self::Get => "Get",
            Self::List => "List",
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::Undelete => "Undelete",
            Self::GetIamPolicy => "GetIamPolicy",
            Self::SetIamPolicy => "SetIamPolicy",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rpc_verb())
    }
}

/// Paging and filtering of a list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paging {
    /// Page size.
    pub page_size: i32,
    /// Token returned by the previous page.
    pub page_token: String,
    /// Compiled filter expression.
    pub filter: String,
    /// Include soft-deleted objects.
    pub show_deleted: bool,
}

/// One protocol-neutral request.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Target collection.
    pub collection: &'static Collection,
    /// Operation.
    pub method: Method,
    /// Object name, or parent for list and create. May be empty for top-level collections.
    pub target: String,
    /// Id for create.
    pub id: Option<String>,
    /// Message body for create, update and set-IAM-policy.
    pub body: Option<Value>,
    /// Field mask for update, snake_case paths.
    pub update_mask: Vec<String>,
    /// Upsert on update.
    pub allow_missing: bool,
    /// Paging for list.
    pub paging: Option<Paging>,
}

impl Call {
    /// A call with no parameters.
    pub fn new(collection: &'static Collection, method: Method, target: impl Into<String>) -> Self {
        Self {
            collection,
            method,
            target: target.into(),
            id: None,
            body: None,
            update_mask: Vec::new(),
            allow_missing: false,
            paging: None,
        }
    }

    /// Attach a body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// RPC method name, e.g. `UpdateDatabaseGroup`.
    pub fn rpc_method(&self) -> String {
        match self.method {
            Method::List => format!("List{}", self.collection.plural_kind()),
            Method::GetIamPolicy | Method::SetIamPolicy => self.method.rpc_verb().to_string(),
            other => format!("{}{}", other.rpc_verb(), self.collection.kind),
        }
    }

    /// Parent-relative collection path, e.g. `projects/p/databaseGroups`.
    pub fn collection_path(&self) -> String {
        if self.target.is_empty() {
            self.collection.segment.to_string()
        } else {
            format!("{}/{}", self.target, self.collection.segment)
        }
    }
}

/// Sends calls to a Bytebase server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one call and return the decoded response body.
    async fn send(&self, call: &Call) -> Result<Value, ProviderError>;
}

/// Maximum length of a response body included in logs and errors.
const MAX_LOG_BODY_LENGTH: usize = 200;

fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };
    truncated.replace(|c: char| c.is_control(), "")
}

/// Authenticated HTTP transport.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for `base` that sends `token` as a bearer token.
    pub fn new(http: reqwest::Client, base: Url, token: impl Into<String>) -> Self {
        Self {
            http,
            base,
            token: token.into(),
        }
    }

    /// Base URL without trailing slash.
    pub fn base(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn rest_request(&self, call: &Call) -> RequestBuilder {
        let api = format!("{}/{}", self.base(), API_VERSION);
        let (verb, path) = match call.method {
            Method::Get => (HttpMethod::GET, call.target.clone()),
            Method::List => (HttpMethod::GET, call.collection_path()),
            Method::Create => (HttpMethod::POST, call.collection_path()),
            Method::Update => (HttpMethod::PATCH, call.target.clone()),
            Method::Delete => (HttpMethod::DELETE, call.target.clone()),
            Method::Undelete => (HttpMethod::POST, format!("{}:undelete", call.target)),
            Method::GetIamPolicy => (HttpMethod::GET, format!("{}:getIamPolicy", call.target)),
            Method::SetIamPolicy => (HttpMethod::POST, format!("{}:setIamPolicy", call.target)),
        };

        let mut query: Vec<(&str, String)> = Vec::new();
        match call.method {
            Method::List => {
                if let Some(paging) = &call.paging {
                    query.push(("page_size", paging.page_size.to_string()));
                    if !paging.page_token.is_empty() {
                        query.push(("page_token", paging.page_token.clone()));
                    }
                    if !paging.filter.is_empty() {
                        query.push(("filter", paging.filter.clone()));
                    }
                    if paging.show_deleted {
                        query.push(("show_deleted", "true".to_string()));
                    }
                }
            },
            Method::Create => {
                if let (Some(param), Some(id)) = (call.collection.id_param, &call.id) {
                    query.push((param, id.clone()));
                }
            },
            Method::Update => {
                if call.collection.field_mask {
                    query.push(("update_mask", call.update_mask.join(",")));
                }
                if call.allow_missing {
                    query.push(("allow_missing", "true".to_string()));
                }
            },
            _ => {},
        }

        let mut request = self
            .http
            .request(verb, format!("{}/{}", api, path))
            .bearer_auth(&self.token);
        if !query.is_empty() {
            request = request.query(&query);
        }
        match (&call.method, &call.body) {
            (Method::SetIamPolicy, Some(body)) => {
                let etag = body.get("etag").cloned().unwrap_or(Value::Null);
                request.json(&json!({ "policy": body, "etag": etag }))
            },
            (Method::Undelete, _) => request.json(&json!({})),
            (_, Some(body)) => request.json(body),
            (_, None) => request,
        }
    }

    fn connect_request(&self, call: &Call) -> RequestBuilder {
        let url = format!(
            "{}/bytebase.{}.{}/{}",
            self.base(),
            API_VERSION,
            call.collection.service,
            call.rpc_method()
        );
        self.http
            .post(url)
            .bearer_auth(&self.token)
            .header("Connect-Protocol-Version", "1")
            .json(&connect_body(call))
    }
}

/// Request message of a Connect call.
pub fn connect_body(call: &Call) -> Value {
    let mut body = Map::new();
    let collection = call.collection;
    match call.method {
        Method::Get | Method::Delete | Method::Undelete => {
            body.insert("name".into(), Value::String(call.target.clone()));
        },
        Method::List => {
            if !call.target.is_empty() {
                body.insert("parent".into(), Value::String(call.target.clone()));
            }
            if let Some(paging) = &call.paging {
                body.insert("pageSize".into(), json!(paging.page_size));
                if !paging.page_token.is_empty() {
                    body.insert("pageToken".into(), json!(paging.page_token));
                }
                if !paging.filter.is_empty() {
                    body.insert("filter".into(), json!(paging.filter));
                }
                if paging.show_deleted {
                    body.insert("showDeleted".into(), json!(true));
                }
            }
        },
        Method::Create => {
            if !call.target.is_empty() {
                body.insert("parent".into(), Value::String(call.target.clone()));
            }
            if let (Some(param), Some(id)) = (collection.id_param, &call.id) {
                body.insert(camel_case(param), Value::String(id.clone()));
            }
            body.insert(
                camel_case(collection.field),
                call.body.clone().unwrap_or(Value::Null),
            );
        },
        Method::Update => {
            body.insert(
                camel_case(collection.field),
                call.body.clone().unwrap_or(Value::Null),
            );
            if collection.field_mask {
                let paths: Vec<String> = call.update_mask.iter().map(|p| camel_case(p)).collect();
                body.insert("updateMask".into(), Value::String(paths.join(",")));
            }
            if call.allow_missing {
                body.insert("allowMissing".into(), json!(true));
            }
        },
        Method::GetIamPolicy => {
            body.insert("resource".into(), Value::String(call.target.clone()));
        },
        Method::SetIamPolicy => {
            body.insert("resource".into(), Value::String(call.target.clone()));
            let policy = call.body.clone().unwrap_or(Value::Null);
            if let Some(etag) = policy.get("etag").cloned() {
                body.insert("etag".into(), etag);
            }
            body.insert("policy".into(), policy);
        },
    }
    Value::Object(body)
}

/// `update_mask` paths are snake_case on the gateway and lowerCamelCase in
/// Connect JSON. Dots separate path segments and are kept.
pub fn camel_case(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut upper = false;
    for c in path.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, call: &Call) -> Result<Value, ProviderError> {
        let request = match call.collection.protocol {
            Protocol::Rest => self.rest_request(call),
            Protocol::Connect => self.connect_request(call),
        };
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            tracing::debug!(
                status = status.as_u16(),
                body = %sanitize_for_log(&body),
                "API error"
            );
            return Err(error_from_response(status, &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::DeadlineExceeded(err.to_string())
    } else if err.is_connect() {
        ProviderError::Unavailable(err.to_string())
    } else {
        ProviderError::Http(err)
    }
}

/// Map an error response onto the error taxonomy.
///
/// Connect reports `{"code": "not_found", "message": ..}`, the gateway
/// `{"code": 5, "message": ..}`. Without a parsable body the HTTP status
/// decides.
pub fn error_from_response(status: StatusCode, body: &str) -> ProviderError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| sanitize_for_log(body));
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code"))
        .and_then(|code| match code {
            Value::String(s) => connect_code(s),
            Value::Number(n) => n.as_i64().map(|n| Code::from_i32(n as i32)),
            _ => None,
        })
        .filter(|code| *code != Code::Ok)
        .unwrap_or_else(|| status_code(status));
    ProviderError::from_code(code, message)
}

fn connect_code(code: &str) -> Option<Code> {
    Some(match code {
        "canceled" | "cancelled" => Code::Cancelled,
        "unknown" => Code::Unknown,
        "invalid_argument" => Code::InvalidArgument,
        "deadline_exceeded" => Code::DeadlineExceeded,
        "not_found" => Code::NotFound,
        "already_exists" => Code::AlreadyExists,
        "permission_denied" => Code::PermissionDenied,
        "resource_exhausted" => Code::ResourceExhausted,
        "failed_precondition" => Code::FailedPrecondition,
        "aborted" => Code::Aborted,
        "out_of_range" => Code::OutOfRange,
        "unimplemented" => Code::Unimplemented,
        "internal" => Code::Internal,
        "unavailable" => Code::Unavailable,
        "data_loss" => Code::DataLoss,
        "unauthenticated" => Code::Unauthenticated,
        _ => return None,
    })
}

fn status_code(status: StatusCode) -> Code {
    match status {
        StatusCode::BAD_REQUEST => Code::InvalidArgument,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::NotFound,
        StatusCode::CONFLICT => Code::AlreadyExists,
        StatusCode::PRECONDITION_FAILED => Code::FailedPrecondition,
        StatusCode::NOT_IMPLEMENTED => Code::Unimplemented,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Code::DeadlineExceeded,
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE => Code::Unavailable,
        _ => Code::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static WIDGETS: Collection = Collection {
        id_param: Some("widget_id"),
        ..Collection::rest("widgets", "Widget", "WidgetService", "widget")
    };

    #[test]
    fn test_camel_case() {
        assert_eq!(camel_case("title"), "title");
        assert_eq!(camel_case("database_expr"), "databaseExpr");
        assert_eq!(
            camel_case("value.workspace_profile_setting_value.external_url"),
            "value.workspaceProfileSettingValue.externalUrl"
        );
    }

    #[test]
    fn test_rpc_method_names() {
        assert_eq!(Call::new(&WIDGETS, Method::Get, "widgets/a").rpc_method(), "GetWidget");
        assert_eq!(Call::new(&WIDGETS, Method::List, "").rpc_method(), "ListWidgets");
        assert_eq!(
            Call::new(&WIDGETS, Method::SetIamPolicy, "widgets/a").rpc_method(),
            "SetIamPolicy"
        );
    }

    #[test]
    fn test_collection_path() {
        assert_eq!(Call::new(&WIDGETS, Method::List, "").collection_path(), "widgets");
        assert_eq!(
            Call::new(&WIDGETS, Method::Create, "projects/p").collection_path(),
            "projects/p/widgets"
        );
    }

    #[test]
    fn test_connect_update_body() {
        let mut call = Call::new(&WIDGETS, Method::Update, "widgets/a")
            .with_body(json!({"name": "widgets/a", "title": "A"}));
        call.update_mask = vec!["title".to_string(), "database_expr".to_string()];
        call.allow_missing = true;
        assert_eq!(
            connect_body(&call),
            json!({
                "widget": {"name": "widgets/a", "title": "A"},
                "updateMask": "title,databaseExpr",
                "allowMissing": true
            })
        );
    }

    #[test]
    fn test_connect_create_body() {
        let mut call =
            Call::new(&WIDGETS, Method::Create, "projects/p").with_body(json!({"title": "A"}));
        call.id = Some("a".to_string());
        assert_eq!(
            connect_body(&call),
            json!({"parent": "projects/p", "widgetId": "a", "widget": {"title": "A"}})
        );
    }

    #[test]
    fn test_error_from_response() {
        let err = error_from_response(
            StatusCode::NOT_FOUND,
            r#"{"code": "not_found", "message": "project not found"}"#,
        );
        assert!(err.is_not_found());
        assert_eq!(err.message(), "project not found");

        let err = error_from_response(
            StatusCode::BAD_REQUEST,
            r#"{"code": 6, "message": "exists"}"#,
        );
        assert_eq!(err.kind(), Code::AlreadyExists);

        let err = error_from_response(StatusCode::UNAUTHORIZED, "nope");
        assert_eq!(err.kind(), Code::Unauthenticated);
        assert_eq!(err.message(), "nope");

        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.kind(), Code::Unavailable);
    }

    #[test]
    fn test_sanitize_for_log_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert_eq!(sanitize_for_log("a\nb"), "ab");
    }
}
