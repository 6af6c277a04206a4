//! Batch payload validation.
//!
//! # Responsibilities
//! - Check the `{"requests": [...]}` shape
//! - Normalize methods case-insensitively
//! - Validate item headers as real HTTP headers
//!
//! # Design Decisions
//! - Every item is checked; all field errors are reported together
//! - Any error rejects the whole batch before a single dispatch
//! - Paths are only checked for presence; routing decides the rest

use std::collections::BTreeMap;
use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field path (e.g. `requests[2].method`) → messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// HTTP verbs accepted in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl BatchMethod {
    pub const ALL: [BatchMethod; 5] = [
        BatchMethod::Get,
        BatchMethod::Post,
        BatchMethod::Put,
        BatchMethod::Patch,
        BatchMethod::Delete,
    ];

    /// Case-insensitive lookup.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BatchMethod::Get => "get",
            BatchMethod::Post => "post",
            BatchMethod::Put => "put",
            BatchMethod::Patch => "patch",
            BatchMethod::Delete => "delete",
        }
    }

    pub fn as_http(self) -> Method {
        match self {
            BatchMethod::Get => Method::GET,
            BatchMethod::Post => Method::POST,
            BatchMethod::Put => Method::PUT,
            BatchMethod::Patch => Method::PATCH,
            BatchMethod::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for BatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validated sub-request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestItem {
    pub path: String,
    pub method: BatchMethod,
    /// `None` when the item had no `body` key at all.
    pub body: Option<Map<String, Value>>,
    pub headers: HeaderMap,
}

const REQUIRED: &str = "This field is required.";
const NOT_NULL: &str = "This field may not be null.";
const NOT_BLANK: &str = "This field may not be blank.";
const NOT_STRING: &str = "Not a valid string.";

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_dict(value: &Value) -> String {
    format!(
        "Expected a dictionary of items but got type \"{}\".",
        type_name(value)
    )
}

fn push(errors: &mut FieldErrors, field: impl Into<String>, message: impl Into<String>) {
    errors.entry(field.into()).or_default().push(message.into());
}

/// Validate a parsed batch payload into its items, in order.
pub fn validate_batch(payload: &Value) -> Result<Vec<RequestItem>, FieldErrors> {
    let mut errors = FieldErrors::new();

    let Some(object) = payload.as_object() else {
        push(
            &mut errors,
            "non_field_errors",
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                type_name(payload)
            ),
        );
        return Err(errors);
    };

    let requests = match object.get("requests") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) => {
            push(&mut errors, "requests", NOT_NULL);
            return Err(errors);
        }
        Some(other) => {
            push(
                &mut errors,
                "requests",
                format!("Expected a list of items but got type \"{}\".", type_name(other)),
            );
            return Err(errors);
        }
        None => {
            push(&mut errors, "requests", REQUIRED);
            return Err(errors);
        }
    };

    let mut items = Vec::with_capacity(requests.len());
    for (index, raw) in requests.iter().enumerate() {
        let prefix = format!("requests[{index}]");
        if let Some(item) = validate_item(raw, &prefix, &mut errors) {
            items.push(item);
        }
    }

    if errors.is_empty() {
        Ok(items)
    } else {
        Err(errors)
    }
}

fn validate_item(raw: &Value, prefix: &str, errors: &mut FieldErrors) -> Option<RequestItem> {
    let Some(object) = raw.as_object() else {
        push(
            errors,
            prefix,
            format!("Invalid data. Expected a dictionary, but got {}.", type_name(raw)),
        );
        return None;
    };
    let before = errors.len();

    let path = match object.get("path") {
        Some(Value::String(s)) if s.trim().is_empty() => {
            push(errors, format!("{prefix}.path"), NOT_BLANK);
            None
        }
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Null) => {
            push(errors, format!("{prefix}.path"), NOT_NULL);
            None
        }
        Some(_) => {
            push(errors, format!("{prefix}.path"), NOT_STRING);
            None
        }
        None => {
            push(errors, format!("{prefix}.path"), REQUIRED);
            None
        }
    };

    let method = match object.get("method") {
        Some(Value::String(s)) => {
            let parsed = BatchMethod::parse(s);
            if parsed.is_none() {
                push(errors, format!("{prefix}.method"), format!("\"{s}\" is not a valid choice."));
            }
            parsed
        }
        Some(Value::Null) => {
            push(errors, format!("{prefix}.method"), NOT_NULL);
            None
        }
        Some(other) => {
            push(errors, format!("{prefix}.method"), format!("\"{other}\" is not a valid choice."));
            None
        }
        None => {
            push(errors, format!("{prefix}.method"), REQUIRED);
            None
        }
    };

    let body = match object.get("body") {
        None => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(Value::Null) => {
            push(errors, format!("{prefix}.body"), NOT_NULL);
            None
        }
        Some(other) => {
            push(errors, format!("{prefix}.body"), expected_dict(other));
            None
        }
    };

    let headers = match object.get("headers") {
        None => HeaderMap::new(),
        Some(Value::Object(map)) => validate_headers(map, prefix, errors),
        Some(Value::Null) => {
            push(errors, format!("{prefix}.headers"), NOT_NULL);
            HeaderMap::new()
        }
        Some(other) => {
            push(errors, format!("{prefix}.headers"), expected_dict(other));
            HeaderMap::new()
        }
    };

    if errors.len() != before {
        return None;
    }
    Some(RequestItem {
        path: path?,
        method: method?,
        body,
        headers,
    })
}

fn validate_headers(map: &Map<String, Value>, prefix: &str, errors: &mut FieldErrors) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(map.len());
    for (name, value) in map {
        let field = format!("{prefix}.headers.{name}");
        let Value::String(value) = value else {
            push(errors, field, NOT_STRING);
            continue;
        };
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            push(errors, field, "Invalid header name.");
            continue;
        };
        let Ok(header_value) = HeaderValue::from_str(value) else {
            push(errors, field, "Invalid header value.");
            continue;
        };
        headers.insert(header_name, header_value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_methods_are_case_insensitive() {
        let items = validate_batch(&json!({
            "requests": [
                {"path": "/a", "method": "GET"},
                {"path": "/b", "method": "Patch"},
                {"path": "/c", "method": "delete"},
            ]
        }))
        .unwrap();

        let methods: Vec<_> = items.iter().map(|i| i.method).collect();
        assert_eq!(methods, vec![BatchMethod::Get, BatchMethod::Patch, BatchMethod::Delete]);
        assert_eq!(items[1].method.to_string(), "patch");
    }

    #[test]
    fn test_path_is_trimmed() {
        let items = validate_batch(&json!({
            "requests": [{"path": "  /kv/a \n", "method": "get"}]
        }))
        .unwrap();
        assert_eq!(items[0].path, "/kv/a");

        let errors = validate_batch(&json!({
            "requests": [{"path": "   ", "method": "get"}]
        }))
        .unwrap_err();
        assert!(errors.contains_key("requests[0].path"));
    }

    #[test]
    fn test_body_and_headers() {
        let items = validate_batch(&json!({
            "requests": [
                {"path": "/a", "method": "post", "body": {"x": 1}, "headers": {"X-Tenant": "t1"}},
                {"path": "/b", "method": "post", "body": {}},
                {"path": "/c", "method": "get"},
            ]
        }))
        .unwrap();

        assert_eq!(items[0].body.as_ref().unwrap()["x"], json!(1));
        assert_eq!(items[0].headers["x-tenant"], "t1");
        assert!(items[1].body.as_ref().unwrap().is_empty());
        assert!(items[2].body.is_none());
    }

    #[test]
    fn test_unknown_method_names_the_field() {
        let errors = validate_batch(&json!({
            "requests": [
                {"path": "/a", "method": "get"},
                {"path": "/b", "method": "FETCH"},
            ]
        }))
        .unwrap_err();

        assert_eq!(
            errors.get("requests[1].method").unwrap(),
            &vec!["\"FETCH\" is not a valid choice.".to_string()]
        );
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_collects_errors_from_every_item() {
        let errors = validate_batch(&json!({
            "requests": [
                {"method": "get"},
                {"path": "", "method": "get", "body": [1]},
                "nope",
                {"path": "/d", "method": "get", "headers": {"bad header": "x", "x-num": 3}},
            ]
        }))
        .unwrap_err();

        let fields: Vec<_> = errors.keys().map(String::as_str).collect();
        assert_eq!(
            fields,
            vec![
                "requests[0].path",
                "requests[1].body",
                "requests[1].path",
                "requests[2]",
                "requests[3].headers.bad header",
                "requests[3].headers.x-num",
            ]
        );
        assert_eq!(errors["requests[0].path"], vec![REQUIRED.to_string()]);
        assert_eq!(errors["requests[1].path"], vec![NOT_BLANK.to_string()]);
    }

    #[test]
    fn test_top_level_shape() {
        let errors = validate_batch(&json!([])).unwrap_err();
        assert!(errors.contains_key("non_field_errors"));

        let errors = validate_batch(&json!({})).unwrap_err();
        assert_eq!(errors["requests"], vec![REQUIRED.to_string()]);

        let errors = validate_batch(&json!({"requests": {"path": "/a"}})).unwrap_err();
        assert_eq!(
            errors["requests"],
            vec!["Expected a list of items but got type \"object\".".to_string()]
        );

        assert!(validate_batch(&json!({"requests": []})).unwrap().is_empty());
    }
}
