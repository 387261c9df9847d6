//! Wire types for agent action invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version written into every response envelope.
pub const MESSAGE_VERSION: &str = "1.0";

/// A flat `{name, type, value}` entry, used for both query parameters and body
/// properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            value: value.into(),
        }
    }

    /// Text form of the value: strings as-is, null as empty, anything else as JSON.
    pub fn value_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Properties declared under one content type of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub properties: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Keyed by content type, in the order the caller sent them.
    #[serde(default)]
    pub content: Map<String, Value>,
}

/// Inbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInvocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    #[serde(default = "empty_object")]
    pub session_attributes: Value,
    #[serde(default = "empty_object")]
    pub prompt_session_attributes: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Body of the inner response, keyed by its content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: BTreeMap<String, ResponseBody>,
    pub session_attributes: Value,
    pub prompt_session_attributes: Value,
}

/// Outbound envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponseEnvelope {
    pub message_version: String,
    pub response: ActionResponse,
}

impl ActionResponseEnvelope {
    /// Wrap an inner response, echoing the identifying fields of `invocation`.
    pub fn wrap(invocation: &ActionInvocation, status: u16, content_type: &str, body: String) -> Self {
        let mut response_body = BTreeMap::new();
        response_body.insert(content_type.to_string(), ResponseBody { body });

        Self {
            message_version: MESSAGE_VERSION.to_string(),
            response: ActionResponse {
                action_group: invocation.action_group.clone(),
                api_path: invocation.api_path.clone(),
                http_method: invocation.http_method.clone(),
                http_status_code: status,
                response_body,
                session_attributes: invocation.session_attributes.clone(),
                prompt_session_attributes: invocation.prompt_session_attributes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_full_invocation() {
        let invocation: ActionInvocation = serde_json::from_value(json!({
            "messageVersion": "1.0",
            "agent": {"name": "s3-agent", "id": "AGENT1", "alias": "TSTALIASID", "version": "DRAFT"},
            "inputText": "how many objects are in my-bucket?",
            "sessionId": "123456789012345",
            "actionGroup": "s3-actions",
            "apiPath": "/s3_object_count",
            "httpMethod": "GET",
            "parameters": [{"name": "bucket_name", "type": "string", "value": "my-bucket"}],
            "sessionAttributes": {"user": "alice"},
            "promptSessionAttributes": {}
        }))
        .unwrap();

        assert_eq!(invocation.action_group, "s3-actions");
        assert_eq!(invocation.parameters[0].kind.as_deref(), Some("string"));
        assert_eq!(invocation.parameters[0].value_text(), "my-bucket");
        assert!(invocation.request_body.is_none());
        assert_eq!(invocation.session_attributes, json!({"user": "alice"}));
    }

    #[test]
    fn missing_attributes_default_to_empty_objects() {
        let invocation: ActionInvocation = serde_json::from_value(json!({
            "actionGroup": "g",
            "apiPath": "/",
            "httpMethod": "GET"
        }))
        .unwrap();

        assert!(invocation.parameters.is_empty());
        assert_eq!(invocation.session_attributes, json!({}));
        assert_eq!(invocation.prompt_session_attributes, json!({}));
    }

    #[test]
    fn response_envelope_uses_wire_field_names() {
        let invocation: ActionInvocation = serde_json::from_value(json!({
            "actionGroup": "g",
            "apiPath": "/s3_bucket_count",
            "httpMethod": "GET",
            "sessionAttributes": {"a": "1"},
            "promptSessionAttributes": {"b": "2"}
        }))
        .unwrap();

        let envelope =
            ActionResponseEnvelope::wrap(&invocation, 200, "application/json", r#"{"count":3}"#.to_string());

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "messageVersion": "1.0",
                "response": {
                    "actionGroup": "g",
                    "apiPath": "/s3_bucket_count",
                    "httpMethod": "GET",
                    "httpStatusCode": 200,
                    "responseBody": {"application/json": {"body": "{\"count\":3}"}},
                    "sessionAttributes": {"a": "1"},
                    "promptSessionAttributes": {"b": "2"}
                }
            })
        );
    }
}
