//! Control requests and responses.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ControlError;

/// One control action, tagged by `action`.
///
/// ```json
/// {"action": "click", "selector": "button.save", "timeout": 2000}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ControlRequest {
    Navigate(NavigateParams),
    Click(ClickParams),
    Type(TypeParams),
    Scroll(ScrollParams),
    Inspect(InspectParams),
    ComputedStyles(StyleParams),
    Evaluate(EvaluateParams),
    WaitForElement(WaitForElementParams),
    WaitForNetworkIdle(NetworkIdleParams),
    Screenshot(ScreenshotParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateParams {
    pub url: String,
    #[serde(default = "default_true")]
    pub wait_for_load: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickParams {
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParams {
    pub selector: String,
    pub text: String,
    /// Empty the field before typing.
    #[serde(default)]
    pub clear: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    #[default]
    Auto,
    Smooth,
    Instant,
}

impl ScrollBehavior {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrollBehavior::Auto => "auto",
            ScrollBehavior::Smooth => "smooth",
            ScrollBehavior::Instant => "instant",
        }
    }
}

/// Scroll to an element, or to absolute page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default)]
    pub behavior: ScrollBehavior,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectParams {
    pub selector: String,
    /// DOM property names; a small default set when empty.
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleParams {
    pub selector: String,
    /// CSS property names; every computed property when empty.
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
    pub code: String,
    #[serde(default = "default_true")]
    pub return_by_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForElementParams {
    pub selector: String,
    /// Also require the element to be rendered.
    #[serde(default)]
    pub visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdleParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// How long the in-flight count must stay at zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_time: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotParams {
    /// Folded into the file name, e.g. `error` or `after-login`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub full_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl ControlRequest {
    /// Parse a request body. Unknown actions and bad parameters are
    /// [`ControlError::InvalidRequest`].
    pub fn from_value(value: Value) -> Result<Self, ControlError> {
        match value.get("action") {
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ControlError::InvalidRequest(
                    "'action' must be a string".to_string(),
                ));
            }
            None => {
                return Err(ControlError::InvalidRequest(
                    "missing 'action'".to_string(),
                ));
            }
        }
        serde_json::from_value(value).map_err(|e| ControlError::InvalidRequest(e.to_string()))
    }

    /// Build a request from a tool call: the tool name is the action.
    pub fn from_tool_call(name: &str, input: Value) -> Result<Self, ControlError> {
        let mut body = match input {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(ControlError::InvalidRequest(
                    "tool input must be an object".to_string(),
                ));
            }
        };
        body.insert("action".to_string(), Value::String(name.to_string()));
        Self::from_value(Value::Object(body))
    }

    pub fn action(&self) -> &'static str {
        match self {
            ControlRequest::Navigate(_) => "navigate",
            ControlRequest::Click(_) => "click",
            ControlRequest::Type(_) => "type",
            ControlRequest::Scroll(_) => "scroll",
            ControlRequest::Inspect(_) => "inspect",
            ControlRequest::ComputedStyles(_) => "computed-styles",
            ControlRequest::Evaluate(_) => "evaluate",
            ControlRequest::WaitForElement(_) => "wait-for-element",
            ControlRequest::WaitForNetworkIdle(_) => "wait-for-network-idle",
            ControlRequest::Screenshot(_) => "screenshot",
        }
    }

    /// The request's own timeout in milliseconds, if it carries one.
    pub fn timeout_ms(&self) -> Option<u64> {
        match self {
            ControlRequest::Navigate(p) => p.timeout,
            ControlRequest::Click(p) => p.timeout,
            ControlRequest::Type(p) => p.timeout,
            ControlRequest::Scroll(p) => p.timeout,
            ControlRequest::Inspect(p) => p.timeout,
            ControlRequest::ComputedStyles(p) => p.timeout,
            ControlRequest::Evaluate(p) => p.timeout,
            ControlRequest::WaitForElement(p) => p.timeout,
            ControlRequest::WaitForNetworkIdle(p) => p.timeout,
            ControlRequest::Screenshot(p) => p.timeout,
        }
    }

    /// Parameters as a JSON object, `action` included.
    pub fn params(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Outcome of one control request.
///
/// Successes serialize as `{success: true, result, timestamp}`; failures as
/// `{success: false, error, errorKind, timestamp, ...params}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub timestamp: String,
    /// Echoed request parameters, failures only.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl ControlResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            error_kind: None,
            timestamp: now(),
            params: Map::new(),
        }
    }

    pub fn failure(error: &ControlError, params: Map<String, Value>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            timestamp: now(),
            params,
        }
    }

    pub fn from_result(result: Result<Value, ControlError>, request: &ControlRequest) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self::failure(&e, request.params()),
        }
    }
}
