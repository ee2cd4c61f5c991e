//! Control actions as tool definitions for tool-calling assistants.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One control action exposed as a named tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name; also the control action.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema for the parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_schema: Option<Value>,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema: None,
        }
    }

    /// Set the parameters schema.
    pub fn with_parameters_schema(mut self, schema: Value) -> Self {
        self.parameters_schema = Some(schema);
        self
    }

    /// Convert to OpenAI function calling format.
    pub fn to_openai_function(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema.clone().unwrap_or_else(empty_object_schema)
            }
        })
    }

    /// Convert to Anthropic tool format.
    pub fn to_anthropic_tool(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters_schema.clone().unwrap_or_else(empty_object_schema)
        })
    }
}

fn empty_object_schema() -> Value {
    json!({
        "type": "object",
        "properties": {},
        "required": []
    })
}

fn timeout_property() -> Value {
    json!({
        "type": "integer",
        "minimum": 0,
        "description": "Timeout in milliseconds"
    })
}

fn selector_property(what: &str) -> Value {
    json!({
        "type": "string",
        "description": format!("CSS selector of the element to {}", what)
    })
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = properties;
    if let Some(map) = properties.as_object_mut() {
        map.insert("timeout".to_string(), timeout_property());
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

/// Every control action, in a stable order.
pub fn control_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "navigate",
            "Navigate the monitored page to a URL, optionally waiting for the load event.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "url": {"type": "string", "description": "The URL to navigate to"},
                "waitForLoad": {"type": "boolean", "default": true, "description": "Wait for the load event"}
            }),
            &["url"],
        )),
        ToolDefinition::new(
            "click",
            "Click the element matching a CSS selector, waiting for it to appear.",
        )
        .with_parameters_schema(object_schema(
            json!({"selector": selector_property("click")}),
            &["selector"],
        )),
        ToolDefinition::new("type", "Type text into the element matching a CSS selector.")
            .with_parameters_schema(object_schema(
                json!({
                    "selector": selector_property("type into"),
                    "text": {"type": "string", "description": "Text to type"},
                    "clear": {"type": "boolean", "default": false, "description": "Empty the field first"}
                }),
                &["selector", "text"],
            )),
        ToolDefinition::new(
            "scroll",
            "Scroll an element into view, or scroll the page to absolute coordinates.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "selector": selector_property("scroll to"),
                "x": {"type": "number", "description": "Horizontal page offset in CSS pixels"},
                "y": {"type": "number", "description": "Vertical page offset in CSS pixels"},
                "behavior": {"type": "string", "enum": ["auto", "smooth", "instant"], "default": "auto"}
            }),
            &[],
        )),
        ToolDefinition::new(
            "inspect",
            "Read DOM properties of the element matching a CSS selector.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "selector": selector_property("inspect"),
                "properties": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Property names, e.g. [\"value\", \"checked\"]"
                }
            }),
            &["selector"],
        )),
        ToolDefinition::new(
            "computed-styles",
            "Read computed CSS values of the element matching a CSS selector.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "selector": selector_property("read styles of"),
                "properties": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "CSS property names; all when omitted"
                }
            }),
            &["selector"],
        )),
        ToolDefinition::new(
            "evaluate",
            "Evaluate JavaScript in the page and return the result. Exceptions are reported with the engine's message.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "code": {"type": "string", "description": "JavaScript expression or statements"},
                "returnByValue": {"type": "boolean", "default": true, "description": "Serialize the result as JSON"}
            }),
            &["code"],
        )),
        ToolDefinition::new(
            "wait-for-element",
            "Wait until an element matching a CSS selector exists, and optionally is visible.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "selector": selector_property("wait for"),
                "visible": {"type": "boolean", "default": false, "description": "Also wait until rendered"}
            }),
            &["selector"],
        )),
        ToolDefinition::new(
            "wait-for-network-idle",
            "Wait until the page has had no network requests in flight for a quiet period.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "idleTime": {"type": "integer", "minimum": 0, "description": "Quiet period in milliseconds"}
            }),
            &[],
        )),
        ToolDefinition::new(
            "screenshot",
            "Capture the page and save it to the screenshot directory. Returns the file path.",
        )
        .with_parameters_schema(object_schema(
            json!({
                "context": {"type": "string", "description": "Short label folded into the file name"},
                "fullPage": {"type": "boolean", "default": false, "description": "Capture beyond the viewport"}
            }),
            &[],
        )),
    ]
}
