//! Selector resolution and element reads.

use pagewatch_cdp::{BoxModel, ComputedStyle};
use serde_json::{Map, Value, json};

use crate::error::ControlError;
use crate::request::{InspectParams, StyleParams};

use super::ControlBridge;
use super::script::exception_message;
use super::wait::{Deadline, poll_until};

/// Properties read by `inspect` when none are named.
const DEFAULT_PROPERTIES: &[&str] = &["tagName", "id", "className", "textContent"];

const READ_PROPERTIES: &str = r#"function(names) {
    const values = {};
    const errors = {};
    for (const name of names) {
        if (!(name in this)) {
            errors[name] = 'unknown property';
            continue;
        }
        const value = this[name];
        if (value === undefined) {
            values[name] = null;
        } else if (value === null || ['string', 'number', 'boolean'].includes(typeof value)) {
            values[name] = value;
        } else {
            values[name] = String(value);
        }
    }
    return { values, errors };
}"#;

const NOT_FOUND: &str = "no element matches selector";

impl ControlBridge {
    /// One lookup of `selector` in the live document.
    pub(super) async fn query(
        &self,
        deadline: &Deadline,
        selector: &str,
    ) -> Result<Option<i64>, ControlError> {
        let doc = self
            .call(deadline, "DOM.getDocument", json!({"depth": 0}))
            .await?;
        let root = doc["root"]["nodeId"].as_i64().ok_or_else(|| {
            ControlError::Execution("DOM.getDocument returned no root node".to_string())
        })?;

        let result = match self
            .call(
                deadline,
                "DOM.querySelector",
                json!({"nodeId": root, "selector": selector}),
            )
            .await
        {
            Ok(result) => result,
            Err(ControlError::Execution(message)) => {
                return Err(ControlError::selector(
                    selector,
                    format!("invalid selector: {}", message),
                ));
            }
            Err(e) => return Err(e),
        };

        let node_id = result["nodeId"].as_i64().unwrap_or(0);
        Ok((node_id != 0).then_some(node_id))
    }

    /// Poll until `selector` matches. Running out of time is a selector error.
    pub(super) async fn resolve(
        &self,
        deadline: &Deadline,
        selector: &str,
    ) -> Result<i64, ControlError> {
        poll_until(*deadline, self.config.poll_interval, || {
            self.query(deadline, selector)
        })
        .await?
        .ok_or_else(|| {
            ControlError::selector(
                selector,
                format!("{} within {}ms", NOT_FOUND, deadline.budget_ms()),
            )
        })
    }

    /// `None` when the node has no layout box.
    pub(super) async fn box_model(
        &self,
        deadline: &Deadline,
        node_id: i64,
    ) -> Result<Option<BoxModel>, ControlError> {
        match self
            .call(deadline, "DOM.getBoxModel", json!({"nodeId": node_id}))
            .await
        {
            Ok(result) => serde_json::from_value(result["model"].clone())
                .map(Some)
                .map_err(|e| ControlError::Execution(format!("Malformed box model: {}", e))),
            Err(ControlError::Execution(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(super) async fn computed_style(
        &self,
        deadline: &Deadline,
        node_id: i64,
    ) -> Result<Vec<ComputedStyle>, ControlError> {
        let result = self
            .call(
                deadline,
                "CSS.getComputedStyleForNode",
                json!({"nodeId": node_id}),
            )
            .await?;
        serde_json::from_value(result["computedStyle"].clone())
            .map_err(|e| ControlError::Execution(format!("Malformed computed style: {}", e)))
    }

    /// Rendered: has a non-empty box and is not hidden by style.
    pub(super) async fn is_visible(
        &self,
        deadline: &Deadline,
        node_id: i64,
    ) -> Result<bool, ControlError> {
        let Some(model) = self.box_model(deadline, node_id).await? else {
            return Ok(false);
        };
        if model.width <= 0 || model.height <= 0 {
            return Ok(false);
        }
        let styles = self.computed_style(deadline, node_id).await?;
        let hidden = styles.iter().any(|s| {
            matches!(
                (s.name.as_str(), s.value.as_str()),
                ("display", "none") | ("visibility", "hidden" | "collapse") | ("opacity", "0")
            )
        });
        Ok(!hidden)
    }

    /// Script object id of a DOM node.
    pub(super) async fn resolve_object(
        &self,
        deadline: &Deadline,
        node_id: i64,
    ) -> Result<String, ControlError> {
        let result = self
            .call(deadline, "DOM.resolveNode", json!({"nodeId": node_id}))
            .await?;
        result["object"]["objectId"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ControlError::Execution("Node could not be resolved to a script object".to_string())
            })
    }

    /// Call `function` with the element as `this`; returns the value.
    pub(super) async fn call_function_on(
        &self,
        deadline: &Deadline,
        object_id: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, ControlError> {
        let arguments: Vec<Value> = args.into_iter().map(|v| json!({"value": v})).collect();
        let result = self
            .call(
                deadline,
                "Runtime.callFunctionOn",
                json!({
                    "objectId": object_id,
                    "functionDeclaration": function,
                    "arguments": arguments,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(message) = exception_message(&result) {
            return Err(ControlError::Execution(message));
        }
        Ok(result["result"]["value"].clone())
    }

    pub(super) async fn inspect(
        &self,
        deadline: &Deadline,
        params: &InspectParams,
    ) -> Result<Value, ControlError> {
        let properties: Vec<String> = if params.properties.is_empty() {
            DEFAULT_PROPERTIES.iter().map(|p| p.to_string()).collect()
        } else {
            params.properties.clone()
        };

        let Some(node_id) = self.query(deadline, &params.selector).await? else {
            return Ok(not_found(&params.selector, &properties));
        };
        let object_id = self.resolve_object(deadline, node_id).await?;
        let read = self
            .call_function_on(deadline, &object_id, READ_PROPERTIES, vec![json!(properties)])
            .await?;

        Ok(json!({
            "selector": params.selector,
            "found": true,
            "properties": read.get("values").cloned().unwrap_or_else(|| json!({})),
            "errors": read.get("errors").cloned().unwrap_or_else(|| json!({})),
        }))
    }

    pub(super) async fn computed_styles(
        &self,
        deadline: &Deadline,
        params: &StyleParams,
    ) -> Result<Value, ControlError> {
        let Some(node_id) = self.query(deadline, &params.selector).await? else {
            return Ok(not_found(&params.selector, &params.properties));
        };
        let styles = self.computed_style(deadline, node_id).await?;

        let mut values = Map::new();
        let mut errors = Map::new();
        if params.properties.is_empty() {
            for style in styles {
                values.insert(style.name, Value::String(style.value));
            }
        } else {
            for name in &params.properties {
                match styles.iter().find(|s| &s.name == name) {
                    Some(style) => {
                        values.insert(name.clone(), Value::String(style.value.clone()));
                    }
                    None => {
                        errors.insert(name.clone(), json!("unknown style property"));
                    }
                }
            }
        }

        Ok(json!({
            "selector": params.selector,
            "found": true,
            "properties": values,
            "errors": errors,
        }))
    }
}

/// Per-property report for a selector that matched nothing.
fn not_found(selector: &str, properties: &[String]) -> Value {
    let errors: Map<String, Value> = properties
        .iter()
        .map(|p| (p.clone(), json!(NOT_FOUND)))
        .collect();
    json!({
        "selector": selector,
        "found": false,
        "properties": {},
        "errors": errors,
    })
}
