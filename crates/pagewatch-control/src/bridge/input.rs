//! Mouse, keyboard and scrolling.

use pagewatch_cdp::{MouseButton, MouseEventType};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::ControlError;
use crate::request::{ClickParams, ScrollParams, TypeParams};

use super::ControlBridge;
use super::wait::Deadline;

const CLEAR_VALUE: &str = r#"function() {
    if ('value' in this) {
        this.value = '';
        this.dispatchEvent(new Event('input', { bubbles: true }));
    } else if (this.isContentEditable) {
        this.textContent = '';
    }
}"#;

const SCROLL_INTO_VIEW: &str = r#"function(behavior) {
    this.scrollIntoView({ behavior, block: 'center', inline: 'nearest' });
}"#;

impl ControlBridge {
    async fn dispatch_mouse(
        &self,
        deadline: &Deadline,
        event_type: MouseEventType,
        x: f64,
        y: f64,
    ) -> Result<(), ControlError> {
        self.call(
            deadline,
            "Input.dispatchMouseEvent",
            json!({
                "type": event_type,
                "x": x,
                "y": y,
                "button": MouseButton::Left,
                "clickCount": 1,
            }),
        )
        .await?;
        Ok(())
    }

    pub(super) async fn click(
        &self,
        deadline: &Deadline,
        params: &ClickParams,
    ) -> Result<Value, ControlError> {
        let selector = params.selector.as_str();
        let node_id = self.resolve(deadline, selector).await?;

        // Nodes without a layout box reject this; the box model check below
        // reports them.
        match self
            .call(
                deadline,
                "DOM.scrollIntoViewIfNeeded",
                json!({"nodeId": node_id}),
            )
            .await
        {
            Ok(_) | Err(ControlError::Execution(_)) => {}
            Err(e) => return Err(e),
        }

        let model = self
            .box_model(deadline, node_id)
            .await?
            .ok_or_else(|| ControlError::selector(selector, "element has no layout box"))?;
        let (x, y) = model.center();

        self.dispatch_mouse(deadline, MouseEventType::MousePressed, x, y)
            .await?;
        self.dispatch_mouse(deadline, MouseEventType::MouseReleased, x, y)
            .await?;

        debug!("Clicked {} at ({}, {})", selector, x, y);
        Ok(json!({"selector": selector, "x": x, "y": y}))
    }

    pub(super) async fn type_text(
        &self,
        deadline: &Deadline,
        params: &TypeParams,
    ) -> Result<Value, ControlError> {
        let node_id = self.resolve(deadline, &params.selector).await?;
        self.call(deadline, "DOM.focus", json!({"nodeId": node_id}))
            .await?;

        if params.clear {
            let object_id = self.resolve_object(deadline, node_id).await?;
            self.call_function_on(deadline, &object_id, CLEAR_VALUE, Vec::new())
                .await?;
        }

        self.call(deadline, "Input.insertText", json!({"text": params.text}))
            .await?;

        debug!("Typed {} chars into {}", params.text.chars().count(), params.selector);
        Ok(json!({
            "selector": params.selector,
            "typed": params.text.chars().count(),
            "cleared": params.clear,
        }))
    }

    pub(super) async fn scroll(
        &self,
        deadline: &Deadline,
        params: &ScrollParams,
    ) -> Result<Value, ControlError> {
        let behavior = params.behavior.as_str();

        if let Some(selector) = &params.selector {
            let node_id = self.resolve(deadline, selector).await?;
            let object_id = self.resolve_object(deadline, node_id).await?;
            self.call_function_on(deadline, &object_id, SCROLL_INTO_VIEW, vec![json!(behavior)])
                .await?;
            return Ok(json!({"selector": selector, "behavior": behavior}));
        }

        if params.x.is_none() && params.y.is_none() {
            return Err(ControlError::InvalidRequest(
                "scroll needs a selector or x/y coordinates".to_string(),
            ));
        }

        let coordinate = |value: Option<f64>, current: &str| {
            value.map_or_else(|| current.to_string(), |v| v.to_string())
        };
        let expression = format!(
            "window.scrollTo({{ left: {}, top: {}, behavior: '{}' }}); ({{ x: window.scrollX, y: window.scrollY }})",
            coordinate(params.x, "window.scrollX"),
            coordinate(params.y, "window.scrollY"),
            behavior
        );
        let position = self.run_script(deadline, &expression, true).await?;
        Ok(json!({
            "position": position.value.unwrap_or(Value::Null),
            "behavior": behavior,
        }))
    }
}
