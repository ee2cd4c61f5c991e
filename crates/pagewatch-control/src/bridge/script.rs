//! Script evaluation.

use std::time::Duration;

use pagewatch_cdp::{ExceptionDetails, RemoteObject};
use serde_json::{Value, json};
use tracing::warn;

use crate::error::ControlError;
use crate::request::EvaluateParams;

use super::ControlBridge;
use super::wait::Deadline;

/// Time allowed for `Runtime.terminateExecution` after an evaluate timed out.
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Engine message of a `exceptionDetails` field, if the result carries one.
pub(super) fn exception_message(result: &Value) -> Option<String> {
    let details = result.get("exceptionDetails")?;
    match serde_json::from_value::<ExceptionDetails>(details.clone()) {
        Ok(details) => Some(details.message()),
        Err(_) => Some(details.to_string()),
    }
}

fn preview(code: &str) -> String {
    let line = code.trim().lines().next().unwrap_or_default();
    if line.chars().count() > 60 || code.trim().lines().count() > 1 {
        let short: String = line.chars().take(60).collect();
        format!("{}...", short)
    } else {
        line.to_string()
    }
}

impl ControlBridge {
    /// Evaluate `expression` in the page. Exceptions, syntax errors
    /// included, are [`ControlError::Execution`] with the engine's message.
    ///
    /// On timeout the running script is terminated so the page's script
    /// context is usable for the next request.
    pub(super) async fn run_script(
        &self,
        deadline: &Deadline,
        expression: &str,
        return_by_value: bool,
    ) -> Result<RemoteObject, ControlError> {
        let result = match self
            .call(
                deadline,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": return_by_value,
                    "awaitPromise": true,
                    "userGesture": true,
                }),
            )
            .await
        {
            Ok(result) => result,
            Err(ControlError::Timeout { timeout_ms, .. }) => {
                self.terminate_execution().await;
                return Err(ControlError::Timeout {
                    waiting_for: format!("script `{}`", preview(expression)),
                    timeout_ms,
                });
            }
            Err(e) => return Err(e),
        };

        if let Some(message) = exception_message(&result) {
            return Err(ControlError::Execution(message));
        }
        serde_json::from_value(result["result"].clone())
            .map_err(|e| ControlError::Execution(format!("Malformed evaluation result: {}", e)))
    }

    async fn terminate_execution(&self) {
        let call = self.session.call("Runtime.terminateExecution", None);
        match tokio::time::timeout(TERMINATE_GRACE, call).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to terminate timed-out script: {}", e),
            Err(_) => warn!("Runtime.terminateExecution did not answer"),
        }
    }

    pub(super) async fn evaluate(
        &self,
        deadline: &Deadline,
        params: &EvaluateParams,
    ) -> Result<Value, ControlError> {
        let object = self
            .run_script(deadline, &params.code, params.return_by_value)
            .await?;
        Ok(remote_value(object, params.return_by_value))
    }
}

fn remote_value(object: RemoteObject, by_value: bool) -> Value {
    if by_value {
        let value = object
            .value
            .or_else(|| object.unserializable_value.map(Value::String))
            .unwrap_or(Value::Null);
        json!({"type": object.object_type, "value": value})
    } else {
        json!({
            "type": object.object_type,
            "subtype": object.subtype,
            "className": object.class_name,
            "description": object.description,
            "objectId": object.object_id,
        })
    }
}
