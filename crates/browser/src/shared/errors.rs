use serde_json::Value;
use settle_core::{DriverError, FailureKind};

/// Maps a CDP or transport error to a failure kind by its message.
pub fn classify(e: impl std::fmt::Display, action: &str) -> DriverError {
    let s = e.to_string();
    if s.contains("Cannot find context") || s.contains("Execution context was destroyed") {
        DriverError::stale(format!("{} lost its document: {}", action, s))
    } else if s.contains("timeout") || s.contains("Timeout") {
        DriverError::timeout(format!("{} timed out: {}", action, s))
    } else if s.contains("navigation") || s.contains("Navigation") {
        DriverError::new(FailureKind::Navigation, format!("{} navigation failed: {}", action, s))
    } else if s.contains("not found") {
        DriverError::not_found(format!("{}: {}", action, s))
    } else {
        DriverError::browser(format!("{} failed: {}", action, s))
    }
}

/// Unwraps the `{ success, kind, error, value }` envelope every page-side
/// script returns.
pub fn from_status(result: Value, action: &str) -> Result<Value, DriverError> {
    let Value::Object(mut obj) = result else {
        return Err(DriverError::script(format!("{} returned no status", action)));
    };
    if obj.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(obj.remove("value").unwrap_or(Value::Null));
    }

    let message = obj
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let kind = match obj.get("kind").and_then(Value::as_str) {
        Some("stale") => FailureKind::StaleReference,
        Some("intercepted") => FailureKind::ClickIntercepted,
        Some("not_interactable") => FailureKind::NotInteractable,
        Some("not_found") => FailureKind::NotFound,
        Some("no_such_frame") => FailureKind::NoSuchFrame,
        _ => FailureKind::Script,
    };
    Err(DriverError::new(kind, format!("{}: {}", action, message)))
}
