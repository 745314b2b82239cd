use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::InsertTextParams;
use chromiumoxide::page::Page;
use serde_json::{Value, json};
use settle_core::{DriverError, ElementHandle, FrameContext};

use crate::shared::{classify, from_status, js};

/// Evaluates a page-side script and unwraps its status envelope.
pub(crate) async fn call(page: &Page, func: &str, args: &[Value], action: &str) -> Result<Value, DriverError> {
    let script = js::build_js_call(func, args);
    let result = page.evaluate(script).await
        .map_err(|e| classify(e, action))?;
    from_status(result.value().cloned().unwrap_or(Value::Null), action)
}

/// Registry-backed handle; resolves only while the node stays attached to the
/// document it was found in.
#[derive(Debug, Clone)]
pub struct ChromiumElement {
    page: Page,
    id: String,
    frame: FrameContext,
    description: String,
}

impl ChromiumElement {
    pub(crate) fn new(page: Page, id: String, frame: FrameContext, description: String) -> Self {
        Self {
            page,
            id,
            frame,
            description,
        }
    }

    pub fn frame(&self) -> FrameContext {
        self.frame
    }

    async fn run(&self, func: &str, extra: &[Value], action: &str) -> Result<Value, DriverError> {
        let mut args = vec![json!(self.id)];
        args.extend_from_slice(extra);
        call(&self.page, func, &args, &format!("{} {}", action, self.description)).await
    }

    async fn state(&self, field: &str) -> Result<bool, DriverError> {
        let state = self.run(js::element::CHECK_ELEMENT_STATE, &[], "State").await?;
        Ok(state.get(field).and_then(Value::as_bool).unwrap_or(false))
    }
}

#[async_trait]
impl ElementHandle for ChromiumElement {
    async fn click(&self) -> Result<(), DriverError> {
        self.run(js::element::SAFE_CLICK, &[], "Click").await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.run(js::element::CLEAR, &[], "Clear").await?;
        Ok(())
    }

    async fn send_keys(&self, text: &str) -> Result<(), DriverError> {
        self.run(js::element::FOCUS, &[], "Focus").await?;
        self.page.execute(InsertTextParams::new(text)).await
            .map_err(|e| classify(e, "SendKeys"))?;
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, DriverError> {
        self.state("visible").await
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        self.state("enabled").await
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        let value = self.run(js::element::EXTRACT_ATTR, &[json!(name)], "Attribute").await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn scroll_into_view(&self) -> Result<(), DriverError> {
        self.run(js::element::SCROLL_INTO_VIEW, &[json!("center")], "Scroll").await?;
        Ok(())
    }

    async fn set_value(&self, text: &str) -> Result<(), DriverError> {
        self.run(js::element::SET_VALUE, &[json!(text)], "SetValue").await?;
        Ok(())
    }

    async fn is_stale(&self) -> Result<bool, DriverError> {
        let stale = self.run(js::element::IS_STALE, &[], "IsStale").await?;
        Ok(stale.as_bool().unwrap_or(true))
    }
}
