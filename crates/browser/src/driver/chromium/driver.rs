use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::{Value, json};
use settle_core::{
    Driver, DriverError, FrameContext, FrameHandle, Locator, NetworkEventStream,
};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::element::{ChromiumElement, call};
use super::network;
use crate::shared::{LaunchConfig, classify, js};

/// One Chromium tab driven over the DevTools protocol.
///
/// Frame switching is tracked on this side: locators are resolved inside the
/// document of the selected same-origin frame.
pub struct ChromiumDriver {
    page: Page,
    frame: Mutex<FrameContext>,
    browser: tokio::sync::Mutex<Option<Browser>>,
    handler: Option<JoinHandle<()>>,
}

impl ChromiumDriver {
    pub async fn launch(config: LaunchConfig) -> Result<Self, DriverError> {
        let user_data_dir = match config.user_data_dir {
            Some(dir) => dir,
            None => std::env::temp_dir().join(format!("chromium-{}", uuid::Uuid::new_v4())),
        };
        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| DriverError::browser(format!("Failed to create profile dir: {}", e)))?;

        let mut builder = ChromeConfig::builder()
            .headless_mode(if config.headless { HeadlessMode::True } else { HeadlessMode::False })
            .user_data_dir(&user_data_dir);
        if let Some((w, h)) = config.viewport {
            builder = builder.window_size(w, h);
        }
        let chrome_cfg = builder.build()
            .map_err(|e| DriverError::browser(format!("Config failed: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_cfg).await
            .map_err(|e| classify(e, "Launch"))?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser.new_page(config.start_url.as_str()).await
            .map_err(|e| classify(e, "NewPage"))?;
        info!(headless = config.headless, profile = %user_data_dir.display(), "chromium launched");

        Ok(Self {
            page,
            frame: Mutex::new(FrameContext::Root),
            browser: tokio::sync::Mutex::new(Some(browser)),
            handler: Some(handler),
        })
    }

    /// Drives an already open page; the browser stays owned by the caller.
    pub fn new(page: Page) -> Self {
        Self {
            page,
            frame: Mutex::new(FrameContext::Root),
            browser: tokio::sync::Mutex::new(None),
            handler: None,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> Result<(), DriverError> {
        self.page.goto(url).await
            .map_err(|e| classify(e, "Goto"))?;
        self.set_frame(FrameContext::Root);
        debug!(url, "navigated");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), DriverError> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            browser.close().await
                .map_err(|e| classify(e, "Close"))?;
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "browser process did not exit cleanly");
            }
        }
        Ok(())
    }

    fn set_frame(&self, context: FrameContext) {
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) = context;
    }

    async fn find(&self, locator: &Locator, all: bool) -> Result<Vec<ChromiumElement>, DriverError> {
        let frame = self.frame_context();
        let args = [frame_arg(frame), json!(locator.strategy()), json!(locator.value()), json!(all)];
        let found = call(&self.page, js::element::LOCATE, &args, &format!("Locate {}", locator)).await?;

        let ids = found.as_array().cloned().unwrap_or_default();
        Ok(ids
            .into_iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .map(|id| ChromiumElement::new(self.page.clone(), id, frame, locator.to_string()))
            .collect())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

fn frame_arg(frame: FrameContext) -> Value {
    match frame {
        FrameContext::Root => Value::Null,
        FrameContext::Frame(FrameHandle(index)) => json!(index),
    }
}

#[async_trait]
impl Driver for ChromiumDriver {
    type Element = ChromiumElement;

    async fn locate(&self, locator: &Locator) -> Result<ChromiumElement, DriverError> {
        self.find(locator, false).await?
            .into_iter()
            .next()
            .ok_or_else(|| DriverError::not_found(format!("{} matched nothing", locator)))
    }

    async fn locate_all(&self, locator: &Locator) -> Result<Vec<ChromiumElement>, DriverError> {
        self.find(locator, true).await
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>, DriverError> {
        let count = call(&self.page, js::frame::COUNT_FRAMES, &[], "CountFrames").await?;
        let count = count.as_u64().unwrap_or(0) as usize;
        Ok((0..count).map(FrameHandle).collect())
    }

    async fn switch_to_frame(&self, frame: FrameHandle) -> Result<(), DriverError> {
        call(&self.page, js::frame::ENTER_FRAME, &[json!(frame.0)], "SwitchToFrame").await?;
        self.set_frame(FrameContext::Frame(frame));
        debug!(frame = frame.0, "switched into frame");
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), DriverError> {
        self.set_frame(FrameContext::Root);
        Ok(())
    }

    fn frame_context(&self) -> FrameContext {
        *self.frame.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn execute_script(&self, script: &str) -> Result<Value, DriverError> {
        let result = self.page.evaluate(script).await
            .map_err(|e| classify(e, "ExecuteScript"))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn network_events(&self) -> Result<Option<NetworkEventStream>, DriverError> {
        network::subscribe(&self.page).await.map(Some)
    }
}
