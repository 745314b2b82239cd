use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub headless: bool,
    pub viewport: Option<(u32, u32)>,
    /// Profile directory; a fresh temp directory per launch when unset
    pub user_data_dir: Option<PathBuf>,
    pub start_url: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Some((1920, 1080)),
            user_data_dir: None,
            start_url: "about:blank".to_string(),
        }
    }
}

impl LaunchConfig {
    pub fn headed() -> Self {
        Self {
            headless: false,
            ..Self::default()
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some((width, height));
        self
    }

    pub fn with_user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    pub fn with_start_url(mut self, url: impl Into<String>) -> Self {
        self.start_url = url.into();
        self
    }
}
