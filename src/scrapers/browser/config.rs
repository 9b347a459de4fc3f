//! `[browser]` settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Passed to Chrome as `--proxy-server`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Seconds allowed for navigation and for `wait_for_selector`.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Selector that must appear before the DOM is read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chrome_args: Vec<String>,

    /// DevTools endpoint of an already running browser, e.g.
    /// `ws://localhost:9222`. Nothing is launched when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

fn default_headless() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            wait_for_selector: None,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}
