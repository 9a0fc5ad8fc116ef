use std::path::Path;

use anyhow::{Context, Result};
use im_notifier::BackendIdentity;
use serde::Deserialize;
use smart_default::SmartDefault;

/// How the focused application and conversation windows are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, SmartDefault)]
#[serde(rename_all = "lowercase")]
pub enum WindowTracking {
    /// EWMH properties on the X11 root window.
    #[default]
    X11,
    /// No window tracking: messages are never suppressed, clicks focus nothing.
    None,
}

/// Contents of `imnotify.json`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, SmartDefault)]
#[serde(default, deny_unknown_fields)]
pub struct ImnotifyConfig {
    /// Backends to watch, by name (`purple`/`pidgin`, `gajim`).
    #[default(vec!["purple".to_string(), "gajim".to_string()])]
    pub backends: Vec<String>,
    pub window_tracking: WindowTracking,
}

impl ImnotifyConfig {
    /// Resolve the configured backend names.
    pub fn backends(&self) -> Result<Vec<&'static BackendIdentity>> {
        self.backends
            .iter()
            .map(|name| BackendIdentity::by_name(name).with_context(|| format!("Invalid backend in configuration: {:?}", name)))
            .collect()
    }
}

/// Read the configuration file. A missing file means the default configuration.
pub fn read_from_file(path: &Path) -> Result<ImnotifyConfig> {
    if !path.exists() {
        log::debug!("No configuration file at {}, using defaults", path.display());
        return Ok(ImnotifyConfig::default());
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse(content: &str) -> Result<ImnotifyConfig> {
    Ok(serde_json::from_str(content)?)
}
