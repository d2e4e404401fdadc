//! Version information for relay.

/// Relay version from Cargo.toml
pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the health check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VersionInfo {
    /// Relay library version.
    pub relay: &'static str,
    /// Version of the embedding application (if set).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            relay: RELAY_VERSION,
            app: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app(mut self, version: impl Into<String>) -> Self {
        self.app = Some(version.into());
        self
    }
}
