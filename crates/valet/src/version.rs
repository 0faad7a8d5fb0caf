//! Version information for valet.

/// Valet version from Cargo.toml
pub const VALET_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version information reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct VersionInfo {
    /// Engine library version.
    pub valet: &'static str,
    /// Version of the front end hosting the engine, if it differs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            valet: VALET_VERSION,
            server: None,
        }
    }
}

impl VersionInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server(mut self, version: String) -> Self {
        self.server = Some(version);
        self
    }
}
