use serde::Deserialize;

/// Tool-calling behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Send tool definitions to the server at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Allow the model to request several tool calls in one turn
    #[serde(default)]
    pub parallel: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parallel: false,
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}
