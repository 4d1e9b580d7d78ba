use serde::Deserialize;

/// Token limits of the target model
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Combined input + output budget the model can process
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: u32,
    /// Desired ceiling for generated tokens
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl LimitsConfig {
    /// Tokens left for input once the output reservation is taken
    pub const fn max_input_tokens(&self) -> u32 {
        self.max_context_tokens.saturating_sub(self.max_output_tokens)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

const fn default_max_context_tokens() -> u32 {
    32_768
}

const fn default_max_output_tokens() -> u32 {
    4_096
}
