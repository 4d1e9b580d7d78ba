use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

/// Connection settings for the OpenAI-compatible inference server
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL, without the `/v1` suffix
    #[serde(default = "default_url")]
    pub url: Url,
    /// Static credential attached to every request
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Upper bound for a single HTTP attempt, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerConfig {
    /// The configured credential, ignoring blank values
    ///
    /// Blank keys are common when the key comes from an unset
    /// `{{ env.VAR | default("") }}` placeholder.
    pub fn credential(&self) -> Option<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|key| !key.expose_secret().trim().is_empty())
    }

    /// Per-attempt timeout as a `Duration`
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build an endpoint URL below the server's base path
    ///
    /// `path` is appended to whatever path the base URL already carries, so
    /// servers mounted under a prefix keep working.
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.url.clone();
        let base = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{base}/{}", path.trim_start_matches('/')));
        url
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            api_key: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[allow(clippy::missing_panics_doc)]
fn default_url() -> Url {
    Url::parse("http://localhost:8000").expect("valid default URL")
}

const fn default_request_timeout_ms() -> u64 {
    60_000
}
