//! Command-line and environment configuration.

use clap::Parser;
use jumbotron_core::DisplayIdentity;
use url::Url;

/// Server used when none is configured.
pub const DEFAULT_SERVER: &str = "ws://localhost:8080/display";

/// Name used when none is configured and the server URL has no path.
const FALLBACK_NAME: &str = "display";

/// Display client configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "jumbotron", about = "Show a window onto a shared image")]
#[command(version)]
pub struct DisplayConfig {
    /// WebSocket URL of the coordinating server
    #[arg(long, env = "JUMBOTRON_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Display name (defaults to the last path segment of the server URL)
    #[arg(long, env = "JUMBOTRON_NAME")]
    pub name: Option<String>,

    /// Display identity (defaults to a random UUID)
    #[arg(long, env = "JUMBOTRON_ID")]
    pub id: Option<String>,

    /// Base URL for relative image references (defaults to the server's HTTP origin)
    #[arg(long)]
    pub image_base: Option<String>,

    /// Initial window width
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Window title
    #[arg(long, default_value = "Jumbotron")]
    pub title: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            name: None,
            id: None,
            image_base: None,
            width: 1280,
            height: 800,
            title: "Jumbotron".to_string(),
        }
    }
}

impl DisplayConfig {
    /// Display name, falling back to the last path segment of the server URL.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        Url::parse(&self.server)
            .ok()
            .and_then(|url| {
                url.path_segments()?
                    .filter(|s| !s.is_empty())
                    .last()
                    .map(str::to_string)
            })
            .unwrap_or_else(|| FALLBACK_NAME.to_string())
    }

    /// Identity to announce on connect. Generates a fresh id when none is set.
    pub fn identity(&self) -> DisplayIdentity {
        let id = match self.id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        DisplayIdentity {
            id,
            name: self.display_name(),
        }
    }

    /// Base for relative image references.
    pub fn image_base(&self) -> Option<Url> {
        if let Some(base) = &self.image_base {
            return match Url::parse(base) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::warn!("Ignoring invalid image base '{}': {}", base, e);
                    None
                }
            };
        }

        let mut url = Url::parse(&self.server).ok()?;
        let scheme = match url.scheme() {
            "ws" => "http",
            "wss" => "https",
            _ => return None,
        };
        url.set_scheme(scheme).ok()?;
        Some(url)
    }
}
