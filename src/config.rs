//! Runtime configuration.
//!
//! Options are loaded once at startup from an optional YAML file plus a
//! small set of environment variables, and are immutable afterwards. Every
//! component receives the configuration it needs explicitly; nothing
//! re-reads the environment at request time.
//!
//! ## Environment variables
//!
//! - `HOST` / `PORT` — override the bind address from the config file.
//! - `TRELLIS_STACK_SIZE` — stack size for request coroutines, decimal or
//!   `0x`-prefixed hex. Default: `0x4000` (16 KB).

use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Top-level runtime options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Development mode: bypass the component cache and enable the dev
    /// middleware hook instead of built-in static serving.
    pub dev: bool,
    pub dir: DirConfig,
    pub server: ServerConfig,
    pub globals: Globals,
}

/// Directory layout of the build output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirConfig {
    /// Project root everything else is resolved against.
    pub root: PathBuf,
    /// Build output directory under the root.
    pub dist: String,
    /// Static asset directory under dist.
    #[serde(rename = "static")]
    pub static_dir: String,
    /// Manifest file name under dist.
    pub manifest: String,
    /// Compiled server page modules directory under dist.
    pub views: String,
}

/// HTTP server options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// URL prefix clients fetch assets from. When this is an absolute
    /// `http(s)` URL (a CDN), the built-in static middleware is disabled.
    pub public_path: String,
}

/// Values threaded into every rendered document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Globals {
    /// DOM id of the client mount element.
    pub mount_id: String,
    /// JS expression assigned the serialized page props.
    pub state_var: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dev: false,
            dir: DirConfig::default(),
            server: ServerConfig::default(),
            globals: Globals::default(),
        }
    }
}

impl Default for DirConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            dist: "dist".to_string(),
            static_dir: "static".to_string(),
            manifest: "manifest.json".to_string(),
            views: "server/views".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7002,
            public_path: "/".to_string(),
        }
    }
}

impl Default for Globals {
    fn default() -> Self {
        Self {
            mount_id: "app-main".to_string(),
            state_var: "window.__INITIAL_STATE__".to_string(),
        }
    }
}

impl Config {
    /// Parse a YAML config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load the given file, or fall back to defaults when it is absent.
    #[must_use]
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(p) => match Self::from_file(p) {
                Ok(c) => return c,
                Err(err) => {
                    warn!(path = %p.display(), error = %err, "config file unusable, using defaults");
                    Config::default()
                }
            },
            None => Config::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("HOST") {
            if !host.is_empty() {
                self.server.host = host;
            }
        }
        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    /// `<root>/<dist>`
    #[must_use]
    pub fn dist_root(&self) -> PathBuf {
        self.dir.root.join(&self.dir.dist)
    }

    /// Path of the build manifest file.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dist_root().join(&self.dir.manifest)
    }

    /// Directory holding compiled page modules.
    #[must_use]
    pub fn views_dir(&self) -> PathBuf {
        self.dist_root().join(&self.dir.views)
    }

    /// Directory holding built client assets.
    #[must_use]
    pub fn static_root(&self) -> PathBuf {
        self.dist_root().join(&self.dir.static_dir)
    }

    /// URL prefix the static middleware is mounted at, e.g. `/static`.
    #[must_use]
    pub fn static_mount(&self) -> String {
        let base = self.server.public_path.trim_end_matches('/');
        format!("{}/{}", base, self.dir.static_dir)
    }

    /// `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Stack size for request coroutines, from `TRELLIS_STACK_SIZE`.
///
/// Accepts decimal (`16384`) or hex (`0x4000`). Default 16 KB.
#[must_use]
pub fn coroutine_stack_size() -> usize {
    match env::var("TRELLIS_STACK_SIZE") {
        Ok(val) => {
            if let Some(hex) = val.strip_prefix("0x") {
                usize::from_str_radix(hex, 16).unwrap_or(0x4000)
            } else {
                val.parse().unwrap_or(0x4000)
            }
        }
        Err(_) => 0x4000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let config = Config::default();
        assert_eq!(config.manifest_path(), PathBuf::from("./dist/manifest.json"));
        assert_eq!(config.views_dir(), PathBuf::from("./dist/server/views"));
        assert_eq!(config.static_mount(), "/static");
        assert_eq!(config.bind_addr(), "localhost:7002");
        assert!(!config.dev);
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r#"
dev: true
server:
  port: 3000
dir:
  static: assets
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.dev);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.dir.static_dir, "assets");
        assert_eq!(config.dir.manifest, "manifest.json");
    }

    #[test]
    fn public_path_prefixes_static_mount() {
        let mut config = Config::default();
        config.server.public_path = "/app/".to_string();
        assert_eq!(config.static_mount(), "/app/static");
    }
}
