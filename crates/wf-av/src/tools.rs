//! External tool detection.
//!
//! The [`ToolRegistry`] discovers and caches the locations of ffmpeg and
//! ffprobe and provides lookup methods for the rest of the crate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wf_core::config::ToolsConfig;

use crate::command::ToolCommand;

/// Known tool names that the registry manages.
const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// How long `-version` may take before the tool is reported as broken.
const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tool name (e.g. "ffmpeg").
    pub name: String,
    /// Resolved path to the executable.
    pub path: PathBuf,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, if the tool ran.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools by searching `PATH`, preferring configured overrides.
    ///
    /// A configured path is used only if it exists; otherwise [`which::which`]
    /// is consulted. Tools that are not found are omitted.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let mut registry = Self::default();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = match custom_path {
                Some(p) if p.exists() => Some(p.to_path_buf()),
                Some(p) => {
                    tracing::warn!(tool = name, "Configured path {} does not exist; searching PATH", p.display());
                    which::which(name).ok()
                }
                None => which::which(name).ok(),
            };

            match resolved {
                Some(path) => {
                    tracing::debug!(tool = name, "Found at {}", path.display());
                    registry.insert(name, path);
                }
                None => tracing::debug!(tool = name, "Not found"),
            }
        }

        registry
    }

    /// Register a tool at an explicit path.
    pub fn insert(&mut self, name: &str, path: PathBuf) {
        self.tools.insert(
            name.to_string(),
            ToolConfig {
                name: name.to_string(),
                path,
            },
        );
    }

    /// Look up a tool, or fail with [`wf_core::Error::Tool`] if it was not
    /// found during discovery.
    pub fn require(&self, name: &str) -> wf_core::Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            wf_core::Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Path of ffmpeg.
    pub fn ffmpeg(&self) -> wf_core::Result<&Path> {
        self.require("ffmpeg").map(|t| t.path.as_path())
    }

    /// Path of ffprobe.
    pub fn ffprobe(&self) -> wf_core::Result<&Path> {
        self.require("ffprobe").map(|t| t.path.as_path())
    }

    /// Check all known tools and return availability information.
    pub async fn check_all(&self) -> Vec<ToolInfo> {
        let mut infos = Vec::with_capacity(KNOWN_TOOLS.len());
        for &name in KNOWN_TOOLS {
            let info = match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path).await,
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            };
            infos.push(info);
        }
        infos
    }
}

/// Run `<tool> -version` and return the first line of stdout.
async fn detect_version(path: &Path) -> Option<String> {
    let output = ToolCommand::new(path.to_path_buf())
        .arg("-version")
        .timeout(VERSION_TIMEOUT)
        .execute()
        .await
        .ok()?;

    output.stdout.lines().next().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_with_default_config() {
        let registry = ToolRegistry::discover(&ToolsConfig::default());
        // Tools may be absent in CI; the call itself must not panic.
        let infos = registry.check_all().await;
        assert_eq!(infos.len(), KNOWN_TOOLS.len());
    }

    #[test]
    fn require_missing_tool_returns_error() {
        let registry = ToolRegistry::default();
        let err = registry.require("ffmpeg").unwrap_err();
        assert!(err.to_string().contains("ffmpeg not found"));
        assert!(registry.ffprobe().is_err());
    }

    #[test]
    fn configured_path_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("my-ffmpeg");
        std::fs::write(&fake, b"").unwrap();

        let cfg = ToolsConfig {
            ffmpeg_path: Some(fake.clone()),
            ffprobe_path: None,
        };
        let registry = ToolRegistry::discover(&cfg);
        assert_eq!(registry.ffmpeg().unwrap(), fake.as_path());
    }

    #[tokio::test]
    async fn unavailable_tools_reported() {
        let infos = ToolRegistry::default().check_all().await;
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["ffmpeg", "ffprobe"]);
        assert!(infos.iter().all(|i| !i.available && i.path.is_none()));
    }
}
