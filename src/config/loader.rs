use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub enumerate_ms: u64,
    pub enrich_ms: u64,
    pub window_close_ms: u64,
    pub vcs_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            enumerate_ms: 1500,
            enrich_ms: 750,
            window_close_ms: 3000,
            vcs_secs: 120,
        }
    }
}

impl TimeoutConfig {
    pub fn enumerate(&self) -> Duration {
        Duration::from_millis(self.enumerate_ms)
    }

    pub fn enrich(&self) -> Duration {
        Duration::from_millis(self.enrich_ms)
    }

    pub fn window_close(&self) -> Duration {
        Duration::from_millis(self.window_close_ms)
    }

    pub fn vcs(&self) -> Duration {
        Duration::from_secs(self.vcs_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub browser_debug_url: String,
    pub browser_processes: Vec<String>,
    pub editor_processes: Vec<String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            browser_debug_url: "http://127.0.0.1:9222".to_string(),
            browser_processes: ["chrome", "chromium", "google-chrome", "msedge", "brave"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            editor_processes: ["code", "codium", "cursor"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsConfig {
    pub enabled: bool,
    pub remote: String,
    pub commit_message: String,
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
            commit_message: "Close project snapshot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub projects_path: PathBuf,
    pub assignments_file: String,
    pub poll_interval_ms: u64,
    pub timeouts: TimeoutConfig,
    pub enrichment: EnrichmentConfig,
    pub vcs: VcsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_path: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Projects"),
            assignments_file: "top_assignments.json".to_string(),
            poll_interval_ms: 2000,
            timeouts: TimeoutConfig::default(),
            enrichment: EnrichmentConfig::default(),
            vcs: VcsConfig::default(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            let projects_path = expand_home(config.projects_path.clone());
            Ok(config.with_projects_path(projects_path))
        } else {
            Ok(Config::default())
        }
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("WINTRACK_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wintrack")
                .join("config.yaml")
        }
    }

    pub fn log_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wintrack")
            .join("logs")
    }

    pub fn with_projects_path(mut self, projects_path: PathBuf) -> Self {
        self.projects_path = projects_path;
        self
    }

    pub fn with_poll_interval(mut self, interval_ms: u64) -> Self {
        // Zero would make tokio::time::interval panic.
        self.poll_interval_ms = interval_ms.max(100);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(100))
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    if let (Ok(rest), Some(home)) = (path.strip_prefix("~"), dirs::home_dir()) {
        return home.join(rest);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_default_polls_every_two_seconds() {
        let config = Config::default();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.assignments_file, "top_assignments.json");
    }

    #[test]
    fn config_with_poll_interval_clamps_zero() {
        let config = Config::default().with_poll_interval(0);
        assert_eq!(config.poll_interval_ms, 100);
    }

    #[test]
    fn config_loads_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml = r#"
projects_path: "/srv/projects"
assignments_file: "assignments.json"
poll_interval_ms: 500
timeouts:
  enumerate_ms: 400
  enrich_ms: 200
  window_close_ms: 1000
  vcs_secs: 30
vcs:
  enabled: false
  remote: "upstream"
  commit_message: "wip"
"#;
        std::fs::write(&config_path, yaml).unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.projects_path, PathBuf::from("/srv/projects"));
        assert_eq!(config.assignments_file, "assignments.json");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.timeouts.enrich_ms, 200);
        assert!(!config.vcs.enabled);
        assert_eq!(config.vcs.remote, "upstream");
        assert!(
            config.enrichment.enabled,
            "load: omitted enrichment section should fall back to defaults"
        );
    }

    #[test]
    fn config_load_returns_default_when_file_missing() {
        let config = Config::load(Some(PathBuf::from("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert!(config.vcs.enabled);
    }

    #[test]
    fn config_expands_home_prefix() {
        let expanded = expand_home(PathBuf::from("~/Projects"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("Projects"));
        }
        assert_eq!(
            expand_home(PathBuf::from("/abs/Projects")),
            PathBuf::from("/abs/Projects")
        );
    }

    #[test]
    fn config_serializes_to_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();

        assert!(yaml.contains("poll_interval_ms: 2000"));
        assert!(yaml.contains("assignments_file: top_assignments.json"));
        assert!(yaml.contains("commit_message: Close project snapshot"));
    }
}
