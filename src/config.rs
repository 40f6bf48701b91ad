use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::stats::Queue;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub ui_bind: String,
    pub static_dir: String,
    pub client_process_names: Vec<String>,
    pub lockfile_path: Option<String>,
    pub discovery_poll_ms: u64,
    pub restart_delay_secs: u64,
    pub stats_endpoint: String,
    pub cdragon_base: String,
    pub default_queue: Queue,
    pub import_title_prefix: String,
    pub http_timeout_secs: u64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            ui_bind: "0.0.0.0:4246".to_owned(),
            static_dir: "web/dist".to_owned(),
            client_process_names: vec![
                "LeagueClientUx.exe".to_owned(),
                "LeagueClient.exe".to_owned(),
                "LeagueClientUx".to_owned(),
            ],
            lockfile_path: None,
            discovery_poll_ms: 2_000,
            restart_delay_secs: 10,
            stats_endpoint: "https://league-champion-aggregate.iesdev.com/graphql".to_owned(),
            cdragon_base: "https://raw.communitydragon.org/latest".to_owned(),
            default_queue: Queue::RankedSolo,
            import_title_prefix: "[GTools]".to_owned(),
            http_timeout_secs: 15,
        }
    }
}

impl CompanionConfig {
    /// Loads the config at `path`, or at the OS config dir when `path` is
    /// `None`. A missing file is created with defaults.
    pub fn load_or_create(path: Option<&Path>) -> Result<(Self, PathBuf)> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let config_dir = dirs::config_dir()
                    .context("unable to locate OS config directory")?
                    .join("gtools-companion");
                fs::create_dir_all(&config_dir).with_context(|| {
                    format!("failed creating config dir at {}", config_dir.display())
                })?;
                config_dir.join("config.json")
            }
        };

        if !config_path.exists() {
            let default = Self::default();
            default.save(&config_path)?;
            return Ok((default, config_path));
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed reading {}", config_path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", config_path.display()))?;
        Ok((config, config_path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    pub fn discovery_poll_ms(&self) -> u64 {
        self.discovery_poll_ms.clamp(250, 60_000)
    }
}
