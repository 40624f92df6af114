use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::dispatch::{DisplayZone, MessageStyle};
use crate::error::ConfigError;
use crate::novelty::MatchPolicy;
use crate::poller::PollConfig;

const APP_DIR: &str = "autopush";

/// Newest pages first, restricted to one branch and to public, non-deleted
/// content rated -2 or better.
pub const PAGES_PUSH_QUERY: &str = r#"
query pagesPushQueryString($baseUrl: String) {
  pages(
    sort: {order: DESC, key: CREATED_AT}
    filter: {url: {startsWith: $baseUrl}, wikidotInfo: {_and: [{category: {neq: "deleted"}, rating: {gte: -2}, isPrivate: false}, {category: {neq: "reserve"}}, {category: {neq: "fragment"}}]}}
  ) {
    edges {
      node {
        url
        wikidotInfo {
          title
          rating
          tags
          createdAt
          createdBy {
            name
          }
        }
        translationOf {
          url
          wikidotInfo {
            createdBy {
              name
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub poll: PollSettings,
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Tried in order; later entries only serve as failover.
    pub endpoints: Vec<Url>,
    pub query: String,
    pub branch: String,
    /// Branch name -> URL prefix. An empty prefix matches every branch.
    pub branches: BTreeMap<String, String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_seconds: u64,
    pub pacing_seconds: u64,
    pub policy: MatchPolicy,
    pub style: MessageStyle,
    /// Offset used when rendering publication dates; the host time zone when unset.
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BroadcastConfig {
    pub webhook_url: Option<Url>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        let endpoints = [
            "https://api.crom.avn.sh/graphql",
            "https://zh.xjo.ch/crom/graphql",
        ]
        .iter()
        .filter_map(|raw| Url::parse(raw).ok())
        .collect();

        Self {
            endpoints,
            query: PAGES_PUSH_QUERY.to_owned(),
            branch: "cn".to_owned(),
            branches: default_branches(),
            request_timeout_seconds: 30,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            // Same cadence as a `*/5 * * * *` cron entry
            interval_seconds: 300,
            pacing_seconds: 3,
            policy: MatchPolicy::default(),
            style: MessageStyle::default(),
            utc_offset_minutes: None,
        }
    }
}

fn default_branches() -> BTreeMap<String, String> {
    [
        ("cn", "http://backrooms-wiki-cn.wikidot.com"),
        ("en", "http://backrooms-wiki.wikidot.com"),
        ("es", "http://es-backrooms-wiki.wikidot.com"),
        ("fr", "http://fr-backrooms-wiki.wikidot.com"),
        ("jp", "http://japan-backrooms-wiki.wikidot.com"),
        ("pl", "http://pl-backrooms-wiki.wikidot.com"),
        ("ptbr", "http://pt-br-backrooms-wiki.wikidot.com"),
        ("ru", "http://ru-backrooms-wiki.wikidot.com"),
        ("vn", "http://backrooms-vn.wikidot.com"),
        ("all", ""),
    ]
    .into_iter()
    .map(|(name, url)| (name.to_owned(), url.to_owned()))
    .collect()
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// URL prefix of the configured branch.
    pub fn base_url(&self) -> Result<&str, ConfigError> {
        self.branches
            .get(&self.branch)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::UnknownBranch(self.branch.clone()))
    }
}

impl AppConfig {
    /// Directory holding the configuration and the binding store.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR))
    }

    /// Loads `config.json` from `dir`, falling back to (and writing out) defaults.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("config.json");
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(
                    error = %err,
                    path = %path.display(),
                    "unable to load configuration, using defaults"
                );
                let default_config = Self::default();
                if let Err(save_err) = default_config.save_to(&path) {
                    warn!(error = %save_err, "unable to write default configuration");
                }
                default_config
            }
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_content = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let config_json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, config_json)?;
        Ok(())
    }

    pub fn poll_config(&self) -> Result<PollConfig, ConfigError> {
        Ok(PollConfig {
            interval: Duration::from_secs(self.poll.interval_seconds.max(1)),
            pacing: Duration::from_secs(self.poll.pacing_seconds),
            policy: self.poll.policy,
            style: self.poll.style,
            zone: DisplayZone::from_offset_minutes(self.poll.utc_offset_minutes),
            base_url: self.upstream.base_url()?.to_owned(),
        })
    }
}
