use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::article::{Article, WINDOW_SIZE};

/// `last_index` of a binding that has never pushed anything.
pub const SENTINEL_INDEX: usize = WINDOW_SIZE;

/// A chat destination together with the cursor of the last pushed article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub id: u32,
    pub platform: String,
    pub channel_id: String,
    pub title: String,
    pub url: String,
    pub author: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub last_index: usize,
}

impl Binding {
    pub fn seeded(id: u32, platform: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id,
            platform: platform.into(),
            channel_id: channel_id.into(),
            title: String::new(),
            url: String::new(),
            author: String::new(),
            created_at: None,
            last_index: SENTINEL_INDEX,
        }
    }

    /// Broadcast address, `platform:channelId`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.platform, self.channel_id)
    }

    pub fn never_pushed(&self) -> bool {
        self.url.is_empty() && self.created_at.is_none()
    }

    pub fn same_destination(&self, platform: &str, channel_id: &str) -> bool {
        self.platform == platform && self.channel_id == channel_id
    }

    /// Moves the cursor onto `article`, found at `index` of the current window.
    pub fn advance(&mut self, article: &Article, index: usize) {
        self.title = article.title.clone();
        self.url = article.url.clone();
        self.author = article.author.clone();
        self.created_at = Some(article.created_at);
        self.last_index = index;
    }
}
