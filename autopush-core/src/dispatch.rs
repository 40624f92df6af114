use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, FixedOffset, Local, TimeZone, Timelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use crate::article::Article;
use crate::binding::Binding;
use crate::error::{BroadcastError, PollError};
use crate::novelty::PushPlan;
use crate::storage::BindingStore;

/// Delivery of a text message to `platform:channelId` destinations.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(
        &self,
        destinations: &[String],
        message: &str,
    ) -> Result<(), BroadcastError>;
}

/// Writes notifications to stdout; used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn broadcast(
        &self,
        destinations: &[String],
        message: &str,
    ) -> Result<(), BroadcastError> {
        for destination in destinations {
            info!(%destination, "broadcast");
            println!("[{destination}]\n{message}\n");
        }
        Ok(())
    }
}

/// Posts `{ "destinations": [...], "message": "..." }` to a chat gateway.
#[derive(Debug, Clone)]
pub struct WebhookBroadcaster {
    client: Client,
    url: Url,
}

impl WebhookBroadcaster {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl Broadcaster for WebhookBroadcaster {
    async fn broadcast(
        &self,
        destinations: &[String],
        message: &str,
    ) -> Result<(), BroadcastError> {
        let body = json!({
            "destinations": destinations,
            "message": message,
        });
        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BroadcastError::Rejected(response.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStyle {
    /// Original/translation marker plus the publication date.
    #[default]
    Standard,
    /// Title, author and link only.
    Compact,
}

/// Time zone publication dates are rendered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    pub fn from_offset_minutes(minutes: Option<i32>) -> Self {
        let Some(minutes) = minutes else {
            return Self::Local;
        };
        match minutes.checked_mul(60).and_then(FixedOffset::east_opt) {
            Some(offset) => Self::Fixed(offset),
            None => {
                warn!(minutes, "utc offset out of range, using local time");
                Self::Local
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFormat {
    pub style: MessageStyle,
    pub zone: DisplayZone,
}

impl MessageFormat {
    pub fn new(style: MessageStyle, zone: DisplayZone) -> Self {
        Self { style, zone }
    }

    pub fn render(&self, article: &Article) -> String {
        match self.style {
            MessageStyle::Standard => {
                let kind = if article.is_translation() {
                    "翻译"
                } else {
                    "原创"
                };
                format!(
                    "新{kind}发布：\n【{}】by {}\n发布于 {}\n{}",
                    article.title,
                    article.author,
                    self.render_date(article.created_at),
                    article.url
                )
            }
            MessageStyle::Compact => format!(
                "新发布：\n【{}】by {}\n{}",
                article.title, article.author, article.url
            ),
        }
    }

    fn render_date(&self, at: DateTime<Utc>) -> String {
        match self.zone {
            DisplayZone::Local => calendar_stamp(&at.with_timezone(&Local)),
            DisplayZone::Fixed(offset) => calendar_stamp(&at.with_timezone(&offset)),
        }
    }
}

fn calendar_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String {
    format!(
        "{} 年 {} 月 {} 日 {:02}:{:02}:{:02}",
        at.year(),
        at.month(),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Pushes a plan to a binding's destination, one article at a time.
#[derive(Clone)]
pub struct Dispatcher {
    store: BindingStore,
    broadcaster: Arc<dyn Broadcaster>,
    format: MessageFormat,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(
        store: BindingStore,
        broadcaster: Arc<dyn Broadcaster>,
        format: MessageFormat,
        pacing: Duration,
    ) -> Self {
        Self {
            store,
            broadcaster,
            format,
            pacing,
        }
    }

    /// Sends every article of `plan`, oldest first, and returns what was sent.
    ///
    /// The cursor is written before each send and is not rolled back if the
    /// send fails: a failed delivery is skipped rather than retried. If the
    /// binding is rebound to another channel meanwhile, the rest of the plan
    /// is dropped.
    pub async fn dispatch(
        &self,
        binding: &Binding,
        plan: PushPlan,
    ) -> Result<Vec<Article>, PollError> {
        let destinations = [binding.address()];
        let total = plan.len();
        let mut cursor = binding.clone();
        let mut sent = Vec::with_capacity(total);

        for (position, push) in plan.pushes.into_iter().enumerate() {
            cursor.advance(&push.article, push.index);
            if !self.store.advance_cursor(cursor.clone()).await {
                info!(
                    binding = binding.id,
                    "binding moved to another channel mid-cycle; stopping"
                );
                break;
            }

            let message = self.format.render(&push.article);
            self.broadcaster.broadcast(&destinations, &message).await?;
            debug!(
                binding = binding.id,
                index = push.index,
                url = %push.article.url,
                "pushed article"
            );
            sent.push(push.article);

            if position + 1 < total {
                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(sent)
    }
}
