#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use autopush_core::{Article, BroadcastError, Broadcaster};

pub const BRANCH: &str = "http://backrooms-wiki-cn.wikidot.com";

/// Creation time of page `n`: one hour per page after 2024-01-01.
pub fn created_at(n: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::hours(n as i64)
}

pub fn page_url(n: u32) -> String {
    format!("{BRANCH}/page-{n}")
}

pub fn article(n: u32) -> Article {
    Article {
        url: page_url(n),
        title: format!("Page {n}"),
        author: format!("author-{n}"),
        created_at: created_at(n),
        rating: 5.0,
        translation_of: None,
    }
}

/// Ten articles, `newest` first, counting down.
pub fn window(newest: u32) -> Vec<Article> {
    (0..10).map(|offset| article(newest - offset)).collect()
}

pub fn node(n: u32) -> Value {
    json!({
        "url": page_url(n),
        "wikidotInfo": {
            "title": format!("Page {n}"),
            "rating": 5,
            "tags": ["original"],
            "createdAt": created_at(n).to_rfc3339(),
            "createdBy": { "name": format!("author-{n}") }
        },
        "translationOf": null
    })
}

pub fn pages_response(nodes: Vec<Value>) -> Value {
    let edges: Vec<Value> = nodes.into_iter().map(|node| json!({ "node": node })).collect();
    json!({ "data": { "pages": { "edges": edges } } })
}

/// GraphQL response carrying a ten page window, `newest` first.
pub fn window_response(newest: u32) -> Value {
    pages_response((0..10).map(|offset| node(newest - offset)).collect())
}

pub fn error_response() -> Value {
    json!({ "data": null, "errors": [{ "message": "rate limited" }] })
}

/// Broadcaster that records every message it is asked to deliver.
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
    pub delay: Option<Duration>,
    pub fail: bool,
}

impl RecordingBroadcaster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub async fn messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sent.lock().await.len()
    }
}

#[async_trait]
impl Broadcaster for RecordingBroadcaster {
    async fn broadcast(
        &self,
        destinations: &[String],
        message: &str,
    ) -> Result<(), BroadcastError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(BroadcastError::Unreachable(destinations.join(",")));
        }
        self.sent
            .lock()
            .await
            .push((destinations.to_vec(), message.to_owned()));
        Ok(())
    }
}
