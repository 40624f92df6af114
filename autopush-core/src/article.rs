use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of articles the upstream returns per page, newest first.
pub const WINDOW_SIZE: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub rating: f64,
    pub translation_of: Option<String>,
}

impl Article {
    pub fn is_translation(&self) -> bool {
        self.translation_of.is_some()
    }
}

/// One poll's worth of articles, ordered newest first and capped at [`WINDOW_SIZE`].
pub type Window = Vec<Article>;

#[derive(Debug, Deserialize)]
struct PagesData {
    pages: Option<PageConnection>,
}

#[derive(Debug, Deserialize)]
struct PageConnection {
    #[serde(default)]
    edges: Vec<PageEdge>,
}

#[derive(Debug, Deserialize)]
struct PageEdge {
    node: Option<PageNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageNode {
    url: String,
    wikidot_info: Option<WikidotInfo>,
    translation_of: Option<TranslationRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WikidotInfo {
    title: Option<String>,
    rating: Option<f64>,
    created_at: Option<String>,
    created_by: Option<Creator>,
}

#[derive(Debug, Deserialize)]
struct Creator {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranslationRef {
    url: String,
}

impl Article {
    fn from_node(node: PageNode) -> Option<Self> {
        let info = node.wikidot_info?;
        let created_at = info
            .created_at
            .as_deref()
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|dt| dt.with_timezone(&Utc))?;

        // Deleted accounts come back without a creator
        let author = info
            .created_by
            .and_then(|creator| creator.name)
            .unwrap_or_default();

        Some(Self {
            url: node.url,
            title: info.title.unwrap_or_default(),
            author,
            created_at,
            rating: info.rating.unwrap_or_default(),
            translation_of: node.translation_of.map(|source| source.url),
        })
    }
}

/// Decodes the `data` member of a pages query into a window.
///
/// A payload of the wrong shape yields an empty window rather than an error:
/// the caller treats it as "nothing new". The window covers the first
/// [`WINDOW_SIZE`] edges; nodes among them without page metadata or a
/// parseable creation date are skipped, so a bad node never pulls an older
/// page into the window.
pub fn window_from_data(data: serde_json::Value) -> Window {
    let pages = match serde_json::from_value::<PagesData>(data) {
        Ok(PagesData { pages: Some(pages) }) => pages,
        Ok(PagesData { pages: None }) => {
            debug!("upstream returned no pages");
            return Window::new();
        }
        Err(err) => {
            warn!(error = %err, "malformed pages payload; treating as empty window");
            return Window::new();
        }
    };

    let total = pages.edges.len().min(WINDOW_SIZE);
    let window: Window = pages
        .edges
        .into_iter()
        .take(WINDOW_SIZE)
        .filter_map(|edge| edge.node)
        .filter_map(Article::from_node)
        .collect();

    if window.len() < total {
        debug!(
            kept = window.len(),
            received = total,
            "dropped pages without usable metadata"
        );
    }
    window
}
