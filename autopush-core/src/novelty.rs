//! Decides which articles of a freshly fetched window are new for a binding.
//!
//! The window is ordered newest first (index 0 is the latest publication).
//! A [`PushPlan`] lists the articles to push oldest first, each tagged with
//! its position in the window.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::article::{Article, WINDOW_SIZE};
use crate::binding::Binding;

/// How the stored cursor is located inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Everything created strictly after the cursor's timestamp is new.
    #[default]
    Timestamp,
    /// Everything above the cursor's URL is new. A cursor that rotated out of
    /// the window pushes the whole window; one that vanished from the middle
    /// of it falls back to its timestamp.
    Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingPush {
    pub index: usize,
    pub article: Article,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PushPlan {
    pub pushes: Vec<PendingPush>,
}

impl PushPlan {
    /// Every article from `boundary` up to the newest, oldest first.
    fn through(window: &[Article], boundary: usize) -> Self {
        let pushes = (0..=boundary)
            .rev()
            .map(|index| PendingPush {
                index,
                article: window[index].clone(),
            })
            .collect();
        Self { pushes }
    }

    pub fn is_empty(&self) -> bool {
        self.pushes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pushes.len()
    }

    /// The article the cursor ends on once the plan is fully pushed.
    pub fn newest(&self) -> Option<&Article> {
        self.pushes.last().map(|push| &push.article)
    }
}

/// Computes what to push for `binding` given the current `window`.
///
/// A binding that never pushed anything gets only the newest article, so a
/// fresh channel is not flooded with the backlog.
pub fn detect(binding: &Binding, window: &[Article], policy: MatchPolicy) -> PushPlan {
    let window = &window[..window.len().min(WINDOW_SIZE)];
    if window.is_empty() {
        return PushPlan::default();
    }
    if binding.never_pushed() {
        return PushPlan::through(window, 0);
    }

    let boundary = match policy {
        MatchPolicy::Timestamp => timestamp_boundary(binding, window),
        MatchPolicy::Url => url_boundary(binding, window),
    };
    boundary
        .map(|boundary| PushPlan::through(window, boundary))
        .unwrap_or_default()
}

/// Oldest position holding an article newer than the cursor.
fn timestamp_boundary(binding: &Binding, window: &[Article]) -> Option<usize> {
    let Some(last_seen) = binding.created_at else {
        // A cursor with a URL but no date cannot be compared; restart from the newest.
        warn!(
            binding = binding.id,
            url = %binding.url,
            "cursor has no creation time; pushing newest article only"
        );
        return Some(0);
    };
    (0..window.len())
        .rev()
        .find(|&index| window[index].created_at > last_seen)
}

fn url_boundary(binding: &Binding, window: &[Article]) -> Option<usize> {
    match window.iter().position(|article| article.url == binding.url) {
        // Cursor is still the newest article: the range above it is empty.
        Some(0) => None,
        Some(position) => Some(position - 1),
        // The cursor page left the window while older pages are still
        // visible, so it was removed rather than rotated out.
        None if reaches_back_to_cursor(binding, window) => timestamp_boundary(binding, window),
        None => Some(window.len() - 1),
    }
}

fn reaches_back_to_cursor(binding: &Binding, window: &[Article]) -> bool {
    match (binding.created_at, window.last()) {
        (Some(last_seen), Some(oldest)) => oldest.created_at <= last_seen,
        _ => false,
    }
}
