mod common;

use autopush_core::{detect, Binding, MatchPolicy, PushPlan};
use common::{article, window};

fn bound_at(n: u32, index: usize) -> Binding {
    let mut binding = Binding::seeded(1, "onebot", "123");
    binding.advance(&article(n), index);
    binding
}

fn pushed_urls(plan: &PushPlan) -> Vec<String> {
    plan.pushes.iter().map(|push| push.article.url.clone()).collect()
}

fn pushed_indices(plan: &PushPlan) -> Vec<usize> {
    plan.pushes.iter().map(|push| push.index).collect()
}

#[test]
fn timestamp_cursor_one_behind_pushes_only_newest() {
    // window = [A(20), B(19), ..., J(11)], cursor on B
    let window = window(20);
    let binding = bound_at(19, 0);

    let plan = detect(&binding, &window, MatchPolicy::Timestamp);
    assert_eq!(pushed_urls(&plan), vec![window[0].url.clone()]);
    assert_eq!(plan.newest(), Some(&window[0]));
}

#[test]
fn timestamp_pushes_new_articles_oldest_first() {
    let window = window(20);
    let binding = bound_at(16, 0);

    let plan = detect(&binding, &window, MatchPolicy::Timestamp);
    assert_eq!(pushed_indices(&plan), vec![3, 2, 1, 0]);
    assert_eq!(plan.pushes[0].article, article(17));
    assert_eq!(plan.newest(), Some(&article(20)));
}

#[test]
fn timestamp_nothing_newer_pushes_nothing() {
    let window = window(20);
    let binding = bound_at(20, 0);
    assert!(detect(&binding, &window, MatchPolicy::Timestamp).is_empty());

    // cursor newer than everything visible
    let binding = bound_at(25, 0);
    assert!(detect(&binding, &window, MatchPolicy::Timestamp).is_empty());
}

#[test]
fn timestamp_cursor_older_than_window_pushes_whole_window() {
    let window = window(20);
    let binding = bound_at(3, 0);

    let plan = detect(&binding, &window, MatchPolicy::Timestamp);
    assert_eq!(plan.len(), 10);
    assert_eq!(pushed_indices(&plan), (0..10).rev().collect::<Vec<_>>());
}

#[test]
fn first_poll_pushes_at_most_one_article() {
    let window = window(20);
    let fresh = Binding::seeded(1, "onebot", "123");

    for policy in [MatchPolicy::Timestamp, MatchPolicy::Url] {
        let plan = detect(&fresh, &window, policy);
        assert_eq!(plan.len(), 1, "{policy:?}");
        assert_eq!(plan.pushes[0].index, 0);
        assert_eq!(plan.pushes[0].article, article(20));
    }
}

#[test]
fn empty_window_is_nothing_new() {
    let fresh = Binding::seeded(1, "onebot", "123");
    assert!(detect(&fresh, &[], MatchPolicy::Timestamp).is_empty());
    assert!(detect(&bound_at(10, 0), &[], MatchPolicy::Url).is_empty());
}

#[test]
fn url_policy_pushes_everything_above_cursor() {
    let window = window(20);
    let binding = bound_at(17, 0);

    let plan = detect(&binding, &window, MatchPolicy::Url);
    assert_eq!(pushed_indices(&plan), vec![2, 1, 0]);
    assert_eq!(plan.pushes[0].article, article(18));
}

#[test]
fn url_policy_cursor_still_newest_pushes_nothing() {
    let window = window(20);
    let binding = bound_at(20, 0);
    assert!(detect(&binding, &window, MatchPolicy::Url).is_empty());
}

#[test]
fn url_policy_single_new_article_is_pushed() {
    let window = window(20);
    let binding = bound_at(19, 0);

    let plan = detect(&binding, &window, MatchPolicy::Url);
    assert_eq!(pushed_indices(&plan), vec![0]);
}

#[test]
fn url_policy_rotated_out_cursor_catches_up_on_window() {
    let window = window(40);
    let binding = bound_at(12, 0);

    let plan = detect(&binding, &window, MatchPolicy::Url);
    assert_eq!(plan.len(), 10);
    assert_eq!(plan.pushes[0].article, article(31));
    assert_eq!(plan.newest(), Some(&article(40)));
}

#[test]
fn url_policy_ignores_timestamps() {
    let mut window = window(20);
    // page edited in place: same URL, later timestamp
    window[1].created_at = article(30).created_at;
    let binding = bound_at(19, 0);

    let plan = detect(&binding, &window, MatchPolicy::Url);
    assert_eq!(pushed_indices(&plan), vec![0]);
}

#[test]
fn oversized_window_is_capped() {
    let long: Vec<_> = (0..15).map(|offset| article(30 - offset)).collect();
    let binding = bound_at(1, 0);

    let plan = detect(&binding, &long, MatchPolicy::Timestamp);
    assert_eq!(plan.len(), 10);
    assert_eq!(plan.pushes[0].article, article(21));
}

#[test]
fn url_policy_removed_cursor_falls_back_to_timestamp() {
    // cursor page 17 was deleted upstream; older pages are still visible
    let window: Vec<_> = window(20)
        .into_iter()
        .filter(|article| article.url != common::page_url(17))
        .collect();
    let binding = bound_at(17, 3);

    let plan = detect(&binding, &window, MatchPolicy::Url);
    assert_eq!(pushed_indices(&plan), vec![2, 1, 0]);
    assert_eq!(plan.pushes[0].article, article(18));
}

#[test]
fn timestamp_cursor_without_date_pushes_newest_only() {
    let mut binding = Binding::seeded(1, "onebot", "123");
    binding.url = common::page_url(5);
    assert!(!binding.never_pushed());

    let plan = detect(&binding, &window(20), MatchPolicy::Timestamp);
    assert_eq!(pushed_indices(&plan), vec![0]);
    assert_eq!(plan.newest(), Some(&article(20)));
}
