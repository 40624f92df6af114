mod common;

use autopush_core::{bind, BindError, Binding, BindingStore, Session, SENTINEL_INDEX};
use common::article;

fn session(platform: &str, channel_id: &str, authority: u8) -> Session {
    Session {
        platform: platform.into(),
        channel_id: channel_id.into(),
        authority,
    }
}

#[tokio::test]
async fn bind_defaults_to_id_one() {
    let store = BindingStore::in_memory();
    let reply = bind(&store, &session("onebot", "777", 3), None)
        .await
        .unwrap();
    assert_eq!(reply, "已指定此频道为 1 号频道。");

    let binding = store.get(1).await.unwrap();
    assert_eq!(binding.address(), "onebot:777");
    assert_eq!(binding.last_index, SENTINEL_INDEX);
}

#[tokio::test]
async fn bind_requires_authority() {
    let store = BindingStore::in_memory();
    let err = bind(&store, &session("onebot", "777", 1), Some(4))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BindError::PermissionDenied {
            required: 3,
            actual: 1
        }
    ));
    assert!(store.get(4).await.is_none());
}

#[tokio::test]
async fn rebinding_same_channel_keeps_cursor() {
    let store = BindingStore::in_memory();
    let mut binding = Binding::seeded(2, "onebot", "777");
    binding.advance(&article(15), 0);
    store.upsert(binding.clone()).await;

    let reply = bind(&store, &session("onebot", "777", 4), Some(2))
        .await
        .unwrap();
    assert_eq!(reply, "已指定此频道为 2 号频道。");
    assert_eq!(store.get(2).await, Some(binding));
}

#[tokio::test]
async fn binding_taken_over_by_other_channel_starts_fresh() {
    let store = BindingStore::in_memory();
    let mut binding = Binding::seeded(2, "onebot", "777");
    binding.advance(&article(15), 0);
    store.upsert(binding).await;

    bind(&store, &session("discord", "news", 3), Some(2))
        .await
        .unwrap();
    let taken = store.get(2).await.unwrap();
    assert_eq!(taken.address(), "discord:news");
    assert!(taken.never_pushed());
}
