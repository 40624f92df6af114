use tracing::info;

use crate::binding::Binding;
use crate::error::BindError;
use crate::storage::BindingStore;

/// Authority level required to bind a channel.
pub const BIND_AUTHORITY: u8 = 3;
pub const DEFAULT_BINDING_ID: u32 = 1;

/// The chat context a command was issued from.
#[derive(Debug, Clone)]
pub struct Session {
    pub platform: String,
    pub channel_id: String,
    pub authority: u8,
}

/// Binds the session's channel to binding `id` (default 1).
///
/// Rebinding the same channel keeps its cursor. Taking over an id bound to a
/// different channel starts that id from a fresh cursor.
pub async fn bind(
    store: &BindingStore,
    session: &Session,
    id: Option<u32>,
) -> Result<String, BindError> {
    if session.authority < BIND_AUTHORITY {
        return Err(BindError::PermissionDenied {
            required: BIND_AUTHORITY,
            actual: session.authority,
        });
    }

    let id = id.unwrap_or(DEFAULT_BINDING_ID);
    match store.get(id).await {
        Some(existing) if existing.same_destination(&session.platform, &session.channel_id) => {
            info!(binding = id, destination = %existing.address(), "channel already bound");
        }
        previous => {
            let binding = Binding::seeded(id, &session.platform, &session.channel_id);
            if let Some(previous) = previous {
                info!(
                    binding = id,
                    from = %previous.address(),
                    to = %binding.address(),
                    "rebinding id"
                );
            } else {
                info!(binding = id, destination = %binding.address(), "bound channel");
            }
            store.upsert(binding).await;
        }
    }

    Ok(format!("已指定此频道为 {id} 号频道。"))
}
