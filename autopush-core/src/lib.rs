pub mod article;
pub mod bind;
pub mod binding;
pub mod config;
pub mod crom;
pub mod dispatch;
pub mod error;
pub mod novelty;
pub mod poller;
pub mod storage;

pub use article::{window_from_data, Article, Window, WINDOW_SIZE};
pub use bind::{bind, Session, BIND_AUTHORITY, DEFAULT_BINDING_ID};
pub use binding::{Binding, SENTINEL_INDEX};
pub use config::{AppConfig, BroadcastConfig, PollSettings, UpstreamConfig};
pub use crom::CromClient;
pub use dispatch::{
    Broadcaster, Dispatcher, DisplayZone, LogBroadcaster, MessageFormat, MessageStyle,
    WebhookBroadcaster,
};
pub use error::{BindError, BroadcastError, ConfigError, PollError};
pub use novelty::{detect, MatchPolicy, PendingPush, PushPlan};
pub use poller::{spawn_poller, Event, PollConfig, PollOutcome, Poller, PollerHandle};
pub use storage::BindingStore;
