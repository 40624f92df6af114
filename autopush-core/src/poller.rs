use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::article::Article;
use crate::crom::CromClient;
use crate::dispatch::{Broadcaster, Dispatcher, DisplayZone, MessageFormat, MessageStyle};
use crate::error::PollError;
use crate::novelty::{detect, MatchPolicy};
use crate::storage::BindingStore;

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    /// Pause between two pushes to the same destination.
    pub pacing: Duration,
    pub policy: MatchPolicy,
    pub style: MessageStyle,
    pub zone: DisplayZone,
    /// URL prefix of the branch being watched.
    pub base_url: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            pacing: Duration::from_secs(3),
            policy: MatchPolicy::default(),
            style: MessageStyle::default(),
            zone: DisplayZone::default(),
            base_url: "http://backrooms-wiki-cn.wikidot.com".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    Pushed {
        binding_id: u32,
        articles: Vec<Article>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pushed(Vec<Article>),
    NothingNew,
    /// A previous cycle for the same binding was still running.
    Skipped,
}

/// One poll cycle per binding: fetch, detect, dispatch.
#[derive(Clone)]
pub struct Poller {
    store: BindingStore,
    client: CromClient,
    dispatcher: Dispatcher,
    config: PollConfig,
    in_flight: Arc<Mutex<HashMap<u32, Arc<Mutex<()>>>>>,
}

impl Poller {
    pub fn new(
        store: BindingStore,
        client: CromClient,
        broadcaster: Arc<dyn Broadcaster>,
        config: PollConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            store.clone(),
            broadcaster,
            MessageFormat::new(config.style, config.zone),
            config.pacing,
        );
        Self {
            store,
            client,
            dispatcher,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &BindingStore {
        &self.store
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    async fn gate(&self, id: u32) -> Arc<Mutex<()>> {
        let mut gates = self.in_flight.lock().await;
        gates.entry(id).or_default().clone()
    }

    /// Runs one cycle for binding `id`, creating the row if it does not exist.
    ///
    /// Cycles for the same id never overlap: if one is still in flight the
    /// call returns [`PollOutcome::Skipped`] without fetching.
    pub async fn poll_binding(
        &self,
        id: u32,
        platform: &str,
        channel_id: &str,
    ) -> Result<PollOutcome, PollError> {
        let gate = self.gate(id).await;
        let Ok(_cycle) = gate.try_lock_owned() else {
            debug!(binding = id, "previous cycle still running; skipping tick");
            return Ok(PollOutcome::Skipped);
        };

        let window = self.client.fetch(&self.config.base_url).await?;
        // Read the cursor only once the fetch is back, so it is as fresh as possible.
        let binding = self.store.get_or_create(id, platform, channel_id).await;
        let plan = detect(&binding, &window, self.config.policy);
        if plan.is_empty() {
            debug!(binding = id, window = window.len(), "nothing new");
            return Ok(PollOutcome::NothingNew);
        }

        let articles = self.dispatcher.dispatch(&binding, plan).await?;
        info!(
            binding = id,
            pushed = articles.len(),
            "pushed new publications"
        );
        Ok(PollOutcome::Pushed(articles))
    }

    /// Polls every stored binding once. Failures are logged per binding.
    pub async fn poll_once(&self) -> Vec<Event> {
        let bindings = self.store.list().await;
        let cycles = bindings.iter().map(|binding| async move {
            let outcome = self
                .poll_binding(binding.id, &binding.platform, &binding.channel_id)
                .await;
            (binding.id, outcome)
        });

        let mut events = Vec::new();
        for (binding_id, outcome) in join_all(cycles).await {
            match outcome {
                Ok(PollOutcome::Pushed(articles)) => {
                    events.push(Event::Pushed {
                        binding_id,
                        articles,
                    });
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(binding = binding_id, error = %err, "poll cycle failed");
                }
            }
        }
        events
    }
}

pub struct PollerHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl PollerHandle {
    /// Stops ticking and waits for cycles already in flight.
    pub async fn stop(self) -> Result<(), PollError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(PollError::from)
    }
}

/// Ticks every `interval` and polls all bindings.
///
/// Each tick runs as its own task, so a slow cycle does not delay the next
/// tick; overlapping cycles for the same binding are skipped by the poller.
pub fn spawn_poller(poller: Poller, update_tx: mpsc::Sender<Event>) -> PollerHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poller.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut cycles = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("poller shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let poller = poller.clone();
                    let update_tx = update_tx.clone();
                    cycles.spawn(async move {
                        poller.store.refresh().await;
                        for event in poller.poll_once().await {
                            if update_tx.send(event).await.is_err() {
                                warn!("update receiver dropped");
                            }
                        }
                    });
                }
                Some(finished) = cycles.join_next(), if !cycles.is_empty() => {
                    if let Err(err) = finished {
                        warn!(error = %err, "poll tick panicked");
                    }
                }
            }
        }

        while let Some(finished) = cycles.join_next().await {
            if let Err(err) = finished {
                warn!(error = %err, "poll tick panicked");
            }
        }
    });

    PollerHandle { cancel_tx, join }
}
