//! Wires config, storage, provider and the Telegram adapter together and runs
//! the inbound processing loop.

use crate::dispatch::Dispatcher;
use crate::pending::{InMemoryPendingStore, PendingStore};
use crate::store::{SnippetStore, SqliteSnippetStore};
use anyhow::{Context, Result};
use devtoolkit_config::{Config, ProviderType};
use devtoolkit_ipc::{Envelope, EventBus, OutboundSink};
use devtoolkit_providers::{GeminiProvider, OpenAICompatibleProvider, Provider};
use devtoolkit_storage::Storage;
use devtoolkit_telegram::TelegramAdapter;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tracing::{error, info, warn};

const MAX_INBOUND_CONCURRENCY: usize = 8;

/// Builds the inference backend selected by `[provider]`.
pub fn provider_from_config(config: &Config) -> Arc<dyn Provider> {
    let provider_config = &config.provider;
    match provider_config.provider_type {
        ProviderType::Gemini => Arc::new(GeminiProvider::new(
            provider_config.api_key.clone(),
            provider_config.base_url.clone(),
            Some(provider_config.model.clone()),
        )),
        ProviderType::Openai => Arc::new(OpenAICompatibleProvider::new(
            provider_config.provider_type.to_string(),
            provider_config.api_key.clone(),
            provider_config.base_url.clone(),
            Some(provider_config.model.clone()),
        )),
    }
}

pub struct DevToolkitRuntime {
    config: Config,
    storage: Arc<Mutex<Storage>>,
    provider: Arc<dyn Provider>,
    pending: Arc<dyn PendingStore>,
    event_bus: EventBus,
}

impl DevToolkitRuntime {
    pub fn new(config: Config, storage: Storage) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let provider = provider_from_config(&config);

        Ok(Self {
            config,
            storage: Arc::new(Mutex::new(storage)),
            provider,
            pending: Arc::new(InMemoryPendingStore::new()),
            event_bus: EventBus::new(),
        })
    }

    /// Runs until the event bus closes or the process receives Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        info!(
            provider = self.provider.name(),
            model = self.provider.model(),
            "Dev Toolkit runtime starting..."
        );

        // Subscribe before the adapter starts publishing.
        let inbound_rx = self.event_bus.subscribe();

        let adapter = Arc::new(
            TelegramAdapter::new(&self.config.telegram, self.config.data_dir())?
                .with_event_bus(self.event_bus.clone()),
        );
        let poller = Arc::clone(&adapter);
        tokio::spawn(async move {
            if let Err(e) = poller.poll().await {
                error!("Telegram adapter failed: {}", e);
            }
        });

        let snippets: Arc<dyn SnippetStore> =
            Arc::new(SqliteSnippetStore::new(Arc::clone(&self.storage)));
        let outbound: Arc<dyn OutboundSink> = adapter;
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&self.pending),
            snippets,
            Arc::clone(&self.provider),
            outbound,
            self.config.formatter.max_segment_len,
        ));

        tokio::select! {
            _ = Self::process_inbound(inbound_rx, dispatcher, UserQueues::default()) => {
                info!("Inbound processor stopped");
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown requested");
            }
        }

        Ok(())
    }

    /// Routes each event to its user's queue. Queues are drained in arrival
    /// order by one worker per user; workers from different users run in
    /// parallel, bounded by a semaphore.
    async fn process_inbound(
        mut inbound_rx: broadcast::Receiver<Envelope>,
        dispatcher: Arc<Dispatcher>,
        queues: UserQueues,
    ) {
        let semaphore = Arc::new(Semaphore::new(MAX_INBOUND_CONCURRENCY));

        loop {
            let envelope = match inbound_rx.recv().await {
                Ok(envelope) => envelope,
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Event bus closed, stopping message processor");
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event bus lagged by {} messages", n);
                    continue;
                }
            };

            let key = Self::scope_key(&envelope);
            if let Some(rx) = queues.enqueue(&key, envelope).await {
                tokio::spawn(Self::drain_user_queue(
                    key,
                    rx,
                    queues.clone(),
                    Arc::clone(&dispatcher),
                    Arc::clone(&semaphore),
                ));
            }
        }
    }

    async fn drain_user_queue(
        key: String,
        mut rx: mpsc::UnboundedReceiver<Envelope>,
        queues: UserQueues,
        dispatcher: Arc<Dispatcher>,
        semaphore: Arc<Semaphore>,
    ) {
        while let Some(envelope) = queues.next_or_retire(&key, &mut rx).await {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(
                        "Inbound worker semaphore closed (trace_id={}): {}",
                        envelope.trace_id, err
                    );
                    queues.retire(&key).await;
                    return;
                }
            };

            if let Err(e) = dispatcher.handle(&envelope).await {
                error!(
                    "Error processing inbound message (trace_id={}): {}",
                    envelope.trace_id, e
                );
            }
        }
    }

    fn scope_key(envelope: &Envelope) -> String {
        format!("{}:{}", envelope.channel, envelope.user_id)
    }
}

/// Pending inbound events per user. An entry exists only while that user's
/// worker is alive; the worker removes it once the queue is empty.
#[derive(Clone, Default)]
struct UserQueues {
    senders: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Envelope>>>>,
}

impl UserQueues {
    /// Appends `envelope` to the user's queue. Returns the receiver when a new
    /// queue was created, in which case the caller must start its worker.
    async fn enqueue(
        &self,
        key: &str,
        envelope: Envelope,
    ) -> Option<mpsc::UnboundedReceiver<Envelope>> {
        let mut senders = self.senders.lock().await;
        let envelope = match senders.get(key) {
            Some(tx) => match tx.send(envelope) {
                Ok(()) => return None,
                Err(mpsc::error::SendError(envelope)) => envelope,
            },
            None => envelope,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this send cannot fail.
        let _ = tx.send(envelope);
        senders.insert(key.to_string(), tx);
        Some(rx)
    }

    /// Next queued event, or `None` after removing the queue when it is empty.
    /// The emptiness check and the removal happen under the map lock, so
    /// `enqueue` never hands an event to a retiring worker.
    async fn next_or_retire(
        &self,
        key: &str,
        rx: &mut mpsc::UnboundedReceiver<Envelope>,
    ) -> Option<Envelope> {
        if let Ok(envelope) = rx.try_recv() {
            return Some(envelope);
        }
        let mut senders = self.senders.lock().await;
        match rx.try_recv() {
            Ok(envelope) => Some(envelope),
            Err(_) => {
                senders.remove(key);
                None
            }
        }
    }

    async fn retire(&self, key: &str) {
        self.senders.lock().await.remove(key);
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.senders.lock().await.len()
    }
}
