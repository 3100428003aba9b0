//! The control hub: command publishing, update dispatch, state cache.
//!
//! One [`ControlHub`] instance owns the full correlation state for a fleet
//! of devices: the per-device cache, the pending-wait table, the per-topic
//! publish locks and the update fan-out. It is constructed explicitly and
//! torn down explicitly; nothing here is process-global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::Command;
use crate::config::HubConfig;
use crate::correlate::{Correlator, WaitPolicy};
use crate::error::{Error, Result};
use crate::filter::{check_conflicts, PinFilter};
use crate::lock::KeyLock;
use crate::topic;
use crate::transport::{InboundMessage, Transport};
use crate::types::{DeviceCache, PinUpdate, RawUpdate};

/// One inbound envelope, fanned out to update subscribers.
#[derive(Debug, Clone)]
pub struct UpdateEvent {
    pub device_id: String,
    pub update: RawUpdate,
}

struct HubInner {
    transport: Arc<dyn Transport>,
    cache: RwLock<HashMap<String, DeviceCache>>,
    correlator: Correlator,
    topic_locks: KeyLock,
    update_tx: broadcast::Sender<UpdateEvent>,
    started: AtomicBool,
    dispatch_task: StdMutex<Option<JoinHandle<()>>>,
}

/// Control hub for a fleet of pin devices. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct ControlHub {
    inner: Arc<HubInner>,
}

impl ControlHub {
    /// Build a stopped hub over an arbitrary transport. Call
    /// [`start`](Self::start) before sending commands.
    pub fn new(config: &HubConfig, transport: Arc<dyn Transport>) -> Self {
        let (update_tx, _) = broadcast::channel(config.update_capacity);
        Self {
            inner: Arc::new(HubInner {
                transport,
                cache: RwLock::new(HashMap::new()),
                correlator: Correlator::new(),
                topic_locks: KeyLock::new(),
                update_tx,
                started: AtomicBool::new(false),
                dispatch_task: StdMutex::new(None),
            }),
        }
    }

    /// Connect to the configured broker, start the hub and attach the
    /// inbound message stream.
    #[cfg(feature = "mqtt")]
    pub async fn connect(config: HubConfig) -> Result<Self> {
        let (transport, inbound) = crate::transport::MqttTransport::connect(&config.mqtt);
        let hub = Self::new(&config, Arc::new(transport));
        hub.start().await?;
        hub.attach(inbound);
        Ok(hub)
    }

    /// Subscribe to the update stream. Idempotent.
    pub async fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.inner.transport.subscribe(topic::UPDATE_FILTER).await {
            self.inner.started.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        debug!("subscribed to {}", topic::UPDATE_FILTER);
        Ok(())
    }

    /// Unsubscribe and stop dispatching. Pending waits are left to their
    /// timeouts; the cache is retained.
    pub async fn stop(&self) -> Result<()> {
        if !self.inner.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(task) = self
            .inner
            .dispatch_task
            .lock()
            .expect("dispatch task slot poisoned")
            .take()
        {
            task.abort();
        }
        self.inner.transport.unsubscribe(topic::UPDATE_FILTER).await?;
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Spawn the dispatch loop feeding [`handle_update`](Self::handle_update)
    /// from a transport's inbound stream.
    pub fn attach(&self, mut inbound: mpsc::Receiver<InboundMessage>) {
        let hub = self.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                hub.handle_update(&message.topic, &message.payload).await;
            }
            debug!("inbound stream closed, dispatch loop ending");
        });
        let previous = self
            .inner
            .dispatch_task
            .lock()
            .expect("dispatch task slot poisoned")
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Process one inbound message: merge the cache, feed pending waits,
    /// fan out to subscribers.
    ///
    /// Foreign topics and undecodable payloads are logged and dropped; a bad
    /// message never disturbs the cache, the waits or the loop itself.
    pub async fn handle_update(&self, msg_topic: &str, payload: &[u8]) {
        let Some(device_id) = topic::parse_update(msg_topic) else {
            warn!("ignoring message on unexpected topic: {}", msg_topic);
            return;
        };

        let update: RawUpdate = match serde_json::from_slice(payload) {
            Ok(update) => update,
            Err(e) => {
                warn!("ignoring undecodable update from {}: {}", device_id, e);
                return;
            }
        };

        debug!("update from {}: {:?}", device_id, update);

        // Merge the whole envelope under one write guard so readers never
        // observe it half-applied.
        {
            let mut cache = self.inner.cache.write().await;
            cache.entry(device_id.to_owned()).or_default().merge(&update);
        }

        self.inner.correlator.process(device_id, &update);

        let _ = self.inner.update_tx.send(UpdateEvent {
            device_id: device_id.to_owned(),
            update,
        });
    }

    /// Publish a command without waiting for confirmation.
    pub async fn send(&self, command: &Command) -> Result<()> {
        self.ensure_started()?;
        let payload = command.payload_json()?;
        let publish_topic = command.topic();

        let _guard = self.inner.topic_locks.acquire(&publish_topic).await;
        self.inner.transport.publish(&publish_topic, payload).await?;
        Ok(())
    }

    /// Publish a command and wait for the update stream to confirm it.
    ///
    /// The derived filters are conflict-checked before anything is
    /// published. The topic lock covers the publish and the wait
    /// registration only; the round trip itself runs outside it, so a
    /// second command to the same topic queues behind the publish, not
    /// behind the device's response latency.
    pub async fn send_wait(
        &self,
        command: &Command,
        policy: WaitPolicy,
        timeout: Option<Duration>,
    ) -> Result<Vec<PinUpdate>> {
        self.ensure_started()?;
        let filters = command.response_filters();
        check_conflicts(&filters)?;
        let payload = command.payload_json()?;
        let publish_topic = command.topic();

        let handle = {
            let _guard = self.inner.topic_locks.acquire(&publish_topic).await;
            self.inner.transport.publish(&publish_topic, payload).await?;
            // Registered after the publish: an earlier registration could be
            // satisfied by a periodic update reflecting pre-command state.
            self.inner
                .correlator
                .register(command.device_id(), filters, policy)?
        };

        handle.wait(timeout).await
    }

    /// Wait for updates matching `filters`, independent of any command.
    pub async fn wait_for(
        &self,
        device_id: &str,
        filters: Vec<PinFilter>,
        policy: WaitPolicy,
        timeout: Option<Duration>,
    ) -> Result<Vec<PinUpdate>> {
        self.ensure_started()?;
        let handle = self.inner.correlator.register(device_id, filters, policy)?;
        handle.wait(timeout).await
    }

    /// Subscribe to every decoded inbound envelope.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.update_tx.subscribe()
    }

    /// Snapshot of one device's cached state.
    pub async fn device_cache(&self, device_id: &str) -> Option<DeviceCache> {
        self.inner.cache.read().await.get(device_id).cloned()
    }

    /// Snapshot of every device's cached state.
    pub async fn cache_snapshot(&self) -> HashMap<String, DeviceCache> {
        self.inner.cache.read().await.clone()
    }

    /// Number of unresolved waits; drops to zero once every wait has
    /// resolved, timed out or been dropped.
    pub fn waiter_count(&self) -> usize {
        self.inner.correlator.waiter_count()
    }

    fn ensure_started(&self) -> Result<()> {
        if self.is_started() {
            Ok(())
        } else {
            Err(Error::NotStarted)
        }
    }
}
