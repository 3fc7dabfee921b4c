// Event bus implementation
use crate::utils::{gen_id, now_ms};
use crate::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Event pushed from a plugin to page listeners (`notifyListeners` on the page side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub id: String,
    /// Listener event name, e.g. `ttsStart`
    pub name: String,
    /// Name of the emitting plugin
    pub source: String,
    pub timestamp_ms: i64,
    pub data: serde_json::Value,
}

impl BridgeEvent {
    pub fn new(source: impl Into<String>, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: gen_id(),
            name: name.into(),
            source: source.into(),
            timestamp_ms: now_ms(),
            data,
        }
    }
}

/// Delivery policy for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoSLevel {
    /// Never waits on a slow listener; drops when its queue is full
    Realtime,
    /// Waits for queue space
    #[default]
    Batched,
}

/// Subscription information
#[derive(Debug, Clone)]
struct Subscription {
    id: String,
    event_names: Vec<String>,
    qos: QoSLevel,
    sender: mpsc::Sender<BridgeEvent>,
}

/// Event bus statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventBusStats {
    pub total_published: u64,
    pub total_delivered: u64,
    pub active_subscriptions: usize,
    pub dropped_events: u64,
}

/// Topic-based fan-out from plugins to listeners. Topics are plugin names.
pub struct EventBus {
    // Topic -> Subscriber list
    subscriptions: Arc<DashMap<String, Vec<Subscription>>>,

    // Statistics
    stats: Arc<DashMap<String, EventBusStats>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(DashMap::new()),
            stats: Arc::new(DashMap::new()),
        }
    }

    pub async fn shutdown(&self) -> Result<()> {
        info!(target: "event_bus", "Event Bus shutting down");
        self.subscriptions.clear();
        Ok(())
    }

    /// Publish event to topic, returning the number of listeners reached
    pub async fn publish(&self, topic: &str, event: BridgeEvent) -> Result<u64> {
        debug!(target: "event_bus", id = %event.id, name = %event.name, topic, "Publishing event");

        self.update_stats(topic, |stats| stats.total_published += 1);
        self.prune_closed(topic);

        // Clone senders out so no map guard is held across an await
        let subs: Vec<Subscription> = match self.subscriptions.get(topic) {
            Some(subs) => subs.value().clone(),
            None => {
                debug!(target: "event_bus", topic, "No subscriptions for topic");
                return Ok(0);
            }
        };

        let mut delivered = 0;
        let mut dropped = 0;

        for sub in &subs {
            if !sub.event_names.is_empty() && !sub.event_names.contains(&event.name) {
                continue;
            }

            match sub.qos {
                QoSLevel::Realtime => {
                    if sub.sender.try_send(event.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        dropped += 1;
                        warn!(target: "event_bus", subscription = %sub.id, "Dropped realtime event");
                    }
                }
                QoSLevel::Batched => match sub.sender.send(event.clone()).await {
                    Ok(_) => delivered += 1,
                    Err(_) => {
                        dropped += 1;
                        warn!(target: "event_bus", subscription = %sub.id, "Listener gone; event dropped");
                    }
                },
            }
        }

        self.update_stats(topic, |stats| {
            stats.total_delivered += delivered;
            stats.dropped_events += dropped;
        });

        Ok(delivered)
    }

    /// Subscribe to topic; an empty `event_names` list receives every event
    pub async fn subscribe(
        &self,
        topic: impl Into<String>,
        event_names: Vec<String>,
        qos: QoSLevel,
    ) -> Result<(String, mpsc::Receiver<BridgeEvent>)> {
        let topic = topic.into();
        let subscription_id = format!("sub_{}_{}", topic, gen_id());
        let cap = match qos {
            QoSLevel::Realtime => 64,
            QoSLevel::Batched => 1024,
        };
        let (tx, rx) = mpsc::channel(cap);

        let subscription = Subscription {
            id: subscription_id.clone(),
            event_names,
            qos,
            sender: tx,
        };

        self.subscriptions
            .entry(topic.clone())
            .or_default()
            .push(subscription);

        self.update_stats(&topic, |stats| {
            stats.active_subscriptions += 1;
        });

        info!(target: "event_bus", subscription = %subscription_id, topic = %topic, "Created subscription");
        Ok((subscription_id, rx))
    }

    /// Same as [`EventBus::subscribe`] but yields a `Stream` of events
    pub async fn subscribe_stream(
        &self,
        topic: impl Into<String>,
        event_names: Vec<String>,
    ) -> Result<(String, ReceiverStream<BridgeEvent>)> {
        let (id, rx) = self.subscribe(topic, event_names, QoSLevel::Batched).await?;
        Ok((id, ReceiverStream::new(rx)))
    }

    /// Unsubscribe; the receiver sees the channel close once buffered events drain
    pub async fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        for mut entry in self.subscriptions.iter_mut() {
            let before = entry.value().len();
            entry.value_mut().retain(|sub| sub.id != subscription_id);
            let removed = before - entry.value().len();
            if removed > 0 {
                let topic = entry.key().clone();
                self.update_stats(&topic, |stats| {
                    stats.active_subscriptions = stats.active_subscriptions.saturating_sub(removed);
                });
            }
        }

        info!(target: "event_bus", subscription = %subscription_id, "Unsubscribed");
        Ok(())
    }

    /// Forget subscriptions whose receiver was dropped
    fn prune_closed(&self, topic: &str) {
        let removed = match self.subscriptions.get_mut(topic) {
            Some(mut subs) => {
                let before = subs.len();
                subs.retain(|sub| !sub.sender.is_closed());
                before - subs.len()
            }
            None => 0,
        };
        if removed > 0 {
            debug!(target: "event_bus", topic, removed, "Pruned closed subscriptions");
            self.update_stats(topic, |stats| {
                stats.active_subscriptions = stats.active_subscriptions.saturating_sub(removed);
            });
        }
    }

    /// Number of live listeners on a topic
    pub fn listener_count(&self, topic: &str) -> usize {
        self.subscriptions
            .get(topic)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }

    /// Get stats
    pub fn get_stats(&self, topic: &str) -> Option<EventBusStats> {
        self.stats.get(topic).map(|s| s.clone())
    }

    fn update_stats<F>(&self, topic: &str, f: F)
    where
        F: FnOnce(&mut EventBusStats),
    {
        f(self.stats.entry(topic.to_string()).or_default().value_mut());
    }
}
