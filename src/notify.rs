use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::OpeningEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for opening events, one channel per company.
pub struct NotifyHub {
    channels: DashMap<String, broadcast::Sender<OpeningEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to a company's events. Creates the channel if needed.
    pub fn subscribe(&self, company_id: &str) -> broadcast::Receiver<OpeningEvent> {
        let sender = self
            .channels
            .entry(company_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a notification to the opening's company. No-op if nobody is listening.
    pub fn send(&self, event: &OpeningEvent) {
        let company_id = &event.opening().company_id;
        if let Some(sender) = self.channels.get(company_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop channels whose subscribers have all gone away.
    pub fn prune(&self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
