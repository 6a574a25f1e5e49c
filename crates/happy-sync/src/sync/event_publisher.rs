use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionUpdated { session_id: String },
    SessionRemoved { session_id: String },
    MachineUpdated { machine_id: String },
    MachineRemoved { machine_id: String },
}

/// Fans store changes out to subscribers over a tokio broadcast channel.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: StoreEvent) {
        // No receivers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
