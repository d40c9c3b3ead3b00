//! Real-time farm change feed
//!
//! Every farm or valve mutation is published on an in-process broadcast
//! channel. Subscribers (one per open SSE connection) filter by owner.

use serde::Serialize;
use shared::{Farm, GateValve};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A change to a user's farms, tagged by `type`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FarmEvent {
    FarmCreated { owner_id: Uuid, farm: Farm },
    FarmUpdated { owner_id: Uuid, farm: Farm },
    FarmDeleted { owner_id: Uuid, farm_id: Uuid },
    ValveAdded { owner_id: Uuid, valve: GateValve },
    ValveUpdated { owner_id: Uuid, valve: GateValve },
    ValveRemoved { owner_id: Uuid, farm_id: Uuid, valve_id: Uuid },
}

impl FarmEvent {
    pub fn owner_id(&self) -> Uuid {
        match self {
            FarmEvent::FarmCreated { owner_id, .. }
            | FarmEvent::FarmUpdated { owner_id, .. }
            | FarmEvent::FarmDeleted { owner_id, .. }
            | FarmEvent::ValveAdded { owner_id, .. }
            | FarmEvent::ValveUpdated { owner_id, .. }
            | FarmEvent::ValveRemoved { owner_id, .. } => *owner_id,
        }
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            FarmEvent::FarmCreated { .. } => "farm_created",
            FarmEvent::FarmUpdated { .. } => "farm_updated",
            FarmEvent::FarmDeleted { .. } => "farm_deleted",
            FarmEvent::ValveAdded { .. } => "valve_added",
            FarmEvent::ValveUpdated { .. } => "valve_updated",
            FarmEvent::ValveRemoved { .. } => "valve_removed",
        }
    }
}

/// Broadcast bus for farm events
#[derive(Debug, Clone)]
pub struct FarmEventBus {
    sender: broadcast::Sender<FarmEvent>,
}

impl FarmEventBus {
    /// Creates a new bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: FarmEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "Published farm event"),
            Err(_) => tracing::trace!(event = name, "No subscribers for farm event"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FarmEvent> {
        self.sender.subscribe()
    }
}
