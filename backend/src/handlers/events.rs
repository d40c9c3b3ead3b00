//! Server-sent farm change feed

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    Stream, StreamExt,
};
use uuid::Uuid;

use crate::middleware::CurrentUser;
use crate::services::FarmEvent;
use crate::AppState;

/// What a subscriber is sent for one broadcast message
#[derive(Debug)]
enum Outgoing {
    Change(FarmEvent),
    Resync(u64),
}

fn for_owner(
    message: Result<FarmEvent, BroadcastStreamRecvError>,
    owner_id: Uuid,
) -> Option<Outgoing> {
    match message {
        Ok(event) if event.owner_id() == owner_id => Some(Outgoing::Change(event)),
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => Some(Outgoing::Resync(skipped)),
    }
}

fn to_sse(outgoing: Outgoing) -> Option<Event> {
    match outgoing {
        Outgoing::Change(event) => Event::default().event(event.name()).json_data(&event).ok(),
        Outgoing::Resync(skipped) => {
            tracing::warn!(skipped, "Farm event subscriber lagged, asking for resync");
            Some(
                Event::default()
                    .event("resync")
                    .data(serde_json::json!({ "skipped": skipped }).to_string()),
            )
        }
    }
}

/// Stream the caller's farm and valve changes
pub async fn farm_events(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let owner_id = current_user.id();
    tracing::debug!(user_id = %owner_id, "Farm event subscriber connected");

    let stream = BroadcastStream::new(state.events.subscribe())
        .filter_map(move |message| for_owner(message, owner_id).and_then(to_sse).map(Ok));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::FarmEventBus;

    #[test]
    fn test_other_owners_are_filtered() {
        let owner = Uuid::new_v4();
        let event = FarmEvent::FarmDeleted {
            owner_id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
        };
        assert!(for_owner(Ok(event), owner).is_none());

        let event = FarmEvent::FarmDeleted {
            owner_id: owner,
            farm_id: Uuid::new_v4(),
        };
        assert!(matches!(for_owner(Ok(event), owner), Some(Outgoing::Change(_))));
    }

    #[test]
    fn test_lag_becomes_resync() {
        let outgoing = for_owner(Err(BroadcastStreamRecvError::Lagged(3)), Uuid::new_v4());
        assert!(matches!(outgoing, Some(Outgoing::Resync(3))));
    }

    #[tokio::test]
    async fn test_lagging_stream_yields_resync() {
        let bus = FarmEventBus::new(1);
        let owner = Uuid::new_v4();
        let mut stream = BroadcastStream::new(bus.subscribe());

        for _ in 0..3 {
            bus.publish(FarmEvent::FarmDeleted {
                owner_id: owner,
                farm_id: Uuid::new_v4(),
            });
        }

        let first = stream.next().await.unwrap();
        assert!(matches!(
            for_owner(first, owner),
            Some(Outgoing::Resync(2))
        ));
    }
}
