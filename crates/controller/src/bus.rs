//! Dual-channel event emission (§4.6, §9): one call writes the session
//! channel and, for the observer-relevant subset, the process-wide
//! observer broadcast. The observer channel is bounded with drop-oldest
//! semantics per lagging receiver, so a slow observer can never
//! back-pressure the session channel (§5).

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use voxbridge_core::{Event, EventKind};

use crate::frame::ClientFrame;

#[derive(Clone)]
pub struct EventBus {
    session_tx: mpsc::Sender<ClientFrame>,
    observer_tx: broadcast::Sender<Event>,
    user_id: String,
}

impl EventBus {
    pub fn new(
        session_tx: mpsc::Sender<ClientFrame>,
        observer_tx: broadcast::Sender<Event>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            session_tx,
            observer_tx,
            user_id: user_id.into(),
        }
    }

    /// Emits one event onto the session channel and, if relevant, onto the
    /// observer channel. Never blocks on a slow observer: `broadcast::Sender`
    /// only drops the oldest buffered item for receivers that fall behind,
    /// it does not wait for them.
    pub async fn emit(&self, session_id: Uuid, correlation_id: Uuid, kind: EventKind) {
        let observer_relevant = kind.is_observer_relevant();
        let event = Event::new(session_id, correlation_id, kind);

        if observer_relevant {
            let copy = event.for_observer(self.user_id.clone());
            // No receivers is the common case (no observers attached) and
            // is not an error.
            let _ = self.observer_tx.send(copy);
        }

        if self
            .session_tx
            .send(ClientFrame::Event(event))
            .await
            .is_err()
        {
            tracing::debug!(session_id = %session_id, "session channel closed, client likely disconnected");
        }
    }

    /// Emits one binary audio chunk on the session channel, in order
    /// relative to any event emitted before or after it.
    pub async fn emit_binary(&self, session_id: Uuid, bytes: Vec<u8>) {
        if self
            .session_tx
            .send(ClientFrame::Binary(bytes))
            .await
            .is_err()
        {
            tracing::debug!(session_id = %session_id, "session channel closed mid binary send");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxbridge_core::StopReason;

    fn bus() -> (EventBus, mpsc::Receiver<ClientFrame>, broadcast::Receiver<Event>) {
        let (session_tx, session_rx) = mpsc::channel(8);
        let (observer_tx, observer_rx) = broadcast::channel(8);
        (EventBus::new(session_tx, observer_tx, "user-1"), session_rx, observer_rx)
    }

    #[tokio::test]
    async fn emit_always_reaches_the_session_channel() {
        let (bus, mut session_rx, _observer_rx) = bus();
        let session_id = Uuid::new_v4();
        bus.emit(session_id, Uuid::new_v4(), EventKind::AiResponseStart).await;
        assert!(matches!(session_rx.recv().await, Some(ClientFrame::Event(_))));
    }

    #[tokio::test]
    async fn only_observer_relevant_kinds_reach_the_observer_channel() {
        let (bus, mut session_rx, mut observer_rx) = bus();
        let session_id = Uuid::new_v4();
        // StopListening is not observer-relevant (§9): it's session
        // lifecycle plumbing, not something an outside observer cares about.
        bus.emit(session_id, Uuid::new_v4(), EventKind::StopListening {
            reason: StopReason::Silence { silence_ms: 500 },
        })
        .await;
        assert!(matches!(session_rx.recv().await, Some(ClientFrame::Event(_))));
        assert!(observer_rx.try_recv().is_err());

        bus.emit(session_id, Uuid::new_v4(), EventKind::PartialTranscript {
            text: "hi".to_string(),
        })
        .await;
        let _ = session_rx.recv().await;
        assert!(observer_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn binary_emission_never_touches_the_observer_channel() {
        let (bus, mut session_rx, mut observer_rx) = bus();
        bus.emit_binary(Uuid::new_v4(), vec![1, 2, 3]).await;
        assert!(matches!(session_rx.recv().await, Some(ClientFrame::Binary(b)) if b == vec![1, 2, 3]));
        assert!(observer_rx.try_recv().is_err());
    }
}
