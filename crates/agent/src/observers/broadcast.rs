//! Forwards run events to a tokio broadcast channel and state to a watch channel.

use stepwise_core::agent::RunState;
use stepwise_core::event::{AgentEvent, Observer};
use tokio::sync::{broadcast, watch};
use tracing::trace;

/// Non-blocking hand-off of events to async consumers.
///
/// Events go into a bounded `broadcast` channel so a slow web socket or SSE
/// client lags (and eventually misses events) instead of stalling the loop.
/// The latest state snapshot is kept in a `watch` channel.
pub struct BroadcastObserver {
    events: broadcast::Sender<AgentEvent>,
    state: watch::Sender<Option<RunState>>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (state, _) = watch::channel(None);
        Self { events, state }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<Option<RunState>> {
        self.state.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Observer for BroadcastObserver {
    fn on_event(&self, event: &AgentEvent) {
        if self.events.send(event.clone()).is_err() {
            trace!(kind = event.kind().as_str(), "No broadcast subscribers");
        }
    }

    fn on_state_change(&self, state: &RunState) {
        self.state.send_replace(Some(state.clone()));
    }
}
