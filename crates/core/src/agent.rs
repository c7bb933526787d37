//! Run state and the container that owns it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, warn};

use crate::event::Observer;

/// Lifecycle status of a run.
///
/// `Idle → Running → {Completed | Cancelled | Error}`; terminal statuses are final.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        if *self == next {
            return true;
        }
        match self {
            Self::Idle => true,
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Cancelled | Self::Error => false,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of one run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub status: RunStatus,
    /// Step currently executing (1-based), or the last one executed.
    pub current_step: u32,
    pub max_steps: u32,
    /// Sum of backend-reported `total_tokens` across the run
    pub total_tokens: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub step_start_time: Option<DateTime<Utc>>,
    pub last_response: Option<String>,
    pub last_error: Option<String>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, max_steps: u32) -> Self {
        Self {
            run_id: run_id.into(),
            status: RunStatus::Idle,
            current_step: 0,
            max_steps,
            total_tokens: 0,
            start_time: None,
            step_start_time: None,
            last_response: None,
            last_error: None,
        }
    }
}

/// Single-writer owner of a [`RunState`].
///
/// Every [`update`](Self::update) applies the whole mutation first and only
/// then notifies subscribers, so they never observe a partial state.
pub struct StateContainer {
    state: RunState,
    subscribers: Vec<Arc<dyn Observer>>,
}

impl StateContainer {
    pub fn new(state: RunState, subscribers: Vec<Arc<dyn Observer>>) -> Self {
        Self { state, subscribers }
    }

    /// Read-only view of the current state.
    pub fn get(&self) -> &RunState {
        &self.state
    }

    /// An owned copy of the current state.
    pub fn snapshot(&self) -> RunState {
        self.state.clone()
    }

    /// Mutate the state and notify subscribers with the result.
    ///
    /// A status change that would leave a terminal status, or otherwise break
    /// the lifecycle, is dropped while the rest of the mutation is kept.
    pub fn update(&mut self, mutate: impl FnOnce(&mut RunState)) {
        let previous = self.state.status;
        let mut next = self.state.clone();
        mutate(&mut next);

        if !previous.can_transition_to(next.status) {
            warn!(
                run_id = %next.run_id,
                from = %previous,
                to = %next.status,
                "Ignoring invalid run status transition"
            );
            next.status = previous;
        }

        self.state = next;
        self.notify();
    }

    fn notify(&self) {
        for (idx, subscriber) in self.subscribers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| subscriber.on_state_change(&self.state))).is_err() {
                error!(
                    observer = idx,
                    run_id = %self.state.run_id,
                    "Observer panicked while handling state change; suppressed"
                );
            }
        }
    }
}

impl std::fmt::Debug for StateContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContainer")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
