//! Event rate limiting shared by the worker and the per-frame path.

use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Default)]
struct DebounceState {
    last_label: Option<String>,
    last_emit: Option<Instant>,
}

/// Suppresses repeated events for the same identity.
///
/// One instance lives for the whole process and is consulted by every
/// recognition path, so a visitor standing in front of both the worker's
/// camera and a client-submitted frame still produces one event per
/// interval. The check-and-update is a single atomic step under the mutex.
pub struct EventDebouncer {
    min_interval: Duration,
    state: Mutex<DebounceState>,
}

impl EventDebouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(DebounceState::default()),
        }
    }

    /// Whether an event for `label` should be emitted at `now`.
    ///
    /// Emits when the identity differs from the last emitted one, or when
    /// the interval has elapsed since the last emission. A positive answer
    /// records the emission.
    pub fn should_emit(&self, label: &str, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        let due = match (&state.last_label, state.last_emit) {
            (Some(last), Some(at)) => {
                last != label || now.duration_since(at) >= self.min_interval
            }
            _ => true,
        };
        if due {
            state.last_label = Some(label.to_string());
            state.last_emit = Some(now);
        }
        due
    }
}
