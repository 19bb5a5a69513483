//! Upload tracking state.
//!
//! The coordinator keeps every piece of mutable state (tasks, results,
//! abort handles) in one `TrackingState` behind a mutex.

mod tracking;

pub use tracking::TrackingState;

use std::sync::{Mutex, MutexGuard};

/// Lock the tracking state, recovering it if a holder panicked
pub fn lock_state(state: &Mutex<TrackingState>) -> MutexGuard<'_, TrackingState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
