//! Durable snapshots of state activation and history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A snapshot of a state machine's activation and history.
///
/// A cookie holds two sets of dotted state path names: the states that were
/// active when the snapshot was taken (the root is never recorded), and the
/// remembered history children of exclusive states that were inactive at the
/// time. Cookies are what gets persisted; the display strings produced by
/// [`StateMachine`](crate::machine::StateMachine) are for logging only and
/// must never be parsed back into state.
///
/// A machine fills a cookie after initialization and after any successful
/// trigger pull, and reads it back when a stateful is re-attached.
///
/// # Example
///
/// ```rust
/// use strata::cookie::StateCookie;
///
/// let mut cookie = StateCookie::new();
/// assert!(cookie.is_new());
///
/// cookie.set_active("open");
/// cookie.set_active("open.shipped");
/// assert!(!cookie.is_new());
/// assert!(cookie.is_active("open.shipped"));
/// assert!(!cookie.is_active("open.cancelled"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCookie {
    active: BTreeSet<String>,
    history: BTreeSet<String>,
}

impl StateCookie {
    /// Create an empty (new) cookie.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no state has ever been set active on this cookie.
    ///
    /// Distinguishes "freshly created, needs default initialization" from a
    /// restored snapshot. A settled machine always has at least one active
    /// state below the root, so an empty active set can only mean new.
    pub fn is_new(&self) -> bool {
        self.active.is_empty()
    }

    /// Remove all active and history records.
    pub fn clear(&mut self) {
        self.active.clear();
        self.history.clear();
    }

    /// Whether the given path name was active in this snapshot.
    pub fn is_active(&self, path_name: &str) -> bool {
        self.active.contains(path_name)
    }

    /// Mark a path name active.
    pub fn set_active(&mut self, path_name: impl Into<String>) {
        self.active.insert(path_name.into());
    }

    /// Replace the active set wholesale.
    pub fn set_active_states(&mut self, states: BTreeSet<String>) {
        self.active = states;
    }

    /// Whether the given path name is a remembered history child.
    pub fn is_history(&self, path_name: &str) -> bool {
        self.history.contains(path_name)
    }

    /// Record a path name as a remembered history child.
    pub fn set_history(&mut self, path_name: impl Into<String>) {
        self.history.insert(path_name.into());
    }

    /// Replace the history set wholesale.
    pub fn set_history_states(&mut self, states: BTreeSet<String>) {
        self.history = states;
    }

    /// The active state path names in this snapshot.
    pub fn active_state_path_names(&self) -> &BTreeSet<String> {
        &self.active
    }

    /// The history state path names in this snapshot.
    pub fn history_state_path_names(&self) -> &BTreeSet<String> {
        &self.history
    }
}
