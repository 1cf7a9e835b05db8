//! Individual state nodes.

use crate::action::ParametricAction;
use crate::error::ConfigError;
use std::cell::OnceCell;

/// Stable handle to a state in a [`StateTree`](super::StateTree) arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(pub(crate) usize);

/// What kind of composite a state is.
///
/// Kind-specific behavior (activation continuation, deactivation fan-out,
/// history bookkeeping) dispatches on this variant.
#[derive(Clone, Debug)]
pub enum StateKind {
    /// At most one child may be active at a time.
    Exclusive {
        /// Whether this state restores its last active child on re-entry
        /// (shallow history).
        history: bool,
        /// The child active when this state was last active. Maintained even
        /// when `history` is off, since an ancestor may enforce deep history.
        history_child: Option<StateId>,
        /// Child activated in the absence of any history.
        default_child: Option<StateId>,
    },
    /// All children are active whenever the state is active.
    Concurrent,
}

impl StateKind {
    pub(crate) fn exclusive(history: bool) -> Self {
        StateKind::Exclusive {
            history,
            history_child: None,
            default_child: None,
        }
    }
}

pub(crate) struct StateNode {
    pub(crate) name: String,
    pub(crate) parent: Option<StateId>,
    pub(crate) children: Vec<StateId>,
    pub(crate) kind: StateKind,
    pub(crate) active: bool,
    pub(crate) deep_history: bool,
    pub(crate) entry_actions: Vec<ParametricAction>,
    pub(crate) exit_actions: Vec<ParametricAction>,
    pub(crate) path_name: OnceCell<String>,
}

impl StateNode {
    pub(crate) fn new(name: &str, kind: StateKind, deep_history: bool) -> Result<Self, ConfigError> {
        if !is_legal_state_name(name) {
            return Err(ConfigError::new(format!(
                "state names must be nonzero length and may not contain '.', ' ', \
                 '[', ']', tabs or newlines: {name:?}"
            )));
        }
        Ok(Self {
            name: name.to_owned(),
            parent: None,
            children: Vec::new(),
            kind,
            active: false,
            deep_history,
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
            path_name: OnceCell::new(),
        })
    }

    pub(crate) fn is_concurrent(&self) -> bool {
        matches!(self.kind, StateKind::Concurrent)
    }

    pub(crate) fn history_child(&self) -> Option<StateId> {
        match self.kind {
            StateKind::Exclusive { history_child, .. } => history_child,
            StateKind::Concurrent => None,
        }
    }

    pub(crate) fn set_history_child(&mut self, child: Option<StateId>) {
        if let StateKind::Exclusive {
            ref mut history_child,
            ..
        } = self.kind
        {
            *history_child = child;
        }
    }

    pub(crate) fn default_child(&self) -> Option<StateId> {
        match self.kind {
            StateKind::Exclusive { default_child, .. } => default_child,
            StateKind::Concurrent => None,
        }
    }
}

fn is_legal_state_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', ' ', '[', ']', '\t', '\n'])
}
