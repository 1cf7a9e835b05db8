//! Transitions between states.

use crate::action::{remove_all, ParametricAction};
use crate::stateful::SharedStateful;
use crate::tree::{StateId, StateTree};

/// Stable handle to a transition registered with a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId(pub(crate) usize);

/// A named edge from an exit state to an entry state, carrying an ordered
/// list of actions run during the transition phase of firing.
///
/// The ranked-state list is a priority order used only for rank queries; it
/// plays no part in activation.
pub struct Transition {
    name: String,
    exit: StateId,
    entry: StateId,
    actions: Vec<ParametricAction>,
    ranked_states: Vec<StateId>,
}

impl Transition {
    pub fn new(name: impl Into<String>, exit: StateId, entry: StateId) -> Self {
        Self {
            name: name.into(),
            exit,
            entry,
            actions: Vec::new(),
            ranked_states: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exit(&self) -> StateId {
        self.exit
    }

    pub fn entry(&self) -> StateId {
        self.entry
    }

    pub fn actions(&self) -> &[ParametricAction] {
        &self.actions
    }

    /// Whether this transition may fire: its exit state is active.
    pub fn can_fire(&self, tree: &StateTree) -> bool {
        tree.is_active(self.exit)
    }

    /// Fire this transition, delegating activation to the tree.
    pub fn fire(&self, tree: &mut StateTree, stateful: Option<&SharedStateful>) {
        tree.fire_transition(self.entry, &self.actions, stateful);
    }

    pub fn add_action(&mut self, action: ParametricAction) {
        self.actions.push(action);
    }

    pub fn insert_action(&mut self, index: usize, action: ParametricAction) {
        self.actions.insert(index, action);
    }

    /// Replace the action at `index`, returning the previous one.
    pub fn set_action(&mut self, index: usize, action: ParametricAction) -> ParametricAction {
        std::mem::replace(&mut self.actions[index], action)
    }

    pub fn remove_action_at(&mut self, index: usize) -> ParametricAction {
        self.actions.remove(index)
    }

    /// Remove every occurrence of `action`. Returns whether the list was
    /// modified.
    pub fn remove_action(&mut self, action: &ParametricAction) -> bool {
        remove_all(&mut self.actions, action)
    }

    /// Append a state to the ranked-state priority list. Returns `false` if
    /// the state is already ranked.
    pub fn add_ranked_state(&mut self, state: StateId) -> bool {
        if self.ranked_states.contains(&state) {
            return false;
        }
        self.ranked_states.push(state);
        true
    }

    pub fn ranked_states(&self) -> &[StateId] {
        &self.ranked_states
    }
}
