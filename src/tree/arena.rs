//! Arena-owned state tree and the transition activation protocol.

use crate::action::{remove_all, ParametricAction};
use crate::cookie::StateCookie;
use crate::error::ConfigError;
use crate::stateful::SharedStateful;
use crate::tree::node::{StateId, StateKind, StateNode};
use std::collections::{BTreeSet, VecDeque};
use tracing::trace;

/// Separator for elements in a state path name.
pub(crate) const PATH_SEPARATOR: char = '.';

/// A rooted tree of exclusive and concurrent states.
///
/// The tree owns every node; [`StateId`]s are stable handles into the arena.
/// A state may be active only if its parent is active; the root is always
/// active once the tree has been initialized. Exclusive states allow at most
/// one active child, concurrent states activate all children together.
///
/// All activation changes flow through [`fire_transition`]
/// (StateTree::fire_transition), [`activate_default`]
/// (StateTree::activate_default) or cookie restoration. During a transition
/// firing, entry actions run exactly once per inactive-to-active flip and
/// exit actions once per active-to-inactive flip; default activation and
/// cookie restoration run no actions.
pub struct StateTree {
    nodes: Vec<StateNode>,
    root: StateId,
}

impl StateTree {
    /// Create a tree with an exclusive, non-history root state.
    pub fn new(root_name: &str) -> Result<Self, ConfigError> {
        let root = StateNode::new(root_name, StateKind::exclusive(false), false)?;
        Ok(Self {
            nodes: vec![root],
            root: StateId(0),
        })
    }

    /// The root state.
    pub fn root(&self) -> StateId {
        self.root
    }

    /// Whether `id` refers to a node in this tree.
    pub fn contains(&self, id: StateId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Create an unparented exclusive state.
    pub fn insert_exclusive(
        &mut self,
        name: &str,
        history: bool,
        deep_history: bool,
    ) -> Result<StateId, ConfigError> {
        let node = StateNode::new(name, StateKind::exclusive(history), deep_history)?;
        self.nodes.push(node);
        Ok(StateId(self.nodes.len() - 1))
    }

    /// Create an unparented concurrent state.
    pub fn insert_concurrent(
        &mut self,
        name: &str,
        deep_history: bool,
    ) -> Result<StateId, ConfigError> {
        let node = StateNode::new(name, StateKind::Concurrent, deep_history)?;
        self.nodes.push(node);
        Ok(StateId(self.nodes.len() - 1))
    }

    /// Make `child` a child of `parent`.
    ///
    /// Returns `false` if `child` was already a child of `parent`. A child
    /// currently parented elsewhere is re-parented; cached path names below
    /// `child` are invalidated.
    pub fn add_child(&mut self, parent: StateId, child: StateId) -> bool {
        if self.nodes[parent.0].children.contains(&child) {
            return false;
        }
        if let Some(old_parent) = self.nodes[child.0].parent {
            self.nodes[old_parent.0].children.retain(|&c| c != child);
        }
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.invalidate_path_names(child);
        true
    }

    /// Remove `child` from `parent`'s children, severing the parent link.
    pub fn remove_child(&mut self, parent: StateId, child: StateId) {
        if self.nodes[child.0].parent == Some(parent) {
            self.nodes[child.0].parent = None;
        }
        self.nodes[parent.0].children.retain(|&c| c != child);
        self.invalidate_path_names(child);
    }

    fn invalidate_path_names(&mut self, id: StateId) {
        self.nodes[id.0].path_name.take();
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.invalidate_path_names(child);
        }
    }

    /// Set the default child of an exclusive state, returning the previous
    /// default. The child must be `None` or a current child of `state`.
    pub fn set_default_child(
        &mut self,
        state: StateId,
        child: Option<StateId>,
    ) -> Result<Option<StateId>, ConfigError> {
        if let Some(c) = child {
            if !self.nodes[state.0].children.contains(&c) {
                return Err(ConfigError::new(
                    "default child must actually be a child state, or None",
                ));
            }
        }
        match self.nodes[state.0].kind {
            StateKind::Exclusive {
                ref mut default_child,
                ..
            } => Ok(std::mem::replace(default_child, child)),
            StateKind::Concurrent => Err(ConfigError::new(
                "concurrent states do not have a default child",
            )),
        }
    }

    /// Control whether an exclusive state observes shallow history. Returns
    /// the previous value; a no-op `false` for concurrent states.
    pub fn set_history(&mut self, state: StateId, observe: bool) -> bool {
        match self.nodes[state.0].kind {
            StateKind::Exclusive {
                ref mut history, ..
            } => std::mem::replace(history, observe),
            StateKind::Concurrent => false,
        }
    }

    pub fn name(&self, id: StateId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: StateId) -> Option<StateId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: StateId) -> &[StateId] {
        &self.nodes[id.0].children
    }

    pub fn is_active(&self, id: StateId) -> bool {
        self.nodes[id.0].active
    }

    pub fn is_concurrent(&self, id: StateId) -> bool {
        self.nodes[id.0].is_concurrent()
    }

    pub fn is_deep_history(&self, id: StateId) -> bool {
        self.nodes[id.0].deep_history
    }

    pub fn default_child(&self, id: StateId) -> Option<StateId> {
        self.nodes[id.0].default_child()
    }

    /// The child active when this exclusive state was last active, if any.
    pub fn history_child(&self, id: StateId) -> Option<StateId> {
        self.nodes[id.0].history_child()
    }

    /// The currently active child of an exclusive state, if any.
    pub fn active_child(&self, id: StateId) -> Option<StateId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].active)
    }

    /// The path from the root to `id`, inclusive.
    pub fn path(&self, id: StateId) -> Vec<StateId> {
        let mut path = vec![id];
        let mut cursor = self.nodes[id.0].parent;
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.nodes[parent.0].parent;
        }
        path.reverse();
        path
    }

    /// Dotted path name of a state, excluding the root. The root's own path
    /// name is the empty string. Cached on first use.
    pub fn path_name(&self, id: StateId) -> &str {
        self.nodes[id.0].path_name.get_or_init(|| {
            let mut names = Vec::new();
            let mut cursor = id;
            while let Some(parent) = self.nodes[cursor.0].parent {
                names.push(self.nodes[cursor.0].name.as_str());
                cursor = parent;
            }
            names.reverse();
            names.join(&PATH_SEPARATOR.to_string())
        })
    }

    /// Find a state by its dotted path name. Empty segments are ignored; an
    /// empty path resolves to the root.
    pub fn find_by_path(&self, dotted_name: &str) -> Option<StateId> {
        let mut cursor = self.root;
        for segment in dotted_name.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            cursor = self.nodes[cursor.0]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c.0].name == segment)?;
        }
        Some(cursor)
    }

    /// Every currently active state, root included, in preorder.
    pub fn active_states(&self) -> Vec<StateId> {
        let mut actives = Vec::new();
        self.walk_active(self.root, &mut actives);
        actives
    }

    fn walk_active(&self, id: StateId, actives: &mut Vec<StateId>) {
        if self.nodes[id.0].active {
            actives.push(id);
        }
        for &child in &self.nodes[id.0].children {
            self.walk_active(child, actives);
        }
    }

    // --- entry/exit action lists -------------------------------------------

    pub fn entry_actions(&self, id: StateId) -> &[ParametricAction] {
        &self.nodes[id.0].entry_actions
    }

    pub fn exit_actions(&self, id: StateId) -> &[ParametricAction] {
        &self.nodes[id.0].exit_actions
    }

    /// Append an entry action. The same action may appear more than once.
    pub fn add_entry_action(&mut self, id: StateId, action: ParametricAction) {
        self.nodes[id.0].entry_actions.push(action);
    }

    pub fn insert_entry_action(&mut self, id: StateId, index: usize, action: ParametricAction) {
        self.nodes[id.0].entry_actions.insert(index, action);
    }

    /// Replace the entry action at `index`, returning the previous one.
    pub fn set_entry_action(
        &mut self,
        id: StateId,
        index: usize,
        action: ParametricAction,
    ) -> ParametricAction {
        std::mem::replace(&mut self.nodes[id.0].entry_actions[index], action)
    }

    pub fn remove_entry_action_at(&mut self, id: StateId, index: usize) -> ParametricAction {
        self.nodes[id.0].entry_actions.remove(index)
    }

    /// Remove every occurrence of `action` from the entry list. Returns
    /// whether the list was modified.
    pub fn remove_entry_action(&mut self, id: StateId, action: &ParametricAction) -> bool {
        remove_all(&mut self.nodes[id.0].entry_actions, action)
    }

    /// Append an exit action. The same action may appear more than once.
    pub fn add_exit_action(&mut self, id: StateId, action: ParametricAction) {
        self.nodes[id.0].exit_actions.push(action);
    }

    pub fn insert_exit_action(&mut self, id: StateId, index: usize, action: ParametricAction) {
        self.nodes[id.0].exit_actions.insert(index, action);
    }

    /// Replace the exit action at `index`, returning the previous one.
    pub fn set_exit_action(
        &mut self,
        id: StateId,
        index: usize,
        action: ParametricAction,
    ) -> ParametricAction {
        std::mem::replace(&mut self.nodes[id.0].exit_actions[index], action)
    }

    pub fn remove_exit_action_at(&mut self, id: StateId, index: usize) -> ParametricAction {
        self.nodes[id.0].exit_actions.remove(index)
    }

    /// Remove every occurrence of `action` from the exit list. Returns
    /// whether the list was modified.
    pub fn remove_exit_action(&mut self, id: StateId, action: &ParametricAction) -> bool {
        remove_all(&mut self.nodes[id.0].exit_actions, action)
    }

    // --- reset / snapshot --------------------------------------------------

    /// Clear activation throughout the tree. Exclusive states also forget
    /// their history children.
    pub fn reset(&mut self) {
        self.reset_node(self.root);
    }

    fn reset_node(&mut self, id: StateId) {
        self.nodes[id.0].active = false;
        self.nodes[id.0].set_history_child(None);
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.reset_node(child);
        }
    }

    /// Initialize activation and history from a snapshot.
    ///
    /// An exclusive state pulls its history child from the cookie only when
    /// it is not active at that moment: activation and inherited history are
    /// mutually exclusive per node at init time. The root is always active.
    pub fn init_from_cookie(&mut self, cookie: &StateCookie) {
        self.init_node_from_cookie(self.root, cookie);
    }

    fn init_node_from_cookie(&mut self, id: StateId, cookie: &StateCookie) {
        if !self.nodes[id.0].is_concurrent() && !self.nodes[id.0].active {
            let remembered = self.nodes[id.0]
                .children
                .clone()
                .into_iter()
                .find(|&c| cookie.is_history(self.path_name(c)));
            self.nodes[id.0].set_history_child(remembered);
        }
        let active = cookie.is_active(self.path_name(id)) || self.nodes[id.0].parent.is_none();
        self.nodes[id.0].active = active;
        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.init_node_from_cookie(child, cookie);
        }
    }

    /// Fill a cookie with a snapshot of the current activation and history,
    /// replacing any previous contents.
    pub fn fill_cookie(&self, cookie: &mut StateCookie) {
        let mut active = BTreeSet::new();
        let mut history = BTreeSet::new();
        self.fill_state_sets(self.root, &mut active, &mut history);
        cookie.set_active_states(active);
        cookie.set_history_states(history);
    }

    fn fill_state_sets(
        &self,
        id: StateId,
        active: &mut BTreeSet<String>,
        history: &mut BTreeSet<String>,
    ) {
        let node = &self.nodes[id.0];
        if !node.active {
            if let Some(remembered) = node.history_child() {
                history.insert(self.path_name(remembered).to_owned());
            }
        }
        if node.active && node.parent.is_some() {
            active.insert(self.path_name(id).to_owned());
        }
        for &child in &node.children {
            self.fill_state_sets(child, active, history);
        }
    }

    // --- activation --------------------------------------------------------

    /// Activate the root and its default/history continuation, as for a
    /// freshly created stateful. Nothing is attached at initialization time,
    /// so no entry actions run.
    pub fn activate_default(&mut self) {
        self.activate_continuation(self.root, false, None);
    }

    /// Apply a fired transition to this tree.
    ///
    /// If the entry state is already active, only the transition's own
    /// actions run: a self or no-op transition never fires entry or exit
    /// actions. Otherwise the nearest active ancestor (NAA) of the entry
    /// state performs any needed deactivation, the transition actions run,
    /// and the remaining path from the NAA down to the entry state is
    /// activated.
    pub fn fire_transition(
        &mut self,
        entry: StateId,
        transition_actions: &[ParametricAction],
        stateful: Option<&SharedStateful>,
    ) {
        if self.nodes[entry.0].active {
            run_actions(transition_actions, stateful);
            return;
        }

        let mut path: VecDeque<StateId> = self.path(entry).into();
        // The NAA is the last node removed while the next one is active.
        let mut naa = match path.pop_front() {
            Some(root) => root,
            None => return,
        };
        while let Some(&next) = path.front() {
            if !self.nodes[next.0].active {
                break;
            }
            path.pop_front();
            naa = next;
        }
        trace!(
            entry = self.path_name(entry),
            naa = self.path_name(naa),
            "firing transition"
        );

        self.naa_deactivate_as_needed(naa, stateful);
        run_actions(transition_actions, stateful);
        self.naa_activate_path(naa, path, stateful);
    }

    /// Deactivations required before entering a descendant of the NAA.
    ///
    /// An exclusive NAA deactivates its one active child, deepest first. A
    /// concurrent NAA deactivates nothing: entering one region never loses
    /// the other active regions.
    fn naa_deactivate_as_needed(&mut self, naa: StateId, stateful: Option<&SharedStateful>) {
        if self.nodes[naa.0].is_concurrent() {
            return;
        }
        if let Some(child) = self.active_child(naa) {
            self.deactivate(child, stateful);
        }
    }

    /// Deactivate a state bottom-up: children first, then exit actions, then
    /// the inactive mark.
    fn deactivate(&mut self, id: StateId, stateful: Option<&SharedStateful>) {
        if self.nodes[id.0].is_concurrent() {
            let children = self.nodes[id.0].children.clone();
            for child in children {
                self.deactivate(child, stateful);
            }
        } else if let Some(child) = self.active_child(id) {
            self.deactivate(child, stateful);
        }
        run_actions(&self.nodes[id.0].exit_actions, stateful);
        self.nodes[id.0].active = false;
    }

    /// Activate the path below the NAA. The path begins with a child of the
    /// NAA and ends with the entry state.
    fn naa_activate_path(
        &mut self,
        naa: StateId,
        mut path: VecDeque<StateId>,
        stateful: Option<&SharedStateful>,
    ) {
        if let Some(head) = path.pop_front() {
            if !self.nodes[naa.0].is_concurrent() {
                self.nodes[naa.0].set_history_child(Some(head));
            }
            self.activate_path(head, path, stateful);
        }
    }

    /// Activate this state and the given path of descendants, consuming the
    /// path head at each level.
    fn activate_path(
        &mut self,
        id: StateId,
        mut path: VecDeque<StateId>,
        stateful: Option<&SharedStateful>,
    ) {
        self.mark_active(id, stateful);
        match path.pop_front() {
            Some(head) => {
                if self.nodes[id.0].is_concurrent() {
                    self.activate_children(id, Some(head), false, stateful);
                } else {
                    self.nodes[id.0].set_history_child(Some(head));
                }
                self.activate_path(head, path, stateful);
            }
            None => {
                let deep = self.nodes[id.0].deep_history;
                self.continue_below(id, deep, stateful);
            }
        }
    }

    /// Activate this state and its history/default continuation.
    fn activate_continuation(
        &mut self,
        id: StateId,
        observe_deep_history: bool,
        stateful: Option<&SharedStateful>,
    ) {
        self.mark_active(id, stateful);
        let observe = observe_deep_history || self.nodes[id.0].deep_history;
        self.continue_below(id, observe, stateful);
    }

    /// Continue activation below a state once the explicit path is consumed.
    fn continue_below(
        &mut self,
        id: StateId,
        observe_deep_history: bool,
        stateful: Option<&SharedStateful>,
    ) {
        match self.nodes[id.0].kind {
            StateKind::Exclusive {
                history,
                history_child,
                default_child,
            } => {
                let remembered = if history || observe_deep_history {
                    history_child
                } else {
                    None
                };
                if let Some(remembered) = remembered {
                    self.activate_continuation(remembered, observe_deep_history, stateful);
                } else if let Some(default) = default_child {
                    self.nodes[id.0].set_history_child(Some(default));
                    self.activate_continuation(default, false, stateful);
                }
            }
            StateKind::Concurrent => {
                self.activate_children(id, None, observe_deep_history, stateful);
            }
        }
    }

    /// Activate every child of a concurrent state except the one covered by
    /// an explicit entry path.
    fn activate_children(
        &mut self,
        id: StateId,
        skip: Option<StateId>,
        observe_deep_history: bool,
        stateful: Option<&SharedStateful>,
    ) {
        let children = self.nodes[id.0].children.clone();
        for child in children {
            if Some(child) != skip {
                self.activate_continuation(child, observe_deep_history, stateful);
            }
        }
    }

    /// Mark a state active, firing entry actions only on the flip.
    fn mark_active(&mut self, id: StateId, stateful: Option<&SharedStateful>) {
        if !self.nodes[id.0].active {
            self.nodes[id.0].active = true;
            run_actions(&self.nodes[id.0].entry_actions, stateful);
        }
    }

    // --- display -----------------------------------------------------------

    /// A display string of the active states, children of exclusive states
    /// dot-joined and children of concurrent states comma-joined in
    /// brackets, e.g. `C[D.E,G.H]`.
    ///
    /// For logging only. This form omits history and must never be parsed
    /// back into state; persist a [`StateCookie`] instead.
    pub fn active_state_string(&self) -> String {
        self.render_children(self.root, false)
    }

    /// A display string of every state in the tree, with no indication of
    /// activation. For logging only.
    pub fn all_state_string(&self) -> String {
        self.render_children(self.root, true)
    }

    fn render_children(&self, id: StateId, include_inactive: bool) -> String {
        let mut parts = Vec::new();
        for &child in &self.nodes[id.0].children {
            let node = &self.nodes[child.0];
            if !include_inactive && !node.active {
                continue;
            }
            let mut rendered = node.name.clone();
            if !node.children.is_empty() {
                let inner = self.render_children(child, include_inactive);
                if !inner.is_empty() {
                    let bracketed = (node.is_concurrent() || include_inactive)
                        && node.children.len() > 1;
                    if bracketed {
                        rendered = format!("{rendered}[{inner}]");
                    } else {
                        rendered = format!("{rendered}{PATH_SEPARATOR}{inner}");
                    }
                }
            }
            parts.push(rendered);
        }
        let separator = if self.nodes[id.0].is_concurrent() || include_inactive {
            ","
        } else {
            ""
        };
        parts.join(separator)
    }
}

fn run_actions(actions: &[ParametricAction], stateful: Option<&SharedStateful>) {
    if let Some(stateful) = stateful {
        for action in actions {
            action.execute(stateful);
        }
    }
}
