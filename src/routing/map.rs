//! The trigger-transition routing table.

use crate::condition::Condition;
use crate::routing::{Transition, TransitionId};
use crate::tree::{StateId, StateTree};
use crate::trigger::TriggerTag;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Parameter token matching any parameter.
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchScore {
    Exact,
    Wildcard,
}

/// Score a registered parameter against a queried one.
///
/// A registered `None` only matches a queried `None`. A registered wildcard
/// matches any query, including `None`; a registered concrete parameter
/// matches an equal query or a wildcard query.
fn score_param(registered: Option<&str>, query: Option<&str>) -> Option<MatchScore> {
    match registered {
        None => match query {
            None => Some(MatchScore::Exact),
            Some(_) => None,
        },
        Some(registered) => {
            if query == Some(registered) {
                Some(MatchScore::Exact)
            } else if registered == WILDCARD || query == Some(WILDCARD) {
                Some(MatchScore::Wildcard)
            } else {
                None
            }
        }
    }
}

struct MapEntry {
    tag: TriggerTag,
    param: Option<String>,
    transitions: Vec<TransitionId>,
}

impl MapEntry {
    fn matches(&self, tag: &TriggerTag, param: Option<&str>) -> bool {
        self.tag.accepts(tag) && score_param(self.param.as_deref(), param).is_some()
    }
}

struct ConditionEntry {
    tag: TriggerTag,
    param: Option<String>,
    transition: TransitionId,
    condition: Condition,
}

/// Routes (trigger tag, parameter) pairs to transitions.
///
/// Entries keep registration order; lookups return insertion-ordered,
/// de-duplicated unions over every matching key. The map also carries
/// per-mapping conditions, an exit-state index, and each transition's
/// precomputed guaranteed-active entry states, which back the viability
/// search.
#[derive(Default)]
pub struct TriggerTransitionMap {
    entries: Vec<MapEntry>,
    conditions: Vec<ConditionEntry>,
    exit_index: HashMap<StateId, Vec<TransitionId>>,
    entry_states: HashMap<TransitionId, BTreeSet<StateId>>,
}

impl TriggerTransitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that pulling a trigger with this tag and parameter causes
    /// `id`, optionally gated by a condition.
    ///
    /// The transition's guaranteed-active entry states are computed eagerly
    /// against the tree as wired at registration time.
    pub fn add(
        &mut self,
        tag: TriggerTag,
        param: Option<&str>,
        id: TransitionId,
        transition: &Transition,
        tree: &StateTree,
        condition: Option<Condition>,
    ) {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.tag == tag && e.param.as_deref() == param);
        match entry {
            Some(entry) => {
                if !entry.transitions.contains(&id) {
                    entry.transitions.push(id);
                }
            }
            None => self.entries.push(MapEntry {
                tag,
                param: param.map(str::to_owned),
                transitions: vec![id],
            }),
        }

        if let Some(condition) = condition {
            self.conditions.push(ConditionEntry {
                tag,
                param: param.map(str::to_owned),
                transition: id,
                condition,
            });
        }

        let exiting = self.exit_index.entry(transition.exit()).or_default();
        if !exiting.contains(&id) {
            exiting.push(id);
        }

        self.entry_states
            .insert(id, guaranteed_entry_states(tree, transition.entry()));
    }

    /// Remove every trace of a transition from the map.
    pub fn remove_transition(&mut self, id: TransitionId) {
        for entry in &mut self.entries {
            entry.transitions.retain(|&t| t != id);
        }
        self.entries.retain(|e| !e.transitions.is_empty());
        self.conditions.retain(|c| c.transition != id);
        for exiting in self.exit_index.values_mut() {
            exiting.retain(|&t| t != id);
        }
        self.entry_states.remove(&id);
    }

    /// Every transition caused by a trigger with this tag and parameter:
    /// the insertion-ordered, de-duplicated union over all matching keys.
    pub fn transitions_for(&self, tag: &TriggerTag, param: Option<&str>) -> Vec<TransitionId> {
        let mut out = Vec::new();
        for entry in self.entries.iter().filter(|e| e.matches(tag, param)) {
            for &id in &entry.transitions {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        out
    }

    /// The condition gating a specific transition under this tag and
    /// parameter, if one was registered. Scoring is the same as for
    /// [`transitions_for`](Self::transitions_for) with exact transition
    /// identity required in addition.
    pub fn condition_for(
        &self,
        tag: &TriggerTag,
        id: TransitionId,
        param: Option<&str>,
    ) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| {
                c.transition == id
                    && c.tag.accepts(tag)
                    && score_param(c.param.as_deref(), param).is_some()
            })
            .map(|c| &c.condition)
    }

    /// Every parameter registered under a key whose tag accepts `tag`, in
    /// registration order without duplicates.
    pub fn parameters_for(&self, tag: &TriggerTag) -> Vec<Option<&str>> {
        let mut out = Vec::new();
        for entry in self.entries.iter().filter(|e| e.tag.accepts(tag)) {
            let param = entry.param.as_deref();
            if !out.contains(&param) {
                out.push(param);
            }
        }
        out
    }

    /// Whether any mapping matches this tag and parameter.
    pub fn is_supported(&self, tag: &TriggerTag, param: Option<&str>) -> bool {
        self.entries.iter().any(|e| e.matches(tag, param))
    }

    /// Transitions whose exit state is `state`, in registration order.
    pub fn transitions_exiting(&self, state: StateId) -> &[TransitionId] {
        self.exit_index
            .get(&state)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The states guaranteed active after a transition fires.
    pub fn entry_states(&self, id: TransitionId) -> Option<&BTreeSet<StateId>> {
        self.entry_states.get(&id)
    }

    /// Whether this tag/parameter pair could cause a transition now or after
    /// a chain of transitions caused by the same tag.
    ///
    /// Bounded depth-first search from each active state over its exiting
    /// transitions. A transition directly matching the query succeeds; one
    /// merely causable by the tag (under any parameter) is recursed into via
    /// its guaranteed-active entry states, visiting each transition at most
    /// once.
    pub fn is_parameter_viable(
        &self,
        tag: &TriggerTag,
        param: Option<&str>,
        active_states: &[StateId],
    ) -> bool {
        let mut visited = HashSet::new();
        active_states
            .iter()
            .any(|&state| self.viable_from(state, tag, param, &mut visited))
    }

    fn viable_from(
        &self,
        state: StateId,
        tag: &TriggerTag,
        param: Option<&str>,
        visited: &mut HashSet<TransitionId>,
    ) -> bool {
        for &id in self.transitions_exiting(state) {
            if visited.contains(&id) {
                continue;
            }
            if self
                .entries
                .iter()
                .any(|e| e.matches(tag, param) && e.transitions.contains(&id))
            {
                return true;
            }
            let causable = self
                .entries
                .iter()
                .any(|e| e.tag.accepts(tag) && e.transitions.contains(&id));
            if causable {
                visited.insert(id);
                if let Some(entry_states) = self.entry_states.get(&id) {
                    for &next in entry_states {
                        if self.viable_from(next, tag, param, visited) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}

/// The set of states guaranteed active once a transition enters `entry`:
/// the entry state and its default continuation, every ancestor, and for
/// concurrent nodes along the way the default continuations of all their
/// regions.
fn guaranteed_entry_states(tree: &StateTree, entry: StateId) -> BTreeSet<StateId> {
    let mut states = BTreeSet::new();
    collect_down(tree, entry, &mut states);
    let mut cursor = entry;
    while let Some(parent) = tree.parent(cursor) {
        states.insert(parent);
        if tree.is_concurrent(parent) {
            for &sibling in tree.children(parent) {
                if sibling != cursor {
                    collect_down(tree, sibling, &mut states);
                }
            }
        }
        cursor = parent;
    }
    states
}

fn collect_down(tree: &StateTree, id: StateId, states: &mut BTreeSet<StateId>) {
    if !states.insert(id) {
        return;
    }
    if tree.is_concurrent(id) {
        for &child in tree.children(id) {
            collect_down(tree, child, states);
        }
    } else if let Some(default) = tree.default_child(id) {
        collect_down(tree, default, states);
    }
}
