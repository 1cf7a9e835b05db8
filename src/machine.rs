//! The state machine façade.

use crate::action::PropertyValue;
use crate::condition::{Condition, ConditionError};
use crate::cookie::StateCookie;
use crate::error::ConfigError;
use crate::record::{FiredTransition, TransitionContext, TransitionRecordFactory};
use crate::routing::{Transition, TransitionId, TriggerTransitionMap};
use crate::stateful::SharedStateful;
use crate::tree::{StateId, StateTree};
use crate::trigger::{Trigger, TriggerTag};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Priority of a trigger/parameter pair against the current activation.
///
/// Orders from most to least urgent: a ranked pair beats an unranked one,
/// and both beat an inapplicable pair. Lower `Ranked` indexes are more
/// urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    /// At least one matching transition can fire and has an active state in
    /// its ranked list; carries the lowest such index.
    Ranked(usize),
    /// At least one matching transition can fire, but none of their ranked
    /// states is active.
    Unranked,
    /// No matching transition can fire.
    Inapplicable,
}

/// Failure during a trigger pull.
#[derive(Debug, Error)]
pub enum PullError {
    #[error("no stateful is attached to machine {machine:?}")]
    NotAttached { machine: String },
    #[error("condition evaluation failed")]
    Condition(#[from] ConditionError),
}

/// A wired statechart bound to at most one business object at a time.
///
/// The machine owns the state tree, the transitions, and the routing map.
/// Wiring happens up front through [`add_transition`](Self::add_transition)
/// and [`map_trigger`](Self::map_trigger); afterwards the machine is driven
/// by attaching statefuls and pulling triggers. A machine may be pooled:
/// detach one object and attach another, and activation is restored from the
/// new object's cookie.
pub struct StateMachine {
    name: String,
    description: Option<String>,
    tree: StateTree,
    transitions: Vec<Transition>,
    map: TriggerTransitionMap,
    possible_property_values: BTreeMap<String, Vec<String>>,
    default_property_values: Vec<PropertyValue>,
    stateful: Option<SharedStateful>,
}

impl StateMachine {
    /// Create a machine around an externally wired state tree.
    pub fn new(name: impl Into<String>, tree: StateTree) -> Self {
        Self {
            name: name.into(),
            description: None,
            tree,
            transitions: Vec::new(),
            map: TriggerTransitionMap::new(),
            possible_property_values: BTreeMap::new(),
            default_property_values: Vec::new(),
            stateful: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut StateTree {
        &mut self.tree
    }

    // --- wiring ------------------------------------------------------------

    /// Register a transition. Its exit and entry states must belong to this
    /// machine's tree.
    pub fn add_transition(&mut self, transition: Transition) -> Result<TransitionId, ConfigError> {
        if !self.tree.contains(transition.exit()) || !self.tree.contains(transition.entry()) {
            return Err(ConfigError::new(format!(
                "transition {:?} references a state outside machine {:?}",
                transition.name(),
                self.name
            )));
        }
        self.transitions.push(transition);
        Ok(TransitionId(self.transitions.len() - 1))
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id.0]
    }

    pub fn transition_mut(&mut self, id: TransitionId) -> &mut Transition {
        &mut self.transitions[id.0]
    }

    /// Look up a registered transition by name. Names are not required to be
    /// unique; the first registration wins.
    pub fn find_transition(&self, name: &str) -> Option<TransitionId> {
        self.transitions
            .iter()
            .position(|t| t.name() == name)
            .map(TransitionId)
    }

    /// Map a trigger tag and parameter to a transition.
    pub fn map_trigger(
        &mut self,
        tag: TriggerTag,
        param: Option<&str>,
        id: TransitionId,
    ) -> Result<(), ConfigError> {
        self.map_trigger_inner(tag, param, id, None)
    }

    /// Map a trigger tag and parameter to a transition, gated by a
    /// condition.
    pub fn map_trigger_with_condition(
        &mut self,
        tag: TriggerTag,
        param: Option<&str>,
        id: TransitionId,
        condition: Condition,
    ) -> Result<(), ConfigError> {
        self.map_trigger_inner(tag, param, id, Some(condition))
    }

    fn map_trigger_inner(
        &mut self,
        tag: TriggerTag,
        param: Option<&str>,
        id: TransitionId,
        condition: Option<Condition>,
    ) -> Result<(), ConfigError> {
        let transition = self.transitions.get(id.0).ok_or_else(|| {
            ConfigError::new(format!(
                "cannot map unknown transition in machine {:?}",
                self.name
            ))
        })?;
        self.map
            .add(tag, param, id, transition, &self.tree, condition);
        Ok(())
    }

    /// Remove a transition from the routing map. The transition itself
    /// remains registered but can no longer be caused by any trigger.
    pub fn unmap_transition(&mut self, id: TransitionId) {
        self.map.remove_transition(id);
    }

    /// Declare the values a property may take, for embedding applications
    /// that surface them.
    pub fn set_possible_values(&mut self, property: impl Into<String>, values: Vec<String>) {
        self.possible_property_values.insert(property.into(), values);
    }

    pub fn possible_values(&self, property: &str) -> Option<&[String]> {
        self.possible_property_values
            .get(property)
            .map(Vec::as_slice)
    }

    /// Add a property value pushed to every freshly attached stateful.
    pub fn add_default_property(&mut self, property: PropertyValue) {
        self.default_property_values.push(property);
    }

    pub fn default_properties(&self) -> &[PropertyValue] {
        &self.default_property_values
    }

    // --- lifecycle ---------------------------------------------------------

    /// Bind a stateful to this machine.
    ///
    /// The binding stays clear until activation settles, so attaching never
    /// fires entry or exit actions. A stateful whose cookie is new gets
    /// default activation, a pushed-back snapshot, and the machine's default
    /// property values; otherwise activation and history are restored from
    /// the cookie.
    pub fn attach_stateful(&mut self, stateful: SharedStateful) {
        self.stateful = None;
        let cookie = stateful.borrow().state_cookie();
        if cookie.is_new() {
            self.tree.reset();
            self.tree.activate_default();
            self.stateful = Some(stateful.clone());
            self.push_cookie();
            for property in &self.default_property_values {
                stateful
                    .borrow_mut()
                    .notify_property_changed(&property.name, &property.value);
            }
            debug!(
                machine = %self.name,
                active = %self.tree.active_state_string(),
                "initialized fresh stateful"
            );
        } else {
            self.tree.init_from_cookie(&cookie);
            self.stateful = Some(stateful);
            debug!(
                machine = %self.name,
                active = %self.tree.active_state_string(),
                "restored stateful from cookie"
            );
        }
    }

    /// Unbind the current stateful, if any.
    pub fn detach_stateful(&mut self) -> Option<SharedStateful> {
        self.stateful.take()
    }

    pub fn stateful(&self) -> Option<&SharedStateful> {
        self.stateful.as_ref()
    }

    /// Snapshot the current activation and history.
    pub fn snapshot(&self) -> StateCookie {
        let mut cookie = StateCookie::new();
        self.tree.fill_cookie(&mut cookie);
        cookie
    }

    fn push_cookie(&self) {
        if let Some(stateful) = &self.stateful {
            stateful.borrow_mut().update_state_cookie(self.snapshot());
        }
    }

    // --- trigger pulls -----------------------------------------------------

    /// Pull a trigger with an optional parameter.
    ///
    /// Every transition routed for the trigger's tag and parameter is
    /// considered in registration order. Fireability is rechecked per
    /// candidate against the evolving activation, the trigger is asked with
    /// the bound stateful, the parameter and each candidate's mapped
    /// condition, and each firing is offered to the record factory with the
    /// caller's context. Returns whether anything fired; a
    /// snapshot is pushed to the stateful only after at least one firing.
    pub fn pull_trigger(
        &mut self,
        trigger: &dyn Trigger,
        param: Option<&str>,
        mut recorder: Option<&mut dyn TransitionRecordFactory>,
        context: &TransitionContext,
    ) -> Result<bool, PullError> {
        let stateful = self.stateful.clone().ok_or_else(|| PullError::NotAttached {
            machine: self.name.clone(),
        })?;
        let tag = trigger.tag();
        let candidates = self.map.transitions_for(&tag, param);
        let mut fired_any = false;

        for id in candidates {
            let transition = &self.transitions[id.0];
            if !transition.can_fire(&self.tree) {
                continue;
            }
            let condition = self.map.condition_for(&tag, id, param);
            if !trigger.satisfied(&stateful, param, condition)? {
                continue;
            }
            let name = transition.name().to_owned();
            let exit_path = self.tree.path_name(transition.exit()).to_owned();
            let entry_path = self.tree.path_name(transition.entry()).to_owned();
            transition.fire(&mut self.tree, Some(&stateful));
            fired_any = true;
            debug!(
                machine = %self.name,
                transition = %name,
                active = %self.tree.active_state_string(),
                "transition fired"
            );
            if let Some(factory) = recorder.as_deref_mut() {
                factory.record(
                    FiredTransition {
                        name: &name,
                        exit_path: &exit_path,
                        entry_path: &entry_path,
                    },
                    &stateful,
                    context,
                );
            }
        }

        if fired_any {
            self.push_cookie();
        }
        Ok(fired_any)
    }

    // --- queries -----------------------------------------------------------

    /// Whether the state at a dotted path is active. Unknown paths are
    /// simply not active.
    pub fn is_in_state(&self, path: &str) -> bool {
        self.tree
            .find_by_path(path)
            .is_some_and(|id| self.tree.is_active(id))
    }

    pub fn find_state(&self, path: &str) -> Option<StateId> {
        self.tree.find_by_path(path)
    }

    /// Whether any mapping exists for this tag and parameter, regardless of
    /// the current activation.
    pub fn is_supported(&self, tag: &TriggerTag, param: Option<&str>) -> bool {
        self.map.is_supported(tag, param)
    }

    /// Whether some transition routed for this tag and parameter can fire
    /// right now.
    pub fn is_applicable(&self, tag: &TriggerTag, param: Option<&str>) -> bool {
        self.map
            .transitions_for(tag, param)
            .iter()
            .any(|&id| self.transitions[id.0].can_fire(&self.tree))
    }

    /// Every parameter mapped under this tag, in registration order.
    pub fn supported_parameters(&self, tag: &TriggerTag) -> Vec<Option<&str>> {
        self.map.parameters_for(tag)
    }

    /// The subset of supported parameters with at least one currently
    /// fireable transition.
    pub fn applicable_parameters(&self, tag: &TriggerTag) -> Vec<Option<&str>> {
        self.map
            .parameters_for(tag)
            .into_iter()
            .filter(|&param| self.is_applicable(tag, param))
            .collect()
    }

    /// Whether this tag/parameter pair could cause a transition now or after
    /// a chain of same-tag transitions from the current activation.
    pub fn is_parameter_viable(&self, tag: &TriggerTag, param: Option<&str>) -> bool {
        self.map
            .is_parameter_viable(tag, param, &self.tree.active_states())
    }

    /// Rank this tag/parameter pair against the current activation.
    pub fn rank(&self, tag: &TriggerTag, param: Option<&str>) -> Rank {
        let mut best: Option<usize> = None;
        let mut any_fireable = false;
        for id in self.map.transitions_for(tag, param) {
            let transition = &self.transitions[id.0];
            if !transition.can_fire(&self.tree) {
                continue;
            }
            any_fireable = true;
            let ranked = transition
                .ranked_states()
                .iter()
                .position(|&s| self.tree.is_active(s));
            if let Some(index) = ranked {
                best = Some(best.map_or(index, |b| b.min(index)));
            }
        }
        match (any_fireable, best) {
            (false, _) => Rank::Inapplicable,
            (true, None) => Rank::Unranked,
            (true, Some(index)) => Rank::Ranked(index),
        }
    }

    pub fn active_states(&self) -> Vec<StateId> {
        self.tree.active_states()
    }

    /// Display string of the active configuration, e.g. `C[D.E,G.H]`. For
    /// logging only.
    pub fn active_state_string(&self) -> String {
        self.tree.active_state_string()
    }

    /// Display string of every state in the machine. For logging only.
    pub fn all_state_string(&self) -> String {
        self.tree.all_state_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stateful::Stateful;
    use crate::trigger::{HairTrigger, HAIR};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Order {
        cookie: StateCookie,
        properties: Vec<(String, String)>,
    }

    impl Stateful for Order {
        fn is_in_state(&self, state_path: &str) -> bool {
            self.cookie.is_active(state_path)
        }
        fn state_cookie(&self) -> StateCookie {
            self.cookie.clone()
        }
        fn update_state_cookie(&mut self, cookie: StateCookie) {
            self.cookie = cookie;
        }
        fn notify_property_changed(&mut self, name: &str, value: &str) {
            self.properties.push((name.to_owned(), value.to_owned()));
        }
    }

    /// root -> {open (default), shipped, cancelled}
    fn order_machine() -> (StateMachine, TransitionId, TransitionId) {
        let mut tree = StateTree::new("order").unwrap();
        let open = tree.insert_exclusive("open", false, false).unwrap();
        let shipped = tree.insert_exclusive("shipped", false, false).unwrap();
        let cancelled = tree.insert_exclusive("cancelled", false, false).unwrap();
        tree.add_child(tree.root(), open);
        tree.add_child(tree.root(), shipped);
        tree.add_child(tree.root(), cancelled);
        tree.set_default_child(tree.root(), Some(open)).unwrap();

        let mut machine = StateMachine::new("order", tree);
        let ship = machine
            .add_transition(Transition::new("ship", open, shipped))
            .unwrap();
        let cancel = machine
            .add_transition(Transition::new("cancel", open, cancelled))
            .unwrap();
        machine.map_trigger(HAIR, Some("ship"), ship).unwrap();
        machine.map_trigger(HAIR, Some("cancel"), cancel).unwrap();
        (machine, ship, cancel)
    }

    #[test]
    fn attach_fires_no_entry_actions() {
        use crate::action::ParametricAction;
        use std::cell::Cell;

        struct CountEntries {
            count: Rc<Cell<usize>>,
        }
        impl crate::action::StateAction for CountEntries {
            fn execute(&self, _stateful: &SharedStateful, _param: Option<&str>) {
                self.count.set(self.count.get() + 1);
            }
        }

        let (mut machine, ..) = order_machine();
        let count = Rc::new(Cell::new(0));
        let open = machine.find_state("open").unwrap();
        machine.tree_mut().add_entry_action(
            open,
            ParametricAction::new(Rc::new(CountEntries { count: count.clone() }), None),
        );

        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order);
        assert!(machine.is_in_state("open"));
        assert_eq!(count.get(), 0, "attach must not fire entry actions");
    }

    #[test]
    fn custom_triggers_see_the_bound_stateful_and_parameter() {
        struct OpenOnly;
        impl Trigger for OpenOnly {
            fn tag(&self) -> TriggerTag {
                HAIR
            }
            fn satisfied(
                &self,
                stateful: &SharedStateful,
                param: Option<&str>,
                _condition: Option<&Condition>,
            ) -> Result<bool, ConditionError> {
                Ok(param == Some("ship") && stateful.borrow().is_in_state("open"))
            }
        }

        let (mut machine, ..) = order_machine();
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order);

        let vetoed = machine
            .pull_trigger(&OpenOnly, Some("cancel"), None, &TransitionContext::new())
            .unwrap();
        assert!(!vetoed);
        assert!(machine.is_in_state("open"));

        let fired = machine
            .pull_trigger(&OpenOnly, Some("ship"), None, &TransitionContext::new())
            .unwrap();
        assert!(fired);
        assert!(machine.is_in_state("shipped"));
    }

    #[test]
    fn fresh_attach_initializes_defaults_and_pushes_cookie() {
        let (mut machine, ..) = order_machine();
        machine.add_default_property(PropertyValue::new("carrier", "none"));
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order.clone());

        assert!(machine.is_in_state("open"));
        assert!(order.borrow().cookie.is_active("open"));
        assert_eq!(
            order.borrow().properties,
            [("carrier".to_owned(), "none".to_owned())]
        );
    }

    #[test]
    fn pull_fires_mapped_transition_and_updates_cookie() {
        let (mut machine, ..) = order_machine();
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order.clone());

        let fired = machine
            .pull_trigger(&HairTrigger, Some("ship"), None, &TransitionContext::new())
            .unwrap();
        assert!(fired);
        assert!(machine.is_in_state("shipped"));
        assert!(order.borrow().cookie.is_active("shipped"));
        assert!(!order.borrow().cookie.is_active("open"));
    }

    #[test]
    fn pull_without_stateful_is_an_error() {
        let (mut machine, ..) = order_machine();
        let err = machine
            .pull_trigger(&HairTrigger, Some("ship"), None, &TransitionContext::new())
            .unwrap_err();
        assert!(matches!(err, PullError::NotAttached { .. }));
    }

    #[test]
    fn unmatched_parameter_fires_nothing() {
        let (mut machine, ..) = order_machine();
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order);
        let fired = machine
            .pull_trigger(&HairTrigger, Some("refund"), None, &TransitionContext::new())
            .unwrap();
        assert!(!fired);
        assert!(machine.is_in_state("open"));
    }

    #[test]
    fn reattach_restores_from_cookie_without_actions() {
        let (mut machine, ..) = order_machine();
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order.clone());
        machine
            .pull_trigger(&HairTrigger, Some("ship"), None, &TransitionContext::new())
            .unwrap();
        machine.detach_stateful();

        let (mut second_machine, ..) = order_machine();
        second_machine.attach_stateful(order);
        assert!(second_machine.is_in_state("shipped"));
        assert!(!second_machine.is_in_state("open"));
    }

    #[test]
    fn applicability_and_support_diverge_after_leaving_the_exit_state() {
        let (mut machine, ..) = order_machine();
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order);
        assert!(machine.is_applicable(&HAIR, Some("cancel")));

        machine
            .pull_trigger(&HairTrigger, Some("ship"), None, &TransitionContext::new())
            .unwrap();
        assert!(machine.is_supported(&HAIR, Some("cancel")));
        assert!(!machine.is_applicable(&HAIR, Some("cancel")));
        assert_eq!(
            machine.applicable_parameters(&HAIR),
            Vec::<Option<&str>>::new()
        );
    }

    #[test]
    fn rank_orders_by_first_active_ranked_state() {
        let (mut machine, ship, _) = order_machine();
        let open = machine.find_state("open").unwrap();
        let shipped = machine.find_state("shipped").unwrap();
        machine.transition_mut(ship).add_ranked_state(shipped);
        machine.transition_mut(ship).add_ranked_state(open);

        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order);
        // open is active, ranked second
        assert_eq!(machine.rank(&HAIR, Some("ship")), Rank::Ranked(1));
        assert_eq!(machine.rank(&HAIR, Some("cancel")), Rank::Unranked);
        assert_eq!(machine.rank(&HAIR, Some("refund")), Rank::Inapplicable);
        assert!(Rank::Ranked(0) < Rank::Ranked(1));
        assert!(Rank::Ranked(1) < Rank::Unranked);
        assert!(Rank::Unranked < Rank::Inapplicable);
    }

    #[test]
    fn property_tables_and_description_round_trip() {
        let (mut machine, ..) = order_machine();
        machine.set_description("order fulfilment lifecycle");
        machine.set_possible_values(
            "carrier",
            vec!["ups".to_owned(), "fedex".to_owned()],
        );

        assert_eq!(machine.description(), Some("order fulfilment lifecycle"));
        assert_eq!(
            machine.possible_values("carrier"),
            Some(&["ups".to_owned(), "fedex".to_owned()][..])
        );
        assert_eq!(machine.possible_values("weight"), None);
    }

    #[test]
    fn default_properties_are_not_pushed_on_restore() {
        let (mut machine, ..) = order_machine();
        machine.add_default_property(PropertyValue::new("carrier", "none"));
        let order: Rc<RefCell<Order>> = Rc::new(RefCell::new(Order::default()));
        machine.attach_stateful(order.clone());
        assert_eq!(order.borrow().properties.len(), 1);
        machine.detach_stateful();

        machine.attach_stateful(order.clone());
        assert_eq!(order.borrow().properties.len(), 1, "restore pushes nothing");
    }

    #[test]
    fn transitions_must_reference_machine_states() {
        let (mut machine, ..) = order_machine();
        let open = machine.find_state("open").unwrap();
        assert!(machine
            .add_transition(Transition::new("bad", open, StateId(900)))
            .is_err());
    }
}
