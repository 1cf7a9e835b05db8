//! Strata: a hierarchical state machine (statechart) engine
//!
//! Strata executes statecharts: trees of nested, possibly concurrent states
//! wired to transitions, triggers and conditions. A machine tracks which
//! states are active for a bound business object, fires transitions in
//! response to pulled triggers, and produces a durable snapshot (active
//! states plus history) that can be persisted and restored.
//!
//! # Core Concepts
//!
//! - **State tree**: exclusive and concurrent composite states with
//!   shallow/deep history, owned by a [`StateTree`] arena
//! - **Transitions**: named edges fired through the nearest-active-ancestor
//!   protocol, with ordered entry/exit/transition actions
//! - **Triggers**: external stimuli routed to transitions by tag and
//!   parameter, optionally gated by a [`Condition`]
//! - **Cookies**: [`StateCookie`] snapshots for persistence across sessions
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strata::{
//!     HairTrigger, StateCookie, StateMachine, StateTree, Stateful, Transition,
//!     TransitionContext, HAIR,
//! };
//!
//! #[derive(Default)]
//! struct Order {
//!     cookie: StateCookie,
//! }
//!
//! impl Stateful for Order {
//!     fn is_in_state(&self, path: &str) -> bool {
//!         self.cookie.is_active(path)
//!     }
//!     fn state_cookie(&self) -> StateCookie {
//!         self.cookie.clone()
//!     }
//!     fn update_state_cookie(&mut self, cookie: StateCookie) {
//!         self.cookie = cookie;
//!     }
//!     fn notify_property_changed(&mut self, _name: &str, _value: &str) {}
//! }
//!
//! let mut tree = StateTree::new("order")?;
//! let open = tree.insert_exclusive("open", false, false)?;
//! let shipped = tree.insert_exclusive("shipped", false, false)?;
//! tree.add_child(tree.root(), open);
//! tree.add_child(tree.root(), shipped);
//! tree.set_default_child(tree.root(), Some(open))?;
//!
//! let mut machine = StateMachine::new("order", tree);
//! let ship = machine.add_transition(Transition::new("ship", open, shipped))?;
//! machine.map_trigger(HAIR, Some("ship"), ship)?;
//!
//! let order = Rc::new(RefCell::new(Order::default()));
//! machine.attach_stateful(order.clone());
//! assert!(machine.is_in_state("open"));
//!
//! machine.pull_trigger(&HairTrigger, Some("ship"), None, &TransitionContext::new())?;
//! assert!(machine.is_in_state("shipped"));
//! assert!(order.borrow().cookie.is_active("shipped"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod action;
pub mod condition;
pub mod cookie;
pub mod error;
pub mod machine;
pub mod record;
pub mod routing;
pub mod stateful;
pub mod tree;
pub mod trigger;

// Re-export commonly used types
pub use action::{ParametricAction, PropertyValue, SetPropertyAction, StateAction};
pub use condition::{
    parse, Condition, ConditionError, ConditionEvaluator, InAnyStateEvaluator, ParseError,
};
pub use cookie::StateCookie;
pub use error::ConfigError;
pub use machine::{PullError, Rank, StateMachine};
pub use record::{
    FiredTransition, MemoryRecordFactory, TransitionContext, TransitionRecord,
    TransitionRecordFactory,
};
pub use routing::{Transition, TransitionId, TriggerTransitionMap, WILDCARD};
pub use stateful::{SharedStateful, Stateful};
pub use tree::{StateId, StateKind, StateTree};
pub use trigger::{
    ConditionalTrigger, CreationTrigger, HairTrigger, Trigger, TriggerTag, CONDITIONAL, CREATION,
    HAIR,
};
