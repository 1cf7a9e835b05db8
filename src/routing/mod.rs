//! Routing from pulled triggers to the transitions they cause.

mod map;
mod transition;

pub use map::{TriggerTransitionMap, WILDCARD};
pub use transition::{Transition, TransitionId};
