//! Boolean conditions over observed business objects.
//!
//! A condition is a tree of combinators over state-membership tests. The
//! leaves name sets of state paths; a [`ConditionEvaluator`] decides whether
//! a given observed object satisfies a leaf. Conditions are evaluated against
//! the whole collection of observed objects at once, which is what gives
//! [`Condition::AllOf`], [`Condition::SomeOf`] and [`Condition::NoneOf`]
//! their quantifier readings.

mod parser;

pub use parser::{parse, ParseError};

use crate::stateful::SharedStateful;
use thiserror::Error;

/// Evaluation failure.
#[derive(Debug, Error)]
pub enum ConditionError {
    /// The evaluator could not interpret an observed object.
    #[error("condition cannot be evaluated against subject: {reason}")]
    UnsupportedSubject { reason: String },
}

/// Decides whether one observed object satisfies a leaf test.
pub trait ConditionEvaluator {
    /// Whether `stateful` satisfies a leaf naming `state_paths`.
    fn applies(
        &self,
        stateful: &SharedStateful,
        state_paths: &[String],
    ) -> Result<bool, ConditionError>;
}

/// Leaf test satisfied when the object is in at least one of the named
/// states.
pub struct InAnyStateEvaluator;

impl ConditionEvaluator for InAnyStateEvaluator {
    fn applies(
        &self,
        stateful: &SharedStateful,
        state_paths: &[String],
    ) -> Result<bool, ConditionError> {
        let stateful = stateful.borrow();
        Ok(state_paths.iter().any(|path| stateful.is_in_state(path)))
    }
}

/// A boolean expression over observed objects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    /// True when every subcondition is true. An `And` with no subconditions
    /// is false.
    And(Vec<Condition>),
    /// True when at least one subcondition is true, evaluated left to right
    /// with short-circuiting.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// True when at least one observed object satisfies the leaf.
    AnyOf(Vec<String>),
    /// True when every observed object satisfies the leaf. False over an
    /// empty observed collection.
    AllOf(Vec<String>),
    /// True when the observed objects are split: at least one satisfies the
    /// leaf and at least one does not.
    SomeOf(Vec<String>),
    /// True when no observed object satisfies the leaf. True over an empty
    /// observed collection.
    NoneOf(Vec<String>),
}

impl Condition {
    /// Evaluate against a collection of observed objects.
    pub fn eval(
        &self,
        observed: &[SharedStateful],
        evaluator: &dyn ConditionEvaluator,
    ) -> Result<bool, ConditionError> {
        match self {
            Condition::And(subconditions) => {
                if subconditions.is_empty() {
                    return Ok(false);
                }
                for sub in subconditions {
                    if !sub.eval(observed, evaluator)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::Or(subconditions) => {
                for sub in subconditions {
                    if sub.eval(observed, evaluator)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::Not(sub) => Ok(!sub.eval(observed, evaluator)?),
            Condition::AnyOf(paths) => {
                for stateful in observed {
                    if evaluator.applies(stateful, paths)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Condition::AllOf(paths) => {
                if observed.is_empty() {
                    return Ok(false);
                }
                for stateful in observed {
                    if !evaluator.applies(stateful, paths)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Condition::SomeOf(paths) => {
                let mut satisfied = false;
                let mut unsatisfied = false;
                for stateful in observed {
                    if evaluator.applies(stateful, paths)? {
                        satisfied = true;
                    } else {
                        unsatisfied = true;
                    }
                }
                Ok(satisfied && unsatisfied)
            }
            Condition::NoneOf(paths) => {
                for stateful in observed {
                    if evaluator.applies(stateful, paths)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookie::StateCookie;
    use crate::stateful::Stateful;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    struct FixedStates {
        states: BTreeSet<String>,
    }

    impl Stateful for FixedStates {
        fn is_in_state(&self, state_path: &str) -> bool {
            self.states.contains(state_path)
        }
        fn state_cookie(&self) -> StateCookie {
            StateCookie::new()
        }
        fn update_state_cookie(&mut self, _cookie: StateCookie) {}
        fn notify_property_changed(&mut self, _name: &str, _value: &str) {}
    }

    fn subject(states: &[&str]) -> SharedStateful {
        Rc::new(RefCell::new(FixedStates {
            states: states.iter().map(|s| (*s).to_owned()).collect(),
        }))
    }

    fn paths(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn any_of_matches_one_subject() {
        let observed = vec![subject(&["open"]), subject(&["closed"])];
        let cond = Condition::AnyOf(paths(&["closed"]));
        assert!(cond.eval(&observed, &InAnyStateEvaluator).unwrap());
        let cond = Condition::AnyOf(paths(&["archived"]));
        assert!(!cond.eval(&observed, &InAnyStateEvaluator).unwrap());
    }

    #[test]
    fn all_of_is_false_over_no_subjects() {
        let cond = Condition::AllOf(paths(&["open"]));
        assert!(!cond.eval(&[], &InAnyStateEvaluator).unwrap());
    }

    #[test]
    fn all_of_requires_every_subject() {
        let cond = Condition::AllOf(paths(&["open"]));
        let observed = vec![subject(&["open"]), subject(&["open", "extra"])];
        assert!(cond.eval(&observed, &InAnyStateEvaluator).unwrap());
        let observed = vec![subject(&["open"]), subject(&["closed"])];
        assert!(!cond.eval(&observed, &InAnyStateEvaluator).unwrap());
    }

    #[test]
    fn some_of_requires_a_strict_mix() {
        let cond = Condition::SomeOf(paths(&["open"]));
        let mixed = vec![subject(&["open"]), subject(&["closed"])];
        assert!(cond.eval(&mixed, &InAnyStateEvaluator).unwrap());
        let uniform = vec![subject(&["open"]), subject(&["open"])];
        assert!(!cond.eval(&uniform, &InAnyStateEvaluator).unwrap());
        assert!(!cond.eval(&[], &InAnyStateEvaluator).unwrap());
    }

    #[test]
    fn none_of_is_true_over_no_subjects() {
        let cond = Condition::NoneOf(paths(&["open"]));
        assert!(cond.eval(&[], &InAnyStateEvaluator).unwrap());
        let observed = vec![subject(&["closed"])];
        assert!(cond.eval(&observed, &InAnyStateEvaluator).unwrap());
        let observed = vec![subject(&["open"])];
        assert!(!cond.eval(&observed, &InAnyStateEvaluator).unwrap());
    }

    #[test]
    fn empty_and_is_false() {
        assert!(!Condition::And(Vec::new())
            .eval(&[subject(&["open"])], &InAnyStateEvaluator)
            .unwrap());
    }

    #[test]
    fn or_short_circuits_on_the_first_true_arm() {
        struct PanicPastOpen;
        impl ConditionEvaluator for PanicPastOpen {
            fn applies(
                &self,
                stateful: &SharedStateful,
                state_paths: &[String],
            ) -> Result<bool, ConditionError> {
                assert!(
                    !state_paths.contains(&"closed".to_owned()),
                    "right arm must not be evaluated"
                );
                InAnyStateEvaluator.applies(stateful, state_paths)
            }
        }

        let cond = Condition::Or(vec![
            Condition::AnyOf(paths(&["open"])),
            Condition::AnyOf(paths(&["closed"])),
        ]);
        let observed = vec![subject(&["open"])];
        assert!(cond.eval(&observed, &PanicPastOpen).unwrap());
    }

    #[test]
    fn nested_combinators() {
        let observed = vec![subject(&["open"]), subject(&["closed"])];
        let cond = Condition::And(vec![
            Condition::AnyOf(paths(&["open"])),
            Condition::Not(Box::new(Condition::AllOf(paths(&["open"])))),
        ]);
        assert!(cond.eval(&observed, &InAnyStateEvaluator).unwrap());
    }
}
