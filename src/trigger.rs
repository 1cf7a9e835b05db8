//! Triggers, the external causes of transitions.

use crate::condition::{Condition, ConditionError, InAnyStateEvaluator};
use crate::stateful::SharedStateful;

/// Identifies a family of triggers for routing purposes.
///
/// A tag registered in a machine accepts a pulled trigger when the names are
/// equal or the pulled tag's name appears in the registered tag's `subsumes`
/// list. Subsumption is one-directional: registering [`CONDITIONAL`] routes
/// pulled [`CREATION`] triggers too, but not the reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TriggerTag {
    pub name: &'static str,
    pub subsumes: &'static [&'static str],
}

impl TriggerTag {
    /// Whether a trigger carrying `pulled` should be routed through mappings
    /// registered under this tag.
    pub fn accepts(&self, pulled: &TriggerTag) -> bool {
        self.name == pulled.name || self.subsumes.contains(&pulled.name)
    }
}

/// Unconditional trigger; fires whenever a mapping routes it.
pub const HAIR: TriggerTag = TriggerTag {
    name: "hair",
    subsumes: &[],
};

/// Condition-guarded trigger. Mappings registered under this tag also route
/// pulled creation triggers.
pub const CONDITIONAL: TriggerTag = TriggerTag {
    name: "conditional",
    subsumes: &["creation"],
};

/// Conditional trigger pulled once when a stateful is first attached.
pub const CREATION: TriggerTag = TriggerTag {
    name: "creation",
    subsumes: &[],
};

/// A pullable cause of transitions.
///
/// The machine routes a pulled trigger by its [`tag`](Trigger::tag), then
/// asks [`satisfied`](Trigger::satisfied) with the machine's bound stateful,
/// the pull parameter, and the condition mapped for each candidate
/// transition. The built-in triggers consult only the condition; custom
/// triggers may inspect the subject or the parameter as well.
pub trait Trigger {
    fn tag(&self) -> TriggerTag;

    /// Whether this trigger fires for the given subject, parameter, and
    /// mapped condition.
    fn satisfied(
        &self,
        stateful: &SharedStateful,
        param: Option<&str>,
        condition: Option<&Condition>,
    ) -> Result<bool, ConditionError>;
}

/// Fires unconditionally.
pub struct HairTrigger;

impl Trigger for HairTrigger {
    fn tag(&self) -> TriggerTag {
        HAIR
    }

    fn satisfied(
        &self,
        _stateful: &SharedStateful,
        _param: Option<&str>,
        _condition: Option<&Condition>,
    ) -> Result<bool, ConditionError> {
        Ok(true)
    }
}

fn condition_holds(
    condition: Option<&Condition>,
    observed: &[SharedStateful],
) -> Result<bool, ConditionError> {
    match condition {
        Some(condition) => condition.eval(observed, &InAnyStateEvaluator),
        None => Ok(false),
    }
}

/// Fires when the mapped condition holds over a collection of observed
/// objects. A missing condition never fires.
pub struct ConditionalTrigger {
    observed: Vec<SharedStateful>,
}

impl ConditionalTrigger {
    pub fn new(observed: Vec<SharedStateful>) -> Self {
        Self { observed }
    }
}

impl Trigger for ConditionalTrigger {
    fn tag(&self) -> TriggerTag {
        CONDITIONAL
    }

    fn satisfied(
        &self,
        _stateful: &SharedStateful,
        _param: Option<&str>,
        condition: Option<&Condition>,
    ) -> Result<bool, ConditionError> {
        condition_holds(condition, &self.observed)
    }
}

/// Conditional trigger observing exactly the freshly attached object.
pub struct CreationTrigger {
    observed: [SharedStateful; 1],
}

impl CreationTrigger {
    pub fn new(created: SharedStateful) -> Self {
        Self { observed: [created] }
    }
}

impl Trigger for CreationTrigger {
    fn tag(&self) -> TriggerTag {
        CREATION
    }

    fn satisfied(
        &self,
        _stateful: &SharedStateful,
        _param: Option<&str>,
        condition: Option<&Condition>,
    ) -> Result<bool, ConditionError> {
        condition_holds(condition, &self.observed)
    }
}
