//! Side-effecting actions run by states and transitions.

use crate::stateful::SharedStateful;
use std::rc::Rc;

/// Client code run in response to happenings in the state machine.
///
/// Actions execute when a state activates (entry actions), deactivates (exit
/// actions), or in the middle of a transition. The meaning of "execute" is
/// defined entirely by the implementor; the engine only guarantees ordering.
pub trait StateAction {
    /// Execute this action against the stateful whose state is changing.
    ///
    /// `param` is the parameter associated with this action in the machine
    /// definition, if any.
    fn execute(&self, stateful: &SharedStateful, param: Option<&str>);
}

/// An action paired with its definition-time parameter.
///
/// The same action may appear more than once in a list, with the same or
/// different parameters. Identity for removal purposes is the action pointer
/// plus the parameter value.
#[derive(Clone)]
pub struct ParametricAction {
    action: Rc<dyn StateAction>,
    param: Option<String>,
}

impl ParametricAction {
    /// Pair an action with an optional parameter.
    pub fn new(action: Rc<dyn StateAction>, param: Option<&str>) -> Self {
        Self {
            action,
            param: param.map(str::to_owned),
        }
    }

    /// Execute the action with its parameter.
    pub fn execute(&self, stateful: &SharedStateful) {
        self.action.execute(stateful, self.param.as_deref());
    }

    /// The definition-time parameter.
    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }

    /// Whether this entry denotes the same action/parameter pairing.
    ///
    /// Actions compare by pointer identity, parameters by value.
    pub fn is_same(&self, other: &ParametricAction) -> bool {
        Rc::ptr_eq(&self.action, &other.action) && self.param == other.param
    }
}

impl std::fmt::Debug for ParametricAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParametricAction")
            .field("param", &self.param)
            .finish_non_exhaustive()
    }
}

/// Removes every occurrence of `action` from `list`, returning whether the
/// list was modified.
pub(crate) fn remove_all(list: &mut Vec<ParametricAction>, action: &ParametricAction) -> bool {
    let before = list.len();
    list.retain(|a| !a.is_same(action));
    list.len() != before
}

/// Built-in action that pushes a property value onto the stateful.
///
/// The action's definition-time parameter is the value; the property name is
/// fixed at construction. Used for property side effects wired into entry,
/// exit, or transition action lists.
pub struct SetPropertyAction {
    property_name: String,
}

impl SetPropertyAction {
    /// Create an action that sets the named property.
    pub fn new(property_name: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
        }
    }
}

impl StateAction for SetPropertyAction {
    fn execute(&self, stateful: &SharedStateful, param: Option<&str>) {
        stateful
            .borrow_mut()
            .notify_property_changed(&self.property_name, param.unwrap_or(""));
    }
}

/// A property name/value pair applied when a machine initializes a freshly
/// created stateful.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyValue {
    pub name: String,
    pub value: String,
}

impl PropertyValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
