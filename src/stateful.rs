//! The business-object capability consumed by the engine.

use crate::cookie::StateCookie;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a stateful business object.
///
/// A machine instance and everything it observes live on one thread; the
/// binding is shared with `Rc` so that conditional triggers can hold observed
/// objects while the machine holds the driven one.
pub type SharedStateful = Rc<RefCell<dyn Stateful>>;

/// A business object whose life cycle is driven by a state machine.
///
/// The engine queries the object's state membership when evaluating
/// conditions, pushes property side effects through
/// [`notify_property_changed`](Stateful::notify_property_changed), reads the
/// persisted snapshot on attach, and pushes a fresh snapshot back after
/// initialization and after any successful trigger pull.
pub trait Stateful {
    /// Whether this object is "in" the state named by a dotted path.
    fn is_in_state(&self, state_path: &str) -> bool;

    /// The persisted activation/history snapshot for this object.
    ///
    /// A freshly created object returns a cookie whose
    /// [`is_new`](StateCookie::is_new) flag is set, which tells the machine
    /// to initialize default activation instead of restoring.
    fn state_cookie(&self) -> StateCookie;

    /// Store an updated snapshot.
    fn update_state_cookie(&mut self, cookie: StateCookie);

    /// Notification of a potential new value for one of this object's
    /// properties.
    fn notify_property_changed(&mut self, property_name: &str, new_value: &str);
}
