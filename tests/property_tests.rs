//! Property-based tests for activation invariants and snapshots.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated inputs.

use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use strata::{
    parse, Condition, HairTrigger, StateCookie, StateId, StateMachine, StateTree, Stateful,
    Transition, TransitionContext, HAIR,
};

#[derive(Default)]
struct CookieHolder {
    cookie: StateCookie,
}

impl Stateful for CookieHolder {
    fn is_in_state(&self, state_path: &str) -> bool {
        self.cookie.is_active(state_path)
    }
    fn state_cookie(&self) -> StateCookie {
        self.cookie.clone()
    }
    fn update_state_cookie(&mut self, cookie: StateCookie) {
        self.cookie = cookie;
    }
    fn notify_property_changed(&mut self, _name: &str, _value: &str) {}
}

/// Machine mixing exclusive and concurrent composition:
///
/// ```text
/// root: B*, C, J
/// C:    concurrent { D, G }     D: E*, F    G: H*, I
/// J:    concurrent { K, L }     L: M*
/// ```
fn mixed_machine() -> StateMachine {
    let mut tree = StateTree::new("mixed").unwrap();
    let b = tree.insert_exclusive("B", false, false).unwrap();
    let c = tree.insert_concurrent("C", false).unwrap();
    let d = tree.insert_exclusive("D", false, false).unwrap();
    let e = tree.insert_exclusive("E", false, false).unwrap();
    let f = tree.insert_exclusive("F", false, false).unwrap();
    let g = tree.insert_exclusive("G", false, false).unwrap();
    let h = tree.insert_exclusive("H", false, false).unwrap();
    let i = tree.insert_exclusive("I", false, false).unwrap();
    let j = tree.insert_concurrent("J", false).unwrap();
    let k = tree.insert_exclusive("K", false, false).unwrap();
    let l = tree.insert_exclusive("L", false, false).unwrap();
    let m = tree.insert_exclusive("M", false, false).unwrap();
    tree.add_child(tree.root(), b);
    tree.add_child(tree.root(), c);
    tree.add_child(tree.root(), j);
    tree.add_child(c, d);
    tree.add_child(c, g);
    tree.add_child(d, e);
    tree.add_child(d, f);
    tree.add_child(g, h);
    tree.add_child(g, i);
    tree.add_child(j, k);
    tree.add_child(j, l);
    tree.add_child(l, m);
    tree.set_default_child(tree.root(), Some(b)).unwrap();
    tree.set_default_child(d, Some(e)).unwrap();
    tree.set_default_child(g, Some(h)).unwrap();
    tree.set_default_child(l, Some(m)).unwrap();

    let mut machine = StateMachine::new("mixed", tree);
    let wiring = [
        ("exc-to-conc", b, c),
        ("conc-to-exc", c, b),
        ("h-to-i", h, i),
        ("i-to-h", i, h),
        ("e-to-f", e, f),
        ("conc-to-conc", c, j),
        ("back-again", j, c),
    ];
    for (param, exit, entry) in wiring {
        let id = machine
            .add_transition(Transition::new(param, exit, entry))
            .unwrap();
        machine.map_trigger(HAIR, Some(param), id).unwrap();
    }
    machine
}

const MOVES: [&str; 7] = [
    "exc-to-conc",
    "conc-to-exc",
    "h-to-i",
    "i-to-h",
    "e-to-f",
    "conc-to-conc",
    "back-again",
];

fn walk(tree: &StateTree, id: StateId, visit: &mut impl FnMut(&StateTree, StateId)) {
    visit(tree, id);
    for &child in tree.children(id) {
        walk(tree, child, visit);
    }
}

/// Activation shape invariants that must hold in any settled configuration.
fn assert_activation_invariants(tree: &StateTree) {
    walk(tree, tree.root(), &mut |tree, id| {
        let active_children = tree
            .children(id)
            .iter()
            .filter(|&&c| tree.is_active(c))
            .count();
        if tree.is_active(id) {
            if tree.is_concurrent(id) {
                assert_eq!(
                    active_children,
                    tree.children(id).len(),
                    "active concurrent state must activate every region"
                );
            } else if !tree.children(id).is_empty() {
                assert!(
                    active_children <= 1,
                    "exclusive state may have at most one active child"
                );
            }
        } else {
            assert_eq!(active_children, 0, "no active child under an inactive parent");
        }
        if let Some(parent) = tree.parent(id) {
            if tree.is_active(id) {
                assert!(tree.is_active(parent), "active child requires active parent");
            }
        }
    });
}

prop_compose! {
    fn arbitrary_moves()(indexes in prop::collection::vec(0..MOVES.len(), 0..12)) -> Vec<&'static str> {
        indexes.into_iter().map(|i| MOVES[i]).collect()
    }
}

prop_compose! {
    fn arbitrary_paths()(paths in prop::collection::btree_set("[a-z]{1,4}(\\.[a-z]{1,4}){0,2}", 0..6)) -> BTreeSet<String> {
        paths
    }
}

proptest! {
    #[test]
    fn activation_invariants_hold_after_any_move_sequence(moves in arbitrary_moves()) {
        let mut machine = mixed_machine();
        machine.attach_stateful(Rc::new(RefCell::new(CookieHolder::default())));
        assert_activation_invariants(machine.tree());

        for param in moves {
            machine
                .pull_trigger(&HairTrigger, Some(param), None, &TransitionContext::new())
                .unwrap();
            assert_activation_invariants(machine.tree());
        }
    }

    #[test]
    fn snapshot_restores_the_same_configuration(moves in arbitrary_moves()) {
        let mut machine = mixed_machine();
        let holder = Rc::new(RefCell::new(CookieHolder::default()));
        machine.attach_stateful(holder.clone());
        for param in &moves {
            machine
                .pull_trigger(&HairTrigger, Some(param), None, &TransitionContext::new())
                .unwrap();
        }
        let active_before = machine.active_state_string();
        let snapshot = machine.snapshot();
        machine.detach_stateful();

        let mut restored = mixed_machine();
        restored.attach_stateful(holder);
        prop_assert_eq!(restored.active_state_string(), active_before);
        prop_assert_eq!(restored.snapshot(), snapshot);
        assert_activation_invariants(restored.tree());
    }

    #[test]
    fn cookie_roundtrip_serialization(active in arbitrary_paths(), history in arbitrary_paths()) {
        let mut cookie = StateCookie::new();
        cookie.set_active_states(active.clone());
        cookie.set_history_states(history.clone());

        let json = serde_json::to_string(&cookie).unwrap();
        let from_json: StateCookie = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&from_json, &cookie);

        let bytes = bincode::serialize(&cookie).unwrap();
        let from_bytes: StateCookie = bincode::deserialize(&bytes).unwrap();
        prop_assert_eq!(&from_bytes, &cookie);

        prop_assert_eq!(cookie.is_new(), active.is_empty());
    }

    #[test]
    fn parsed_quantifiers_keep_their_paths(paths in prop::collection::vec("[a-z]{1,6}", 1..5)) {
        let text = format!("ANY({})", paths.join(", "));
        let parsed = parse(&text).unwrap();
        prop_assert_eq!(parsed, Condition::AnyOf(paths));
    }
}
