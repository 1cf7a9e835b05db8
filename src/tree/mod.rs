//! The hierarchical state tree and its activation algorithms.
//!
//! States form a rooted tree of exclusive and concurrent composites. The tree
//! owns every node in an arena; handles are stable [`StateId`]s, parent links
//! are non-owning back-references, and history/default relations are ids
//! rather than pointers.

mod arena;
mod node;

pub use arena::StateTree;
pub use node::{StateId, StateKind};
