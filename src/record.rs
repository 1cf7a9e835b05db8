//! Audit records for fired transitions.

use crate::stateful::SharedStateful;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form diagnostic key/value context carried through a trigger pull
/// into any records produced during it.
///
/// The context is an explicit value owned by the caller. The engine only
/// reads it; clearing between pulls is the caller's job.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionContext {
    values: BTreeMap<String, String>,
}

impl TransitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A view of a transition at the moment it fired.
#[derive(Clone, Copy, Debug)]
pub struct FiredTransition<'a> {
    /// The transition's name.
    pub name: &'a str,
    /// Dotted path name of the exit state.
    pub exit_path: &'a str,
    /// Dotted path name of the entry state.
    pub entry_path: &'a str,
}

/// A persisted account of one fired transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub transition: String,
    pub exit_state: String,
    pub entry_state: String,
    pub fired_at: DateTime<Utc>,
    pub context: TransitionContext,
}

impl TransitionRecord {
    /// Capture a record of a firing, stamped with a fresh id and the current
    /// time.
    pub fn capture(fired: FiredTransition<'_>, context: &TransitionContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            transition: fired.name.to_owned(),
            exit_state: fired.exit_path.to_owned(),
            entry_state: fired.entry_path.to_owned(),
            fired_at: Utc::now(),
            context: context.clone(),
        }
    }
}

/// Receives a record for each fired transition during a trigger pull.
///
/// Pulls run without any recording when no factory is supplied.
pub trait TransitionRecordFactory {
    fn record(
        &mut self,
        fired: FiredTransition<'_>,
        stateful: &SharedStateful,
        context: &TransitionContext,
    );
}

/// Factory that accumulates records in memory.
#[derive(Default)]
pub struct MemoryRecordFactory {
    records: Vec<TransitionRecord>,
}

impl MemoryRecordFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn take_records(&mut self) -> Vec<TransitionRecord> {
        std::mem::take(&mut self.records)
    }
}

impl TransitionRecordFactory for MemoryRecordFactory {
    fn record(
        &mut self,
        fired: FiredTransition<'_>,
        _stateful: &SharedStateful,
        context: &TransitionContext,
    ) {
        self.records.push(TransitionRecord::capture(fired, context));
    }
}
