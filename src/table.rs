use std::collections::{hash_map, BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{error::Error, state::StateLabel, Result};

/// Index of one of a fixed set of discrete actions
pub type Action = usize;

/// Composite key of a [`ValueTable`] entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateAction {
    pub state: StateLabel,
    pub action: Action,
}

impl StateAction {
    pub fn new(state: StateLabel, action: Action) -> Self {
        Self { state, action }
    }
}

/// Tabular store of value estimates, one entry per (state, action) pair
///
/// Entries are created lazily. A pair that was never written reads as `0.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    entries: HashMap<StateAction, f32>,
}

impl ValueTable {
    /// Current snapshot schema version
    pub const SNAPSHOT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for the pair, or `0.0` if it has never been written
    pub fn get(&self, state: &StateLabel, action: Action) -> f32 {
        self.entries
            .get(&StateAction::new(state.clone(), action))
            .copied()
            .unwrap_or(0.0)
    }

    /// Insert or overwrite the value for the pair
    pub fn set(&mut self, state: StateLabel, action: Action, value: f32) {
        self.entries.insert(StateAction::new(state, action), value);
    }

    /// True iff [`set`](Self::set) has been called for this exact pair
    pub fn contains(&self, state: &StateLabel, action: Action) -> bool {
        self.entries
            .contains_key(&StateAction::new(state.clone(), action))
    }

    /// Values of actions `0..num_actions` for a state, in index order
    pub fn values(&self, state: &StateLabel, num_actions: usize) -> Vec<f32> {
        (0..num_actions).map(|a| self.get(state, a)).collect()
    }

    /// Maximum value over actions `0..num_actions` for a state
    pub fn max_value(&self, state: &StateLabel, num_actions: usize) -> f32 {
        (0..num_actions)
            .map(|a| self.get(state, a))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    /// Distinct state labels with at least one entry, in sorted order
    pub fn states(&self) -> Vec<&StateLabel> {
        self.entries
            .keys()
            .map(|k| &k.state)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Largest action index present in the table, if any
    pub fn max_action(&self) -> Option<Action> {
        self.entries.keys().map(|k| k.action).max()
    }

    /// Serialize the full mapping into a versioned snapshot blob
    ///
    /// Entries are written in key order so equal tables produce equal bytes.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut entries = self
            .entries
            .iter()
            .map(|(key, &value)| SnapshotEntry {
                state: key.state.clone(),
                action: key.action,
                value,
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| (&a.state, a.action).cmp(&(&b.state, b.action)));

        let snapshot = Snapshot {
            version: Self::SNAPSHOT_VERSION,
            entries,
        };
        let bytes = rmp_serde::to_vec_named(&snapshot)?;
        debug!(
            "Encoded snapshot with {} entries ({} bytes)",
            snapshot.entries.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Rebuild a table from a blob produced by [`snapshot`](Self::snapshot)
    ///
    /// Either the whole snapshot decodes or an error is returned; a partially
    /// populated table is never produced.
    pub fn restore(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot = rmp_serde::from_slice(bytes)?;
        if snapshot.version != Self::SNAPSHOT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: snapshot.version,
                expected: Self::SNAPSHOT_VERSION,
            });
        }

        let entries = snapshot
            .entries
            .into_iter()
            .map(|e| (StateAction::new(e.state, e.action), e.value))
            .collect::<HashMap<_, _>>();
        debug!("Decoded snapshot with {} entries", entries.len());
        Ok(Self { entries })
    }
}

/// Iterator over the entries of a [`ValueTable`]
pub struct Iter<'a> {
    inner: hash_map::Iter<'a, StateAction, f32>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a StateAction, f32);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, &v)| (k, v))
    }
}

impl<'a> IntoIterator for &'a ValueTable {
    type Item = (&'a StateAction, f32);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    state: StateLabel,
    action: Action,
    value: f32,
}
