use std::fmt;

use serde::{Deserialize, Serialize};

/// A stable, discretized identifier for an environment observation
///
/// Labels are the row keys of a [`ValueTable`](crate::table::ValueTable), so the same underlying
/// situation must always reduce to the same label for the whole of a training run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateLabel(String);

impl StateLabel {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Build a label from a fixed-width vector of indicator flags
    ///
    /// Each flag is written as its decimal digits, so `[0, 0, 1]` becomes `"001"`.
    pub fn from_indicators(flags: &[u8]) -> Self {
        Self(flags.iter().map(u8::to_string).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateLabel {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for StateLabel {
    fn from(label: String) -> Self {
        Self(label)
    }
}

/// Deterministic reduction of an observation to a [`StateLabel`]
pub trait ToStateLabel {
    fn to_state_label(&self) -> StateLabel;
}

impl ToStateLabel for StateLabel {
    fn to_state_label(&self) -> StateLabel {
        self.clone()
    }
}

impl ToStateLabel for [u8] {
    fn to_state_label(&self) -> StateLabel {
        StateLabel::from_indicators(self)
    }
}

impl<const N: usize> ToStateLabel for [u8; N] {
    fn to_state_label(&self) -> StateLabel {
        StateLabel::from_indicators(self)
    }
}

impl ToStateLabel for Vec<u8> {
    fn to_state_label(&self) -> StateLabel {
        StateLabel::from_indicators(self)
    }
}
