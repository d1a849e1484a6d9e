use crate::{state::ToStateLabel, table::Action};

/// Outcome of one [`Environment::step`]
#[derive(Debug, Clone, PartialEq)]
pub struct Step<O, I = ()> {
    /// What the agent observes after the action
    pub observation: O,
    /// Scalar reward for the action
    pub reward: f32,
    /// Whether the episode ended with this step
    pub terminal: bool,
    /// Environment-specific extra information, opaque to the agent
    pub info: I,
}

/// An episodic environment with a fixed set of discrete actions `0..num_actions`
///
/// Observations must reduce deterministically to a [`StateLabel`](crate::state::StateLabel):
/// the same underlying situation always has to produce the same label.
pub trait Environment {
    /// A representation of what the agent can see of the environment
    type Observation: ToStateLabel;

    /// Extra diagnostic information returned alongside each step
    type Info;

    /// Number of discrete actions the environment accepts
    fn num_actions(&self) -> usize;

    /// Update the environment in response to an action taken by an agent
    fn step(&mut self, action: Action) -> Step<Self::Observation, Self::Info>;

    /// Reset the environment to an initial state
    ///
    /// **Returns** the initial observation
    fn reset(&mut self) -> Self::Observation;
}
