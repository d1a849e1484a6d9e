use rand::Rng;

use crate::{check_interval, Result};

use super::Choice;

/// Epsilon greedy exploration policy
///
/// The threshold is only ever changed from outside through [`set_epsilon`](Self::set_epsilon),
/// typically by a training driver evaluating a [`Decay`](crate::decay::Decay) schedule between episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct EpsilonGreedy {
    epsilon: f32,
}

impl EpsilonGreedy {
    /// Initialize epsilon greedy policy with an exploration rate
    ///
    /// Fails if `epsilon` is not in the interval `[0,1]`
    pub fn new(epsilon: f32) -> Result<Self> {
        check_interval!(epsilon, 0.0, 1.0);
        Ok(Self { epsilon })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Replace the exploration rate
    ///
    /// Fails if `epsilon` is not in the interval `[0,1]`, leaving the current rate in place
    pub fn set_epsilon(&mut self, epsilon: f32) -> Result<()> {
        check_interval!(epsilon, 0.0, 1.0);
        self.epsilon = epsilon;
        Ok(())
    }

    /// Draw one uniform sample `r` in `[0,1)` and explore iff `r < epsilon`
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Choice {
        if rng.gen::<f32>() < self.epsilon {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }
}
