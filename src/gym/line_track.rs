use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use strum::{EnumIter, FromRepr, VariantArray};

use crate::{
    env::{Environment, Step},
    error::Error,
    table::Action,
    Result,
};

/// Actions for the [`LineTrack`] environment
#[derive(FromRepr, EnumIter, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineAction {
    Forward = 0,
    /// Rotate in place to the left, which moves the line to the right of the image
    Left = 1,
    /// Rotate in place to the right, which moves the line to the left of the image
    Right = 2,
}

/// Configuration for the [`LineTrack`] environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTrackConfig {
    /// Number of horizontal image bins the line position is reported in
    ///
    /// **Default**: `10`
    pub bins: usize,
    /// Shift of the line across the image, as a fraction of its width, per turn
    ///
    /// **Default**: `0.08`
    pub turn_shift: f32,
    /// Standard deviation of the sideways jitter of the line per step
    ///
    /// **Default**: `0.01`
    pub drift_std: f32,
    /// Standard deviation of the change in track curvature per step
    ///
    /// **Default**: `0.004`
    pub curvature_std: f32,
    /// Largest drift per forward step caused by a bend
    ///
    /// **Default**: `0.03`
    pub max_curvature: f32,
    /// The episode ends once the line has been out of view for more than this many frames
    ///
    /// **Default**: `3`
    pub lost_frames: u32,
}

impl Default for LineTrackConfig {
    fn default() -> Self {
        Self {
            bins: 10,
            turn_shift: 0.08,
            drift_std: 0.01,
            curvature_std: 0.004,
            max_curvature: 0.03,
            lost_frames: 3,
        }
    }
}

/// Diagnostics returned with every [`LineTrack`] step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineInfo {
    /// Horizontal line position, `[0,1)` while visible
    pub offset: f32,
    pub curvature: f32,
}

/// A simulated robot following a line on the floor with a downward-facing camera
///
/// Observations are one-hot vectors over [`LineTrackConfig::bins`] image columns marking where the
/// line is, or all zeros once it is out of view. Driving forward pays `4` and turning pays `0`,
/// but a centred line pays `2` and a line at (or beyond) the image edge costs `-4`. Losing the line
/// for more than [`LineTrackConfig::lost_frames`] frames ends the episode with `-200`.
pub struct LineTrack<R: Rng = StdRng> {
    config: LineTrackConfig,
    drift: Normal<f32>,
    bend: Normal<f32>,
    offset: f32,
    curvature: f32,
    lost: u32,
    rng: R,
}

impl LineTrack<StdRng> {
    pub fn new(config: LineTrackConfig) -> Result<Self> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: LineTrackConfig, seed: u64) -> Result<Self> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> LineTrack<R> {
    pub fn with_rng(config: LineTrackConfig, rng: R) -> Result<Self> {
        if config.bins < 4 {
            return Err(Error::InvalidConfiguration(String::from(
                "a line track needs at least 4 bins",
            )));
        }
        let normal = |std: f32| {
            Normal::new(0.0, std)
                .map_err(|e| Error::InvalidConfiguration(format!("invalid noise level {std}: {e}")))
        };
        Ok(Self {
            drift: normal(config.drift_std)?,
            bend: normal(config.curvature_std)?,
            config,
            offset: 0.5,
            curvature: 0.0,
            lost: 0,
            rng,
        })
    }

    /// Image bin the line is in, if it is visible
    fn bin(&self) -> Option<usize> {
        (0.0..1.0)
            .contains(&self.offset)
            .then(|| ((self.offset * self.config.bins as f32) as usize).min(self.config.bins - 1))
    }

    fn observe(&self) -> Vec<u8> {
        let mut observation = vec![0; self.config.bins];
        if let Some(bin) = self.bin() {
            observation[bin] = 1;
        }
        observation
    }

    fn info(&self) -> LineInfo {
        LineInfo {
            offset: self.offset,
            curvature: self.curvature,
        }
    }

    fn reward(&self, action: LineAction) -> f32 {
        let bins = self.config.bins;
        match self.bin() {
            Some(bin) if bin == bins / 2 - 1 || bin == bins / 2 => 2.0,
            Some(bin) if bin == 0 || bin == bins - 1 => -4.0,
            None => -4.0,
            Some(_) if action == LineAction::Forward => 4.0,
            Some(_) => 0.0,
        }
    }
}

impl<R: Rng> Environment for LineTrack<R> {
    type Observation = Vec<u8>;
    type Info = LineInfo;

    fn num_actions(&self) -> usize {
        LineAction::VARIANTS.len()
    }

    fn step(&mut self, action: Action) -> Step<Self::Observation, Self::Info> {
        let action = LineAction::from_repr(action)
            .unwrap_or_else(|| panic!("Invalid action: {action}"));

        let max = self.config.max_curvature;
        self.curvature = (self.curvature + self.bend.sample(&mut self.rng)).clamp(-max, max);

        self.offset += match action {
            LineAction::Forward => self.curvature,
            LineAction::Left => self.config.turn_shift,
            LineAction::Right => -self.config.turn_shift,
        };
        self.offset += self.drift.sample(&mut self.rng);

        if self.bin().is_some() {
            self.lost = 0;
        } else {
            self.lost += 1;
        }
        let terminal = self.lost > self.config.lost_frames;
        let reward = if terminal { -200.0 } else { self.reward(action) };

        Step {
            observation: self.observe(),
            reward,
            terminal,
            info: self.info(),
        }
    }

    fn reset(&mut self) -> Self::Observation {
        self.offset = 0.5 + self.drift.sample(&mut self.rng);
        self.curvature = 0.0;
        self.lost = 0;
        self.observe()
    }
}
