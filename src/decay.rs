use crate::{check_interval, error::Error, Result};

/// An implementation of a time-decaying value
pub trait Decay {
    /// Calculate value at time `t`
    fn evaluate(&self, t: f32) -> f32;
}

fn validate(rate: f32, vi: f32, vf: f32) -> Result<()> {
    ((rate >= 0.0 && vi > vf) || (rate < 0.0 && vi < vf))
        .then_some(())
        .ok_or_else(|| {
            Error::InvalidConfiguration(String::from("`vi - vf` must have same sign as `rate`"))
        })
}

/// A constant value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Decay for Constant {
    fn evaluate(&self, _t: f32) -> f32 {
        self.value
    }
}

/// v(t) = max(v<sub>i</sub> - rt, v<sub>f</sub>)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Linear {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Linear {
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self> {
        validate(rate, vi, vf)?;
        Ok(Self { rate, vi, vf })
    }
}

impl Decay for Linear {
    fn evaluate(&self, t: f32) -> f32 {
        let &Self { rate, vi, vf } = self;
        (vi - rate * t).max(vf)
    }
}

/// v(t) = v<sub>i</sub> * r<sup>min(t, k)</sup>, where k is the first step with
/// v<sub>i</sub> * r<sup>k</sup> <= v<sub>f</sub>
///
/// The value is multiplied by `rate` once per whole step of `t` for as long as it is still
/// above the floor `vf`, so it settles on the first value at or below the floor rather than
/// on `vf` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Multiplicative {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Multiplicative {
    /// Fails unless `rate` is in `(0,1]` and `vi >= vf`
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self> {
        check_interval!(rate, > 0.0, 1.0);
        if vi < vf {
            return Err(Error::InvalidConfiguration(String::from(
                "`vi` must not be below the floor `vf`",
            )));
        }
        Ok(Self { rate, vi, vf })
    }
}

impl Default for Multiplicative {
    fn default() -> Self {
        Self {
            rate: 0.9986,
            vi: 0.9,
            vf: 0.05,
        }
    }
}

impl Decay for Multiplicative {
    fn evaluate(&self, t: f32) -> f32 {
        let &Self { rate, vi, vf } = self;
        let mut value = vi;
        let mut step = 0.0;
        while step < t && value > vf && rate < 1.0 {
            value *= rate;
            step += 1.0;
        }
        value
    }
}

impl<D: Decay + ?Sized> Decay for Box<D> {
    fn evaluate(&self, t: f32) -> f32 {
        (**self).evaluate(t)
    }
}
