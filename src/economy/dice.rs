//! Randomness source for probabilistic commands.

use std::collections::VecDeque;

use rand::Rng;

/// Uniform randomness consumed by the command processor.
pub trait Dice {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform integer in `[low, high)`; returns `low` for an empty range.
    fn between(&mut self, low: u64, high: u64) -> u64;
}

impl<R: Rng + ?Sized> Dice for R {
    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            low
        } else {
            self.gen_range(low..high)
        }
    }
}

/// Pre-recorded dice for tests and replays.
///
/// Draws are served in order; an exhausted queue yields `0.0` and the low
/// end of the range. Scripted integers are clamped into the requested range.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    units: VecDeque<f64>,
    integers: VecDeque<u64>,
}

impl ScriptedDice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(mut self, units: impl IntoIterator<Item = f64>) -> Self {
        self.units.extend(units);
        self
    }

    pub fn with_integers(mut self, integers: impl IntoIterator<Item = u64>) -> Self {
        self.integers.extend(integers);
        self
    }
}

impl Dice for ScriptedDice {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(0.0)
    }

    fn between(&mut self, low: u64, high: u64) -> u64 {
        let value = self.integers.pop_front().unwrap_or(low);
        if high <= low {
            low
        } else {
            value.clamp(low, high - 1)
        }
    }
}
