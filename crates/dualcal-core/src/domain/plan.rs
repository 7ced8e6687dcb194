//! The frequency plan shared by every unit in a run.

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// How a [`FrequencyPlan`] was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    /// Regular sweep from `freq_lo_hz` in `freq_step_hz` increments.
    FixedStep,
    /// Peaks selected from a pre-scan spectrum.
    SignalInformed,
    /// Signal-informed planning found no usable peak and fell back to a sweep.
    FixedStepFallback,
}

/// Ordered calibration frequencies in Hz.
///
/// The constructor guarantees the list is non-empty, finite and strictly
/// increasing. A plan is never mutated after creation; units share it
/// through an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPlan")]
pub struct FrequencyPlan {
    frequencies: Vec<f64>,
    source: PlanSource,
}

#[derive(Deserialize)]
struct RawPlan {
    frequencies: Vec<f64>,
    source: PlanSource,
}

impl TryFrom<RawPlan> for FrequencyPlan {
    type Error = PlanError;

    fn try_from(raw: RawPlan) -> Result<Self, Self::Error> {
        Self::new(raw.frequencies, raw.source)
    }
}

impl FrequencyPlan {
    /// Build a plan, checking ordering.
    ///
    /// # Errors
    ///
    /// [`PlanError::Empty`] for an empty list and
    /// [`PlanError::NotIncreasing`] when an entry is not finite or is not
    /// greater than its predecessor.
    pub fn new(frequencies: Vec<f64>, source: PlanSource) -> PlanResult<Self> {
        if frequencies.is_empty() {
            return Err(PlanError::Empty);
        }
        if let Some(index) = frequencies.iter().position(|f| !f.is_finite()) {
            return Err(PlanError::NotIncreasing { index });
        }
        if let Some(index) = frequencies
            .windows(2)
            .position(|w| w[1] <= w[0])
            .map(|i| i + 1)
        {
            return Err(PlanError::NotIncreasing { index });
        }
        Ok(Self {
            frequencies,
            source,
        })
    }

    /// Planned frequencies in ascending order.
    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    /// How the plan was derived.
    #[must_use]
    pub fn source(&self) -> PlanSource {
        self.source
    }

    /// Number of planned frequencies (always at least one).
    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// Always `false`; provided for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Lowest planned frequency.
    #[must_use]
    pub fn first(&self) -> f64 {
        self.frequencies[0]
    }

    /// Highest planned frequency.
    #[must_use]
    pub fn last(&self) -> f64 {
        self.frequencies[self.frequencies.len() - 1]
    }
}
