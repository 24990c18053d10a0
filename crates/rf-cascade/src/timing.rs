//! Cascade timing profiles
//!
//! Durations in milliseconds. Every phase of a cascade step reads its tween
//! length from here, so a turbo/instant switch changes the whole pipeline.

use serde::{Deserialize, Serialize};

use crate::step::SpinStep;

/// Timing profile identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CascadeProfile {
    /// Normal gameplay speed
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// No delays, for tests and headless replay
    Instant,
}

impl CascadeProfile {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Turbo => "Turbo",
            Self::Instant => "Instant",
        }
    }
}

/// Cascade step timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeTiming {
    pub profile: CascadeProfile,
    /// Removal fade-out (ms)
    pub removal_ms: f64,
    /// Survivor drop tween (ms)
    pub drop_ms: f64,
    /// Refill entrance tween (ms)
    pub refill_ms: f64,
    /// Extra delay per refill index (ms)
    pub refill_stagger_ms: f64,
    /// Flat minimum hold for a step with wins (ms)
    pub result_min_display_ms: f64,
    /// Hold per win line (ms)
    pub per_win_display_ms: f64,
}

impl Default for CascadeTiming {
    fn default() -> Self {
        Self::normal()
    }
}

impl CascadeTiming {
    pub fn normal() -> Self {
        Self {
            profile: CascadeProfile::Normal,
            removal_ms: 300.0,
            drop_ms: 250.0,
            refill_ms: 300.0,
            refill_stagger_ms: 40.0,
            result_min_display_ms: 800.0,
            per_win_display_ms: 300.0,
        }
    }

    pub fn turbo() -> Self {
        Self {
            profile: CascadeProfile::Turbo,
            removal_ms: 120.0,
            drop_ms: 100.0,
            refill_ms: 120.0,
            refill_stagger_ms: 15.0,
            result_min_display_ms: 300.0,
            per_win_display_ms: 100.0,
        }
    }

    pub fn instant() -> Self {
        Self {
            profile: CascadeProfile::Instant,
            removal_ms: 0.0,
            drop_ms: 0.0,
            refill_ms: 0.0,
            refill_stagger_ms: 0.0,
            result_min_display_ms: 0.0,
            per_win_display_ms: 0.0,
        }
    }

    pub fn from_profile(profile: CascadeProfile) -> Self {
        match profile {
            CascadeProfile::Normal => Self::normal(),
            CascadeProfile::Turbo => Self::turbo(),
            CascadeProfile::Instant => Self::instant(),
        }
    }

    /// Hold after a highlight: `max(flat minimum, per win × count)`
    pub fn win_display_ms(&self, win_count: usize) -> f64 {
        if win_count == 0 {
            return 0.0;
        }
        self.result_min_display_ms
            .max(self.per_win_display_ms * win_count as f64)
    }

    /// Entrance delay for the `index`-th refill
    pub fn refill_delay_ms(&self, index: usize) -> f64 {
        self.refill_stagger_ms * index as f64
    }

    /// Declared time to present `steps`, used for progress only
    pub fn estimate_ms(&self, steps: &[SpinStep]) -> f64 {
        steps
            .iter()
            .map(|step| {
                let hold = self.win_display_ms(step.wins().len());
                match step {
                    SpinStep::Result(_) => hold,
                    SpinStep::Cascade(cascade) => {
                        let last_refill = cascade.refills.len().saturating_sub(1);
                        self.removal_ms
                            + self.drop_ms
                            + self.refill_ms
                            + self.refill_delay_ms(last_refill)
                            + hold
                    }
                }
            })
            .sum()
    }

    /// True when every duration is finite and non-negative
    pub fn is_valid(&self) -> bool {
        [
            self.removal_ms,
            self.drop_ms,
            self.refill_ms,
            self.refill_stagger_ms,
            self.result_min_display_ms,
            self.per_win_display_ms,
        ]
        .iter()
        .all(|ms| ms.is_finite() && *ms >= 0.0)
    }
}
