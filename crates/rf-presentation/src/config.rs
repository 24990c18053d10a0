//! Presentation configuration
//!
//! Loaded from TOML. Every section has defaults, so a file only needs the
//! keys it changes:
//!
//! ```toml
//! trigger_policy = "FEATURE_END"
//!
//! [holds]
//! epic_ms = 6000.0
//! ```

use rf_cascade::CascadeTiming;
use serde::{Deserialize, Serialize};

use crate::error::PresentationError;
use crate::tier::WinTier;
use crate::trigger::TriggerPolicy;

/// Big-win hold per tier (ms)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierHolds {
    pub normal_ms: f64,
    pub big_ms: f64,
    pub mega_ms: f64,
    pub epic_ms: f64,
}

impl Default for TierHolds {
    fn default() -> Self {
        Self {
            normal_ms: 1500.0,
            big_ms: 3000.0,
            mega_ms: 4000.0,
            epic_ms: 5000.0,
        }
    }
}

impl TierHolds {
    pub fn hold_ms(&self, tier: WinTier) -> f64 {
        match tier {
            WinTier::None => 0.0,
            WinTier::Normal => self.normal_ms,
            WinTier::Big => self.big_ms,
            WinTier::Mega => self.mega_ms,
            WinTier::Epic => self.epic_ms,
        }
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            normal_ms: self.normal_ms * factor,
            big_ms: self.big_ms * factor,
            mega_ms: self.mega_ms * factor,
            epic_ms: self.epic_ms * factor,
        }
    }
}

/// Total-win count-up duration
///
/// `clamp(multiplier × ms_per_multiple, min_ms, max_ms)` for a positive win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    pub min_ms: f64,
    pub max_ms: f64,
    pub ms_per_multiple: f64,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            min_ms: 500.0,
            max_ms: 4000.0,
            ms_per_multiple: 100.0,
        }
    }
}

impl RollupConfig {
    pub fn duration_ms(&self, total_win: f64, total_bet: f64) -> f64 {
        if !total_win.is_finite() || total_win <= 0.0 {
            return 0.0;
        }
        let multiplier = WinTier::multiplier(total_win, total_bet);
        (multiplier * self.ms_per_multiple).clamp(self.min_ms, self.max_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    pub trigger_policy: TriggerPolicy,
    pub cascade: CascadeTiming,
    pub holds: TierHolds,
    pub rollup: RollupConfig,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self::normal()
    }
}

impl PresentationConfig {
    pub fn normal() -> Self {
        Self {
            trigger_policy: TriggerPolicy::default(),
            cascade: CascadeTiming::normal(),
            holds: TierHolds::default(),
            rollup: RollupConfig::default(),
        }
    }

    /// Turbo: faster cascade, halved holds and rollup
    pub fn turbo() -> Self {
        let rollup = RollupConfig::default();
        Self {
            trigger_policy: TriggerPolicy::default(),
            cascade: CascadeTiming::turbo(),
            holds: TierHolds::default().scaled(0.5),
            rollup: RollupConfig {
                min_ms: rollup.min_ms * 0.5,
                max_ms: rollup.max_ms * 0.5,
                ms_per_multiple: rollup.ms_per_multiple * 0.5,
            },
        }
    }

    /// No delays (for testing and headless replay)
    pub fn instant() -> Self {
        Self {
            trigger_policy: TriggerPolicy::default(),
            cascade: CascadeTiming::instant(),
            holds: TierHolds::default().scaled(0.0),
            rollup: RollupConfig {
                min_ms: 0.0,
                max_ms: 0.0,
                ms_per_multiple: 0.0,
            },
        }
    }

    pub fn with_trigger_policy(mut self, policy: TriggerPolicy) -> Self {
        self.trigger_policy = policy;
        self
    }

    /// Load from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, PresentationError> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| PresentationError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML string
    pub fn to_toml(&self) -> Result<String, PresentationError> {
        toml::to_string_pretty(self).map_err(|e| PresentationError::Config(e.to_string()))
    }

    pub fn hold_ms(&self, tier: WinTier) -> f64 {
        self.holds.hold_ms(tier)
    }

    pub fn rollup_ms(&self, total_win: f64, total_bet: f64) -> f64 {
        self.rollup.duration_ms(total_win, total_bet)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PresentationError> {
        if !self.cascade.is_valid() {
            return Err(PresentationError::Config(
                "cascade durations must be finite and non-negative".to_string(),
            ));
        }

        let holds = [
            self.holds.normal_ms,
            self.holds.big_ms,
            self.holds.mega_ms,
            self.holds.epic_ms,
        ];
        if holds.iter().any(|ms| !ms.is_finite() || *ms < 0.0) {
            return Err(PresentationError::Config(
                "tier holds must be finite and non-negative".to_string(),
            ));
        }

        let rollup = &self.rollup;
        let rollup_values = [rollup.min_ms, rollup.max_ms, rollup.ms_per_multiple];
        if rollup_values.iter().any(|ms| !ms.is_finite() || *ms < 0.0) {
            return Err(PresentationError::Config(
                "rollup durations must be finite and non-negative".to_string(),
            ));
        }
        if rollup.min_ms > rollup.max_ms {
            return Err(PresentationError::Config(format!(
                "rollup min_ms ({}) exceeds max_ms ({})",
                rollup.min_ms, rollup.max_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_holds() {
        let config = PresentationConfig::default();
        assert_eq!(config.hold_ms(WinTier::Epic), 5000.0);
        assert_eq!(config.hold_ms(WinTier::Mega), 4000.0);
        assert_eq!(config.hold_ms(WinTier::Big), 3000.0);
        assert_eq!(config.hold_ms(WinTier::Normal), 1500.0);
        assert_eq!(config.hold_ms(WinTier::None), 0.0);
    }

    #[test]
    fn test_rollup_clamped() {
        let rollup = RollupConfig::default();
        assert_eq!(rollup.duration_ms(0.0, 1.0), 0.0);
        assert_eq!(rollup.duration_ms(1.0, 1.0), 500.0);
        assert_eq!(rollup.duration_ms(10.0, 1.0), 1000.0);
        assert_eq!(rollup.duration_ms(1000.0, 1.0), 4000.0);
        // Zero bet falls back to the minimum
        assert_eq!(rollup.duration_ms(10.0, 0.0), 500.0);
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let config = PresentationConfig::turbo().with_trigger_policy(TriggerPolicy::FeatureEnd);

        let toml = config.to_toml().unwrap();
        let parsed = PresentationConfig::from_toml(&toml).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = PresentationConfig::from_toml(
            r#"
            trigger_policy = "RESULT_DATA_FINALIZED"

            [holds]
            epic_ms = 6000.0
            "#,
        )
        .unwrap();

        assert_eq!(parsed.trigger_policy, TriggerPolicy::ResultDataFinalized);
        assert_eq!(parsed.holds.epic_ms, 6000.0);
        assert_eq!(parsed.holds.big_ms, 3000.0);
        assert_eq!(parsed.cascade, CascadeTiming::normal());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PresentationConfig::default();
        assert!(config.validate().is_ok());

        config.rollup.min_ms = 9000.0;
        assert!(matches!(config.validate(), Err(PresentationError::Config(_))));

        let mut config = PresentationConfig::default();
        config.holds.big_ms = f64::NAN;
        assert!(config.validate().is_err());

        assert!(PresentationConfig::from_toml("trigger_policy = \"SOMETIMES\"").is_err());
    }
}
