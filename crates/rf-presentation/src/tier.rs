//! Win tiers - categorical win size relative to bet
//!
//! ```text
//!   multiplier = total_win / total_bet
//!
//!   ≤ 0 win     none
//!   < 10×       normal
//!   < 20×       big
//!   < 50×       mega
//!   ≥ 50×       epic
//! ```

use serde::{Deserialize, Serialize};

/// Lower bound of [`WinTier::Big`]
pub const BIG_WIN_MULTIPLIER: f64 = 10.0;
/// Lower bound of [`WinTier::Mega`]
pub const MEGA_WIN_MULTIPLIER: f64 = 20.0;
/// Lower bound of [`WinTier::Epic`]
pub const EPIC_WIN_MULTIPLIER: f64 = 50.0;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum WinTier {
    /// No win
    #[default]
    None,
    Normal,
    Big,
    Mega,
    Epic,
}

impl WinTier {
    /// Win-to-bet ratio; 0 when the bet is not positive
    pub fn multiplier(total_win: f64, total_bet: f64) -> f64 {
        if total_bet > 0.0 && total_win.is_finite() {
            total_win / total_bet
        } else {
            0.0
        }
    }

    /// Tier of a spin's total win
    ///
    /// A positive win on a non-positive bet has no meaningful ratio and
    /// resolves to [`WinTier::Normal`].
    pub fn from_win(total_win: f64, total_bet: f64) -> Self {
        if !total_win.is_finite() || total_win <= 0.0 {
            return Self::None;
        }
        if total_bet <= 0.0 {
            return Self::Normal;
        }
        Self::from_multiplier(total_win / total_bet)
    }

    /// Tier for a positive multiplier
    pub fn from_multiplier(multiplier: f64) -> Self {
        match multiplier {
            m if m >= EPIC_WIN_MULTIPLIER => Self::Epic,
            m if m >= MEGA_WIN_MULTIPLIER => Self::Mega,
            m if m >= BIG_WIN_MULTIPLIER => Self::Big,
            m if m > 0.0 => Self::Normal,
            _ => Self::None,
        }
    }

    /// Big, mega or epic
    pub fn is_big_win(&self) -> bool {
        *self >= Self::Big
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Normal => "normal",
            Self::Big => "big",
            Self::Mega => "mega",
            Self::Epic => "epic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Normal => "WIN",
            Self::Big => "BIG WIN",
            Self::Mega => "MEGA WIN",
            Self::Epic => "EPIC WIN",
        }
    }
}

impl std::fmt::Display for WinTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        let cases = [
            (9.99, WinTier::Normal),
            (10.0, WinTier::Big),
            (19.99, WinTier::Big),
            (20.0, WinTier::Mega),
            (49.99, WinTier::Mega),
            (50.0, WinTier::Epic),
            (500.0, WinTier::Epic),
        ];
        for (multiplier, expected) in cases {
            assert_eq!(WinTier::from_win(multiplier, 1.0), expected, "{multiplier}x");
        }
    }

    #[test]
    fn test_no_win_is_none() {
        assert_eq!(WinTier::from_win(0.0, 1.0), WinTier::None);
        assert_eq!(WinTier::from_win(-5.0, 1.0), WinTier::None);
        assert_eq!(WinTier::from_win(f64::NAN, 1.0), WinTier::None);
    }

    #[test]
    fn test_zero_bet() {
        assert_eq!(WinTier::from_win(25.0, 0.0), WinTier::Normal);
        assert_eq!(WinTier::multiplier(25.0, 0.0), 0.0);
    }

    #[test]
    fn test_monotonic() {
        let mut previous = WinTier::None;
        for step in 1..=1000 {
            let tier = WinTier::from_win(step as f64 * 0.1, 1.0);
            assert!(tier >= previous);
            previous = tier;
        }
        assert_eq!(previous, WinTier::Epic);
    }

    #[test]
    fn test_big_win_flag() {
        assert!(!WinTier::Normal.is_big_win());
        assert!(WinTier::Big.is_big_win());
        assert!(WinTier::Epic.is_big_win());
        assert_eq!(WinTier::from_win(100.0, 10.0), WinTier::Big);
    }
}
