//! Stop/target derivation shared by every strategy.
//!
//! Two families:
//! - moving-average stop: stop = MA at the signal bar, target = entry + rr × (entry − stop)
//! - structural stop: stop = box floor, target = entry + rr × box range
//!
//! When the computed risk is not positive the signal is kept and a synthetic
//! risk of `min_risk_fraction × entry` replaces it; the stop moves to
//! `entry − synthetic risk` so it sits below the entry.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Levels {
    pub stop: f64,
    pub target: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskRules {
    pub risk_reward_ratio: f64,
    pub min_risk_fraction: f64,
}

impl Default for RiskRules {
    fn default() -> Self {
        Self {
            risk_reward_ratio: 1.5,
            min_risk_fraction: 0.01,
        }
    }
}

impl RiskRules {
    /// Returns `(stop, risk)` with the synthetic-risk substitution applied.
    fn guarded(&self, entry: f64, stop: f64) -> (f64, f64) {
        let risk = entry - stop;
        if risk > 0.0 {
            (stop, risk)
        } else {
            let synthetic = entry * self.min_risk_fraction;
            (entry - synthetic, synthetic)
        }
    }

    pub fn from_stop(&self, entry: f64, stop: f64) -> Levels {
        let (stop, risk) = self.guarded(entry, stop);
        Levels {
            stop,
            target: entry + self.risk_reward_ratio * risk,
        }
    }

    pub fn structural(&self, entry: f64, floor: f64, range: f64) -> Levels {
        let (stop, risk) = self.guarded(entry, floor);
        let distance = if range > 0.0 { range } else { risk };
        Levels {
            stop,
            target: entry + self.risk_reward_ratio * distance,
        }
    }

    /// Uses `target` when it lies above the entry, otherwise falls back to
    /// the risk-multiple rule.
    pub fn with_target(&self, entry: f64, stop: f64, target: f64) -> Levels {
        if target > entry {
            let (stop, _) = self.guarded(entry, stop);
            Levels { stop, target }
        } else {
            self.from_stop(entry, stop)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rules(rr: f64) -> RiskRules {
        RiskRules {
            risk_reward_ratio: rr,
            min_risk_fraction: 0.01,
        }
    }

    #[test]
    fn ma_stop_target_is_risk_multiple() {
        let levels = rules(1.5).from_stop(100.0, 96.0);
        assert_relative_eq!(levels.stop, 96.0);
        assert_relative_eq!(levels.target, 106.0);
    }

    #[test]
    fn stop_above_entry_uses_synthetic_risk() {
        let levels = rules(1.0).from_stop(100.0, 101.0);
        assert_relative_eq!(levels.stop, 99.0);
        assert_relative_eq!(levels.target, 101.0);
    }

    #[test]
    fn stop_at_entry_uses_synthetic_risk() {
        let levels = rules(1.5).from_stop(50.0, 50.0);
        assert_relative_eq!(levels.stop, 49.5);
        assert_relative_eq!(levels.target, 50.75);
    }

    #[test]
    fn structural_target_uses_range() {
        let levels = rules(1.0).structural(110.0, 90.0, 15.0);
        assert_relative_eq!(levels.stop, 90.0);
        assert_relative_eq!(levels.target, 125.0);
    }

    #[test]
    fn structural_zero_range_falls_back_to_risk() {
        let levels = rules(1.0).structural(100.0, 95.0, 0.0);
        assert_relative_eq!(levels.target, 105.0);
    }

    #[test]
    fn explicit_target_below_entry_falls_back() {
        let levels = rules(1.0).with_target(100.0, 95.0, 99.0);
        assert_relative_eq!(levels.target, 105.0);
        let levels = rules(1.0).with_target(100.0, 95.0, 103.0);
        assert_relative_eq!(levels.target, 103.0);
    }
}
