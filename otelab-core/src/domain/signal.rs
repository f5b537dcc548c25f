use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Direction;

/// A fully specified entry decision. Created fresh per accepted entry and never
/// mutated after submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl TradeSignal {
    pub fn stop_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }

    pub fn target_distance(&self) -> f64 {
        (self.take_profit - self.entry_price).abs()
    }

    /// Reward-to-risk ratio of the unrounded levels (0 when the stop distance is 0).
    pub fn risk_reward(&self) -> f64 {
        let risk = self.stop_distance();
        if risk > 0.0 {
            self.target_distance() / risk
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn risk_reward_ratio() {
        let signal = TradeSignal {
            direction: Direction::Long,
            entry_price: 100.0,
            stop_loss: 98.0,
            take_profit: 106.0,
            confidence: 0.8,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        assert_eq!(signal.stop_distance(), 2.0);
        assert_eq!(signal.target_distance(), 6.0);
        assert_eq!(signal.risk_reward(), 3.0);
    }

    #[test]
    fn zero_risk_has_zero_ratio() {
        let signal = TradeSignal {
            direction: Direction::Short,
            entry_price: 100.0,
            stop_loss: 100.0,
            take_profit: 95.0,
            confidence: 0.5,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        };
        assert_eq!(signal.risk_reward(), 0.0);
    }
}
