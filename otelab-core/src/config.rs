//! Engine configuration.
//!
//! Every section carries `#[serde(default)]`, so a TOML file only needs to name the
//! values it overrides. Distances are in pips, reward thresholds in R-multiples.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{BrokerLimits, StructureEvent, SweepLabel};
use crate::error::ConfigError;

/// Top-level configuration for a `DecisionEngine`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub risk: RiskConfig,
    pub broker: BrokerLimits,
    pub volatility: VolatilityConfig,
    pub stop_sizer: StopSizerConfig,
    pub guard: GuardConfig,
    pub sequence: SequenceConfig,
    pub sweep_filter: SweepFilter,
    pub episode: EpisodeConfig,
    pub entry: EntryConfig,
    pub exits: ExitConfig,
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("risk.risk_percent", self.risk.risk_percent)?;
        positive("risk.min_risk_reward", self.risk.min_risk_reward)?;
        positive("risk.max_margin_utilization", self.risk.max_margin_utilization)?;
        positive("risk.max_notional_multiple", self.risk.max_notional_multiple)?;

        positive("broker.contract_size", self.broker.contract_size)?;
        positive("broker.min_volume", self.broker.min_volume)?;
        positive("broker.volume_step", self.broker.volume_step)?;
        if self.broker.max_volume < self.broker.min_volume {
            return Err(invalid("broker.max_volume", "must be >= broker.min_volume"));
        }

        self.volatility.validate()?;
        self.stop_sizer.validate()?;

        if !(0.0 < self.guard.reduce_ratio && self.guard.reduce_ratio < self.guard.reject_ratio) {
            return Err(invalid(
                "guard.reduce_ratio",
                "must satisfy 0 < reduce_ratio < reject_ratio",
            ));
        }
        if !(0.0 < self.guard.reduced_size_multiplier && self.guard.reduced_size_multiplier <= 1.0) {
            return Err(invalid("guard.reduced_size_multiplier", "must be in (0, 1]"));
        }

        if self.sequence.lookback_bars == 0 {
            return Err(invalid("sequence.lookback_bars", "must be > 0"));
        }
        if self.episode.max_age_bars == 0 {
            return Err(invalid("episode.max_age_bars", "must be > 0"));
        }

        self.exits.validate()
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "must be a positive number"))
    }
}

fn fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be in [0, 1]"))
    }
}

pub(crate) fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Account-level risk budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Percent of equity risked per trade (1.0 = 1%).
    pub risk_percent: f64,
    /// Minimum reward/risk after price rounding.
    pub min_risk_reward: f64,
    /// Share of free margin a new position may consume.
    pub max_margin_utilization: f64,
    /// Maximum position notional as a multiple of equity.
    pub max_notional_multiple: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_percent: 1.0,
            min_risk_reward: 1.0,
            max_margin_utilization: 0.5,
            max_notional_multiple: 10.0,
        }
    }
}

/// Z-score buckets of the volatility classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub low_z: f64,
    pub high_z: f64,
    pub low_multiplier: f64,
    pub normal_multiplier: f64,
    pub high_multiplier: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            low_z: -0.5,
            high_z: 0.5,
            low_multiplier: 1.2,
            normal_multiplier: 1.5,
            high_multiplier: 1.8,
        }
    }
}

impl VolatilityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low_z >= self.high_z {
            return Err(invalid("volatility.low_z", "must be below volatility.high_z"));
        }
        positive("volatility.low_multiplier", self.low_multiplier)?;
        positive("volatility.normal_multiplier", self.normal_multiplier)?;
        positive("volatility.high_multiplier", self.high_multiplier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopSizerConfig {
    /// Minimum stop before the safety clamp.
    pub floor_pips: f64,
    pub min_abs_pips: f64,
    pub max_abs_pips: f64,
}

impl Default for StopSizerConfig {
    fn default() -> Self {
        Self {
            floor_pips: 5.0,
            min_abs_pips: 15.0,
            max_abs_pips: 50.0,
        }
    }
}

impl StopSizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floor_pips < 0.0 {
            return Err(invalid("stop_sizer.floor_pips", "must be >= 0"));
        }
        positive("stop_sizer.min_abs_pips", self.min_abs_pips)?;
        if self.max_abs_pips < self.min_abs_pips {
            return Err(invalid(
                "stop_sizer.max_abs_pips",
                "must be >= stop_sizer.min_abs_pips",
            ));
        }
        Ok(())
    }
}

/// Spread-to-ATR veto thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// `spread / atr` at or above this rejects the trade.
    pub reject_ratio: f64,
    /// `spread / atr` at or above this (and below `reject_ratio`) shrinks the size.
    pub reduce_ratio: f64,
    pub reduced_size_multiplier: f64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            reject_ratio: 0.40,
            reduce_ratio: 0.25,
            reduced_size_multiplier: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub lookback_bars: usize,
    /// Enables the extended and any-direction tiers.
    pub allow_fallback: bool,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            lookback_bars: 50,
            allow_fallback: true,
        }
    }
}

/// Which sweep labels may open an episode or satisfy the sequence gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepFilter {
    pub prior_day: bool,
    pub current_day: bool,
    pub equal_levels: bool,
    pub weekly: bool,
    pub internal_swing: bool,
}

impl Default for SweepFilter {
    fn default() -> Self {
        Self {
            prior_day: true,
            current_day: true,
            equal_levels: true,
            weekly: true,
            internal_swing: false,
        }
    }
}

impl SweepFilter {
    pub fn accepts(&self, label: SweepLabel) -> bool {
        match label {
            SweepLabel::PriorDayHigh | SweepLabel::PriorDayLow => self.prior_day,
            SweepLabel::CurrentDayHigh | SweepLabel::CurrentDayLow => self.current_day,
            SweepLabel::EqualHighs | SweepLabel::EqualLows => self.equal_levels,
            SweepLabel::WeeklyHigh | SweepLabel::WeeklyLow => self.weekly,
            SweepLabel::InternalSwing => self.internal_swing,
        }
    }

    /// A sweep event whose label is enabled. Unlabelled or non-sweep events never pass.
    pub fn accepts_event(&self, event: &StructureEvent) -> bool {
        event.is_sweep() && event.label.is_some_and(|label| self.accepts(label))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Episodes older than this are force-reset.
    pub max_age_bars: usize,
    /// Minimum distance between sweep and break for the break to qualify.
    pub min_break_displacement_pips: f64,
    /// Bars scanned for a swing extreme when no liquidity level is supplied.
    pub liquidity_fallback_bars: usize,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            max_age_bars: 400,
            min_break_displacement_pips: 0.0,
            liquidity_fallback_bars: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Label attached to every order request.
    pub order_label: String,
    pub base_confidence: f64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            order_label: "otelab".to_string(),
            base_confidence: 0.8,
        }
    }
}

/// Exit-strategy battery. One sub-table per strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    pub break_even: BreakEvenConfig,
    pub partial_close: PartialCloseConfig,
    pub structural: StructuralExitConfig,
    pub momentum: MomentumExitConfig,
    pub divergence: DivergenceExitConfig,
    pub failure_swing: FailureSwingConfig,
    pub time_exit: TimeExitConfig,
    pub trailing: TrailingConfig,
}

impl ExitConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.break_even.trigger {
            BreakEvenTrigger::RMultiple { r } => positive("exits.break_even.trigger.r", r)?,
            BreakEvenTrigger::Distance { pips } => {
                positive("exits.break_even.trigger.pips", pips)?
            }
        }
        positive("exits.partial_close.trigger_r", self.partial_close.trigger_r)?;
        if !(0.0 < self.partial_close.fraction && self.partial_close.fraction < 1.0) {
            return Err(invalid("exits.partial_close.fraction", "must be in (0, 1)"));
        }
        fraction("exits.structural.lock_fraction", self.structural.lock_fraction)?;
        fraction("exits.momentum.choppy_lock", self.momentum.choppy_lock)?;
        fraction("exits.momentum.aligned_lock", self.momentum.aligned_lock)?;
        fraction("exits.divergence.lock_fraction", self.divergence.lock_fraction)?;
        fraction("exits.failure_swing.lock_fraction", self.failure_swing.lock_fraction)?;
        if self.momentum.efficiency_window < 2 || self.momentum.momentum_period == 0 {
            return Err(invalid(
                "exits.momentum",
                "efficiency_window must be >= 2 and momentum_period > 0",
            ));
        }
        if self.momentum.choppy_below >= self.momentum.aligned_above {
            return Err(invalid(
                "exits.momentum.choppy_below",
                "must be below exits.momentum.aligned_above",
            ));
        }
        if self.divergence.window < 4 || self.divergence.rsi_period == 0 {
            return Err(invalid(
                "exits.divergence",
                "window must be >= 4 and rsi_period > 0",
            ));
        }
        if self.failure_swing.window < 2 {
            return Err(invalid("exits.failure_swing.window", "must be >= 2"));
        }
        positive("exits.time_exit.max_hours", self.time_exit.max_hours)?;
        positive("exits.trailing.distance_pips", self.trailing.distance_pips)?;
        Ok(())
    }
}

/// Reward at which the stop moves to break-even.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BreakEvenTrigger {
    RMultiple { r: f64 },
    Distance { pips: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakEvenConfig {
    pub enabled: bool,
    pub trigger: BreakEvenTrigger,
    /// Stop lands this far beyond entry, in the position's favour.
    pub offset_pips: f64,
}

impl Default for BreakEvenConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger: BreakEvenTrigger::RMultiple { r: 1.0 },
            offset_pips: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialCloseConfig {
    pub enabled: bool,
    pub trigger_r: f64,
    /// Share of the open volume to close.
    pub fraction: f64,
}

impl Default for PartialCloseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_r: 1.5,
            fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralExitConfig {
    pub enabled: bool,
    /// Share of current profit locked on an opposing break.
    pub lock_fraction: f64,
}

impl Default for StructuralExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lock_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumExitConfig {
    pub enabled: bool,
    /// Opposing body at least this many ATRs counts as an impulse.
    pub impulse_atr_multiple: f64,
    /// Stop buffer from price after an opposing impulse.
    pub impulse_buffer_pips: f64,
    /// Bars used for the efficiency ratio.
    pub efficiency_window: usize,
    /// Efficiency ratio below this is choppy.
    pub choppy_below: f64,
    /// Efficiency ratio at or above this is a clean trend.
    pub aligned_above: f64,
    /// Lookback of the close-to-close momentum used for exhaustion.
    pub momentum_period: usize,
    pub choppy_min_r: f64,
    pub choppy_lock: f64,
    pub exhaustion_min_r: f64,
    pub aligned_min_r: f64,
    pub aligned_lock: f64,
}

impl Default for MomentumExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            impulse_atr_multiple: 1.5,
            impulse_buffer_pips: 5.0,
            efficiency_window: 8,
            choppy_below: 0.3,
            aligned_above: 0.6,
            momentum_period: 5,
            choppy_min_r: 1.0,
            choppy_lock: 0.6,
            exhaustion_min_r: 2.0,
            aligned_min_r: 1.0,
            aligned_lock: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceExitConfig {
    pub enabled: bool,
    pub rsi_period: usize,
    /// Bars compared for divergence (split into an older and a newer half).
    pub window: usize,
    pub min_r: f64,
    pub lock_fraction: f64,
}

impl Default for DivergenceExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rsi_period: 14,
            window: 20,
            min_r: 0.5,
            lock_fraction: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FailureSwingConfig {
    pub enabled: bool,
    pub window: usize,
    /// Required favourable extension over the window, in ATRs.
    pub atr_multiple: f64,
    pub min_r: f64,
    pub lock_fraction: f64,
}

impl Default for FailureSwingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window: 10,
            atr_multiple: 2.0,
            min_r: 0.3,
            lock_fraction: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeExitConfig {
    pub enabled: bool,
    pub max_hours: f64,
    /// Below this reward a stale position is closed.
    pub close_below_r: f64,
    /// At or below this reward the position is left to its stop.
    pub deep_loss_r: f64,
    /// Below this reward (and at or above `close_below_r`) the stop moves to entry.
    pub breakeven_below_r: f64,
}

impl Default for TimeExitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hours: 4.0,
            close_below_r: 0.5,
            deep_loss_r: -0.5,
            breakeven_below_r: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrailingConfig {
    pub enabled: bool,
    /// Trailing starts once reward exceeds this.
    pub start_r: f64,
    pub distance_pips: f64,
}

impl Default for TrailingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_r: 1.0,
            distance_pips: 20.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_toml_overrides_named_values() {
        let toml_str = r#"
[risk]
risk_percent = 0.5

[sequence]
lookback_bars = 30
allow_fallback = false

[sweep_filter]
internal_swing = true

[exits.break_even.trigger]
type = "distance"
pips = 12.0

[exits.trailing]
enabled = false
"#;
        let config = EngineConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.risk.risk_percent, 0.5);
        assert_eq!(config.risk.min_risk_reward, 1.0);
        assert_eq!(config.sequence.lookback_bars, 30);
        assert!(!config.sequence.allow_fallback);
        assert!(config.sweep_filter.internal_swing);
        assert_eq!(
            config.exits.break_even.trigger,
            BreakEvenTrigger::Distance { pips: 12.0 }
        );
        assert!(!config.exits.trailing.enabled);
        assert_eq!(config.exits.partial_close.trigger_r, 1.5);
    }

    #[test]
    fn inverted_clamp_band_is_rejected() {
        let toml_str = r#"
[stop_sizer]
min_abs_pips = 60.0
max_abs_pips = 50.0
"#;
        let err = EngineConfig::from_toml(toml_str).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "stop_sizer.max_abs_pips",
                ..
            }
        ));
    }

    #[test]
    fn guard_ratios_out_of_order_are_rejected() {
        let mut config = EngineConfig::default();
        config.guard.reduce_ratio = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml("[risk\nrisk_percent = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn sweep_filter_toggles_by_label_family() {
        let filter = SweepFilter::default();
        assert!(filter.accepts(SweepLabel::PriorDayLow));
        assert!(filter.accepts(SweepLabel::EqualHighs));
        assert!(!filter.accepts(SweepLabel::InternalSwing));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = EngineConfig::default();
        let text = toml::to_string(&config).unwrap();
        let back = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(config, back);
    }
}
