//! Episode lifecycle: the lock/unlock state machine that owns exactly one
//! sweep -> break -> zone cycle at a time.
//!
//! ```text
//! Idle ──new accepted sweep (≠ consumed)──▶ AwaitingBreak
//! AwaitingBreak ──first qualifying break──▶ LockedBreak   (sweep becomes consumed)
//! LockedBreak ──first zone in break direction──▶ LockedZone
//! LockedZone ──entry submitted / target touched──▶ flag set
//! flag set ──next bar──▶ Idle                          (consumed sweep kept)
//! any state ──age > max_age_bars──▶ Idle                (consumed sweep cleared)
//! ```
//!
//! All transitions run inline on one bar, in the order above. While an episode is
//! live, events that do not belong to it are ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{EpisodeConfig, SweepFilter};
use crate::domain::{BarSeries, Direction, RetracementZone, StructureEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeState {
    Idle,
    AwaitingBreak,
    LockedBreak,
    LockedZone,
}

impl EpisodeState {
    pub fn is_locked(self) -> bool {
        matches!(self, EpisodeState::LockedBreak | EpisodeState::LockedZone)
    }
}

/// The single live episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub state: EpisodeState,
    /// Sweep that opened the episode.
    pub sweep: Option<StructureEvent>,
    pub locked_break: Option<StructureEvent>,
    pub locked_zone: Option<RetracementZone>,
    /// Take-profit reference recorded when the break locked.
    pub opposite_liquidity: Option<f64>,
    pub entry_occurred: bool,
    pub target_touched: bool,
    /// Bar index the episode opened on; ages are measured from here.
    pub opened_at_index: Option<usize>,
    pub locked_at: Option<DateTime<Utc>>,
}

impl Default for Episode {
    fn default() -> Self {
        Self {
            state: EpisodeState::Idle,
            sweep: None,
            locked_break: None,
            locked_zone: None,
            opposite_liquidity: None,
            entry_occurred: false,
            target_touched: false,
            opened_at_index: None,
            locked_at: None,
        }
    }
}

/// What happened to the episode during one update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EpisodeEvent {
    TornDown { entry_occurred: bool, target_touched: bool },
    Expired { age_bars: usize },
    Opened { sweep_time: DateTime<Utc>, direction: Direction },
    SweepReplaced { sweep_time: DateTime<Utc> },
    BreakLocked { break_time: DateTime<Utc>, opposite_liquidity: Option<f64> },
    ZoneLocked { zone_time: DateTime<Utc>, low: f64, high: f64 },
    TargetTouched { level: f64 },
}

/// Per-bar input: the series as of the closed bar plus events first seen on it.
#[derive(Debug, Clone, Copy)]
pub struct EpisodeUpdate<'a> {
    pub series: &'a BarSeries,
    pub new_sweeps: &'a [StructureEvent],
    pub new_breaks: &'a [StructureEvent],
    pub new_zones: &'a [RetracementZone],
    /// Externally supplied liquidity pool prices.
    pub liquidity_levels: &'a [f64],
    pub pip_size: f64,
}

/// The locked pieces an entry may be built from.
#[derive(Debug, Clone, Copy)]
pub struct EntryCandidate<'a> {
    pub sweep: &'a StructureEvent,
    pub structure_break: &'a StructureEvent,
    pub zone: &'a RetracementZone,
    pub opposite_liquidity: Option<f64>,
}

impl EntryCandidate<'_> {
    pub fn direction(&self) -> Direction {
        self.structure_break.direction
    }
}

#[derive(Debug, Clone)]
pub struct EpisodeManager {
    config: EpisodeConfig,
    filter: SweepFilter,
    episode: Episode,
    /// Sweep (by timestamp) that already produced a locked episode.
    consumed_sweep: Option<DateTime<Utc>>,
}

impl EpisodeManager {
    pub fn new(config: EpisodeConfig, filter: SweepFilter) -> Self {
        Self {
            config,
            filter,
            episode: Episode::default(),
            consumed_sweep: None,
        }
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn state(&self) -> EpisodeState {
        self.episode.state
    }

    pub fn consumed_sweep(&self) -> Option<DateTime<Utc>> {
        self.consumed_sweep
    }

    /// Advance the state machine by one closed bar.
    pub fn update(&mut self, input: &EpisodeUpdate<'_>) -> Vec<EpisodeEvent> {
        let mut events = Vec::new();
        let Some(current_index) = input.series.current_index() else {
            return events;
        };

        if self.episode.state != EpisodeState::Idle
            && (self.episode.entry_occurred || self.episode.target_touched)
        {
            events.push(EpisodeEvent::TornDown {
                entry_occurred: self.episode.entry_occurred,
                target_touched: self.episode.target_touched,
            });
            debug!(consumed = ?self.consumed_sweep, "Episode torn down");
            self.episode = Episode::default();
        }

        if let Some(opened) = self.episode.opened_at_index {
            let age_bars = current_index.saturating_sub(opened);
            if age_bars > self.config.max_age_bars {
                info!(age_bars, "Stale episode expired");
                events.push(EpisodeEvent::Expired { age_bars });
                self.episode = Episode::default();
                self.consumed_sweep = None;
            }
        }

        if matches!(
            self.episode.state,
            EpisodeState::Idle | EpisodeState::AwaitingBreak
        ) {
            self.observe_sweeps(input, current_index, &mut events);
        }
        if self.episode.state == EpisodeState::AwaitingBreak {
            self.observe_breaks(input, &mut events);
        }
        if self.episode.state == EpisodeState::LockedBreak {
            self.observe_zones(input, &mut events);
        }
        if self.episode.state == EpisodeState::LockedZone && !self.episode.target_touched {
            self.observe_target(input, &mut events);
        }
        events
    }

    /// The locked break and zone, while the episode is still open for entry.
    pub fn entry_candidate(&self) -> Option<EntryCandidate<'_>> {
        let ep = &self.episode;
        if ep.state != EpisodeState::LockedZone || ep.entry_occurred || ep.target_touched {
            return None;
        }
        Some(EntryCandidate {
            sweep: ep.sweep.as_ref()?,
            structure_break: ep.locked_break.as_ref()?,
            zone: ep.locked_zone.as_ref()?,
            opposite_liquidity: ep.opposite_liquidity,
        })
    }

    /// Record that an order was sent from the locked zone.
    ///
    /// Called whether or not the gateway accepted it, so one zone never sends a
    /// second order. Rejections before submission do not consume the zone.
    pub fn mark_entry(&mut self) {
        if self.episode.state == EpisodeState::LockedZone {
            self.episode.entry_occurred = true;
        }
    }

    fn observe_sweeps(
        &mut self,
        input: &EpisodeUpdate<'_>,
        current_index: usize,
        events: &mut Vec<EpisodeEvent>,
    ) {
        let candidate_time = self.episode.sweep.as_ref().map(|s| s.time);
        let newest = input.new_sweeps.iter().rev().find(|s| {
            self.filter.accepts_event(s)
                && Some(s.time) != self.consumed_sweep
                && candidate_time.map_or(true, |t| s.time > t)
        });
        let Some(sweep) = newest else {
            return;
        };

        if self.episode.state == EpisodeState::Idle {
            events.push(EpisodeEvent::Opened {
                sweep_time: sweep.time,
                direction: sweep.direction,
            });
            debug!(sweep_time = %sweep.time, direction = %sweep.direction, "Episode opened");
        } else {
            events.push(EpisodeEvent::SweepReplaced {
                sweep_time: sweep.time,
            });
        }
        self.episode = Episode {
            state: EpisodeState::AwaitingBreak,
            sweep: Some(sweep.clone()),
            opened_at_index: Some(current_index),
            ..Episode::default()
        };
    }

    fn observe_breaks(&mut self, input: &EpisodeUpdate<'_>, events: &mut Vec<EpisodeEvent>) {
        let Some(sweep) = self.episode.sweep.as_ref() else {
            return;
        };
        let min_displacement = self.config.min_break_displacement_pips * input.pip_size;
        let qualifying = input.new_breaks.iter().find(|b| {
            b.is_break()
                && b.direction == sweep.direction
                && b.time > sweep.time
                && (b.price - sweep.price).abs() >= min_displacement
        });
        let Some(brk) = qualifying else {
            return;
        };

        let opposite_liquidity = self.opposite_liquidity(brk.direction, input);
        let sweep_time = sweep.time;
        self.consumed_sweep = Some(sweep_time);
        self.episode.state = EpisodeState::LockedBreak;
        self.episode.locked_break = Some(brk.clone());
        self.episode.opposite_liquidity = opposite_liquidity;
        self.episode.entry_occurred = false;
        self.episode.target_touched = false;
        self.episode.locked_at = input.series.last().map(|b| b.time);

        info!(
            sweep_time = %sweep_time,
            break_time = %brk.time,
            direction = %brk.direction,
            opposite_liquidity = ?opposite_liquidity,
            "Structure break locked"
        );
        events.push(EpisodeEvent::BreakLocked {
            break_time: brk.time,
            opposite_liquidity,
        });
    }

    fn observe_zones(&mut self, input: &EpisodeUpdate<'_>, events: &mut Vec<EpisodeEvent>) {
        let Some(brk) = self.episode.locked_break.as_ref() else {
            return;
        };
        let matching = input
            .new_zones
            .iter()
            .find(|z| z.direction == brk.direction && z.time >= brk.time);
        let Some(zone) = matching else {
            return;
        };

        debug!(zone_time = %zone.time, low = zone.low, high = zone.high, "Zone locked");
        events.push(EpisodeEvent::ZoneLocked {
            zone_time: zone.time,
            low: zone.low,
            high: zone.high,
        });
        self.episode.locked_zone = Some(zone.clone());
        self.episode.state = EpisodeState::LockedZone;
    }

    fn observe_target(&mut self, input: &EpisodeUpdate<'_>, events: &mut Vec<EpisodeEvent>) {
        let (Some(level), Some(brk), Some(bar)) = (
            self.episode.opposite_liquidity,
            self.episode.locked_break.as_ref(),
            input.series.last(),
        ) else {
            return;
        };
        let touched = match brk.direction {
            Direction::Long => bar.high >= level,
            Direction::Short => bar.low <= level,
        };
        if touched {
            debug!(level, "Opposite liquidity reached");
            self.episode.target_touched = true;
            events.push(EpisodeEvent::TargetTouched { level });
        }
    }

    /// Nearest supplied level beyond the current close in `direction`, else the
    /// extreme of the bars before the current one when that also lies beyond it.
    fn opposite_liquidity(&self, direction: Direction, input: &EpisodeUpdate<'_>) -> Option<f64> {
        let price = input.series.last()?.close;
        let ahead = |level: &f64| direction.favorable_move(price, *level) > 0.0;
        let nearest = input
            .liquidity_levels
            .iter()
            .copied()
            .filter(ahead)
            .min_by(|a, b| (a - price).abs().total_cmp(&(b - price).abs()));
        if nearest.is_some() {
            return nearest;
        }

        let bars = input.series.as_slice();
        let prior = &bars[..bars.len() - 1];
        let window = &prior[prior.len().saturating_sub(self.config.liquidity_fallback_bars)..];
        let extreme = match direction {
            Direction::Long => window.iter().map(|b| b.high).reduce(f64::max),
            Direction::Short => window.iter().map(|b| b.low).reduce(f64::min),
        };
        extreme.filter(ahead)
    }
}
