/// Position risk manager.
///
/// Owns the book of open positions and runs the exit battery over each one per
/// update. Strategies only produce intents; the manager folds them into one
/// `CycleDecision` per position, pushes every stop proposal through the ratchet,
/// and only then talks to the gateway. Local state changes only after the gateway
/// confirms, except the occurs-once stage which is committed when the action is
/// issued.
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::strategies::{build_battery, ExitStrategy};
use super::{
    CloseAction, CycleDecision, ExitContext, ExitIntent, FiredIntent, PositionBook,
    PositionRecord, StrategyKind,
};
use crate::config::ExitConfig;
use crate::domain::{BrokerLimits, CloseRequest, Fill, ModifyRequest, PositionId};
use crate::error::EngineError;
use crate::gateway::OrderGateway;

/// Something the manager got the venue to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManagementAction {
    StopMoved {
        position_id: PositionId,
        from: f64,
        to: f64,
    },
    PartialClosed {
        position_id: PositionId,
        volume: f64,
    },
    CloseRequested {
        position_id: PositionId,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ManagementReport {
    pub decisions: Vec<CycleDecision>,
    pub actions: Vec<ManagementAction>,
    pub errors: Vec<EngineError>,
}

pub struct PositionRiskManager {
    book: PositionBook,
    battery: Vec<Box<dyn ExitStrategy>>,
    limits: BrokerLimits,
}

impl PositionRiskManager {
    pub fn new(exits: &ExitConfig, limits: BrokerLimits) -> Self {
        Self::with_battery(build_battery(exits), limits)
    }

    pub fn with_battery(battery: Vec<Box<dyn ExitStrategy>>, limits: BrokerLimits) -> Self {
        Self {
            book: PositionBook::new(),
            battery,
            limits,
        }
    }

    /// Evaluation order of the installed strategies.
    pub fn order(&self) -> Vec<StrategyKind> {
        self.battery.iter().map(|s| s.kind()).collect()
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    /// Start tracking a confirmed fill.
    pub fn on_fill(&mut self, fill: &Fill, confidence: f64) -> Result<PositionId, EngineError> {
        let record = PositionRecord::from_fill(fill, confidence)?;
        info!(
            position = %record.id,
            direction = %record.direction,
            entry = record.entry_price,
            stop = record.stop.level(),
            volume = record.volume,
            "Position opened"
        );
        let id = record.id;
        if self.book.insert(record).is_some() {
            warn!(position = %id, "Fill reused an open position id; record replaced");
        }
        Ok(id)
    }

    /// Forget a position the venue reports closed.
    pub fn on_closed(&mut self, id: PositionId) -> Result<PositionRecord, EngineError> {
        let record = self.book.remove(id).ok_or(EngineError::UnknownPosition(id))?;
        info!(position = %id, "Position closed");
        Ok(record)
    }

    /// Run the battery once over `record` without touching the book.
    ///
    /// Strategies see a working copy that already carries earlier stop changes and
    /// stage marks from this cycle. The first close intent ends the cycle.
    pub fn evaluate(&self, record: &PositionRecord, ctx: &ExitContext<'_>) -> CycleDecision {
        let mut working = record.clone();
        let mut decision = CycleDecision::hold(record.id, record.stage);

        for strategy in &self.battery {
            let kind = strategy.kind();
            let intent = strategy.evaluate(&working, ctx);
            match intent {
                ExitIntent::Hold => continue,
                ExitIntent::AdjustStop { price } => {
                    let rounded = ctx.round(price);
                    let applied = working.stop.propose(rounded).is_some();
                    if applied {
                        decision.new_stop = Some(rounded);
                    }
                    if kind == StrategyKind::BreakEven {
                        working.stage = working.stage.with_break_even();
                    }
                    decision.fired.push(FiredIntent {
                        strategy: kind,
                        intent: ExitIntent::AdjustStop { price: rounded },
                        applied,
                    });
                }
                ExitIntent::ClosePartial { fraction } => {
                    if kind == StrategyKind::PartialClose {
                        working.stage = working.stage.with_partial();
                    }
                    decision.close = Some(CloseAction::Partial { fraction });
                    decision.fired.push(FiredIntent {
                        strategy: kind,
                        intent,
                        applied: true,
                    });
                    break;
                }
                ExitIntent::CloseFull => {
                    decision.close = Some(CloseAction::Full);
                    decision.fired.push(FiredIntent {
                        strategy: kind,
                        intent,
                        applied: true,
                    });
                    break;
                }
            }
        }

        decision.stage = working.stage;
        decision
    }

    /// Evaluate every open position and send the resulting requests.
    pub fn update(
        &mut self,
        ctx: &ExitContext<'_>,
        gateway: &mut dyn OrderGateway,
    ) -> ManagementReport {
        let mut report = ManagementReport::default();

        for id in self.book.ids() {
            let Some(record) = self.book.get(id) else {
                continue;
            };
            if record.pending_close {
                continue;
            }
            let decision = self.evaluate(record, ctx);
            if decision.is_hold() && decision.stage == record.stage {
                continue;
            }
            for fired in &decision.fired {
                debug!(
                    position = %id,
                    strategy = %fired.strategy,
                    applied = fired.applied,
                    intent = ?fired.intent,
                    "Exit strategy fired"
                );
            }

            let Some(record) = self.book.get_mut(id) else {
                continue;
            };
            record.stage = decision.stage;

            if let Some(stop) = decision.new_stop.filter(|_| !decision.closes_fully()) {
                let request = ModifyRequest {
                    position_id: id,
                    new_stop_loss: stop,
                    new_take_profit: record.take_profit,
                };
                match gateway.modify(&request) {
                    Ok(()) => {
                        let from = record.stop.level();
                        if record.stop.propose(stop).is_some() {
                            info!(position = %id, from, to = stop, "Stop moved");
                            report.actions.push(ManagementAction::StopMoved {
                                position_id: id,
                                from,
                                to: stop,
                            });
                        }
                    }
                    Err(e) => {
                        warn!(position = %id, stop, error = %e, "Stop modification failed");
                        report.errors.push(e.into());
                    }
                }
            }

            match decision.close {
                Some(CloseAction::Partial { fraction }) => {
                    let volume = self.limits.round_volume_down(record.volume * fraction);
                    if volume < self.limits.min_volume || volume >= record.volume {
                        debug!(
                            position = %id,
                            open = record.volume,
                            fraction,
                            "Partial close below broker minimum; skipped"
                        );
                    } else {
                        match gateway.close(&CloseRequest::partial(id, volume)) {
                            Ok(()) => {
                                record.volume = self.limits.round_volume_down(record.volume - volume);
                                info!(position = %id, volume, remaining = record.volume, "Partial close");
                                report.actions.push(ManagementAction::PartialClosed {
                                    position_id: id,
                                    volume,
                                });
                            }
                            Err(e) => {
                                warn!(position = %id, volume, error = %e, "Partial close failed");
                                report.errors.push(e.into());
                            }
                        }
                    }
                }
                Some(CloseAction::Full) => match gateway.close(&CloseRequest::full(id)) {
                    Ok(()) => {
                        record.pending_close = true;
                        info!(position = %id, "Full close requested");
                        report
                            .actions
                            .push(ManagementAction::CloseRequested { position_id: id });
                    }
                    Err(e) => {
                        warn!(position = %id, error = %e, "Full close failed");
                        report.errors.push(e.into());
                    }
                },
                None => {}
            }

            report.decisions.push(decision);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use crate::gateway::{GatewayError, PaperGateway};
    use crate::position_management::strategies::testkit::{t0, Scene, PIP};
    use crate::position_management::{ManagementStage, DEFAULT_ORDER};

    fn open(manager: &mut PositionRiskManager, gw: &mut PaperGateway, direction: Direction) -> PositionId {
        let fill = gw
            .submit(&crate::domain::OrderRequest {
                direction,
                volume: 1.0,
                stop_distance: 20.0 * PIP,
                target_distance: 60.0 * PIP,
                label: "otelab".into(),
                expected_entry: 1.1000,
            })
            .unwrap();
        let fill = Fill { time: t0(), ..fill };
        manager.on_fill(&fill, 0.8).unwrap()
    }

    fn manager() -> PositionRiskManager {
        PositionRiskManager::new(&ExitConfig::default(), BrokerLimits::default())
    }

    #[test]
    fn installs_default_order() {
        assert_eq!(manager().order(), DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn break_even_moves_stop_once() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Long);

        let scene = Scene::new(Direction::Long, 1.1022);
        let report = m.update(&scene.ctx(), &mut gw);
        assert_eq!(report.actions.len(), 1);
        match &report.actions[0] {
            ManagementAction::StopMoved { position_id, from, to } => {
                assert_eq!(*position_id, id);
                assert!((from - 1.0980).abs() < 1e-9);
                assert!((to - 1.1002).abs() < 1e-9);
            }
            other => panic!("expected stop move, got {other:?}"),
        }
        let record = m.book().get(id).unwrap();
        assert_eq!(record.stage, ManagementStage::BreakEvenApplied);

        let again = m.update(&scene.ctx(), &mut gw);
        assert!(again.actions.is_empty());
        assert_eq!(gw.modified.len(), 1);
    }

    #[test]
    fn partial_close_happens_once() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Long);

        for price in [1.1032, 1.1034, 1.1036] {
            m.update(&Scene::new(Direction::Long, price).ctx(), &mut gw);
        }
        let partials: Vec<_> = gw.closed.iter().filter(|c| !c.is_full()).collect();
        assert_eq!(partials.len(), 1);
        assert_eq!(partials[0].volume, Some(0.5));
        let record = m.book().get(id).unwrap();
        assert!((record.volume - 0.5).abs() < 1e-9);
        assert_eq!(record.stage, ManagementStage::Both);
    }

    #[test]
    fn close_ends_the_cycle() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Long);
        let scene = Scene::new(Direction::Long, 1.1040);
        let record = m.book().get(id).unwrap().clone();

        let decision = m.evaluate(&record, &scene.ctx());
        assert_eq!(decision.close, Some(CloseAction::Partial { fraction: 0.5 }));
        let kinds: Vec<_> = decision.fired.iter().map(|f| f.strategy).collect();
        assert_eq!(kinds, vec![StrategyKind::BreakEven, StrategyKind::PartialClose]);
        assert_eq!(decision.new_stop, Some(1.1002));
    }

    #[test]
    fn looser_proposals_are_dropped() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Long);
        // First pass banks the partial, second lets the trail catch up.
        m.update(&Scene::new(Direction::Long, 1.1045).ctx(), &mut gw);
        m.update(&Scene::new(Direction::Long, 1.1045).ctx(), &mut gw);
        let after_trail = m.book().get(id).unwrap().stop.level();

        let scene = Scene::new(Direction::Long, 1.1025);
        let record = m.book().get(id).unwrap().clone();
        let decision = m.evaluate(&record, &scene.ctx());
        assert!(decision.fired.iter().all(|f| !f.applied));
        assert_eq!(decision.new_stop, None);
        assert_eq!(m.book().get(id).unwrap().stop.level(), after_trail);
    }

    #[test]
    fn failed_modify_leaves_stop_untouched() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Short);
        gw.fail_next_modify(GatewayError::Unavailable("timeout".into()));

        let report = m.update(&Scene::new(Direction::Short, 1.0978).ctx(), &mut gw);
        assert_eq!(report.errors.len(), 1);
        assert!(report.actions.is_empty());
        let record = m.book().get(id).unwrap();
        assert!((record.stop.level() - 1.1020).abs() < 1e-9);
        assert!(record.stage.has_break_even());
    }

    #[test]
    fn full_close_marks_pending_until_confirmed() {
        let mut m = manager();
        let mut gw = PaperGateway::new();
        let id = open(&mut m, &mut gw, Direction::Long);
        let scene = Scene::new(Direction::Long, 1.1004).at(t0() + chrono::Duration::hours(5));

        let report = m.update(&scene.ctx(), &mut gw);
        assert_eq!(report.actions, vec![ManagementAction::CloseRequested { position_id: id }]);
        assert!(m.book().get(id).unwrap().pending_close);

        m.update(&scene.ctx(), &mut gw);
        assert_eq!(gw.closed.len(), 1);

        assert!(m.on_closed(id).is_ok());
        assert_eq!(m.on_closed(id).unwrap_err(), EngineError::UnknownPosition(id));
    }
}
