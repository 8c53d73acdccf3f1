//! The inspector session: one match state plus whichever driver feeds it.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::Serialize;
use telemetry_proto::{frame_fingerprint, Side};
use tracing::{debug, info};

use crate::aggregate::EntitySelection;
use crate::commands::OperatorCommand;
use crate::config::InspectorConfig;
use crate::gateway::{AckHandle, LiveGateway, RenderRequest};
use crate::match_state::{CellReport, MatchState, SharedMatchState};
use crate::metrics::{MetricsSnapshot, SessionMetrics};
use crate::replay::{ReplayController, ReplaySequence};

const REPLAY_ONLY: &str = "only available while replaying";
const LIVE_ONLY: &str = "only available in live mode";

pub enum SessionMode {
    Live {
        gateway: Arc<LiveGateway>,
        ack: AckHandle,
    },
    Replay {
        controller: ReplayController,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Match state was rebuilt; redraw.
    Rendered,
    /// Accepted but nothing changed (e.g. a move past either end).
    Unchanged,
    Acknowledged,
    CellSelected(CellReport),
    Ignored(&'static str),
}

pub struct Session {
    config: InspectorConfig,
    state: SharedMatchState,
    mode: SessionMode,
    selection: EntitySelection,
    selected_cell: Option<(usize, usize)>,
    metrics: Arc<SessionMetrics>,
}

impl Session {
    /// Start replaying `sequence` from its first frame.
    pub fn replay(config: InspectorConfig, sequence: ReplaySequence) -> Self {
        let state = MatchState::shared(config.board);
        let selection = EntitySelection::all(config.entity_count);
        let controller = ReplayController::new(sequence, config.replay.tracker_side);
        controller.render(&mut state.lock(), &selection);
        info!(
            target: "match_inspector::session",
            frames = controller.len(),
            side = %controller.tracker_side(),
            "session.started=replay"
        );
        Self {
            config,
            state,
            mode: SessionMode::Replay { controller },
            selection,
            selected_cell: None,
            metrics: Arc::default(),
        }
    }

    /// Start a live session. The receiver yields one request per applied frame.
    pub fn live(config: InspectorConfig) -> (Self, Receiver<RenderRequest>) {
        let state = MatchState::shared(config.board);
        let metrics = Arc::new(SessionMetrics::default());
        let (gateway, renders) =
            LiveGateway::new(Arc::clone(&state), config.gateway.clone(), Arc::clone(&metrics));
        let ack = gateway.ack_handle();
        info!(
            target: "match_inspector::session",
            bind = %config.gateway.bind,
            synchronous_ack = config.gateway.synchronous_ack,
            "session.started=live"
        );
        let session = Self {
            selection: EntitySelection::all(config.entity_count),
            config,
            state,
            mode: SessionMode::Live {
                gateway: Arc::new(gateway),
                ack,
            },
            selected_cell: None,
            metrics,
        };
        (session, renders)
    }

    pub fn handle(&mut self, command: OperatorCommand) -> CommandOutcome {
        let outcome = match command {
            OperatorCommand::StepForward(step) => {
                self.navigate(|replay, state, selection| replay.forward(step, state, selection))
            }
            OperatorCommand::StepBackward(step) => {
                self.navigate(|replay, state, selection| replay.backward(step, state, selection))
            }
            OperatorCommand::JumpToStart => self.navigate(|replay, state, selection| {
                replay.goto_start(state, selection);
                true
            }),
            OperatorCommand::JumpToEnd => self.navigate(|replay, state, selection| {
                replay.goto_end(state, selection);
                true
            }),
            OperatorCommand::ToggleEntity(entity) => {
                if entity >= self.config.entity_count {
                    CommandOutcome::Ignored("entity index out of range")
                } else {
                    self.selection.toggle(entity);
                    self.rerender()
                }
            }
            OperatorCommand::ToggleAll => {
                self.selection.toggle_all(self.config.entity_count);
                self.rerender()
            }
            OperatorCommand::SelectCell { x, y } => {
                match self.state.lock().cell_report(x, y) {
                    Some(report) => {
                        self.selected_cell = Some((x, y));
                        CommandOutcome::CellSelected(report)
                    }
                    None => CommandOutcome::Ignored("cell is off the board"),
                }
            }
            OperatorCommand::TrackerSide(side) => self.switch_side(side),
            OperatorCommand::Acknowledge => match &self.mode {
                SessionMode::Live { ack, .. } => {
                    if ack.acknowledge() {
                        CommandOutcome::Acknowledged
                    } else {
                        CommandOutcome::Unchanged
                    }
                }
                SessionMode::Replay { .. } => CommandOutcome::Ignored(LIVE_ONLY),
            },
        };
        debug!(
            target: "match_inspector::session",
            ?command,
            ?outcome,
            "command.handled"
        );
        outcome
    }

    fn navigate<F>(&mut self, step: F) -> CommandOutcome
    where
        F: FnOnce(&mut ReplayController, &mut MatchState, &EntitySelection) -> bool,
    {
        let SessionMode::Replay { controller } = &mut self.mode else {
            return CommandOutcome::Ignored(REPLAY_ONLY);
        };
        let mut state = self.state.lock();
        if step(controller, &mut *state, &self.selection) {
            self.metrics.record_navigation();
            CommandOutcome::Rendered
        } else {
            CommandOutcome::Unchanged
        }
    }

    /// Rebuild the current replay frame after the selection or side changed.
    /// Live frames carry no beliefs, so nothing is redrawn there.
    fn rerender(&mut self) -> CommandOutcome {
        match &self.mode {
            SessionMode::Replay { controller } => {
                controller.render(&mut self.state.lock(), &self.selection);
                self.metrics.record_navigation();
                CommandOutcome::Rendered
            }
            SessionMode::Live { .. } => CommandOutcome::Unchanged,
        }
    }

    fn switch_side(&mut self, side: Side) -> CommandOutcome {
        match &mut self.mode {
            SessionMode::Replay { controller } => {
                if controller.tracker_side() == side {
                    return CommandOutcome::Unchanged;
                }
                controller.set_tracker_side(side);
                info!(
                    target: "match_inspector::session",
                    %side,
                    has_tracker = controller.sequence().has_tracker(side),
                    "tracker_side.changed"
                );
                self.rerender()
            }
            SessionMode::Live { .. } => CommandOutcome::Ignored(REPLAY_ONLY),
        }
    }

    pub fn config(&self) -> &InspectorConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedMatchState {
        &self.state
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn is_live(&self) -> bool {
        matches!(self.mode, SessionMode::Live { .. })
    }

    pub fn gateway(&self) -> Option<&Arc<LiveGateway>> {
        match &self.mode {
            SessionMode::Live { gateway, .. } => Some(gateway),
            SessionMode::Replay { .. } => None,
        }
    }

    pub fn controller(&self) -> Option<&ReplayController> {
        match &self.mode {
            SessionMode::Replay { controller } => Some(controller),
            SessionMode::Live { .. } => None,
        }
    }

    pub fn selection(&self) -> &EntitySelection {
        &self.selection
    }

    pub fn selected_cell(&self) -> Option<(usize, usize)> {
        self.selected_cell
    }

    pub fn selected_cell_report(&self) -> Option<CellReport> {
        let (x, y) = self.selected_cell?;
        self.state.lock().cell_report(x, y)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Everything a headless caller needs to check where the session stands.
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        let (index, frames, tracker_side) = match &self.mode {
            SessionMode::Replay { controller } => (
                Some(controller.current_index()),
                Some(controller.len()),
                Some(controller.tracker_side()),
            ),
            SessionMode::Live { .. } => (None, None, None),
        };
        SessionSnapshot {
            mode: if self.is_live() { "live" } else { "replay" },
            index,
            frames,
            tracker_side,
            turn_index: state.turn_index(),
            match_step: state.frame().match_step,
            scores: [state.score(Side::Blue), state.score(Side::Red)],
            active_tracker_count: state.active_tracker_count(),
            heatmap_peak: state.heatmap().max_value(),
            selection: self.selection.iter().collect(),
            selected_cell: self.selected_cell,
            fingerprint: frame_fingerprint(state.frame()).ok(),
            metrics: self.metrics.snapshot(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: &'static str,
    pub index: Option<usize>,
    pub frames: Option<usize>,
    pub tracker_side: Option<Side>,
    pub turn_index: Option<u32>,
    pub match_step: u32,
    pub scores: [i32; 2],
    pub active_tracker_count: f64,
    pub heatmap_peak: f64,
    pub selection: Vec<usize>,
    pub selected_cell: Option<(usize, usize)>,
    pub fingerprint: Option<u64>,
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::BoardSize;
    use crate::tensor_store::BeliefTensorStore;
    use telemetry_proto::{decode_frame_json, BeliefTensor, Frame, TrackerRecord};

    fn config() -> InspectorConfig {
        InspectorConfig {
            board: BoardSize::new(2, 2),
            entity_count: 2,
            ..InspectorConfig::default()
        }
    }

    fn frame(turn: u32) -> Frame {
        decode_frame_json(format!(r#"{{"step": {turn}, "points": [{turn}, 1]}}"#).as_bytes())
            .unwrap()
    }

    fn sequence() -> ReplaySequence {
        let frames: Vec<Frame> = (0..4).map(frame).collect();
        let blue = BeliefTensorStore::from_records((0..4u64).map(|index| TrackerRecord {
            frame_index: index,
            tensor: BeliefTensor::new(vec![vec![vec![0.5]], vec![vec![0.0, 0.25]]]),
        }));
        ReplaySequence::new(frames, [Some(blue), None]).unwrap()
    }

    #[test]
    fn replay_session_starts_rendered() {
        let session = Session::replay(config(), sequence());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.index, Some(0));
        assert_eq!(snapshot.turn_index, Some(0));
        assert_eq!(snapshot.active_tracker_count, 2.0);
        assert_eq!(snapshot.selection, vec![0, 1]);
    }

    #[test]
    fn toggles_rebuild_heatmap() {
        let mut session = Session::replay(config(), sequence());
        assert_eq!(
            session.handle(OperatorCommand::ToggleEntity(1)),
            CommandOutcome::Rendered
        );
        assert_eq!(session.state().lock().active_tracker_count(), 1.0);
        assert_eq!(session.state().lock().heatmap().get(0, 1), 0.0);

        assert!(matches!(
            session.handle(OperatorCommand::ToggleEntity(9)),
            CommandOutcome::Ignored(_)
        ));
        session.handle(OperatorCommand::ToggleAll);
        assert_eq!(session.selection().len(), 2);
    }

    #[test]
    fn switching_to_side_without_tracker_clears_heatmap() {
        let mut session = Session::replay(config(), sequence());
        assert_eq!(
            session.handle(OperatorCommand::TrackerSide(Side::Red)),
            CommandOutcome::Rendered
        );
        assert!(session.state().lock().heatmap().is_zero());
        assert_eq!(
            session.handle(OperatorCommand::TrackerSide(Side::Red)),
            CommandOutcome::Unchanged
        );
    }

    #[test]
    fn navigation_outcomes() {
        let mut session = Session::replay(config(), sequence());
        assert_eq!(
            session.handle(OperatorCommand::StepBackward(1)),
            CommandOutcome::Unchanged
        );
        assert_eq!(
            session.handle(OperatorCommand::JumpToEnd),
            CommandOutcome::Rendered
        );
        assert_eq!(session.snapshot().index, Some(2));
        assert_eq!(
            session.handle(OperatorCommand::StepForward(1)),
            CommandOutcome::Unchanged
        );
        assert!(matches!(
            session.handle(OperatorCommand::Acknowledge),
            CommandOutcome::Ignored(_)
        ));
    }

    #[test]
    fn select_cell_reports_or_ignores() {
        let mut session = Session::replay(config(), sequence());
        match session.handle(OperatorCommand::SelectCell { x: 0, y: 0 }) {
            CommandOutcome::CellSelected(report) => assert_eq!(report.belief, 0.5),
            other => panic!("expected cell report, got {other:?}"),
        }
        assert!(matches!(
            session.handle(OperatorCommand::SelectCell { x: 2, y: 0 }),
            CommandOutcome::Ignored(_)
        ));
        assert_eq!(session.selected_cell(), Some((0, 0)));
    }

    #[test]
    fn live_session_rejects_navigation() {
        let (mut session, _renders) = Session::live(config());
        assert!(matches!(
            session.handle(OperatorCommand::StepForward(1)),
            CommandOutcome::Ignored(_)
        ));
        assert_eq!(
            session.handle(OperatorCommand::Acknowledge),
            CommandOutcome::Acknowledged
        );
        assert_eq!(session.snapshot().mode, "live");
    }
}
