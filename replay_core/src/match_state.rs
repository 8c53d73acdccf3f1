//! The current-frame snapshot read by renderers.
//!
//! Match state never triggers a render itself; whoever applies a frame is
//! responsible for signalling that a redraw is due.

use std::sync::Arc;

use parking_lot::Mutex;
use telemetry_proto::{Frame, Position, Side};

use crate::aggregate::{aggregate, BoardSize, EntitySelection, Heatmap};
use crate::tensor_store::EntityBeliefs;

/// Match state shared between the ingestion path and the render loop. A frame
/// is always applied inside a single lock acquisition.
pub type SharedMatchState = Arc<Mutex<MatchState>>;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    board: BoardSize,
    frame: Frame,
    heatmap: Heatmap,
    active_tracker_count: f64,
}

impl MatchState {
    pub fn new(board: BoardSize) -> Self {
        Self {
            board,
            frame: Frame::default(),
            heatmap: Heatmap::zeroed(board),
            active_tracker_count: 0.0,
        }
    }

    pub fn shared(board: BoardSize) -> SharedMatchState {
        Arc::new(Mutex::new(Self::new(board)))
    }

    /// Clear every frame-derived field. The board size is kept.
    pub fn reset(&mut self) {
        self.frame = Frame::default();
        self.heatmap = Heatmap::zeroed(self.board);
        self.active_tracker_count = 0.0;
    }

    /// Replace the snapshot with `frame`. A reset marker only clears.
    pub fn apply(&mut self, frame: Frame) {
        self.reset();
        if frame.is_reset_marker() {
            return;
        }
        self.frame = frame;
    }

    /// As [`MatchState::apply`], then rebuild the heatmap from `tensors`.
    pub fn apply_with_beliefs(
        &mut self,
        frame: Frame,
        tensors: &EntityBeliefs,
        selection: &EntitySelection,
    ) {
        let reset = frame.is_reset_marker();
        self.apply(frame);
        if reset {
            return;
        }
        let result = aggregate(tensors, selection, self.board);
        self.heatmap = result.heatmap;
        self.active_tracker_count = result.active_count;
    }

    pub fn board(&self) -> BoardSize {
        self.board
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn turn_index(&self) -> Option<u32> {
        self.frame.turn_index
    }

    pub fn score(&self, side: Side) -> i32 {
        self.frame.score(side)
    }

    pub fn heatmap(&self) -> &Heatmap {
        &self.heatmap
    }

    pub fn active_tracker_count(&self) -> f64 {
        self.active_tracker_count
    }

    /// Everything known about one cell, or `None` off the board.
    pub fn cell_report(&self, x: usize, y: usize) -> Option<CellReport> {
        if !self.board.contains(x, y) {
            return None;
        }
        let position = Position::new(x as i32, y as i32);
        let flat = y * self.board.width + x;
        let frame = &self.frame;

        let feature_lists = [
            (CellFeature::Hazard, &frame.hazards),
            (CellFeature::Nebula, &frame.nebula),
            (CellFeature::Relic, &frame.relics),
            (CellFeature::Vantage, &frame.vantage_points),
            (CellFeature::Halo, &frame.halo_tiles),
            (CellFeature::Frontier, &frame.frontier),
        ];
        let features = feature_lists
            .into_iter()
            .filter(|(_, tiles)| tiles.contains(&position))
            .map(|(feature, _)| feature)
            .collect();

        let units_at = |side: Side| -> Vec<usize> {
            frame
                .units(side)
                .iter()
                .enumerate()
                .filter(|(_, unit)| **unit == position)
                .map(|(index, _)| index)
                .collect()
        };

        Some(CellReport {
            position,
            belief: self.heatmap.get(x, y),
            energy: frame.energy_field.get(flat).copied(),
            visible: frame.vision.get(flat).copied(),
            features,
            blue_units: units_at(Side::Blue),
            red_units: units_at(Side::Red),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellFeature {
    Hazard,
    Nebula,
    Relic,
    Vantage,
    Halo,
    Frontier,
}

impl CellFeature {
    pub fn label(self) -> &'static str {
        match self {
            CellFeature::Hazard => "hazard",
            CellFeature::Nebula => "nebula",
            CellFeature::Relic => "relic",
            CellFeature::Vantage => "vantage",
            CellFeature::Halo => "halo",
            CellFeature::Frontier => "frontier",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellReport {
    pub position: Position,
    pub belief: f64,
    pub energy: Option<f64>,
    pub visible: Option<bool>,
    pub features: Vec<CellFeature>,
    /// Indices into the blue unit list of units standing on this cell.
    pub blue_units: Vec<usize>,
    pub red_units: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_proto::decode_frame_json;

    fn board() -> BoardSize {
        BoardSize::new(4, 4)
    }

    fn sample_frame() -> Frame {
        decode_frame_json(
            br#"{
                "step": 5,
                "points": [3, 5],
                "asteroids": [[1, 1]],
                "relics": [[2, 3]],
                "halo_tiles": [[2, 3]],
                "blue_shuttles": [[0, 0], [2, 3]],
                "red_shuttles": [[2, 3]],
                "energy": [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
                "vision": [1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 1, 0]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn apply_copies_frame_wholesale() {
        let mut state = MatchState::new(board());
        let frame = sample_frame();
        state.apply(frame.clone());
        assert_eq!(state.frame(), &frame);
        assert_eq!(state.score(Side::Blue), 3);
        assert_eq!(state.score(Side::Red), 5);

        let next = decode_frame_json(br#"{"step": 6}"#).unwrap();
        state.apply(next.clone());
        assert_eq!(state.frame(), &next);
        assert!(state.frame().hazards.is_empty());
    }

    #[test]
    fn reset_marker_restores_fresh_state() {
        let mut state = MatchState::new(board());
        let mut beliefs = EntityBeliefs::new();
        beliefs.insert(0, vec![vec![0.7]]);
        state.apply_with_beliefs(sample_frame(), &beliefs, &EntitySelection::all(16));
        assert_eq!(state.active_tracker_count(), 1.0);

        state.apply(Frame::default());
        assert_eq!(state, MatchState::new(board()));
        state.apply_with_beliefs(Frame::default(), &beliefs, &EntitySelection::all(16));
        assert_eq!(state, MatchState::new(board()));
    }

    #[test]
    fn reset_is_idempotent() {
        let mut state = MatchState::new(board());
        state.apply(sample_frame());
        state.reset();
        state.reset();
        assert_eq!(state, MatchState::new(board()));
    }

    #[test]
    fn plain_apply_clears_previous_heatmap() {
        let mut state = MatchState::new(board());
        let mut beliefs = EntityBeliefs::new();
        beliefs.insert(2, vec![vec![0.4]]);
        state.apply_with_beliefs(sample_frame(), &beliefs, &EntitySelection::all(4));
        assert!((state.heatmap().get(0, 0) - 0.4).abs() < 1e-12);

        state.apply(sample_frame());
        assert!(state.heatmap().is_zero());
        assert_eq!(state.active_tracker_count(), 0.0);
    }

    #[test]
    fn cell_report_collects_everything_on_a_cell() {
        let mut state = MatchState::new(board());
        state.apply(sample_frame());

        let report = state.cell_report(2, 3).unwrap();
        assert_eq!(report.features, vec![CellFeature::Relic, CellFeature::Halo]);
        assert_eq!(report.blue_units, vec![1]);
        assert_eq!(report.red_units, vec![0]);
        assert_eq!(report.energy, Some(14.0));
        assert_eq!(report.visible, Some(true));

        let hazard = state.cell_report(1, 1).unwrap();
        assert_eq!(hazard.features, vec![CellFeature::Hazard]);
        assert_eq!(hazard.visible, Some(false));

        assert!(state.cell_report(4, 0).is_none());
    }
}
