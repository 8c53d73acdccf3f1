//! Recorded match playback.
//!
//! A replay is a state file (`<base>.json`) plus up to one tracker file per
//! side (`<base>.p0.tracker`, `<base>.p1.tracker`). Everything is decoded up
//! front; navigation only re-applies already decoded frames.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use telemetry_proto::{decode_replay_document, decode_tracker_stream, DecodeError, Frame, Side};
use thiserror::Error;
use tracing::{debug, info};

use crate::aggregate::EntitySelection;
use crate::match_state::MatchState;
use crate::tensor_store::{BeliefTensorStore, EntityBeliefs};

pub const TRACKER_EXTENSION: &str = "tracker";

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("replay contains no frames")]
    Empty,
    #[error("{side} tracker covers {tracker_frames} frames but the replay has {frames}")]
    LengthMismatch {
        side: Side,
        tracker_frames: usize,
        frames: usize,
    },
    #[error("{side} tracker record for replay position {expected} is numbered {found}")]
    IndexMismatch { side: Side, expected: u64, found: u64 },
}

/// Files making up one recorded replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayPaths {
    pub state: PathBuf,
    pub trackers: [Option<PathBuf>; 2],
}

impl ReplayPaths {
    /// Tracker file paired with `state` for `side`, whether or not it exists.
    pub fn tracker_path(state: &Path, side: Side) -> PathBuf {
        let stem = state
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        state.with_file_name(format!(
            "{stem}.{}.{TRACKER_EXTENSION}",
            side.tracker_suffix()
        ))
    }

    /// Pair `state` with whichever tracker files exist next to it.
    pub fn discover(state: impl Into<PathBuf>) -> Self {
        let state = state.into();
        let trackers = Side::ALL.map(|side| {
            let path = Self::tracker_path(&state, side);
            path.is_file().then_some(path)
        });
        Self { state, trackers }
    }

    pub fn state_only(state: impl Into<PathBuf>) -> Self {
        Self {
            state: state.into(),
            trackers: [None, None],
        }
    }
}

/// Immutable, fully decoded replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySequence {
    frames: Vec<Frame>,
    trackers: [Option<BeliefTensorStore>; 2],
}

impl ReplaySequence {
    /// Build a replay, rejecting an empty frame list and any tracker that is
    /// not numbered exactly `0..frames.len()`.
    pub fn new(
        frames: Vec<Frame>,
        trackers: [Option<BeliefTensorStore>; 2],
    ) -> Result<Self, ReplayError> {
        if frames.is_empty() {
            return Err(ReplayError::Empty);
        }
        for side in Side::ALL {
            if let Some(store) = &trackers[side.index()] {
                if store.frame_count() != frames.len() {
                    return Err(ReplayError::LengthMismatch {
                        side,
                        tracker_frames: store.frame_count(),
                        frames: frames.len(),
                    });
                }
                if let Some((expected, found)) = (0u64..)
                    .zip(store.frame_indices())
                    .find(|(expected, found)| expected != found)
                {
                    return Err(ReplayError::IndexMismatch {
                        side,
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(Self { frames, trackers })
    }

    pub fn load(paths: &ReplayPaths) -> Result<Self, ReplayError> {
        let bytes = read(&paths.state)?;
        let frames = decode_replay_document(&bytes).map_err(|source| ReplayError::Decode {
            path: paths.state.clone(),
            source,
        })?;

        let mut trackers: [Option<BeliefTensorStore>; 2] = [None, None];
        for side in Side::ALL {
            let Some(path) = &paths.trackers[side.index()] else {
                continue;
            };
            let bytes = read(path)?;
            let records = decode_tracker_stream(&bytes).map_err(|source| ReplayError::Decode {
                path: path.clone(),
                source,
            })?;
            debug!(
                target: "match_inspector::replay",
                %side,
                records = records.len(),
                path = %path.display(),
                "tracker.decoded"
            );
            trackers[side.index()] = Some(BeliefTensorStore::from_records(records));
        }

        let sequence = Self::new(frames, trackers)?;
        info!(
            target: "match_inspector::replay",
            path = %paths.state.display(),
            frames = sequence.len(),
            blue_tracker = sequence.has_tracker(Side::Blue),
            red_tracker = sequence.has_tracker(Side::Red),
            "replay.loaded"
        );
        Ok(sequence)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn has_tracker(&self, side: Side) -> bool {
        self.trackers[side.index()].is_some()
    }

    /// Beliefs recorded for frame `index` by `side`'s tracker. `None` when
    /// that side has no tracker file; an empty map when the frame has no record.
    pub fn beliefs(&self, index: usize, side: Side) -> Option<&EntityBeliefs> {
        self.trackers[side.index()]
            .as_ref()
            .map(|store| store.get(index as u64))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ReplayError> {
    fs::read(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Navigation over a loaded replay.
///
/// The last recorded frame is a terminal summary and is never displayed, so
/// the last reachable index is `len - 2`. Moves that would leave the
/// navigable range are ignored.
#[derive(Debug, Clone)]
pub struct ReplayController {
    sequence: ReplaySequence,
    current_index: usize,
    tracker_side: Side,
}

impl ReplayController {
    pub fn new(sequence: ReplaySequence, tracker_side: Side) -> Self {
        Self {
            sequence,
            current_index: 0,
            tracker_side,
        }
    }

    pub fn sequence(&self) -> &ReplaySequence {
        &self.sequence
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn last_navigable_index(&self) -> usize {
        self.sequence.len().saturating_sub(2)
    }

    pub fn tracker_side(&self) -> Side {
        self.tracker_side
    }

    pub fn set_tracker_side(&mut self, side: Side) {
        self.tracker_side = side;
    }

    /// Advance by `step`; returns whether the index moved.
    pub fn forward(
        &mut self,
        step: usize,
        state: &mut MatchState,
        selection: &EntitySelection,
    ) -> bool {
        let target = match self.current_index.checked_add(step) {
            Some(target) if self.len() >= 2 && target <= self.last_navigable_index() => target,
            _ => {
                debug!(
                    target: "match_inspector::replay",
                    index = self.current_index,
                    step,
                    "replay.forward_ignored"
                );
                return false;
            }
        };
        self.current_index = target;
        self.render(state, selection);
        true
    }

    /// Rewind by `step`; returns whether the index moved.
    pub fn backward(
        &mut self,
        step: usize,
        state: &mut MatchState,
        selection: &EntitySelection,
    ) -> bool {
        let Some(target) = self.current_index.checked_sub(step) else {
            debug!(
                target: "match_inspector::replay",
                index = self.current_index,
                step,
                "replay.backward_ignored"
            );
            return false;
        };
        self.current_index = target;
        self.render(state, selection);
        true
    }

    pub fn goto_start(&mut self, state: &mut MatchState, selection: &EntitySelection) {
        self.current_index = 0;
        self.render(state, selection);
    }

    pub fn goto_end(&mut self, state: &mut MatchState, selection: &EntitySelection) {
        self.current_index = self.last_navigable_index();
        self.render(state, selection);
    }

    /// Re-apply the frame at the current index, with beliefs when the active
    /// side has a tracker.
    pub fn render(&self, state: &mut MatchState, selection: &EntitySelection) {
        let Some(frame) = self.sequence.frame(self.current_index) else {
            state.reset();
            return;
        };
        match self.sequence.beliefs(self.current_index, self.tracker_side) {
            Some(beliefs) => state.apply_with_beliefs(frame.clone(), beliefs, selection),
            None => state.apply(frame.clone()),
        }
        debug!(
            target: "match_inspector::replay",
            index = self.current_index,
            turn = ?state.turn_index(),
            "replay.rendered"
        );
    }
}
