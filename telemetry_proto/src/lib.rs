//! Wire contracts for match telemetry.
//!
//! Two sources feed the inspector: per-turn JSON frames (pushed live or
//! recorded into a replay document) and raw binary tracker streams holding
//! each tracked unit's belief grid per frame. Both decode into plain owned
//! types here; nothing in this crate holds mutable state.

mod frame;
mod tracker;

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};
use thiserror::Error;

pub use frame::{
    decode_frame_json, decode_replay_document, encode_frame_json, encode_replay_document,
    ActionKind, Frame, Position, Side, UnitAction,
};
pub use tracker::{
    decode_tracker_stream, encode_tracker_record_into, encode_tracker_stream, BeliefGrid,
    BeliefTensor, TrackerRecord,
};

/// Errors raised while decoding JSON frames or binary tracker streams.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload could not be parsed at all, or a field had the wrong type.
    #[error("malformed input: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Well-formed payload violating a fixed-arity or range constraint.
    #[error("invalid field '{field}': {detail}")]
    Validation { field: String, detail: String },
    /// The tracker stream ended inside a record.
    #[error(
        "tracker stream truncated at byte {offset}: needed {needed} bytes, {available} available \
         ({records_recovered} complete records recovered)"
    )]
    Truncated {
        records_recovered: usize,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl DecodeError {
    pub(crate) fn validation(field: impl Into<String>, detail: impl Into<String>) -> Self {
        DecodeError::Validation {
            field: field.into(),
            detail: detail.into(),
        }
    }
}

/// Deterministic fingerprint of a frame's full contents.
pub fn frame_fingerprint(frame: &Frame) -> bincode::Result<u64> {
    let encoded = bincode::serialize(frame)?;
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    Ok(hasher.finish())
}
