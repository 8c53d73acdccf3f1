use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DecodeError;

/// One of the two competing sides. Blue is always listed first on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Blue,
    Red,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Blue, Side::Red];

    pub fn index(self) -> usize {
        match self {
            Side::Blue => 0,
            Side::Red => 1,
        }
    }

    pub fn other(self) -> Side {
        match self {
            Side::Blue => Side::Red,
            Side::Red => Side::Blue,
        }
    }

    /// Suffix used by the recorder when naming this side's tracker file.
    pub fn tracker_suffix(self) -> &'static str {
        match self {
            Side::Blue => "p0",
            Side::Red => "p1",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Blue => write!(f, "blue"),
            Side::Red => write!(f, "red"),
        }
    }
}

/// Board cell coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(into = "[i32; 2]")]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [i32; 2] {
    fn from(position: Position) -> Self {
        [position.x, position.y]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Idle,
    Up,
    Right,
    Down,
    Left,
    /// Ranged attack; the action's offsets locate the target cell.
    Sap,
    Unknown(i32),
}

impl ActionKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ActionKind::Idle,
            1 => ActionKind::Up,
            2 => ActionKind::Right,
            3 => ActionKind::Down,
            4 => ActionKind::Left,
            5 => ActionKind::Sap,
            other => ActionKind::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            ActionKind::Idle => 0,
            ActionKind::Up => 1,
            ActionKind::Right => 2,
            ActionKind::Down => 3,
            ActionKind::Left => 4,
            ActionKind::Sap => 5,
            ActionKind::Unknown(code) => code,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Idle => "idle",
            ActionKind::Up => "up",
            ActionKind::Right => "right",
            ActionKind::Down => "down",
            ActionKind::Left => "left",
            ActionKind::Sap => "sap",
            ActionKind::Unknown(_) => "unknown",
        }
    }
}

/// A unit's pending action. Serialized as `[code, dx, dy]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "[i32; 3]")]
pub struct UnitAction {
    pub kind: ActionKind,
    pub dx: i32,
    pub dy: i32,
}

impl From<UnitAction> for [i32; 3] {
    fn from(action: UnitAction) -> Self {
        [action.kind.code(), action.dx, action.dy]
    }
}

/// One turn's complete observable state.
///
/// A frame whose `turn_index` is `None` is the reset marker: every other
/// field is left at its default and consumers clear their state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Frame {
    #[serde(rename = "step", skip_serializing_if = "Option::is_none")]
    pub turn_index: Option<u32>,
    pub match_step: u32,
    /// `[blue, red]`
    #[serde(rename = "points")]
    pub scores: [i32; 2],
    /// `[blue, red]`
    pub wins: [i32; 2],
    pub unit_move_cost: i32,
    pub unit_sap_cost: i32,
    pub unit_sap_range: i32,
    pub unit_sensor_range: i32,
    #[serde(rename = "asteroids")]
    pub hazards: Vec<Position>,
    pub nebula: Vec<Position>,
    pub relics: Vec<Position>,
    pub vantage_points: Vec<Position>,
    pub halo_tiles: Vec<Position>,
    #[serde(rename = "blue_shuttles")]
    pub blue_units: Vec<Position>,
    /// Pending actions for the blue side only. Recorded and live frames carry
    /// no red action list; a `red_shuttles_actions` key is ignored.
    #[serde(rename = "blue_shuttles_actions")]
    pub blue_actions: Vec<UnitAction>,
    #[serde(rename = "red_shuttles")]
    pub red_units: Vec<Position>,
    #[serde(rename = "blue_shuttles_energy")]
    pub blue_energy: Vec<i32>,
    #[serde(rename = "red_shuttles_energy")]
    pub red_energy: Vec<i32>,
    /// Row-major, one value per board cell.
    #[serde(rename = "energy")]
    pub energy_field: Vec<f64>,
    /// Row-major, one flag per board cell.
    pub vision: Vec<bool>,
    #[serde(rename = "unexplored_frontier")]
    pub frontier: Vec<Position>,
}

impl Frame {
    pub fn is_reset_marker(&self) -> bool {
        self.turn_index.is_none()
    }

    pub fn score(&self, side: Side) -> i32 {
        self.scores[side.index()]
    }

    pub fn wins_for(&self, side: Side) -> i32 {
        self.wins[side.index()]
    }

    pub fn units(&self, side: Side) -> &[Position] {
        match side {
            Side::Blue => &self.blue_units,
            Side::Red => &self.red_units,
        }
    }

    pub fn unit_energy(&self, side: Side) -> &[i32] {
        match side {
            Side::Blue => &self.blue_energy,
            Side::Red => &self.red_energy,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Plain(i64),
    Wrapped(Vec<i64>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFrame {
    #[serde(alias = "turn_index")]
    step: Option<RawScalar>,
    match_step: Option<RawScalar>,
    points: Option<Vec<i32>>,
    wins: Option<Vec<i32>>,
    unit_move_cost: Option<RawScalar>,
    unit_sap_cost: Option<RawScalar>,
    unit_sap_range: Option<RawScalar>,
    unit_sensor_range: Option<RawScalar>,
    asteroids: Vec<Vec<i32>>,
    nebula: Vec<Vec<i32>>,
    relics: Vec<Vec<i32>>,
    vantage_points: Vec<Vec<i32>>,
    halo_tiles: Vec<Vec<i32>>,
    blue_shuttles: Vec<Vec<i32>>,
    blue_shuttles_actions: Vec<Vec<i32>>,
    red_shuttles: Vec<Vec<i32>>,
    blue_shuttles_energy: Vec<i32>,
    red_shuttles_energy: Vec<i32>,
    energy: Vec<f64>,
    vision: Vec<RawFlag>,
    unexplored_frontier: Vec<Vec<i32>>,
}

impl RawFrame {
    fn into_frame(self, prefix: &str) -> Result<Frame, DecodeError> {
        let name = |field: &str| format!("{prefix}{field}");

        let Some(step) = self.step else {
            return Ok(Frame::default());
        };
        let turn_index = narrow(name("step"), scalar(name("step"), Some(step))?)?;

        Ok(Frame {
            turn_index: Some(turn_index),
            match_step: narrow(name("match_step"), scalar(name("match_step"), self.match_step)?)?,
            scores: pair(name("points"), self.points)?,
            wins: pair(name("wins"), self.wins)?,
            unit_move_cost: narrow(
                name("unit_move_cost"),
                scalar(name("unit_move_cost"), self.unit_move_cost)?,
            )?,
            unit_sap_cost: narrow(
                name("unit_sap_cost"),
                scalar(name("unit_sap_cost"), self.unit_sap_cost)?,
            )?,
            unit_sap_range: narrow(
                name("unit_sap_range"),
                scalar(name("unit_sap_range"), self.unit_sap_range)?,
            )?,
            unit_sensor_range: narrow(
                name("unit_sensor_range"),
                scalar(name("unit_sensor_range"), self.unit_sensor_range)?,
            )?,
            hazards: positions(&name("asteroids"), self.asteroids)?,
            nebula: positions(&name("nebula"), self.nebula)?,
            relics: positions(&name("relics"), self.relics)?,
            vantage_points: positions(&name("vantage_points"), self.vantage_points)?,
            halo_tiles: positions(&name("halo_tiles"), self.halo_tiles)?,
            blue_units: positions(&name("blue_shuttles"), self.blue_shuttles)?,
            blue_actions: actions(&name("blue_shuttles_actions"), self.blue_shuttles_actions)?,
            red_units: positions(&name("red_shuttles"), self.red_shuttles)?,
            blue_energy: self.blue_shuttles_energy,
            red_energy: self.red_shuttles_energy,
            energy_field: self.energy,
            vision: self
                .vision
                .into_iter()
                .map(|flag| match flag {
                    RawFlag::Bool(value) => value,
                    RawFlag::Int(value) => value != 0,
                })
                .collect(),
            frontier: positions(&name("unexplored_frontier"), self.unexplored_frontier)?,
        })
    }
}

fn scalar(field: String, raw: Option<RawScalar>) -> Result<i64, DecodeError> {
    match raw {
        None => Ok(0),
        Some(RawScalar::Plain(value)) => Ok(value),
        Some(RawScalar::Wrapped(values)) => match values.as_slice() {
            [value] => Ok(*value),
            other => Err(DecodeError::validation(
                field,
                format!("expected 1 element, got {}", other.len()),
            )),
        },
    }
}

fn narrow<T: TryFrom<i64>>(field: String, value: i64) -> Result<T, DecodeError> {
    T::try_from(value)
        .map_err(|_| DecodeError::validation(field, format!("value {value} out of range")))
}

fn pair(field: String, raw: Option<Vec<i32>>) -> Result<[i32; 2], DecodeError> {
    match raw {
        None => Ok([0, 0]),
        Some(values) => <[i32; 2]>::try_from(values.as_slice()).map_err(|_| {
            DecodeError::validation(field, format!("expected 2 elements, got {}", values.len()))
        }),
    }
}

fn positions(field: &str, raw: Vec<Vec<i32>>) -> Result<Vec<Position>, DecodeError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, coords)| match coords.as_slice() {
            [x, y] => Ok(Position::new(*x, *y)),
            other => Err(DecodeError::validation(
                format!("{field}[{index}]"),
                format!("expected [x, y], got {} elements", other.len()),
            )),
        })
        .collect()
}

fn actions(field: &str, raw: Vec<Vec<i32>>) -> Result<Vec<UnitAction>, DecodeError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, parts)| match parts.as_slice() {
            [code, dx, dy] => Ok(UnitAction {
                kind: ActionKind::from_code(*code),
                dx: *dx,
                dy: *dy,
            }),
            other => Err(DecodeError::validation(
                format!("{field}[{index}]"),
                format!("expected [type, dx, dy], got {} elements", other.len()),
            )),
        })
        .collect()
}

fn raw_frame_from_value(value: Value) -> Result<RawFrame, DecodeError> {
    if !value.is_object() {
        return Err(DecodeError::Malformed(serde_json::Error::custom(
            "frame must be a JSON object",
        )));
    }
    Ok(serde_json::from_value(value)?)
}

/// Decode one JSON frame. Absent keys take their defaults; a missing `step`
/// yields the reset marker.
pub fn decode_frame_json(bytes: &[u8]) -> Result<Frame, DecodeError> {
    let value: Value = serde_json::from_slice(bytes)?;
    raw_frame_from_value(value)?.into_frame("")
}

#[derive(Deserialize)]
struct RawReplayDocument {
    data: Vec<Value>,
}

/// Decode a recorded replay document (`{"data": [frame, ...]}`).
pub fn decode_replay_document(bytes: &[u8]) -> Result<Vec<Frame>, DecodeError> {
    let document: RawReplayDocument = serde_json::from_slice(bytes)?;
    document
        .data
        .into_iter()
        .enumerate()
        .map(|(index, value)| raw_frame_from_value(value)?.into_frame(&format!("data[{index}].")))
        .collect()
}

pub fn encode_frame_json(frame: &Frame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

#[derive(Serialize)]
struct ReplayDocumentRef<'a> {
    data: &'a [Frame],
}

pub fn encode_replay_document(frames: &[Frame]) -> serde_json::Result<String> {
    serde_json::to_string(&ReplayDocumentRef { data: frames })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FRAME: &str = r#"{
        "step": [12],
        "match_step": [4],
        "points": [3, 5],
        "wins": [1, 0],
        "unit_move_cost": [2],
        "unit_sap_cost": 30,
        "unit_sap_range": [4],
        "unit_sensor_range": [2],
        "asteroids": [[1, 2], [3, 4]],
        "nebula": [[0, 5]],
        "relics": [[10, 11]],
        "vantage_points": [[7, 7]],
        "halo_tiles": [[9, 10], [11, 12]],
        "blue_shuttles": [[0, 0], [1, 0]],
        "blue_shuttles_actions": [[0, 0, 0], [5, -2, 3]],
        "red_shuttles": [[23, 23]],
        "blue_shuttles_energy": [100, 80],
        "red_shuttles_energy": [55],
        "energy": [1, -2.5, 0, 3],
        "vision": [true, 0, 1, false],
        "unexplored_frontier": [[6, 6]],
        "extra_key": "ignored"
    }"#;

    #[test]
    fn decodes_every_field() {
        let frame = decode_frame_json(FULL_FRAME.as_bytes()).unwrap();
        assert_eq!(frame.turn_index, Some(12));
        assert_eq!(frame.match_step, 4);
        assert_eq!(frame.score(Side::Blue), 3);
        assert_eq!(frame.score(Side::Red), 5);
        assert_eq!(frame.wins, [1, 0]);
        assert_eq!(frame.unit_move_cost, 2);
        assert_eq!(frame.unit_sap_cost, 30);
        assert_eq!(frame.unit_sap_range, 4);
        assert_eq!(frame.unit_sensor_range, 2);
        assert_eq!(frame.hazards, vec![Position::new(1, 2), Position::new(3, 4)]);
        assert_eq!(frame.nebula, vec![Position::new(0, 5)]);
        assert_eq!(frame.halo_tiles.len(), 2);
        assert_eq!(frame.units(Side::Red), &[Position::new(23, 23)]);
        assert_eq!(frame.blue_actions[1].kind, ActionKind::Sap);
        assert_eq!((frame.blue_actions[1].dx, frame.blue_actions[1].dy), (-2, 3));
        assert_eq!(frame.unit_energy(Side::Blue), &[100, 80]);
        assert_eq!(frame.energy_field, vec![1.0, -2.5, 0.0, 3.0]);
        assert_eq!(frame.vision, vec![true, false, true, false]);
        assert_eq!(frame.frontier, vec![Position::new(6, 6)]);
    }

    #[test]
    fn missing_step_is_reset_marker() {
        let frame = decode_frame_json(br#"{"points": [9, 9], "asteroids": [[1, 1]]}"#).unwrap();
        assert!(frame.is_reset_marker());
        assert_eq!(frame, Frame::default());
    }

    #[test]
    fn turn_index_alias_is_accepted() {
        let frame = decode_frame_json(br#"{"turn_index": 7}"#).unwrap();
        assert_eq!(frame.turn_index, Some(7));
        assert_eq!(frame.scores, [0, 0]);
        assert!(frame.hazards.is_empty());
    }

    #[test]
    fn wrong_score_arity_is_validation_error() {
        let err = decode_frame_json(br#"{"step": 1, "points": [3]}"#).unwrap_err();
        match err {
            DecodeError::Validation { field, .. } => assert_eq!(field, "points"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_position_arity_names_the_element() {
        let err = decode_frame_json(br#"{"step": 1, "relics": [[1, 2], [3]]}"#).unwrap_err();
        match err {
            DecodeError::Validation { field, .. } => assert_eq!(field, "relics[1]"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn empty_wrapped_scalar_is_validation_error() {
        let err = decode_frame_json(br#"{"step": []}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Validation { .. }));
    }

    #[test]
    fn negative_turn_is_validation_error() {
        let err = decode_frame_json(br#"{"step": -1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Validation { .. }));
    }

    #[test]
    fn unparseable_and_mistyped_input_is_malformed() {
        assert!(matches!(
            decode_frame_json(b"{not json").unwrap_err(),
            DecodeError::Malformed(_)
        ));
        assert!(matches!(
            decode_frame_json(br#"{"step": 1, "points": "high"}"#).unwrap_err(),
            DecodeError::Malformed(_)
        ));
        assert!(matches!(
            decode_frame_json(b"[1, 2]").unwrap_err(),
            DecodeError::Malformed(_)
        ));
    }

    #[test]
    fn canonical_encoding_decodes_to_same_frame() {
        let frame = decode_frame_json(FULL_FRAME.as_bytes()).unwrap();
        let encoded = encode_frame_json(&frame).unwrap();
        assert_eq!(decode_frame_json(encoded.as_bytes()).unwrap(), frame);
    }

    #[test]
    fn replay_document_reports_frame_index() {
        let doc = br#"{"data": [{"step": 0}, {"step": 1, "wins": [1, 2, 3]}]}"#;
        match decode_replay_document(doc).unwrap_err() {
            DecodeError::Validation { field, .. } => assert_eq!(field, "data[1].wins"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn replay_document_requires_data_key() {
        assert!(matches!(
            decode_replay_document(br#"{"frames": []}"#).unwrap_err(),
            DecodeError::Malformed(_)
        ));
    }

    #[test]
    fn action_codes_round_trip() {
        for code in -1..7 {
            assert_eq!(ActionKind::from_code(code).code(), code);
        }
        assert_eq!(ActionKind::from_code(9), ActionKind::Unknown(9));
    }

    #[test]
    fn red_action_list_is_not_recorded() {
        let frame = decode_frame_json(
            br#"{"step": 2, "blue_shuttles_actions": [[1, 0, 0]], "red_shuttles_actions": [[5, 1, 1]]}"#,
        )
        .unwrap();
        assert_eq!(frame.blue_actions.len(), 1);
        assert_eq!(frame.blue_actions[0].kind, ActionKind::from_code(1));
        let canonical = encode_frame_json(&frame).unwrap();
        assert!(!canonical.contains("red_shuttles_actions"));
    }
}
