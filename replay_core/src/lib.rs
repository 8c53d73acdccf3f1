//! Core of the match inspector.
//!
//! Holds the belief tensor store, the heatmap aggregator, the current match
//! state and the two drivers that feed it: [`ReplayController`] for recorded
//! matches and [`LiveGateway`] for frames pushed by a running match.

mod aggregate;
mod commands;
pub mod config;
mod gateway;
pub mod http;
mod key_repeat;
mod match_state;
pub mod metrics;
mod replay;
mod session;
mod tensor_store;

pub use aggregate::{aggregate, Aggregate, BoardSize, EntitySelection, Heatmap, ACTIVE_EPSILON};
pub use commands::{parse_command_line, parse_side, CommandParseError, OperatorCommand};
pub use config::{
    load_inspector_config, load_inspector_config_from_env, ConfigError, GatewayConfig,
    InspectorConfig, ReplayConfig,
};
pub use gateway::{AckHandle, GatewayError, LiveGateway, RenderRequest, SUCCESS_RESPONSE};
pub use key_repeat::{KeyRepeat, ScrubDirection};
pub use match_state::{CellFeature, CellReport, MatchState, SharedMatchState};
pub use metrics::{MetricsSnapshot, SessionMetrics};
pub use replay::{ReplayController, ReplayError, ReplayPaths, ReplaySequence, TRACKER_EXTENSION};
pub use session::{CommandOutcome, Session, SessionMode, SessionSnapshot};
pub use tensor_store::{BeliefTensorStore, EntityBeliefs};
