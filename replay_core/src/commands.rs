use std::num::ParseIntError;

use telemetry_proto::Side;
use thiserror::Error;

/// One discrete operator action, whether typed or mapped from a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    StepForward(usize),
    StepBackward(usize),
    JumpToStart,
    JumpToEnd,
    ToggleEntity(usize),
    ToggleAll,
    SelectCell { x: usize, y: usize },
    TrackerSide(Side),
    Acknowledge,
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid side '{0}'")]
    InvalidSide(String),
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
}

pub fn parse_command_line(input: &str) -> Result<OperatorCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    let command = match verb.as_str() {
        "forward" | "f" => {
            let steps_str = parts.next().unwrap_or("1");
            OperatorCommand::StepForward(parse_usize(steps_str, "forward steps")?)
        }
        "back" | "b" => {
            let steps_str = parts.next().unwrap_or("1");
            OperatorCommand::StepBackward(parse_usize(steps_str, "back steps")?)
        }
        "start" => OperatorCommand::JumpToStart,
        "end" => OperatorCommand::JumpToEnd,
        "toggle" => {
            let entity_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("entity"))?;
            if entity_str.eq_ignore_ascii_case("all") {
                OperatorCommand::ToggleAll
            } else {
                OperatorCommand::ToggleEntity(parse_usize(entity_str, "toggle entity")?)
            }
        }
        "select" => {
            let x_str = parts.next().ok_or(CommandParseError::MissingArgument("x"))?;
            let y_str = parts.next().ok_or(CommandParseError::MissingArgument("y"))?;
            OperatorCommand::SelectCell {
                x: parse_usize(x_str, "select x")?,
                y: parse_usize(y_str, "select y")?,
            }
        }
        "side" => {
            let side_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("side"))?;
            OperatorCommand::TrackerSide(parse_side(side_str)?)
        }
        "ack" => OperatorCommand::Acknowledge,
        other => return Err(CommandParseError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = parts.next() {
        return Err(CommandParseError::UnexpectedArgument(extra.to_string()));
    }
    Ok(command)
}

fn parse_usize(value: &str, context: &'static str) -> Result<usize, CommandParseError> {
    value
        .parse::<usize>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

/// Side token shared by the `side` command and command-line flags.
pub fn parse_side(token: &str) -> Result<Side, CommandParseError> {
    match token.to_ascii_lowercase().as_str() {
        "blue" | "p0" | "0" => Ok(Side::Blue),
        "red" | "p1" | "1" => Ok(Side::Red),
        other => Err(CommandParseError::InvalidSide(other.to_string())),
    }
}
