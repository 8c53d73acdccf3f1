use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use replay_core::{
    load_inspector_config, parse_command_line, parse_side, CommandOutcome, ReplayPaths,
    ReplaySequence, Session,
};
use serde_json::{json, Value as JsonValue};
use telemetry_proto::encode_frame_json;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless replay driver for the match inspector", long_about = None)]
struct Args {
    /// Replay state file (`<base>.json`)
    state: PathBuf,

    /// Inspector config JSON; overrides INSPECTOR_CONFIG_PATH
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore `<base>.p0.tracker` / `<base>.p1.tracker`
    #[arg(long)]
    no_trackers: bool,

    /// Tracker side feeding the heatmap (blue or red)
    #[arg(long)]
    side: Option<String>,

    /// Operator command to run, e.g. `forward 3` (repeatable, runs before --script)
    #[arg(long = "command")]
    commands: Vec<String>,

    /// File with one operator command per line; `#` starts a comment
    #[arg(long)]
    script: Option<PathBuf>,

    /// Include the full current frame in every summary
    #[arg(long)]
    dump_frame: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_inspector_config(args.config.as_deref());
    if let Some(side) = &args.side {
        config.replay.tracker_side =
            parse_side(side).with_context(|| format!("invalid --side '{side}'"))?;
    }

    let paths = if args.no_trackers {
        ReplayPaths::state_only(&args.state)
    } else {
        ReplayPaths::discover(&args.state)
    };
    let sequence = ReplaySequence::load(&paths)
        .with_context(|| format!("Failed to load replay {}", args.state.display()))?;
    let mut session = Session::replay(config, sequence);

    let mut lines = args.commands.clone();
    if let Some(script) = &args.script {
        lines.extend(read_script(script)?);
    }

    println!("{}", serde_json::to_string_pretty(&summary(&session, None, None, args.dump_frame)?)?);
    for line in lines {
        let command = parse_command_line(&line)
            .with_context(|| format!("Invalid operator command '{}'", line))?;
        let outcome = session.handle(command);
        let report = summary(&session, Some(&line), Some(&outcome), args.dump_frame)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn summary(
    session: &Session,
    line: Option<&str>,
    outcome: Option<&CommandOutcome>,
    dump_frame: bool,
) -> Result<JsonValue> {
    let mut report = json!({
        "command": line,
        "outcome": outcome.map(outcome_label),
        "session": session.snapshot(),
    });
    if let Some(CommandOutcome::CellSelected(cell)) = outcome {
        let features: Vec<&str> = cell.features.iter().map(|feature| feature.label()).collect();
        report["cell"] = json!({
            "x": cell.position.x,
            "y": cell.position.y,
            "belief": cell.belief,
            "energy": cell.energy,
            "visible": cell.visible,
            "features": features,
            "blue_units": cell.blue_units,
            "red_units": cell.red_units,
        });
    }
    if dump_frame {
        let frame_json = encode_frame_json(session.state().lock().frame())?;
        report["frame"] = serde_json::from_str(&frame_json)?;
    }
    Ok(report)
}

fn outcome_label(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Rendered => "rendered".to_string(),
        CommandOutcome::Unchanged => "unchanged".to_string(),
        CommandOutcome::Acknowledged => "acknowledged".to_string(),
        CommandOutcome::CellSelected(_) => "cell_selected".to_string(),
        CommandOutcome::Ignored(reason) => format!("ignored: {reason}"),
    }
}

fn read_script(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script at {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
