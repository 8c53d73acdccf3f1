use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use clap::Parser;
use telemetry_proto::Side;
use tracing::{error, info};

use replay_core::{http, load_inspector_config, LiveGateway, MatchState, SessionMetrics};

#[derive(Parser, Debug)]
#[command(about = "Headless live frame gateway")]
struct Args {
    /// Inspector config JSON; overrides INSPECTOR_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Bind address; overrides the configured one.
    #[arg(long)]
    bind: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = load_inspector_config(args.config.as_deref());
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }
    // Nobody is attached to acknowledge frames.
    config.gateway.synchronous_ack = false;

    let state = MatchState::shared(config.board);
    let metrics = Arc::new(SessionMetrics::default());
    let (gateway, renders) =
        LiveGateway::new(Arc::clone(&state), config.gateway.clone(), Arc::clone(&metrics));

    thread::spawn(move || {
        for request in renders.iter() {
            let state = state.lock();
            info!(
                target: "match_inspector::live_server",
                turn = ?request.turn_index,
                blue = state.score(Side::Blue),
                red = state.score(Side::Red),
                applied = metrics.snapshot().frames_applied,
                "turn.received"
            );
        }
    });

    info!(
        target: "match_inspector::live_server",
        bind = %config.gateway.bind,
        reply_delay_ms = config.gateway.reply_delay_ms,
        "live server ready"
    );

    if let Err(err) = http::bind_and_serve(Arc::new(gateway)).await {
        error!(
            target: "match_inspector::live_server",
            error = %err,
            "gateway.stopped"
        );
        std::process::exit(1);
    }
}
