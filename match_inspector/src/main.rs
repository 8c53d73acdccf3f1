use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use replay_core::{http, load_inspector_config, ReplayPaths, ReplaySequence, Session};
use telemetry_proto::Side;
use tracing::{error, info};

mod app;
mod ui;

use app::InspectorApp;

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Match inspector for live and recorded games", long_about = None)]
struct Cli {
    /// Inspector config JSON; overrides INSPECTOR_CONFIG_PATH.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Accept frames POSTed by a running match.
    Live {
        /// Address to listen on; overrides the configured one.
        #[arg(long)]
        bind: Option<std::net::SocketAddr>,
        /// Hold each reply until the frame is acknowledged with space.
        #[arg(long)]
        synchronous_ack: bool,
    },
    /// Step through a recorded match.
    Replay {
        /// State file; `<base>.p0.tracker` / `<base>.p1.tracker` are picked up when present.
        state: PathBuf,
        /// Which side's tracker feeds the heatmap.
        #[arg(long, value_enum)]
        side: Option<SideArg>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SideArg {
    Blue,
    Red,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Blue => Side::Blue,
            SideArg::Red => Side::Red,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let mut config = load_inspector_config(cli.config.as_deref());

    let (session, renders) = match cli.mode {
        Mode::Live {
            bind,
            synchronous_ack,
        } => {
            if let Some(bind) = bind {
                config.gateway.bind = bind;
            }
            config.gateway.synchronous_ack |= synchronous_ack;
            let (session, renders) = Session::live(config);
            if let Some(gateway) = session.gateway() {
                let gateway = Arc::clone(gateway);
                tokio::spawn(async move {
                    if let Err(err) = http::bind_and_serve(gateway).await {
                        error!(error = %err, "gateway.stopped");
                    }
                });
            }
            (session, Some(renders))
        }
        Mode::Replay { state, side } => {
            if let Some(side) = side {
                config.replay.tracker_side = side.into();
            }
            let paths = ReplayPaths::discover(&state);
            let sequence = ReplaySequence::load(&paths)
                .wrap_err_with(|| format!("failed to load replay {}", state.display()))?;
            (Session::replay(config, sequence), None)
        }
    };

    info!("Inspector ready. Press q to exit.");
    tokio::task::spawn_blocking(move || -> Result<()> {
        let app = InspectorApp::new(session, renders, log_rx)?;
        app.run()
    })
    .await??;

    Ok(())
}
