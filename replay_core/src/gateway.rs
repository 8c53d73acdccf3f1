//! Live frame ingestion.
//!
//! One frame is accepted at a time. A request that arrives while another is
//! still being applied or waiting for release is rejected with
//! [`GatewayError::Busy`].

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use telemetry_proto::{decode_frame_json, DecodeError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::match_state::SharedMatchState;
use crate::metrics::SessionMetrics;

pub const SUCCESS_RESPONSE: &[u8] = br#"{"status":"success"}"#;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("another frame is still being processed")]
    Busy,
}

/// Sent after each applied frame; the receiver should redraw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRequest {
    pub turn_index: Option<u32>,
}

/// Operator side of the acknowledgement handshake.
#[derive(Debug, Clone)]
pub struct AckHandle {
    sender: Sender<()>,
}

impl AckHandle {
    /// Release the frame currently waiting, if any. Returns false when an
    /// acknowledgement is already queued.
    pub fn acknowledge(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => false,
        }
    }
}

pub struct LiveGateway {
    state: SharedMatchState,
    config: GatewayConfig,
    metrics: Arc<SessionMetrics>,
    in_flight: Mutex<()>,
    render_tx: Sender<RenderRequest>,
    ack_tx: Sender<()>,
    ack_rx: Receiver<()>,
}

impl LiveGateway {
    pub fn new(
        state: SharedMatchState,
        config: GatewayConfig,
        metrics: Arc<SessionMetrics>,
    ) -> (Self, Receiver<RenderRequest>) {
        let (render_tx, render_rx) = unbounded();
        let (ack_tx, ack_rx) = bounded(1);
        let gateway = Self {
            state,
            config,
            metrics,
            in_flight: Mutex::new(()),
            render_tx,
            ack_tx,
            ack_rx,
        };
        (gateway, render_rx)
    }

    pub fn ack_handle(&self) -> AckHandle {
        AckHandle {
            sender: self.ack_tx.clone(),
        }
    }

    pub fn state(&self) -> &SharedMatchState {
        &self.state
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<SessionMetrics> {
        &self.metrics
    }

    /// Decode `body` as one frame, apply it, request a render, then hold the
    /// reply until released. A body that fails to decode leaves match state
    /// untouched.
    pub fn ingest(&self, body: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let Some(_in_flight) = self.in_flight.try_lock() else {
            self.metrics.record_busy();
            warn!(target: "match_inspector::gateway", "ingest.rejected=busy");
            return Err(GatewayError::Busy);
        };

        let frame = match decode_frame_json(body) {
            Ok(frame) => frame,
            Err(err) => {
                self.metrics.record_rejected();
                warn!(
                    target: "match_inspector::gateway",
                    error = %err,
                    bytes = body.len(),
                    "ingest.rejected=decode"
                );
                return Err(err.into());
            }
        };

        let turn_index = frame.turn_index;
        self.state.lock().apply(frame);
        self.metrics.record_applied();
        info!(
            target: "match_inspector::gateway",
            turn = ?turn_index,
            "frame.applied"
        );

        // Acknowledgements sent before this frame was shown must not release it.
        if self.config.synchronous_ack {
            while self.ack_rx.try_recv().is_ok() {
                debug!(target: "match_inspector::gateway", "ack.discarded=stale");
            }
        }
        if self.render_tx.send(RenderRequest { turn_index }).is_err() {
            debug!(target: "match_inspector::gateway", "render.no_listener");
        }

        self.await_release();
        Ok(SUCCESS_RESPONSE.to_vec())
    }

    fn await_release(&self) {
        if !self.config.synchronous_ack {
            thread::sleep(self.config.reply_delay());
            return;
        }

        match self.ack_rx.recv_timeout(self.config.ack_timeout()) {
            Ok(()) => debug!(target: "match_inspector::gateway", "ack.received"),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.metrics.record_implicit_ack();
                warn!(
                    target: "match_inspector::gateway",
                    timeout_ms = self.config.ack_timeout_ms,
                    "ack.implicit=timeout"
                );
            }
        }
    }
}
