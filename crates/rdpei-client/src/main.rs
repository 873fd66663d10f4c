//! Input channel demo binary.
//!
//! Loads the engine config, plays the peer's side of negotiation, then
//! replays a two-finger pinch and one pen stroke through the engine.  PDUs go
//! to the log, or to `capture_path` when the config sets one.
//!
//! ```text
//! main()
//!  └─ EngineConfig::load_from()     -- first CLI argument, or rdpei.toml
//!  └─ InputEngine::new() + open()   -- spawns the cadence task unless
//!  │                                   synchronous_mode is set
//!  └─ on_data_received(SC_READY)    -- engine answers CS_READY
//!  └─ replay_pinch() / replay_pen_stroke()
//!  └─ close()
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rdpei_client::application::engine::{ChannelTransport, InputEngine};
use rdpei_client::application::host::HostSession;
use rdpei_client::infrastructure::{
    host_control::SessionControlHandler,
    storage::config::EngineConfig,
    transport::{LoggingTransport, StreamTransport},
};
use rdpei_core::protocol::messages::{sc_ready_features, ScReadyPdu, PROTOCOL_V300};
use rdpei_core::{encode_pdu, PenOptionalFields, RdpeiPdu};

const DEFAULT_CONFIG_FILE: &str = "rdpei.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = EngineConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    // Initialise structured logging.  RUST_LOG wins over the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.engine.log_level)),
        )
        .init();

    info!(config = %config_path.display(), "input channel demo starting");

    // ── Engine wiring ─────────────────────────────────────────────────────────
    let host = Arc::new(HostSession::new(config.engine.feature_mask));
    let control = Arc::new(SessionControlHandler::new(Arc::clone(&host)));
    let transport: Arc<dyn ChannelTransport> = match &config.engine.capture_path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("creating capture file {}", path.display()))?;
            info!(path = %path.display(), "writing PDUs to capture file");
            Arc::new(StreamTransport::new(file))
        }
        None => Arc::new(LoggingTransport::new()),
    };

    let engine = InputEngine::new(config.engine_options(), transport, control, host);
    engine.open();

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    // ── Negotiation (peer side) ───────────────────────────────────────────────
    let sc_ready = encode_pdu(&RdpeiPdu::ScReady(ScReadyPdu {
        protocol_version: PROTOCOL_V300,
        features: Some(sc_ready_features::MULTIPEN_INJECTION_SUPPORTED),
    }))?;
    engine.on_data_received(&sc_ready).await?;
    info!(
        version = engine.version(),
        features = engine.features(),
        "negotiation complete"
    );

    // ── Replay ────────────────────────────────────────────────────────────────
    replay_pinch(&engine, &running).await?;
    replay_pen_stroke(&engine, &running).await?;

    engine.close().await;
    info!("input channel demo finished");
    Ok(())
}

/// Lets one cycle happen.  In synchronous mode the demo is the host, so it
/// drives the cycle itself.
async fn settle(engine: &InputEngine) -> anyhow::Result<()> {
    let options = engine.options();
    tokio::time::sleep(options.poll_interval).await;
    if options.synchronous_mode {
        let outcome = engine.poll_cycle().await?;
        debug!(?outcome, "host-driven cycle");
    }
    Ok(())
}

/// Two fingers spreading apart horizontally.
async fn replay_pinch(engine: &InputEngine, running: &AtomicBool) -> anyhow::Result<()> {
    info!("replaying two-finger pinch");
    let (left, right) = (1, 2);
    engine.touch_begin(left, 400, 300);
    engine.touch_begin(right, 600, 300);
    settle(engine).await?;

    for step in 1..=10 {
        if !running.load(Ordering::Relaxed) {
            return Ok(());
        }
        engine.touch_update(left, 400 - step * 15, 300);
        engine.touch_update(right, 600 + step * 15, 300);
        settle(engine).await?;
    }

    engine.touch_end(left, 250, 300);
    engine.touch_end(right, 750, 300);
    settle(engine).await
}

/// Hover in, draw a short line with rising pressure, lift, leave range.
async fn replay_pen_stroke(engine: &InputEngine, running: &AtomicBool) -> anyhow::Result<()> {
    info!("replaying pen stroke");
    let pen = 7;
    engine.pen_hover_begin(pen, 100, 100, PenOptionalFields::new());
    settle(engine).await?;

    engine.pen_begin(pen, 100, 100, PenOptionalFields::new().pressure(128));
    settle(engine).await?;

    for step in 1..=10u32 {
        if !running.load(Ordering::Relaxed) {
            break;
        }
        let fields = PenOptionalFields::new()
            .pressure(128 + step * 80)
            .tilt(10, -5)
            .rotation(step * 30);
        engine.pen_update(pen, 100 + step as i32 * 20, 100 + step as i32 * 5, fields);
        settle(engine).await?;
    }

    engine.pen_end(pen, 300, 150, PenOptionalFields::new());
    settle(engine).await?;
    engine.pen_hover_cancel(pen, 300, 150, PenOptionalFields::new());
    settle(engine).await
}
