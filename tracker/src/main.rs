//! gazeboard-sim: replays a scripted gaze interaction through the tracking
//! core and prints every session event as an s-expression.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use gazeboard_tracker::clock::ManualClock;
use gazeboard_tracker::config::TrackerConfig;
use gazeboard_tracker::gaze::dwell::{DwellConfig, GraceClock, TargetClass};
use gazeboard_tracker::gaze::engine::SimulatedEngine;
use gazeboard_tracker::gaze::hysteresis::NullZonePolicy;
use gazeboard_tracker::gaze::zone::{BandLayout, Col, ContainerRect, GridSpec, Row, Zone};
use gazeboard_tracker::gaze::{GazeSession, Point};
use gazeboard_tracker::input_source::{replay, FrameEvent, RecordingFeed, ScriptedFeed};
use gazeboard_tracker::scheduler::ManualScheduler;

#[derive(Parser, Debug)]
#[command(name = "gazeboard-sim", about = "Gaze dwell tracking simulator")]
struct Cli {
    /// Screen resolution (WxH)
    #[arg(long, default_value = "1920x1080")]
    resolution: String,

    /// N×N cell grid; 0 selects the banded layout
    #[arg(long, default_value = "0")]
    grid_size: usize,

    /// Use two bands (up/down) instead of three
    #[arg(long)]
    two_rows: bool,

    /// Dwell time for every target, in milliseconds
    #[arg(long, default_value = "2000")]
    dwell_ms: f64,

    /// Grace period, in milliseconds
    #[arg(long, default_value = "400")]
    grace_ms: f64,

    /// Keep the dwell clock running through grace gaps
    #[arg(long)]
    running_grace: bool,

    /// Consecutive readings needed to change zone
    #[arg(long, default_value = "5")]
    stability: u32,

    /// Clear the zone on the first off-target reading
    #[arg(long)]
    clear_on_null: bool,

    /// Smoothing window size
    #[arg(long, default_value = "10")]
    window: usize,

    /// EMA factor in (0, 1]
    #[arg(long, default_value = "0.2")]
    ema_alpha: f64,

    /// Frame interval in milliseconds
    #[arg(long, default_value = "33")]
    frame_ms: u64,

    /// Do not re-anchor automatically on a recalibration request
    #[arg(long)]
    no_auto_reanchor: bool,

    /// Print the final session status
    #[arg(long)]
    status: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn parse_resolution(s: &str) -> Option<(f64, f64)> {
    let (w, h) = s.split_once('x')?;
    let w = w.parse::<u32>().ok()?;
    let h = h.parse::<u32>().ok()?;
    if w > 0 && h > 0 {
        Some((w as f64, h as f64))
    } else {
        None
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<TrackerConfig> {
    let (width, height) = parse_resolution(&cli.resolution)
        .with_context(|| format!("invalid resolution '{}'", cli.resolution))?;

    let mut config = TrackerConfig {
        screen_width: width,
        screen_height: height,
        auto_reanchor: !cli.no_auto_reanchor,
        ..TrackerConfig::default()
    };
    config.grid = match cli.grid_size {
        0 if cli.two_rows => GridSpec::Bands(BandLayout::TwoRows),
        0 => GridSpec::Bands(BandLayout::ThreeRows),
        n => GridSpec::cells(n, ContainerRect::new(0.0, 0.0, width, height))?,
    };
    config.dwell = DwellConfig {
        grace_clock: if cli.running_grace {
            GraceClock::Running
        } else {
            GraceClock::Frozen
        },
        ..DwellConfig::uniform(cli.dwell_ms, cli.grace_ms)
    };
    config.hysteresis.threshold = cli.stability;
    if cli.clear_on_null {
        config.hysteresis.null_policy = NullZonePolicy::ClearImmediately;
    }
    config.filter.window_size = cli.window;
    config.filter.ema_alpha = cli.ema_alpha;
    config.validate().context("invalid tracker configuration")?;
    Ok(config)
}

/// Target under test and the screen point at its center.
fn demo_target(config: &TrackerConfig) -> (Zone, Point) {
    let (w, h) = (config.screen_width, config.screen_height);
    match config.grid {
        GridSpec::Cells { size, bounds } => {
            let mid = size / 2;
            let cell_w = bounds.width / size as f64;
            let cell_h = bounds.height / size as f64;
            (
                Zone::Cell { row: mid, col: mid },
                Point::new(
                    bounds.left + (mid as f64 + 0.5) * cell_w,
                    bounds.top + (mid as f64 + 0.5) * cell_h,
                ),
            )
        }
        GridSpec::Bands(BandLayout::ThreeRows) => (
            Zone::Band {
                row: Row::Middle,
                col: Col::Center,
            },
            Point::new(w / 2.0, h / 2.0),
        ),
        GridSpec::Bands(BandLayout::TwoRows) => (
            Zone::Band {
                row: Row::Down,
                col: Col::Center,
            },
            Point::new(w / 2.0, h * 0.75),
        ),
    }
}

/// Fixate the target, drift the head and hold still, then come back.
fn scenario(target: Point, frame_ms: u64, dwell_ms: f64) -> ScriptedFeed {
    let frames = |ms: f64| (ms / frame_ms.max(1) as f64).ceil() as usize;
    let face = Point::new(320.0, 240.0);
    ScriptedFeed::new(vec![FrameEvent::Face {
        x: face.x,
        y: face.y,
    }])
    .fixate(target.x, target.y, frames(dwell_ms + 1000.0))
    .then(FrameEvent::Face {
        x: face.x + 30.0,
        y: face.y,
    })
    .fixate(target.x, target.y, frames(3000.0))
    .then(FrameEvent::NoFace)
    .then(FrameEvent::NoGaze)
    .then(FrameEvent::Face {
        x: face.x,
        y: face.y,
    })
    .fixate(target.x, target.y, frames(1000.0))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gazeboard-sim {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gazeboard_tracker=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("gazeboard-sim v{} starting", env!("CARGO_PKG_VERSION"));

    let config = build_config(&cli)?;
    info!("config: {}", config.config_sexp());
    let (target, target_center) = demo_target(&config);

    let clock = Arc::new(ManualClock::new());
    let mut session = GazeSession::new(
        config,
        SimulatedEngine::new(),
        clock.clone(),
        ManualScheduler::new(),
    )?;

    let mut events = session.start()?;
    session.engine_mut().set_face_center(Point::new(320.0, 240.0));
    events.extend(session.begin_calibration()?);
    clock.advance_ms(cli.frame_ms);
    events.extend(session.handle_frame(None));
    while session.calibration_point().is_some() {
        events.extend(session.confirm_calibration_point());
    }
    session.mount_target(target, TargetClass::Menu)?;

    let mut feed = RecordingFeed::new(scenario(target_center, cli.frame_ms, cli.dwell_ms));
    events.extend(replay(
        &mut feed,
        &mut session,
        &clock,
        Duration::from_millis(cli.frame_ms),
    ));
    events.extend(session.stop());

    for event in &events {
        println!("{}", event.to_sexp());
    }
    info!(
        "replayed {} frame events over {:.0}ms, {} session events",
        feed.recorded().len(),
        clock.elapsed_ms(),
        events.len()
    );
    if cli.status {
        println!("{}", session.status_sexp());
    }
    Ok(())
}
