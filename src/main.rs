use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use fractal_voyager::config::{Config, DEFAULT_CONFIG_PATH, GestureConfig};
use fractal_voyager::gesture::SimInput;
use fractal_voyager::snapshot::save_snapshot;
use fractal_voyager::{
    FractalKind, GestureClassifier, GestureSlot, HandTracker, NarrationBridge, Narrator, RenderLoop,
    SimulatedHandTracker, TrackerKind, Visualizer, join_gesture_loop, spawn_gesture_loop,
};

#[derive(Parser, Debug)]
#[command(version, about = "Explore fractals with hand gestures")]
struct Args {
    /// JSON config file; defaults are used when it does not exist
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Window width in pixels
    #[arg(long, short = 'W')]
    width: Option<usize>,

    /// Window height in pixels
    #[arg(long, short = 'H')]
    height: Option<usize>,

    /// mandelbrot, julia or burning-ship
    #[arg(long)]
    fractal: Option<FractalKind>,

    /// Iteration budget per pixel (capped at 1000)
    #[arg(long)]
    iterations: Option<u32>,

    /// Hand tracker: none or simulated
    #[arg(long)]
    tracker: Option<TrackerKind>,

    /// Render the starting view to this PNG and exit
    #[arg(long, value_name = "PNG")]
    snapshot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = Config::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?;
    apply_overrides(&mut config, &args);
    config.validate().context("checking configuration")?;

    let initial = config.viewport.to_viewport();
    log::info!(
        "{} at ({}, {}) zoom {:.2e}, {} iterations, {}x{}",
        initial.fractal,
        initial.center.re,
        initial.center.im,
        initial.zoom,
        initial.iterations,
        config.window.width,
        config.window.height
    );

    if let Some(path) = &args.snapshot {
        save_snapshot(&initial, config.window.width, config.window.height, path)
            .with_context(|| format!("rendering {}", path.display()))?;
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let api_key = config.narration.api_key();
    if api_key.is_none() {
        log::warn!("{} is not set; narration will show a placeholder", config.narration.api_key_env);
    }
    let narrator = Narrator::new(NarrationBridge::new(config.narration.clone(), api_key), runtime.handle().clone());

    let slot = GestureSlot::new();
    let running = Arc::new(AtomicBool::new(true));
    let (tracker, sim_tx) = open_tracker(&config.gesture);
    let gesture_thread = match tracker {
        Some(tracker) => {
            let interval = Duration::from_secs_f64(1.0 / config.gesture.poll_hz.max(1) as f64);
            let classifier = GestureClassifier::new(config.gesture.deadzone);
            match spawn_gesture_loop(tracker, classifier, slot.clone(), interval, Arc::clone(&running)) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("cannot start gesture loop: {}; continuing without input", e);
                    None
                }
            }
        }
        None => {
            log::warn!("no hand tracker; the view will only drift in color");
            None
        }
    };

    let mut render_loop = RenderLoop::new(initial, config.physics, slot);
    let result = Visualizer::new(&config.window, sim_tx, gesture_thread.is_some())
        .and_then(|mut vis| vis.run(&mut render_loop, &narrator));

    running.store(false, Ordering::Relaxed);
    if let Some(handle) = gesture_thread {
        if let Err(cause) = join_gesture_loop(handle) {
            log::error!("gesture thread panicked: {}", cause);
        }
    }
    runtime.shutdown_timeout(Duration::from_millis(200));

    result.context("fractal viewport stopped")?;
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(w) = args.width {
        config.window.width = w;
    }
    if let Some(h) = args.height {
        config.window.height = h;
    }
    if let Some(kind) = args.fractal {
        config.viewport.fractal = kind;
    }
    if let Some(n) = args.iterations {
        config.viewport.iterations = n;
    }
    if let Some(tracker) = args.tracker {
        config.gesture.tracker = tracker;
    }
}

fn open_tracker(config: &GestureConfig) -> (Option<Box<dyn HandTracker>>, Option<Sender<SimInput>>) {
    match config.tracker {
        TrackerKind::None => (None, None),
        TrackerKind::Simulated => {
            log::info!("simulated hand: arrows move, O open palm, F fist, R relaxed, H hide");
            let (tx, rx) = mpsc::channel();
            let tracker: Box<dyn HandTracker> = Box::new(SimulatedHandTracker::new(rx, config.sim_jitter));
            (Some(tracker), Some(tx))
        }
    }
}
