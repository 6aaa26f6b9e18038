//! Pointer CLI
//!
//! Drive a pointer controller through a scripted session against a threaded
//! vsync clock and an in-memory render backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pointer_controller::{ControllerConfig, PointerController, Presentation, Transition};
use pointer_platform::headless::{RecordingBackend, StaticResources};
use pointer_platform::threaded::ThreadedClock;
use pointer_platform::{
    AnimationResource, ButtonState, ClockSource, Contact, DisplayId, IconId, SpriteIcon, Viewport,
    NANOS_PER_MILLI,
};
use smallvec::SmallVec;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pointerctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pointer controller session runner", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Controller config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session and print a summary
    Run {
        /// Emulated display refresh rate
        #[arg(long, default_value = "60")]
        refresh_hz: u32,

        /// Number of simultaneous touch contacts to simulate
        #[arg(short, long, default_value = "3")]
        touches: u32,

        /// Quarter turns to rotate the display through
        #[arg(short, long, default_value = "4")]
        rotate: u32,

        /// Display width in pixels
        #[arg(long, default_value = "1080")]
        width: i32,

        /// Display height in pixels
        #[arg(long, default_value = "1920")]
        height: i32,
    },

    /// Print the effective controller config as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            refresh_hz,
            touches,
            rotate,
            width,
            height,
        } => cmd_run(
            config,
            &SessionOptions {
                refresh_hz,
                touches,
                rotate,
                width,
                height,
            },
        ),

        Commands::Config => cmd_config(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    let config = match path {
        Some(path) => ControllerConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ControllerConfig::default(),
    };
    config.validate().context("Invalid controller config")?;
    Ok(config)
}

fn cmd_config(config: &ControllerConfig) -> Result<()> {
    let toml = config.to_toml().context("Failed to serialize config")?;
    println!("{toml}");
    Ok(())
}

struct SessionOptions {
    refresh_hz: u32,
    touches: u32,
    rotate: u32,
    width: i32,
    height: i32,
}

/// A small hourglass animation served under the wait icon
fn wait_animation() -> AnimationResource {
    let frames: Vec<SpriteIcon> = [[200, 200, 0, 255], [150, 150, 0, 255], [100, 100, 0, 255]]
        .into_iter()
        .map(StaticResources::icon)
        .collect();
    AnimationResource::new(frames, 80 * NANOS_PER_MILLI)
}

fn cmd_run(config: ControllerConfig, options: &SessionOptions) -> Result<()> {
    if options.width <= 0 || options.height <= 0 {
        anyhow::bail!(
            "Invalid display size {}x{}",
            options.width,
            options.height
        );
    }

    let pointer_fade = Duration::from_millis(config.fade.pointer_ms);
    let spot_fade = Duration::from_millis(config.fade.spot_ms);

    let clock = Arc::new(ThreadedClock::new(options.refresh_hz));
    let frame = Duration::from_nanos(clock.frame_period().max(0) as u64);
    let backend = RecordingBackend::new();
    let resources = Arc::new(StaticResources::new().with_animation(IconId::WAIT, wait_animation()));

    info!(
        "Starting session: {}x{} at {} Hz, {} touches, {} rotations",
        options.width, options.height, options.refresh_hz, options.touches, options.rotate
    );

    let controller = PointerController::with_config(
        resources,
        Arc::clone(&clock) as Arc<dyn ClockSource>,
        Arc::new(backend.clone()),
        config,
    );
    if controller.listener_id().is_none() {
        warn!("Clock registration failed; animations will not run");
    }

    let mut viewport = Viewport::new(DisplayId::DEFAULT, options.width, options.height);
    controller.set_display_viewport(viewport);
    controller.unfade(Transition::Gradual);
    wait_for_animations(&controller, pointer_fade + frame * 4);

    // Sweep the pointer diagonally with the primary button held
    controller.set_button_state(ButtonState::PRIMARY);
    for _ in 0..30 {
        controller.move_by(12.0, 20.0);
        thread::sleep(frame);
    }
    controller.set_button_state(ButtonState::NONE);
    let (x, y) = controller.position();
    info!("Pointer after sweep: ({x:.1}, {y:.1})");

    // Animated icon for a while, then back to the arrow
    controller.update_pointer_icon(IconId::WAIT);
    thread::sleep(frame * 20);
    debug!(
        "Wait icon reached frame {}",
        controller.pointer_state().frame_index
    );
    controller.update_pointer_icon(IconId::ARROW);

    // Touches: contacts slide apart, then lift one at a time
    controller.set_presentation(Presentation::Spot);
    let (cx, cy) = (options.width as f32 / 2.0, options.height as f32 / 2.0);
    for step in 0..20u32 {
        let contacts: SmallVec<[Contact; 8]> = (0..options.touches)
            .map(|id| {
                let offset = (step * 4 + id * 60) as f32;
                Contact::new(id, cx + offset, cy - offset, 1.0)
            })
            .collect();
        controller.set_spots(&contacts, DisplayId::DEFAULT);
        thread::sleep(frame);
    }
    for lifted in 1..=options.touches {
        let remaining: SmallVec<[Contact; 8]> = (lifted..options.touches)
            .map(|id| Contact::new(id, cx, cy + id as f32 * 60.0, 0.0))
            .collect();
        controller.set_spots(&remaining, DisplayId::DEFAULT);
        thread::sleep(frame * 2);
    }
    wait_for_animations(&controller, spot_fade + frame * 4);
    info!(
        "Spots after lift: {} live, {} sprites recycled",
        controller.spots(DisplayId::DEFAULT).len(),
        controller.recycled_sprite_count()
    );
    controller.set_presentation(Presentation::Pointer);

    // Rotate the display; the pointer keeps its physical position
    for _ in 0..options.rotate {
        viewport = viewport.rotated(viewport.rotation.next());
        controller.set_display_viewport(viewport);
        let (x, y) = controller.position();
        info!(
            "Rotated to {} degrees, pointer at ({x:.1}, {y:.1})",
            viewport.rotation.degrees()
        );
    }

    controller.fade(Transition::Gradual);
    let started = Instant::now();
    wait_for_animations(&controller, pointer_fade + frame * 4);
    debug!("Fade out took {:?}", started.elapsed());

    let state = controller.pointer_state();
    info!(
        "Session done: {} frames committed, {} sprites created, {} released, alpha {:.2}",
        backend.frames_committed(),
        backend.created_count(),
        backend.released_count(),
        state.alpha
    );
    if backend.mutations_outside_transaction() > 0 {
        warn!(
            "{} sprite mutations happened outside a transaction",
            backend.mutations_outside_transaction()
        );
    }

    drop(controller);
    info!("Controller released, {} sprites left", backend.sprite_count());
    Ok(())
}

/// Poll until the controller stops asking for ticks, or `limit` passes
fn wait_for_animations(controller: &PointerController, limit: Duration) {
    let deadline = Instant::now() + limit;
    while controller.is_animation_pending() {
        if Instant::now() >= deadline {
            warn!("Animations still running after {limit:?}");
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
