//! Matrix signage daemon
//!
//! Shows MQTT announcements and the local weather on a 16x16 LED matrix.
//!
//! ## Architecture
//! - **Orchestrator** (tokio task): sole owner of the display; flashes and
//!   scrolls announcements, then hands the panel to the ambient presenter
//! - **Bus intake** (tokio task): polls MQTT, feeds the announcement queue
//! - **Refresh scheduler** (tokio task): weather refresh, heartbeat, backoff
//! - **Matrix thread** (std::thread): owns the `rpi-led-matrix` handle
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/matrix-signage --creds creds.json --assets-dir assets
//! ```

#[cfg(not(feature = "hardware"))]
fn main() {
    eprintln!("This binary requires the 'hardware' feature (rpi-led-matrix).");
    eprintln!("Build with: cargo build --release --features hardware");
    eprintln!("Tests run without it: cargo test");
    std::process::exit(1);
}

#[cfg(feature = "hardware")]
fn main() {
    if let Err(e) = hardware_main() {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "hardware")]
#[tokio::main]
async fn hardware_main() -> matrix_signage::Result<()> {
    use clap::Parser;
    use matrix_signage::ambient::SystemClock;
    use matrix_signage::assets::AssetStore;
    use matrix_signage::bus::{self, BusIntake, MessageRouter, MqttPublisher};
    use matrix_signage::config::{Args, Credentials, Timing, Topics};
    use matrix_signage::display::Display;
    use matrix_signage::matrix::MatrixSink;
    use matrix_signage::orchestrator::Orchestrator;
    use matrix_signage::queue::announcement_queue;
    use matrix_signage::render::FrameRenderer;
    use matrix_signage::scheduler::RefreshScheduler;
    use matrix_signage::state::SharedState;
    use matrix_signage::weather::OpenWeatherSource;
    use matrix_signage::{PANEL_SIZE, setup_signal_handler};
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();

    tracing::info!("Matrix signage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", PANEL_SIZE, PANEL_SIZE);
    tracing::info!("Assets dir: {}", args.assets_dir.display());
    tracing::info!("Credentials: {}", args.creds.display());

    // Fatal startup checks: credentials, assets, hardware.
    let creds = Credentials::load(&args.creds)?;
    let assets = AssetStore::load(&args.assets_dir, &args.font)?;
    let sink = MatrixSink::spawn(args.brightness)?;

    let shutdown = setup_signal_handler()?;
    let state = Arc::new(SharedState::new());
    let timing = Timing::default();
    let topics = Topics::default();
    let recovered = Arc::new(Notify::new());

    let display = Arc::new(Display::new(Box::new(sink), state.clone(), args.disabled_mode));
    display.blank()?;

    let (client, eventloop) = bus::connect(&creds, &args.client_id, &topics);
    let publisher = Arc::new(MqttPublisher::new(client.clone(), topics.clone()));
    let (queue_tx, queue_rx) = announcement_queue();

    let router = MessageRouter::new(topics, state.clone(), queue_tx, publisher.clone());
    let intake = BusIntake::new(client, router);
    let bus_task = tokio::spawn(intake.run(eventloop, shutdown.child_token()));

    let weather = OpenWeatherSource::new(
        creds.weather_api_key.clone(),
        creds.weather_location.clone(),
        assets.weather,
    )?;
    let scheduler = RefreshScheduler::new(
        state.clone(),
        Arc::new(weather),
        publisher,
        timing,
        recovered.clone(),
    );
    scheduler.prime().await;
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.child_token()));

    let renderer = Arc::new(FrameRenderer::new(assets.font, args.rotations()));
    let orchestrator = Orchestrator::new(
        display,
        state,
        renderer,
        assets.flash,
        timing,
        Arc::new(SystemClock),
        recovered,
    );

    // Runs until Ctrl+C.
    orchestrator.run(queue_rx, shutdown.child_token()).await;

    shutdown.cancel();
    for (name, task) in [("bus", bus_task), ("scheduler", scheduler_task)] {
        if let Err(e) = task.await {
            tracing::warn!("{} task failed: {}", name, e);
        }
    }

    tracing::info!("Shut down cleanly.");
    Ok(())
}
