use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use touchbridge::link::{LinkContext, SimulatedLink};
use touchbridge::touch::{RawButtonSample, RawPositionalSample, ScaledPoint, SurfaceSize};
use touchbridge::{BridgeConfig, InputSink, TouchDevice};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Stands in for the host input framework
struct LoggingSink;

impl InputSink for LoggingSink {
    fn report_move(&self, point: ScaledPoint) {
        info!("Host input: move {}", point);
    }

    fn report_up(&self, point: ScaledPoint) {
        info!("Host input: up {}", point);
    }

    fn report_down(&self, point: ScaledPoint) {
        info!("Host input: down {}", point);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = BridgeConfig::default_path();
    let config = match BridgeConfig::load_or_create(&config_path).await {
        Ok(config) => config,
        Err(e) => {
            warn!("Using default config: {}", e);
            BridgeConfig::default()
        }
    };
    info!("Bridge config: {:?}", config);

    let link = Arc::new(SimulatedLink::new());
    let context = LinkContext::open(link.clone())
        .map_err(|e| eyre!("Failed to open touch controller: {}", e))?;

    let surface = SurfaceSize::new(1920, 1080);
    let mut device = TouchDevice::new(context, &surface, Arc::new(LoggingSink), &config)
        .map_err(|e| eyre!("Failed to activate touch device: {}", e))?;

    device.on_down(|args| info!("Observer saw down at {}", args.point));
    // Claims every second move so the host only sees half of them.
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    device.on_move(move |args| {
        let n = counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        args.handled = n % 2 == 1;
    });

    let hardware = link.clone();
    tokio::task::spawn_blocking(move || replay_gesture(&hardware))
        .await
        .map_err(|e| eyre!("Gesture replay failed: {}", e))?;

    device.dispose();
    info!("Last reported position: {}", device.position());
    Ok(())
}

/// A short swipe: press, drag right, release.
fn replay_gesture(link: &SimulatedLink) {
    let mut tick = 0;
    let mut next_tick = || {
        tick += 1;
        tick
    };

    for step in 0..8u32 {
        let raw = 1000 + step * 200;
        link.inject_record(RawPositionalSample {
            tick: next_tick(),
            raw_x: raw,
            raw_y: 2048,
            cal_x: raw / 2,
            cal_y: 1024,
            ..Default::default()
        });
        if step == 0 {
            link.inject_record(RawButtonSample {
                tick: next_tick(),
                left: true,
                ..Default::default()
            });
        }
    }

    link.inject_record(RawButtonSample {
        tick: next_tick(),
        ..Default::default()
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
