use anyhow::Context;
use clap::Parser;
use telemetry_bus::config::{Cli, Config};
use telemetry_bus::registry::MetricRegistry;
use telemetry_bus::scheduler::TelemetryScheduler;
use telemetry_bus::server::{downlink, ingest, request, telecommand};
use telemetry_bus::spectrometer::{republish, SpectrometerHandoff};
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::load(&cli.config).context("loading configuration")?;
    config.apply_cli(&cli);

    // Single-threaded cooperative reactor: the spec requires that all
    // suspension points be exactly recv_from/send_to/timer expiry, which a
    // current-thread tokio runtime with tokio::select! gives us directly
    // instead of hand-rolling an epoll loop.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building single-threaded runtime")?;

    // The registry is Rc<RefCell<_>>, not Arc<Mutex<_>> (see DESIGN.md,
    // registry thread-safety decision) — every future that touches it is
    // !Send, so these run on a LocalSet instead of tokio::spawn.
    let local = tokio::task::LocalSet::new();
    let exit_code = local.block_on(&runtime, run(config));
    std::process::exit(exit_code);
}

async fn run(config: Config) -> i32 {
    let registry = MetricRegistry::new(config.bps, config.max_packet_size);
    let scheduler = TelemetryScheduler::new(registry.clone());

    let ingest_task = tokio::task::spawn_local(ingest::run(config.ingest_addr, registry.clone()));
    let request_task = tokio::task::spawn_local(request::run(config.request_addr, registry.clone()));
    let telecommand_task = tokio::task::spawn_local(telecommand::run(config.telecommand_addr, registry.clone()));
    let downlink_task = tokio::task::spawn_local(downlink::run(
        config.downlink_bind_addr,
        config.downlink_target_addr,
        registry.clone(),
        scheduler,
    ));
    let spectrometer_task = tokio::task::spawn_local(spectrometer_loop(
        registry.clone(),
        config.spectrometer_shm_name.clone(),
        Duration::from_millis(config.spectrometer_poll_interval_ms),
    ));

    info!(
        ingest = %config.ingest_addr,
        request = %config.request_addr,
        telecommand = %config.telecommand_addr,
        downlink_bind = %config.downlink_bind_addr,
        downlink_target = %config.downlink_target_addr,
        "telemetry bus started"
    );

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received, closing sockets");
            0
        }
        res = ingest_task => { log_task_exit("ingest", res); 1 }
        res = request_task => { log_task_exit("request", res); 1 }
        res = telecommand_task => { log_task_exit("telecommand", res); 1 }
        res = downlink_task => { log_task_exit("downlink", res); 1 }
        res = spectrometer_task => { log_task_exit("spectrometer", res); 1 }
    }
}

fn log_task_exit(name: &str, res: Result<anyhow::Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => warn!(server = name, "server task exited unexpectedly"),
        Ok(Err(e)) => error!(server = name, error = %e, "server task failed"),
        Err(e) => error!(server = name, error = %e, "server task panicked"),
    }
}

/// The spectrometer hand-off, modeled as a periodic reactor task rather
/// than a dedicated thread (§4.6). If the shared-memory region cannot be
/// opened, this is logged once and the task exits — the other three
/// servers are unaffected, per the independence guarantee in §4.5.
async fn spectrometer_loop(registry: MetricRegistry, shm_name: String, poll_interval: Duration) -> anyhow::Result<()> {
    let handoff = match SpectrometerHandoff::open(&shm_name) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, shm_name, "spectrometer shared memory unavailable, hand-off disabled");
            return Ok(());
        }
    };
    let mut ticker = interval(poll_interval);
    loop {
        ticker.tick().await;
        if let Some(sample) = handoff.poll() {
            republish(&registry, sample);
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
