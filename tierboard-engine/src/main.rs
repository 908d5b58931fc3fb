//! tierboard entry point.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tierboard_client::{CachedBackend, RestBackend};
use tierboard_core::QueryBackend;
use tierboard_engine::commands::{parse_command, Command, HELP};
use tierboard_engine::constants::{CACHE_PURGE_INTERVAL_MS, TRIGGER_CHANNEL_CAPACITY};
use tierboard_engine::render::summarize;
use tierboard_engine::{
    scheduler_task, telemetry, EngineConfig, EngineError, Pipeline, PipelineSettings,
    SchedulerConfig, SystemClock, Trigger,
};
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = EngineConfig::load()?;
    telemetry::init_tracing(&config.log)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let backend = build_backend(&config, shutdown_rx.clone())?;
    let clock = Arc::new(SystemClock::new(config.utc_offset()?));
    let pipeline = Arc::new(Pipeline::new(
        backend,
        PipelineSettings::from(&config),
        clock,
    ));

    spawn_renderer(pipeline.subscribe());

    let (trigger_tx, trigger_rx) = mpsc::channel::<Trigger>(TRIGGER_CHANNEL_CAPACITY);
    let scheduler = tokio::spawn(scheduler_task(
        Arc::clone(&pipeline),
        SchedulerConfig::from(&config),
        trigger_rx,
        shutdown_rx,
    ));

    let (line_tx, mut lines) = mpsc::channel::<String>(TRIGGER_CHANNEL_CAPACITY);
    spawn_input_reader(line_tx);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.recv() => {
                let Some(line) = line else { break };
                match parse_command(&line) {
                    Ok(None) => {}
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(Command::Help)) => println!("{}", HELP),
                    Ok(Some(Command::Run(trigger))) => {
                        if trigger_tx.send(trigger).await.is_err() {
                            tracing::warn!("Scheduler stopped; command ignored");
                            break;
                        }
                    }
                    Err(err) => eprintln!("{}", err),
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let metrics = scheduler.await?;
    tracing::info!(
        runs_committed = metrics.snapshot().runs_committed,
        "tierboard stopped"
    );
    Ok(())
}

/// Stdin is read on a plain thread so a pending read never holds up shutdown.
fn spawn_input_reader(sender: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if sender.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

fn build_backend(
    config: &EngineConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<Arc<dyn QueryBackend>, EngineError> {
    let rest = RestBackend::new(&config.backend())?;
    tracing::info!(base_url = rest.base_url(), "Backend configured");

    let Some(ttl) = config.cache_ttl() else {
        return Ok(Arc::new(rest));
    };

    let cached = Arc::new(CachedBackend::new(rest, ttl));
    let sweeper = Arc::clone(&cached);
    tokio::spawn(async move {
        let period = Duration::from_millis(CACHE_PURGE_INTERVAL_MS);
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let purged = sweeper.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Purged expired cache entries");
                    }
                }
            }
        }
    });
    tracing::info!(ttl_ms = ttl.as_millis() as u64, "Response cache enabled");
    Ok(cached)
}

fn spawn_renderer(mut view_rx: watch::Receiver<tierboard_engine::DashboardView>) {
    tokio::spawn(async move {
        while view_rx.changed().await.is_ok() {
            let text = summarize(&view_rx.borrow_and_update());
            println!("{}", text);
        }
    });
}
