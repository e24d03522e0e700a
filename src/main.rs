use anyhow::Result;
use std::sync::Arc;
use taskmon::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Disks and services are slower to query; log them every N ticks.
const INVENTORY_EVERY_TICKS: u32 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries one JSON snapshot per line; logs go to stderr.
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app_config = config::AppConfig::load()?;
    tracing::info!("{} {} starting", version::NAME, version::VERSION);

    let monitor = Arc::new(
        Monitor::new(app_config.clone()).map_err(|e| anyhow::anyhow!("monitor: {}", e))?,
    );

    monitor.register(|snapshot| match serde_json::to_string(snapshot) {
        Ok(line) => println!("{}", line),
        Err(e) => tracing::warn!(error = %e, operation = "print_snapshot", "serialize failed"),
    });

    monitor
        .start_default()
        .map_err(|e| anyhow::anyhow!("start: {}", e))?;
    tracing::info!(
        interval_ms = app_config.monitoring.interval_ms,
        "Collecting"
    );

    let inventory_monitor = monitor.clone();
    let network_poll = app_config.network_poll_interval();
    let inventory_period = app_config.interval() * INVENTORY_EVERY_TICKS;
    let inventory = tokio::spawn(async move {
        let m = inventory_monitor.clone();
        match tokio::task::spawn_blocking(move || m.gpu_info()).await {
            Ok(gpus) => {
                for g in &gpus {
                    tracing::info!(model = %g.model, integrated = g.integrated, "gpu");
                }
            }
            Err(e) => tracing::warn!(error = %e, operation = "gpu_info", "task failed"),
        }

        // Counters are sampled more often than the stale threshold so rates never reset.
        let mut network_tick = tokio::time::interval(network_poll);
        let mut inventory_tick = tokio::time::interval(inventory_period);
        let mut networks = Vec::new();
        loop {
            tokio::select! {
                _ = network_tick.tick() => {
                    let m = inventory_monitor.clone();
                    match tokio::task::spawn_blocking(move || m.network_info()).await {
                        Ok(latest) => networks = latest,
                        Err(e) => tracing::warn!(error = %e, operation = "network_info", "task failed"),
                    }
                }
                _ = inventory_tick.tick() => {
                    let m = inventory_monitor.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        (m.disk_info(), m.services_info())
                    })
                    .await;
                    match result {
                        Ok((disks, services)) => {
                            for n in &networks {
                                tracing::debug!(
                                    interface = %n.name,
                                    send_bps = n.send_speed,
                                    recv_bps = n.recv_speed,
                                    "network"
                                );
                            }
                            tracing::info!(
                                disks = disks.len(),
                                interfaces = networks.len(),
                                services = services.len(),
                                "inventory"
                            );
                        }
                        Err(e) => tracing::warn!(error = %e, operation = "inventory", "task failed"),
                    }
                }
            }
        }
    });

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Received shutdown signal");
    inventory.abort();
    let stopper = monitor.clone();
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    let stats = monitor.stats();
    tracing::info!(
        ticks = stats.ticks,
        failed_ticks = stats.failed_ticks,
        "Stopped"
    );
    Ok(())
}
