use clap::Parser;
use clusterwatch::bus::config::DEFAULT_BUS_URL;
use clusterwatch::k8s::cache::config::{DEFAULT_REFRESH_INTERVAL_SECONDS, SERVICE_NAME};
use clusterwatch::k8s::cache::InterrogatorConfig;
use clusterwatch::{Service, ServiceConfig};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// NATS server URL; `memory://` keeps the bus in process
    #[arg(long, env = "NATS_URL", default_value = DEFAULT_BUS_URL)]
    bus_url: String,

    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port for the HTTP server
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Seconds between background collections
    #[arg(
        short,
        long,
        env = "REFRESH_INTERVAL_SECONDS",
        default_value_t = DEFAULT_REFRESH_INTERVAL_SECONDS
    )]
    interval_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = ServiceConfig {
        service_name: SERVICE_NAME.to_string(),
        bus_url: args.bus_url,
        interrogator: InterrogatorConfig::with_interval(Duration::from_secs(
            args.interval_secs.max(1),
        )),
        ..ServiceConfig::default()
    };
    let service = Service::start(config).await;

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("{} listening on {}", SERVICE_NAME, listener.local_addr()?);
    info!("Available endpoints:");
    info!("  GET  /health - Health check");
    info!("  GET  /api/status - Detailed status");
    info!("  GET  /api/cluster/info - Cluster information");
    info!("  GET  /api/cluster/pods - Pod information");
    info!("  GET  /api/cluster/deployments - Deployment information");
    info!("  GET  /api/cache/stats - Cache statistics");
    info!("  POST /api/cache/refresh - Force cache refresh");
    info!("  POST /api/cache/invalidate - Invalidate cache");

    service.announce().await;

    let served = axum::serve(listener, service.router())
        .with_graceful_shutdown(shutdown_signal())
        .await;
    service.shutdown().await;
    served?;
    Ok(())
}
